/*!
    latest telemetry received from a drive, and the history of what went wrong with it

    A [Reading] is a plain value: the drive keeps one behind its own lock and hands out copies, so an application can inspect it at leisure while the bus keeps running.
*/

use crate::{
    cia402::{StatusWord, DriveState, UndefinedState},
    config::Configuration,
    error::ErrorType,
    pdo::TxPdo,
    units::{self, Factors},
    };
use chrono::{DateTime, Utc};
use heapless::Vec;


/// number of entries kept in each history, older entries are dropped first
pub const HISTORY_LEN: usize = 32;

/// something that happened at a given time
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Stamped<T> {
    pub time: DateTime<Utc>,
    pub value: T,
}

/// bounded history keeping the most recent entries
#[derive(Clone, Debug)]
pub struct History<T, const N: usize> {
    entries: Vec<Stamped<T>, N>,
}
impl<T, const N: usize> History<T, N> {
    pub fn new() -> Self  {Self{entries: Vec::new()}}
    /// append an entry stamped now, dropping the oldest one if full
    pub fn push(&mut self, value: T) {
        let entry = Stamped {time: Utc::now(), value};
        if let Err(entry) = self.entries.push(entry) {
            self.entries.rotate_left(1);
            if let Some(last) = self.entries.last_mut()
                {*last = entry}
        }
    }
    /// entries from the oldest to the most recent
    pub fn entries(&self) -> &[Stamped<T>]  {&self.entries}
    pub fn last(&self) -> Option<&Stamped<T>>  {self.entries.last()}
    pub fn len(&self) -> usize  {self.entries.len()}
    pub fn is_empty(&self) -> bool  {self.entries.is_empty()}
    pub fn clear(&mut self)  {self.entries.clear()}
}
impl<T, const N: usize> Default for History<T, N> {
    fn default() -> Self  {Self::new()}
}


/**
    copy of the last tx record received from a drive, with the calibration needed to express it in physical units

    Raw values are the drive integers as received, the other accessors convert them with the calibration the drive was configured with.
*/
#[derive(Clone, Debug, Default)]
pub struct Reading {
    actual_position: i32,
    actual_velocity: i32,
    actual_current: i16,
    statusword: StatusWord,
    digital_inputs: u32,
    analog_input: i16,
    bus_voltage: u32,
    /// reception time of the last record, `None` until the first one
    time: Option<DateTime<Utc>>,

    factors: Factors,
    errors: History<ErrorType, HISTORY_LEN>,
    faults: History<u16, HISTORY_LEN>,
}

impl Reading {
    /// calibration used by the physical accessors
    pub fn configure(&mut self, config: &Configuration) {
        self.factors = Factors::new(config);
    }
    /// store the content of a freshly received record
    pub fn update(&mut self, record: &TxPdo) {
        match record {
            TxPdo::Standard(record) => {
                self.actual_position = record.actual_position;
                self.digital_inputs = record.digital_inputs;
                self.actual_velocity = record.actual_velocity;
                self.statusword = record.statusword;
                self.analog_input = record.analog_input;
                self.actual_current = record.actual_current;
                self.bus_voltage = record.bus_voltage;
            },
            TxPdo::Cst(record) => {
                self.actual_position = record.actual_position;
                // torque is reported in ‰ of rated current, just like the current
                self.actual_current = record.actual_torque;
                self.statusword = record.statusword;
                self.actual_velocity = record.actual_velocity;
            },
        }
        self.time = Some(Utc::now());
    }
    pub fn add_error(&mut self, error: ErrorType)  {self.errors.push(error)}
    pub fn add_fault(&mut self, code: u16)  {self.faults.push(code)}

    pub fn errors(&self) -> &[Stamped<ErrorType>]  {self.errors.entries()}
    pub fn faults(&self) -> &[Stamped<u16>]  {self.faults.entries()}
    /// true if the given error happened since the errors were last cleared
    pub fn has_error(&self, error: ErrorType) -> bool {
        self.errors.entries().iter().any(|entry| entry.value == error)
    }
    pub fn last_error(&self) -> Option<ErrorType>  {self.errors.last().map(|entry| entry.value)}
    pub fn last_fault(&self) -> Option<u16>  {self.faults.last().map(|entry| entry.value)}
    pub fn clear_errors(&mut self)  {self.errors.clear()}
    pub fn clear_faults(&mut self)  {self.faults.clear()}

    pub fn time(&self) -> Option<DateTime<Utc>>  {self.time}
    pub fn statusword(&self) -> StatusWord  {self.statusword}
    pub fn drive_state(&self) -> Result<DriveState, UndefinedState>  {self.statusword.state()}
    pub fn digital_inputs(&self) -> u32  {self.digital_inputs}
    /// state of one digital input, `false` beyond the 32 available bits
    pub fn digital_input(&self, index: u8) -> bool {
        self.digital_inputs.checked_shr(u32::from(index)).map_or(false, |bits| bits & 1 == 1)
    }

    pub fn raw_actual_position(&self) -> i32  {self.actual_position}
    pub fn raw_actual_velocity(&self) -> i32  {self.actual_velocity}
    pub fn raw_actual_current(&self) -> i16  {self.actual_current}
    pub fn raw_analog_input(&self) -> i16  {self.analog_input}
    pub fn raw_bus_voltage(&self) -> u32  {self.bus_voltage}

    /// rad
    pub fn actual_position(&self) -> f64  {units::from_raw(self.actual_position, self.factors.position)}
    /// rad/s
    pub fn actual_velocity(&self) -> f64  {units::from_raw(self.actual_velocity, self.factors.velocity)}
    /// A
    pub fn actual_current(&self) -> f64  {units::from_raw(self.actual_current, self.factors.current)}
    /// N·m at the gearbox output
    pub fn actual_torque(&self) -> f64  {units::from_raw(self.actual_current, self.factors.torque)}
    /// V
    pub fn analog_input(&self) -> f64  {units::from_raw(self.analog_input, self.factors.voltage)}
    /// V
    pub fn bus_voltage(&self) -> f64  {units::from_raw(self.bus_voltage, self.factors.voltage)}
}
