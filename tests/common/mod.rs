//! simulated CiA 402 servodrive answering as the only slave of a bus

#![allow(dead_code)]

use etherage_cia402::{
    Bus, BusState, BusError, BusResult, SdoRequest, SdoAbortCode,
    DriveState, StatusWord, PduData,
    pdo::{TxPdoStandard, TxPdoCst},
    };
use core::time::Duration;
use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
    };

pub const STATUSWORD: (u16, u8) = (0x6041, 0);
pub const CONTROLWORD: (u16, u8) = (0x6040, 0);
pub const MODE: (u16, u8) = (0x6060, 0);
pub const ERROR_CODE: (u16, u8) = (0x603f, 0);
pub const RATED_CURRENT: (u16, u8) = (0x6075, 0);
pub const RATED_TORQUE: (u16, u8) = (0x6076, 0);
pub const MAX_CURRENT: (u16, u8) = (0x6073, 0);
pub const RX_ASSIGN: u16 = 0x1c12;
pub const TX_ASSIGN: u16 = 0x1c13;

/// internals of the simulation, freely inspected and changed by tests
#[derive(Default)]
pub struct Simulation {
    pub state: Option<DriveState>,
    /// controlwords are ignored, the state never changes by itself
    pub frozen: bool,
    pub objects: HashMap<(u16, u8), Vec<u8>>,
    /// object values the drive keeps whatever is written
    pub clamped: HashMap<(u16, u8), Vec<u8>>,
    pub failing_reads: HashSet<(u16, u8)>,
    pub failing_writes: HashSet<(u16, u8)>,
    pub fail_pdo_write: bool,
    /// time the tx record takes to come back, after its values were sampled
    pub read_delay: Duration,

    pub sdo_writes: Vec<((u16, u8), Vec<u8>)>,
    pub sdo_reads: Vec<(u16, u8)>,
    pub rx_records: Vec<Vec<u8>>,
    pub controlwords: Vec<u16>,
    pub tx_reads: usize,
    pub bus_state: Option<BusState>,

    pub actual_position: i32,
    pub actual_velocity: i32,
    pub actual_current: i16,
    pub digital_inputs: u32,
    pub bus_voltage: u32,
}

pub struct SimulatedDrive {
    simulation: Mutex<Simulation>,
}

impl SimulatedDrive {
    pub fn new() -> Self {
        Self {simulation: Mutex::new(Simulation {
            state: Some(DriveState::SwitchOnDisabled),
            ..Simulation::default()
        })}
    }
    pub fn sim(&self) -> MutexGuard<'_, Simulation> {
        self.simulation.lock().unwrap()
    }
    pub fn state(&self) -> Option<DriveState>  {self.sim().state}
    pub fn set_state(&self, state: DriveState)  {self.sim().state = Some(state)}
    pub fn set_object(&self, key: (u16, u8), value: &[u8]) {
        self.sim().objects.insert(key, value.to_vec());
    }
    /// controlwords received either through the mailbox or process data
    pub fn controlwords(&self) -> Vec<u16>  {self.sim().controlwords.clone()}
    pub fn rx_records(&self) -> Vec<Vec<u8>>  {self.sim().rx_records.clone()}
    /// indices of all mailbox writes, in order
    pub fn written_indices(&self) -> Vec<u16> {
        self.sim().sdo_writes.iter().map(|((index, _), _)| *index).collect()
    }
}

impl Simulation {
    fn statusword(&self) -> u16 {
        // undefined pattern when no state
        let state = match self.state {
            Some(state) => u16::from(state.statusword()),
            None => 0x0044,
        };
        // remote bit
        state | 0x0200
    }

    /// CiA 402 device behavior on controlword reception
    fn receive_controlword(&mut self, controlword: u16) {
        self.controlwords.push(controlword);
        if self.frozen
            {return}
        let Some(state) = self.state else {return};
        use DriveState::*;
        self.state = Some(match state {
            Fault if controlword & 0x80 != 0 => SwitchOnDisabled,
            Fault | NotReadyToSwitchOn | FaultReactionActive => state,
            // disable voltage
            _ if controlword & 0x02 == 0 => SwitchOnDisabled,
            // quick stop
            _ if controlword & 0x04 == 0 => match state {
                OperationEnabled | QuickStopActive => QuickStopActive,
                _ => SwitchOnDisabled,
            },
            // shutdown
            SwitchOnDisabled | SwitchedOn | OperationEnabled if controlword & 0x07 == 0x06 => ReadyToSwitchOn,
            // switch on
            ReadyToSwitchOn | OperationEnabled if controlword & 0x0f == 0x07 => SwitchedOn,
            // enable operation
            SwitchedOn | QuickStopActive if controlword & 0x0f == 0x0f => OperationEnabled,
            _ => state,
        });
    }

    fn assigned(&self, index: u16) -> Vec<u16> {
        let count = self.objects.get(&(index, 0)).and_then(|value| value.first().copied()).unwrap_or(0);
        (1 ..= count)
            .filter_map(|sub| self.objects.get(&(index, sub)))
            .map(|value| u16::from_le_bytes([value[0], value[1]]))
            .collect()
    }
}

fn record_size(assigned: &[u16]) -> u16 {
    match assigned {
        [0x1605, 0x1618] => 18,
        [0x1602, 0x160b] => 6,
        [0x1a03, 0x1a1d, 0x1a1f, 0x1a18] => 22,
        [0x1a02, 0x1a11] => 14,
        _ => 0,
    }
}

impl Bus for SimulatedDrive {
    fn set_state(&self, _slave: u16, state: BusState) -> BusResult {
        self.sim().bus_state = Some(state);
        Ok(())
    }

    fn write_rxpdo(&self, _slave: u16, data: &[u8]) -> BusResult {
        let mut sim = self.sim();
        if sim.fail_pdo_write
            {return Err(BusError::Timeout("simulated frame loss"))}
        sim.rx_records.push(data.to_vec());
        let (controlword, mode) = match data.len() {
            18 => (u16::from_le_bytes([data[12], data[13]]), data[14]),
            6 => (u16::from_le_bytes([data[2], data[3]]), data[4]),
            _ => return Err(BusError::Protocol("unexpected rx record size")),
        };
        sim.objects.insert(MODE, vec![mode]);
        sim.receive_controlword(controlword);
        Ok(())
    }

    fn read_txpdo(&self, _slave: u16, data: &mut [u8]) -> BusResult {
        let mut sim = self.sim();
        sim.tx_reads += 1;
        let statusword = StatusWord::from(sim.statusword());
        match data.len() {
            22 => TxPdoStandard {
                actual_position: sim.actual_position,
                digital_inputs: sim.digital_inputs,
                actual_velocity: sim.actual_velocity,
                statusword,
                analog_input: 0,
                actual_current: sim.actual_current,
                bus_voltage: sim.bus_voltage,
            }.pack(data)?,
            14 => TxPdoCst {
                actual_position: sim.actual_position,
                actual_torque: sim.actual_current,
                statusword,
                mode_of_operation_display: 10,
                actual_velocity: sim.actual_velocity,
            }.pack(data)?,
            _ => return Err(BusError::Protocol("unexpected tx record size")),
        }
        let delay = sim.read_delay;
        drop(sim);
        std::thread::sleep(delay);
        Ok(())
    }

    fn sdo_read_slice(&self, _slave: u16, request: SdoRequest, data: &mut [u8]) -> BusResult<usize, SdoAbortCode> {
        let mut sim = self.sim();
        assert!(! request.complete, "complete access is not supported");
        let key = (request.index, request.sub);
        sim.sdo_reads.push(key);
        if sim.failing_reads.contains(&key)
            {return Err(BusError::Slave(SdoAbortCode::HardwareError))}
        let value = if key == STATUSWORD {
            sim.statusword().to_le_bytes().to_vec()
        } else {
            sim.objects.get(&key).cloned()
                .ok_or(BusError::Slave(SdoAbortCode::InvalidIndex))?
        };
        let size = value.len().min(data.len());
        data[.. size].copy_from_slice(&value[.. size]);
        Ok(size)
    }

    fn sdo_write_slice(&self, _slave: u16, request: SdoRequest, data: &[u8]) -> BusResult<(), SdoAbortCode> {
        let mut sim = self.sim();
        assert!(! request.complete, "complete access is not supported");
        let key = (request.index, request.sub);
        sim.sdo_writes.push((key, data.to_vec()));
        if sim.failing_writes.contains(&key)
            {return Err(BusError::Slave(SdoAbortCode::StateRefused))}
        if key == CONTROLWORD {
            sim.receive_controlword(u16::from_le_bytes([data[0], data[1]]));
        }
        let value = sim.clamped.get(&key).cloned().unwrap_or_else(|| data.to_vec());
        sim.objects.insert(key, value);
        Ok(())
    }

    fn pdo_sizes(&self, _slave: u16) -> (u16, u16) {
        let sim = self.sim();
        (record_size(&sim.assigned(RX_ASSIGN)), record_size(&sim.assigned(TX_ASSIGN)))
    }
}

/// configuration with no delays, for drives simulated in the same process
pub fn fast_config() -> etherage_cia402::Configuration {
    etherage_cia402::Configuration {
        motor_rated_current_a: Some(4.),
        max_current_a: 8.,
        motor_constant: 0.1,
        gear_ratio: 10.,
        position_encoder_resolution: 1 << 14,
        rx_pdo_type: etherage_cia402::RxPdoType::Standard,
        tx_pdo_type: etherage_cia402::TxPdoType::Standard,
        mode_of_operation: Some(etherage_cia402::OperationMode::SynchronousPosition),
        config_run_sdo_verify_timeout: Duration::ZERO,
        drive_state_change_min_timeout: Duration::ZERO,
        drive_state_change_max_timeout: Duration::from_millis(500),
        min_number_of_successful_target_state_readings: 3,
        ..etherage_cia402::Configuration::default()
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
