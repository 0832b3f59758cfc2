/*!
    CiA 402 servodrive controller

    A [Drive] is shared between two actors:

    - the cyclic task, calling [Drive::update_read] and [Drive::update_write] around every bus cycle
    - the application, staging commands, requesting states and copying readings out

    The controller state sits behind one lock and the last reading behind another. The reading lock is only ever taken after the controller lock or alone, and no bus exchange nor sleep happens while the controller lock is held.

    Drive states can be changed two ways:

    - through the mailbox with [Drive::set_drive_state_via_sdo], blocking and meant for the preoperational configuration
    - through process data with [Drive::set_drive_state_via_pdo], the controlword being stepped by the cyclic task itself
*/

use crate::{
    bus::{Bus, BusState},
    cia402::{self, ControlWord, StatusWord, DriveState, StateTransition, OperationMode},
    command::{Command, RawCommand},
    config::{Configuration, ConfigError},
    data::PduData,
    error::{ErrorType, BusError, BusResult},
    pdo::{RxPdo, TxPdo, RxPdoType, TxPdoType, PdoInfo, MAX_RECORD_SIZE},
    reading::Reading,
    sdo::{self, Sdo, SdoAbortCode, SyncAssignment},
    units::Factors,
    };
use core::{
    fmt::Debug,
    time::Duration,
    };
use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
    };
use log::{debug, info, warn, error};


/// period of the polling loops waiting for a state change
const POLL_PERIOD: Duration = Duration::from_millis(1);


/// progress of a state change requested on the cyclic path
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum StateChange {
    Idle,
    Pending {
        target: DriveState,
        /// last time the controlword was changed, or the request time
        since: Instant,
        /// consecutive readings of the target state
        successes: u32,
    },
}

/// everything protected by the controller lock
struct Controller {
    config: Configuration,
    factors: Factors,
    controlword: ControlWord,
    staged: RawCommand,
    mode: Option<OperationMode>,
    allow_mode_change: bool,
    rx_type: RxPdoType,
    tx_type: TxPdoType,
    pdo_info: PdoInfo,
    change: StateChange,
    /// the last requested state change completed
    succeeded: bool,
    /// a record was read since the last evaluation of the state change
    fresh_reading: bool,
    /// incremented by every state change request
    request: u64,
}

/**
    driver of one CiA 402 servodrive on an ethercat bus

    `B` is the master implementation, shared with the other slaves of the bus.
*/
pub struct Drive<B: Bus> {
    name: String,
    address: u16,
    bus: Arc<B>,
    controller: Mutex<Controller>,
    reading: Mutex<Reading>,
}

impl<B: Bus> Drive<B> {
    /// create an unconfigured driver for the slave at the given address
    pub fn new(name: impl Into<String>, address: u16, bus: Arc<B>) -> Self {
        let config = Configuration::default();
        let mut reading = Reading::default();
        reading.configure(&config);
        Self {
            name: name.into(),
            address,
            bus,
            controller: Mutex::new(Controller {
                factors: Factors::new(&config),
                controlword: ControlWord::default(),
                staged: RawCommand::default(),
                mode: config.mode_of_operation,
                allow_mode_change: config.allows_mode_change(),
                rx_type: RxPdoType::Na,
                tx_type: TxPdoType::Na,
                pdo_info: PdoInfo::default(),
                change: StateChange::Idle,
                succeeded: false,
                fresh_reading: false,
                request: 0,
                config,
            }),
            reading: Mutex::new(reading),
        }
    }

    fn controller(&self) -> MutexGuard<'_, Controller> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn reading_mut(&self) -> MutexGuard<'_, Reading> {
        self.reading.lock().unwrap_or_else(PoisonError::into_inner)
    }
    fn record(&self, error: ErrorType) {
        self.reading_mut().add_error(error);
    }

    pub fn name(&self) -> &str  {&self.name}
    pub fn address(&self) -> u16  {self.address}
    pub fn bus(&self) -> &Arc<B>  {&self.bus}
    /// copy of the current configuration
    pub fn configuration(&self) -> Configuration  {self.controller().config.clone()}
    /// copy of the last reading
    pub fn reading(&self) -> Reading  {self.reading_mut().clone()}
    pub fn pdo_info(&self) -> PdoInfo  {self.controller().pdo_info}
    pub fn rx_pdo_type(&self) -> RxPdoType  {self.controller().rx_type}
    pub fn tx_pdo_type(&self) -> TxPdoType  {self.controller().tx_type}
    pub fn mode_of_operation(&self) -> Option<OperationMode>  {self.controller().mode}
    /// controlword sent in the next rx record
    pub fn controlword(&self) -> ControlWord  {self.controller().controlword}
    /// command staged for the next rx record
    pub fn staged_command(&self) -> RawCommand  {self.controller().staged}
    /// a state change requested with [Self::set_drive_state_via_pdo] is still in progress
    pub fn state_change_pending(&self) -> bool  {self.controller().change != StateChange::Idle}
    /// the last state change requested with [Self::set_drive_state_via_pdo] completed
    pub fn state_change_succeeded(&self) -> bool  {self.controller().succeeded}

    /// replace the configuration, updating calibration and the mode of operation
    pub fn load_configuration(&self, config: Configuration) {
        let mut controller = self.controller();
        controller.factors = Factors::new(&config);
        controller.allow_mode_change = config.allows_mode_change();
        controller.mode = config.mode_of_operation;
        self.reading_mut().configure(&config);
        controller.config = config;
    }
    /// parse a TOML configuration and load it
    pub fn load_config_str(&self, content: &str) -> Result<(), ConfigError> {
        self.load_configuration(Configuration::from_toml_str(content)?);
        Ok(())
    }
    /// read a TOML configuration file and load it
    pub fn load_config_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.load_configuration(Configuration::load(path)?);
        Ok(())
    }

    /// rated current known from the hardware, changing the calibration
    fn set_rated_current(&self, rated: f64) {
        let mut controller = self.controller();
        controller.config.motor_rated_current_a = Some(rated);
        let factors = Factors::new(&controller.config);
        controller.factors = factors;
        self.reading_mut().configure(&controller.config);
    }


    /**
        configure the drive through the mailbox, meant to be called while the bus is in preoperational state

        - rated current is read from the drive if not configured
        - the drive is brought to [DriveState::ReadyToSwitchOn]
        - the process data records are assigned
        - the mode of operation, rated current, rated torque and max current are written and checked

        Every step is attempted even if a previous one failed, the result is true only if they all succeeded.
    */
    pub fn run_preop_configuration(&self) -> bool {
        let config = self.configuration();
        let timeout = config.config_run_sdo_verify_timeout;
        let mut success = true;

        if config.motor_rated_current_a.is_none() {
            match self.bus.sdo_read(self.address, &sdo::cia402::motor_rated_current, timeout) {
                Ok(0) => {
                    error!("{}: drive reports no motor rated current", self.name);
                    success = false;
                },
                Ok(milliamps) => {
                    debug!("{}: rated current read from drive: {} mA", self.name, milliamps);
                    self.set_rated_current(f64::from(milliamps) / 1000.);
                },
                Err(err) => {
                    error!("{}: cannot read motor rated current: {}", self.name, err);
                    success = false;
                },
            }
        }

        success &= self.set_drive_state_via_sdo(DriveState::ReadyToSwitchOn);
        success &= self.map_pdos(config.rx_pdo_type, config.tx_pdo_type);

        match config.mode_of_operation {
            Some(mode) => success &= self.sdo_verify_write(&sdo::cia402::mode_of_operation, mode.code(), timeout),
            None => {
                error!("{}: no mode of operation configured", self.name);
                success = false;
            },
        }

        self.auto_configure_pdo_sizes();

        // the drive computes torques from currents, so the rated torque takes the value of the rated current
        let config = self.configuration();
        if let Some(rated) = config.motor_rated_current_a {
            let milliamps = (1000. * rated).round() as u32;
            success &= self.sdo_verify_write(&sdo::cia402::motor_rated_current, milliamps, timeout);
            success &= self.sdo_verify_write(&sdo::cia402::motor_rated_torque, milliamps, timeout);
        }
        let milliamps = (1000. * config.max_current_a).floor() as u16;
        success &= self.sdo_verify_write(&sdo::cia402::max_current, milliamps, timeout);

        if success {
            info!("{}: hardware configuration done", self.name);
        } else {
            error!("{}: hardware configuration failed", self.name);
            self.record(ErrorType::ConfigurationError);
        }
        success
    }

    /// negotiated record types from the configuration, for drives whose mapping is already in place
    pub fn startup(&self) -> bool {
        let config = self.configuration();
        self.configure_rx_pdo(config.rx_pdo_type)
            && self.configure_tx_pdo(config.tx_pdo_type)
    }

    /// bring the drive back to [BusState::Init]
    pub fn shutdown(&self) {
        match self.bus.set_state(self.address, BusState::Init) {
            Ok(()) => info!("{}: shut down", self.name),
            Err(err) => warn!("{}: cannot shut down: {}", self.name, err),
        }
    }

    /// select the rx record type sent by [Self::update_write]
    pub fn configure_rx_pdo(&self, ty: RxPdoType) -> bool {
        if ty == RxPdoType::Na {
            error!("{}: cannot configure rx pdo type {}", self.name, ty);
            self.record(ErrorType::RxPdoTypeError);
            return false;
        }
        self.controller().rx_type = ty;
        true
    }
    /// select the tx record type expected by [Self::update_read]
    pub fn configure_tx_pdo(&self, ty: TxPdoType) -> bool {
        if ty == TxPdoType::Na {
            error!("{}: cannot configure tx pdo type {}", self.name, ty);
            self.record(ErrorType::TxPdoTypeError);
            return false;
        }
        self.controller().tx_type = ty;
        true
    }

    /// refresh [PdoInfo] from the sizes negotiated by the master
    pub fn auto_configure_pdo_sizes(&self) {
        let (rx_size, tx_size) = self.bus.pdo_sizes(self.address);
        debug!("{}: pdo sizes rx {} tx {}", self.name, rx_size, tx_size);
        self.controller().pdo_info = PdoInfo {rx_size, tx_size};
    }

    /// assign the PDOs of both record types to the sync managers, through the mailbox
    pub fn map_pdos(&self, rx: RxPdoType, tx: TxPdoType) -> bool {
        let settle = self.controller().config.config_run_sdo_verify_timeout;

        let rx_success = match rx.assignment() {
            Some(list) => self.assign_pdos(&sdo::pdo_assignment::rx, list, settle)
                && self.configure_rx_pdo(rx),
            None => {
                error!("{}: cannot map rx pdo type {}", self.name, rx);
                false
            },
        };
        if ! rx_success
            {self.record(ErrorType::PdoMappingError)}

        let tx_success = match tx.assignment() {
            Some(list) => self.assign_pdos(&sdo::pdo_assignment::tx, list, settle)
                && self.configure_tx_pdo(tx),
            None => {
                error!("{}: cannot map tx pdo type {}", self.name, tx);
                false
            },
        };
        if ! tx_success
            {self.record(ErrorType::TxPdoMappingError)}

        rx_success && tx_success
    }

    fn assign_pdos(&self, assignment: &SyncAssignment, list: &[u16], settle: Duration) -> bool {
        let mut success = self.sdo_verify_write(&assignment.len(), 0, settle);
        for (slot, &index) in (0 ..).zip(list) {
            std::thread::sleep(settle);
            success &= self.sdo_verify_write(&assignment.slot(slot), index, settle);
        }
        std::thread::sleep(settle);
        success &= self.sdo_verify_write(&assignment.len(), list.len() as u8, settle);
        success
    }

    /**
        write an object through the mailbox and check it reads back the same value after `delay`

        Never succeeds unless the value read back equals the value written.
    */
    pub fn sdo_verify_write<T>(&self, sdo: &Sdo<T>, value: T, delay: Duration) -> bool
    where T: PduData + Copy + PartialEq + Debug
    {
        let timeout = self.controller().config.config_run_sdo_verify_timeout;
        if let Err(err) = self.bus.sdo_write(self.address, sdo, value, timeout) {
            match err {
                BusError::Slave(code) => warn!("{}: cannot write {:?}: {}, {:?}", self.name, sdo, code.reason(), code),
                err => warn!("{}: cannot write {:?}: {}", self.name, sdo, err),
            }
            return false;
        }
        std::thread::sleep(delay);
        match self.bus.sdo_read(self.address, sdo, timeout) {
            Ok(readback) if readback == value => true,
            Ok(readback) => {
                warn!("{}: {:?} reads back {:?} instead of {:?}", self.name, sdo, readback, value);
                false
            },
            Err(BusError::Slave(code)) => {
                warn!("{}: cannot read back {:?}: {}, {:?}", self.name, sdo, code.reason(), code);
                false
            },
            Err(err) => {
                warn!("{}: cannot read back {:?}: {}", self.name, sdo, err);
                false
            },
        }
    }

    /// read the statusword through the mailbox
    pub fn statusword_via_sdo(&self) -> BusResult<StatusWord, SdoAbortCode> {
        let timeout = self.controller().config.config_run_sdo_verify_timeout;
        self.bus.sdo_read(self.address, &sdo::cia402::statusword, timeout)
    }
    /// write the controlword through the mailbox
    pub fn set_controlword_via_sdo(&self, controlword: ControlWord) -> BusResult<(), SdoAbortCode> {
        let timeout = self.controller().config.config_run_sdo_verify_timeout;
        self.bus.sdo_write(self.address, &sdo::cia402::controlword, controlword, timeout)
    }
    /// perform one transition through the mailbox
    pub fn state_transition_via_sdo(&self, transition: StateTransition) -> bool {
        match self.set_controlword_via_sdo(transition.controlword()) {
            Ok(()) => {
                debug!("{}: {} via sdo", self.name, transition);
                true
            },
            Err(err) => {
                error!("{}: {} via sdo failed: {}", self.name, transition, err);
                self.record(ErrorType::SdoStateTransitionError);
                false
            },
        }
    }

    /**
        bring the drive to the requested state through the mailbox, blocking

        The current state is read from the drive, then every transition on the way to the requested state is performed in order. The first failing transition aborts the sequence.
    */
    pub fn set_drive_state_via_sdo(&self, target: DriveState) -> bool {
        let statusword = match self.statusword_via_sdo() {
            Ok(statusword) => statusword,
            Err(err) => {
                error!("{}: cannot read statusword: {}", self.name, err);
                return false;
            },
        };
        let current = match statusword.state() {
            Ok(state) => state,
            Err(err) => {
                error!("{}: cannot reach {}: {}", self.name, target, err);
                self.record(ErrorType::SdoStateTransitionError);
                return false;
            },
        };
        let path = match cia402::transition_path(target, current) {
            Ok(path) => path,
            Err(err) => {
                error!("{}: {}", self.name, err);
                self.record(ErrorType::SdoStateTransitionError);
                return false;
            },
        };
        path.into_iter().all(|transition| self.state_transition_via_sdo(transition))
    }


    /**
        convert a command and stage it for the next rx records

        The mode of the command is followed only on drives allowing mode changes, see [Configuration::allows_mode_change].
    */
    pub fn stage_command(&self, command: &Command) {
        let mut controller = self.controller();
        let factors = if controller.config.use_raw_commands  {Factors::raw()}
                      else {controller.factors};
        let max_torque = controller.config.max_torque();
        controller.staged = command.to_raw(&factors, max_torque);
        if controller.allow_mode_change {
            if let Some(mode) = command.mode_of_operation
                {controller.mode = Some(mode)}
        }
    }

    /**
        write half of the bus cycle: send the staged command in the rx record

        If a state change is pending and a record was read since the last call, the controlword is stepped toward the requested state before sending.
    */
    pub fn update_write(&self) {
        let mut packed = [0u8; MAX_RECORD_SIZE];
        let size = {
            let mut controller = self.controller();
            let Some(mode) = controller.mode else {
                error!("{}: mode of operation has not been set", self.name);
                self.record(ErrorType::ModeOfOperationError);
                return;
            };
            if controller.fresh_reading && controller.change != StateChange::Idle
                {self.engage_state_change(&mut controller)}
            let Some(record) = RxPdo::new(controller.rx_type, &controller.staged, controller.controlword, mode) else {
                error!("{}: cannot write rx pdo type {}", self.name, controller.rx_type);
                self.record(ErrorType::RxPdoTypeError);
                return;
            };
            if let Err(err) = record.pack(&mut packed) {
                error!("{}: cannot pack rx pdo: {:?}", self.name, err);
                return;
            }
            record.size()
        };
        if let Err(err) = self.bus.write_rxpdo(self.address, &packed[.. size]) {
            warn!("{}: cannot write rx pdo: {}", self.name, err);
        }
    }

    fn engage_state_change(&self, controller: &mut Controller) {
        controller.fresh_reading = false;
        let StateChange::Pending {target, since, successes} = controller.change
            else {return};
        let state = self.reading_mut().drive_state();

        if state == Ok(target) {
            let successes = successes + 1;
            if successes >= controller.config.min_number_of_successful_target_state_readings {
                debug!("{}: reached {} via pdo", self.name, target);
                controller.change = StateChange::Idle;
                controller.succeeded = true;
            } else {
                controller.change = StateChange::Pending {target, since, successes};
            }
        }
        else if since.elapsed() >= controller.config.drive_state_change_min_timeout {
            match state {
                Ok(current) => match cia402::next_transition(target, current) {
                    Ok(transition) => {
                        debug!("{}: {} from {} toward {}", self.name, transition, current, target);
                        controller.controlword = transition.controlword();
                    },
                    Err(err) => {
                        warn!("{}: {}", self.name, err);
                        self.record(ErrorType::PdoStateTransitionError);
                    },
                },
                Err(err) => {
                    warn!("{}: cannot reach {}: {}", self.name, target, err);
                    self.record(ErrorType::PdoStateTransitionError);
                },
            }
            controller.change = StateChange::Pending {target, since: Instant::now(), successes: 0};
        }
        else {
            controller.change = StateChange::Pending {target, since, successes: 0};
        }
    }

    /**
        read half of the bus cycle: decode the tx record into the reading

        If the drive reports a fault, its error code is read through the mailbox and added to the reading's faults.

        A record whose exchange began before a state change request does not count as a reading for that request.
    */
    pub fn update_read(&self) {
        let (ty, request) = {
            let controller = self.controller();
            (controller.tx_type, controller.request)
        };
        let Some(size) = ty.size() else {
            error!("{}: cannot read tx pdo type {}", self.name, ty);
            self.record(ErrorType::TxPdoTypeError);
            return;
        };
        let mut packed = [0u8; MAX_RECORD_SIZE];
        if let Err(err) = self.bus.read_txpdo(self.address, &mut packed[.. size]) {
            warn!("{}: cannot read tx pdo: {}", self.name, err);
            return;
        }
        let record = match TxPdo::unpack(ty, &packed[.. size]) {
            Ok(Some(record)) => record,
            Ok(None) => return,
            Err(err) => {
                error!("{}: cannot unpack tx pdo: {:?}", self.name, err);
                return;
            },
        };
        let state = {
            let mut reading = self.reading_mut();
            reading.update(&record);
            reading.drive_state()
        };
        let timeout = {
            let mut controller = self.controller();
            if controller.request == request
                {controller.fresh_reading = true}
            controller.config.config_run_sdo_verify_timeout
        };

        if state == Ok(DriveState::Fault) {
            match self.bus.sdo_read(self.address, &sdo::cia402::error_code, timeout) {
                Ok(code) => {
                    warn!("{}: drive in fault, error code {:#06x}", self.name, code);
                    self.reading_mut().add_fault(code);
                },
                Err(err) => {
                    error!("{}: drive in fault, cannot read error code: {}", self.name, err);
                    self.record(ErrorType::ErrorReadingError);
                },
            }
        }
    }


    /// arm the cyclic state change, return the request time
    fn request_state_change(&self, target: DriveState) -> Instant {
        let mut controller = self.controller();
        let now = Instant::now();
        controller.succeeded = false;
        controller.fresh_reading = false;
        controller.request = controller.request.wrapping_add(1);
        controller.change = StateChange::Pending {target, since: now, successes: 0};
        now
    }
    /// `Some(true)` once reached, `Some(false)` once timed out, `None` while in progress
    fn poll_state_change(&self, target: DriveState, start: Instant) -> Option<bool> {
        let controller = self.controller();
        if controller.succeeded
            {Some(true)}
        else if start.elapsed() > controller.config.drive_state_change_max_timeout {
            warn!("{}: {} not reached via pdo after {:?}", self.name, target, controller.config.drive_state_change_max_timeout);
            Some(false)
        }
        else
            {None}
    }

    /**
        request a state change performed by the cyclic task

        Without `wait` this returns true immediately and the progress can be followed with [Self::state_change_pending] and [Self::state_change_succeeded]. With `wait` it blocks until the state has been read enough times in a row, or until the configured maximum timeout.

        Waiting only makes sense while an other thread runs the bus cycle.
    */
    pub fn set_drive_state_via_pdo(&self, target: DriveState, wait: bool) -> bool {
        let start = self.request_state_change(target);
        if ! wait
            {return true}
        loop {
            if let Some(outcome) = self.poll_state_change(target, start)
                {return outcome}
            std::thread::sleep(POLL_PERIOD);
        }
    }

    /// same as [Self::set_drive_state_via_pdo] with waiting, for applications running the bus cycle from an async runtime
    pub async fn wait_drive_state_via_pdo(&self, target: DriveState) -> bool {
        let start = self.request_state_change(target);
        loop {
            if let Some(outcome) = self.poll_state_change(target, start)
                {return outcome}
            tokio::time::sleep(POLL_PERIOD).await;
        }
    }
}

impl<B: Bus> Debug for Drive<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Drive")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
