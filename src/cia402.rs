/*!
    CiA 402 drive state machine: status and control words, drive states and the standard transitions between them.

    Everything here is pure: the same statusword always decodes to the same state, and the same pair of (requested, current) states always selects the same transition. Both the blocking mailbox path and the cyclic path of [crate::Drive] rely on it.

    ```text
                     ┌──────────────────────┐
                     │ NotReadyToSwitchOn   │
                     └──────────┬───────────┘
                                ▼
    ┌───────┐  15   ┌──────────────────────┐
    │ Fault ├──────►│ SwitchOnDisabled     │◄──────────────┐
    └───────┘       └──┬───────────────────┘  7, 9, 10, 12 │
                     2 │   ▲ 7                             │
                       ▼   │                               │
                    ┌──────┴───────────────┐               │
                    │ ReadyToSwitchOn      ├───────────────┤
                    └──┬───────────────────┘               │
                     3 │   ▲ 6, 8                          │
                       ▼   │                               │
                    ┌──────┴───────────────┐               │
                    │ SwitchedOn           ├───────────────┤
                    └──┬───────────────────┘               │
                     4 │   ▲ 5                             │
                       ▼   │                               │
                    ┌──────┴───────────────┐  11  ┌────────┴────────┐
                    │ OperationEnabled     ├─────►│ QuickStopActive │
                    └──────────────────────┘      └─────────────────┘
    ```
*/

use crate::data;
use bilge::prelude::*;
use core::fmt;

/**
bit structure of a status word

| Bit |  Meaning | Presence |
|-----|----------|----------|
| 0	| Ready to switch on	| M
| 1	| Switched on	| M
| 2	| Operation enabled	| M
| 3	| Fault	| M
| 4	| Voltage enabled	| O
| 5	| Quick stop	| O
| 6	| Switch on disabled	| M
| 7	| Warning	| O
| 8	| Manufacturer specific	| O
| 9	| Remote	| O
| 10	| Operation mode specific	| O
| 11	| Internal limit active	| C
| 12	| Operation mode specific (Mandatory for csp, csv, cst mode)	| O
| 13	| Operation mode specific	| O
| 14-15	| Manufacturer specific	| O
*/
#[bitsize(16)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct StatusWord {
    pub ready_switch_on: bool,
    pub switched_on: bool,
    pub operation_enabled: bool,
    pub fault: bool,
    pub voltage_enabled: bool,
    pub quick_stop: bool,
    pub switch_on_disabled: bool,
    pub warning: bool,
    pub manufacturer: u1,
    pub remote: bool,
    pub target_reached: bool,
    pub limit_active: bool,
    pub mode_specific: u2,
    pub manufacturer_high: u2,
}
data::bilge_pdudata!(StatusWord, u16);

/// statusword pattern matching no drive state
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UndefinedState(pub u16);

impl fmt::Display for UndefinedState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "undefined drive state for statusword {:#06x}", self.0)
	}
}
impl std::error::Error for UndefinedState {}

impl StatusWord {
	/// decode the drive state from the state bits, following the masks of CiA 402 table 30
	pub fn state(&self) -> Result<DriveState, UndefinedState> {
		let raw = u16::from(*self);
		match (raw & 0b0100_1111, raw & 0b0110_1111) {
			(0b0000_0000, _) => Ok(DriveState::NotReadyToSwitchOn),
			(0b0100_0000, _) => Ok(DriveState::SwitchOnDisabled),
			(_, 0b0010_0001) => Ok(DriveState::ReadyToSwitchOn),
			(_, 0b0010_0011) => Ok(DriveState::SwitchedOn),
			(_, 0b0010_0111) => Ok(DriveState::OperationEnabled),
			(_, 0b0000_0111) => Ok(DriveState::QuickStopActive),
			(0b0000_1111, _) => Ok(DriveState::FaultReactionActive),
			(0b0000_1000, _) => Ok(DriveState::Fault),
			_ => Err(UndefinedState(raw)),
		}
	}
}

impl fmt::Display for StatusWord {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "StatusWord{{")?;
		for (active, mark) in [ (self.ready_switch_on(), "rtso"),
								(self.switched_on(), "so"),
								(self.operation_enabled(), "oe"),
								(self.fault(), "f"),
								(self.voltage_enabled(), "ve"),
								(self.quick_stop(), "qs"),
								(self.switch_on_disabled(), "sod"),
								(self.warning(), "w"),
								(self.remote(), "r"),
								(self.limit_active(), "la"),
								] {
			write!(f, " ")?;
			if active {
				write!(f, "{}", mark)?;
			} else {
				for _ in 0 .. mark.len() {write!(f, " ")?;}
			}
		}
		write!(f, "}}")?;
		Ok(())
	}
}

/**
Control word of a servo drive

| Bit	|	Category	|   Meaning	|
|-------|---------------|-----------|
| 0	|	M	|	Switch on |
| 1	|	M	|	Enable voltage |
| 2	|	O	|	Quick stop |
| 3	|	M	|	Enable operation |
| 4 – 6	|	O	|	Operation mode specific |
| 7	|	M	|	Fault reset |
| 8	|	O	|	Halt |
| 9	|	O	|	Operation mode specific |
| 10	|	O	|	reserved |
| 11 – 15	|	O	|	Manufacturer specific |
*/
#[bitsize(16)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq, Default)]
pub struct ControlWord {
    pub switch_on: bool,
    pub enable_voltage: bool,
    pub quick_stop: bool,
    pub enable_operation: bool,
    pub mode_specific: u3,
    pub reset_fault: bool,
    pub halt: bool,
    pub specific: bool,
    reserved: u1,
    pub manufacturer: u5,
}
data::bilge_pdudata!(ControlWord, u16);

impl fmt::Display for ControlWord {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "ControlWord{{") ?;
		for (active, mark) in [ (self.switch_on(), "so"),
								(self.enable_voltage(), "ev"),
								(self.quick_stop(), "qs"),
								(self.enable_operation(), "eo"),
								(self.reset_fault(), "rf"),
								(self.halt(), "h"),
								] {
			write!(f, " ")?;
			if active {
				write!(f, "{}", mark)?;
			} else {
				for _ in 0 .. mark.len() {write!(f, " ")?;}
			}
		}
		write!(f, "}}")?;
		Ok(())
	}
}


/// state of the drive, as decoded from its [StatusWord]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DriveState {
	/// transient state after power up, the drive leaves it by itself
	NotReadyToSwitchOn,
	SwitchOnDisabled,
	ReadyToSwitchOn,
	SwitchedOn,
	/// the only state in which motion commands are followed
	OperationEnabled,
	QuickStopActive,
	/// transient state between a fault detection and [Self::Fault]
	FaultReactionActive,
	Fault,
}

impl DriveState {
	/// the states that can be requested or be the starting point of a transition, in table order
	pub const STABLE: [DriveState; 6] = [
		DriveState::SwitchOnDisabled,
		DriveState::ReadyToSwitchOn,
		DriveState::SwitchedOn,
		DriveState::OperationEnabled,
		DriveState::QuickStopActive,
		DriveState::Fault,
		];

	/// position in [Self::STABLE], `None` for transient states
	fn stable_index(self) -> Option<usize> {
		match self {
			DriveState::SwitchOnDisabled => Some(0),
			DriveState::ReadyToSwitchOn => Some(1),
			DriveState::SwitchedOn => Some(2),
			DriveState::OperationEnabled => Some(3),
			DriveState::QuickStopActive => Some(4),
			DriveState::Fault => Some(5),
			DriveState::NotReadyToSwitchOn
			| DriveState::FaultReactionActive => None,
		}
	}

	/// a statusword with exactly the state bits of this state
	pub fn statusword(self) -> StatusWord {
		StatusWord::from(match self {
			DriveState::NotReadyToSwitchOn => 0x0000_u16,
			DriveState::SwitchOnDisabled => 0x0040,
			DriveState::ReadyToSwitchOn => 0x0021,
			DriveState::SwitchedOn => 0x0023,
			DriveState::OperationEnabled => 0x0027,
			DriveState::QuickStopActive => 0x0007,
			DriveState::FaultReactionActive => 0x000f,
			DriveState::Fault => 0x0008,
		})
	}
}

impl fmt::Display for DriveState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}


/// servodrive control-loop type, value of object 0x6060
#[bitsize(8)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperationMode {
	ProfilePosition = 1,
	Velocity = 2,
	ProfileVelocity = 3,
	ProfileTorque = 4,
	Homing = 6,
	InterpolatedPosition = 7,
	/// CSP
	SynchronousPosition = 8,
	/// CSV
	SynchronousVelocity = 9,
	/// CST
	SynchronousTorque = 10,
	SynchronousTorqueCommutation = 11,
}

impl OperationMode {
	/// signed code as transmitted in process data and in object 0x6060
	pub fn code(self) -> i8 {u8::from(self) as i8}
}


/// standard transitions of the drive state machine, numbered as in CiA 402 figure 16
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StateTransition {
	/// shutdown: SwitchOnDisabled -> ReadyToSwitchOn
	_2,
	/// switch on: ReadyToSwitchOn -> SwitchedOn
	_3,
	/// enable operation: SwitchedOn -> OperationEnabled
	_4,
	/// disable operation: OperationEnabled -> SwitchedOn
	_5,
	/// shutdown: SwitchedOn -> ReadyToSwitchOn
	_6,
	/// disable voltage: ReadyToSwitchOn -> SwitchOnDisabled
	_7,
	/// shutdown: OperationEnabled -> ReadyToSwitchOn
	_8,
	/// disable voltage: OperationEnabled -> SwitchOnDisabled
	_9,
	/// disable voltage: SwitchedOn -> SwitchOnDisabled
	_10,
	/// quick stop: OperationEnabled -> QuickStopActive
	_11,
	/// disable voltage: QuickStopActive -> SwitchOnDisabled
	_12,
	/// fault reset: Fault -> SwitchOnDisabled
	_15,
}

impl StateTransition {
	pub const ALL: [StateTransition; 12] = [
		StateTransition::_2, StateTransition::_3, StateTransition::_4,
		StateTransition::_5, StateTransition::_6, StateTransition::_7,
		StateTransition::_8, StateTransition::_9, StateTransition::_10,
		StateTransition::_11, StateTransition::_12, StateTransition::_15,
		];

	/// number of the transition in the standard
	pub fn number(self) -> u8 {
		match self {
			StateTransition::_2 => 2,
			StateTransition::_3 => 3,
			StateTransition::_4 => 4,
			StateTransition::_5 => 5,
			StateTransition::_6 => 6,
			StateTransition::_7 => 7,
			StateTransition::_8 => 8,
			StateTransition::_9 => 9,
			StateTransition::_10 => 10,
			StateTransition::_11 => 11,
			StateTransition::_12 => 12,
			StateTransition::_15 => 15,
		}
	}

	/// state the drive is in once the transition is done
	pub fn destination(self) -> DriveState {
		match self {
			StateTransition::_2
			| StateTransition::_6
			| StateTransition::_8 => DriveState::ReadyToSwitchOn,
			StateTransition::_3
			| StateTransition::_5 => DriveState::SwitchedOn,
			StateTransition::_4 => DriveState::OperationEnabled,
			StateTransition::_11 => DriveState::QuickStopActive,
			StateTransition::_7
			| StateTransition::_9
			| StateTransition::_10
			| StateTransition::_12
			| StateTransition::_15 => DriveState::SwitchOnDisabled,
		}
	}

	/// control word triggering the transition
	pub fn controlword(self) -> ControlWord {
		let mut control = ControlWord::default();
		match self {
			// shutdown
			StateTransition::_2
			| StateTransition::_6
			| StateTransition::_8 => {
				control.set_enable_voltage(true);
				control.set_quick_stop(true);
			},
			// switch on, disable operation
			StateTransition::_3
			| StateTransition::_5 => {
				control.set_switch_on(true);
				control.set_enable_voltage(true);
				control.set_quick_stop(true);
			},
			StateTransition::_4 => {
				control.set_switch_on(true);
				control.set_enable_voltage(true);
				control.set_quick_stop(true);
				control.set_enable_operation(true);
			},
			// disable voltage
			StateTransition::_7
			| StateTransition::_9
			| StateTransition::_10
			| StateTransition::_12 => {},
			StateTransition::_11 => {
				control.set_enable_voltage(true);
			},
			StateTransition::_15 => {
				control.set_reset_fault(true);
			},
		}
		control
	}
}

impl fmt::Display for StateTransition {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "transition {}", self.number())
	}
}


/// reason why no transition can be selected for a pair of states
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransitionError {
	/// the requested state is the current state
	AlreadyReached(DriveState),
	/// no transition leads from the current state toward the requested one
	Unreachable {requested: DriveState, current: DriveState},
}

impl fmt::Display for TransitionError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::AlreadyReached(state) => write!(f, "drive state {} has already been reached", state),
			Self::Unreachable {requested, current} => write!(f, "no transition toward {} from {}", requested, current),
		}
	}
}
impl std::error::Error for TransitionError {}

use StateTransition::*;

/// next transition to perform, indexed by `[requested][current]` in [DriveState::STABLE] order
const TRANSITIONS: [[Option<StateTransition>; 6]; 6] = [
	//  SOD         RTSO        SO          OE          QSA         Fault
	[None,       Some(_7),   Some(_10),  Some(_9),   Some(_12),  Some(_15)],   // -> SwitchOnDisabled
	[Some(_2),   None,       Some(_6),   Some(_8),   Some(_12),  Some(_15)],   // -> ReadyToSwitchOn
	[Some(_2),   Some(_3),   None,       Some(_5),   Some(_12),  Some(_15)],   // -> SwitchedOn
	[Some(_2),   Some(_3),   Some(_4),   None,       Some(_12),  Some(_15)],   // -> OperationEnabled
	[Some(_2),   Some(_3),   Some(_4),   Some(_11),  None,       Some(_15)],   // -> QuickStopActive
	[None,       None,       None,       None,       None,       None],        // -> Fault
	];

/**
	select the transition bringing the drive one step closer to `requested` from `current`

	several calls may be needed to reach the requested state, each time with the state reached by the previous transition
*/
pub fn next_transition(requested: DriveState, current: DriveState) -> Result<StateTransition, TransitionError> {
	if requested == current
		{return Err(TransitionError::AlreadyReached(current))}
	requested.stable_index()
		.zip(current.stable_index())
		.and_then(|(r, c)| TRANSITIONS[r][c])
		.ok_or(TransitionError::Unreachable {requested, current})
}

/// control word to send for the next transition toward `requested`, see [next_transition]
pub fn next_transition_controlword(requested: DriveState, current: DriveState) -> Result<ControlWord, TransitionError> {
	next_transition(requested, current).map(StateTransition::controlword)
}

/**
	complete sequence of transitions leading from `current` to `requested`

	empty when the state is already reached
*/
pub fn transition_path(requested: DriveState, mut current: DriveState) -> Result<heapless::Vec<StateTransition, 6>, TransitionError> {
	let mut path = heapless::Vec::new();
	while current != requested {
		let transition = next_transition(requested, current)?;
		// the table never loops, so the longest path is Fault -> QuickStopActive
		path.push(transition)
			.map_err(|_| TransitionError::Unreachable {requested, current})?;
		current = transition.destination();
	}
	Ok(path)
}
