/*!
    Driver for CiA 402 servodrives on an ethercat bus, using CoE mailbox and process data.

    The ethercat master itself is abstracted by the [Bus] trait, a [Drive] only handles one slave:

    - preoperational configuration through the mailbox: state machine, PDO assignment, current limits
    - cyclic exchange of process data records, one write half and one read half per bus cycle
    - state changes either blocking through the mailbox, or stepped by the cyclic task
*/

pub mod data;
pub mod error;
pub mod sdo;
pub mod cia402;
pub mod bus;
pub mod pdo;
pub mod units;
pub mod command;
pub mod reading;
pub mod config;
mod drive;

pub use crate::data::PduData;
pub use crate::error::{BusError, BusResult, ErrorType};
pub use crate::sdo::{Sdo, SdoAbortCode};
pub use crate::cia402::{StatusWord, ControlWord, DriveState, StateTransition, OperationMode};
pub use crate::bus::{Bus, BusState, SdoRequest};
pub use crate::pdo::{RxPdoType, TxPdoType, PdoInfo};
pub use crate::command::{Command, RawCommand};
pub use crate::reading::Reading;
pub use crate::config::{Configuration, ConfigError};
pub use crate::drive::Drive;
