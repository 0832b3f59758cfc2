//! definition of the bus error type, and of the error kinds a drive reports in its readings

use std::sync::Arc;
use core::fmt;
use thiserror::Error;

/**
    general object reporting an unexpected result of an operation performed through the bus

    Its variant are meant to help finding the cause responsible for the problem and how to deal with it.

    [Self::Slave] variant should not be used without an appropriate type for `T`, `T` depend on the operation the drive reports for, and is usually an error code such as [crate::sdo::SdoAbortCode].
*/
#[derive(Clone, Debug)]
pub enum BusError<T=()> {
    /// error caused by communication support
    ///
    /// these errors are exterior to this library
    Io(Arc<std::io::Error>),

    /// error reported by the drive, its type depend on the operation returning this error
    ///
    /// these errors can generally be handled and fixed by retrying the operation or reconfiguring the drive
    Slave(T),

    /// error reported by the master
    ///
    /// these errors can generally be handled and fixed by retrying the operation or using the master differently when the issue is in the user code
    Master(&'static str),

    /// error detected by the master in the ethercat communication
    ///
    /// these errors can generally not be fixed and the whole communication has to be restarted
    Protocol(&'static str),

    /// error is due to too much time elapsed, but does not compromise the communication
    ///
    /// these errors are generally contextual and the operation can be retried.
    Timeout(&'static str),
}

/// convenient alias to simplify return annotations
pub type BusResult<T=(), E=()> = core::result::Result<T, BusError<E>>;

impl<T: fmt::Debug> fmt::Display for BusError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(error) => write!(f, "io: {}", error),
            Self::Slave(value) => write!(f, "slave: {:?}", value),
            Self::Master(message) => write!(f, "master: {}", message),
            Self::Protocol(message) => write!(f, "protocol: {}", message),
            Self::Timeout(message) => write!(f, "timeout: {}", message),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for BusError<T> {}

impl<T> From<std::io::Error> for BusError<T> {
    fn from(src: std::io::Error) -> Self {
        BusError::Io(Arc::new(src))
    }
}

impl<T> From<crate::data::PackingError> for BusError<T> {
    fn from(src: crate::data::PackingError) -> Self {
        BusError::Protocol(match src {
            crate::data::PackingError::BadSize(_, text) => text,
            crate::data::PackingError::InvalidValue(text) => text,
        })
    }
}

/**
    kinds of failures a drive records into its [crate::Reading]

    None of these interrupt the caller: the cyclic path keeps running, and the configuration path aggregates them into a boolean.
*/
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Error)]
pub enum ErrorType {
    /// cyclic write attempted before any mode of operation was set
    #[error("mode of operation has not been set")]
    ModeOfOperationError,
    /// rx record type is NA or not supported
    #[error("unsupported rx pdo type")]
    RxPdoTypeError,
    /// tx record type is NA or not supported
    #[error("unsupported tx pdo type")]
    TxPdoTypeError,
    /// rx pdo assignment failed or was requested for NA
    #[error("rx pdo mapping failed")]
    PdoMappingError,
    /// tx pdo assignment failed or was requested for NA
    #[error("tx pdo mapping failed")]
    TxPdoMappingError,
    /// no transition, or a failed controlword write, on the mailbox path
    #[error("state transition via sdo failed")]
    SdoStateTransitionError,
    /// no transition available on the cyclic path
    #[error("state transition via pdo failed")]
    PdoStateTransitionError,
    /// a step of the preoperational configuration failed
    #[error("hardware configuration failed")]
    ConfigurationError,
    /// the drive is in fault but its error code could not be read
    #[error("error code could not be read")]
    ErrorReadingError,
}
