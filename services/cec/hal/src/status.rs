//! Driver status codes.
//!
//! Operations return `Result<_, HalError>`. `HalStatus` is the flat numeric
//! view a C-style caller expects, including `Success` and the transmit
//! outcomes.

use thiserror::Error;

/// Driver operation failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalError {
    /// No HAL instance is open
    #[error("not opened")]
    NotOpened,
    /// A HAL instance is already open
    #[error("already open")]
    AlreadyOpen,
    /// Handle does not name the open HAL instance
    #[error("invalid handle")]
    InvalidHandle,
    /// Argument outside the accepted range
    #[error("invalid argument")]
    InvalidArgument,
    /// Frame could not be sent
    #[error("sent failed")]
    SentFailed,
    /// Logical address was already removed
    #[error("logical address already removed")]
    AlreadyRemoved,
    /// Logical address was never added
    #[error("logical address not added")]
    NotAdded,
    /// Internal failure
    #[error("general error")]
    GeneralError,
    /// Requested logical address is held by another device
    #[error("logical address unavailable")]
    LogicalAddressUnavailable,
    /// Operation not supported by the emulated device
    #[error("operation not supported")]
    OperationNotSupported,
}

/// Outcome of a synchronous transmit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxResult {
    /// Frame was acknowledged by its destination
    SentAndAcked,
    /// Frame was sent but nobody acknowledged it
    SentButNotAcked,
}

/// Numeric driver status
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalStatus {
    /// Operation succeeded
    Success = 0,
    /// Frame sent and acknowledged
    SentAndAcked = 1,
    /// Frame sent, not acknowledged
    SentButNotAcked = 2,
    /// Frame could not be sent
    SentFailed = 3,
    /// Not opened
    NotOpened = 4,
    /// Invalid argument
    InvalidArgument = 5,
    /// Logical address unavailable
    LogicalAddressUnavailable = 6,
    /// General error
    GeneralError = 7,
    /// Already open
    AlreadyOpen = 8,
    /// Already removed
    AlreadyRemoved = 9,
    /// Invalid output
    InvalidOutput = 10,
    /// Invalid handle
    InvalidHandle = 11,
    /// Operation not supported
    OperationNotSupported = 12,
    /// Not added
    NotAdded = 13,
}

impl HalStatus {
    /// Raw status code
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<HalError> for HalStatus {
    fn from(error: HalError) -> Self {
        match error {
            HalError::NotOpened => HalStatus::NotOpened,
            HalError::AlreadyOpen => HalStatus::AlreadyOpen,
            HalError::InvalidHandle => HalStatus::InvalidHandle,
            HalError::InvalidArgument => HalStatus::InvalidArgument,
            HalError::SentFailed => HalStatus::SentFailed,
            HalError::AlreadyRemoved => HalStatus::AlreadyRemoved,
            HalError::NotAdded => HalStatus::NotAdded,
            HalError::GeneralError => HalStatus::GeneralError,
            HalError::LogicalAddressUnavailable => HalStatus::LogicalAddressUnavailable,
            HalError::OperationNotSupported => HalStatus::OperationNotSupported,
        }
    }
}

impl From<TxResult> for HalStatus {
    fn from(result: TxResult) -> Self {
        match result {
            TxResult::SentAndAcked => HalStatus::SentAndAcked,
            TxResult::SentButNotAcked => HalStatus::SentButNotAcked,
        }
    }
}

impl<T> From<&Result<T, HalError>> for HalStatus {
    fn from(result: &Result<T, HalError>) -> Self {
        match result {
            Ok(_) => HalStatus::Success,
            Err(e) => HalStatus::from(*e),
        }
    }
}
