//! Radio error types and handling

use std::fmt;

/// Result/status codes for radio operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// No frame arrived within the receive window
    Timeout,
    /// Frame received but not addressed to this node or not from this network
    WrongAddress,
    /// One or more parameters were invalid (oversized payload, empty buffer)
    InvalidParam,
    /// Identity lookup failed at startup
    DeviceNotFound,
    /// Radio not initialized
    NotInitialized,
    /// Radio initialized but configuration failed
    NotConfigured,
    /// Radio or resource is busy
    Busy,
    /// Communication failure
    CommError,
    /// Frame larger than the receive buffer
    MemoryError,
}

impl RadioError {
    /// Timeouts and misaddressed frames are part of normal operation; the
    /// surrounding loop simply runs again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RadioError::DeviceNotFound | RadioError::NotInitialized | RadioError::NotConfigured
        )
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::Timeout => write!(f, "receive timed out"),
            RadioError::WrongAddress => write!(f, "frame not addressed to this node"),
            RadioError::InvalidParam => write!(f, "invalid parameter"),
            RadioError::DeviceNotFound => write!(f, "device identity not found"),
            RadioError::NotInitialized => write!(f, "radio not initialized"),
            RadioError::NotConfigured => write!(f, "radio configuration failed"),
            RadioError::Busy => write!(f, "radio busy"),
            RadioError::CommError => write!(f, "communication failure"),
            RadioError::MemoryError => write!(f, "frame exceeds receive buffer"),
        }
    }
}

impl std::error::Error for RadioError {}

/// Result type for radio operations
pub type RadioResult<T> = Result<T, RadioError>;
