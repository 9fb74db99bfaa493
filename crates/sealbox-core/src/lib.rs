//! Sealbox Core
//!
//! Types shared between the host-side session layer and the secure element:
//! - Key references, ECDSA slots and curve selectors
//! - Sensor readings, perimeter event records and event action flags
//! - The command/response wire codec spoken over a transport
//! - The locked-object container produced by the data locker
//! - A standard-alphabet base64 helper for moving binary payloads through text

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod b64;
pub mod locked;
pub mod protocol;
pub mod types;

pub use locked::LockedObject;
pub use protocol::{Command, DeviceStatus, EventClass, Response};
pub use types::*;

use thiserror::Error;

/// Errors raised while encoding or parsing sealbox data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A command or response frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// A locked object is truncated or carries an unknown header
    #[error("Malformed locked object: {0}")]
    MalformedObject(String),

    /// Text or binary input is not in the expected encoding
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::MalformedObject("too short".to_string());
        assert_eq!(err.to_string(), "Malformed locked object: too short");
    }
}
