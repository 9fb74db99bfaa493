//! sealbox: secure session and data-locking layer for tamper-resistant key stores
//!
//! Mediates every cryptographic and sensor operation between a host
//! application and a hardware secure element:
//! - Exclusive, explicitly closed sessions over an opaque frame transport
//! - Lock/unlock of buffers and files with device-held symmetric keys
//!   (verify-before-decrypt)
//! - ECDSA sign/verify against device key slots or caller-supplied keys
//! - Blocking, timeout-bounded waits for tap and perimeter breach events
//! - LED, i2c address and RTC pass-throughs
//!
//! All key material stays on the device. This layer composes device
//! primitives, validates inputs against the capabilities discovered at open,
//! and maps device status codes onto one error taxonomy.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
pub mod config;
pub mod events;
pub mod locker;
pub mod resolver;
pub mod session;
pub mod signer;

pub use config::SessionConfig;
pub use session::Session;
pub use signer::Signature;

pub use sealbox_core::b64;
pub use sealbox_core::{
    AccelAxis, AccelerometerData, AxisReading, ChannelState, CurveType, DeviceInfo, EventActions,
    KeyRef, KeySlot, LockedObject, PerimeterChannel, PerimeterEvent, SignatureEncoding,
    SymmetricKey, TapDirection,
};
pub use sealbox_hardware_hal::{Connector, Transport};

use sealbox_core::{CoreError, DeviceStatus};
use sealbox_hardware_hal::HardwareError;
use thiserror::Error;

/// Session layer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeError {
    /// Handle is closed or was invalidated by a device reset
    #[error("Session is not open")]
    SessionInvalid,

    /// Transport failure or unusable device
    #[error("Device unreachable: {0}")]
    DeviceUnreachable(String),

    /// Another session holds the device
    #[error("Device is owned by another session")]
    DeviceBusy,

    /// Caller input rejected before or by the device
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Locked object failed verification; nothing was decrypted
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Signature check returned false
    #[error("Signature verification returned false")]
    VerificationNegative,

    /// Event wait expired without an event
    #[error("Timed out waiting for event")]
    TimedOut,

    /// Not available on this device generation
    #[error("Unsupported on this device: {0}")]
    Unsupported(String),
}

impl SeError {
    /// Whether the caller has to open a new session before retrying
    pub fn requires_reopen(&self) -> bool {
        matches!(self, SeError::SessionInvalid | SeError::DeviceUnreachable(_))
    }
}

impl From<HardwareError> for SeError {
    fn from(err: HardwareError) -> Self {
        SeError::DeviceUnreachable(err.to_string())
    }
}

impl From<CoreError> for SeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Codec(msg) => SeError::DeviceUnreachable(format!("bad frame: {}", msg)),
            CoreError::MalformedObject(_) => SeError::AuthenticationFailed,
            CoreError::InvalidEncoding(msg) => SeError::InvalidArgument(msg),
        }
    }
}

impl From<DeviceStatus> for SeError {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Busy => SeError::DeviceBusy,
            DeviceStatus::NotOwner => SeError::SessionInvalid,
            DeviceStatus::InvalidArgument(msg) => SeError::InvalidArgument(msg),
            DeviceStatus::Unsupported(msg) => SeError::Unsupported(msg),
            DeviceStatus::TimedOut => SeError::TimedOut,
            DeviceStatus::Destroyed => SeError::DeviceUnreachable("key material destroyed".to_string()),
            DeviceStatus::Fault(msg) => SeError::DeviceUnreachable(msg),
        }
    }
}

impl From<std::io::Error> for SeError {
    fn from(err: std::io::Error) -> Self {
        SeError::InvalidArgument(err.to_string())
    }
}

/// Result type for session operations
pub type SeResult<T> = Result<T, SeError>;

/// Outcome of a signature check
///
/// A mismatch is a normal answer, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verification {
    /// Signature matches
    Valid,
    /// Signature does not match
    Invalid,
}

impl Verification {
    /// Whether the signature matched
    pub fn is_valid(self) -> bool {
        self == Verification::Valid
    }

    /// Turn a negative verdict into `SeError::VerificationNegative`
    pub fn into_result(self) -> SeResult<()> {
        match self {
            Verification::Valid => Ok(()),
            Verification::Invalid => Err(SeError::VerificationNegative),
        }
    }
}

impl From<bool> for Verification {
    fn from(valid: bool) -> Self {
        if valid {
            Verification::Valid
        } else {
            Verification::Invalid
        }
    }
}
