//! Hardware Abstraction Layer for sealbox
//!
//! Provides the boundary between the session layer and a secure element:
//! - `Transport`/`Connector` traits carrying opaque command and response frames
//! - Device profiles describing what a hardware generation supports
//! - Zeroizing secure memory for device-held secrets
//! - A software secure element implementing the device side of every command

#![warn(missing_docs)]

pub mod memory;
pub mod profile;
pub mod traits;

#[cfg(feature = "soft-se")]
pub mod soft;

pub use profile::{DeviceFeatures, DeviceProfile};
pub use traits::*;

use thiserror::Error;

/// Hardware abstraction errors
#[derive(Error, Debug)]
pub enum HardwareError {
    /// Frame exchange with the device failed
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Device is not present on the bus
    #[error("Device disconnected")]
    Disconnected,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device internal state is unusable
    #[error("Hardware fault detected: {0}")]
    HardwareFault(String),
}

/// Result type for hardware operations
pub type HardwareResult<T> = Result<T, HardwareError>;
