//! Command/response frames exchanged with the secure element
//!
//! Every host request is one `Command` frame and every device reply is one
//! `Response` frame. Frames are serialized with bincode; the transport treats
//! them as opaque bytes.

use crate::types::*;
use crate::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Length of the CTR initialisation vector used by lock operations
pub const LOCK_IV_LEN: usize = 16;

/// Length of the authentication tag appended to locked objects
pub const LOCK_TAG_LEN: usize = 32;

/// Asynchronous event classes a host can wait on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventClass {
    /// Accelerometer tap
    Tap,
    /// Perimeter breach on a channel configured to notify the host
    Perimeter,
}

/// Host-to-device request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Take exclusive ownership of the device
    Claim,
    /// Give up ownership
    Release,
    /// Report model and capabilities
    GetInfo,
    /// Draw bytes from the device TRNG
    GetRandom {
        /// Number of bytes
        len: u32,
    },
    /// Encrypt with a device-held symmetric key
    Encrypt {
        /// Key selector
        key: SymmetricKey,
        /// CTR initialisation vector
        iv: [u8; LOCK_IV_LEN],
        /// Plaintext
        data: Vec<u8>,
    },
    /// Decrypt with a device-held symmetric key
    Decrypt {
        /// Key selector
        key: SymmetricKey,
        /// CTR initialisation vector
        iv: [u8; LOCK_IV_LEN],
        /// Ciphertext
        data: Vec<u8>,
    },
    /// Compute an authentication tag with a device-held key
    Mac {
        /// Key selector
        key: SymmetricKey,
        /// Authenticated bytes
        data: Vec<u8>,
    },
    /// Check an authentication tag with a device-held key
    VerifyMac {
        /// Key selector
        key: SymmetricKey,
        /// Authenticated bytes
        data: Vec<u8>,
        /// Tag to check
        tag: [u8; LOCK_TAG_LEN],
    },
    /// ECDSA-sign a digest with a device key pair
    Sign {
        /// Key slot
        slot: u8,
        /// Digest
        digest: Vec<u8>,
    },
    /// Verify a raw signature against a device public key
    Verify {
        /// Key slot
        slot: u8,
        /// Digest
        digest: Vec<u8>,
        /// Raw `r || s` signature
        signature: Vec<u8>,
    },
    /// Verify a raw signature against a caller-supplied public key
    VerifyForeign {
        /// Curve of the public key
        curve: CurveType,
        /// Uncompressed SEC1 public key
        public_key: Vec<u8>,
        /// Digest
        digest: Vec<u8>,
        /// Raw `r || s` signature
        signature: Vec<u8>,
    },
    /// Read the uncompressed public key of a slot
    GetPublicKey {
        /// Key slot
        slot: u8,
    },
    /// Turn the LED off
    LedOff,
    /// Turn the LED on
    LedOn,
    /// Flash the LED
    LedFlash {
        /// On time per cycle in milliseconds
        on_ms: u32,
        /// Off time per cycle in milliseconds
        off_ms: u32,
        /// Number of cycles, 0 for indefinitely
        num_flashes: u32,
    },
    /// Move the device to a new i2c address and reset it
    SetI2cAddress {
        /// New address
        address: u8,
    },
    /// Read the RTC
    GetTime {
        /// Wait for the next second boundary before answering
        precise: bool,
    },
    /// Configure tap sensitivity
    SetTapSensitivity {
        /// Axis selector
        axis: AccelAxis,
        /// Sensitivity percentage, 0 disables the axis
        percent: f32,
    },
    /// Read the latest accelerometer snapshot
    GetAccelerometer,
    /// Configure the breach actions of a perimeter channel
    SetPerimeterAction {
        /// Channel index
        channel: u8,
        /// `EventActions` bits
        actions: u32,
    },
    /// Block until an event of the given class is pending or the timeout expires
    WaitForEvent {
        /// Event class
        class: EventClass,
        /// Timeout in milliseconds, 0 polls
        timeout_ms: u32,
    },
    /// Read latched perimeter events
    GetPerimeterEvents,
    /// Clear latched perimeter events and re-arm every channel
    ClearPerimeterEvents,
    /// Read the state of every perimeter channel
    GetPerimeterStates,
}

impl Command {
    /// Short opcode name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Claim => "claim",
            Command::Release => "release",
            Command::GetInfo => "get-info",
            Command::GetRandom { .. } => "get-random",
            Command::Encrypt { .. } => "encrypt",
            Command::Decrypt { .. } => "decrypt",
            Command::Mac { .. } => "mac",
            Command::VerifyMac { .. } => "verify-mac",
            Command::Sign { .. } => "sign",
            Command::Verify { .. } => "verify",
            Command::VerifyForeign { .. } => "verify-foreign",
            Command::GetPublicKey { .. } => "get-public-key",
            Command::LedOff => "led-off",
            Command::LedOn => "led-on",
            Command::LedFlash { .. } => "led-flash",
            Command::SetI2cAddress { .. } => "set-i2c-address",
            Command::GetTime { .. } => "get-time",
            Command::SetTapSensitivity { .. } => "set-tap-sensitivity",
            Command::GetAccelerometer => "get-accelerometer",
            Command::SetPerimeterAction { .. } => "set-perimeter-action",
            Command::WaitForEvent { .. } => "wait-for-event",
            Command::GetPerimeterEvents => "get-perimeter-events",
            Command::ClearPerimeterEvents => "clear-perimeter-events",
            Command::GetPerimeterStates => "get-perimeter-states",
        }
    }
}

/// Status codes a device returns instead of a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// Another connection owns the device
    Busy,
    /// The sending connection does not own the device
    NotOwner,
    /// A parameter was rejected
    InvalidArgument(String),
    /// The operation is not available on this model
    Unsupported(String),
    /// An event wait expired without an event
    TimedOut,
    /// Key material was destroyed by a tamper response
    Destroyed,
    /// Internal device failure
    Fault(String),
}

/// Device-to-host reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Command completed with nothing to report
    Ok,
    /// Device capabilities
    Info(DeviceInfo),
    /// Byte payload (random data, ciphertext, tag, signature, public key)
    Bytes(Vec<u8>),
    /// Result of a tag or signature check
    Verified(bool),
    /// RTC reading in Unix epoch seconds
    Time(u64),
    /// Accelerometer snapshot
    Accelerometer(AccelerometerData),
    /// Latched perimeter events, oldest first
    PerimeterEvents(Vec<PerimeterEvent>),
    /// Per-channel perimeter state
    ChannelStates(Vec<ChannelState>),
    /// An awaited event was observed
    Event,
    /// Command failed
    Error(DeviceStatus),
}

/// Encode a command frame
pub fn encode_command(command: &Command) -> CoreResult<Vec<u8>> {
    bincode::serialize(command).map_err(|e| CoreError::Codec(e.to_string()))
}

/// Decode a command frame
pub fn decode_command(frame: &[u8]) -> CoreResult<Command> {
    bincode::deserialize(frame).map_err(|e| CoreError::Codec(e.to_string()))
}

/// Encode a response frame
pub fn encode_response(response: &Response) -> CoreResult<Vec<u8>> {
    bincode::serialize(response).map_err(|e| CoreError::Codec(e.to_string()))
}

/// Decode a response frame
pub fn decode_response(frame: &[u8]) -> CoreResult<Response> {
    bincode::deserialize(frame).map_err(|e| CoreError::Codec(e.to_string()))
}
