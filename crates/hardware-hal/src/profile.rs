//! Device profiles
//!
//! A profile captures what one hardware generation can do. The session layer
//! never sees a profile directly; it sees the `DeviceInfo` the device builds
//! from it when a session opens.

use sealbox_core::DeviceInfo;
use serde::{Deserialize, Serialize};

/// Digest length accepted by every current generation (SHA-256)
pub const DIGEST_LEN: u16 = 32;

/// Factory i2c address
pub const DEFAULT_I2C_ADDRESS: u8 = 0x30;

/// Largest number of ECDSA key slots any generation carries
pub const MAX_KEY_SLOTS: u8 = 16;

/// Random-byte request limit of current generations
pub const DEFAULT_MAX_RANDOM_REQUEST: u32 = 4096;

/// Feature flags for a hardware generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFeatures {
    /// Hardware random number generator
    pub has_trng: bool,
    /// Accelerometer with tap detection
    pub has_accelerometer: bool,
    /// Battery-backed real time clock
    pub has_rtc: bool,
    /// Perimeter breach detection
    pub has_tamper_detection: bool,
    /// i2c address can be reprogrammed
    pub has_i2c_address_select: bool,
}

/// Capabilities of a hardware generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Model name
    pub model: String,
    /// Firmware version
    pub firmware_version: String,
    /// ECDSA key pairs
    pub key_slots: u8,
    /// Perimeter detect channels
    pub perimeter_channels: u8,
    /// Largest single random-byte request
    pub max_random_request: u32,
    /// Supported features
    pub features: DeviceFeatures,
}

impl DeviceProfile {
    /// Single-key generation: one ECDSA key pair, two perimeter channels
    pub fn single_key() -> Self {
        DeviceProfile {
            model: "SBX-3".to_string(),
            firmware_version: "3.0.14".to_string(),
            key_slots: 1,
            perimeter_channels: 2,
            max_random_request: DEFAULT_MAX_RANDOM_REQUEST,
            features: DeviceFeatures {
                has_trng: true,
                has_accelerometer: true,
                has_rtc: true,
                has_tamper_detection: true,
                has_i2c_address_select: true,
            },
        }
    }

    /// Multi-slot generation with `slots` ECDSA key pairs (clamped to 2..=16)
    pub fn multi_slot(slots: u8) -> Self {
        DeviceProfile {
            model: "SBX-6".to_string(),
            firmware_version: "6.2.1".to_string(),
            key_slots: slots.clamp(2, MAX_KEY_SLOTS),
            ..DeviceProfile::single_key()
        }
    }

    /// Whether the generation exposes more than one key pair
    pub fn supports_slots(&self) -> bool {
        self.key_slots > 1
    }

    /// Capability record reported to the host
    pub fn device_info(&self, serial: [u8; 16], i2c_address: u8) -> DeviceInfo {
        DeviceInfo {
            model: self.model.clone(),
            firmware_version: self.firmware_version.clone(),
            serial,
            key_slots: self.key_slots,
            perimeter_channels: self.perimeter_channels,
            digest_len: DIGEST_LEN,
            max_random_request: self.max_random_request,
            i2c_address,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::single_key()
    }
}

/// Whether `address` is one the device can be moved to
pub fn is_valid_i2c_address(address: u8) -> bool {
    matches!(address, 0x30..=0x37 | 0x60..=0x67)
}
