//! Core types for the sealbox protocol

use serde::{Deserialize, Serialize};

/// Length of the uncompressed SEC1 encoding of a 256-bit curve point
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Leading byte of an uncompressed SEC1 point
pub const UNCOMPRESSED_POINT_MARKER: u8 = 0x04;

/// Width of a raw `r || s` ECDSA signature over a 256-bit curve
pub const RAW_SIGNATURE_LEN: usize = 64;

/// Symmetric device key used for locking and unlocking data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymmetricKey {
    /// Host-local key; objects locked with it only unlock on the same device
    OneWay,
    /// Key that a separately provisioned remote party can reproduce
    Shared,
}

impl SymmetricKey {
    /// Tag byte recorded in a locked object header
    pub fn tag(self) -> u8 {
        match self {
            SymmetricKey::OneWay => 0x01,
            SymmetricKey::Shared => 0x02,
        }
    }

    /// Parse a header tag byte
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(SymmetricKey::OneWay),
            0x02 => Some(SymmetricKey::Shared),
            _ => None,
        }
    }
}

/// Index of a device-resident ECDSA key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeySlot(pub u8);

impl KeySlot {
    /// The only slot available on single-key hardware
    pub const DEFAULT: KeySlot = KeySlot(0);

    /// Get the underlying index
    pub fn index(&self) -> u8 {
        self.0
    }
}

impl From<u8> for KeySlot {
    fn from(index: u8) -> Self {
        KeySlot(index)
    }
}

/// Reference to the key an operation should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRef {
    /// Non-exportable host-local key
    OneWay,
    /// Key interoperable with a trusted remote party
    Shared,
    /// ECDSA key pair slot (multi-slot hardware only)
    Slot(KeySlot),
}

impl From<SymmetricKey> for KeyRef {
    fn from(key: SymmetricKey) -> Self {
        match key {
            SymmetricKey::OneWay => KeyRef::OneWay,
            SymmetricKey::Shared => KeyRef::Shared,
        }
    }
}

/// Curve families accepted for foreign-key verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    /// NIST P-256 (secp256r1)
    NistP256,
    /// secp256k1
    Secp256k1,
}

/// Encoding of a signature handed to a verify call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureEncoding {
    /// Fixed-width big-endian `r || s`
    Raw,
    /// ASN.1 DER `SEQUENCE { r INTEGER, s INTEGER }`
    Der,
}

/// Accelerometer axis selector for tap sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccelAxis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
    /// All three axes at once
    All,
}

impl AccelAxis {
    /// Axis indices (0 = x, 1 = y, 2 = z) covered by this selector
    pub fn indices(self) -> &'static [usize] {
        match self {
            AccelAxis::X => &[0],
            AccelAxis::Y => &[1],
            AccelAxis::Z => &[2],
            AccelAxis::All => &[0, 1, 2],
        }
    }
}

/// Direction of the force that caused a tap along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TapDirection {
    /// Force along the negative axis
    Negative,
    /// Force along the positive axis
    Positive,
    /// Axis did not cause a tap event
    #[default]
    None,
}

impl TapDirection {
    /// Signed representation: -1, +1 or 0
    pub fn as_i8(self) -> i8 {
        match self {
            TapDirection::Negative => -1,
            TapDirection::Positive => 1,
            TapDirection::None => 0,
        }
    }
}

/// Reading for a single accelerometer axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisReading {
    /// Axis reading in units of g-force
    pub g_force: f64,
    /// Tap direction attributed to this axis
    pub tap_direction: TapDirection,
}

/// Most recent accelerometer snapshot
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccelerometerData {
    /// X axis
    pub x: AxisReading,
    /// Y axis
    pub y: AxisReading,
    /// Z axis
    pub z: AxisReading,
}

impl AccelerometerData {
    /// Mutable access by axis index (0 = x, 1 = y, 2 = z)
    pub fn axis_mut(&mut self, index: usize) -> Option<&mut AxisReading> {
        match index {
            0 => Some(&mut self.x),
            1 => Some(&mut self.y),
            2 => Some(&mut self.z),
            _ => None,
        }
    }
}

/// Perimeter detect channel index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PerimeterChannel(pub u8);

/// A latched perimeter breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerimeterEvent {
    /// Channel that detected the breach
    pub channel: PerimeterChannel,
    /// Device RTC time of the breach (Unix epoch seconds)
    pub timestamp: u64,
}

bitflags::bitflags! {
    /// Actions a perimeter channel takes when it detects a breach
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventActions: u32 {
        /// Wake host-side perimeter waits
        const NOTIFY_HOST = 1 << 0;
        /// Destroy device key material
        const SELF_DESTRUCT = 1 << 1;
    }
}

/// Event channel state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    /// No actions configured
    Idle,
    /// At least one action configured, no breach latched
    Armed,
    /// A breach has been latched and awaits a clear
    Triggered,
}

/// Capabilities reported by the device when a session opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Model name
    pub model: String,
    /// Firmware version
    pub firmware_version: String,
    /// Hardware serial number
    pub serial: [u8; 16],
    /// Number of ECDSA key slots (1 on single-key hardware)
    pub key_slots: u8,
    /// Number of perimeter detect channels
    pub perimeter_channels: u8,
    /// Digest length accepted by sign/verify
    pub digest_len: u16,
    /// Largest random-byte request the device serves in one frame
    pub max_random_request: u32,
    /// Current i2c bus address
    pub i2c_address: u8,
}

impl DeviceInfo {
    /// Whether the hardware exposes more than one ECDSA key pair
    pub fn supports_slots(&self) -> bool {
        self.key_slots > 1
    }

    /// Serial number as upper-case hex
    pub fn serial_hex(&self) -> String {
        self.serial.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_key_tags() {
        assert_eq!(SymmetricKey::from_tag(SymmetricKey::OneWay.tag()), Some(SymmetricKey::OneWay));
        assert_eq!(SymmetricKey::from_tag(SymmetricKey::Shared.tag()), Some(SymmetricKey::Shared));
        assert_eq!(SymmetricKey::from_tag(0x00), None);
        assert_eq!(SymmetricKey::from_tag(0x7F), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(KeySlot::from(3u8), KeySlot(3));
        assert_eq!(KeySlot::from(0u8), KeySlot::DEFAULT);
        assert_eq!(KeyRef::from(SymmetricKey::OneWay), KeyRef::OneWay);
        assert_eq!(KeyRef::from(SymmetricKey::Shared), KeyRef::Shared);

        assert_eq!(TapDirection::Negative.as_i8(), -1);
        assert_eq!(TapDirection::Positive.as_i8(), 1);
        assert_eq!(TapDirection::default().as_i8(), 0);
    }

    #[test]
    fn test_event_action_bits() {
        // Bit values are fixed by the device firmware
        assert_eq!(EventActions::NOTIFY_HOST.bits(), 1);
        assert_eq!(EventActions::SELF_DESTRUCT.bits(), 2);

        let both = EventActions::NOTIFY_HOST | EventActions::SELF_DESTRUCT;
        assert_eq!(EventActions::from_bits_truncate(both.bits() | 0x80), both);
        assert!(EventActions::default().is_empty());
    }

    #[test]
    fn test_axis_indices() {
        assert_eq!(AccelAxis::All.indices(), &[0, 1, 2]);
        assert_eq!(AccelAxis::Y.indices(), &[1]);

        let mut data = AccelerometerData::default();
        data.axis_mut(2).unwrap().g_force = 1.0;
        assert_eq!(data.z.g_force, 1.0);
        assert!(data.axis_mut(3).is_none());
    }

    #[test]
    fn test_device_info_slots() {
        let mut info = DeviceInfo {
            model: "SBX-3".to_string(),
            firmware_version: "1.0.0".to_string(),
            serial: [0xAB; 16],
            key_slots: 1,
            perimeter_channels: 2,
            digest_len: 32,
            max_random_request: 4096,
            i2c_address: 0x30,
        };
        assert!(!info.supports_slots());
        assert_eq!(&info.serial_hex()[..4], "ABAB");

        info.key_slots = 16;
        assert!(info.supports_slots());
    }
}
