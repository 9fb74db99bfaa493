//! Key Material Resolver
//!
//! Decides which device key an operation uses and checks slot and channel
//! indices against the capabilities the device reported at open.

use crate::{SeError, SeResult};
use sealbox_core::{DeviceInfo, KeyRef, KeySlot, PerimeterChannel, SymmetricKey};

/// Symmetric key for a lock/unlock operation
///
/// Slots name ECDSA key pairs and cannot lock data.
pub fn symmetric_key(key: KeyRef) -> SeResult<SymmetricKey> {
    match key {
        KeyRef::OneWay => Ok(SymmetricKey::OneWay),
        KeyRef::Shared => Ok(SymmetricKey::Shared),
        KeyRef::Slot(slot) => Err(SeError::InvalidArgument(format!(
            "key slot {} holds a signing key, not a locking key",
            slot.index()
        ))),
    }
}

/// Device slot index for a signing operation
///
/// Slot 0 is always accepted. Any other slot needs multi-slot hardware and
/// must be below the reported slot count.
pub fn slot_index(info: &DeviceInfo, slot: KeySlot) -> SeResult<u8> {
    let index = slot.index();
    if index == 0 {
        return Ok(0);
    }
    if !info.supports_slots() {
        return Err(SeError::Unsupported(format!(
            "{} has a single key pair, slot {} requested",
            info.model, index
        )));
    }
    if index >= info.key_slots {
        return Err(SeError::InvalidArgument(format!(
            "slot {} out of range, device has {} slots",
            index, info.key_slots
        )));
    }
    Ok(index)
}

/// Device channel index for a perimeter operation
pub fn channel_index(info: &DeviceInfo, channel: PerimeterChannel) -> SeResult<u8> {
    if channel.0 >= info.perimeter_channels {
        return Err(SeError::InvalidArgument(format!(
            "perimeter channel {} out of range, device has {}",
            channel.0, info.perimeter_channels
        )));
    }
    Ok(channel.0)
}
