//! LED, i2c address and RTC pass-throughs

use crate::session::{unexpected, Session};
use crate::{SeError, SeResult};
use sealbox_core::protocol::{Command, Response};
use sealbox_hardware_hal::profile::is_valid_i2c_address;

impl Session {
    /// Turn the LED on
    pub fn led_on(&self) -> SeResult<()> {
        self.call_ok(Command::LedOn)
    }

    /// Turn the LED off; also stops flashing
    pub fn led_off(&self) -> SeResult<()> {
        self.call_ok(Command::LedOff)
    }

    /// Flash the LED `num_flashes` times, or until `led_off` when 0
    pub fn led_flash(&self, on_ms: u32, off_ms: u32, num_flashes: u32) -> SeResult<()> {
        self.call_ok(Command::LedFlash {
            on_ms,
            off_ms,
            num_flashes,
        })
    }

    /// Move the device to a new i2c address
    ///
    /// The device resets, so this session is closed afterwards and every
    /// later call fails with `SessionInvalid`. Open a new session at the new
    /// address.
    pub fn set_i2c_address(&self, address: u8) -> SeResult<()> {
        if !is_valid_i2c_address(address) {
            return Err(SeError::InvalidArgument(format!(
                "i2c address {:#04x} outside 0x30..=0x37 and 0x60..=0x67",
                address
            )));
        }
        self.call_ok(Command::SetI2cAddress { address })?;
        log::info!("Device moved to i2c address {:#04x}; session needs reopening", address);
        self.invalidate();
        Ok(())
    }

    /// RTC time in seconds since the Unix epoch
    ///
    /// With `precise` the device answers on the next second boundary, which
    /// may block for up to a second.
    pub fn get_time(&self, precise: bool) -> SeResult<u64> {
        match self.call(Command::GetTime { precise })? {
            Response::Time(secs) => Ok(secs),
            other => Err(unexpected("GetTime", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_hardware_hal::soft::{LedState, SoftSecureElement};
    use std::time::{Duration, Instant};

    #[test]
    fn test_led() {
        let device = SoftSecureElement::single_key();
        let session = Session::open(&device).unwrap();

        session.led_on().unwrap();
        assert_eq!(device.led_state().unwrap(), LedState::On);
        session.led_flash(100, 200, 3).unwrap();
        assert_eq!(
            device.led_state().unwrap(),
            LedState::Flashing { on_ms: 100, off_ms: 200, cycles: Some(3) }
        );
        session.led_off().unwrap();
        assert_eq!(device.led_state().unwrap(), LedState::Off);
    }

    #[test]
    fn test_i2c_address_change_closes_session() {
        let device = SoftSecureElement::single_key();
        let session = Session::open(&device).unwrap();

        assert!(matches!(session.set_i2c_address(0x40), Err(SeError::InvalidArgument(_))));
        assert!(session.is_open());

        session.set_i2c_address(0x62).unwrap();
        assert!(!session.is_open());
        assert_eq!(session.led_on(), Err(SeError::SessionInvalid));

        let reopened = Session::open(&device).unwrap();
        assert_eq!(reopened.info().i2c_address, 0x62);
    }

    #[test]
    fn test_time() {
        let device = SoftSecureElement::single_key();
        let session = Session::open(&device).unwrap();

        let coarse = session.get_time(false).unwrap();
        assert!(coarse > 1_600_000_000);

        let start = Instant::now();
        let precise = session.get_time(true).unwrap();
        assert!(precise >= coarse);
        assert!(start.elapsed() <= Duration::from_millis(1100));
    }
}
