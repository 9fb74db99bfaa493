//! Software Secure Element
//!
//! A complete device-side implementation of the sealbox command set, backed
//! by host memory instead of silicon. It behaves like the hardware at the
//! frame level:
//! - one connection at a time may hold the ownership claim
//! - symmetric and ECDSA keys are generated at power-up and never exported
//! - tap and perimeter events arrive asynchronously via `inject_tap`/`breach`
//! - an i2c address change resets the device and drops the claim
//! - a breach on a self-destruct channel wipes every key
//!
//! Used as the reference device for tests and benchmarks.

mod keystore;
mod sensors;

pub use sensors::{BreachOutcome, DEFAULT_TAP_SENSITIVITY, TAP_FULL_SCALE_G};

use crate::profile::{is_valid_i2c_address, DEFAULT_I2C_ADDRESS};
use crate::{Connector, DeviceProfile, HardwareError, HardwareResult, Transport};
use keystore::KeyStore;
use rand_core::{OsRng, RngCore};
use sealbox_core::protocol::{self, Command, DeviceStatus, EventClass, Response};
use sealbox_core::EventActions;
use sensors::SensorState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// LED output state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    /// Dark
    Off,
    /// Solid on
    On,
    /// Flashing
    Flashing {
        /// On time per cycle in milliseconds
        on_ms: u32,
        /// Off time per cycle in milliseconds
        off_ms: u32,
        /// Cycles requested, `None` for indefinitely
        cycles: Option<u32>,
    },
}

struct DeviceState {
    profile: DeviceProfile,
    serial: [u8; 16],
    reachable: bool,
    owner: Option<u64>,
    keys: KeyStore,
    sensors: SensorState,
    led: LedState,
    i2c_address: u8,
    destroyed: bool,
    resets: u32,
}

struct Shared {
    state: Mutex<DeviceState>,
    events: Condvar,
    next_connection: AtomicU64,
}

/// Software secure element
///
/// Cloning yields another handle to the same device.
#[derive(Clone)]
pub struct SoftSecureElement {
    shared: Arc<Shared>,
}

impl SoftSecureElement {
    /// Power up a device of the given generation with fresh keys
    pub fn new(profile: DeviceProfile) -> Self {
        let mut serial = [0u8; 16];
        OsRng.fill_bytes(&mut serial);

        let state = DeviceState {
            keys: KeyStore::generate(profile.key_slots),
            sensors: SensorState::new(profile.perimeter_channels),
            profile,
            serial,
            reachable: true,
            owner: None,
            led: LedState::Off,
            i2c_address: DEFAULT_I2C_ADDRESS,
            destroyed: false,
            resets: 0,
        };

        log::info!("Software secure element powered up ({})", state.profile.model);

        SoftSecureElement {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                events: Condvar::new(),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Single-key generation
    pub fn single_key() -> Self {
        Self::new(DeviceProfile::single_key())
    }

    /// Multi-slot generation
    pub fn multi_slot(slots: u8) -> Self {
        Self::new(DeviceProfile::multi_slot(slots))
    }

    fn lock(&self) -> HardwareResult<MutexGuard<'_, DeviceState>> {
        self.shared
            .state
            .lock()
            .map_err(|_| HardwareError::HardwareFault("device state poisoned".to_string()))
    }

    /// Provision the shared-key secret agreed with a remote party
    pub fn provision_shared_secret(&self, secret: &[u8; 32]) -> HardwareResult<()> {
        self.lock()?
            .keys
            .set_shared_secret(secret)
            .map_err(|status| HardwareError::HardwareFault(format!("{:?}", status)))
    }

    /// Plug or unplug the device
    pub fn set_reachable(&self, reachable: bool) -> HardwareResult<()> {
        let mut state = self.lock()?;
        state.reachable = reachable;
        if !reachable {
            state.owner = None;
            drop(state);
            // Blocked waits fail with Disconnected
            self.shared.events.notify_all();
        }
        Ok(())
    }

    /// Feed an accelerometer sample on one axis (0 = x, 1 = y, 2 = z)
    ///
    /// Returns true when the sample registered as a tap.
    pub fn inject_tap(&self, axis: usize, g_force: f64) -> HardwareResult<bool> {
        if axis > 2 {
            return Err(HardwareError::InvalidParameter(format!("axis {}", axis)));
        }
        let detected = self.lock()?.sensors.record_tap(axis, g_force);
        if detected {
            self.shared.events.notify_all();
        }
        Ok(detected)
    }

    /// Signal a physical breach on a perimeter channel
    pub fn breach(&self, channel: u8) -> HardwareResult<BreachOutcome> {
        let mut state = self.lock()?;
        if channel as usize >= state.sensors.channel_count() {
            return Err(HardwareError::InvalidParameter(format!("perimeter channel {}", channel)));
        }

        let outcome = state.sensors.record_breach(channel as usize, now_secs());
        if outcome.self_destruct {
            log::warn!("Perimeter channel {} breached: destroying key material", channel);
            state.keys.destroy();
            state.destroyed = true;
        }
        drop(state);

        if outcome.notify {
            self.shared.events.notify_all();
        }
        Ok(outcome)
    }

    /// Current LED output
    pub fn led_state(&self) -> HardwareResult<LedState> {
        Ok(self.lock()?.led)
    }

    /// Current i2c address
    pub fn i2c_address(&self) -> HardwareResult<u8> {
        Ok(self.lock()?.i2c_address)
    }

    /// Number of resets since power-up
    pub fn reset_count(&self) -> HardwareResult<u32> {
        Ok(self.lock()?.resets)
    }

    /// Whether a tamper response destroyed the keys
    pub fn is_destroyed(&self) -> HardwareResult<bool> {
        Ok(self.lock()?.destroyed)
    }

    /// Whether some connection holds the ownership claim
    pub fn is_claimed(&self) -> HardwareResult<bool> {
        Ok(self.lock()?.owner.is_some())
    }

    fn execute(&self, connection: u64, command: Command) -> HardwareResult<Response> {
        let mut state = self.lock()?;
        if !state.reachable {
            return Err(HardwareError::Disconnected);
        }

        if let Command::Claim = command {
            return Ok(match state.owner {
                Some(owner) if owner != connection => Response::Error(DeviceStatus::Busy),
                _ => {
                    state.owner = Some(connection);
                    Response::Ok
                }
            });
        }

        if state.owner != Some(connection) {
            return Ok(Response::Error(DeviceStatus::NotOwner));
        }

        match command {
            Command::WaitForEvent { class, timeout_ms } => self.wait_for_event(state, class, timeout_ms),
            Command::GetTime { precise } => {
                if !state.profile.features.has_rtc {
                    return Ok(unsupported("real time clock"));
                }
                drop(state);
                if precise {
                    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
                    std::thread::sleep(Duration::from_secs(1) - Duration::from_nanos(now.subsec_nanos() as u64));
                }
                Ok(Response::Time(now_secs()))
            }
            other => Ok(state.apply(other)),
        }
    }

    /// Block on the event condition until `class` has a pending notification
    /// or the timeout elapses
    ///
    /// The pending check after the wait runs under the state lock, so an event
    /// that landed at the deadline is still observed.
    fn wait_for_event(
        &self,
        state: MutexGuard<'_, DeviceState>,
        class: EventClass,
        timeout_ms: u32,
    ) -> HardwareResult<Response> {
        if let Some(status) = state.event_support(class) {
            return Ok(Response::Error(status));
        }

        let mut state = if timeout_ms == 0 {
            state
        } else {
            let (guard, _) = self
                .shared
                .events
                .wait_timeout_while(state, Duration::from_millis(u64::from(timeout_ms)), |s| {
                    s.reachable && !s.sensors.has_pending(class)
                })
                .map_err(|_| HardwareError::HardwareFault("device state poisoned".to_string()))?;
            guard
        };

        if !state.reachable {
            return Err(HardwareError::Disconnected);
        }
        if state.sensors.take_pending(class) {
            Ok(Response::Event)
        } else {
            Ok(Response::Error(DeviceStatus::TimedOut))
        }
    }
}

impl Connector for SoftSecureElement {
    fn connect(&self) -> HardwareResult<Box<dyn Transport>> {
        if !self.lock()?.reachable {
            return Err(HardwareError::Disconnected);
        }
        let id = self.shared.next_connection.fetch_add(1, Ordering::Relaxed);
        log::debug!("Software secure element: connection {} opened", id);
        Ok(Box::new(SoftTransport {
            device: self.clone(),
            id,
        }))
    }
}

/// Frame-level connection to a `SoftSecureElement`
pub struct SoftTransport {
    device: SoftSecureElement,
    id: u64,
}

impl Transport for SoftTransport {
    fn send(&mut self, frame: &[u8]) -> HardwareResult<Vec<u8>> {
        let response = match protocol::decode_command(frame) {
            Ok(command) => self.device.execute(self.id, command)?,
            Err(e) => Response::Error(DeviceStatus::InvalidArgument(e.to_string())),
        };
        protocol::encode_response(&response).map_err(|e| HardwareError::CommunicationError(e.to_string()))
    }
}

impl DeviceState {
    fn event_support(&self, class: EventClass) -> Option<DeviceStatus> {
        let supported = match class {
            EventClass::Tap => self.profile.features.has_accelerometer,
            EventClass::Perimeter => self.profile.features.has_tamper_detection,
        };
        (!supported).then(|| DeviceStatus::Unsupported(format!("{:?} events", class)))
    }

    fn apply(&mut self, command: Command) -> Response {
        if self.destroyed && command_needs_keys(&command) {
            return Response::Error(DeviceStatus::Destroyed);
        }

        match command {
            Command::Release => {
                self.owner = None;
                Response::Ok
            }
            Command::GetInfo => Response::Info(self.profile.device_info(self.serial, self.i2c_address)),
            Command::GetRandom { len } => {
                if !self.profile.features.has_trng {
                    return unsupported("random number generator");
                }
                let limit = self.profile.max_random_request;
                if len > limit {
                    return invalid(format!("at most {} random bytes per request", limit));
                }
                let mut out = vec![0u8; len as usize];
                OsRng.fill_bytes(&mut out);
                Response::Bytes(out)
            }
            Command::Encrypt { key, iv, data } | Command::Decrypt { key, iv, data } => {
                status(self.keys.apply_keystream(key, &iv, &data).map(Response::Bytes))
            }
            Command::Mac { key, data } => status(self.keys.mac(key, &data).map(Response::Bytes)),
            Command::VerifyMac { key, data, tag } => {
                status(self.keys.verify_mac(key, &data, &tag).map(Response::Verified))
            }
            Command::Sign { slot, digest } => match self.check_digest(&digest) {
                Some(err) => err,
                None => status(self.keys.sign(slot, &digest).map(Response::Bytes)),
            },
            Command::Verify { slot, digest, signature } => match self.check_digest(&digest) {
                Some(err) => err,
                None => status(self.keys.verify(slot, &digest, &signature).map(Response::Verified)),
            },
            Command::VerifyForeign { curve, public_key, digest, signature } => {
                match self.check_digest(&digest) {
                    Some(err) => err,
                    None => status(
                        keystore::verify_foreign(curve, &public_key, &digest, &signature)
                            .map(Response::Verified),
                    ),
                }
            }
            Command::GetPublicKey { slot } => status(self.keys.public_key(slot).map(Response::Bytes)),
            Command::LedOff => {
                self.led = LedState::Off;
                Response::Ok
            }
            Command::LedOn => {
                self.led = LedState::On;
                Response::Ok
            }
            Command::LedFlash { on_ms, off_ms, num_flashes } => {
                self.led = LedState::Flashing {
                    on_ms,
                    off_ms,
                    cycles: (num_flashes != 0).then_some(num_flashes),
                };
                Response::Ok
            }
            Command::SetI2cAddress { address } => {
                if !self.profile.features.has_i2c_address_select {
                    return unsupported("i2c address select");
                }
                if !is_valid_i2c_address(address) {
                    return invalid(format!("i2c address {:#04x} out of range", address));
                }
                self.i2c_address = address;
                self.reset();
                Response::Ok
            }
            Command::SetTapSensitivity { axis, percent } => {
                if !self.profile.features.has_accelerometer {
                    return unsupported("accelerometer");
                }
                if !(0.0..=100.0).contains(&percent) {
                    return invalid(format!("sensitivity {} out of range", percent));
                }
                self.sensors.set_tap_sensitivity(axis, percent);
                Response::Ok
            }
            Command::GetAccelerometer => {
                if !self.profile.features.has_accelerometer {
                    return unsupported("accelerometer");
                }
                Response::Accelerometer(self.sensors.accelerometer())
            }
            Command::SetPerimeterAction { channel, actions } => {
                if let Some(status) = self.event_support(EventClass::Perimeter) {
                    return Response::Error(status);
                }
                let actions = EventActions::from_bits_truncate(actions);
                if self.sensors.set_actions(channel as usize, actions) {
                    Response::Ok
                } else {
                    invalid(format!("perimeter channel {}", channel))
                }
            }
            Command::GetPerimeterEvents => match self.event_support(EventClass::Perimeter) {
                Some(status) => Response::Error(status),
                None => Response::PerimeterEvents(self.sensors.perimeter_events()),
            },
            Command::ClearPerimeterEvents => match self.event_support(EventClass::Perimeter) {
                Some(status) => Response::Error(status),
                None => {
                    self.sensors.clear_perimeter();
                    Response::Ok
                }
            },
            Command::GetPerimeterStates => match self.event_support(EventClass::Perimeter) {
                Some(status) => Response::Error(status),
                None => Response::ChannelStates(self.sensors.channel_states()),
            },
            Command::Claim | Command::WaitForEvent { .. } | Command::GetTime { .. } => {
                Response::Error(DeviceStatus::Fault("command routed to wrong handler".to_string()))
            }
        }
    }

    fn check_digest(&self, digest: &[u8]) -> Option<Response> {
        let expected = usize::from(crate::profile::DIGEST_LEN);
        (digest.len() != expected)
            .then(|| invalid(format!("digest must be {} bytes, got {}", expected, digest.len())))
    }

    fn reset(&mut self) {
        log::info!("Software secure element reset at i2c address {:#04x}", self.i2c_address);
        self.owner = None;
        self.led = LedState::Off;
        self.sensors.reset_pending();
        self.resets += 1;
    }
}

fn command_needs_keys(command: &Command) -> bool {
    matches!(
        command,
        Command::Encrypt { .. }
            | Command::Decrypt { .. }
            | Command::Mac { .. }
            | Command::VerifyMac { .. }
            | Command::Sign { .. }
            | Command::Verify { .. }
            | Command::GetPublicKey { .. }
    )
}

fn status(result: Result<Response, DeviceStatus>) -> Response {
    result.unwrap_or_else(Response::Error)
}

fn invalid(message: String) -> Response {
    Response::Error(DeviceStatus::InvalidArgument(message))
}

fn unsupported(what: &str) -> Response {
    Response::Error(DeviceStatus::Unsupported(what.to_string()))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
