//! Session Manager
//!
//! A `Session` is the only way to reach a secure element. Opening one claims
//! the device exclusively; closing it (or dropping it) releases the claim.
//! Every operation is checked against the open state at call time, so use
//! after close fails with `SeError::SessionInvalid`.

use crate::config::SessionConfig;
use crate::{SeError, SeResult};
use sealbox_core::protocol::{self, Command, Response};
use sealbox_core::DeviceInfo;
use sealbox_hardware_hal::{Connector, Transport};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Exclusive handle on one secure element
pub struct Session {
    transport: Mutex<Option<Box<dyn Transport>>>,
    info: DeviceInfo,
    config: SessionConfig,
}

impl Session {
    /// Open a session with default configuration
    pub fn open(connector: &dyn Connector) -> SeResult<Self> {
        Self::open_with_config(connector, SessionConfig::default())
    }

    /// Open a session
    ///
    /// Fails with `DeviceBusy` when another session holds the device and
    /// `DeviceUnreachable` when the device cannot be reached.
    pub fn open_with_config(connector: &dyn Connector, config: SessionConfig) -> SeResult<Self> {
        let mut transport = connector.connect()?;

        expect_ok(exchange(transport.as_mut(), &Command::Claim, config.log_frames)?, "Claim")?;

        let info = match exchange(transport.as_mut(), &Command::GetInfo, config.log_frames) {
            Ok(Response::Info(info)) => info,
            other => {
                // Do not leave the device claimed by a handle nobody holds
                let _ = exchange(transport.as_mut(), &Command::Release, config.log_frames);
                return Err(match other {
                    Ok(response) => unexpected("GetInfo", response),
                    Err(e) => e,
                });
            }
        };

        log::info!(
            "Session opened: {} fw {} serial {} ({} key slot(s), {} perimeter channel(s))",
            info.model,
            info.firmware_version,
            info.serial_hex(),
            info.key_slots,
            info.perimeter_channels
        );

        Ok(Session {
            transport: Mutex::new(Some(transport)),
            info,
            config,
        })
    }

    /// Release the device and invalidate this handle
    ///
    /// The handle is closed even when the release frame fails.
    pub fn close(&mut self) -> SeResult<()> {
        let mut transport = self.slot()?.take().ok_or(SeError::SessionInvalid)?;
        let log_frames = self.config.log_frames;

        let released = exchange(transport.as_mut(), &Command::Release, log_frames)
            .and_then(|response| expect_ok(response, "Release"));
        log::info!("Session closed ({})", self.info.model);
        released
    }

    /// Whether the handle can still be used
    pub fn is_open(&self) -> bool {
        self.slot().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Capabilities discovered at open
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Drop the transport without releasing, after the device reset itself
    pub(crate) fn invalidate(&self) {
        if let Ok(mut slot) = self.slot() {
            if slot.take().is_some() {
                log::info!("Session invalidated by device reset ({})", self.info.model);
            }
        }
    }

    fn slot(&self) -> SeResult<MutexGuard<'_, Option<Box<dyn Transport>>>> {
        self.transport.lock().map_err(|_| SeError::SessionInvalid)
    }

    pub(crate) fn ensure_open(&self) -> SeResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SeError::SessionInvalid)
        }
    }

    /// One command/response exchange; device status codes become errors
    pub(crate) fn call(&self, command: Command) -> SeResult<Response> {
        let mut slot = self.slot()?;
        let transport = slot.as_mut().ok_or(SeError::SessionInvalid)?;

        match exchange(transport.as_mut(), &command, self.config.log_frames)? {
            Response::Error(status) => {
                log::debug!("{} rejected: {:?}", command.name(), status);
                Err(SeError::from(status))
            }
            response => Ok(response),
        }
    }

    pub(crate) fn call_ok(&self, command: Command) -> SeResult<()> {
        let name = command.name();
        expect_ok(self.call(command)?, name)
    }

    pub(crate) fn call_bytes(&self, command: Command) -> SeResult<Vec<u8>> {
        let name = command.name();
        match self.call(command)? {
            Response::Bytes(bytes) => Ok(bytes),
            other => Err(unexpected(name, other)),
        }
    }

    pub(crate) fn call_verified(&self, command: Command) -> SeResult<bool> {
        let name = command.name();
        match self.call(command)? {
            Response::Verified(valid) => Ok(valid),
            other => Err(unexpected(name, other)),
        }
    }

    /// Draw `len` bytes from the device random number generator
    ///
    /// Large requests are split into frames of at most `max_transfer_len`,
    /// capped by the per-request limit the device reported at open.
    pub fn get_random(&self, len: usize) -> SeResult<Vec<u8>> {
        self.ensure_open()?;

        let device_limit = usize::try_from(self.info.max_random_request).unwrap_or(usize::MAX);
        let chunk = self.config.max_transfer_len.min(device_limit).max(1);
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let want = (len - out.len()).min(chunk);
            let bytes = self.call_bytes(Command::GetRandom { len: want as u32 })?;
            if bytes.len() != want {
                return Err(SeError::DeviceUnreachable(format!(
                    "asked for {} random bytes, got {}",
                    want,
                    bytes.len()
                )));
            }
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    /// Write `len` device random bytes to the file at `path`
    pub fn create_random_file(&self, path: impl AsRef<Path>, len: usize) -> SeResult<()> {
        let path = path.as_ref();
        require_absolute(path)?;
        let bytes = self.get_random(len)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let log_frames = self.config.log_frames;
        let Ok(slot) = self.transport.get_mut() else {
            return;
        };
        if let Some(mut transport) = slot.take() {
            match exchange(transport.as_mut(), &Command::Release, log_frames) {
                Ok(Response::Ok) => log::info!("Session released on drop ({})", self.info.model),
                Ok(other) => log::warn!("Release on drop answered {:?}", other),
                Err(e) => log::warn!("Release on drop failed: {}", e),
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("model", &self.info.model)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Encode, send and decode one frame pair
fn exchange(transport: &mut dyn Transport, command: &Command, log_frames: bool) -> SeResult<Response> {
    let frame = protocol::encode_command(command)?;
    let reply = transport.send(&frame)?;
    if log_frames {
        log::debug!("{}: sent {} bytes, received {} bytes", command.name(), frame.len(), reply.len());
    }
    Ok(protocol::decode_response(&reply)?)
}

fn expect_ok(response: Response, name: &str) -> SeResult<()> {
    match response {
        Response::Ok => Ok(()),
        Response::Error(status) => Err(SeError::from(status)),
        other => Err(unexpected(name, other)),
    }
}

pub(crate) fn unexpected(name: &str, response: Response) -> SeError {
    SeError::DeviceUnreachable(format!("unexpected response to {}: {:?}", name, response))
}

/// File variants only accept absolute paths
pub(crate) fn require_absolute(path: &Path) -> SeResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(SeError::InvalidArgument(format!(
            "path must be absolute: {}",
            path.display()
        )))
    }
}
