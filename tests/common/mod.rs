#![allow(dead_code)]

use sealbox::{Connector, DeviceInfo, Transport};
use sealbox_core::protocol::{self, Command, Response};
use sealbox_hardware_hal::{HardwareError, HardwareResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sha256(message: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    Sha256::digest(message).to_vec()
}

pub fn test_info(key_slots: u8) -> DeviceInfo {
    DeviceInfo {
        model: "SCRIPTED".to_string(),
        firmware_version: "0.0.0".to_string(),
        serial: [0xAB; 16],
        key_slots,
        perimeter_channels: 2,
        digest_len: 32,
        max_random_request: 4096,
        i2c_address: 0x30,
    }
}

/// Replays canned responses and records every command it receives
///
/// Once the script runs out every command is answered with `Response::Ok`.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    responses: Arc<Mutex<VecDeque<Response>>>,
    received: Arc<Mutex<Vec<Command>>>,
}

impl ScriptedDevice {
    /// Script that answers the open handshake for a device with `key_slots`
    pub fn opened(key_slots: u8) -> Self {
        Self::opened_with_info(test_info(key_slots))
    }

    /// Script that answers the open handshake with `info`
    pub fn opened_with_info(info: DeviceInfo) -> Self {
        let device = ScriptedDevice::default();
        device.push(Response::Ok);
        device.push(Response::Info(info));
        device
    }

    pub fn push(&self, response: Response) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn received(&self) -> Vec<Command> {
        self.received.lock().unwrap().clone()
    }
}

impl Connector for ScriptedDevice {
    fn connect(&self) -> HardwareResult<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }
}

impl Transport for ScriptedDevice {
    fn send(&mut self, frame: &[u8]) -> HardwareResult<Vec<u8>> {
        let command = protocol::decode_command(frame)
            .map_err(|e| HardwareError::CommunicationError(e.to_string()))?;
        self.received.lock().unwrap().push(command);

        let response = self.responses.lock().unwrap().pop_front().unwrap_or(Response::Ok);
        protocol::encode_response(&response).map_err(|e| HardwareError::CommunicationError(e.to_string()))
    }
}
