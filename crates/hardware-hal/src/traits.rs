//! Traits for the transport boundary

use crate::HardwareResult;

/// Ordered, reliable frame channel to one secure element
///
/// Each call carries exactly one command frame and returns exactly one
/// response frame. Implementations do not retry.
pub trait Transport: Send {
    /// Send a command frame and wait for the response frame
    fn send(&mut self, frame: &[u8]) -> HardwareResult<Vec<u8>>;
}

/// Factory for transports to a particular device
pub trait Connector {
    /// Open a new transport; fails when the device is unreachable
    fn connect(&self) -> HardwareResult<Box<dyn Transport>>;
}
