//! Secure memory for device-held secrets

use crate::{HardwareError, HardwareResult};
use zeroize::Zeroizing;

/// Fixed-size secret buffer, zeroized on drop
pub struct SecureMemory {
    buffer: Zeroizing<Vec<u8>>,
}

impl SecureMemory {
    /// Allocate zeroed secure memory
    pub fn new(size: usize) -> Self {
        SecureMemory {
            buffer: Zeroizing::new(vec![0u8; size]),
        }
    }

    /// Allocate secure memory holding a copy of `data`
    pub fn from_slice(data: &[u8]) -> Self {
        let mut mem = SecureMemory::new(data.len());
        mem.buffer.copy_from_slice(data);
        mem
    }

    /// Get immutable reference to buffer
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Overwrite the buffer with `data`; lengths must match
    pub fn replace(&mut self, data: &[u8]) -> HardwareResult<()> {
        if data.len() != self.buffer.len() {
            return Err(HardwareError::InvalidParameter(format!(
                "expected {} bytes, got {}",
                self.buffer.len(),
                data.len()
            )));
        }

        self.buffer.copy_from_slice(data);
        Ok(())
    }

    /// Zero and release the buffer
    pub fn wipe(&mut self) {
        use zeroize::Zeroize;
        self.buffer.zeroize();
    }

    /// Whether the secret has been wiped
    pub fn is_wiped(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl std::fmt::Debug for SecureMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureMemory")
            .field("len", &self.buffer.len())
            .finish_non_exhaustive()
    }
}
