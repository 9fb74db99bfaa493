//! Locked object container
//!
//! ```text
//! offset  size  field
//! 0       4     magic "SBX1"
//! 4       1     key tag
//! 5       16    IV
//! 21      n     ciphertext
//! 21+n    32    tag over bytes [0, 21+n)
//! ```

use crate::protocol::{LOCK_IV_LEN, LOCK_TAG_LEN};
use crate::types::SymmetricKey;
use crate::{CoreError, CoreResult};

/// Container magic
pub const LOCKED_MAGIC: [u8; 4] = *b"SBX1";

/// Bytes preceding the ciphertext
pub const LOCKED_HEADER_LEN: usize = LOCKED_MAGIC.len() + 1 + LOCK_IV_LEN;

/// Smallest well-formed object (empty plaintext)
pub const LOCKED_MIN_LEN: usize = LOCKED_HEADER_LEN + LOCK_TAG_LEN;

/// Ciphertext plus authentication tag produced by a lock operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedObject {
    key: SymmetricKey,
    iv: [u8; LOCK_IV_LEN],
    ciphertext: Vec<u8>,
    tag: [u8; LOCK_TAG_LEN],
}

impl LockedObject {
    /// Assemble an object from its parts
    pub fn new(
        key: SymmetricKey,
        iv: [u8; LOCK_IV_LEN],
        ciphertext: Vec<u8>,
        tag: [u8; LOCK_TAG_LEN],
    ) -> Self {
        LockedObject { key, iv, ciphertext, tag }
    }

    /// Bytes covered by the authentication tag: header, IV and ciphertext
    pub fn authenticated_data(key: SymmetricKey, iv: &[u8; LOCK_IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(LOCKED_HEADER_LEN + ciphertext.len());
        data.extend_from_slice(&LOCKED_MAGIC);
        data.push(key.tag());
        data.extend_from_slice(iv);
        data.extend_from_slice(ciphertext);
        data
    }

    /// Authenticated bytes of this object
    pub fn signed_bytes(&self) -> Vec<u8> {
        Self::authenticated_data(self.key, &self.iv, &self.ciphertext)
    }

    /// Serialize to the container format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signed_bytes();
        out.extend_from_slice(&self.tag);
        out
    }

    /// Parse the container format
    ///
    /// Only the framing is checked here; authenticity is the device's call.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < LOCKED_MIN_LEN {
            return Err(CoreError::MalformedObject(format!(
                "{} bytes, need at least {}",
                bytes.len(),
                LOCKED_MIN_LEN
            )));
        }

        if bytes[..LOCKED_MAGIC.len()] != LOCKED_MAGIC {
            return Err(CoreError::MalformedObject("bad magic".to_string()));
        }

        let key = SymmetricKey::from_tag(bytes[LOCKED_MAGIC.len()])
            .ok_or_else(|| CoreError::MalformedObject("unknown key tag".to_string()))?;

        let mut iv = [0u8; LOCK_IV_LEN];
        iv.copy_from_slice(&bytes[LOCKED_MAGIC.len() + 1..LOCKED_HEADER_LEN]);

        let tag_start = bytes.len() - LOCK_TAG_LEN;
        let mut tag = [0u8; LOCK_TAG_LEN];
        tag.copy_from_slice(&bytes[tag_start..]);

        Ok(LockedObject {
            key,
            iv,
            ciphertext: bytes[LOCKED_HEADER_LEN..tag_start].to_vec(),
            tag,
        })
    }

    /// Key the object was locked with
    pub fn key(&self) -> SymmetricKey {
        self.key
    }

    /// CTR initialisation vector
    pub fn iv(&self) -> &[u8; LOCK_IV_LEN] {
        &self.iv
    }

    /// Encrypted payload
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Authentication tag
    pub fn tag(&self) -> &[u8; LOCK_TAG_LEN] {
        &self.tag
    }

    /// Length of `to_bytes()`, never less than `LOCKED_MIN_LEN`
    pub fn encoded_len(&self) -> usize {
        LOCKED_MIN_LEN + self.ciphertext.len()
    }

    /// Whether the locked plaintext was empty
    pub fn is_payload_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}
