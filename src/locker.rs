//! Data Locker
//!
//! Lock is encrypt-then-MAC with device-held keys: the device draws the IV,
//! encrypts, and tags header, IV and ciphertext. Unlock asks the device to
//! check the tag first and only requests decryption after a positive answer.
//!
//! Every buffer/file combination funnels into `lock` and `unlock_bytes`.

use crate::resolver;
use crate::session::{require_absolute, Session};
use crate::{SeError, SeResult};
use sealbox_core::protocol::{Command, LOCK_IV_LEN, LOCK_TAG_LEN};
use sealbox_core::{KeyRef, LockedObject};
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

impl Session {
    /// Lock a buffer with a device-held key
    ///
    /// Two locks of the same plaintext differ; both unlock to it.
    pub fn lock(&self, plaintext: &[u8], key: KeyRef) -> SeResult<LockedObject> {
        let key = resolver::symmetric_key(key)?;

        let iv: [u8; LOCK_IV_LEN] = self
            .get_random(LOCK_IV_LEN)?
            .try_into()
            .map_err(|_| SeError::DeviceUnreachable("short IV".to_string()))?;

        let ciphertext = self.call_bytes(Command::Encrypt {
            key,
            iv,
            data: plaintext.to_vec(),
        })?;
        if ciphertext.len() != plaintext.len() {
            return Err(SeError::DeviceUnreachable(format!(
                "device returned {} ciphertext bytes for {} plaintext bytes",
                ciphertext.len(),
                plaintext.len()
            )));
        }

        let tag: [u8; LOCK_TAG_LEN] = self
            .call_bytes(Command::Mac {
                key,
                data: LockedObject::authenticated_data(key, &iv, &ciphertext),
            })?
            .try_into()
            .map_err(|_| SeError::DeviceUnreachable("bad tag length".to_string()))?;

        log::debug!("Locked {} bytes with {:?} key", plaintext.len(), key);
        Ok(LockedObject::new(key, iv, ciphertext, tag))
    }

    /// Verify and decrypt a locked object
    ///
    /// Fails with `AuthenticationFailed` when the object was modified, was
    /// locked with another key, or comes from another device's one-way key.
    pub fn unlock(&self, locked: &LockedObject, key: KeyRef) -> SeResult<Vec<u8>> {
        let key = resolver::symmetric_key(key)?;
        self.ensure_open()?;

        if locked.key() != key {
            log::warn!("Unlock refused: object locked with {:?} key, {:?} requested", locked.key(), key);
            return Err(SeError::AuthenticationFailed);
        }

        let authentic = self.call_verified(Command::VerifyMac {
            key,
            data: locked.signed_bytes(),
            tag: *locked.tag(),
        })?;
        if !authentic {
            log::warn!("Unlock refused: authentication tag mismatch");
            return Err(SeError::AuthenticationFailed);
        }

        let plaintext = self.call_bytes(Command::Decrypt {
            key,
            iv: *locked.iv(),
            data: locked.ciphertext().to_vec(),
        })?;
        if plaintext.len() != locked.ciphertext().len() {
            return Err(SeError::DeviceUnreachable("plaintext length mismatch".to_string()));
        }
        Ok(plaintext)
    }

    /// Parse serialized locked bytes, then verify and decrypt
    ///
    /// Unparseable input is reported as `AuthenticationFailed`.
    pub fn unlock_bytes(&self, locked: &[u8], key: KeyRef) -> SeResult<Vec<u8>> {
        resolver::symmetric_key(key)?;
        self.ensure_open()?;
        let object = LockedObject::from_bytes(locked).map_err(|e| {
            log::warn!("Unlock refused: {}", e);
            SeError::from(e)
        })?;
        self.unlock(&object, key)
    }

    /// Lock the contents of a file; returns the serialized object
    pub fn lock_file_to_bytes(&self, source: impl AsRef<Path>, key: KeyRef) -> SeResult<Vec<u8>> {
        let plaintext = read_absolute(source.as_ref())?;
        Ok(self.lock(&plaintext, key)?.to_bytes())
    }

    /// Lock a buffer into a file
    pub fn lock_bytes_to_file(&self, plaintext: &[u8], key: KeyRef, dest: impl AsRef<Path>) -> SeResult<()> {
        let dest = dest.as_ref();
        require_absolute(dest)?;
        let locked = self.lock(plaintext, key)?;
        fs::write(dest, locked.to_bytes())?;
        Ok(())
    }

    /// Lock a file into another file
    pub fn lock_file_to_file(
        &self,
        source: impl AsRef<Path>,
        key: KeyRef,
        dest: impl AsRef<Path>,
    ) -> SeResult<()> {
        let dest = dest.as_ref();
        require_absolute(dest)?;
        let plaintext = read_absolute(source.as_ref())?;
        let locked = self.lock(&plaintext, key)?;
        fs::write(dest, locked.to_bytes())?;
        Ok(())
    }

    /// Unlock a locked file into memory
    pub fn unlock_file_to_bytes(&self, source: impl AsRef<Path>, key: KeyRef) -> SeResult<Vec<u8>> {
        let locked = read_absolute(source.as_ref())?;
        self.unlock_bytes(&locked, key)
    }

    /// Unlock serialized locked bytes into a file
    pub fn unlock_bytes_to_file(&self, locked: &[u8], key: KeyRef, dest: impl AsRef<Path>) -> SeResult<()> {
        let dest = dest.as_ref();
        require_absolute(dest)?;
        let plaintext = Zeroizing::new(self.unlock_bytes(locked, key)?);
        fs::write(dest, &plaintext[..])?;
        Ok(())
    }

    /// Unlock a locked file into another file
    pub fn unlock_file_to_file(
        &self,
        source: impl AsRef<Path>,
        key: KeyRef,
        dest: impl AsRef<Path>,
    ) -> SeResult<()> {
        let dest = dest.as_ref();
        require_absolute(dest)?;
        let locked = read_absolute(source.as_ref())?;
        let plaintext = Zeroizing::new(self.unlock_bytes(&locked, key)?);
        fs::write(dest, &plaintext[..])?;
        Ok(())
    }
}

fn read_absolute(path: &Path) -> SeResult<Zeroizing<Vec<u8>>> {
    require_absolute(path)?;
    Ok(Zeroizing::new(fs::read(path)?))
}
