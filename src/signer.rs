//! Signature Engine
//!
//! ECDSA over prehashed digests with device key slots, plus verification
//! against caller-supplied P-256 or secp256k1 public keys. The device only
//! ever sees raw `r || s` signatures; DER input is converted here, using the
//! caller's explicit encoding flag.

use crate::resolver;
use crate::session::{require_absolute, Session};
use crate::{SeError, SeResult, Verification};
use p256::pkcs8::{EncodePublicKey, LineEnding};
use sealbox_core::protocol::Command;
use sealbox_core::{
    CurveType, KeySlot, SignatureEncoding, RAW_SIGNATURE_LEN, UNCOMPRESSED_POINT_LEN,
    UNCOMPRESSED_POINT_MARKER,
};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Raw ECDSA signature (`r || s`, 32 bytes each)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; RAW_SIGNATURE_LEN]);

impl Signature {
    /// Wrap raw signature bytes
    pub fn from_raw(bytes: &[u8]) -> SeResult<Self> {
        let raw: [u8; RAW_SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            SeError::InvalidArgument(format!(
                "raw signature must be {} bytes, got {}",
                RAW_SIGNATURE_LEN,
                bytes.len()
            ))
        })?;
        Ok(Signature(raw))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; RAW_SIGNATURE_LEN] {
        &self.0
    }

    /// The `r` scalar
    pub fn r(&self) -> &[u8] {
        &self.0[..32]
    }

    /// The `s` scalar
    pub fn s(&self) -> &[u8] {
        &self.0[32..]
    }

    /// ASN.1 DER encoding
    pub fn to_der(&self) -> SeResult<Vec<u8>> {
        let signature = p256::ecdsa::Signature::from_slice(&self.0)
            .map_err(|e| SeError::InvalidArgument(format!("signature scalars out of range: {}", e)))?;
        Ok(signature.to_der().as_bytes().to_vec())
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Session {
    /// Sign a digest with the key pair in `slot`
    pub fn sign_digest(&self, digest: &[u8], slot: KeySlot) -> SeResult<Signature> {
        self.ensure_open()?;
        let slot = resolver::slot_index(self.info(), slot)?;
        self.check_digest(digest)?;

        let raw = self.call_bytes(Command::Sign {
            slot,
            digest: digest.to_vec(),
        })?;
        Signature::from_raw(&raw).map_err(|_| {
            SeError::DeviceUnreachable(format!("device returned a {} byte signature", raw.len()))
        })
    }

    /// Check a raw signature against the device public key in `slot`
    pub fn verify_digest(&self, digest: &[u8], slot: KeySlot, signature: &[u8]) -> SeResult<Verification> {
        self.ensure_open()?;
        let slot = resolver::slot_index(self.info(), slot)?;
        self.check_digest(digest)?;
        let signature = Signature::from_raw(signature)?;

        let valid = self.call_verified(Command::Verify {
            slot,
            digest: digest.to_vec(),
            signature: signature.as_bytes().to_vec(),
        })?;
        Ok(Verification::from(valid))
    }

    /// Check a signature against a caller-supplied uncompressed public key
    pub fn verify_digest_foreign(
        &self,
        digest: &[u8],
        public_key: &[u8],
        signature: &[u8],
        encoding: SignatureEncoding,
        curve: CurveType,
    ) -> SeResult<Verification> {
        self.ensure_open()?;
        self.check_digest(digest)?;

        if public_key.len() != UNCOMPRESSED_POINT_LEN || public_key[0] != UNCOMPRESSED_POINT_MARKER {
            return Err(SeError::InvalidArgument(format!(
                "public key must be a {} byte uncompressed point starting with {:#04x}",
                UNCOMPRESSED_POINT_LEN, UNCOMPRESSED_POINT_MARKER
            )));
        }
        let signature = raw_signature(signature, encoding, curve)?;

        let valid = self.call_verified(Command::VerifyForeign {
            curve,
            public_key: public_key.to_vec(),
            digest: digest.to_vec(),
            signature: signature.as_bytes().to_vec(),
        })?;
        Ok(Verification::from(valid))
    }

    /// Uncompressed SEC1 public key of `slot`
    pub fn public_key(&self, slot: KeySlot) -> SeResult<Vec<u8>> {
        self.ensure_open()?;
        let slot = resolver::slot_index(self.info(), slot)?;

        let key = self.call_bytes(Command::GetPublicKey { slot })?;
        if key.len() != UNCOMPRESSED_POINT_LEN || key[0] != UNCOMPRESSED_POINT_MARKER {
            return Err(SeError::DeviceUnreachable("device returned a malformed public key".to_string()));
        }
        Ok(key)
    }

    /// SubjectPublicKeyInfo PEM of `slot`
    pub fn public_key_pem(&self, slot: KeySlot) -> SeResult<String> {
        let sec1 = self.public_key(slot)?;
        let key = p256::PublicKey::from_sec1_bytes(&sec1)
            .map_err(|_| SeError::DeviceUnreachable("device public key is not on P-256".to_string()))?;
        key.to_public_key_pem(LineEnding::LF)
            .map_err(|e| SeError::DeviceUnreachable(format!("PEM encoding failed: {}", e)))
    }

    /// Write the PEM public key of `slot` to `path`
    pub fn save_public_key_pem(&self, path: impl AsRef<Path>, slot: KeySlot) -> SeResult<()> {
        let path = path.as_ref();
        require_absolute(path)?;
        let pem = self.public_key_pem(slot)?;
        std::fs::write(path, pem)?;
        Ok(())
    }

    /// SHA-256 a message and sign the digest
    pub fn sign_message(&self, message: &[u8], slot: KeySlot) -> SeResult<Signature> {
        self.sign_digest(&Sha256::digest(message), slot)
    }

    /// SHA-256 a message and check a raw signature over the digest
    pub fn verify_message(&self, message: &[u8], slot: KeySlot, signature: &[u8]) -> SeResult<Verification> {
        self.verify_digest(&Sha256::digest(message), slot, signature)
    }

    fn check_digest(&self, digest: &[u8]) -> SeResult<()> {
        let expected = usize::from(self.info().digest_len);
        if digest.len() != expected {
            return Err(SeError::InvalidArgument(format!(
                "digest must be {} bytes, got {}",
                expected,
                digest.len()
            )));
        }
        Ok(())
    }
}

/// Normalise a signature in the caller's declared encoding to raw `r || s`
fn raw_signature(signature: &[u8], encoding: SignatureEncoding, curve: CurveType) -> SeResult<Signature> {
    match encoding {
        SignatureEncoding::Raw => Signature::from_raw(signature),
        SignatureEncoding::Der => {
            let raw = match curve {
                CurveType::NistP256 => p256::ecdsa::Signature::from_der(signature).map(|s| s.to_bytes().to_vec()),
                CurveType::Secp256k1 => k256::ecdsa::Signature::from_der(signature).map(|s| s.to_bytes().to_vec()),
            }
            .map_err(|_| SeError::InvalidArgument("malformed DER signature".to_string()))?;
            Signature::from_raw(&raw)
        }
    }
}
