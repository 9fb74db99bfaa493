//! Key store of the software secure element
//!
//! Symmetric secrets never leave this module; callers get ciphertext, tags
//! and verification verdicts only.

use crate::memory::SecureMemory;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand_core::{OsRng, RngCore};
use sealbox_core::protocol::{LOCK_IV_LEN, LOCK_TAG_LEN};
use sealbox_core::{CurveType, DeviceStatus, SymmetricKey, RAW_SIGNATURE_LEN};
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const SECRET_LEN: usize = 32;
const ENC_INFO: &[u8] = b"sealbox-lock-enc";
const MAC_INFO: &[u8] = b"sealbox-lock-mac";

/// Encryption and MAC keys derived from one symmetric secret
struct LockKeys {
    enc: Zeroizing<[u8; 32]>,
    mac: Zeroizing<[u8; 32]>,
}

/// Device-resident keys
pub(crate) struct KeyStore {
    one_way: SecureMemory,
    shared: SecureMemory,
    signing: Vec<SigningKey>,
}

impl KeyStore {
    /// Generate fresh keys for a device with `slots` key pairs
    pub(crate) fn generate(slots: u8) -> Self {
        let mut one_way = [0u8; SECRET_LEN];
        let mut shared = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut one_way);
        OsRng.fill_bytes(&mut shared);

        let store = KeyStore {
            one_way: SecureMemory::from_slice(&one_way),
            shared: SecureMemory::from_slice(&shared),
            signing: (0..slots).map(|_| SigningKey::random(&mut OsRng)).collect(),
        };

        use zeroize::Zeroize;
        one_way.zeroize();
        shared.zeroize();
        store
    }

    /// Provision the shared secret agreed with a remote party
    pub(crate) fn set_shared_secret(&mut self, secret: &[u8; SECRET_LEN]) -> Result<(), DeviceStatus> {
        if self.shared.is_wiped() {
            return Err(DeviceStatus::Destroyed);
        }
        self.shared
            .replace(secret)
            .map_err(|e| DeviceStatus::Fault(e.to_string()))
    }

    /// Destroy every key
    pub(crate) fn destroy(&mut self) {
        self.one_way.wipe();
        self.shared.wipe();
        self.signing.clear();
    }

    fn lock_keys(&self, key: SymmetricKey) -> Result<LockKeys, DeviceStatus> {
        let secret = match key {
            SymmetricKey::OneWay => &self.one_way,
            SymmetricKey::Shared => &self.shared,
        };
        if secret.is_wiped() {
            return Err(DeviceStatus::Destroyed);
        }

        let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let mut enc = Zeroizing::new([0u8; 32]);
        let mut mac = Zeroizing::new([0u8; 32]);
        hk.expand(ENC_INFO, &mut enc[..])
            .and_then(|_| hk.expand(MAC_INFO, &mut mac[..]))
            .map_err(|e| DeviceStatus::Fault(e.to_string()))?;

        Ok(LockKeys { enc, mac })
    }

    /// Apply the CTR keystream; encryption and decryption are the same operation
    pub(crate) fn apply_keystream(
        &self,
        key: SymmetricKey,
        iv: &[u8; LOCK_IV_LEN],
        data: &[u8],
    ) -> Result<Vec<u8>, DeviceStatus> {
        let keys = self.lock_keys(key)?;
        let mut cipher = Aes256Ctr::new_from_slices(&keys.enc[..], iv)
            .map_err(|e| DeviceStatus::Fault(e.to_string()))?;

        let mut out = data.to_vec();
        cipher.apply_keystream(&mut out);
        Ok(out)
    }

    fn hmac(&self, key: SymmetricKey) -> Result<HmacSha256, DeviceStatus> {
        let keys = self.lock_keys(key)?;
        <HmacSha256 as Mac>::new_from_slice(&keys.mac[..]).map_err(|e| DeviceStatus::Fault(e.to_string()))
    }

    /// Authentication tag over `data`
    pub(crate) fn mac(&self, key: SymmetricKey, data: &[u8]) -> Result<Vec<u8>, DeviceStatus> {
        let mut mac = self.hmac(key)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Constant-time tag check
    pub(crate) fn verify_mac(
        &self,
        key: SymmetricKey,
        data: &[u8],
        tag: &[u8; LOCK_TAG_LEN],
    ) -> Result<bool, DeviceStatus> {
        let mut mac = self.hmac(key)?;
        mac.update(data);
        Ok(mac.verify_slice(tag).is_ok())
    }

    fn signing_key(&self, slot: u8) -> Result<&SigningKey, DeviceStatus> {
        if self.signing.is_empty() {
            return Err(DeviceStatus::Destroyed);
        }
        self.signing
            .get(slot as usize)
            .ok_or_else(|| DeviceStatus::InvalidArgument(format!("no key pair in slot {}", slot)))
    }

    /// ECDSA P-256 signature over a prehashed digest, raw `r || s`
    pub(crate) fn sign(&self, slot: u8, digest: &[u8]) -> Result<Vec<u8>, DeviceStatus> {
        let signature: Signature = self
            .signing_key(slot)?
            .sign_prehash(digest)
            .map_err(|e| DeviceStatus::InvalidArgument(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    /// Check a raw signature against the public key of `slot`
    pub(crate) fn verify(&self, slot: u8, digest: &[u8], signature: &[u8]) -> Result<bool, DeviceStatus> {
        let verifying_key = self.signing_key(slot)?.verifying_key();
        let signature = match Signature::from_slice(signature) {
            Ok(signature) => signature,
            // Out-of-range scalars cannot verify
            Err(_) => return Ok(false),
        };
        Ok(verifying_key.verify_prehash(digest, &signature).is_ok())
    }

    /// Uncompressed SEC1 public key of `slot`
    pub(crate) fn public_key(&self, slot: u8) -> Result<Vec<u8>, DeviceStatus> {
        let verifying_key: &VerifyingKey = self.signing_key(slot)?.verifying_key();
        Ok(verifying_key.to_encoded_point(false).as_bytes().to_vec())
    }
}

/// Check a raw signature against a caller-supplied public key
pub(crate) fn verify_foreign(
    curve: CurveType,
    public_key: &[u8],
    digest: &[u8],
    signature: &[u8],
) -> Result<bool, DeviceStatus> {
    if signature.len() != RAW_SIGNATURE_LEN {
        return Err(DeviceStatus::InvalidArgument(format!(
            "raw signature must be {} bytes",
            RAW_SIGNATURE_LEN
        )));
    }

    match curve {
        CurveType::NistP256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                .map_err(|_| DeviceStatus::InvalidArgument("public key is not a P-256 point".to_string()))?;
            let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(key.verify_prehash(digest, &signature).is_ok())
        }
        CurveType::Secp256k1 => {
            let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                .map_err(|_| DeviceStatus::InvalidArgument("public key is not a secp256k1 point".to_string()))?;
            let Ok(signature) = k256::ecdsa::Signature::from_slice(signature) else {
                return Ok(false);
            };
            // secp256k1 verifiers only accept low-S signatures
            let signature = signature.normalize_s().unwrap_or(signature);
            Ok(key.verify_prehash(digest, &signature).is_ok())
        }
    }
}
