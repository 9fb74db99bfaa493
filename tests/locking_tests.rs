mod common;

use common::init_logging;
use proptest::prelude::*;
use sealbox::{KeyRef, LockedObject, SeError, Session};
use sealbox_hardware_hal::soft::SoftSecureElement;

fn key_ref() -> impl Strategy<Value = KeyRef> {
    prop_oneof![Just(KeyRef::OneWay), Just(KeyRef::Shared)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_unlock_inverts_lock(
        plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
        key in key_ref(),
    ) {
        let device = SoftSecureElement::single_key();
        let session = Session::open(&device).unwrap();

        let locked = session.lock(&plaintext, key).unwrap();
        prop_assert_eq!(session.unlock(&locked, key).unwrap(), plaintext.clone());
        prop_assert_eq!(session.unlock_bytes(&locked.to_bytes(), key).unwrap(), plaintext);
    }

    #[test]
    fn prop_single_bit_flip_is_rejected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        key in key_ref(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let device = SoftSecureElement::single_key();
        let session = Session::open(&device).unwrap();

        let mut bytes = session.lock(&plaintext, key).unwrap().to_bytes();
        let i = position.index(bytes.len());
        bytes[i] ^= 1 << bit;

        prop_assert_eq!(session.unlock_bytes(&bytes, key), Err(SeError::AuthenticationFailed));
    }
}

#[test]
fn test_shared_key_interoperates() {
    init_logging();
    let secret = [0x5Au8; 32];
    let local = SoftSecureElement::single_key();
    let remote = SoftSecureElement::multi_slot(2);
    local.provision_shared_secret(&secret).unwrap();
    remote.provision_shared_secret(&secret).unwrap();

    let locked = {
        let session = Session::open(&local).unwrap();
        session.lock(b"meet at the usual place", KeyRef::Shared).unwrap().to_bytes()
    };

    let session = Session::open(&remote).unwrap();
    assert_eq!(
        session.unlock_bytes(&locked, KeyRef::Shared).unwrap(),
        b"meet at the usual place"
    );
}

#[test]
fn test_one_way_key_stays_on_its_device() {
    init_logging();
    let a = SoftSecureElement::single_key();
    let b = SoftSecureElement::single_key();

    let locked = Session::open(&a).unwrap().lock(b"device bound", KeyRef::OneWay).unwrap();
    let session = Session::open(&b).unwrap();
    assert_eq!(session.unlock(&locked, KeyRef::OneWay), Err(SeError::AuthenticationFailed));
}

#[test]
fn test_container_layout() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();

    let bytes = session.lock(b"0123456789", KeyRef::Shared).unwrap().to_bytes();
    assert_eq!(&bytes[..4], b"SBX1");
    assert_eq!(bytes[4], 0x02);
    assert_eq!(bytes.len(), 4 + 1 + 16 + 10 + 32);

    let parsed = LockedObject::from_bytes(&bytes).unwrap();
    assert_eq!(parsed.ciphertext().len(), 10);
    assert_eq!(hex::encode(parsed.to_bytes()), hex::encode(&bytes));

    // The header names the key, so the object alone is enough to unlock it
    assert_eq!(KeyRef::from(parsed.key()), KeyRef::Shared);
    assert_eq!(session.unlock(&parsed, parsed.key().into()).unwrap(), b"0123456789");
}

#[test]
fn test_swapped_key_tag_is_rejected() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();

    let mut bytes = session.lock(b"relabel me", KeyRef::OneWay).unwrap().to_bytes();
    bytes[4] = 0x02;
    assert_eq!(session.unlock_bytes(&bytes, KeyRef::Shared), Err(SeError::AuthenticationFailed));
}

#[test]
fn test_large_file_round_trip() -> anyhow::Result<()> {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device)?;
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("blob.bin");
    let locked = dir.path().join("blob.sbx");
    let restored = dir.path().join("blob.out");

    let blob = session.get_random(64 * 1024)?;
    std::fs::write(&source, &blob)?;

    session.lock_file_to_file(&source, KeyRef::OneWay, &locked)?;
    assert_ne!(std::fs::read(&locked)?, blob);
    session.unlock_file_to_file(&locked, KeyRef::OneWay, &restored)?;
    assert_eq!(std::fs::read(&restored)?, blob);
    Ok(())
}

#[test]
fn test_missing_source_file() {
    init_logging();
    let device = SoftSecureElement::single_key();
    let session = Session::open(&device).unwrap();
    let dir = tempfile::tempdir().unwrap();

    assert!(matches!(
        session.lock_file_to_bytes(dir.path().join("absent"), KeyRef::OneWay),
        Err(SeError::InvalidArgument(_))
    ));
}
