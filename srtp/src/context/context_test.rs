use super::*;
use crate::protection_profile::ProtectionProfile::*;

#[test]
fn test_key_and_salt_lengths_enforced() {
    assert!(matches!(
        Context::new(&[0u8; 15], &[0u8; 14], Aes128CmHmacSha1_80),
        Err(Error::SrtpMasterKeyLength(16, 15))
    ));
    assert!(matches!(
        Context::new(&[0u8; 16], &[0u8; 12], Aes128CmHmacSha1_80),
        Err(Error::SrtpSaltLength(14, 12))
    ));
    assert!(matches!(
        Context::new(&[0u8; 16], &[0u8; 14], AeadAes256Gcm),
        Err(Error::SrtpMasterKeyLength(32, 16))
    ));
    // Double carries both layers.
    assert!(Context::new(&[0u8; 32], &[0u8; 24], DoubleAeadAes128Gcm).is_ok());
    assert!(Context::new(&[0u8; 64], &[0u8; 24], DoubleAeadAes256Gcm).is_ok());
}

#[test]
fn test_mki_limit() {
    let cfg = ContextConfig {
        mki: Some(vec![0u8; 256]),
        ..Default::default()
    };
    assert!(matches!(
        Context::with_config(&[0u8; 16], &[0u8; 14], Aes128CmHmacSha1_80, cfg),
        Err(Error::ErrMkiTooLong(256))
    ));
}

#[test]
fn test_key_derivation_rate_validation() {
    let kdr = |rate| ContextConfig {
        key_derivation_rate: rate,
        ..Default::default()
    };
    assert!(matches!(
        Context::with_config(&[0u8; 16], &[0u8; 14], Aes128CmHmacSha1_80, kdr(3)),
        Err(Error::ErrBadKeyDerivationRate(3))
    ));
    assert!(
        Context::with_config(&[0u8; 16], &[0u8; 14], Aes128CmHmacSha1_80, kdr(1 << 10)).is_ok()
    );
    assert!(matches!(
        Context::with_config(&[0u8; 16], &[0u8; 12], AeadAes128Gcm, kdr(1 << 10)),
        Err(Error::ErrKdrUnsupportedForAead)
    ));
}

#[test]
fn test_profile_names_round_trip() {
    for profile in ProtectionProfile::supported() {
        assert_eq!(
            ProtectionProfile::from_name(profile.name()).unwrap(),
            *profile
        );
    }
    // RFC 5764 spellings.
    assert_eq!(
        ProtectionProfile::from_name("SRTP_AES128_CM_HMAC_SHA1_80").unwrap(),
        Aes128CmHmacSha1_80
    );
    assert_eq!(
        ProtectionProfile::from_name("SRTP_AEAD_AES_256_GCM").unwrap(),
        AeadAes256Gcm
    );
    assert!(ProtectionProfile::from_name("AES_CM_512_HMAC_MD5").is_err());
}
