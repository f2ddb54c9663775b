use super::*;
use crate::protection_profile::ProtectionProfile;

// Key derivation test vectors from RFC 3711 Appendix B.3.
const MASTER_KEY: [u8; 16] = [
    0xE1, 0xF9, 0x7A, 0x0D, 0x3E, 0x01, 0x8B, 0xE0, 0xD6, 0x4F, 0xA3, 0x2C, 0x06, 0xDE, 0x41,
    0x39,
];
const MASTER_SALT: [u8; 14] = [
    0x0E, 0xC6, 0x75, 0xAD, 0x49, 0x8A, 0xFE, 0xEB, 0xB6, 0x96, 0x0B, 0x3A, 0xAB, 0xE6,
];

#[test]
fn test_valid_session_keys() {
    let expected_session_key = [
        0xC6, 0x1E, 0x7A, 0x93, 0x74, 0x4F, 0x39, 0xEE, 0x10, 0x73, 0x4A, 0xFE, 0x3F, 0xF7,
        0xA0, 0x87,
    ];
    let expected_session_salt = [
        0x30, 0xCB, 0xBC, 0x08, 0x86, 0x3D, 0x8C, 0x85, 0xD4, 0x9D, 0xB3, 0x4A, 0x9A, 0xE1,
    ];
    let expected_session_auth_tag = [
        0xCE, 0xBE, 0x32, 0x1F, 0x6F, 0xF7, 0x71, 0x6B, 0x6F, 0xD4, 0xAB, 0x49, 0xAF, 0x25,
        0x6A, 0x15, 0x6D, 0x38, 0xBA, 0xA4,
    ];

    let session_key = aes_cm_key_derivation(
        LABEL_SRTP_ENCRYPTION,
        &MASTER_KEY,
        &MASTER_SALT,
        0,
        MASTER_KEY.len(),
    )
    .unwrap();
    assert_eq!(session_key, expected_session_key);

    let session_salt = aes_cm_key_derivation(
        LABEL_SRTP_SALT,
        &MASTER_KEY,
        &MASTER_SALT,
        0,
        MASTER_SALT.len(),
    )
    .unwrap();
    assert_eq!(session_salt, expected_session_salt);

    let auth_key_len = ProtectionProfile::Aes128CmHmacSha1_80.auth_key_len();
    let session_auth_tag = aes_cm_key_derivation(
        LABEL_SRTP_AUTHENTICATION_TAG,
        &MASTER_KEY,
        &MASTER_SALT,
        0,
        auth_key_len,
    )
    .unwrap();
    assert_eq!(session_auth_tag, expected_session_auth_tag);
}

#[test]
fn test_index_over_kdr_changes_keys() {
    let base = aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 0, 16)
        .unwrap();
    let shifted =
        aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 1, 16).unwrap();
    assert_ne!(base, shifted);

    // Same r, same keys.
    let again =
        aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 1, 16).unwrap();
    assert_eq!(shifted, again);
}

#[test]
fn test_labels_are_independent() {
    let mut keys = Vec::new();
    for label in [
        LABEL_SRTP_ENCRYPTION,
        LABEL_SRTP_AUTHENTICATION_TAG,
        LABEL_SRTP_SALT,
        LABEL_SRTCP_ENCRYPTION,
        LABEL_SRTCP_AUTHENTICATION_TAG,
        LABEL_SRTCP_SALT,
        LABEL_SRTP_HEADER_ENCRYPTION,
        LABEL_SRTP_HEADER_SALT,
    ] {
        keys.push(
            aes_cm_key_derivation(label, &MASTER_KEY, &MASTER_SALT, 0, 16).unwrap(),
        );
    }
    for i in 0..keys.len() {
        for j in i + 1..keys.len() {
            assert_ne!(keys[i], keys[j], "labels {i} and {j} collided");
        }
    }
}

#[test]
fn test_other_families_derive() {
    for family in [CipherFamily::Aria, CipherFamily::Seed] {
        let key =
            key_derivation(family, LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 0, 16)
                .unwrap();
        assert_eq!(key.len(), 16);
        assert_ne!(
            key,
            aes_cm_key_derivation(LABEL_SRTP_ENCRYPTION, &MASTER_KEY, &MASTER_SALT, 0, 16)
                .unwrap()
        );
    }
}

#[test]
fn test_generate_counter() {
    // With an all-zero salt the counter is just SSRC || ROC || SEQ || 0000.
    let counter = generate_counter(0xABCD, 0x11223344, 0xCAFEBABE, &[0u8; 14]);
    assert_eq!(
        counter,
        [
            0, 0, 0, 0, 0xCA, 0xFE, 0xBA, 0xBE, 0x11, 0x22, 0x33, 0x44, 0xAB, 0xCD, 0, 0
        ]
    );
}
