use super::*;
use crate::protection_profile::ProtectionProfile::*;

fn build_sr(ssrc: u32, extra: usize) -> Vec<u8> {
    // Minimal sender report: header + sender SSRC + sender info.
    let mut pkt = vec![0x80, 200, 0, 0];
    let words = (4 + 20 + extra) / 4 - 1;
    pkt[2..4].copy_from_slice(&(words as u16).to_be_bytes());
    pkt.extend_from_slice(&ssrc.to_be_bytes());
    pkt.extend_from_slice(&(0..20 + extra).map(|i| i as u8).collect::<Vec<_>>());
    pkt
}

fn random_keys(profile: ProtectionProfile) -> (Vec<u8>, Vec<u8>) {
    use rand::RngCore;
    let mut key = vec![0u8; profile.key_len()];
    let mut salt = vec![0u8; profile.salt_len()];
    rand::thread_rng().fill_bytes(&mut key);
    rand::thread_rng().fill_bytes(&mut salt);
    (key, salt)
}

fn pair(profile: ProtectionProfile) -> (Context, Context) {
    let (key, salt) = random_keys(profile);
    (
        Context::new(&key, &salt, profile).unwrap(),
        Context::new(&key, &salt, profile).unwrap(),
    )
}

#[test]
fn test_round_trip_all_profiles() {
    for profile in ProtectionProfile::supported() {
        let (mut enc, mut dec) = pair(*profile);
        for i in 0..4usize {
            let pkt = build_sr(0xFEEDFACE, i * 8);
            let protected = enc.encrypt_rtcp(&pkt).unwrap();
            let unprotected = dec.decrypt_rtcp(&protected).unwrap();
            assert_eq!(&unprotected[..], &pkt[..], "{profile}: rtcp round trip");
        }
    }
}

#[test]
fn test_trailer_layout_hmac_profile() {
    // Scenario F: a 28-byte SR under AES_CM_128_HMAC_SHA1_80 gains the
    // ESRTCP word (index 1, E bit set) and a 10-byte tag.
    let (mut enc, _) = pair(Aes128CmHmacSha1_80);
    let pkt = build_sr(0xFEEDFACE, 0);
    assert_eq!(pkt.len(), 28);

    let protected = enc.encrypt_rtcp(&pkt).unwrap();
    assert_eq!(protected.len(), 28 + 4 + 10);
    let trailer = u32::from_be_bytes([
        protected[28],
        protected[29],
        protected[30],
        protected[31],
    ]);
    assert_eq!(trailer, 0x8000_0001);
}

#[test]
fn test_index_increments_per_ssrc() {
    let (mut enc, _) = pair(Aes128CmHmacSha1_80);

    let a = enc.encrypt_rtcp(&build_sr(0x1111, 0)).unwrap();
    let b = enc.encrypt_rtcp(&build_sr(0x1111, 0)).unwrap();
    let c = enc.encrypt_rtcp(&build_sr(0x2222, 0)).unwrap();

    let index = |p: &[u8]| {
        u32::from_be_bytes([p[28], p[29], p[30], p[31]]) & 0x7FFF_FFFF
    };
    assert_eq!(index(&a), 1);
    assert_eq!(index(&b), 2);
    assert_eq!(index(&c), 1);
}

#[test]
fn test_replay_rejected() {
    let (mut enc, mut dec) = pair(AeadAes128Gcm);

    let first = enc.encrypt_rtcp(&build_sr(0x3333, 0)).unwrap();
    let second = enc.encrypt_rtcp(&build_sr(0x3333, 0)).unwrap();

    dec.decrypt_rtcp(&first).unwrap();
    dec.decrypt_rtcp(&second).unwrap();
    assert!(matches!(
        dec.decrypt_rtcp(&first),
        Err(Error::ErrDuplicated { .. })
    ));
    assert_eq!(dec.stats().replay_drops, 1);
}

#[test]
fn test_tamper_rejected() {
    let (mut enc, mut dec) = pair(Aes128CmHmacSha1_80);
    let protected = enc.encrypt_rtcp(&build_sr(0x4444, 0)).unwrap();

    let mut tampered = protected.to_vec();
    tampered[10] ^= 0x80;
    assert_eq!(
        dec.decrypt_rtcp(&tampered),
        Err(Error::ErrFailedToVerifyAuthTag)
    );
    // State untouched, the genuine packet still decrypts.
    dec.decrypt_rtcp(&protected).unwrap();
}

#[test]
fn test_mki_between_trailer_and_tag() {
    let profile = Aes128CmHmacSha1_80;
    let (key, salt) = random_keys(profile);
    let cfg = ContextConfig {
        mki: Some(vec![0x42; 3]),
        ..Default::default()
    };
    let mut enc = Context::with_config(&key, &salt, profile, cfg.clone()).unwrap();
    let mut dec = Context::with_config(&key, &salt, profile, cfg).unwrap();

    let pkt = build_sr(0x5555, 0);
    let protected = enc.encrypt_rtcp(&pkt).unwrap();
    // header+payload (28) || ESRTCP word (4) || MKI (3) || tag (10)
    assert_eq!(protected.len(), 28 + 4 + 3 + 10);
    assert_eq!(
        &protected[protected.len() - 13..protected.len() - 10],
        &[0x42; 3]
    );
    assert_eq!(&dec.decrypt_rtcp(&protected).unwrap()[..], &pkt[..]);
}

#[test]
fn test_rtcp_master_key_cap() {
    let (mut enc, _) = pair(Aes128CmHmacSha1_80);
    enc.force_rtcp_key_use(MAX_SRTCP_MASTER_KEY_LIFETIME);
    assert_eq!(
        enc.encrypt_rtcp(&build_sr(0x6666, 0)),
        Err(Error::ErrMasterKeyRotationRequired)
    );
}

#[test]
fn test_unencrypted_rtcp_is_still_authenticated() {
    // An inbound packet with the E flag clear passes authentication and is
    // delivered as-is.
    let (mut enc, mut dec) = pair(Aes128CmHmacSha1_80);
    let pkt = build_sr(0x7777, 0);
    let protected = enc.encrypt_rtcp(&pkt).unwrap();

    // Rewriting the E flag invalidates the tag; the packet must be dropped,
    // not delivered as plaintext.
    let mut cleared = protected.to_vec();
    cleared[28] &= 0x7F;
    assert_eq!(
        dec.decrypt_rtcp(&cleared),
        Err(Error::ErrFailedToVerifyAuthTag)
    );
}
