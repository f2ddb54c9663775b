use tokio::sync::mpsc;

use super::*;
use crate::cipher::cipher_double_aead::{CipherDoubleAead, Ohb};
use crate::protection_profile::ProtectionProfile::*;

fn build_rtp(ssrc: u32, seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0u8; 12];
    pkt[0] = 0x80;
    pkt[1] = 0x60;
    pkt[2..4].copy_from_slice(&seq.to_be_bytes());
    pkt[4..8].copy_from_slice(&0x01020304u32.to_be_bytes());
    pkt[8..12].copy_from_slice(&ssrc.to_be_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

fn build_rtp_with_ext(ssrc: u32, seq: u16, ext_words: usize, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0u8; 12];
    pkt[0] = 0x80 | 0x10;
    pkt[1] = 0x60;
    pkt[2..4].copy_from_slice(&seq.to_be_bytes());
    pkt[8..12].copy_from_slice(&ssrc.to_be_bytes());
    pkt.extend_from_slice(&0xBEDEu16.to_be_bytes());
    pkt.extend_from_slice(&(ext_words as u16).to_be_bytes());
    for i in 0..ext_words * 4 {
        pkt.push(0x10 + i as u8);
    }
    pkt.extend_from_slice(payload);
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

        for (seq, len) in [(0u16, 0usize), (1, 1), (2, 160), (3, 1400)] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let pkt = build_rtp(0xCAFEBABE, seq, &payload);

            let protected = enc.encrypt_rtp(&pkt).unwrap();
            assert!(
                protected.len() >= pkt.len(),
                "{profile}: protected packet shrank"
            );
            if *profile != NullHmacSha1_80 && *profile != NullHmacSha1_32 && payload.len() >= 8 {
                assert_ne!(
                    &protected[12..20],
                    &pkt[12..20],
                    "{profile}: payload left in clear"
                );
            }

            let unprotected = dec.decrypt_rtp(&protected).unwrap();
            assert_eq!(&unprotected[..], &pkt[..], "{profile}: round trip failed");
        }
    }
}

#[test]
fn test_protect_appends_ten_byte_tag() {
    // Scenario A shape: AES_CM_128_HMAC_SHA1_80 appends exactly 10 bytes.
    let (mut enc, _) = pair(Aes128CmHmacSha1_80);
    let pkt = build_rtp(0xCAFEBABE, 0, &[0x41; 16]);
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_eq!(protected.len(), pkt.len() + 10);
}

#[test]
fn test_aead_growth_is_tag_sized() {
    // Scenario B: AEAD_AES_128_GCM grows a 200-byte payload by 16 bytes.
    let (mut enc, mut dec) = pair(AeadAes128Gcm);
    let payload = vec![0x5Au8; 200];
    let pkt = build_rtp(0x1234, 9, &payload);
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_eq!(protected.len(), pkt.len() + 16);
    let unprotected = dec.decrypt_rtp(&protected).unwrap();
    assert_eq!(&unprotected[12..], &payload[..]);
}

#[test]
fn test_index_binding_on_send() {
    // A packet protected under ROC=1, SEQ=5 only authenticates for a
    // receiver whose rollover counter agrees (index 0x00010005).
    let profile = Aes128CmHmacSha1_80;
    let (key, salt) = random_keys(profile);
    let pkt = build_rtp(0xCAFEBABE, 5, b"media");

    let mut enc = Context::new(&key, &salt, profile).unwrap();
    enc.set_roc(1);
    let protected = enc.encrypt_rtp(&pkt).unwrap();

    let mut dec_wrong = Context::new(&key, &salt, profile).unwrap();
    assert_eq!(
        dec_wrong.decrypt_rtp(&protected),
        Err(Error::ErrFailedToVerifyAuthTag)
    );

    let mut dec = Context::new(&key, &salt, profile).unwrap();
    dec.set_roc(1);
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);
}

#[test]
fn test_guess_rollover_count() {
    // RFC 3711 Appendix A worked example.
    assert_eq!(Context::guess_rollover_count(2, true, 0xFFFE, 7), 6);
    // In-window forward motion stays on the current ROC.
    assert_eq!(Context::guess_rollover_count(100, true, 101, 7), 7);
    // Wrap forward.
    assert_eq!(Context::guess_rollover_count(0xFFF0, true, 2, 7), 8);
    // Unseeded state trusts the context ROC.
    assert_eq!(Context::guess_rollover_count(0, false, 0xFFFE, 3), 3);
}

#[test]
fn test_roc_advances_across_wraparound() {
    let (mut enc, mut dec) = pair(AeadAes128Gcm);

    for seq in [0xFFFEu16, 0xFFFF, 0, 1] {
        let pkt = build_rtp(0xABCD, seq, b"payload");
        let protected = enc.encrypt_rtp(&pkt).unwrap();
        let unprotected = dec.decrypt_rtp(&protected).unwrap();
        assert_eq!(&unprotected[..], &pkt[..], "seq {seq}");
    }
    assert_eq!(enc.roc(), 1);
    assert_eq!(dec.roc(), 1);
}

#[test]
fn test_replay_rejection() {
    let (mut enc, mut dec) = pair(Aes128CmHmacSha1_80);

    let mut protected = Vec::new();
    for seq in [100u16, 101, 102, 103] {
        let pkt = build_rtp(0xCAFEBABE, seq, b"data");
        protected.push(enc.encrypt_rtp(&pkt).unwrap());
    }

    // Delivered out of order: 100, 101, 103, 102 all pass.
    for i in [0usize, 1, 3, 2] {
        dec.decrypt_rtp(&protected[i]).unwrap();
    }

    // A repeat is rejected and counted.
    assert!(matches!(
        dec.decrypt_rtp(&protected[1]),
        Err(Error::ErrDuplicated { .. })
    ));
    assert_eq!(dec.stats().replay_drops, 1);
}

#[test]
fn test_replay_too_old() {
    let (mut enc, mut dec) = pair(Aes128CmHmacSha1_80);

    let early = enc.encrypt_rtp(&build_rtp(0x42, 30, b"x")).unwrap();
    for seq in [100u16, 101] {
        let p = enc.encrypt_rtp(&build_rtp(0x42, seq, b"x")).unwrap();
        dec.decrypt_rtp(&p).unwrap();
    }

    // 101 - 30 > 64: outside the window.
    assert!(matches!(
        dec.decrypt_rtp(&early),
        Err(Error::ErrTooOld { .. })
    ));
}

#[test]
fn test_tamper_detection_leaves_state_unchanged() {
    let (mut enc, mut dec) = pair(Aes128CmHmacSha1_80);

    let pkt = build_rtp(0xCAFEBABE, 7, b"sensitive");
    let protected = enc.encrypt_rtp(&pkt).unwrap();

    // Flip one bit in the header, the payload and the tag in turn.
    for pos in [1usize, 14, protected.len() - 1] {
        let mut tampered = protected.to_vec();
        tampered[pos] ^= 0x01;
        assert_eq!(
            dec.decrypt_rtp(&tampered),
            Err(Error::ErrFailedToVerifyAuthTag),
            "bit at {pos}"
        );
    }
    assert_eq!(dec.stats().auth_failures, 3);

    // The window never saw the index, so the untampered packet still lands.
    dec.decrypt_rtp(&protected).unwrap();
}

#[test]
fn test_master_key_lifetime_cap() {
    let (events_tx, mut events_rx) = mpsc::channel(1);
    let (key, salt) = random_keys(Aes128CmHmacSha1_80);
    let mut enc = Context::with_config(
        &key,
        &salt,
        Aes128CmHmacSha1_80,
        ContextConfig {
            events: Some(events_tx),
            ..Default::default()
        },
    )
    .unwrap();

    enc.force_rtp_key_use(MAX_SRTP_MASTER_KEY_LIFETIME);
    let pkt = build_rtp(0x99, 1, b"over budget");
    assert_eq!(
        enc.encrypt_rtp(&pkt),
        Err(Error::ErrMasterKeyRotationRequired)
    );
    assert_eq!(
        events_rx.try_recv().unwrap(),
        SrtpEvent::RekeyingRequested { is_rtcp: false }
    );

    // Still failing, but the event fires only once.
    assert_eq!(
        enc.encrypt_rtp(&pkt),
        Err(Error::ErrMasterKeyRotationRequired)
    );
    assert!(events_rx.try_recv().is_err());
}

#[test]
fn test_mki_round_trip_and_mismatch() {
    let profile = Aes128CmHmacSha1_80;
    let (key, salt) = random_keys(profile);
    let with_mki = |mki: &[u8]| ContextConfig {
        mki: Some(mki.to_vec()),
        ..Default::default()
    };

    let mut enc =
        Context::with_config(&key, &salt, profile, with_mki(&[1, 2, 3, 4])).unwrap();
    let pkt = build_rtp(0xCAFEBABE, 3, b"keyed");
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    // tag (10) + mki (4)
    assert_eq!(protected.len(), pkt.len() + 14);
    // The MKI sits between the payload and the tag.
    assert_eq!(&protected[protected.len() - 14..protected.len() - 10], &[1, 2, 3, 4]);

    let mut dec_wrong =
        Context::with_config(&key, &salt, profile, with_mki(&[9, 9, 9, 9])).unwrap();
    assert_eq!(dec_wrong.decrypt_rtp(&protected), Err(Error::ErrMkiMismatch));
    assert_eq!(dec_wrong.stats().mki_failures, 1);

    let mut dec =
        Context::with_config(&key, &salt, profile, with_mki(&[1, 2, 3, 4])).unwrap();
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);
}

#[test]
fn test_mki_with_aead_sits_at_tail() {
    let profile = AeadAes128Gcm;
    let (key, salt) = random_keys(profile);
    let cfg = ContextConfig {
        mki: Some(vec![0xAB, 0xCD]),
        ..Default::default()
    };
    let mut enc = Context::with_config(&key, &salt, profile, cfg.clone()).unwrap();
    let mut dec = Context::with_config(&key, &salt, profile, cfg).unwrap();

    let pkt = build_rtp(0x77, 8, b"aead payload");
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_eq!(&protected[protected.len() - 2..], &[0xAB, 0xCD]);
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);
}

#[test]
fn test_header_extension_encryption() {
    let profile = Aes128CmHmacSha1_80;
    let (key, salt) = random_keys(profile);
    let with_mask = |mask: Vec<u8>| ContextConfig {
        header_extension_mask: Some(mask),
        ..Default::default()
    };

    let pkt = build_rtp_with_ext(0xCAFEBABE, 11, 2, b"payload");
    let header = RtpHeader::unmarshal(&pkt).unwrap();
    let ext_range = header.ext_offset..header.ext_offset + header.ext_len;

    // All-ones mask: wire extension differs, round trip restores it.
    let mut enc =
        Context::with_config(&key, &salt, profile, with_mask(vec![0xFF; 8])).unwrap();
    let mut dec =
        Context::with_config(&key, &salt, profile, with_mask(vec![0xFF; 8])).unwrap();
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_ne!(&protected[ext_range.clone()], &pkt[ext_range.clone()]);
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);

    // All-zeros mask: wire extension unchanged.
    let mut enc =
        Context::with_config(&key, &salt, profile, with_mask(vec![0x00; 8])).unwrap();
    let mut dec =
        Context::with_config(&key, &salt, profile, with_mask(vec![0x00; 8])).unwrap();
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_eq!(&protected[ext_range.clone()], &pkt[ext_range.clone()]);
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);
}

#[test]
fn test_double_aead_ohb_restores_sequence() {
    let profile = DoubleAeadAes128Gcm;
    let (key, salt) = random_keys(profile);

    // A hop rewrote the wire sequence number; the OHB carries the
    // original. The receiving context must deliver the original.
    let original_seq = 1000u16;
    let wire_seq = 2000u16;
    let pkt = build_rtp(0xCAFEBABE, wire_seq, b"end to end media");
    let header = RtpHeader::unmarshal(&pkt).unwrap();

    let mut sender = CipherDoubleAead::new(profile, &key, &salt).unwrap();
    let protected = sender
        .encrypt_rtp_with_ohb(
            &pkt,
            &header,
            0,
            &Ohb {
                seq: Some(original_seq),
                ..Default::default()
            },
        )
        .unwrap();

    let mut dec = Context::new(&key, &salt, profile).unwrap();
    let delivered = dec.decrypt_rtp(&protected).unwrap();
    assert_eq!(
        u16::from_be_bytes([delivered[2], delivered[3]]),
        original_seq
    );
    assert_eq!(&delivered[12..], b"end to end media");
}

#[test]
fn test_key_derivation_rate_round_trip() {
    let profile = Aes128CmHmacSha1_80;
    let (key, salt) = random_keys(profile);
    let with_kdr = || ContextConfig {
        key_derivation_rate: 1 << 16,
        ..Default::default()
    };
    let mut enc = Context::with_config(&key, &salt, profile, with_kdr()).unwrap();
    let mut dec = Context::with_config(&key, &salt, profile, with_kdr()).unwrap();

    // r = 0 segment.
    let pkt = build_rtp(0x31, 40, b"segment zero");
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);

    // r = 1 segment (ROC = 1 ⇒ index ≥ 2^16).
    enc.set_roc(1);
    dec.set_roc(1);
    let pkt = build_rtp(0x31, 41, b"segment one");
    let protected = enc.encrypt_rtp(&pkt).unwrap();
    assert_eq!(&dec.decrypt_rtp(&protected).unwrap()[..], &pkt[..]);
}
