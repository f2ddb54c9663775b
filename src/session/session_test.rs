use std::net::SocketAddr;

use srtp::ProtectionProfile;
use tokio::sync::mpsc;

use super::*;
use crate::dtls_transport::certificate::DtlsCertificate;
use crate::dtls_transport::{DtlsRole, Fingerprint};

fn build_rtp(ssrc: u32, seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0u8; 12];
    pkt[0] = 0x80;
    pkt[1] = 0x60;
    pkt[2..4].copy_from_slice(&seq.to_be_bytes());
    pkt[8..12].copy_from_slice(&ssrc.to_be_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

fn build_sr(ssrc: u32) -> Vec<u8> {
    let mut pkt = vec![0x80, 200, 0, 6];
    pkt.extend_from_slice(&ssrc.to_be_bytes());
    pkt.extend_from_slice(&[0u8; 20]);
    pkt
}

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn preshared_configs(profile: ProtectionProfile) -> (srtp::Config, srtp::Config) {
    use rand::RngCore;
    let mut key_a = vec![0u8; profile.key_len()];
    let mut salt_a = vec![0u8; profile.salt_len()];
    let mut key_b = vec![0u8; profile.key_len()];
    let mut salt_b = vec![0u8; profile.salt_len()];
    rand::thread_rng().fill_bytes(&mut key_a);
    rand::thread_rng().fill_bytes(&mut salt_a);
    rand::thread_rng().fill_bytes(&mut key_b);
    rand::thread_rng().fill_bytes(&mut salt_b);

    let a = srtp::Config {
        profile,
        keys: srtp::SessionKeys {
            local_master_key: key_a.clone(),
            local_master_salt: salt_a.clone(),
            remote_master_key: key_b.clone(),
            remote_master_salt: salt_b.clone(),
        },
        ..Default::default()
    };
    let b = srtp::Config {
        profile,
        keys: srtp::SessionKeys {
            local_master_key: key_b,
            local_master_salt: salt_b,
            remote_master_key: key_a,
            remote_master_salt: salt_a,
        },
        ..Default::default()
    };
    (a, b)
}

/// Binds two sessions at each other. Ports are only known after bind, so
/// the second session is started against the first one's address and the
/// first is then created pointing back.
async fn session_pair(
    keying_a: Keying,
    keying_b: Keying,
    profile_hint: &str,
) -> (MediaSession, MediaSession) {
    // Reserve both ports first so each config can name its peer.
    let probe_a = tokio::net::UdpSocket::bind(loopback()).await.unwrap();
    let probe_b = tokio::net::UdpSocket::bind(loopback()).await.unwrap();
    let addr_a = probe_a.local_addr().unwrap();
    let addr_b = probe_b.local_addr().unwrap();
    drop(probe_a);
    drop(probe_b);

    let config_a = SessionConfig::new(addr_a, addr_b, keying_a);
    let config_b = SessionConfig::new(addr_b, addr_a, keying_b);

    let (a, b) = tokio::join!(MediaSession::start(config_a), MediaSession::start(config_b));
    (
        a.unwrap_or_else(|e| panic!("session a ({profile_hint}): {e}")),
        b.unwrap_or_else(|e| panic!("session b ({profile_hint}): {e}")),
    )
}

async fn assert_media_flows(a: &MediaSession, b: &MediaSession) {
    let (rtp_tx, mut rtp_rx) = mpsc::channel::<Bytes>(4);
    b.on_rtp(Box::new(move |pkt| {
        let rtp_tx = rtp_tx.clone();
        Box::pin(async move {
            let _ = rtp_tx.send(pkt).await;
        })
    }))
    .await;

    let (rtcp_tx, mut rtcp_rx) = mpsc::channel::<Bytes>(4);
    b.on_rtcp(Box::new(move |pkt| {
        let rtcp_tx = rtcp_tx.clone();
        Box::pin(async move {
            let _ = rtcp_tx.send(pkt).await;
        })
    }))
    .await;

    let rtp = build_rtp(0xCAFEBABE, 1, b"media payload");
    a.send_rtp(&rtp).await.unwrap();
    let delivered = tokio::time::timeout(std::time::Duration::from_secs(5), rtp_rx.recv())
        .await
        .expect("rtp delivery timed out")
        .unwrap();
    assert_eq!(&delivered[..], &rtp[..]);

    let rtcp = build_sr(0xCAFEBABE);
    a.send_rtcp(&rtcp).await.unwrap();
    let delivered = tokio::time::timeout(std::time::Duration::from_secs(5), rtcp_rx.recv())
        .await
        .expect("rtcp delivery timed out")
        .unwrap();
    assert_eq!(&delivered[..], &rtcp[..]);
}

#[tokio::test]
async fn test_preshared_session_loopback() {
    let (cfg_a, cfg_b) = preshared_configs(ProtectionProfile::Aes128CmHmacSha1_80);
    let (a, b) = session_pair(
        Keying::Preshared(cfg_a),
        Keying::Preshared(cfg_b),
        "AES_CM_128",
    )
    .await;

    assert_media_flows(&a, &b).await;

    assert_eq!(b.stats().rtp_received, 1);
    assert_eq!(b.stats().rtp_dropped, 0);

    a.close("test done").await.unwrap();
    b.close("test done").await.unwrap();
}

#[tokio::test]
async fn test_preshared_session_exotic_profile() {
    // The SDES path carries profiles DTLS cannot negotiate.
    let (cfg_a, cfg_b) = preshared_configs(ProtectionProfile::SeedCtrHmacSha1_80);
    let (a, b) = session_pair(
        Keying::Preshared(cfg_a),
        Keying::Preshared(cfg_b),
        "SEED_CTR",
    )
    .await;
    assert_media_flows(&a, &b).await;
    a.close("test done").await.unwrap();
    b.close("test done").await.unwrap();
}

#[tokio::test]
async fn test_dtls_session_end_to_end() {
    let cert_a = DtlsCertificate::generate().unwrap();
    let cert_b = DtlsCertificate::generate().unwrap();
    let fp_a = Fingerprint {
        algorithm: "sha-256".to_owned(),
        value: cert_a.fingerprint(),
    };
    let fp_b = Fingerprint {
        algorithm: "sha-256".to_owned(),
        value: cert_b.fingerprint(),
    };

    let dtls_a = crate::dtls_transport::DtlsConfig {
        role: DtlsRole::Client,
        certificate: Some(cert_a),
        remote_fingerprint: Some(fp_b),
        ..Default::default()
    };
    let dtls_b = crate::dtls_transport::DtlsConfig {
        role: DtlsRole::Server,
        certificate: Some(cert_b),
        remote_fingerprint: Some(fp_a),
        ..Default::default()
    };

    let (a, b) = session_pair(Keying::Dtls(dtls_a), Keying::Dtls(dtls_b), "dtls").await;
    assert_media_flows(&a, &b).await;
    a.close("test done").await.unwrap();
    b.close("test done").await.unwrap();
}

#[tokio::test]
async fn test_session_sends_without_listening_peer() {
    // Protect-and-send must not depend on the peer being up.
    let probe = tokio::net::UdpSocket::bind(loopback()).await.unwrap();
    let peer = probe.local_addr().unwrap();
    drop(probe);

    let (cfg, _) = preshared_configs(ProtectionProfile::Aes128CmHmacSha1_80);
    let session = MediaSession::start(SessionConfig::new(loopback(), peer, Keying::Preshared(cfg)))
        .await
        .unwrap();
    session.send_rtp(&build_rtp(0x1, 1, b"x")).await.unwrap();

    let stats = session.stats();
    assert_eq!(stats.rtp_received, 0);
    assert_eq!(stats.rtp_dropped, 0);
    session.close("test done").await.unwrap();
}
