use std::sync::Arc;

use tokio::net::UdpSocket;
use util::Conn;

use super::certificate::DtlsCertificate;
use super::*;

async fn udp_pair() -> (Arc<dyn Conn + Send + Sync>, Arc<dyn Conn + Send + Sync>) {
    let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();
    (Arc::new(a), Arc::new(b))
}

fn transport(
    role: DtlsRole,
    certificate: DtlsCertificate,
    remote_fingerprint: Option<Fingerprint>,
) -> DtlsTransport {
    DtlsTransport::new(DtlsConfig {
        role,
        certificate: Some(certificate),
        remote_fingerprint,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_handshake_exports_matching_keys() {
    let (client_conn, server_conn) = udp_pair().await;

    let client_cert = DtlsCertificate::generate().unwrap();
    let server_cert = DtlsCertificate::generate().unwrap();
    let client_fp = Fingerprint {
        algorithm: "sha-256".to_owned(),
        value: client_cert.fingerprint(),
    };
    let server_fp = Fingerprint {
        algorithm: "sha-256".to_owned(),
        value: server_cert.fingerprint(),
    };

    let mut client = transport(DtlsRole::Client, client_cert, Some(server_fp));
    let mut server = transport(DtlsRole::Server, server_cert, Some(client_fp));

    let (client_res, server_res) =
        tokio::join!(client.start(client_conn), server.start(server_conn));
    let client_keys = client_res.unwrap();
    let server_keys = server_res.unwrap();

    assert_eq!(client_keys.profile, server_keys.profile);

    // The exporter output is mirrored across the two ends.
    let ck = &client_keys.srtp_config.keys;
    let sk = &server_keys.srtp_config.keys;
    assert_eq!(ck.local_master_key, sk.remote_master_key);
    assert_eq!(ck.local_master_salt, sk.remote_master_salt);
    assert_eq!(ck.remote_master_key, sk.local_master_key);
    assert_ne!(ck.local_master_key, ck.remote_master_key);

    assert!(!client.remote_certificate().is_empty());

    client.close().await.unwrap();
    server.close().await.unwrap();
}

#[tokio::test]
async fn test_handshake_rejects_wrong_fingerprint() {
    let (client_conn, server_conn) = udp_pair().await;

    let client_cert = DtlsCertificate::generate().unwrap();
    let server_cert = DtlsCertificate::generate().unwrap();

    // The client pins a fingerprint that belongs to neither side.
    let bogus = Fingerprint {
        algorithm: "sha-256".to_owned(),
        value: DtlsCertificate::generate().unwrap().fingerprint(),
    };

    let mut client = transport(DtlsRole::Client, client_cert, Some(bogus));
    let mut server = transport(DtlsRole::Server, server_cert, None);

    let (client_res, _server_res) =
        tokio::join!(client.start(client_conn), server.start(server_conn));
    assert!(matches!(client_res, Err(Error::ErrFingerprintMismatch)));
}

#[tokio::test]
async fn test_server_times_out_without_client() {
    let (_quiet, server_conn) = udp_pair().await;

    let mut server = DtlsTransport::new(DtlsConfig {
        role: DtlsRole::Server,
        handshake_timeout: std::time::Duration::from_millis(300),
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(
        server.start(server_conn).await,
        Err(Error::ErrDtlsHandshakeTimeout)
    ));
}

#[test]
fn test_profile_mapping_is_symmetric() {
    for profile in [
        srtp::ProtectionProfile::Aes128CmHmacSha1_80,
        srtp::ProtectionProfile::AeadAes128Gcm,
    ] {
        let wire = to_wire_profile(profile).unwrap();
        assert_eq!(from_wire_profile(&wire), Some(profile));
    }
    // Everything else travels over the SDES path only.
    assert!(to_wire_profile(srtp::ProtectionProfile::SeedCtrHmacSha1_80).is_none());
    assert!(to_wire_profile(srtp::ProtectionProfile::DoubleAeadAes128Gcm).is_none());
}
