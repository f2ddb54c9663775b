#[cfg(test)]
mod dtls_transport_test;

pub mod certificate;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dtls::config::{ClientAuthType, Config as DtlsCryptoConfig, ExtendedMasterSecretType};
use dtls::conn::DTLSConn;
use dtls::extension::extension_use_srtp::SrtpProtectionProfile as WireSrtpProfile;
use srtp::ProtectionProfile;
use util::Conn;

use crate::dtls_transport::certificate::{fingerprint_of, CertificateKeyKind, DtlsCertificate};
use crate::error::{Error, Result};

/// Which end of the handshake this peer plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DtlsRole {
    /// Sends the initial ClientHello.
    #[default]
    Client,
    /// Waits for a cookie-verified ClientHello.
    Server,
}

/// Certificate fingerprint as signalled in SDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Hash algorithm name, e.g. "sha-256".
    pub algorithm: String,
    /// Colon-separated hex pairs.
    pub value: String,
}

const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration of the DTLS side of a session.
pub struct DtlsConfig {
    pub role: DtlsRole,
    /// Identity; generated (self-signed ECDSA-P256) when absent.
    pub certificate: Option<DtlsCertificate>,
    /// Profiles to offer in `use_srtp`, most preferred first.
    pub srtp_profiles: Vec<ProtectionProfile>,
    /// Fingerprint of the peer certificate from signalling; when set, a
    /// non-matching peer aborts the session.
    pub remote_fingerprint: Option<Fingerprint>,
    /// Server: how long to wait for a verified ClientHello.
    pub handshake_timeout: Duration,
    /// Session state for resumption, if a previous epoch left one.
    pub resume_state: Option<dtls::state::State>,
}

impl Default for DtlsConfig {
    fn default() -> Self {
        DtlsConfig {
            role: DtlsRole::default(),
            certificate: None,
            srtp_profiles: vec![
                ProtectionProfile::Aes128CmHmacSha1_80,
                ProtectionProfile::AeadAes128Gcm,
            ],
            remote_fingerprint: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            resume_state: None,
        }
    }
}

/// Outcome of a completed handshake: the negotiated profile and the SRTP
/// session keys pulled from the exporter.
pub struct DtlsKeyingMaterial {
    pub profile: ProtectionProfile,
    pub srtp_config: srtp::Config,
}

/// DtlsTransport runs the DTLS 1.2 handshake over a mux endpoint and turns
/// its exporter into SRTP keying material, RFC 5764.
pub struct DtlsTransport {
    role: DtlsRole,
    certificate: DtlsCertificate,
    srtp_profiles: Vec<ProtectionProfile>,
    remote_fingerprint: Option<Fingerprint>,
    handshake_timeout: Duration,
    resume_state: Option<dtls::state::State>,

    conn: Option<Arc<DTLSConn>>,
    remote_certificate: Bytes,
}

/// Profiles the DTLS stack can carry in the use_srtp extension. The rest of
/// the supported set is provisioned out of band (SDES-style keys).
fn to_wire_profile(profile: ProtectionProfile) -> Option<WireSrtpProfile> {
    match profile {
        ProtectionProfile::Aes128CmHmacSha1_80 => {
            Some(WireSrtpProfile::Srtp_Aes128_Cm_Hmac_Sha1_80)
        }
        ProtectionProfile::AeadAes128Gcm => Some(WireSrtpProfile::Srtp_Aead_Aes_128_Gcm),
        _ => None,
    }
}

fn from_wire_profile(profile: &WireSrtpProfile) -> Option<ProtectionProfile> {
    match profile {
        WireSrtpProfile::Srtp_Aes128_Cm_Hmac_Sha1_80 => {
            Some(ProtectionProfile::Aes128CmHmacSha1_80)
        }
        WireSrtpProfile::Srtp_Aead_Aes_128_Gcm => Some(ProtectionProfile::AeadAes128Gcm),
        _ => None,
    }
}

impl DtlsTransport {
    pub fn new(config: DtlsConfig) -> Result<Self> {
        let certificate = match config.certificate {
            Some(cert) => cert,
            None => DtlsCertificate::generate()?,
        };
        Ok(DtlsTransport {
            role: config.role,
            certificate,
            srtp_profiles: config.srtp_profiles,
            remote_fingerprint: config.remote_fingerprint,
            handshake_timeout: config.handshake_timeout,
            resume_state: config.resume_state,
            conn: None,
            remote_certificate: Bytes::new(),
        })
    }

    /// Factory reproducing this transport's configuration for a fresh
    /// handshake epoch (rekeying keeps the identity, drops the old
    /// session).
    pub fn rekey_config(&self) -> Box<dyn Fn() -> DtlsConfig + Send + Sync> {
        let role = self.role;
        let certificate = self.certificate.clone();
        let srtp_profiles = self.srtp_profiles.clone();
        let remote_fingerprint = self.remote_fingerprint.clone();
        let handshake_timeout = self.handshake_timeout;
        Box::new(move || DtlsConfig {
            role,
            certificate: Some(certificate.clone()),
            srtp_profiles: srtp_profiles.clone(),
            remote_fingerprint: remote_fingerprint.clone(),
            handshake_timeout,
            resume_state: None,
        })
    }

    pub fn local_fingerprint(&self) -> Fingerprint {
        Fingerprint {
            algorithm: "sha-256".to_owned(),
            value: self.certificate.fingerprint(),
        }
    }

    /// Cipher suites follow the certificate key type.
    fn cipher_suites(&self) -> Vec<dtls::cipher_suite::CipherSuiteId> {
        use dtls::cipher_suite::CipherSuiteId;
        match self.certificate.key_kind() {
            CertificateKeyKind::Rsa => vec![
                CipherSuiteId::Tls_Ecdhe_Rsa_With_Aes_128_Gcm_Sha256,
                CipherSuiteId::Tls_Ecdhe_Rsa_With_Aes_256_Cbc_Sha,
            ],
            _ => vec![
                CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256,
                CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_256_Cbc_Sha,
            ],
        }
    }

    /// Runs the handshake over `endpoint` (which must carry only DTLS
    /// packets) and extracts SRTP keys for the negotiated profile.
    pub async fn start(
        &mut self,
        endpoint: Arc<dyn Conn + Send + Sync>,
    ) -> Result<DtlsKeyingMaterial> {
        let wire_profiles: Vec<WireSrtpProfile> = self
            .srtp_profiles
            .iter()
            .copied()
            .filter_map(to_wire_profile)
            .collect();
        if wire_profiles.is_empty() {
            return Err(Error::ErrNoSrtpProtectionProfile);
        }

        let dtls_config = DtlsCryptoConfig {
            certificates: vec![self.certificate.certificate.clone()],
            cipher_suites: self.cipher_suites(),
            srtp_protection_profiles: wire_profiles,
            extended_master_secret: ExtendedMasterSecretType::Require,
            client_auth: ClientAuthType::RequireAnyClientCert,
            insecure_skip_verify: true,
            ..Default::default()
        };

        let is_client = self.role == DtlsRole::Client;
        let resume_state = self.resume_state.take();
        let handshake = DTLSConn::new(endpoint, dtls_config, is_client, resume_state);
        let dtls_conn = match tokio::time::timeout(self.handshake_timeout, handshake).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(Error::ErrDtlsHandshakeFailed(err.to_string())),
            Err(_) => return Err(Error::ErrDtlsHandshakeTimeout),
        };

        let profile = from_wire_profile(&dtls_conn.selected_srtpprotection_profile())
            .ok_or(Error::ErrNoSrtpProtectionProfile)?;

        let state = dtls_conn.connection_state().await;

        // The handshake ran with certificate verification disabled; the
        // peer is authenticated here, against the signalled fingerprint.
        let peer_certs = &state.peer_certificates;
        if peer_certs.is_empty() {
            return Err(Error::ErrNoRemoteCertificate);
        }
        self.remote_certificate = Bytes::from(peer_certs[0].clone());
        self.validate_fingerprint(&peer_certs[0])?;

        let mut srtp_config = srtp::Config {
            profile,
            ..Default::default()
        };
        srtp_config
            .extract_session_keys_from_dtls(&state, is_client)
            .await?;

        log::info!(
            "dtls handshake complete as {:?}, profile {profile}",
            self.role
        );
        self.conn = Some(Arc::new(dtls_conn));

        Ok(DtlsKeyingMaterial {
            profile,
            srtp_config,
        })
    }

    fn validate_fingerprint(&self, remote_cert: &[u8]) -> Result<()> {
        let expected = match &self.remote_fingerprint {
            Some(fp) => fp,
            None => {
                log::warn!("no remote fingerprint signalled, peer certificate unpinned");
                return Ok(());
            }
        };
        if !expected.algorithm.eq_ignore_ascii_case("sha-256") {
            return Err(Error::ErrUnsupportedFingerprintAlgorithm(
                expected.algorithm.clone(),
            ));
        }
        let actual = fingerprint_of(remote_cert);
        if actual.eq_ignore_ascii_case(&expected.value) {
            Ok(())
        } else {
            Err(Error::ErrFingerprintMismatch)
        }
    }

    /// Leaf certificate presented by the peer, captured after the
    /// handshake.
    pub fn remote_certificate(&self) -> Bytes {
        self.remote_certificate.clone()
    }

    pub async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
        }
        Ok(())
    }
}
