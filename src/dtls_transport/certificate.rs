#[cfg(test)]
mod certificate_test;

use dtls::crypto::{Certificate, CryptoPrivateKey, CryptoPrivateKeyKind};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, RsaKeyPair};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::error::{Error, Result};

/// Key algorithm backing the DTLS identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKeyKind {
    Ecdsa,
    Rsa,
    Ed25519,
}

/// Self-signed X.509 identity used to authenticate the DTLS handshake.
/// Peers pin it via the fingerprint exchanged in signalling, not via a CA.
#[derive(Clone)]
pub struct DtlsCertificate {
    pub(crate) certificate: Certificate,
    kind: CertificateKeyKind,
}

impl DtlsCertificate {
    /// Generates the default identity: self-signed ECDSA-P256, CN "DTLS",
    /// valid from a day ago to thirty days out.
    pub fn generate() -> Result<Self> {
        let key_pair = KeyPair::generate(&rcgen::PKCS_ECDSA_P256_SHA256)
            .map_err(|e| Error::Certificate(e.to_string()))?;
        Self::from_key_pair(key_pair)
    }

    /// Builds the identity from a caller-supplied key pair (ECDSA, RSA or
    /// Ed25519, e.g. an RSA key imported from PEM).
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self> {
        let (alg, kind) = if key_pair.is_compatible(&rcgen::PKCS_ED25519) {
            (&rcgen::PKCS_ED25519, CertificateKeyKind::Ed25519)
        } else if key_pair.is_compatible(&rcgen::PKCS_ECDSA_P256_SHA256) {
            (&rcgen::PKCS_ECDSA_P256_SHA256, CertificateKeyKind::Ecdsa)
        } else if key_pair.is_compatible(&rcgen::PKCS_RSA_SHA256) {
            (&rcgen::PKCS_RSA_SHA256, CertificateKeyKind::Rsa)
        } else {
            return Err(Error::Certificate("unsupported key pair".to_owned()));
        };

        let serialized_der = key_pair.serialize_der();
        let private_key = match kind {
            CertificateKeyKind::Ed25519 => CryptoPrivateKey {
                kind: CryptoPrivateKeyKind::Ed25519(
                    Ed25519KeyPair::from_pkcs8(&serialized_der)
                        .map_err(|e| Error::Certificate(e.to_string()))?,
                ),
                serialized_der,
            },
            CertificateKeyKind::Ecdsa => CryptoPrivateKey {
                kind: CryptoPrivateKeyKind::Ecdsa256(
                    EcdsaKeyPair::from_pkcs8(
                        &ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING,
                        &serialized_der,
                    )
                    .map_err(|e| Error::Certificate(e.to_string()))?,
                ),
                serialized_der,
            },
            CertificateKeyKind::Rsa => CryptoPrivateKey {
                kind: CryptoPrivateKeyKind::Rsa256(
                    RsaKeyPair::from_pkcs8(&serialized_der)
                        .map_err(|e| Error::Certificate(e.to_string()))?,
                ),
                serialized_der,
            },
        };

        let mut params = CertificateParams::new(vec!["DTLS".to_owned()]);
        params.alg = alg;
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "DTLS");
        params.distinguished_name = dn;
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::days(1);
        params.not_after = now + Duration::days(30);
        params.key_pair = Some(key_pair);

        let x509 =
            rcgen::Certificate::from_params(params).map_err(|e| Error::Certificate(e.to_string()))?;
        let der = x509
            .serialize_der()
            .map_err(|e| Error::Certificate(e.to_string()))?;

        Ok(DtlsCertificate {
            certificate: Certificate {
                certificate: vec![rustls::Certificate(der)],
                private_key,
            },
            kind,
        })
    }

    pub fn key_kind(&self) -> CertificateKeyKind {
        self.kind
    }

    /// SHA-256 fingerprint of the leaf as colon-separated uppercase hex,
    /// the form signalled in SDP `a=fingerprint`.
    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.certificate.certificate[0].0)
    }
}

/// Fingerprints arbitrary certificate DER the same way.
pub fn fingerprint_of(der: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(der);
    let hashed = h.finalize();
    hashed
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}
