use super::*;

#[test]
fn test_generate_ecdsa_default() {
    let cert = DtlsCertificate::generate().unwrap();
    assert_eq!(cert.key_kind(), CertificateKeyKind::Ecdsa);
    assert!(!cert.certificate.certificate.is_empty());
}

#[test]
fn test_fingerprint_format() {
    let cert = DtlsCertificate::generate().unwrap();
    let fp = cert.fingerprint();

    // SHA-256: 32 uppercase hex pairs joined by colons.
    let parts: Vec<&str> = fp.split(':').collect();
    assert_eq!(parts.len(), 32);
    for part in parts {
        assert_eq!(part.len(), 2);
        assert!(part
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}

#[test]
fn test_fingerprints_are_unique_per_certificate() {
    let a = DtlsCertificate::generate().unwrap();
    let b = DtlsCertificate::generate().unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());

    // And stable for the same DER.
    assert_eq!(
        fingerprint_of(&a.certificate.certificate[0].0),
        a.fingerprint()
    );
}
