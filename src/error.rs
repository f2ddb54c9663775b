use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("TURN allocation failed")]
    ErrTurnAllocateFailed,
    #[error("TURN permission failed")]
    ErrTurnPermissionFailed,
    #[error("DTLS handshake timed out")]
    ErrDtlsHandshakeTimeout,
    #[error("DTLS handshake failed: {0}")]
    ErrDtlsHandshakeFailed(String),
    #[error("no common SRTP protection profile")]
    ErrNoSrtpProtectionProfile,
    #[error("peer presented no certificate")]
    ErrNoRemoteCertificate,
    #[error("remote certificate does not match the signalled fingerprint")]
    ErrFingerprintMismatch,
    #[error("unsupported fingerprint algorithm {0}")]
    ErrUnsupportedFingerprintAlgorithm(String),
    #[error("certificate: {0}")]
    Certificate(String),
    #[error("session is not started")]
    ErrSessionNotStarted,
    #[error("session is closed")]
    ErrSessionClosed,
    #[error("{0}")]
    Srtp(#[from] srtp::Error),
    #[error("{0}")]
    Turn(#[from] turn::Error),
    #[error("{0}")]
    Stun(#[from] stun::Error),
    #[error("{0}")]
    Util(#[from] util::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}
