use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("no such SRTP protection profile: {0}")]
    ErrNoSuchProfile(String),
    #[error("SRTP master key must be len {0}, got {1}")]
    SrtpMasterKeyLength(usize, usize),
    #[error("SRTP master salt must be len {0}, got {1}")]
    SrtpSaltLength(usize, usize),
    #[error("MKI must be at most 255 bytes, got {0}")]
    ErrMkiTooLong(usize),
    #[error("key derivation rate must be a power of two, got {0}")]
    ErrBadKeyDerivationRate(u64),
    #[error("key derivation rate is not supported for AEAD profiles")]
    ErrKdrUnsupportedForAead,
    #[error("packet is too short to be an RTP packet")]
    ErrTooShortRtp,
    #[error("packet is too short to be an RTCP packet")]
    ErrTooShortRtcp,
    #[error("malformed RTP header")]
    ErrMalformedRtp,
    #[error("failed to verify auth tag")]
    ErrFailedToVerifyAuthTag,
    #[error("MKI mismatch")]
    ErrMkiMismatch,
    #[error("srtp ssrc={ssrc} index={index}: duplicated")]
    ErrDuplicated { ssrc: u32, index: u64 },
    #[error("srtp ssrc={ssrc} index={index}: older than replay window")]
    ErrTooOld { ssrc: u32, index: u64 },
    #[error("master key reached its packet lifetime, rekeying required")]
    ErrMasterKeyRotationRequired,
    #[error("malformed original header block")]
    ErrMalformedOhb,
    #[error("{0}")]
    Other(String),
}

impl From<aead::Error> for Error {
    fn from(_: aead::Error) -> Self {
        Error::ErrFailedToVerifyAuthTag
    }
}
