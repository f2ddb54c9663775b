use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("buffer too small for STUN header")]
    ErrUnexpectedHeaderEof,
    #[error("invalid magic cookie")]
    ErrInvalidMagicCookie,
    #[error("attribute size overflows message")]
    ErrAttributeSizeOverflow,
    #[error("integrity check failed")]
    ErrIntegrityMismatch,
    #[error("bad IP address length {0}")]
    ErrBadIpLength(usize),
    #[error("unexpected address family 0x{0:02x}")]
    ErrBadAddressFamily(u8),
    #[error("attribute value is not valid UTF-8")]
    ErrBadUtf8,
    #[error("error-code attribute too short")]
    ErrErrorCodeTooShort,
    #[error("{0}")]
    Other(String),
}
