use std::net::AddrParseError;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("turn: allocate failed after max retries")]
    ErrMaxRetriesExceeded,
    #[error("turn: allocate rejected with code {0}")]
    ErrAllocateFailed(u16),
    #[error("turn: create-permission rejected with code {0}")]
    ErrPermissionFailed(u16),
    #[error("turn: refresh rejected with code {0}")]
    ErrRefreshFailed(u16),
    #[error("turn: transaction timed out")]
    ErrTransactionTimeout,
    #[error("turn: transaction closed")]
    ErrTransactionClosed,
    #[error("turn: no allocation on this client")]
    ErrNoAllocation,
    #[error("turn: response from unexpected source")]
    ErrUnexpectedOrigin,
    #[error("turn: packet is not a STUN message")]
    ErrNonStunMessage,
    #[error("turn: unresolvable server address {0}")]
    ErrUnresolvableAddr(String),
    #[error("turn: client is closed")]
    ErrClientClosed,
    #[error("{0}")]
    Stun(#[from] stun::Error),
    #[error("{0}")]
    Util(#[from] util::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Addr(#[from] AddrParseError),
    #[error("{0}")]
    Other(String),
}
