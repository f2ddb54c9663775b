#![warn(rust_2018_idioms)]

//! Media-plane security and connectivity pipeline for a SIP stack: a TURN
//! client establishing a relay path, a DTLS-SRTP handshake producing SRTP
//! master keys, and SRTP/SRTCP contexts protecting the media itself, all
//! multiplexed over one UDP socket.

pub mod dtls_transport;
pub mod error;
pub mod mux;
pub mod session;

pub use dtls_transport::certificate::DtlsCertificate;
pub use dtls_transport::{DtlsConfig, DtlsRole, Fingerprint};
pub use error::Error;
pub use session::{IceServerConfig, Keying, MediaSession, SessionConfig};
