#[cfg(test)]
mod mux_test;

pub mod endpoint;

use std::net::SocketAddr;
use std::sync::Arc;

use turn::client::Client as TurnClient;
use util::Conn;

use crate::error::Result;

/// Largest datagram the session reads in one go. WebRTC stacks have been
/// observed fragmenting DTLS flights close to this size.
pub const RECEIVE_MTU: usize = 3000;

/// Classification of one inbound datagram by its first byte, RFC 7983.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Stun,
    Dtls,
    Rtp,
    Rtcp,
}

/// Classifies a datagram shared between STUN, DTLS and SRTP on one socket.
/// Returns `None` for the reserved range and for garbage, which callers
/// drop. The secondary payload-type probe separates RTCP from RTP.
pub fn classify(buf: &[u8]) -> Option<PacketKind> {
    let first = *buf.first()?;
    match first {
        0..=19 => Some(PacketKind::Stun),
        20..=63 => Some(PacketKind::Dtls),
        64..=127 => None,
        128..=191 => {
            if buf.len() >= 2 && (64..96).contains(&(buf[1] & 0x7F)) {
                Some(PacketKind::Rtcp)
            } else {
                Some(PacketKind::Rtp)
            }
        }
        _ => None,
    }
}

/// How protected media leaves the socket: straight to the peer, or wrapped
/// in TURN Send indications through the relay.
pub(crate) enum OutboundPath {
    Direct { peer: SocketAddr },
    Relay { client: Arc<TurnClient>, peer: SocketAddr },
}

impl Clone for OutboundPath {
    fn clone(&self) -> Self {
        match self {
            OutboundPath::Direct { peer } => OutboundPath::Direct { peer: *peer },
            OutboundPath::Relay { client, peer } => OutboundPath::Relay {
                client: Arc::clone(client),
                peer: *peer,
            },
        }
    }
}

/// The one socket of a session plus its outbound path. Endpoints and the
/// session share it. The path flips from direct to relayed once the TURN
/// allocation lands.
pub(crate) struct Transport {
    pub(crate) conn: Arc<dyn Conn + Send + Sync>,
    path: std::sync::Mutex<OutboundPath>,
}

impl Transport {
    pub(crate) fn new(conn: Arc<dyn Conn + Send + Sync>, path: OutboundPath) -> Self {
        Transport {
            conn,
            path: std::sync::Mutex::new(path),
        }
    }

    pub(crate) fn set_path(&self, path: OutboundPath) {
        *self.path.lock().unwrap_or_else(|e| e.into_inner()) = path;
    }

    pub(crate) async fn write(&self, buf: &[u8]) -> Result<()> {
        let path = self.path.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match path {
            OutboundPath::Direct { peer } => {
                self.conn.send_to(buf, peer).await?;
            }
            OutboundPath::Relay { client, peer } => {
                client.send_indication(peer, buf).await?;
            }
        }
        Ok(())
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        match &*self.path.lock().unwrap_or_else(|e| e.into_inner()) {
            OutboundPath::Direct { peer } => *peer,
            OutboundPath::Relay { peer, .. } => *peer,
        }
    }
}
