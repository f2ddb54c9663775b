pub mod addrfamily;
pub mod data;
pub mod lifetime;
pub mod peeraddr;
pub mod relayaddr;
pub mod reqtrans;

use std::fmt;

/// Protocol is the transport carried by REQUESTED-TRANSPORT,
/// RFC 5766 Section 14.7.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct Protocol(pub u8);

/// UDP protocol number.
pub const PROTO_UDP: Protocol = Protocol(17);

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == PROTO_UDP {
            write!(f, "UDP")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
