use std::fmt;

use stun::attributes::ATTR_REQUESTED_TRANSPORT;
use stun::error::{Error, Result};
use stun::message::{Getter, Message, Setter};

use super::Protocol;

/// RequestedTransport is the REQUESTED-TRANSPORT attribute,
/// RFC 5766 Section 14.7.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct RequestedTransport {
    pub protocol: Protocol,
}

impl fmt::Display for RequestedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol: {}", self.protocol)
    }
}

const REQUESTED_TRANSPORT_SIZE: usize = 4;

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = vec![0u8; REQUESTED_TRANSPORT_SIZE];
        v[0] = self.protocol.0;
        // bytes 1..4 are RFFU, zero
        m.add(ATTR_REQUESTED_TRANSPORT, &v);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        if v.len() != REQUESTED_TRANSPORT_SIZE {
            return Err(Error::Other(format!(
                "REQUESTED-TRANSPORT must be {REQUESTED_TRANSPORT_SIZE} bytes, got {}",
                v.len()
            )));
        }
        self.protocol = Protocol(v[0]);
        Ok(())
    }
}
