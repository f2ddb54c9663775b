use std::fmt;

use stun::attributes::ATTR_REQUESTED_ADDRESS_FAMILY;
use stun::error::{Error, Result};
use stun::message::{Getter, Message, Setter};

/// RequestedAddressFamily is the REQUESTED-ADDRESS-FAMILY attribute,
/// RFC 6156 Section 4.1.1.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub enum RequestedAddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

const FAMILY_IPV4: u8 = 0x01;
const FAMILY_IPV6: u8 = 0x02;
const REQUESTED_FAMILY_SIZE: usize = 4;

impl fmt::Display for RequestedAddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestedAddressFamily::Ipv4 => write!(f, "IPv4"),
            RequestedAddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

impl Setter for RequestedAddressFamily {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = vec![0u8; REQUESTED_FAMILY_SIZE];
        v[0] = match self {
            RequestedAddressFamily::Ipv4 => FAMILY_IPV4,
            RequestedAddressFamily::Ipv6 => FAMILY_IPV6,
        };
        m.add(ATTR_REQUESTED_ADDRESS_FAMILY, &v);
        Ok(())
    }
}

impl Getter for RequestedAddressFamily {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_REQUESTED_ADDRESS_FAMILY)?;
        if v.len() != REQUESTED_FAMILY_SIZE {
            return Err(Error::Other(
                "REQUESTED-ADDRESS-FAMILY must be 4 bytes".to_owned(),
            ));
        }
        *self = match v[0] {
            FAMILY_IPV4 => RequestedAddressFamily::Ipv4,
            FAMILY_IPV6 => RequestedAddressFamily::Ipv6,
            other => return Err(Error::ErrBadAddressFamily(other)),
        };
        Ok(())
    }
}
