use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::attributes::*;
use crate::error::*;
use crate::message::*;

pub const FAMILY_IPV4: u16 = 0x01;
pub const FAMILY_IPV6: u16 = 0x02;

pub const IPV4LEN: usize = 4;
pub const IPV6LEN: usize = 16;

/// MappedAddress is the plain (non-XOR) address encoding shared by
/// MAPPED-ADDRESS and ALTERNATE-SERVER. RFC 5389 Section 15.1.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct MappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for MappedAddress {
    fn default() -> Self {
        MappedAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for MappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl Setter for MappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl Getter for MappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl MappedAddress {
    /// Writes the address value under attribute type t.
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip) = match self.ip {
            IpAddr::V4(ipv4) => (FAMILY_IPV4, ipv4.octets().to_vec()),
            IpAddr::V6(ipv6) => (FAMILY_IPV6, ipv6.octets().to_vec()),
        };

        let mut value = vec![0u8; 4];
        value[0..2].copy_from_slice(&family.to_be_bytes());
        value[2..4].copy_from_slice(&self.port.to_be_bytes());
        value.extend_from_slice(&ip);
        m.add(t, &value);
        Ok(())
    }

    /// Reads the address value from attribute type t.
    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrBadIpLength(v.len()));
        }

        let family = u16::from_be_bytes([v[0], v[1]]);
        self.port = u16::from_be_bytes([v[2], v[3]]);
        match family {
            FAMILY_IPV4 => {
                if v.len() < 4 + IPV4LEN {
                    return Err(Error::ErrBadIpLength(v.len() - 4));
                }
                let mut ip = [0u8; IPV4LEN];
                ip.copy_from_slice(&v[4..4 + IPV4LEN]);
                self.ip = IpAddr::V4(Ipv4Addr::from(ip));
            }
            FAMILY_IPV6 => {
                if v.len() < 4 + IPV6LEN {
                    return Err(Error::ErrBadIpLength(v.len() - 4));
                }
                let mut ip = [0u8; IPV6LEN];
                ip.copy_from_slice(&v[4..4 + IPV6LEN]);
                self.ip = IpAddr::V6(Ipv6Addr::from(ip));
            }
            other => return Err(Error::ErrBadAddressFamily(other as u8)),
        }
        Ok(())
    }
}

/// AlternateServer is the ALTERNATE-SERVER attribute, RFC 5389 Section 15.11.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct AlternateServer {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for AlternateServer {
    fn default() -> Self {
        AlternateServer {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl Setter for AlternateServer {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let a = MappedAddress {
            ip: self.ip,
            port: self.port,
        };
        a.add_to_as(m, ATTR_ALTERNATE_SERVER)
    }
}

impl Getter for AlternateServer {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let mut a = MappedAddress::default();
        a.get_from_as(m, ATTR_ALTERNATE_SERVER)?;
        self.ip = a.ip;
        self.port = a.port;
        Ok(())
    }
}
