
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::addr::*;
use crate::attributes::*;
use crate::error::*;
use crate::message::*;

fn safe_xor_bytes(dst: &mut [u8], a: &[u8], b: &[u8]) -> usize {
    let mut n = a.len();
    if b.len() < n {
        n = b.len();
    }
    if dst.len() < n {
        n = dst.len();
    }
    for i in 0..n {
        dst[i] = a[i] ^ b[i];
    }
    n
}

/// xor_bytes xors the bytes in a and b into dst, returning the count.
pub fn xor_bytes(dst: &mut [u8], a: &[u8], b: &[u8]) -> usize {
    safe_xor_bytes(dst, a, b)
}

/// XorMappedAddress implements the XOR address encoding shared by
/// XOR-MAPPED-ADDRESS, XOR-PEER-ADDRESS and XOR-RELAYED-ADDRESS.
///
/// The port is XORed with the upper half of the magic cookie; IPv4 addresses
/// with the cookie, IPv6 addresses with cookie || transaction id.
/// RFC 5389 Section 15.2.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct XorMappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for XorMappedAddress {
    fn default() -> Self {
        XorMappedAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for XorMappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl Setter for XorMappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl Getter for XorMappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl XorMappedAddress {
    /// Writes the XORed address value under attribute type t.
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip_len, ip) = match self.ip {
            IpAddr::V4(ipv4) => (FAMILY_IPV4, IPV4LEN, ipv4.octets().to_vec()),
            IpAddr::V6(ipv6) => (FAMILY_IPV6, IPV6LEN, ipv6.octets().to_vec()),
        };

        let mut xor_value = vec![0u8; 4 + ip_len];
        xor_value[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        if ip_len == IPV6LEN {
            xor_value[8..8 + TRANSACTION_ID_SIZE].copy_from_slice(&m.transaction_id.0);
        }

        let mut value = vec![0u8; 4 + ip_len];
        value[0..2].copy_from_slice(&family.to_be_bytes());
        let xport = self.port ^ (MAGIC_COOKIE >> 16) as u16;
        value[2..4].copy_from_slice(&xport.to_be_bytes());
        xor_bytes(&mut value[4..], &ip, &xor_value[4..]);

        m.add(t, &value);
        Ok(())
    }

    /// Reads and un-XORs the address value from attribute type t.
    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrBadIpLength(v.len()));
        }

        let family = u16::from_be_bytes([v[0], v[1]]);
        self.port = u16::from_be_bytes([v[2], v[3]]) ^ (MAGIC_COOKIE >> 16) as u16;

        match family {
            FAMILY_IPV4 => {
                if v.len() < 4 + IPV4LEN {
                    return Err(Error::ErrBadIpLength(v.len() - 4));
                }
                let mut ip = [0u8; IPV4LEN];
                xor_bytes(&mut ip, &v[4..4 + IPV4LEN], &MAGIC_COOKIE.to_be_bytes());
                self.ip = IpAddr::V4(Ipv4Addr::from(ip));
            }
            FAMILY_IPV6 => {
                if v.len() < 4 + IPV6LEN {
                    return Err(Error::ErrBadIpLength(v.len() - 4));
                }
                let mut xor_value = [0u8; IPV6LEN];
                xor_value[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
                xor_value[4..].copy_from_slice(&m.transaction_id.0);
                let mut ip = [0u8; IPV6LEN];
                xor_bytes(&mut ip, &v[4..4 + IPV6LEN], &xor_value);
                self.ip = IpAddr::V6(Ipv6Addr::from(ip));
            }
            other => return Err(Error::ErrBadAddressFamily(other as u8)),
        }
        Ok(())
    }
}
