use std::fmt;
use std::time::Duration;

use stun::attributes::ATTR_LIFETIME;
use stun::error::{Error, Result};
use stun::message::{Getter, Message, Setter};

/// Lifetime is the LIFETIME attribute: allocation duration in seconds as a
/// big-endian u32. RFC 5766 Section 14.2.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct Lifetime(pub Duration);

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

const LIFETIME_SIZE: usize = 4;

impl Setter for Lifetime {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let buf = (self.0.as_secs() as u32).to_be_bytes();
        m.add(ATTR_LIFETIME, &buf);
        Ok(())
    }
}

impl Getter for Lifetime {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_LIFETIME)?;
        if v.len() != LIFETIME_SIZE {
            return Err(Error::Other(format!(
                "LIFETIME must be {LIFETIME_SIZE} bytes, got {}",
                v.len()
            )));
        }
        let secs = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        self.0 = Duration::from_secs(secs as u64);
        Ok(())
    }
}
