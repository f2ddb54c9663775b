use stun::attributes::ATTR_DATA;
use stun::error::Result;
use stun::message::{Getter, Message, Setter};

/// Data is the DATA attribute carried by Send and Data indications,
/// RFC 5766 Section 14.4.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Setter for Data {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_DATA, &self.0);
        Ok(())
    }
}

impl Getter for Data {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = m.get(ATTR_DATA)?;
        Ok(())
    }
}
