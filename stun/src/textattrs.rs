use std::fmt;

use crate::attributes::*;
use crate::error::*;
use crate::message::*;

const MAX_USERNAME_B: usize = 513;
const MAX_REALM_B: usize = 763;
const MAX_SOFTWARE_B: usize = 763;
const MAX_NONCE_B: usize = 763;

/// TextAttribute is a plain UTF-8 string attribute (USERNAME, REALM, NONCE,
/// SOFTWARE).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TextAttribute {
    pub attr: AttrType,
    pub text: String,
}

pub type Username = TextAttribute;
pub type Realm = TextAttribute;
pub type Nonce = TextAttribute;
pub type Software = TextAttribute;

impl fmt::Display for TextAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Setter for TextAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let max_len = match self.attr {
            ATTR_USERNAME => MAX_USERNAME_B,
            ATTR_REALM => MAX_REALM_B,
            ATTR_SOFTWARE => MAX_SOFTWARE_B,
            ATTR_NONCE => MAX_NONCE_B,
            _ => return Err(Error::Other(format!("not a text attribute: {}", self.attr))),
        };
        let text = self.text.as_bytes();
        if text.len() > max_len {
            return Err(Error::Other(format!("{} value too long", self.attr)));
        }
        m.add(self.attr, text);
        Ok(())
    }
}

impl Getter for TextAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(self.attr)?;
        self.text = String::from_utf8(v).map_err(|_| Error::ErrBadUtf8)?;
        Ok(())
    }
}

impl TextAttribute {
    pub fn new(attr: AttrType, text: String) -> Self {
        TextAttribute { attr, text }
    }

    pub fn get_from_as(m: &Message, attr: AttrType) -> Result<Self> {
        let mut a = TextAttribute {
            attr,
            ..Default::default()
        };
        a.get_from(m)?;
        Ok(a)
    }
}
