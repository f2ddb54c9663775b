use std::fmt;

use crate::attributes::*;
use crate::error::*;
use crate::message::*;

/// ErrorCodeAttribute is the ERROR-CODE attribute, RFC 5389 Section 15.6.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ErrorCodeAttribute {
    pub code: ErrorCode,
    pub reason: Vec<u8>,
}

impl fmt::Display for ErrorCodeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code.0,
            String::from_utf8_lossy(&self.reason)
        )
    }
}

const ERROR_CODE_CLASS_BYTE: usize = 2;
const ERROR_CODE_NUMBER_BYTE: usize = 3;
const ERROR_CODE_REASON_START: usize = 4;
const ERROR_CODE_MODULO: u16 = 100;
const MAX_REASON_B: usize = 763;

impl Setter for ErrorCodeAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        if self.reason.len() > MAX_REASON_B {
            return Err(Error::Other("reason phrase too long".to_owned()));
        }

        let mut value = vec![0u8; ERROR_CODE_REASON_START];
        let number = (self.code.0 % ERROR_CODE_MODULO) as u8;
        let class = (self.code.0 / ERROR_CODE_MODULO) as u8;
        value[ERROR_CODE_CLASS_BYTE] = class;
        value[ERROR_CODE_NUMBER_BYTE] = number;
        value.extend_from_slice(&self.reason);

        m.add(ATTR_ERROR_CODE, &value);
        Ok(())
    }
}

impl Getter for ErrorCodeAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_ERROR_CODE)?;
        if v.len() < ERROR_CODE_REASON_START {
            return Err(Error::ErrErrorCodeTooShort);
        }

        let class = v[ERROR_CODE_CLASS_BYTE] as u16;
        let number = v[ERROR_CODE_NUMBER_BYTE] as u16;
        self.code = ErrorCode(class * ERROR_CODE_MODULO + number);
        self.reason = v[ERROR_CODE_REASON_START..].to_vec();
        Ok(())
    }
}

/// ErrorCode is a STUN error code value.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub u16);

impl Setter for ErrorCode {
    /// Writes the code together with its default reason phrase.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let reason: &[u8] = match *self {
            CODE_TRY_ALTERNATE => b"Try Alternate",
            CODE_UNAUTHORIZED => b"Unauthorized",
            CODE_STALE_NONCE => b"Stale Nonce",
            CODE_ALLOC_MISMATCH => b"Allocation Mismatch",
            _ => b"",
        };
        ErrorCodeAttribute {
            code: *self,
            reason: reason.to_vec(),
        }
        .add_to(m)
    }
}

pub const CODE_TRY_ALTERNATE: ErrorCode = ErrorCode(300);
pub const CODE_UNAUTHORIZED: ErrorCode = ErrorCode(401);
pub const CODE_ALLOC_MISMATCH: ErrorCode = ErrorCode(437);
pub const CODE_STALE_NONCE: ErrorCode = ErrorCode(438);
