use subtle::ConstantTimeEq;

use crate::error::*;

/// check_hmac compares the received MAC with the computed one in constant
/// time.
pub fn check_hmac(got: &[u8], expected: &[u8]) -> Result<()> {
    if got.ct_eq(expected).unwrap_u8() != 1 {
        Err(Error::ErrIntegrityMismatch)
    } else {
        Ok(())
    }
}
