//! AES-F8 keystream, RFC 3711 Section 4.1.3.

use aes::Aes128;
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};

use crate::error::{Error, Result};

const BLOCK: usize = 16;

/// Applies the F8 keystream derived from `session_key`/`session_salt` and
/// the packet IV to `data` in place.
///
/// IV' = E(k XOR m, IV) with m = salt || 0x55…; the keystream blocks are
/// S(j) = E(k, IV' XOR j XOR S(j-1)), with the 32-bit block counter XORed
/// into the last word.
pub(crate) fn f8_apply(
    session_key: &[u8],
    session_salt: &[u8],
    iv: &[u8; BLOCK],
    data: &mut [u8],
) -> Result<()> {
    if session_key.len() != 16 {
        return Err(Error::SrtpMasterKeyLength(16, session_key.len()));
    }

    let mut m = [0x55u8; BLOCK];
    m[..session_salt.len()].copy_from_slice(session_salt);

    let mut masked_key = [0u8; BLOCK];
    for i in 0..BLOCK {
        masked_key[i] = session_key[i] ^ m[i];
    }

    let mut iv_accent = GenericArray::clone_from_slice(iv);
    Aes128::new(GenericArray::from_slice(&masked_key)).encrypt_block(&mut iv_accent);

    let engine = Aes128::new(GenericArray::from_slice(session_key));
    let mut s = [0u8; BLOCK];
    for (j, chunk) in data.chunks_mut(BLOCK).enumerate() {
        let mut x = [0u8; BLOCK];
        for i in 0..BLOCK {
            x[i] = iv_accent[i] ^ s[i];
        }
        let j = j as u32;
        x[12] ^= (j >> 24) as u8;
        x[13] ^= (j >> 16) as u8;
        x[14] ^= (j >> 8) as u8;
        x[15] ^= j as u8;

        let mut block = GenericArray::clone_from_slice(&x);
        engine.encrypt_block(&mut block);
        s.copy_from_slice(block.as_slice());

        for (b, k) in chunk.iter_mut().zip(s.iter()) {
            *b ^= k;
        }
    }
    Ok(())
}
