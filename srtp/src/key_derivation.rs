#[cfg(test)]
mod key_derivation_test;

use aes::{Aes128, Aes192, Aes256};
use aria::{Aria128, Aria256};
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit};

use crate::cipher::seed::Seed;
use crate::error::{Error, Result};
use crate::protection_profile::CipherFamily;

pub const LABEL_SRTP_ENCRYPTION: u8 = 0x00;
pub const LABEL_SRTP_AUTHENTICATION_TAG: u8 = 0x01;
pub const LABEL_SRTP_SALT: u8 = 0x02;
pub const LABEL_SRTCP_ENCRYPTION: u8 = 0x03;
pub const LABEL_SRTCP_AUTHENTICATION_TAG: u8 = 0x04;
pub const LABEL_SRTCP_SALT: u8 = 0x05;
/// RFC 6904 header-extension encryption key.
pub const LABEL_SRTP_HEADER_ENCRYPTION: u8 = 0x06;
/// RFC 6904 header-extension salt.
pub const LABEL_SRTP_HEADER_SALT: u8 = 0x07;

/// The key-derivation PRF always runs on a 128-bit block, whatever the
/// session key size. RFC 3711 Section 4.3.3.
const KDF_BLOCK: usize = 16;

fn keystream<C: BlockEncrypt>(engine: &C, prf_in: &mut [u8; KDF_BLOCK], out_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; KDF_BLOCK * ((out_len + KDF_BLOCK - 1) / KDF_BLOCK)];
    for (i, chunk) in out.chunks_exact_mut(KDF_BLOCK).enumerate() {
        prf_in[KDF_BLOCK - 2..].copy_from_slice(&(i as u16).to_be_bytes());
        let mut block = GenericArray::clone_from_slice(prf_in);
        engine.encrypt_block(&mut block);
        chunk.copy_from_slice(block.as_slice());
    }
    out.truncate(out_len);
    out
}

/// RFC 3711 Section 4.3: session key of `out_len` bytes for `label`, derived
/// by running the master key in counter mode over the master salt XORed with
/// the key id `label || (index DIV kdr)`.
pub(crate) fn key_derivation(
    family: CipherFamily,
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    index_over_kdr: u64,
    out_len: usize,
) -> Result<Vec<u8>> {
    if master_salt.len() > KDF_BLOCK - 2 {
        return Err(Error::SrtpSaltLength(KDF_BLOCK - 2, master_salt.len()));
    }

    let mut prf_in = [0u8; KDF_BLOCK];
    prf_in[..master_salt.len()].copy_from_slice(master_salt);
    prf_in[7] ^= label;
    let r = index_over_kdr.to_be_bytes();
    for i in 0..6 {
        prf_in[8 + i] ^= r[2 + i];
    }

    match (family, master_key.len()) {
        // The NULL cipher and F8 still use the AES-CM PRF for derivation.
        (CipherFamily::Aes | CipherFamily::AesF8 | CipherFamily::Null, 16) => {
            let engine = Aes128::new(GenericArray::from_slice(master_key));
            Ok(keystream(&engine, &mut prf_in, out_len))
        }
        (CipherFamily::Aes | CipherFamily::AesF8 | CipherFamily::Null, 24) => {
            let engine = Aes192::new(GenericArray::from_slice(master_key));
            Ok(keystream(&engine, &mut prf_in, out_len))
        }
        (CipherFamily::Aes | CipherFamily::AesF8 | CipherFamily::Null, 32) => {
            let engine = Aes256::new(GenericArray::from_slice(master_key));
            Ok(keystream(&engine, &mut prf_in, out_len))
        }
        (CipherFamily::Aria, 16) => {
            let engine = Aria128::new(GenericArray::from_slice(master_key));
            Ok(keystream(&engine, &mut prf_in, out_len))
        }
        (CipherFamily::Aria, 32) => {
            let engine = Aria256::new(GenericArray::from_slice(master_key));
            Ok(keystream(&engine, &mut prf_in, out_len))
        }
        (CipherFamily::Seed, 16) => {
            let engine = Seed::new(GenericArray::from_slice(master_key));
            Ok(keystream(&engine, &mut prf_in, out_len))
        }
        (_, n) => Err(Error::SrtpMasterKeyLength(16, n)),
    }
}

/// AES-CM flavour kept under the name the rest of the code base knows.
pub(crate) fn aes_cm_key_derivation(
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    index_over_kdr: u64,
    out_len: usize,
) -> Result<Vec<u8>> {
    key_derivation(
        CipherFamily::Aes,
        label,
        master_key,
        master_salt,
        index_over_kdr,
        out_len,
    )
}

/// Counter block for the CM session ciphers:
/// (k_s * 2^16) XOR (SSRC * 2^64) XOR (index * 2^16).
/// RFC 3711 Section 4.1.1.
pub(crate) fn generate_counter(
    sequence_number: u16,
    rollover_counter: u32,
    ssrc: u32,
    session_salt: &[u8],
) -> [u8; 16] {
    debug_assert!(session_salt.len() <= 16);

    let mut counter = [0u8; 16];
    counter[4..8].copy_from_slice(&ssrc.to_be_bytes());
    counter[8..12].copy_from_slice(&rollover_counter.to_be_bytes());
    counter[12..14].copy_from_slice(&sequence_number.to_be_bytes());

    for (i, s) in session_salt.iter().enumerate() {
        counter[i] ^= s;
    }
    counter
}
