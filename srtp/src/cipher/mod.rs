pub(crate) mod cipher_aead;
pub(crate) mod cipher_ctr_hmac_sha1;
pub(crate) mod cipher_double_aead;
pub(crate) mod f8;
pub(crate) mod seed;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::packet::RtpHeader;
use crate::protection_profile::ProtectionProfile;

///NOTE: Auth tag and AEAD auth tag are placed at different positions in
///SRTCP.
///
///In the non-AEAD ciphers the authentication tag sits *after* the ESRTCP
///word (E-flag and SRTCP index):
///
///> | RTCP Header | Encrypted payload |E| SRTCP Index | Auth tag |
///
///In the AEAD ciphers the tag is embedded in the ciphertext, *before* the
///ESRTCP word:
///
///> | RTCP Header | Encrypted payload | AEAD auth tag |E| SRTCP Index |
///
///See RFC 7714 for the full layouts. The MKI (when configured) is spliced
///in by the context, immediately before the trailing tag.
pub(crate) trait Cipher {
    fn rtp_auth_tag_len(&self) -> usize;
    fn rtcp_auth_tag_len(&self) -> usize;
    fn aead_auth_tag_len(&self) -> usize;

    /// Reads the SRTCP index from the ESRTCP trailer (MKI already
    /// stripped by the context).
    fn get_rtcp_index(&self, input: &[u8]) -> u32;

    /// Protects a full RTP packet (header stays clear, payload encrypted,
    /// tag appended per transform).
    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes>;

    /// Reverses `encrypt_rtp`, verifying authentication first.
    fn decrypt_rtp(&mut self, ciphertext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes>;

    /// Protects a full RTCP compound packet and appends the ESRTCP word.
    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes>;

    /// Reverses `encrypt_rtcp`.
    fn decrypt_rtcp(&mut self, ciphertext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes>;
}

/// Binds the cipher engines for `profile` once; contexts never dispatch on
/// the profile per packet.
pub(crate) fn new_cipher(
    profile: ProtectionProfile,
    master_key: &[u8],
    master_salt: &[u8],
    key_derivation_rate: u64,
) -> Result<Box<dyn Cipher + Send>> {
    use ProtectionProfile::*;

    if key_derivation_rate != 0 && !key_derivation_rate.is_power_of_two() {
        return Err(Error::ErrBadKeyDerivationRate(key_derivation_rate));
    }

    match profile {
        Aes128CmHmacSha1_80 | Aes128CmHmacSha1_32 | Aes192CmHmacSha1_80 | Aes192CmHmacSha1_32
        | Aes256CmHmacSha1_80 | Aes256CmHmacSha1_32 | Aes128F8HmacSha1_80 | NullHmacSha1_80
        | NullHmacSha1_32 | Aria128CtrHmacSha1_80 | Aria256CtrHmacSha1_80
        | SeedCtrHmacSha1_80 => Ok(Box::new(
            cipher_ctr_hmac_sha1::CipherCtrHmacSha1::new(
                profile,
                master_key,
                master_salt,
                key_derivation_rate,
            )?,
        )),
        AeadAes128Gcm | AeadAes256Gcm | AeadAria128Gcm | AeadAria256Gcm | SeedCcm80
        | SeedGcm96 => {
            if key_derivation_rate != 0 {
                return Err(Error::ErrKdrUnsupportedForAead);
            }
            Ok(Box::new(cipher_aead::CipherAead::new(
                profile,
                master_key,
                master_salt,
            )?))
        }
        DoubleAeadAes128Gcm | DoubleAeadAes256Gcm => {
            if key_derivation_rate != 0 {
                return Err(Error::ErrKdrUnsupportedForAead);
            }
            Ok(Box::new(cipher_double_aead::CipherDoubleAead::new(
                profile,
                master_key,
                master_salt,
            )?))
        }
    }
}
