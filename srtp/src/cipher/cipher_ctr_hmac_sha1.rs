use aes::{Aes128, Aes192, Aes256};
use aria::{Aria128, Aria256};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use cipher::generic_array::GenericArray;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use super::seed::Seed;
use super::{f8, Cipher};
use crate::error::{Error, Result};
use crate::key_derivation::*;
use crate::packet::{RtpHeader, RTCP_HEADER_LEN, SRTCP_INDEX_SIZE};
use crate::protection_profile::{CipherFamily, ProtectionProfile};

type HmacSha1 = Hmac<Sha1>;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type Aria128Ctr = ctr::Ctr128BE<Aria128>;
type Aria256Ctr = ctr::Ctr128BE<Aria256>;
type SeedCtr = ctr::Ctr128BE<Seed>;

const RTCP_ENCRYPTION_FLAG: u32 = 1 << 31;

pub(crate) fn ctr_apply(
    family: CipherFamily,
    key: &[u8],
    iv: &[u8; 16],
    data: &mut [u8],
) -> Result<()> {
    let iv = GenericArray::from_slice(iv);
    match (family, key.len()) {
        (CipherFamily::Null, _) => {}
        (CipherFamily::Aes, 16) => {
            Aes128Ctr::new(GenericArray::from_slice(key), iv).apply_keystream(data)
        }
        (CipherFamily::Aes, 24) => {
            Aes192Ctr::new(GenericArray::from_slice(key), iv).apply_keystream(data)
        }
        (CipherFamily::Aes, 32) => {
            Aes256Ctr::new(GenericArray::from_slice(key), iv).apply_keystream(data)
        }
        (CipherFamily::Aria, 16) => {
            Aria128Ctr::new(GenericArray::from_slice(key), iv).apply_keystream(data)
        }
        (CipherFamily::Aria, 32) => {
            Aria256Ctr::new(GenericArray::from_slice(key), iv).apply_keystream(data)
        }
        (CipherFamily::Seed, 16) => {
            SeedCtr::new(GenericArray::from_slice(key), iv).apply_keystream(data)
        }
        (_, n) => return Err(Error::SrtpMasterKeyLength(16, n)),
    }
    Ok(())
}

struct SessionKeys {
    key: Vec<u8>,
    salt: Vec<u8>,
    auth: HmacSha1,
}

fn derive(
    family: CipherFamily,
    master_key: &[u8],
    master_salt: &[u8],
    r: u64,
    labels: (u8, u8, u8),
    auth_key_len: usize,
) -> Result<SessionKeys> {
    // The KDF family follows the block cipher except for F8, which keys an
    // AES engine anyway.
    let (enc_label, auth_label, salt_label) = labels;
    let key = key_derivation(family, enc_label, master_key, master_salt, r, master_key.len())?;
    let salt = key_derivation(family, salt_label, master_key, master_salt, r, master_salt.len())?;
    let auth_key = key_derivation(family, auth_label, master_key, master_salt, r, auth_key_len)?;
    let auth = HmacSha1::new_from_slice(&auth_key).map_err(|e| Error::Other(e.to_string()))?;
    Ok(SessionKeys { key, salt, auth })
}

/// Counter-mode (or F8, or NULL) encryption with HMAC-SHA1 authentication,
/// RFC 3711 Sections 4.1.1–4.1.3 and 4.2.
pub(crate) struct CipherCtrHmacSha1 {
    profile: ProtectionProfile,
    family: CipherFamily,
    master_key: Vec<u8>,
    master_salt: Vec<u8>,
    /// Key derivation rate; 0 derives once.
    kdr: u64,
    srtp_r: u64,
    srtcp_r: u64,
    srtp: SessionKeys,
    srtcp: SessionKeys,
}

impl CipherCtrHmacSha1 {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
        kdr: u64,
    ) -> Result<Self> {
        let family = profile.cipher_family();
        let auth_key_len = profile.auth_key_len();
        let srtp = derive(
            family,
            master_key,
            master_salt,
            0,
            (
                LABEL_SRTP_ENCRYPTION,
                LABEL_SRTP_AUTHENTICATION_TAG,
                LABEL_SRTP_SALT,
            ),
            auth_key_len,
        )?;
        let srtcp = derive(
            family,
            master_key,
            master_salt,
            0,
            (
                LABEL_SRTCP_ENCRYPTION,
                LABEL_SRTCP_AUTHENTICATION_TAG,
                LABEL_SRTCP_SALT,
            ),
            auth_key_len,
        )?;

        Ok(CipherCtrHmacSha1 {
            profile,
            family,
            master_key: master_key.to_vec(),
            master_salt: master_salt.to_vec(),
            kdr,
            srtp_r: 0,
            srtcp_r: 0,
            srtp,
            srtcp,
        })
    }

    fn r_for(&self, index: u64) -> u64 {
        if self.kdr == 0 {
            0
        } else {
            index >> self.kdr.trailing_zeros()
        }
    }

    fn refresh_srtp_keys(&mut self, index: u64) -> Result<()> {
        let r = self.r_for(index);
        if r != self.srtp_r {
            self.srtp = derive(
                self.family,
                &self.master_key,
                &self.master_salt,
                r,
                (
                    LABEL_SRTP_ENCRYPTION,
                    LABEL_SRTP_AUTHENTICATION_TAG,
                    LABEL_SRTP_SALT,
                ),
                self.profile.auth_key_len(),
            )?;
            self.srtp_r = r;
        }
        Ok(())
    }

    fn refresh_srtcp_keys(&mut self, index: u64) -> Result<()> {
        let r = self.r_for(index);
        if r != self.srtcp_r {
            self.srtcp = derive(
                self.family,
                &self.master_key,
                &self.master_salt,
                r,
                (
                    LABEL_SRTCP_ENCRYPTION,
                    LABEL_SRTCP_AUTHENTICATION_TAG,
                    LABEL_SRTCP_SALT,
                ),
                self.profile.auth_key_len(),
            )?;
            self.srtcp_r = r;
        }
        Ok(())
    }

    /// M = Authenticated Portion || ROC, tag truncated to n_tag bytes.
    /// RFC 3711 Section 4.2.
    fn generate_srtp_auth_tag(&mut self, buf: &[u8], roc: u32) -> Vec<u8> {
        self.srtp.auth.reset();
        self.srtp.auth.update(buf);
        self.srtp.auth.update(&roc.to_be_bytes());
        let code_bytes = self.srtp.auth.clone().finalize().into_bytes();
        code_bytes[0..self.rtp_auth_tag_len()].to_vec()
    }

    fn generate_srtcp_auth_tag(&mut self, buf: &[u8]) -> Vec<u8> {
        self.srtcp.auth.reset();
        self.srtcp.auth.update(buf);
        let code_bytes = self.srtcp.auth.clone().finalize().into_bytes();
        code_bytes[0..self.rtcp_auth_tag_len()].to_vec()
    }

    /// RTP F8 IV: 0x00 || M,PT || SEQ || TS || SSRC || ROC.
    fn f8_rtp_iv(packet: &[u8], roc: u32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[1..12].copy_from_slice(&packet[1..12]);
        iv[12..16].copy_from_slice(&roc.to_be_bytes());
        iv
    }

    /// RTCP F8 IV: 0x00000000 || E,index || first 8 header bytes.
    fn f8_rtcp_iv(packet: &[u8], e_and_index: u32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[4..8].copy_from_slice(&e_and_index.to_be_bytes());
        iv[8..16].copy_from_slice(&packet[0..8]);
        iv
    }

    fn apply_rtp_keystream(
        &self,
        packet: &mut [u8],
        payload_offset: usize,
        header: &RtpHeader,
        roc: u32,
    ) -> Result<()> {
        if self.family == CipherFamily::AesF8 {
            let iv = Self::f8_rtp_iv(packet, roc);
            f8::f8_apply(&self.srtp.key, &self.srtp.salt, &iv, &mut packet[payload_offset..])
        } else {
            let counter =
                generate_counter(header.sequence_number, roc, header.ssrc, &self.srtp.salt);
            ctr_apply(
                self.family,
                &self.srtp.key,
                &counter,
                &mut packet[payload_offset..],
            )
        }
    }

    fn apply_rtcp_keystream(
        &self,
        packet: &mut [u8],
        srtcp_index: u32,
        ssrc: u32,
    ) -> Result<()> {
        let offset = RTCP_HEADER_LEN;
        if self.family == CipherFamily::AesF8 {
            let iv = Self::f8_rtcp_iv(packet, srtcp_index | RTCP_ENCRYPTION_FLAG);
            f8::f8_apply(&self.srtcp.key, &self.srtcp.salt, &iv, &mut packet[offset..])
        } else {
            let counter = generate_counter(
                (srtcp_index & 0xFFFF) as u16,
                srtcp_index >> 16,
                ssrc,
                &self.srtcp.salt,
            );
            ctr_apply(self.family, &self.srtcp.key, &counter, &mut packet[offset..])
        }
    }
}

impl Cipher for CipherCtrHmacSha1 {
    fn rtp_auth_tag_len(&self) -> usize {
        self.profile.rtp_auth_tag_len()
    }

    fn rtcp_auth_tag_len(&self) -> usize {
        self.profile.rtcp_auth_tag_len()
    }

    fn aead_auth_tag_len(&self) -> usize {
        0
    }

    fn get_rtcp_index(&self, input: &[u8]) -> u32 {
        let tail_offset = input.len() - (self.rtcp_auth_tag_len() + SRTCP_INDEX_SIZE);
        BigEndian::read_u32(&input[tail_offset..tail_offset + SRTCP_INDEX_SIZE])
            & !RTCP_ENCRYPTION_FLAG
    }

    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes> {
        let index = (roc as u64) << 16 | header.sequence_number as u64;
        self.refresh_srtp_keys(index)?;

        let mut writer = BytesMut::with_capacity(plaintext.len() + self.rtp_auth_tag_len());
        writer.extend_from_slice(plaintext);

        self.apply_rtp_keystream(&mut writer, header.header_len, header, roc)?;

        let auth_tag = self.generate_srtp_auth_tag(&writer, roc);
        writer.extend(auth_tag);

        Ok(writer.freeze())
    }

    fn decrypt_rtp(&mut self, ciphertext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes> {
        let tag_len = self.rtp_auth_tag_len();
        if ciphertext.len() < header.header_len + tag_len {
            return Err(Error::ErrTooShortRtp);
        }

        let index = (roc as u64) << 16 | header.sequence_number as u64;
        self.refresh_srtp_keys(index)?;

        let actual_tag = &ciphertext[ciphertext.len() - tag_len..];
        let cipher_text = &ciphertext[..ciphertext.len() - tag_len];

        let expected_tag = self.generate_srtp_auth_tag(cipher_text, roc);
        if actual_tag.ct_eq(&expected_tag).unwrap_u8() != 1 {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let mut writer = BytesMut::with_capacity(cipher_text.len());
        writer.extend_from_slice(cipher_text);
        self.apply_rtp_keystream(&mut writer, header.header_len, header, roc)?;

        Ok(writer.freeze())
    }

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < RTCP_HEADER_LEN {
            return Err(Error::ErrTooShortRtcp);
        }
        self.refresh_srtcp_keys(srtcp_index as u64)?;

        let mut writer = BytesMut::with_capacity(
            plaintext.len() + SRTCP_INDEX_SIZE + self.rtcp_auth_tag_len(),
        );
        writer.extend_from_slice(plaintext);

        self.apply_rtcp_keystream(&mut writer, srtcp_index, ssrc)?;

        writer.put_u32(srtcp_index | RTCP_ENCRYPTION_FLAG);

        let auth_tag = self.generate_srtcp_auth_tag(&writer);
        writer.extend(auth_tag);

        Ok(writer.freeze())
    }

    fn decrypt_rtcp(&mut self, ciphertext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        let tag_len = self.rtcp_auth_tag_len();
        if ciphertext.len() < RTCP_HEADER_LEN + SRTCP_INDEX_SIZE + tag_len {
            return Err(Error::ErrTooShortRtcp);
        }
        self.refresh_srtcp_keys(srtcp_index as u64)?;

        // The whole packet, trailer included, is authenticated whether or
        // not the payload was encrypted.
        let actual_tag = &ciphertext[ciphertext.len() - tag_len..];
        let authed = &ciphertext[..ciphertext.len() - tag_len];
        let expected_tag = self.generate_srtcp_auth_tag(authed);
        if actual_tag.ct_eq(&expected_tag).unwrap_u8() != 1 {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let tail_offset = ciphertext.len() - (tag_len + SRTCP_INDEX_SIZE);
        let is_encrypted = ciphertext[tail_offset] >> 7 == 1;

        let mut writer = BytesMut::with_capacity(tail_offset);
        writer.extend_from_slice(&ciphertext[..tail_offset]);
        if is_encrypted {
            self.apply_rtcp_keystream(&mut writer, srtcp_index, ssrc)?;
        }

        Ok(writer.freeze())
    }
}
