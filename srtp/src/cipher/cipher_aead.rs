use aead::{Aead, KeyInit, Payload};
use aes::{Aes128, Aes256};
use aes_gcm::AesGcm;
use aria::{Aria128, Aria256};
use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};
use ccm::Ccm;
use cipher::consts::{U10, U12};
use cipher::generic_array::GenericArray;

use super::seed::Seed;
use super::Cipher;
use crate::error::{Error, Result};
use crate::key_derivation::*;
use crate::packet::{RtpHeader, RTCP_HEADER_LEN, SRTCP_INDEX_SIZE};
use crate::protection_profile::ProtectionProfile;

const RTCP_ENCRYPTION_FLAG: u8 = 0x80;

type Aes128Gcm = AesGcm<Aes128, U12>;
type Aes256Gcm = AesGcm<Aes256, U12>;
type Aria128Gcm = AesGcm<Aria128, U12>;
type Aria256Gcm = AesGcm<Aria256, U12>;
type Seed128Gcm = AesGcm<Seed, U12, U12>;
type Seed128Ccm = Ccm<Seed, U10, U12>;

/// One bound AEAD engine. All variants use 12-byte nonces, so the seal/open
/// paths stay uniform; only the embedded tag length differs.
pub(crate) enum AeadVariant {
    Aes128Gcm(Box<Aes128Gcm>),
    Aes256Gcm(Box<Aes256Gcm>),
    Aria128Gcm(Box<Aria128Gcm>),
    Aria256Gcm(Box<Aria256Gcm>),
    Seed128Gcm(Box<Seed128Gcm>),
    Seed128Ccm(Box<Seed128Ccm>),
}

impl AeadVariant {
    pub(crate) fn new(profile: ProtectionProfile, session_key: &[u8]) -> Result<AeadVariant> {
        use ProtectionProfile::*;
        Ok(match profile {
            AeadAes128Gcm | DoubleAeadAes128Gcm => {
                let key = GenericArray::from_slice(session_key);
                AeadVariant::Aes128Gcm(Box::new(Aes128Gcm::new(key)))
            }
            AeadAes256Gcm | DoubleAeadAes256Gcm => {
                let key = GenericArray::from_slice(session_key);
                AeadVariant::Aes256Gcm(Box::new(Aes256Gcm::new(key)))
            }
            AeadAria128Gcm => {
                let key = GenericArray::from_slice(session_key);
                AeadVariant::Aria128Gcm(Box::new(Aria128Gcm::new(key)))
            }
            AeadAria256Gcm => {
                let key = GenericArray::from_slice(session_key);
                AeadVariant::Aria256Gcm(Box::new(Aria256Gcm::new(key)))
            }
            SeedGcm96 => {
                let key = GenericArray::from_slice(session_key);
                AeadVariant::Seed128Gcm(Box::new(Seed128Gcm::new(key)))
            }
            SeedCcm80 => {
                let key = GenericArray::from_slice(session_key);
                AeadVariant::Seed128Ccm(Box::new(Seed128Ccm::new(key)))
            }
            other => return Err(Error::ErrNoSuchProfile(other.name().to_owned())),
        })
    }

    pub(crate) fn seal(&self, nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        let payload = Payload { msg, aad };
        let sealed = match self {
            AeadVariant::Aes128Gcm(c) => c.encrypt(nonce, payload),
            AeadVariant::Aes256Gcm(c) => c.encrypt(nonce, payload),
            AeadVariant::Aria128Gcm(c) => c.encrypt(nonce, payload),
            AeadVariant::Aria256Gcm(c) => c.encrypt(nonce, payload),
            AeadVariant::Seed128Gcm(c) => c.encrypt(nonce, payload),
            AeadVariant::Seed128Ccm(c) => c.encrypt(nonce, payload),
        }?;
        Ok(sealed)
    }

    pub(crate) fn open(&self, nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
        let nonce = GenericArray::from_slice(nonce);
        let payload = Payload { msg, aad };
        let opened = match self {
            AeadVariant::Aes128Gcm(c) => c.decrypt(nonce, payload),
            AeadVariant::Aes256Gcm(c) => c.decrypt(nonce, payload),
            AeadVariant::Aria128Gcm(c) => c.decrypt(nonce, payload),
            AeadVariant::Aria256Gcm(c) => c.decrypt(nonce, payload),
            AeadVariant::Seed128Gcm(c) => c.decrypt(nonce, payload),
            AeadVariant::Seed128Ccm(c) => c.decrypt(nonce, payload),
        }?;
        Ok(opened)
    }
}

/// 12-byte RTP IV: 00 00 || SSRC || ROC || SEQ, XORed with the session salt.
/// RFC 7714 Section 8.1.
pub(crate) fn rtp_initialization_vector(
    session_salt: &[u8],
    ssrc: u32,
    roc: u32,
    sequence_number: u16,
) -> [u8; 12] {
    let mut iv = [0u8; 12];
    BigEndian::write_u32(&mut iv[2..], ssrc);
    BigEndian::write_u32(&mut iv[6..], roc);
    BigEndian::write_u16(&mut iv[10..], sequence_number);
    for (i, v) in iv.iter_mut().enumerate() {
        *v ^= session_salt[i];
    }
    iv
}

/// 12-byte RTCP IV: 00 00 || SSRC || 00 00 || 0,31-bit index, XORed with the
/// session salt. RFC 7714 Section 9.1.
pub(crate) fn rtcp_initialization_vector(
    session_salt: &[u8],
    srtcp_index: u32,
    ssrc: u32,
) -> [u8; 12] {
    let mut iv = [0u8; 12];
    BigEndian::write_u32(&mut iv[2..], ssrc);
    BigEndian::write_u32(&mut iv[8..], srtcp_index);
    for (i, v) in iv.iter_mut().enumerate() {
        *v ^= session_salt[i];
    }
    iv
}

/// AAD for SRTCP: the 8 header bytes and the ESRTCP word.
/// RFC 7714 Section 17.
pub(crate) fn rtcp_additional_authenticated_data(rtcp_packet: &[u8], srtcp_index: u32) -> [u8; 12] {
    let mut aad = [0u8; 12];
    aad[..8].copy_from_slice(&rtcp_packet[..8]);
    BigEndian::write_u32(&mut aad[8..], srtcp_index);
    aad[8] |= RTCP_ENCRYPTION_FLAG;
    aad
}

/// AEAD cipher for SRTP/SRTCP, RFC 7714 (GCM) and RFC 5669 (SEED modes).
pub(crate) struct CipherAead {
    profile: ProtectionProfile,
    srtp_cipher: AeadVariant,
    srtcp_cipher: AeadVariant,
    srtp_session_salt: Vec<u8>,
    srtcp_session_salt: Vec<u8>,
}

impl CipherAead {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<CipherAead> {
        let family = profile.cipher_family();

        let srtp_session_key = key_derivation(
            family,
            LABEL_SRTP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;
        let srtcp_session_key = key_derivation(
            family,
            LABEL_SRTCP_ENCRYPTION,
            master_key,
            master_salt,
            0,
            master_key.len(),
        )?;
        let srtp_session_salt = key_derivation(
            family,
            LABEL_SRTP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;
        let srtcp_session_salt = key_derivation(
            family,
            LABEL_SRTCP_SALT,
            master_key,
            master_salt,
            0,
            master_salt.len(),
        )?;

        Ok(CipherAead {
            profile,
            srtp_cipher: AeadVariant::new(profile, &srtp_session_key)?,
            srtcp_cipher: AeadVariant::new(profile, &srtcp_session_key)?,
            srtp_session_salt,
            srtcp_session_salt,
        })
    }
}

impl Cipher for CipherAead {
    fn rtp_auth_tag_len(&self) -> usize {
        0
    }

    fn rtcp_auth_tag_len(&self) -> usize {
        0
    }

    fn aead_auth_tag_len(&self) -> usize {
        self.profile.aead_auth_tag_len()
    }

    fn get_rtcp_index(&self, input: &[u8]) -> u32 {
        let pos = input.len() - SRTCP_INDEX_SIZE;
        BigEndian::read_u32(&input[pos..]) & !((RTCP_ENCRYPTION_FLAG as u32) << 24)
    }

    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes> {
        let header_len = header.header_len;
        let mut writer =
            BytesMut::with_capacity(plaintext.len() + self.aead_auth_tag_len());

        writer.extend_from_slice(&plaintext[..header_len]);

        let nonce = rtp_initialization_vector(
            &self.srtp_session_salt,
            header.ssrc,
            roc,
            header.sequence_number,
        );
        let encrypted = self
            .srtp_cipher
            .seal(&nonce, &plaintext[..header_len], &plaintext[header_len..])?;

        writer.extend(encrypted);
        Ok(writer.freeze())
    }

    fn decrypt_rtp(&mut self, ciphertext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes> {
        let header_len = header.header_len;
        if ciphertext.len() < header_len + self.aead_auth_tag_len() {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let nonce = rtp_initialization_vector(
            &self.srtp_session_salt,
            header.ssrc,
            roc,
            header.sequence_number,
        );
        let decrypted = self.srtp_cipher.open(
            &nonce,
            &ciphertext[..header_len],
            &ciphertext[header_len..],
        )?;

        let mut writer = BytesMut::with_capacity(header_len + decrypted.len());
        writer.extend_from_slice(&ciphertext[..header_len]);
        writer.extend(decrypted);
        Ok(writer.freeze())
    }

    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < RTCP_HEADER_LEN {
            return Err(Error::ErrTooShortRtcp);
        }

        let nonce = rtcp_initialization_vector(&self.srtcp_session_salt, srtcp_index, ssrc);
        let aad = rtcp_additional_authenticated_data(plaintext, srtcp_index);

        let encrypted = self
            .srtcp_cipher
            .seal(&nonce, &aad, &plaintext[RTCP_HEADER_LEN..])?;

        let mut writer =
            BytesMut::with_capacity(RTCP_HEADER_LEN + encrypted.len() + SRTCP_INDEX_SIZE);
        writer.extend_from_slice(&plaintext[..RTCP_HEADER_LEN]);
        writer.extend(encrypted);
        writer.extend_from_slice(&aad[8..]);
        Ok(writer.freeze())
    }

    fn decrypt_rtcp(&mut self, ciphertext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if ciphertext.len() < RTCP_HEADER_LEN + SRTCP_INDEX_SIZE + self.aead_auth_tag_len() {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let nonce = rtcp_initialization_vector(&self.srtcp_session_salt, srtcp_index, ssrc);
        let aad = rtcp_additional_authenticated_data(ciphertext, srtcp_index);

        let decrypted = self.srtcp_cipher.open(
            &nonce,
            &aad,
            &ciphertext[RTCP_HEADER_LEN..ciphertext.len() - SRTCP_INDEX_SIZE],
        )?;

        let mut writer = BytesMut::with_capacity(RTCP_HEADER_LEN + decrypted.len());
        writer.extend_from_slice(&ciphertext[..RTCP_HEADER_LEN]);
        writer.extend(decrypted);
        Ok(writer.freeze())
    }
}
