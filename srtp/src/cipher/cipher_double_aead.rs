//! Two-layer ("double") AEAD protection in the PERC style: an inner
//! end-to-end AEAD over the payload under a synthetic extension-free
//! header, an Original Header Block recording any header fields a
//! middlebox rewrote, and an outer hop-by-hop AEAD over both.

use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};

use super::cipher_aead::{
    rtcp_additional_authenticated_data, rtcp_initialization_vector, rtp_initialization_vector,
    AeadVariant,
};
use super::Cipher;
use crate::error::{Error, Result};
use crate::key_derivation::*;
use crate::packet::{RtpHeader, RTCP_HEADER_LEN, RTP_FIXED_HEADER_LEN, SRTCP_INDEX_SIZE};
use crate::protection_profile::{CipherFamily, ProtectionProfile};

const EXTENSION_FLAG: u8 = 0x10;
const MARKER_FLAG: u8 = 0x80;
const PT_MASK: u8 = 0x7f;

const OHB_SEQ: u8 = 0x01;
const OHB_PT: u8 = 0x02;
const OHB_MARKER_OVERRIDE: u8 = 0x04;
const OHB_MARKER_VALUE: u8 = 0x08;

/// Original Header Block: header fields as the inner sender emitted them,
/// when a hop rewrote them. Field bytes precede the config byte, which
/// always comes last.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ohb {
    pub seq: Option<u16>,
    pub pt: Option<u8>,
    pub marker: Option<bool>,
}

impl Ohb {
    pub(crate) fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        let mut config = 0u8;
        if let Some(seq) = self.seq {
            out.extend_from_slice(&seq.to_be_bytes());
            config |= OHB_SEQ;
        }
        if let Some(pt) = self.pt {
            out.push(pt);
            config |= OHB_PT;
        }
        if let Some(marker) = self.marker {
            config |= OHB_MARKER_OVERRIDE;
            if marker {
                config |= OHB_MARKER_VALUE;
            }
        }
        out.push(config);
        out
    }

    /// Parses the OHB from the tail of `buf`, returning it with the number
    /// of bytes it occupied.
    pub(crate) fn unmarshal(buf: &[u8]) -> Result<(Ohb, usize)> {
        let config = *buf.last().ok_or(Error::ErrMalformedOhb)?;
        if config & !(OHB_SEQ | OHB_PT | OHB_MARKER_OVERRIDE | OHB_MARKER_VALUE) != 0 {
            return Err(Error::ErrMalformedOhb);
        }

        let mut ohb = Ohb::default();
        let mut used = 1;
        let mut rest = &buf[..buf.len() - 1];

        if config & OHB_MARKER_OVERRIDE != 0 {
            ohb.marker = Some(config & OHB_MARKER_VALUE != 0);
        }
        if config & OHB_PT != 0 {
            let pt = *rest.last().ok_or(Error::ErrMalformedOhb)?;
            ohb.pt = Some(pt & PT_MASK);
            used += 1;
            rest = &rest[..rest.len() - 1];
        }
        if config & OHB_SEQ != 0 {
            if rest.len() < 2 {
                return Err(Error::ErrMalformedOhb);
            }
            ohb.seq = Some(BigEndian::read_u16(&rest[rest.len() - 2..]));
            used += 2;
        }
        Ok((ohb, used))
    }
}

pub(crate) struct CipherDoubleAead {
    profile: ProtectionProfile,
    inner_srtp: AeadVariant,
    outer_srtp: AeadVariant,
    outer_srtcp: AeadVariant,
    inner_srtp_salt: Vec<u8>,
    outer_srtp_salt: Vec<u8>,
    outer_srtcp_salt: Vec<u8>,
}

impl CipherDoubleAead {
    pub(crate) fn new(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
    ) -> Result<CipherDoubleAead> {
        // The two layers are keyed independently from the half master keys
        // and half master salts.
        let half_key = master_key.len() / 2;
        let half_salt = master_salt.len() / 2;
        let (inner_key, outer_key) = master_key.split_at(half_key);
        let (inner_salt, outer_salt) = master_salt.split_at(half_salt);

        let derive = |label: u8, mk: &[u8], ms: &[u8], n: usize| {
            key_derivation(CipherFamily::Aes, label, mk, ms, 0, n)
        };

        let inner_session_key = derive(LABEL_SRTP_ENCRYPTION, inner_key, inner_salt, half_key)?;
        let inner_srtp_salt = derive(LABEL_SRTP_SALT, inner_key, inner_salt, half_salt)?;

        let outer_session_key = derive(LABEL_SRTP_ENCRYPTION, outer_key, outer_salt, half_key)?;
        let outer_srtp_salt = derive(LABEL_SRTP_SALT, outer_key, outer_salt, half_salt)?;

        let outer_srtcp_key = derive(LABEL_SRTCP_ENCRYPTION, outer_key, outer_salt, half_key)?;
        let outer_srtcp_salt = derive(LABEL_SRTCP_SALT, outer_key, outer_salt, half_salt)?;

        Ok(CipherDoubleAead {
            profile,
            inner_srtp: AeadVariant::new(profile, &inner_session_key)?,
            outer_srtp: AeadVariant::new(profile, &outer_session_key)?,
            outer_srtcp: AeadVariant::new(profile, &outer_srtcp_key)?,
            inner_srtp_salt,
            outer_srtp_salt,
            outer_srtcp_salt,
        })
    }

    /// Header as the end-to-end context sees it: no extension block, the
    /// extension bit cleared, and any OHB overrides applied.
    fn synthetic_header(packet: &[u8], header: &RtpHeader, ohb: &Ohb) -> Vec<u8> {
        let base_len = RTP_FIXED_HEADER_LEN + 4 * header.csrc_count;
        let mut synth = packet[..base_len].to_vec();
        synth[0] &= !EXTENSION_FLAG;
        if let Some(seq) = ohb.seq {
            BigEndian::write_u16(&mut synth[2..4], seq);
        }
        if let Some(pt) = ohb.pt {
            synth[1] = synth[1] & MARKER_FLAG | pt;
        }
        if let Some(marker) = ohb.marker {
            if marker {
                synth[1] |= MARKER_FLAG;
            } else {
                synth[1] &= !MARKER_FLAG;
            }
        }
        synth
    }

    pub(crate) fn encrypt_rtp_with_ohb(
        &mut self,
        plaintext: &[u8],
        header: &RtpHeader,
        roc: u32,
        ohb: &Ohb,
    ) -> Result<Bytes> {
        let header_len = header.header_len;

        // Inner layer runs under the original (pre-rewrite) header values.
        let synth = Self::synthetic_header(plaintext, header, ohb);
        let inner_seq = ohb.seq.unwrap_or(header.sequence_number);
        let inner_nonce =
            rtp_initialization_vector(&self.inner_srtp_salt, header.ssrc, roc, inner_seq);
        let mut protected = self
            .inner_srtp
            .seal(&inner_nonce, &synth, &plaintext[header_len..])?;

        protected.extend_from_slice(&ohb.marshal());

        // Outer layer covers the wire header, extensions included.
        let outer_nonce = rtp_initialization_vector(
            &self.outer_srtp_salt,
            header.ssrc,
            roc,
            header.sequence_number,
        );
        let sealed = self
            .outer_srtp
            .seal(&outer_nonce, &plaintext[..header_len], &protected)?;

        let mut writer = BytesMut::with_capacity(header_len + sealed.len());
        writer.extend_from_slice(&plaintext[..header_len]);
        writer.extend(sealed);
        Ok(writer.freeze())
    }
}

impl Cipher for CipherDoubleAead {
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
        BigEndian::read_u32(&input[pos..]) & 0x7FFF_FFFF
    }

    fn encrypt_rtp(&mut self, plaintext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes> {
        self.encrypt_rtp_with_ohb(plaintext, header, roc, &Ohb::default())
    }

    fn decrypt_rtp(&mut self, ciphertext: &[u8], header: &RtpHeader, roc: u32) -> Result<Bytes> {
        let header_len = header.header_len;
        if ciphertext.len() < header_len + 2 * self.aead_auth_tag_len() + 1 {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }

        let outer_nonce = rtp_initialization_vector(
            &self.outer_srtp_salt,
            header.ssrc,
            roc,
            header.sequence_number,
        );
        let opened = self.outer_srtp.open(
            &outer_nonce,
            &ciphertext[..header_len],
            &ciphertext[header_len..],
        )?;

        let (ohb, ohb_len) = Ohb::unmarshal(&opened)?;
        if opened.len() < ohb_len + self.aead_auth_tag_len() {
            return Err(Error::ErrFailedToVerifyAuthTag);
        }
        let inner_ct = &opened[..opened.len() - ohb_len];

        let synth = Self::synthetic_header(ciphertext, header, &ohb);
        let inner_seq = ohb.seq.unwrap_or(header.sequence_number);
        let inner_nonce =
            rtp_initialization_vector(&self.inner_srtp_salt, header.ssrc, roc, inner_seq);
        let payload = self.inner_srtp.open(&inner_nonce, &synth, inner_ct)?;

        // Deliver the packet with the original header fields restored.
        let mut writer = BytesMut::with_capacity(header_len + payload.len());
        writer.extend_from_slice(&ciphertext[..header_len]);
        if let Some(seq) = ohb.seq {
            BigEndian::write_u16(&mut writer[2..4], seq);
        }
        if let Some(pt) = ohb.pt {
            writer[1] = writer[1] & MARKER_FLAG | pt;
        }
        if let Some(marker) = ohb.marker {
            if marker {
                writer[1] |= MARKER_FLAG;
            } else {
                writer[1] &= !MARKER_FLAG;
            }
        }
        writer.extend(payload);
        Ok(writer.freeze())
    }

    /// RTCP carries hop-by-hop data only, so the double transform protects
    /// it with just the outer layer.
    fn encrypt_rtcp(&mut self, plaintext: &[u8], srtcp_index: u32, ssrc: u32) -> Result<Bytes> {
        if plaintext.len() < RTCP_HEADER_LEN {
            return Err(Error::ErrTooShortRtcp);
        }

        let nonce = rtcp_initialization_vector(&self.outer_srtcp_salt, srtcp_index, ssrc);
        let aad = rtcp_additional_authenticated_data(plaintext, srtcp_index);
        let encrypted = self
            .outer_srtcp
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

        let nonce = rtcp_initialization_vector(&self.outer_srtcp_salt, srtcp_index, ssrc);
        let aad = rtcp_additional_authenticated_data(ciphertext, srtcp_index);
        let decrypted = self.outer_srtcp.open(
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
