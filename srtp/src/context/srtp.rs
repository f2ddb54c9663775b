use bytes::Bytes;

use super::*;
use crate::error::Result;

impl Context {
    /// Protects one RTP packet: header-extension masking, payload
    /// encryption and authentication under index `(ROC << 16) | SEQ`, MKI
    /// splice, and the ROC increment on sequence rollover.
    pub fn encrypt_rtp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        let header = RtpHeader::unmarshal(plaintext)?;
        self.encrypt_rtp_with_header(plaintext, &header)
    }

    pub fn encrypt_rtp_with_header(
        &mut self,
        plaintext: &[u8],
        header: &RtpHeader,
    ) -> Result<Bytes> {
        // The lifetime check runs before the packet is touched.
        self.take_rtp_key_use()?;

        let roc = self.roc;

        let protected = if self.header_crypto.is_some() && header.extension {
            let mut masked = plaintext.to_vec();
            self.apply_header_extension_mask(&mut masked, header, roc)?;
            self.cipher.encrypt_rtp(&masked, header, roc)?
        } else {
            self.cipher.encrypt_rtp(plaintext, header, roc)?
        };

        let out = if self.mki.is_empty() {
            protected
        } else {
            Bytes::from(self.insert_mki(&protected, self.cipher.rtp_auth_tag_len()))
        };

        if header.sequence_number == u16::MAX {
            self.roc = self.roc.wrapping_add(1);
        }

        Ok(out)
    }

    /// Unprotects one RTP packet: MKI validation, authentication, index
    /// reconstruction, replay enforcement, decryption, and only then the
    /// window/ROC update.
    pub fn decrypt_rtp(&mut self, ciphertext: &[u8]) -> Result<Bytes> {
        let header = RtpHeader::unmarshal(ciphertext)?;
        self.decrypt_rtp_with_header(ciphertext, &header)
    }

    pub fn decrypt_rtp_with_header(
        &mut self,
        ciphertext: &[u8],
        header: &RtpHeader,
    ) -> Result<Bytes> {
        let trailing_tag = self.cipher.rtp_auth_tag_len();
        let min_len =
            header.header_len + trailing_tag + self.mki.len() + self.cipher.aead_auth_tag_len();
        if ciphertext.len() < min_len {
            return Err(Error::ErrTooShortRtp);
        }

        let stripped = self.strip_mki(ciphertext, trailing_tag)?;

        self.check_rtp_key_use()?;

        let ssrc = header.ssrc;
        let seq = header.sequence_number;
        let roc = self.roc;
        let (s_l, s_l_set, window) = {
            let state = self.get_srtp_ssrc_state(ssrc);
            (state.s_l, state.s_l_set, state.replay)
        };

        let guessed_roc = Self::guess_rollover_count(s_l, s_l_set, seq, roc);
        let index = (guessed_roc as u64) << 16 | seq as u64;

        self.replay_outcome_to_error(window.check(index), ssrc, index)?;

        let decrypted = match self.cipher.decrypt_rtp(&stripped, header, guessed_roc) {
            Ok(out) => out,
            Err(err) => {
                if err == Error::ErrFailedToVerifyAuthTag {
                    self.stats.auth_failures += 1;
                }
                return Err(err);
            }
        };

        // RFC 6904 ordering: extensions decrypt after the payload transform
        // authenticated the packet.
        let out = if self.header_crypto.is_some() && header.extension {
            let mut masked = decrypted.to_vec();
            self.apply_header_extension_mask(&mut masked, header, guessed_roc)?;
            Bytes::from(masked)
        } else {
            decrypted
        };

        // The packet is authentic; commit window, s_l and ROC.
        let roc_advanced = guessed_roc == roc.wrapping_add(1);
        {
            let state = self.get_srtp_ssrc_state(ssrc);
            state.replay.accept(index);
            if !state.s_l_set {
                state.s_l = seq as u32;
                state.s_l_set = true;
            } else if roc_advanced {
                state.s_l = seq as u32;
            } else if guessed_roc == roc && (seq as u32) > state.s_l {
                state.s_l = seq as u32;
            }
        }
        if roc_advanced {
            self.roc = guessed_roc;
        }
        self.commit_rtp_key_use();

        Ok(out)
    }
}
