use bytes::Bytes;

use super::*;
use crate::error::Result;
use crate::packet::{rtcp_ssrc, RTCP_HEADER_LEN, SRTCP_INDEX_SIZE};

impl Context {
    /// Protects one RTCP compound packet under the next per-SSRC 31-bit
    /// index; the E flag is always set since the payload is encrypted.
    pub fn encrypt_rtcp(&mut self, plaintext: &[u8]) -> Result<Bytes> {
        let ssrc = rtcp_ssrc(plaintext)?;

        self.take_rtcp_key_use()?;

        let index = {
            let state = self.get_srtcp_ssrc_state(ssrc);
            state.index += 1;
            if state.index > MAX_SRTCP_INDEX {
                state.index = 0;
            }
            state.index
        };

        let protected = self.cipher.encrypt_rtcp(plaintext, index, ssrc)?;

        if self.mki.is_empty() {
            Ok(protected)
        } else {
            Ok(Bytes::from(
                self.insert_mki(&protected, self.cipher.rtcp_auth_tag_len()),
            ))
        }
    }

    /// Unprotects one RTCP compound packet: MKI validation, authentication,
    /// replay enforcement over the trailer index, then decryption.
    pub fn decrypt_rtcp(&mut self, ciphertext: &[u8]) -> Result<Bytes> {
        let trailing_tag = self.cipher.rtcp_auth_tag_len();
        let min_len = RTCP_HEADER_LEN
            + SRTCP_INDEX_SIZE
            + trailing_tag
            + self.mki.len()
            + self.cipher.aead_auth_tag_len();
        if ciphertext.len() < min_len {
            return Err(Error::ErrTooShortRtcp);
        }

        let ssrc = rtcp_ssrc(ciphertext)?;
        let stripped = self.strip_mki(ciphertext, trailing_tag)?;

        self.check_rtcp_key_use()?;

        let index = self.cipher.get_rtcp_index(&stripped);
        let window = self.get_srtcp_ssrc_state(ssrc).replay;
        self.replay_outcome_to_error(window.check(index as u64), ssrc, index as u64)?;

        let decrypted = match self.cipher.decrypt_rtcp(&stripped, index, ssrc) {
            Ok(out) => out,
            Err(err) => {
                if err == Error::ErrFailedToVerifyAuthTag {
                    self.stats.auth_failures += 1;
                }
                return Err(err);
            }
        };

        self.get_srtcp_ssrc_state(ssrc).replay.accept(index as u64);
        self.commit_rtcp_key_use();

        Ok(decrypted)
    }
}
