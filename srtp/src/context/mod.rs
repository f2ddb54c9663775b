#[cfg(test)]
mod context_test;
#[cfg(test)]
mod srtcp_test;
#[cfg(test)]
mod srtp_test;

pub mod srtcp;
pub mod srtp;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cipher::cipher_ctr_hmac_sha1::ctr_apply;
use crate::cipher::{new_cipher, Cipher};
use crate::error::{Error, Result};
use crate::key_derivation::*;
use crate::packet::RtpHeader;
use crate::protection_profile::{
    CipherFamily, ProtectionProfile, MAX_SRTCP_MASTER_KEY_LIFETIME, MAX_SRTP_MASTER_KEY_LIFETIME,
};
use crate::replay::{ReplayOutcome, ReplayWindow};

/// Largest valid 31-bit SRTCP index.
pub const MAX_SRTCP_INDEX: u32 = 0x7FFF_FFFF;

const SEQ_NUM_MEDIAN: u32 = 1 << 15;

/// Events a context posts to the session task. Delivery is best effort:
/// the channel is fed with `try_send` so the packet path never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtpEvent {
    /// The master key exhausted its packet lifetime; protect calls fail
    /// until the orchestrator rekeys.
    RekeyingRequested { is_rtcp: bool },
}

/// Optional knobs for a context.
#[derive(Default, Clone)]
pub struct ContextConfig {
    /// Master key identifier appended to every protected packet and
    /// required on every unprotected one. At most 255 bytes.
    pub mki: Option<Vec<u8>>,
    /// RFC 6904 per-byte mask over the header-extension data. Bits set in
    /// the mask are encrypted on the wire.
    pub header_extension_mask: Option<Vec<u8>>,
    /// Key derivation rate (power of two); 0 derives session keys once.
    pub key_derivation_rate: u64,
    /// Event channel towards the session task.
    pub events: Option<mpsc::Sender<SrtpEvent>>,
}

/// Drop counters, exposed for observability.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContextStats {
    pub auth_failures: u64,
    pub replay_drops: u64,
    pub mki_failures: u64,
}

/// Decrypt-side state for one SRTP SSRC.
#[derive(Default)]
pub(crate) struct SrtpSsrcState {
    /// Highest authenticated sequence number (s_l of RFC 3711 App. A).
    s_l: u32,
    s_l_set: bool,
    replay: ReplayWindow,
}

/// State for one SRTCP SSRC.
#[derive(Default)]
pub(crate) struct SrtcpSsrcState {
    index: u32,
    replay: ReplayWindow,
}

struct HeaderCrypto {
    mask: Vec<u8>,
    family: CipherFamily,
    key: Vec<u8>,
    salt: Vec<u8>,
}

/// Context is one SRTP/SRTCP cryptographic context. A context is
/// one-directional: it either only protects or only unprotects.
pub struct Context {
    profile: ProtectionProfile,
    cipher: Box<dyn Cipher + Send>,
    mki: Vec<u8>,

    /// Send-side rollover counter; one sender stream per context.
    roc: u32,
    srtp_ssrc_states: HashMap<u32, SrtpSsrcState>,
    srtcp_ssrc_states: HashMap<u32, SrtcpSsrcState>,

    header_crypto: Option<HeaderCrypto>,

    /// Packets processed under the current master key. The only state a
    /// metrics task may observe concurrently.
    rtp_key_use: Arc<AtomicU64>,
    rtcp_key_use: Arc<AtomicU64>,
    rtp_rekey_signalled: bool,
    rtcp_rekey_signalled: bool,
    events: Option<mpsc::Sender<SrtpEvent>>,

    stats: ContextStats,
}

impl Context {
    /// Creates a context with default options.
    pub fn new(
        master_key: &[u8],
        master_salt: &[u8],
        profile: ProtectionProfile,
    ) -> Result<Context> {
        Self::with_config(master_key, master_salt, profile, ContextConfig::default())
    }

    pub fn with_config(
        master_key: &[u8],
        master_salt: &[u8],
        profile: ProtectionProfile,
        config: ContextConfig,
    ) -> Result<Context> {
        let key_len = profile.key_len();
        let salt_len = profile.salt_len();
        if master_key.len() != key_len {
            return Err(Error::SrtpMasterKeyLength(key_len, master_key.len()));
        }
        if master_salt.len() != salt_len {
            return Err(Error::SrtpSaltLength(salt_len, master_salt.len()));
        }
        let mki = config.mki.unwrap_or_default();
        if mki.len() > 255 {
            return Err(Error::ErrMkiTooLong(mki.len()));
        }

        let cipher = new_cipher(
            profile,
            master_key,
            master_salt,
            config.key_derivation_rate,
        )?;

        let header_crypto = match config.header_extension_mask {
            Some(mask) => Some(Self::derive_header_crypto(
                profile,
                master_key,
                master_salt,
                mask,
            )?),
            None => None,
        };

        Ok(Context {
            profile,
            cipher,
            mki,
            roc: 0,
            srtp_ssrc_states: HashMap::new(),
            srtcp_ssrc_states: HashMap::new(),
            header_crypto,
            rtp_key_use: Arc::new(AtomicU64::new(0)),
            rtcp_key_use: Arc::new(AtomicU64::new(0)),
            rtp_rekey_signalled: false,
            rtcp_rekey_signalled: false,
            events: config.events,
            stats: ContextStats::default(),
        })
    }

    /// Header-extension keys (labels 6 and 7, RFC 6904). The double
    /// transform keys them from its hop-by-hop (outer) half; extensions
    /// are hop-readable there.
    fn derive_header_crypto(
        profile: ProtectionProfile,
        master_key: &[u8],
        master_salt: &[u8],
        mask: Vec<u8>,
    ) -> Result<HeaderCrypto> {
        use ProtectionProfile::*;
        let (family, mk, ms) = match profile {
            DoubleAeadAes128Gcm | DoubleAeadAes256Gcm => (
                CipherFamily::Aes,
                &master_key[master_key.len() / 2..],
                &master_salt[master_salt.len() / 2..],
            ),
            Aes128F8HmacSha1_80 => (CipherFamily::Aes, master_key, master_salt),
            _ => (profile.cipher_family(), master_key, master_salt),
        };
        let key = key_derivation(
            family,
            LABEL_SRTP_HEADER_ENCRYPTION,
            mk,
            ms,
            0,
            mk.len(),
        )?;
        let salt = key_derivation(family, LABEL_SRTP_HEADER_SALT, mk, ms, 0, ms.len())?;
        Ok(HeaderCrypto {
            mask,
            family,
            key,
            salt,
        })
    }

    pub fn profile(&self) -> ProtectionProfile {
        self.profile
    }

    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    /// Number of RTP packets processed under the current master key.
    pub fn rtp_key_use_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.rtp_key_use)
    }

    pub fn rtcp_key_use_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.rtcp_key_use)
    }

    /// Returns the send-side rollover counter.
    pub fn roc(&self) -> u32 {
        self.roc
    }

    /// Sets the send-side rollover counter (e.g. when resuming a stream).
    pub fn set_roc(&mut self, roc: u32) {
        self.roc = roc;
    }

    #[cfg(test)]
    pub(crate) fn force_rtp_key_use(&mut self, value: u64) {
        self.rtp_key_use.store(value, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub(crate) fn force_rtcp_key_use(&mut self, value: u64) {
        self.rtcp_key_use.store(value, Ordering::Relaxed);
    }

    fn signal_rekey(&mut self, is_rtcp: bool) {
        let flag = if is_rtcp {
            &mut self.rtcp_rekey_signalled
        } else {
            &mut self.rtp_rekey_signalled
        };
        if *flag {
            return;
        }
        *flag = true;
        if let Some(events) = &self.events {
            if events
                .try_send(SrtpEvent::RekeyingRequested { is_rtcp })
                .is_err()
            {
                log::warn!("rekeying event dropped, channel full or closed");
            }
        }
    }

    /// RFC 3711 Section 9.2: refuse to consume the master key past its
    /// packet lifetime.
    pub(crate) fn take_rtp_key_use(&mut self) -> Result<()> {
        let prev = self.rtp_key_use.fetch_add(1, Ordering::Relaxed);
        if prev >= MAX_SRTP_MASTER_KEY_LIFETIME {
            self.signal_rekey(false);
            return Err(Error::ErrMasterKeyRotationRequired);
        }
        Ok(())
    }

    pub(crate) fn take_rtcp_key_use(&mut self) -> Result<()> {
        let prev = self.rtcp_key_use.fetch_add(1, Ordering::Relaxed);
        if prev >= MAX_SRTCP_MASTER_KEY_LIFETIME {
            self.signal_rekey(true);
            return Err(Error::ErrMasterKeyRotationRequired);
        }
        Ok(())
    }

    /// Receive-path variant: probe the budget before the work, charge it
    /// only once the packet authenticates.
    pub(crate) fn check_rtp_key_use(&mut self) -> Result<()> {
        if self.rtp_key_use.load(Ordering::Relaxed) >= MAX_SRTP_MASTER_KEY_LIFETIME {
            self.signal_rekey(false);
            return Err(Error::ErrMasterKeyRotationRequired);
        }
        Ok(())
    }

    pub(crate) fn check_rtcp_key_use(&mut self) -> Result<()> {
        if self.rtcp_key_use.load(Ordering::Relaxed) >= MAX_SRTCP_MASTER_KEY_LIFETIME {
            self.signal_rekey(true);
            return Err(Error::ErrMasterKeyRotationRequired);
        }
        Ok(())
    }

    pub(crate) fn commit_rtp_key_use(&self) {
        self.rtp_key_use.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn commit_rtcp_key_use(&self) {
        self.rtcp_key_use.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn get_srtp_ssrc_state(&mut self, ssrc: u32) -> &mut SrtpSsrcState {
        self.srtp_ssrc_states.entry(ssrc).or_default()
    }

    pub(crate) fn get_srtcp_ssrc_state(&mut self, ssrc: u32) -> &mut SrtcpSsrcState {
        self.srtcp_ssrc_states.entry(ssrc).or_default()
    }

    /// RFC 3711 Appendix A index guess, normalised to 32-bit wraparound:
    /// pick v ∈ {ROC−1, ROC, ROC+1} nearest to the window head.
    pub(crate) fn guess_rollover_count(s_l: u32, s_l_set: bool, seq: u16, roc: u32) -> u32 {
        if !s_l_set {
            return roc;
        }
        let seq = seq as u32;
        if s_l < SEQ_NUM_MEDIAN {
            if seq as i64 - s_l as i64 > SEQ_NUM_MEDIAN as i64 {
                roc.wrapping_sub(1)
            } else {
                roc
            }
        } else if s_l - SEQ_NUM_MEDIAN > seq {
            roc.wrapping_add(1)
        } else {
            roc
        }
    }

    /// Applies the RFC 6904 mask keystream over the extension data block in
    /// place. CTR keystreams make the merge an involution, so the same call
    /// serves protect and unprotect.
    pub(crate) fn apply_header_extension_mask(
        &self,
        packet: &mut [u8],
        header: &RtpHeader,
        roc: u32,
    ) -> Result<()> {
        let hc = match &self.header_crypto {
            Some(hc) if header.extension && header.ext_len > 0 => hc,
            _ => return Ok(()),
        };

        let mut keystream = vec![0u8; header.ext_len];
        let counter = generate_counter(header.sequence_number, roc, header.ssrc, &hc.salt);
        ctr_apply(hc.family, &hc.key, &counter, &mut keystream)?;

        let ext = &mut packet[header.ext_offset..header.ext_offset + header.ext_len];
        for (i, b) in ext.iter_mut().enumerate() {
            let mask = hc.mask.get(i).copied().unwrap_or(0);
            *b ^= keystream[i] & mask;
        }
        Ok(())
    }

    /// Splices the MKI immediately before the trailing auth tag (at the
    /// very end for AEAD transforms, whose trailing tag length is zero).
    pub(crate) fn insert_mki(&self, protected: &[u8], trailing_tag_len: usize) -> Vec<u8> {
        if self.mki.is_empty() {
            return protected.to_vec();
        }
        let insert_at = protected.len() - trailing_tag_len;
        let mut out = Vec::with_capacity(protected.len() + self.mki.len());
        out.extend_from_slice(&protected[..insert_at]);
        out.extend_from_slice(&self.mki);
        out.extend_from_slice(&protected[insert_at..]);
        out
    }

    /// Verifies and removes the MKI, returning the packet as the cipher
    /// produced it. Constant-time comparison.
    pub(crate) fn strip_mki(
        &mut self,
        packet: &[u8],
        trailing_tag_len: usize,
    ) -> Result<Vec<u8>> {
        use subtle::ConstantTimeEq;

        if self.mki.is_empty() {
            return Ok(packet.to_vec());
        }
        if packet.len() < trailing_tag_len + self.mki.len() {
            self.stats.mki_failures += 1;
            return Err(Error::ErrMkiMismatch);
        }
        let mki_start = packet.len() - trailing_tag_len - self.mki.len();
        let candidate = &packet[mki_start..packet.len() - trailing_tag_len];
        if candidate.ct_eq(&self.mki).unwrap_u8() != 1 {
            self.stats.mki_failures += 1;
            return Err(Error::ErrMkiMismatch);
        }

        let mut out = Vec::with_capacity(packet.len() - self.mki.len());
        out.extend_from_slice(&packet[..mki_start]);
        out.extend_from_slice(&packet[packet.len() - trailing_tag_len..]);
        Ok(out)
    }

    pub(crate) fn replay_outcome_to_error(
        &mut self,
        outcome: ReplayOutcome,
        ssrc: u32,
        index: u64,
    ) -> Result<()> {
        match outcome {
            ReplayOutcome::Fresh => Ok(()),
            ReplayOutcome::Duplicate => {
                self.stats.replay_drops += 1;
                Err(Error::ErrDuplicated { ssrc, index })
            }
            ReplayOutcome::TooOld => {
                self.stats.replay_drops += 1;
                Err(Error::ErrTooOld { ssrc, index })
            }
        }
    }
}
