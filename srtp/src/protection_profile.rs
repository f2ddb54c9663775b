
use std::fmt;

use crate::error::{Error, Result};

/// Block-cipher family a profile runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherFamily {
    /// NULL encryption (authentication only).
    Null,
    Aes,
    AesF8,
    Aria,
    Seed,
}

/// ProtectionProfile specifies the cipher, authenticator, key sizes and tag
/// length of an SRTP session, similar to a TLS cipher suite.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionProfile {
    #[default]
    Aes128CmHmacSha1_80,
    Aes128CmHmacSha1_32,
    Aes192CmHmacSha1_80,
    Aes192CmHmacSha1_32,
    Aes256CmHmacSha1_80,
    Aes256CmHmacSha1_32,
    Aes128F8HmacSha1_80,
    NullHmacSha1_80,
    NullHmacSha1_32,
    AeadAes128Gcm,
    AeadAes256Gcm,
    AeadAria128Gcm,
    AeadAria256Gcm,
    Aria128CtrHmacSha1_80,
    Aria256CtrHmacSha1_80,
    SeedCtrHmacSha1_80,
    SeedCcm80,
    SeedGcm96,
    DoubleAeadAes128Gcm,
    DoubleAeadAes256Gcm,
}

use ProtectionProfile::*;

/// RFC 3711 Section 9.2: at most 2^48 SRTP packets under one master key.
pub const MAX_SRTP_MASTER_KEY_LIFETIME: u64 = 1 << 48;
/// RFC 3711 Section 9.2: at most 2^31 SRTCP packets under one master key.
pub const MAX_SRTCP_MASTER_KEY_LIFETIME: u64 = 1 << 31;

impl ProtectionProfile {
    /// All profiles this build can instantiate.
    pub fn supported() -> &'static [ProtectionProfile] {
        &[
            Aes128CmHmacSha1_80,
            Aes128CmHmacSha1_32,
            Aes192CmHmacSha1_80,
            Aes192CmHmacSha1_32,
            Aes256CmHmacSha1_80,
            Aes256CmHmacSha1_32,
            Aes128F8HmacSha1_80,
            NullHmacSha1_80,
            NullHmacSha1_32,
            AeadAes128Gcm,
            AeadAes256Gcm,
            AeadAria128Gcm,
            AeadAria256Gcm,
            Aria128CtrHmacSha1_80,
            Aria256CtrHmacSha1_80,
            SeedCtrHmacSha1_80,
            SeedCcm80,
            SeedGcm96,
            DoubleAeadAes128Gcm,
            DoubleAeadAes256Gcm,
        ]
    }

    pub fn cipher_family(&self) -> CipherFamily {
        match self {
            NullHmacSha1_80 | NullHmacSha1_32 => CipherFamily::Null,
            Aes128F8HmacSha1_80 => CipherFamily::AesF8,
            AeadAria128Gcm | AeadAria256Gcm | Aria128CtrHmacSha1_80 | Aria256CtrHmacSha1_80 => {
                CipherFamily::Aria
            }
            SeedCtrHmacSha1_80 | SeedCcm80 | SeedGcm96 => CipherFamily::Seed,
            _ => CipherFamily::Aes,
        }
    }

    /// Master key length in bytes. Double profiles carry both layers.
    pub fn key_len(&self) -> usize {
        match self {
            Aes192CmHmacSha1_80 | Aes192CmHmacSha1_32 => 24,
            Aes256CmHmacSha1_80 | Aes256CmHmacSha1_32 | AeadAes256Gcm | AeadAria256Gcm
            | Aria256CtrHmacSha1_80 => 32,
            DoubleAeadAes128Gcm => 32,
            DoubleAeadAes256Gcm => 64,
            _ => 16,
        }
    }

    /// Master salt length in bytes.
    pub fn salt_len(&self) -> usize {
        match self {
            AeadAes128Gcm | AeadAes256Gcm | AeadAria128Gcm | AeadAria256Gcm | SeedCcm80
            | SeedGcm96 => 12,
            DoubleAeadAes128Gcm | DoubleAeadAes256Gcm => 24,
            _ => 14,
        }
    }

    /// Trailing RTP authentication tag written by the HMAC authenticator;
    /// zero for AEAD profiles whose tag lives inside the ciphertext.
    pub fn rtp_auth_tag_len(&self) -> usize {
        match self {
            Aes128CmHmacSha1_80 | Aes192CmHmacSha1_80 | Aes256CmHmacSha1_80
            | Aes128F8HmacSha1_80 | NullHmacSha1_80 | Aria128CtrHmacSha1_80
            | Aria256CtrHmacSha1_80 | SeedCtrHmacSha1_80 => 10,
            Aes128CmHmacSha1_32 | Aes192CmHmacSha1_32 | Aes256CmHmacSha1_32
            | NullHmacSha1_32 => 4,
            _ => 0,
        }
    }

    /// Trailing RTCP authentication tag. The *_32 profiles keep the full
    /// 80-bit tag on SRTCP, RFC 5764 Section 4.1.2.
    pub fn rtcp_auth_tag_len(&self) -> usize {
        match self.auth_key_len() {
            0 => 0,
            _ => 10,
        }
    }

    /// AEAD tag length embedded in the ciphertext.
    pub fn aead_auth_tag_len(&self) -> usize {
        match self {
            AeadAes128Gcm | AeadAes256Gcm | AeadAria128Gcm | AeadAria256Gcm
            | DoubleAeadAes128Gcm | DoubleAeadAes256Gcm => 16,
            SeedGcm96 => 12,
            SeedCcm80 => 10,
            _ => 0,
        }
    }

    /// HMAC-SHA1 session auth key length; zero for AEAD profiles.
    pub fn auth_key_len(&self) -> usize {
        match self {
            AeadAes128Gcm | AeadAes256Gcm | AeadAria128Gcm | AeadAria256Gcm | SeedCcm80
            | SeedGcm96 | DoubleAeadAes128Gcm | DoubleAeadAes256Gcm => 0,
            _ => 20,
        }
    }

    /// Worst-case growth of a protected RTP packet over the plaintext,
    /// not counting the MKI.
    pub fn rtp_overhead(&self) -> usize {
        match self {
            // inner tag + one OHB config byte + outer tag
            DoubleAeadAes128Gcm | DoubleAeadAes256Gcm => 16 + 1 + 16,
            _ => self.rtp_auth_tag_len() + self.aead_auth_tag_len(),
        }
    }

    /// Keystream prefix reserved for the authenticator (always zero for the
    /// predefined transforms, RFC 3711 Section 4.2).
    pub fn srtp_prefix_length(&self) -> usize {
        0
    }

    /// Name as negotiated by the signalling layer. SDP crypto-suite
    /// spelling, with the RFC 5764 "SRTP_" aliases accepted on parse.
    pub fn name(&self) -> &'static str {
        match self {
            Aes128CmHmacSha1_80 => "AES_CM_128_HMAC_SHA1_80",
            Aes128CmHmacSha1_32 => "AES_CM_128_HMAC_SHA1_32",
            Aes192CmHmacSha1_80 => "AES_CM_192_HMAC_SHA1_80",
            Aes192CmHmacSha1_32 => "AES_CM_192_HMAC_SHA1_32",
            Aes256CmHmacSha1_80 => "AES_CM_256_HMAC_SHA1_80",
            Aes256CmHmacSha1_32 => "AES_CM_256_HMAC_SHA1_32",
            Aes128F8HmacSha1_80 => "AES_128_F8_HMAC_SHA1_80",
            NullHmacSha1_80 => "NULL_HMAC_SHA1_80",
            NullHmacSha1_32 => "NULL_HMAC_SHA1_32",
            AeadAes128Gcm => "AEAD_AES_128_GCM",
            AeadAes256Gcm => "AEAD_AES_256_GCM",
            AeadAria128Gcm => "AEAD_ARIA_128_GCM",
            AeadAria256Gcm => "AEAD_ARIA_256_GCM",
            Aria128CtrHmacSha1_80 => "ARIA_CM_128_HMAC_SHA1_80",
            Aria256CtrHmacSha1_80 => "ARIA_CM_256_HMAC_SHA1_80",
            SeedCtrHmacSha1_80 => "SEED_CTR_128_HMAC_SHA1_80",
            SeedCcm80 => "SEED_128_CCM_80",
            SeedGcm96 => "SEED_128_GCM_96",
            DoubleAeadAes128Gcm => "DOUBLE_AEAD_AES_128_GCM",
            DoubleAeadAes256Gcm => "DOUBLE_AEAD_AES_256_GCM",
        }
    }

    /// Parses a profile from its signalled name.
    pub fn from_name(name: &str) -> Result<ProtectionProfile> {
        let trimmed = name.trim();
        let canonical = trimmed.strip_prefix("SRTP_").unwrap_or(trimmed);
        for profile in Self::supported() {
            if profile.name() == canonical {
                return Ok(*profile);
            }
        }
        // RFC 5764 spells the AES-CM DTLS-SRTP profiles differently.
        match canonical {
            "AES128_CM_HMAC_SHA1_80" | "AES128_CM_SHA1_80" => Ok(Aes128CmHmacSha1_80),
            "AES128_CM_HMAC_SHA1_32" | "AES128_CM_SHA1_32" => Ok(Aes128CmHmacSha1_32),
            _ => Err(Error::ErrNoSuchProfile(name.to_owned())),
        }
    }
}

impl fmt::Display for ProtectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
