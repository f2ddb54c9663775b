use util::KeyingMaterialExporter;

pub use crate::context::{ContextConfig, SrtpEvent};
use crate::error::{Error, Result};
use crate::protection_profile::ProtectionProfile;

const LABEL_EXTRACTOR_DTLS_SRTP: &str = "EXTRACTOR-dtls_srtp";

/// SessionKeys bundles the master keys of both directions of a session.
#[derive(Default, Clone)]
pub struct SessionKeys {
    pub local_master_key: Vec<u8>,
    pub local_master_salt: Vec<u8>,
    pub remote_master_key: Vec<u8>,
    pub remote_master_salt: Vec<u8>,
}

/// Config is everything needed to build the four contexts of a session.
/// Populate `keys` directly (SDES-style provisioning) or let
/// [`Config::extract_session_keys_from_dtls`] fill them from a completed
/// handshake.
#[derive(Default, Clone)]
pub struct Config {
    pub keys: SessionKeys,
    pub profile: ProtectionProfile,
    pub local_options: ContextConfig,
    pub remote_options: ContextConfig,
}

impl Config {
    /// Fills the session keys from the DTLS exporter, RFC 5764 Section 4.2:
    /// client_write_key || server_write_key || client_write_salt ||
    /// server_write_salt under the label "EXTRACTOR-dtls_srtp".
    pub async fn extract_session_keys_from_dtls(
        &mut self,
        exporter: &impl KeyingMaterialExporter,
        is_client: bool,
    ) -> Result<()> {
        let key_len = self.profile.key_len();
        let salt_len = self.profile.salt_len();

        let keying_material = exporter
            .export_keying_material(
                LABEL_EXTRACTOR_DTLS_SRTP,
                &[],
                (key_len * 2) + (salt_len * 2),
            )
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

        let mut offset = 0;
        let client_write_key = keying_material[offset..offset + key_len].to_vec();
        offset += key_len;
        let server_write_key = keying_material[offset..offset + key_len].to_vec();
        offset += key_len;
        let client_write_salt = keying_material[offset..offset + salt_len].to_vec();
        offset += salt_len;
        let server_write_salt = keying_material[offset..offset + salt_len].to_vec();

        if is_client {
            self.keys.local_master_key = client_write_key;
            self.keys.local_master_salt = client_write_salt;
            self.keys.remote_master_key = server_write_key;
            self.keys.remote_master_salt = server_write_salt;
        } else {
            self.keys.local_master_key = server_write_key;
            self.keys.local_master_salt = server_write_salt;
            self.keys.remote_master_key = client_write_key;
            self.keys.remote_master_salt = client_write_salt;
        }

        Ok(())
    }
}
