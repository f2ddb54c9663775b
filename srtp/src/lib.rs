#![warn(rust_2018_idioms)]

mod cipher;
pub mod config;
pub mod context;
pub mod error;
pub mod key_derivation;
pub mod packet;
pub mod protection_profile;
pub mod replay;

pub use config::{Config, ContextConfig, SessionKeys};
pub use context::{Context, SrtpEvent};
pub use error::Error;
pub use protection_profile::ProtectionProfile;
