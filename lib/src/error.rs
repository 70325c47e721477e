use std::path::PathBuf;

use thiserror::Error;

use crate::keygen::Version;

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// the backend is too old or lacks CURVE support
    #[error("Security is not supported by backend version {version}: {reason}")]
    UnsupportedCapability { version: Version, reason: String },

    #[error("Failed to {} {}: {}", op, path.display(), source)]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to generate keypair for '{identity}': {reason}")]
    KeyGeneration { identity: String, reason: String },

    /// a certificate file could not be parsed
    #[error("Invalid certificate: {0}")]
    Certificate(String),
}

impl ProvisionError {
    pub fn filesystem(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Filesystem {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
