use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    CURVE_CAPABILITY, PUBLIC_SUFFIX, SECRET_SUFFIX,
    certificate::Certificate,
    crypto::CurveKeyPair,
    error::{ProvisionError, Result},
    fs::Filesystem,
    util::Saveable,
};

/// Version reported by a key generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// true when this version is at least `(major, minor)`
    pub fn at_least(&self, (major, minor): (u32, u32)) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The external "create identity keypair" primitive.
pub trait KeyGenerator {
    fn version(&self) -> Version;

    /// Whether the backend supports a named security capability, e.g. "curve".
    fn has(&self, capability: &str) -> bool;

    /// Write the public and secret certificate of `identity` into `dir` and return
    /// their paths, public first.
    fn create_keypair(
        &self,
        fs: &dyn Filesystem,
        dir: &Path,
        identity: &str,
    ) -> Result<(PathBuf, PathBuf)>;
}

/// Curve25519 generator writing ZPL certificates.
#[derive(Debug, Default, Clone)]
pub struct CurveKeyGenerator {
    metadata: BTreeMap<String, String>,
}

impl CurveKeyGenerator {
    /// libzmq release whose certificate layout this backend writes
    pub const VERSION: Version = Version::new(4, 3, 5);

    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata written into every certificate this generator creates.
    pub fn with_metadata(metadata: BTreeMap<String, String>) -> Self {
        CurveKeyGenerator { metadata }
    }
}

fn validate_identity(identity: &str) -> Result<()> {
    let bad = identity.is_empty()
        || identity == "."
        || identity == ".."
        || identity.contains(['/', '\\']);
    if bad {
        return Err(ProvisionError::KeyGeneration {
            identity: identity.to_string(),
            reason: "identity must be a plain, non-empty file name".to_string(),
        });
    }
    Ok(())
}

/// ZPL property names: alphanumerics and `$-_@.&+/`
fn is_zpl_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "$-_@.&+/".contains(c))
}

/// Metadata has to survive a round trip through the certificate file.
fn validate_metadata(identity: &str, metadata: &BTreeMap<String, String>) -> Result<()> {
    for (name, value) in metadata {
        let reason = if !is_zpl_name(name) {
            format!("metadata name `{name}` is not a valid ZPL name")
        } else if value.contains(['"', '\n', '\r']) {
            format!("metadata value of `{name}` contains a quote or line break")
        } else {
            continue;
        };
        return Err(ProvisionError::KeyGeneration {
            identity: identity.to_string(),
            reason,
        });
    }
    Ok(())
}

impl KeyGenerator for CurveKeyGenerator {
    fn version(&self) -> Version {
        Self::VERSION
    }

    fn has(&self, capability: &str) -> bool {
        capability == CURVE_CAPABILITY
    }

    fn create_keypair(
        &self,
        fs: &dyn Filesystem,
        dir: &Path,
        identity: &str,
    ) -> Result<(PathBuf, PathBuf)> {
        validate_identity(identity)?;
        validate_metadata(identity, &self.metadata)?;

        let secret = Certificate::from_keypair(&CurveKeyPair::generate(), self.metadata.clone());
        let public = secret.public();

        let public_path = dir.join(format!("{identity}{PUBLIC_SUFFIX}"));
        let secret_path = dir.join(format!("{identity}{SECRET_SUFFIX}"));

        public
            .save_to(fs, &public_path)
            .map_err(|e| ProvisionError::filesystem("write", &public_path, e))?;
        secret
            .save_to(fs, &secret_path)
            .map_err(|e| ProvisionError::filesystem("write", &secret_path, e))?;

        debug!(identity, key = %public.public_key, "created keypair");
        Ok((public_path, secret_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::load_certificate;
    use crate::fs::MemFs;

    #[test]
    fn version_comparison() {
        assert!(Version::new(4, 0, 0).at_least((4, 0)));
        assert!(Version::new(4, 3, 5).at_least((4, 0)));
        assert!(!Version::new(3, 9, 9).at_least((4, 0)));
        assert_eq!(Version::new(3, 9, 0).to_string(), "3.9.0");
    }

    #[test]
    fn curve_backend_advertises_curve() {
        let generator = CurveKeyGenerator::new();
        assert!(generator.has("curve"));
        assert!(!generator.has("gssapi"));
        assert!(generator.version().at_least(crate::MIN_CURVE_VERSION));
    }

    #[test]
    fn writes_paired_certificates() {
        let fs = MemFs::new().with_dir("/certs");
        let (public, secret) = CurveKeyGenerator::new()
            .create_keypair(&fs, Path::new("/certs"), "server")
            .unwrap();
        assert_eq!(public, PathBuf::from("/certs/server.key"));
        assert_eq!(secret, PathBuf::from("/certs/server.key_secret"));

        let public = load_certificate(&fs, &public).unwrap();
        let secret = load_certificate(&fs, &secret).unwrap();
        assert!(!public.is_secret());
        assert!(secret.is_secret());
        assert_eq!(public.public_key, secret.public_key);
    }

    #[test]
    fn metadata_lands_in_both_files() {
        let fs = MemFs::new().with_dir("/certs");
        let mut metadata = BTreeMap::new();
        metadata.insert("owner".to_string(), "ops".to_string());
        let (public, secret) = CurveKeyGenerator::with_metadata(metadata)
            .create_keypair(&fs, Path::new("/certs"), "client")
            .unwrap();
        for path in [public, secret] {
            assert_eq!(load_certificate(&fs, &path).unwrap().metadata["owner"], "ops");
        }
    }

    fn generate_with(metadata: &[(&str, &str)]) -> (MemFs, Result<(PathBuf, PathBuf)>) {
        let fs = MemFs::new().with_dir("/certs");
        let metadata = metadata
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let result = CurveKeyGenerator::with_metadata(metadata).create_keypair(
            &fs,
            Path::new("/certs"),
            "server",
        );
        (fs, result)
    }

    #[test]
    fn multiline_metadata_value_is_rejected() {
        let (fs, result) = generate_with(&[("owner", "line1\nline2")]);
        assert!(matches!(result, Err(ProvisionError::KeyGeneration { .. })));
        assert!(fs.list_dir(Path::new("/certs")).unwrap().is_empty());
    }

    #[test]
    fn carriage_return_in_metadata_value_is_rejected() {
        let (_, result) = generate_with(&[("owner", "ops\r")]);
        assert!(matches!(result, Err(ProvisionError::KeyGeneration { .. })));
    }

    #[test]
    fn quote_in_metadata_value_is_rejected() {
        let (_, result) = generate_with(&[("owner", "say \"hi\"")]);
        assert!(matches!(result, Err(ProvisionError::KeyGeneration { .. })));
    }

    #[test]
    fn metadata_name_with_equals_is_rejected() {
        let (_, result) = generate_with(&[("team=x", "a=b")]);
        match result {
            Err(ProvisionError::KeyGeneration { identity, reason }) => {
                assert_eq!(identity, "server");
                assert!(reason.contains("team=x"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_or_spaced_metadata_name_is_rejected() {
        for name in ["", "two words"] {
            let (_, result) = generate_with(&[(name, "v")]);
            assert!(result.is_err(), "{name:?} accepted");
        }
    }

    #[test]
    fn zpl_punctuation_in_metadata_survives() {
        let (fs, result) = generate_with(&[("x-team.name", "a=b / c")]);
        let (public, _) = result.unwrap();
        let loaded = load_certificate(&fs, &public).unwrap();
        assert_eq!(loaded.metadata["x-team.name"], "a=b / c");
    }

    #[test]
    fn rejects_path_like_identity() {
        let fs = MemFs::new().with_dir("/certs");
        for identity in ["", "..", "a/b"] {
            let err = CurveKeyGenerator::new()
                .create_keypair(&fs, Path::new("/certs"), identity)
                .unwrap_err();
            assert!(matches!(err, ProvisionError::KeyGeneration { .. }));
        }
        assert_eq!(fs.list_dir(Path::new("/certs")).unwrap().len(), 0);
    }

    #[test]
    fn missing_directory_is_filesystem_error() {
        let fs = MemFs::new();
        let err = CurveKeyGenerator::new()
            .create_keypair(&fs, Path::new("/nowhere"), "server")
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Filesystem { .. }));
    }
}
