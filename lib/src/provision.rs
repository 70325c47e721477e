//! Clean-slate provisioning of the server and client certificates.
//!
//! Every run wipes and recreates the scratch, public and private directories under the
//! base directory, generates one keypair per identity into scratch, moves the public
//! halves to `public_keys/` and the secret halves to `private_keys/`, and removes scratch.
//! Nothing is rolled back when a later step fails. Two concurrent runs against the same
//! base directory race on the directory resets and are not supported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    CURVE_CAPABILITY, IDENTITIES, MIN_CURVE_VERSION, PRIVATE_KEYS_DIR, PUBLIC_KEYS_DIR,
    PUBLIC_SUFFIX, SCRATCH_DIR, SECRET_SUFFIX,
    error::{ProvisionError, Result},
    fs::{Filesystem, OsFs},
    keygen::{CurveKeyGenerator, KeyGenerator},
};

/// The directories managed under a base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub base: PathBuf,
    pub scratch: PathBuf,
    pub public: PathBuf,
    pub private: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Layout {
            scratch: base.join(SCRATCH_DIR),
            public: base.join(PUBLIC_KEYS_DIR),
            private: base.join(PRIVATE_KEYS_DIR),
            base,
        }
    }

    /// in reset order
    pub fn managed_dirs(&self) -> [&Path; 3] {
        [&self.scratch, &self.public, &self.private]
    }
}

/// Where everything ended up after a successful run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// identity -> public certificate path
    pub public: BTreeMap<String, PathBuf>,
    /// identity -> secret certificate path
    pub secret: BTreeMap<String, PathBuf>,
    /// scratch entries matching neither suffix, deleted with the scratch directory
    pub discarded: Vec<String>,
}

pub struct Provisioner<'a> {
    fs: &'a dyn Filesystem,
    generator: &'a dyn KeyGenerator,
    identities: Vec<String>,
}

impl<'a> Provisioner<'a> {
    pub fn new(fs: &'a dyn Filesystem, generator: &'a dyn KeyGenerator) -> Self {
        Provisioner {
            fs,
            generator,
            identities: IDENTITIES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Refuse to run on a backend that cannot do CURVE security.
    pub fn check_support(&self) -> Result<()> {
        let version = self.generator.version();
        if !version.at_least(MIN_CURVE_VERSION) {
            return Err(ProvisionError::UnsupportedCapability {
                version,
                reason: format!(
                    "security requires version {}.{} or newer",
                    MIN_CURVE_VERSION.0, MIN_CURVE_VERSION.1
                ),
            });
        }
        if !self.generator.has(CURVE_CAPABILITY) {
            return Err(ProvisionError::UnsupportedCapability {
                version,
                reason: format!("backend lacks the `{CURVE_CAPABILITY}` capability"),
            });
        }
        Ok(())
    }

    pub fn provision(&self, base_dir: &Path) -> Result<ProvisionReport> {
        self.check_support()?;

        let layout = Layout::new(base_dir);
        for dir in layout.managed_dirs() {
            self.reset_dir(dir)?;
        }
        info!("Key directories created in '{}'", layout.base.display());

        for identity in &self.identities {
            let (public, secret) =
                self.generator
                    .create_keypair(self.fs, &layout.scratch, identity)?;
            debug!(identity = %identity, public = %public.display(), secret = %secret.display(), "generated");
        }
        info!("Server and client certificates generated");

        let mut report = ProvisionReport::default();
        self.move_matching(&layout.scratch, &layout.public, PUBLIC_SUFFIX, &mut report.public)?;
        info!("Public keys moved to '{PUBLIC_KEYS_DIR}'");
        self.move_matching(&layout.scratch, &layout.private, SECRET_SUFFIX, &mut report.secret)?;
        info!("Secret keys moved to '{PRIVATE_KEYS_DIR}'");

        report.discarded = self.list(&layout.scratch)?;
        for name in &report.discarded {
            warn!("Discarding unrecognised file '{name}' left in '{SCRATCH_DIR}'");
        }
        self.fs
            .remove_dir_all(&layout.scratch)
            .map_err(|e| ProvisionError::filesystem("remove directory", &layout.scratch, e))?;

        self.check_complete(&report)?;
        Ok(report)
    }

    fn reset_dir(&self, dir: &Path) -> Result<()> {
        if self.fs.exists(dir) {
            debug!(dir = %dir.display(), "removing previous contents");
            self.fs
                .remove_dir_all(dir)
                .map_err(|e| ProvisionError::filesystem("remove directory", dir, e))?;
        }
        self.fs
            .create_dir(dir)
            .map_err(|e| ProvisionError::filesystem("create directory", dir, e))
    }

    fn list(&self, dir: &Path) -> Result<Vec<String>> {
        self.fs
            .list_dir(dir)
            .map_err(|e| ProvisionError::filesystem("list directory", dir, e))
    }

    fn move_matching(
        &self,
        from: &Path,
        to: &Path,
        suffix: &str,
        moved: &mut BTreeMap<String, PathBuf>,
    ) -> Result<()> {
        for name in self.list(from)? {
            let Some(identity) = name.strip_suffix(suffix) else {
                continue;
            };
            let source = from.join(&name);
            let target = to.join(&name);
            self.fs
                .rename(&source, &target)
                .map_err(|e| ProvisionError::filesystem("move", &source, e))?;
            moved.insert(identity.to_string(), target);
        }
        Ok(())
    }

    /// every identity must have ended up with both halves
    fn check_complete(&self, report: &ProvisionReport) -> Result<()> {
        for identity in &self.identities {
            let missing = match (
                report.public.contains_key(identity),
                report.secret.contains_key(identity),
            ) {
                (true, true) => continue,
                (false, _) => "public",
                (_, false) => "secret",
            };
            return Err(ProvisionError::KeyGeneration {
                identity: identity.clone(),
                reason: format!("no {missing} certificate was produced"),
            });
        }
        Ok(())
    }
}

/// Provision `base_dir` on the real filesystem with the bundled CURVE generator.
pub fn provision(base_dir: &Path) -> Result<ProvisionReport> {
    let generator = CurveKeyGenerator::new();
    Provisioner::new(&OsFs, &generator).provision(base_dir)
}
