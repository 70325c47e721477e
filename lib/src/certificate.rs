use std::collections::BTreeMap;
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::{
    PUBLIC_SUFFIX,
    crypto::{CurveKeyPair, decode_key},
    error::{ProvisionError, Result},
    fs::Filesystem,
    util::Saveable,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PUBLIC_BANNER: &str = "\
#   ZeroMQ CURVE Public Certificate
#   Exchange securely, or use a secure mechanism to verify the contents
#   of this file after exchange. Store public certificates in your home
#   directory, in the .curve subdirectory.
";

const SECRET_BANNER: &str = "\
#   ZeroMQ CURVE **Secret** Certificate
#   DO NOT PROVIDE THIS FILE TO OTHER USERS nor change its permissions.
";

/// A CURVE certificate in ZPL form. Holds the secret key only when it was built from a
/// keypair or loaded from a `.key_secret` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub public_key: String,
    pub secret_key: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// taken from the header comment, absent if the file had none
    pub created: Option<DateTime<Utc>>,
}

impl Certificate {
    pub fn from_keypair(pair: &CurveKeyPair, metadata: BTreeMap<String, String>) -> Self {
        Certificate {
            public_key: pair.public_z85(),
            secret_key: Some(pair.secret_z85()),
            metadata,
            created: Some(Utc::now()),
        }
    }

    pub fn is_secret(&self) -> bool {
        self.secret_key.is_some()
    }

    /// The shareable half of this certificate.
    pub fn public(&self) -> Certificate {
        Certificate {
            secret_key: None,
            ..self.clone()
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(created) = self.created {
            out.push_str(&format!(
                "#   ****  Generated on {} by curvelib  ****\n",
                created.format(TIMESTAMP_FORMAT)
            ));
        }
        out.push_str(if self.is_secret() {
            SECRET_BANNER
        } else {
            PUBLIC_BANNER
        });
        out.push('\n');
        out.push_str("metadata\n");
        for (name, value) in &self.metadata {
            out.push_str(&format!("    {name} = \"{value}\"\n"));
        }
        out.push_str("curve\n");
        out.push_str(&format!("    public-key = \"{}\"\n", self.public_key));
        if let Some(secret) = &self.secret_key {
            out.push_str(&format!("    secret-key = \"{secret}\"\n"));
        }
        out
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut created = None;
        let mut section = String::new();
        let mut metadata = BTreeMap::new();
        let mut curve = BTreeMap::new();

        for line in text.lines() {
            if let Some(comment) = line.strip_prefix('#') {
                if created.is_none() {
                    created = parse_timestamp(comment);
                }
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if !line.starts_with(char::is_whitespace) {
                section = line.trim().to_string();
                continue;
            }
            let (name, value) = line.split_once('=').ok_or_else(|| {
                ProvisionError::Certificate(format!("expected `name = value`, got `{}`", line.trim()))
            })?;
            let name = name.trim().to_string();
            let value = unquote(value.trim()).to_string();
            match section.as_str() {
                "metadata" => {
                    metadata.insert(name, value);
                }
                "curve" => {
                    curve.insert(name, value);
                }
                other => {
                    return Err(ProvisionError::Certificate(format!(
                        "property `{name}` outside of a known section (`{other}`)"
                    )));
                }
            }
        }

        let public_key = curve
            .remove("public-key")
            .ok_or_else(|| ProvisionError::Certificate("missing curve public-key".to_string()))?;
        decode_key(&public_key)?;

        let secret_key = curve.remove("secret-key");
        if let Some(secret) = &secret_key {
            let pair = CurveKeyPair::from_z85_secret(secret)?;
            if pair.public_z85() != public_key {
                return Err(ProvisionError::Certificate(
                    "secret-key does not match public-key".to_string(),
                ));
            }
        }

        Ok(Certificate {
            public_key,
            secret_key,
            metadata,
            created,
        })
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_timestamp(comment: &str) -> Option<DateTime<Utc>> {
    let (_, rest) = comment.split_once("Generated on ")?;
    let (stamp, _) = rest.split_once(" by")?;
    NaiveDateTime::parse_from_str(stamp.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

impl Saveable for Certificate {
    fn load<I: Read>(mut reader: I) -> IoResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Certificate::parse(&text).map_err(|e| {
            let reason = match e {
                ProvisionError::Certificate(reason) => reason,
                other => other.to_string(),
            };
            IoError::new(IoErrorKind::InvalidData, reason)
        })
    }

    fn save<O: Write>(&self, mut writer: O) -> IoResult<()> {
        writer.write_all(self.render().as_bytes())
    }
}

/// Read a single public or secret certificate.
pub fn load_certificate(fs: &dyn Filesystem, path: &Path) -> Result<Certificate> {
    Certificate::load_from(fs, path).map_err(|e| match e.kind() {
        // parse failures and non UTF-8 contents
        IoErrorKind::InvalidData => ProvisionError::Certificate(format!("{}: {e}", path.display())),
        _ => ProvisionError::filesystem("read certificate", path, e),
    })
}

/// Load every public certificate (`*.key`) in `dir`, keyed by identity.
pub fn load_certificates(fs: &dyn Filesystem, dir: &Path) -> Result<BTreeMap<String, Certificate>> {
    let names = fs
        .list_dir(dir)
        .map_err(|e| ProvisionError::filesystem("list directory", dir, e))?;
    let mut certificates = BTreeMap::new();
    for name in names {
        let Some(identity) = name.strip_suffix(PUBLIC_SUFFIX) else {
            continue;
        };
        let certificate = load_certificate(fs, &dir.join(&name))?;
        debug!(identity, key = %certificate.public_key, "loaded public certificate");
        certificates.insert(identity.to_string(), certificate);
    }
    Ok(certificates)
}
