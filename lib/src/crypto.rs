use std::fmt;

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{ProvisionError, Result};

/// length of a Z85 encoded 32-byte key
pub const Z85_KEY_LEN: usize = 40;

/// A Curve25519 keypair as used by the CURVE security mechanism.
#[derive(Clone)]
pub struct CurveKeyPair {
    public: PublicKey,
    secret: StaticSecret,
}

impl CurveKeyPair {
    /// Fresh keypair from the OS random source.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self::from_secret(secret)
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        CurveKeyPair { public, secret }
    }

    /// Rebuild a keypair from its Z85 secret, the public half is derived again.
    pub fn from_z85_secret(encoded: &str) -> Result<Self> {
        let bytes = decode_key(encoded)?;
        Ok(Self::from_secret(StaticSecret::from(bytes)))
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    pub fn public_z85(&self) -> String {
        z85::encode(self.public.as_bytes())
    }

    pub fn secret_z85(&self) -> String {
        z85::encode(self.secret.to_bytes())
    }
}

impl fmt::Debug for CurveKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveKeyPair")
            .field("public", &self.public_z85())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Decode a Z85 key, which must be exactly 40 characters / 32 bytes.
pub fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    if encoded.len() != Z85_KEY_LEN {
        return Err(ProvisionError::Certificate(format!(
            "key must be {Z85_KEY_LEN} Z85 characters, got {}",
            encoded.len()
        )));
    }
    let bytes = z85::decode(encoded)
        .map_err(|e| ProvisionError::Certificate(format!("invalid Z85 key: {e:?}")))?;
    bytes
        .try_into()
        .map_err(|_| ProvisionError::Certificate("key does not decode to 32 bytes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_keys_are_forty_chars() {
        let pair = CurveKeyPair::generate();
        assert_eq!(pair.public_z85().len(), Z85_KEY_LEN);
        assert_eq!(pair.secret_z85().len(), Z85_KEY_LEN);
    }

    #[test]
    fn secret_derives_same_public_key() {
        let pair = CurveKeyPair::generate();
        let restored = CurveKeyPair::from_z85_secret(&pair.secret_z85()).unwrap();
        assert_eq!(pair.public_bytes(), restored.public_bytes());
    }

    #[test]
    fn two_keypairs_differ() {
        let a = CurveKeyPair::generate();
        let b = CurveKeyPair::generate();
        assert_ne!(a.public_z85(), b.public_z85());
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(matches!(
            decode_key("abc"),
            Err(ProvisionError::Certificate(_))
        ));
    }

    #[test]
    fn debug_hides_secret() {
        let pair = CurveKeyPair::generate();
        let shown = format!("{pair:?}");
        assert!(!shown.contains(&pair.secret_z85()));
        assert!(shown.contains("<redacted>"));
    }
}
