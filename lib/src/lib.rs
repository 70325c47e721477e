pub mod certificate;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod keygen;
pub mod provision;
pub mod util;

/// scratch directory the generator writes into, removed at the end of every run
pub const SCRATCH_DIR: &str = "certificates";
/// destination of the shareable half of every keypair
pub const PUBLIC_KEYS_DIR: &str = "public_keys";
/// destination of the secret half of every keypair
pub const PRIVATE_KEYS_DIR: &str = "private_keys";

/// suffix of a public certificate
pub const PUBLIC_SUFFIX: &str = ".key";
/// suffix of a secret certificate
pub const SECRET_SUFFIX: &str = ".key_secret";

/// Identities provisioned on every run, in generation order.
pub const IDENTITIES: [&str; 2] = ["server", "client"];

/// CURVE security needs at least this (major, minor) version of the backend.
pub const MIN_CURVE_VERSION: (u32, u32) = (4, 0);
/// capability a backend must advertise to be usable
pub const CURVE_CAPABILITY: &str = "curve";
