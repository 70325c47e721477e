use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use curvelib::fs::OsFs;
use curvelib::keygen::CurveKeyGenerator;
use curvelib::provision::Provisioner;
use curvelib::{PRIVATE_KEYS_DIR, PUBLIC_KEYS_DIR};
use tracing::*;

mod config;
mod util;

use config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate CURVE certificates for the server and the client")]
struct Cli {
    /// directory receiving public_keys/ and private_keys/, defaults to the executable's
    #[arg(long)]
    base_dir: Option<PathBuf>,
    /// TOML file with certificate metadata
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    util::setup_tracing(cli.verbose)?;
    util::setup_panic_hook();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let base_dir = cli.base_dir.unwrap_or_else(config::default_base_dir);
    debug!(base_dir = %base_dir.display(), ?config, "starting");

    let generator = CurveKeyGenerator::with_metadata(config.metadata);
    let report = Provisioner::new(&OsFs, &generator)
        .provision(&base_dir)
        .with_context(|| format!("Failed to provision certificates in {}", base_dir.display()))?;

    for (identity, path) in &report.public {
        println!("{identity}: public key in {}", path.display());
    }
    for (identity, path) in &report.secret {
        println!("{identity}: secret key in {}", path.display());
    }
    if !report.discarded.is_empty() {
        println!("discarded: {}", report.discarded.join(", "));
    }
    println!(
        "Done, public keys are in '{PUBLIC_KEYS_DIR}' and secret keys in '{PRIVATE_KEYS_DIR}'"
    );
    Ok(())
}
