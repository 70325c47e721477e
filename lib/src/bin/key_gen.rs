//! Provided a name, create a CURVE certificate pair.

use curvelib::fs::OsFs;
use curvelib::keygen::{CurveKeyGenerator, KeyGenerator};
use std::path::PathBuf;
use std::{env, process::exit};

fn main() {
    let Some(name) = env::args().nth(1) else {
        eprintln!("Usage: key_gen <name> [dir]");
        exit(1);
    };
    let dir = env::args()
        .nth(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    match CurveKeyGenerator::new().create_keypair(&OsFs, &dir, &name) {
        Ok((public, secret)) => {
            println!("public certificate: {}", public.display());
            println!("secret certificate: {}", secret.display());
        }
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    }
}
