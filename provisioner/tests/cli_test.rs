use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn provisioner() -> Command {
    Command::new(env!("CARGO_BIN_EXE_provisioner"))
}

#[test]
fn provisions_base_dir_and_exits_zero() {
    let base = TempDir::new().unwrap();
    let output = provisioner()
        .arg("--base-dir")
        .arg(base.path())
        .output()
        .unwrap();

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("server: public key in"));
    assert!(base.path().join("public_keys/server.key").is_file());
    assert!(base.path().join("private_keys/client.key_secret").is_file());
    assert!(!base.path().join("certificates").exists());
}

#[test]
fn config_metadata_reaches_certificates() {
    let base = TempDir::new().unwrap();
    let config = base.path().join("provision.toml");
    fs::write(&config, "[metadata]\nowner = \"ops\"\n").unwrap();

    let status = provisioner()
        .arg("--base-dir")
        .arg(base.path())
        .arg("--config")
        .arg(&config)
        .status()
        .unwrap();

    assert!(status.success());
    let public = fs::read_to_string(base.path().join("public_keys/client.key")).unwrap();
    assert!(public.contains("owner = \"ops\""));
}

#[test]
fn missing_base_dir_exits_non_zero() {
    let base = TempDir::new().unwrap();
    let output = provisioner()
        .arg("--base-dir")
        .arg(base.path().join("absent"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to provision certificates"));
}
