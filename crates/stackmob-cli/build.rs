//! Embeds the version shown by `stackmob --version`.
//!
//! Release builds print the package version. Builds from a checkout whose
//! `git describe` differs also print the commit, e.g. `0.1.0 (a1b2c3d-dirty)`.

use std::path::PathBuf;
use std::process::Command;

fn main() {
    let pkg = env!("CARGO_PKG_VERSION");

    let git_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../.git");
    if git_dir.exists() {
        println!("cargo:rerun-if-changed={}", git_dir.join("HEAD").display());
        println!("cargo:rerun-if-changed={}", git_dir.join("refs").display());
    }

    let version = match describe() {
        Some(described) if described.trim_start_matches('v') != pkg => {
            format!("{pkg} ({described})")
        }
        _ => pkg.to_string(),
    };
    println!("cargo:rustc-env=STACKMOB_VERSION={version}");
}

fn describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let described = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!described.is_empty()).then_some(described)
}
