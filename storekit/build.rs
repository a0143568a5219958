//! Stamps git and toolchain metadata into the build for `storekit::version`

use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");
    println!("cargo:rerun-if-env-changed=STOREKIT_VERSION");

    let version = std::env::var("STOREKIT_VERSION")
        .or_else(|_| std::env::var("CARGO_PKG_VERSION"))
        .unwrap_or_default();
    let state = match git(&["status", "--porcelain"]) {
        Some(changes) if changes.is_empty() => "clean".to_string(),
        Some(_) => "dirty".to_string(),
        None => String::new(),
    };
    let build_stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    emit("STOREKIT_BUILD_VERSION", &version);
    emit("STOREKIT_GIT_COMMIT", &git(&["rev-parse", "HEAD"]).unwrap_or_default());
    emit(
        "STOREKIT_GIT_COMMIT_STAMP",
        &git(&["log", "-1", "--format=%ct"]).unwrap_or_default(),
    );
    emit(
        "STOREKIT_GIT_BRANCH",
        &git(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default(),
    );
    emit("STOREKIT_GIT_STATE", &state);
    emit("STOREKIT_BUILD_STAMP", &build_stamp.to_string());
    emit("STOREKIT_RUSTC_VERSION", &rustc_version);
    emit(
        "STOREKIT_TARGET",
        &std::env::var("TARGET").unwrap_or_default(),
    );
    Ok(())
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

/// Trimmed stdout of a git command, or None when git is unavailable
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}
