//! Build script for discat-core.
//!
//! Records the compiler version and the resolved reqwest version so the
//! default user agent reports what the crate was actually built with.

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let rustc_version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .and_then(|out| out.split_whitespace().nth(1).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=DISCAT_RUSTC_VERSION={rustc_version}");

    // The lockfile sits at the workspace root.
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
    let lock = Path::new(&manifest_dir).join("..").join("Cargo.lock");
    println!("cargo:rerun-if-changed={}", lock.display());
    let reqwest_version = std::fs::read_to_string(&lock)
        .ok()
        .and_then(|lock| locked_version(&lock, "reqwest"))
        .unwrap_or_else(|| "0.12".to_string());
    println!("cargo:rustc-env=DISCAT_REQWEST_VERSION={reqwest_version}");
}

/// Finds `version = "x"` on the line after `name = "<package>"`.
fn locked_version(lock: &str, package: &str) -> Option<String> {
    let name_line = format!("name = \"{package}\"");
    let mut lines = lock.lines();
    while let Some(line) = lines.next() {
        if line.trim() == name_line {
            return lines
                .next()?
                .trim()
                .strip_prefix("version = \"")?
                .strip_suffix('"')
                .map(str::to_string);
        }
    }
    None
}
