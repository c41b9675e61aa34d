//! Embeds `BUILD_INFO_HUMAN` for `ghprs --version`.
//!
//! The string is `{crate version} ({git version}) {rustc version}`, where the
//! git version is `git describe --tags --always --dirty` when a tag is
//! reachable and otherwise a pseudo-version
//! `v{crate version}-{YYYYmmddHHMMSS}-{12-char commit}[+dirty]`. Clean trees
//! use the commit time so the same commit always yields the same version;
//! dirty trees and checkouts without git use the build time.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }
    println!("cargo:rustc-env=BUILD_INFO_HUMAN={}", build_info());
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    Command::new(program)
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `None` outside a git checkout. `.cargo-ok` is written by
/// `cargo install --git` and does not make the tree dirty.
fn is_dirty() -> Option<bool> {
    run("git", &["status", "--porcelain"]).map(|status| {
        status
            .lines()
            .filter_map(|line| line.get(3..))
            .any(|path| path != ".cargo-ok")
    })
}

fn pseudo_version() -> String {
    let commit =
        run("git", &["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let dirty = is_dirty();

    let commit_time = || {
        run("git", &["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    };
    let timestamp = match dirty {
        Some(false) => commit_time().unwrap_or_else(Utc::now),
        Some(true) | None => Utc::now(),
    }
    .format(TIMESTAMP_FORMAT);

    let suffix = if dirty == Some(true) { "+dirty" } else { "" };
    format!(
        "v{}-{timestamp}-{commit}{suffix}",
        env!("CARGO_PKG_VERSION")
    )
}

fn git_version() -> String {
    match run("git", &["describe", "--tags", "--always", "--dirty"]) {
        // A bare commit hash means no tag is reachable.
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(),
    }
}

fn build_info() -> String {
    let mut parts = vec![
        env!("CARGO_PKG_VERSION").to_string(),
        format!("({})", git_version()),
    ];
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    parts.extend(run(&rustc, &["--version"]));
    parts.join(" ")
}
