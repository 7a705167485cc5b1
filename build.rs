//! Embeds a human-readable version string as `BUILD_INFO_HUMAN`.
//!
//! The string is `{CARGO_PKG_VERSION} ({git}) {rustc --version}`, where
//! `{git}` is `git describe --tags --always --dirty` when a tag is
//! reachable. Untagged checkouts get a pseudo-version of the form
//! `v{CARGO_PKG_VERSION}-{YYYYmmddHHMMSS}-{sha12}[+dirty]`, stamped with
//! the commit time for clean trees and the build time otherwise. Builds
//! outside a git checkout omit the git part's dirty marker and use the
//! build time.

use std::{env, process::Command};

use chrono::{DateTime, Utc};

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

fn main() {
    for path in ["src", "build.rs", "Cargo.toml", "Cargo.lock"] {
        println!("cargo:rerun-if-changed={path}");
    }

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    let info = [
        Some(version.clone()),
        Some(format!("({})", git_version(&version))),
        run("rustc", &["--version"]),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    println!("cargo:rustc-env=BUILD_INFO_HUMAN={info}");
}

fn run(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn git(args: &[&str]) -> Option<String> {
    run("git", args)
}

/// `None` when git is unavailable. `.cargo-ok` is written into the source
/// tree by `cargo install --git` and does not count as a local change.
fn dirty() -> Option<bool> {
    let status = git(&["status", "--porcelain"]);
    if status.is_none() {
        // Clean trees print nothing, which `run` also reports as None.
        return git(&["rev-parse", "--git-dir"]).map(|_| false);
    }
    status.map(|s| s.lines().any(|line| line.get(3..) != Some(".cargo-ok")))
}

fn git_version(version: &str) -> String {
    match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(desc) if desc.contains('v') || desc.contains("-g") => desc,
        _ => pseudo_version(version),
    }
}

fn pseudo_version(version: &str) -> String {
    let sha = git(&["rev-parse", "--short=12", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let is_dirty = dirty();

    let commit_time = || {
        git(&["log", "-1", "--format=%ct"])
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    };
    let stamp = match is_dirty {
        Some(false) => commit_time().unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
    .format(STAMP_FORMAT);

    let suffix = if is_dirty == Some(true) { "+dirty" } else { "" };
    format!("v{version}-{stamp}-{sha}{suffix}")
}
