//! Build script for the task runner
//!
//! Embeds the git revision, build time, target and profile so that
//! `taskrunner version` and the HTTP user agent can report them.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let git_hash = git(&["rev-parse", "--short=8", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let git_dirty = match git(&["status", "--porcelain"]) {
        Some(out) if !out.is_empty() => "true",
        Some(_) => "false",
        None => "unknown",
    };
    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=TASKRUNNER_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=TASKRUNNER_GIT_DIRTY={}", git_dirty);
    println!("cargo:rustc-env=TASKRUNNER_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=TASKRUNNER_TARGET={}", target);
    println!("cargo:rustc-env=TASKRUNNER_PROFILE={}", profile);
}

/// Run git and return trimmed stdout on success
fn git(args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
}
