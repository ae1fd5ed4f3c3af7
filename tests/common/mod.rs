//! Shared helpers for driving the `vpack` binary.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const BUILD_DATE: &str = "2026-02-03T04:05:06Z";

pub fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn templates_dir() -> PathBuf {
    manifest_dir().join("templates")
}

/// A `vpack` invocation with a clean logging environment.
pub fn vpack() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_vpack"));
    command.env_remove("VPACK_LOG");
    command
}

pub fn default_config() -> Value {
    let text = fs::read_to_string(manifest_dir().join("defaults/config.json")).expect("read default config");
    serde_json::from_str(&text).expect("parse default config")
}

pub fn write_config(dir: &Path, document: &Value) -> PathBuf {
    let path = dir.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(document).expect("serialize")).expect("write config");
    path
}

/// Copy every template into `dest` so a test can add or break sources.
pub fn copy_templates(dest: &Path) {
    copy_dir(&templates_dir(), dest);
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create dir");
    for entry in fs::read_dir(from).expect("read dir") {
        let entry = entry.expect("entry");
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("copy");
        }
    }
}

pub fn build(config: &Path, src: &Path, out: &Path) -> Output {
    vpack()
        .arg("build")
        .arg("--config")
        .arg(config)
        .arg("--src")
        .arg(src)
        .arg("--out")
        .arg(out)
        .args(["--build-date", BUILD_DATE, "--json"])
        .output()
        .expect("run vpack build")
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "vpack failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

pub fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
    serde_json::from_str(&text).expect("json")
}

pub fn has_warning(report: &Value, kind: &str, subject: &str) -> bool {
    report["warnings"]
        .as_array()
        .map(|warnings| {
            warnings
                .iter()
                .any(|w| w["kind"] == kind && w["subject"] == subject)
        })
        .unwrap_or(false)
}
