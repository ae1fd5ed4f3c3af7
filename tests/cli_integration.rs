mod common;

use common::*;
use serde_json::json;
use std::fs;

#[test]
fn init_writes_default_config_and_refuses_to_overwrite() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("client/config.json");

    let first = vpack().arg("init").arg("--config").arg(&config).output().expect("init");
    assert_success(&first);
    assert_eq!(read_json(&config), default_config());

    let second = vpack().arg("init").arg("--config").arg(&config).output().expect("init");
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = vpack()
        .arg("init")
        .arg("--config")
        .arg(&config)
        .arg("--force")
        .output()
        .expect("init");
    assert_success(&forced);
}

#[test]
fn validate_reports_counts_without_writing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_config(temp.path(), &default_config());

    let output = vpack()
        .current_dir(temp.path())
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .output()
        .expect("validate");
    assert_success(&output);
    let summary = stdout_json(&output);
    assert_eq!(summary["services"], json!(2));
    assert_eq!(summary["dynamic_columns"], json!(5));
    assert_eq!(summary["csv_columns"], json!(16));
    assert_eq!(summary["business_name"], json!("Bright Smile Dental"));
    assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 1);
}

#[test]
fn validate_rejects_malformed_config() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("config.json");
    fs::write(&config, "{ not json").expect("write");

    let output = vpack().arg("validate").arg("--config").arg(&config).output().expect("validate");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("configuration error"));
}

#[test]
fn ids_match_the_urls_compiled_into_the_agent() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_config(temp.path(), &default_config());
    let out = temp.path().join("dist");
    assert_success(&build(&config, &templates_dir(), &out));

    let output = vpack()
        .arg("ids")
        .arg("--config")
        .arg(&config)
        .args(["--tool", "book_appointment", "--tool", "log-call", "--json"])
        .output()
        .expect("ids");
    assert_success(&output);
    let ids = stdout_json(&output);
    let ids = ids.as_array().expect("array");
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[1]["tool_name"], json!("log_call"));

    let agent = read_json(&out.join("agents/receptionist-agent.json"));
    let book_url = agent["tools"]
        .as_array()
        .expect("tools")
        .iter()
        .find(|tool| tool["name"] == json!("book_appointment"))
        .map(|tool| tool["url"].clone())
        .expect("book tool");
    assert_eq!(ids[0]["url"], book_url);
    assert_eq!(ids[0]["hash"].as_str().map(str::len), Some(8));
}

#[test]
fn missing_config_falls_back_to_the_default_with_a_warning() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("dist");
    let output = build(&temp.path().join("absent.json"), &templates_dir(), &out);
    assert_success(&output);
    let report = stdout_json(&output);
    assert_eq!(report["business_name"], json!("Bright Smile Dental"));
    assert!(report["warnings"]
        .as_array()
        .expect("warnings")
        .iter()
        .any(|w| w["kind"] == "config"));
}

#[test]
fn verbose_build_lists_published_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = write_config(temp.path(), &default_config());
    let out = temp.path().join("dist");

    let output = vpack()
        .arg("build")
        .arg("--config")
        .arg(&config)
        .arg("--src")
        .arg(templates_dir())
        .arg("--out")
        .arg(&out)
        .arg("--build-date")
        .arg(BUILD_DATE)
        .arg("--verbose")
        .output()
        .expect("build");
    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let report = out.join("build-report.json");
    assert!(stdout.contains(&format!("published {}", report.display())), "{stdout}");
    assert!(stdout.contains("receptionist-agent.json"), "{stdout}");
}
