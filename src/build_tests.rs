use super::*;
use crate::config::default_document;
use crate::identifiers::KNOWN_TOOLS;
use serde_json::json;

const BUILD_DATE: &str = "2026-03-01T12:00:00Z";

fn shipped_templates() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn options(config: Option<PathBuf>, output_root: PathBuf) -> BuildOptions {
    BuildOptions {
        config,
        source_root: shipped_templates(),
        output_root,
        build_date: BUILD_DATE.to_string(),
    }
}

fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
    serde_json::from_str(&text).expect("json")
}

#[test]
fn builds_every_template_with_the_default_config() {
    let root = tempfile::tempdir().expect("tempdir");
    let out = root.path().join("dist");
    let outcome = run_build(&options(None, out.clone())).expect("build");

    let sources = discover_sources(&shipped_templates(), None).expect("discover");
    assert_eq!(outcome.report.artifacts.len(), sources.len());
    assert_eq!(outcome.published.len(), sources.len() + 1);
    assert!(out.join(REPORT_FILE).is_file());
    assert!(out.join("knowledge/bright-smile-dental-knowledge-base.md").is_file());
    assert_eq!(outcome.report.business_name, "Bright Smile Dental");
    assert_eq!(outcome.report.dynamic_columns, 5);

    let csv = fs::read_to_string(out.join("data/appointments-template.csv")).expect("csv");
    assert_eq!(csv.trim_end().split(',').count(), 16);
    assert!(csv.contains("Teeth Cleaning - Insurance Provider"));
}

#[test]
fn agent_prompt_keeps_runtime_placeholders_and_resolves_the_guide() {
    let root = tempfile::tempdir().expect("tempdir");
    let out = root.path().join("dist");
    run_build(&options(None, out.clone())).expect("build");

    let agent = read_json(&out.join("agents/receptionist-agent.json"));
    let prompt = agent["general_prompt"].as_str().expect("prompt");
    assert!(prompt.contains("{{caller_name}}"));
    assert!(prompt.contains("{{business_name}}"));
    assert!(!prompt.contains("{{service_properties_guide}}"));
    assert!(prompt.contains("- Teeth Cleaning: always ask for insurance_provider"));
    assert_eq!(
        agent["default_dynamic_variables"]["business_name"],
        json!("Bright Smile Dental")
    );
    assert_eq!(agent["begin_message"].as_str().map(|s| s.contains("{{agent_name}}")), Some(true));

    let knowledge = read_json(&out.join("workflows/answer_question.json"));
    let system = knowledge["nodes"][1]["parameters"]["options"]["systemMessage"]
        .as_str()
        .expect("system message");
    assert!(system.starts_with("You answer caller questions for {{business_name}}"));
}

#[test]
fn agent_tool_urls_agree_with_workflow_trigger_paths() {
    let root = tempfile::tempdir().expect("tempdir");
    let out = root.path().join("dist");
    let outcome = run_build(&options(None, out.clone())).expect("build");

    let agent = read_json(&out.join("agents/receptionist-agent.json"));
    for tool in KNOWN_TOOLS {
        let url = agent["tools"]
            .as_array()
            .expect("tools")
            .iter()
            .find(|entry| entry["name"] == json!(tool))
            .and_then(|entry| entry["url"].as_str())
            .unwrap_or_else(|| panic!("tool {tool}"))
            .to_string();
        let workflow = read_json(&out.join(format!("workflows/{tool}.json")));
        let path = workflow["nodes"][0]["parameters"]["path"].as_str().expect("path");
        assert!(url.ends_with(&format!("/webhook/{path}")), "{url} vs {path}");
        assert_eq!(
            workflow["nodes"][0]["name"],
            json!(format!("{} Webhook", crate::util::snake_to_title(tool)))
        );
    }
    assert_eq!(outcome.report.endpoints.len(), KNOWN_TOOLS.len());
}

#[test]
fn pinned_build_date_gives_byte_identical_output() {
    let root = tempfile::tempdir().expect("tempdir");
    let first = root.path().join("first");
    let second = root.path().join("second");
    run_build(&options(None, first.clone())).expect("first build");
    run_build(&options(None, second.clone())).expect("second build");

    let first_files = collect_files_recursive(&first).expect("collect");
    let second_files = collect_files_recursive(&second).expect("collect");
    assert_eq!(first_files.len(), second_files.len());
    for (a, b) in first_files.iter().zip(&second_files) {
        assert_eq!(a.strip_prefix(&first).ok(), b.strip_prefix(&second).ok());
        assert_eq!(fs::read(a).expect("read"), fs::read(b).expect("read"), "{}", a.display());
    }
}

#[test]
fn constraint_violation_writes_nothing() {
    let root = tempfile::tempdir().expect("tempdir");
    let mut document = default_document().expect("default");
    let services: Vec<Value> = (0..9)
        .map(|index| json!({ "name": format!("Service {index}") }))
        .collect();
    document["client_data"]["services"] = json!(services);
    let config = root.path().join("config.json");
    fs::write(&config, serde_json::to_string(&document).expect("serialize")).expect("write");
    let out = root.path().join("dist");

    let err = run_build(&options(Some(config), out.clone())).expect_err("too many services");
    assert!(err.to_string().contains("9"), "{err}");
    assert!(!out.exists());
    let leftovers = fs::read_dir(root.path()).expect("read dir").count();
    assert_eq!(leftovers, 1);
}

#[test]
fn discovery_skips_hidden_files_and_the_output_tree() {
    let root = tempfile::tempdir().expect("tempdir");
    let src = root.path();
    fs::create_dir_all(src.join("prompts")).expect("mkdir");
    fs::create_dir_all(src.join("dist/agents")).expect("mkdir");
    fs::create_dir_all(src.join(".git")).expect("mkdir");
    fs::write(src.join("prompts/agent-prompt.md"), "x").expect("write");
    fs::write(src.join("prompts/.DS_Store"), "x").expect("write");
    fs::write(src.join(".git/config"), "x").expect("write");
    fs::write(src.join("dist/agents/a.json"), "{}").expect("write");

    let sources = discover_sources(src, Some(&src.join("dist"))).expect("discover");
    assert_eq!(sources, vec!["prompts/agent-prompt.md".to_string()]);
    assert!(discover_sources(&src.join("missing"), None).is_err());
}

#[test]
fn colliding_outputs_keep_the_first_source() {
    let mut diagnostics = Diagnostics::new();
    let mut first = Artifact::new("knowledge/{{business_slug}}.md", b"a".to_vec());
    first.output_path = "knowledge/acme.md".to_string();
    let second = Artifact::new("knowledge/acme.md", b"b".to_vec());
    let report = Artifact::new(REPORT_FILE, b"{}".to_vec());

    let kept = dedupe_outputs(vec![first, second, report], &mut diagnostics);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].source_path, "knowledge/{{business_slug}}.md");
    assert_eq!(diagnostics.count(WarningKind::Reference), 2);
}

#[test]
fn build_dates_must_be_rfc3339() {
    assert_eq!(resolve_build_date(Some(BUILD_DATE)).expect("valid"), BUILD_DATE);
    assert!(resolve_build_date(Some("March 1st")).is_err());
    let now = resolve_build_date(None).expect("now");
    assert!(DateTime::parse_from_rfc3339(&now).is_ok());
}

#[test]
fn prepare_warns_when_services_are_missing() {
    let root = tempfile::tempdir().expect("tempdir");
    let mut document = default_document().expect("default");
    document["client_data"]["services"] = Value::Null;
    let config = root.path().join("config.json");
    fs::write(&config, serde_json::to_string(&document).expect("serialize")).expect("write");

    let mut diagnostics = Diagnostics::new();
    let prepared = prepare(Some(&config), BUILD_DATE, &mut diagnostics).expect("prepare");
    assert!(prepared.services.services.is_empty());
    assert!(diagnostics
        .warnings()
        .iter()
        .any(|warning| warning.kind == WarningKind::Config && warning.subject == "client_data.services"));
}

#[test]
fn skipped_sources_are_never_compiled() {
    let root = tempfile::tempdir().expect("tempdir");
    let src = root.path().join("src");
    fs::create_dir_all(src.join("workflows")).expect("mkdir");
    fs::create_dir_all(src.join("agents")).expect("mkdir");
    let workflow = json!({
        "nodes": [ { "name": "Webhook", "type": "n8n-nodes-base.webhook", "parameters": {} } ],
        "connections": {}
    });
    let text = serde_json::to_string_pretty(&workflow).expect("serialize");
    fs::write(src.join("workflows/bright-smile-dental.json"), &text).expect("write");
    fs::write(src.join("workflows/{{business_slug}}.json"), &text).expect("write");
    fs::write(src.join("agents/bright-smile-dental.json"), "{}").expect("write");
    fs::write(src.join("agents/{{business_slug}}.json"), "{ broken").expect("write");

    let outcome = run_build(&BuildOptions {
        config: None,
        source_root: src,
        output_root: root.path().join("dist"),
        build_date: BUILD_DATE.to_string(),
    })
    .expect("build");

    let report = &outcome.report;
    let sources: Vec<&str> = report.artifacts.iter().map(|a| a.source.as_str()).collect();
    assert_eq!(sources, vec!["agents/bright-smile-dental.json", "workflows/bright-smile-dental.json"]);
    assert_eq!(report.endpoints.len(), 1);
    assert!(!report.warnings.iter().any(|w| w.kind == WarningKind::Parse));
    let skipped: Vec<&str> = report
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::Reference && w.message.contains("already produced"))
        .map(|w| w.subject.as_str())
        .collect();
    assert_eq!(skipped, vec!["agents/{{business_slug}}.json", "workflows/{{business_slug}}.json"]);
}
