use super::*;
use crate::compile::test_support::{fixture, fixture_from, PRIMARY};
use crate::config::default_document;
use serde_json::json;

fn agent_descriptor() -> Value {
    json!({
        "agent_name": "Template Agent",
        "voice_id": "placeholder-voice",
        "max_call_duration_ms": 1,
        "language": "en-US",
        "general_prompt": "replace me",
        "begin_message": "Hi, this is {{agent_name}}.",
        "default_dynamic_variables": {},
        "tools": [
            { "name": "check_availability", "url": "https://old.example/a", "parameters": {} },
            { "name": "book_appointment", "url": "https://old.example/b", "parameters": {} },
            { "name": "modify_appointment", "url": "https://old.example/c", "parameters": {} },
            { "name": "end_call", "type": "end_call" }
        ],
        "nodes": [
            { "id": "start", "type": "conversation" },
            { "id": "transfer", "type": "transfer_call", "transfer_destination": { "type": "predefined", "number": "+10000000000" } }
        ]
    })
}

#[test]
fn voice_settings_update_only_present_fields_with_typed_values() {
    let mut fixture = fixture();
    let out = fixture.compile_json("agents/receptionist.json", &agent_descriptor());

    assert_eq!(out["voice_id"], json!("11labs-Adrian"));
    assert_eq!(out["max_call_duration_ms"], json!(900000));
    assert_eq!(out["agent_name"], json!("Ava"));
    assert!(out.get("interruption_sensitivity").is_none());
    assert_eq!(out["language"], json!("en-US"));
    assert_eq!(out["begin_message"], json!("Hi, this is {{agent_name}}."));
}

#[test]
fn prompt_and_dynamic_variables_come_from_earlier_phases() {
    let mut fixture = fixture();
    let out = fixture.compile_json("agents/receptionist.json", &agent_descriptor());

    assert_eq!(out["general_prompt"], json!(PRIMARY));
    let table = out["default_dynamic_variables"].as_object().expect("table");
    assert_eq!(table.len(), fixture.phases.runtime.len());
    assert_eq!(table["business_name"], json!("Bright Smile Dental"));
    assert_eq!(table["greeting_style"], json!("warm and professional"));
}

#[test]
fn tool_urls_and_transfer_numbers_are_rewritten() {
    let mut fixture = fixture();
    let out = fixture.compile_json("agents/receptionist.json", &agent_descriptor());

    let expected = fixture.identifiers.identify("book_appointment").url;
    assert_eq!(out["tools"][1]["url"], json!(expected));
    assert!(expected.starts_with("https://automation.example.com/webhook/book-appointment-"));
    assert!(out["tools"][3].get("url").is_none());
    assert_eq!(out["nodes"][1]["transfer_destination"]["number"], json!("+15555550100"));
    assert_eq!(out["nodes"][1]["transfer_destination"]["type"], json!("predefined"));
    assert!(fixture.diagnostics.is_empty(), "{:?}", fixture.diagnostics.warnings());
}

#[test]
fn booking_tools_receive_generated_schemas() {
    let mut fixture = fixture();
    let out = fixture.compile_json("agents/receptionist.json", &agent_descriptor());

    assert_eq!(out["tools"][1]["parameters"], fixture.services.appointment_schema);
    assert_eq!(out["tools"][2]["parameters"], fixture.services.modify_schema);
    assert_eq!(out["tools"][0]["parameters"], json!({}));
    let required = out["tools"][1]["parameters"]["required"].as_array().expect("required");
    assert!(required.contains(&json!("services")));
}

#[test]
fn missing_targets_warn_and_leave_the_rest_alone() {
    let mut fixture = fixture();
    let mut descriptor = agent_descriptor();
    descriptor["tools"].as_array_mut().expect("tools").remove(2);
    descriptor.as_object_mut().expect("object").remove("general_prompt");
    let out = fixture.compile_json("agents/receptionist.json", &descriptor);

    assert_eq!(fixture.diagnostics.count(WarningKind::Reference), 2);
    assert!(out.get("general_prompt").is_none());
    assert_eq!(out["tools"][1]["parameters"], fixture.services.appointment_schema);
}

#[test]
fn unparseable_numeric_setting_keeps_descriptor_value() {
    let mut document = default_document().expect("default");
    document["build_settings"]["voice"]["max_call_duration_ms"] = json!("fifteen minutes");
    let mut fixture = fixture_from(document);
    let out = fixture.compile_json("agents/receptionist.json", &agent_descriptor());

    assert_eq!(out["max_call_duration_ms"], json!(1));
    assert_eq!(fixture.diagnostics.count(WarningKind::Config), 1);
}

#[test]
fn interruption_sensitivity_is_a_float() {
    assert_eq!(typed_value("0.8", FieldType::Float), Some(json!(0.8)));
    assert_eq!(typed_value(" 42 ", FieldType::Integer), Some(json!(42)));
    assert_eq!(typed_value("4.5", FieldType::Integer), None);
}
