use planweave::orchestration::reference::{resolve_arg_references, ToolRef};
use planweave::orchestration::NamedResult;
use planweave::session::{ErrorDetail, RunStatus};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

fn succeeded(tool: &str, result: Value) -> NamedResult {
    NamedResult {
        tool: tool.to_string(),
        status: RunStatus::Succeeded,
        result: Some(result),
        error: None,
    }
}

fn args_of(value: Value) -> Map<String, Value> {
    value.as_object().expect("object literal").clone()
}

#[test]
fn reference_module_parses_the_grammar() {
    let parsed = ToolRef::parse("$tool.schedule.result.interestSeries").expect("valid reference");
    assert_eq!(parsed.step_id, "schedule");
    assert_eq!(parsed.path, vec!["result", "interestSeries"]);
    assert_eq!(parsed.to_string(), "$tool.schedule.result.interestSeries");

    assert!(ToolRef::parse("$tool.step1").is_some());
    assert!(ToolRef::parse("plain string").is_none());
    assert!(ToolRef::parse("$tool.").is_none());
    assert!(ToolRef::parse("$tool.a..b").is_none());
    assert!(ToolRef::parse("$tool.step one").is_none());
}

#[test]
fn reference_module_substitutes_nested_and_array_values() {
    let mut named = BTreeMap::new();
    named.insert(
        "calc".to_string(),
        succeeded("js.run_sandbox", json!({"result": {"series": [10, 20, 30]}})),
    );

    let args = args_of(json!({
        "items": "$tool.calc.result.series",
        "first": "$tool.calc.result.series.0",
        "nested": {"inner": ["$tool.calc.result.series.2"]}
    }));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert!(resolved.errors.is_empty());
    let value = resolved.value.expect("resolved args");
    assert_eq!(value["items"], json!([10, 20, 30]));
    assert_eq!(value["first"], json!(10));
    assert_eq!(value["nested"]["inner"][0], json!(30));
}

#[test]
fn reference_module_flattened_paths_reach_into_result() {
    let mut named = BTreeMap::new();
    named.insert(
        "avg".to_string(),
        succeeded("math.aggregate", json!({"value": 4.0})),
    );

    let args = args_of(json!({
        "short": "$tool.avg.value",
        "long": "$tool.avg.result.value"
    }));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert!(resolved.errors.is_empty());
    let value = resolved.value.expect("resolved args");
    assert_eq!(value["short"], value["long"]);
}

#[test]
fn reference_module_bare_reference_yields_the_result_payload() {
    let mut named = BTreeMap::new();
    named.insert(
        "clock".to_string(),
        succeeded("get_current_date", json!({"iso": "2026-01-01T00:00:00.000Z"})),
    );

    let args = args_of(json!({"snapshot": "$tool.clock"}));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert!(resolved.errors.is_empty());
    let value = resolved.value.expect("resolved args");
    assert_eq!(value["snapshot"], json!({"iso": "2026-01-01T00:00:00.000Z"}));
}

#[test]
fn reference_module_reports_unknown_step_ids() {
    let named = BTreeMap::new();
    let args = args_of(json!({"tz": "$tool.step1.local"}));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert_eq!(resolved.errors, vec!["$tool.step1".to_string()]);
}

#[test]
fn reference_module_reports_undefined_paths_with_the_full_reference() {
    let mut named = BTreeMap::new();
    named.insert(
        "clock".to_string(),
        succeeded("get_current_date", json!({"iso": "x"})),
    );
    let args = args_of(json!({"tz": "$tool.clock.result.nonsense"}));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert_eq!(
        resolved.errors,
        vec!["$tool.clock.result.nonsense".to_string()]
    );
}

#[test]
fn reference_module_reads_error_records() {
    let mut named = BTreeMap::new();
    named.insert(
        "broken".to_string(),
        NamedResult {
            tool: "js.run_sandbox".to_string(),
            status: RunStatus::Failed,
            result: None,
            error: Some(ErrorDetail {
                code: "timeout".to_string(),
                detail: "Exceeded 100ms".to_string(),
            }),
        },
    );
    let args = args_of(json!({
        "code": "$tool.broken.error.code",
        "status": "$tool.broken.status"
    }));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert!(resolved.errors.is_empty());
    let value = resolved.value.expect("resolved args");
    assert_eq!(value["code"], json!("timeout"));
    assert_eq!(value["status"], json!("failed"));
}

#[test]
fn reference_module_absent_args_stay_absent() {
    let named = BTreeMap::new();
    let resolved = resolve_arg_references(None, &named);
    assert!(resolved.value.is_none());
    assert!(resolved.errors.is_empty());
}

#[test]
fn reference_module_non_reference_values_pass_through() {
    let named = BTreeMap::new();
    let args = args_of(json!({
        "text": "$toolbox.left.alone",
        "n": 5,
        "flag": true,
        "none": null
    }));
    let resolved = resolve_arg_references(Some(&args), &named);
    assert!(resolved.errors.is_empty());
    let value = resolved.value.expect("resolved args");
    assert_eq!(value["text"], json!("$toolbox.left.alone"));
    assert_eq!(value["n"], json!(5));
}
