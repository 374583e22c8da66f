use planweave::contract::{parse_and_validate, ContractError, PlanStep};

fn violations_of(raw: &str) -> Vec<String> {
    match parse_and_validate(raw) {
        Err(ContractError::Violations { violations }) => violations,
        other => panic!("expected violations, got {other:?}"),
    }
}

#[test]
fn validate_module_accepts_a_complete_payload() {
    let raw = r#"{
        "restatement": "user wants the time",
        "visible_reply": "Current time is {{tool_result.local}}.",
        "thinking_log": ["[read] time request", "[plan] clock tool"],
        "tool_plan": [
            {"need_tool": true, "tool": "get_current_date", "reason": "need current time", "save_as": "clock"}
        ]
    }"#;
    let contract = parse_and_validate(raw).expect("valid contract");
    assert_eq!(contract.restatement, "user wants the time");
    assert_eq!(
        contract.thinking_log,
        vec!["[read] time request", "[plan] clock tool"]
    );
    assert_eq!(contract.tool_plan.len(), 1);
    match &contract.tool_plan[0] {
        PlanStep::Tool { tool, save_as, .. } => {
            assert_eq!(tool.as_deref(), Some("get_current_date"));
            assert_eq!(save_as.as_str(), "clock");
        }
        other => panic!("expected tool step, got {other:?}"),
    }
}

#[test]
fn validate_module_repairs_before_validating() {
    let raw = r#"{
        "restatement": "hi",
        "visible_reply": "hello",
        "thinking_log": ["[read] greeting",],
        "tool_plan": [
            {"need_tool": false, "reason": "small talk needs no data",},
        ],
    }"#;
    let contract = parse_and_validate(raw).expect("repaired contract");
    assert!(matches!(contract.tool_plan[0], PlanStep::NoTool { .. }));
}

#[test]
fn validate_module_rejects_unparseable_text() {
    let error = parse_and_validate("no structure here").expect_err("must fail");
    assert!(matches!(error, ContractError::MalformedResponse { .. }));
}

#[test]
fn validate_module_flags_empty_tool_plan() {
    let raw = r#"{
        "restatement": "hi",
        "visible_reply": "hello",
        "thinking_log": [],
        "tool_plan": []
    }"#;
    let violations = violations_of(raw);
    assert!(violations
        .iter()
        .any(|entry| entry == "tool_plan must contain at least one step"));
}

#[test]
fn validate_module_collects_every_violation_at_once() {
    let raw = r#"{
        "thinking_log": "not an array",
        "tool_plan": [{"need_tool": "yes", "reason": ""}]
    }"#;
    let violations = violations_of(raw);
    assert!(violations.iter().any(|entry| entry.contains("restatement")));
    assert!(violations
        .iter()
        .any(|entry| entry.contains("visible_reply")));
    assert!(violations
        .iter()
        .any(|entry| entry.contains("thinking_log")));
    assert!(violations
        .iter()
        .any(|entry| entry.contains("tool_plan[0].need_tool")));
    assert!(violations
        .iter()
        .any(|entry| entry.contains("tool_plan[0].reason")));
}

#[test]
fn validate_module_synthesizes_missing_save_as() {
    let raw = r#"{
        "restatement": "hi",
        "visible_reply": "hello",
        "thinking_log": [],
        "tool_plan": [
            {"need_tool": false, "reason": "first"},
            {"need_tool": false, "reason": "second", "save_as": ""}
        ]
    }"#;
    let contract = parse_and_validate(raw).expect("valid contract");
    assert_eq!(contract.tool_plan[0].save_as().as_str(), "_step1");
    assert_eq!(contract.tool_plan[1].save_as().as_str(), "_step2");
}

#[test]
fn validate_module_rejects_duplicate_save_as() {
    let raw = r#"{
        "restatement": "hi",
        "visible_reply": "hello",
        "thinking_log": [],
        "tool_plan": [
            {"need_tool": false, "reason": "first", "save_as": "same"},
            {"need_tool": false, "reason": "second", "save_as": "same"}
        ]
    }"#;
    let violations = violations_of(raw);
    assert!(violations
        .iter()
        .any(|entry| entry.contains("duplicates an earlier step")));
}

#[test]
fn validate_module_rejects_bad_save_as_characters() {
    let raw = r#"{
        "restatement": "hi",
        "visible_reply": "hello",
        "thinking_log": [],
        "tool_plan": [
            {"need_tool": false, "reason": "first", "save_as": "bad id!"}
        ]
    }"#;
    let violations = violations_of(raw);
    assert!(violations
        .iter()
        .any(|entry| entry.contains("tool_plan[0].save_as invalid")));
}

#[test]
fn validate_module_preserves_thinking_log_order() {
    let raw = r#"{
        "restatement": "hi",
        "visible_reply": "hello",
        "thinking_log": ["  [read] a  ", "[intent] b", "[plan] c"],
        "tool_plan": [{"need_tool": false, "reason": "nothing to fetch"}]
    }"#;
    let contract = parse_and_validate(raw).expect("valid contract");
    assert_eq!(
        contract.thinking_log,
        vec!["[read] a", "[intent] b", "[plan] c"]
    );
}
