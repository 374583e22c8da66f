use planweave::session::memory::{MemoryContext, TurnSummary};
use planweave::session::{RunStatus, SessionState, ToolRun, Turn};
use serde_json::json;

#[test]
fn session_module_turn_ids_are_unique_and_tracked() {
    let mut session = SessionState::new(10);
    let first = session.start_turn();
    assert!(first.id.starts_with("turn-"));
    assert_eq!(session.active_turn_id(), Some(first.id.as_str()));

    let second = session.start_turn();
    assert_ne!(first.id, second.id);
    assert_eq!(session.active_turn_id(), Some(second.id.as_str()));

    session.finish_turn(second);
    assert_eq!(session.active_turn_id(), None);

    // A stale turn does not clear a newer active id.
    let third = session.start_turn();
    session.finish_turn(first);
    assert_eq!(session.active_turn_id(), Some(third.id.as_str()));
}

#[test]
fn session_module_history_is_capped_dropping_the_oldest() {
    let mut session = SessionState::new(10);
    let mut ids = Vec::new();
    for _ in 0..12 {
        let turn = session.start_turn();
        ids.push(turn.id.clone());
        session.finish_turn(turn);
    }
    assert_eq!(session.history_len(), 10);
    let kept: Vec<&str> = session.history().map(|turn| turn.id.as_str()).collect();
    assert_eq!(kept.first().copied(), Some(ids[2].as_str()));
    assert_eq!(kept.last().copied(), Some(ids[11].as_str()));
}

#[test]
fn session_module_cap_is_at_least_one() {
    let mut session = SessionState::new(0);
    let turn = session.start_turn();
    session.finish_turn(turn);
    assert_eq!(session.history_len(), 1);
}

#[test]
fn session_module_tool_runs_update_in_place() {
    let mut turn = Turn {
        id: "turn-1-abcd".to_string(),
        tool_runs: Vec::new(),
    };
    let index = turn.push_tool_run(ToolRun {
        id: "clock".to_string(),
        tool: "get_current_date".to_string(),
        args_raw: None,
        args_resolved: None,
        status: RunStatus::Started,
        result: None,
        error: None,
        time_ms: None,
    });
    let run = turn.tool_run_mut(index).expect("run exists");
    run.status = RunStatus::Succeeded;
    run.result = Some(json!({"iso": "x"}));
    run.time_ms = Some(12);

    assert_eq!(turn.tool_runs[0].status, RunStatus::Succeeded);
    assert!(turn.tool_run_mut(5).is_none());
}

#[test]
fn session_module_tool_run_serializes_camel_case() {
    let run = ToolRun {
        id: "clock".to_string(),
        tool: "get_current_date".to_string(),
        args_raw: Some(json!({})),
        args_resolved: Some(json!({})),
        status: RunStatus::Succeeded,
        result: Some(json!({"iso": "x"})),
        error: None,
        time_ms: Some(7),
    };
    let encoded = serde_json::to_value(&run).expect("serializes");
    assert_eq!(encoded["timeMs"], json!(7));
    assert_eq!(encoded["argsRaw"], json!({}));
    assert_eq!(encoded["status"], json!("succeeded"));
}

#[test]
fn memory_module_renders_the_prompt_block() {
    let memory = MemoryContext {
        last_intent: Some("check the loan schedule".to_string()),
        last_tool_plan: Some(json!([{"need_tool": true, "tool": "js.run_sandbox"}])),
        history: vec![
            TurnSummary {
                user_input: "what time is it".to_string(),
                visible_reply: "Current time is 10:00".to_string(),
            },
            TurnSummary {
                user_input: "thanks".to_string(),
                visible_reply: "You're welcome".to_string(),
            },
        ],
    };
    let block = memory.build_memory_prompt().expect("non-empty block");
    assert!(block.starts_with("Memory context (reuse parameters unless user overrides):"));
    assert!(block.contains("previous_intent: check the loan schedule"));
    assert!(block.contains("last_tool_plan: "));
    assert!(block.contains("1. user=\"what time is it\" -> reply=\"Current time is 10:00\""));
    assert!(block.contains("2. user=\"thanks\""));
}

#[test]
fn memory_module_empty_context_renders_nothing() {
    assert!(MemoryContext::default().build_memory_prompt().is_none());

    let blank = MemoryContext {
        last_intent: Some("   ".to_string()),
        last_tool_plan: Some(json!([])),
        history: Vec::new(),
    };
    assert!(blank.build_memory_prompt().is_none());
}

#[test]
fn memory_module_truncates_long_entries() {
    let memory = MemoryContext {
        last_intent: None,
        last_tool_plan: None,
        history: vec![TurnSummary {
            user_input: "x".repeat(300),
            visible_reply: "ok".to_string(),
        }],
    };
    let block = memory.build_memory_prompt().expect("non-empty block");
    let line = block
        .lines()
        .find(|line| line.starts_with("1. "))
        .expect("summary line");
    assert!(line.contains(&format!("{}...", "x".repeat(200))));
}
