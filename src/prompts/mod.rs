use crate::session::memory::MemoryContext;

const PLANNER_PROMPT_TEMPLATE: &str = include_str!("assets/planner.prompt.md");

/// System prompt that pins the model to the response contract schema.
pub fn planner_system_prompt() -> &'static str {
    PLANNER_PROMPT_TEMPLATE
}

/// System prompt plus the rendered memory block for follow-up turns.
pub fn planner_prompt_with_memory(memory: &MemoryContext) -> String {
    match memory.build_memory_prompt() {
        Some(block) => format!("{PLANNER_PROMPT_TEMPLATE}\n\n{block}"),
        None => PLANNER_PROMPT_TEMPLATE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::TurnSummary;

    #[test]
    fn prompt_names_every_supported_tool_id() {
        let prompt = planner_system_prompt();
        for id in [
            "get_current_date",
            "clock.now",
            "time.now",
            "get_time",
            "js.run_sandbox",
            "math.aggregate",
        ] {
            assert!(prompt.contains(id), "prompt should mention {id}");
        }
    }

    #[test]
    fn memory_block_is_appended_when_present() {
        let memory = MemoryContext {
            last_intent: Some("check balance".to_string()),
            last_tool_plan: None,
            history: vec![TurnSummary {
                user_input: "what time is it".to_string(),
                visible_reply: "Current time is 10:00".to_string(),
            }],
        };
        let prompt = planner_prompt_with_memory(&memory);
        assert!(prompt.contains("previous_intent: check balance"));
        assert!(prompt.contains("recent_turns:"));
    }

    #[test]
    fn empty_memory_leaves_prompt_untouched() {
        let prompt = planner_prompt_with_memory(&MemoryContext::default());
        assert_eq!(prompt, planner_system_prompt());
    }
}
