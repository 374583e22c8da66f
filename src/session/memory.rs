use crate::shared::text::truncate_text;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const PLAN_PREVIEW_CHARS: usize = 1200;
const SUMMARY_LINE_CHARS: usize = 200;

/// Prior-turn summary supplied by the persistence collaborator. The
/// core never reads or writes that store; it only renders the prompt
/// block the model-calling collaborator folds into the next request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryContext {
    pub last_intent: Option<String>,
    pub last_tool_plan: Option<Value>,
    pub history: Vec<TurnSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnSummary {
    pub user_input: String,
    pub visible_reply: String,
}

impl MemoryContext {
    /// Renders the memory block, or `None` when there is nothing worth
    /// sending.
    pub fn build_memory_prompt(&self) -> Option<String> {
        let mut lines = Vec::new();
        if let Some(intent) = self
            .last_intent
            .as_deref()
            .map(str::trim)
            .filter(|intent| !intent.is_empty())
        {
            lines.push(format!("previous_intent: {intent}"));
        }
        if let Some(plan) = &self.last_tool_plan {
            if plan.as_array().is_some_and(|entries| !entries.is_empty()) {
                lines.push(format!(
                    "last_tool_plan: {}",
                    truncate_text(&plan.to_string(), PLAN_PREVIEW_CHARS)
                ));
            }
        }
        if !self.history.is_empty() {
            lines.push("recent_turns:".to_string());
            for (index, entry) in self.history.iter().enumerate() {
                lines.push(format!(
                    "{}. user=\"{}\" -> reply=\"{}\"",
                    index + 1,
                    truncate_text(&entry.user_input, SUMMARY_LINE_CHARS),
                    truncate_text(&entry.visible_reply, SUMMARY_LINE_CHARS),
                ));
            }
        }
        if lines.is_empty() {
            return None;
        }
        let mut block =
            String::from("Memory context (reuse parameters unless user overrides):\n");
        block.push_str(&lines.join("\n"));
        Some(block)
    }
}
