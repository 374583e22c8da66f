use crate::contract::repair::repair_json;
use crate::shared::ids::{synthesized_step_id, StepId};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("model response is not valid json: {detail}")]
    MalformedResponse { detail: String },
    #[error("response contract violated: {}", .violations.join("; "))]
    Violations { violations: Vec<String> },
}

/// One entry of `tool_plan`, validated eagerly at the contract boundary
/// so downstream code never re-checks shape. `save_as` is always
/// populated: `_step<N>` is synthesized when the model omits it.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    NoTool {
        reason: String,
        save_as: StepId,
    },
    Tool {
        tool: Option<String>,
        reason: String,
        args: Option<Map<String, Value>>,
        save_as: StepId,
    },
}

impl PlanStep {
    pub fn save_as(&self) -> &StepId {
        match self {
            Self::NoTool { save_as, .. } | Self::Tool { save_as, .. } => save_as,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::NoTool { reason, .. } | Self::Tool { reason, .. } => reason,
        }
    }

    pub fn needs_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseContract {
    pub restatement: String,
    pub visible_reply: String,
    pub thinking_log: Vec<String>,
    pub tool_plan: Vec<PlanStep>,
}

/// Parses raw model text into the agreed schema. Strict JSON first,
/// then the repair heuristics; validation is exhaustive rather than
/// fail-fast so every violation is reported together.
pub fn parse_and_validate(raw_text: &str) -> Result<ResponseContract, ContractError> {
    let payload = match serde_json::from_str::<Value>(raw_text) {
        Ok(value) => value,
        Err(parse_error) => {
            repair_json(raw_text).ok_or_else(|| ContractError::MalformedResponse {
                detail: parse_error.to_string(),
            })?
        }
    };
    validate_payload(&payload)
}

fn validate_payload(payload: &Value) -> Result<ResponseContract, ContractError> {
    let Some(object) = payload.as_object() else {
        return Err(ContractError::Violations {
            violations: vec!["response must be a json object".to_string()],
        });
    };

    let mut violations = Vec::new();

    let restatement = required_trimmed_string(object, "restatement", &mut violations);
    let visible_reply = required_trimmed_string(object, "visible_reply", &mut violations);
    let thinking_log = validate_thinking_log(object, &mut violations);
    let tool_plan = validate_tool_plan(object, &mut violations);

    if !violations.is_empty() {
        return Err(ContractError::Violations { violations });
    }

    Ok(ResponseContract {
        restatement,
        visible_reply,
        thinking_log,
        tool_plan,
    })
}

fn required_trimmed_string(
    object: &Map<String, Value>,
    field: &str,
    violations: &mut Vec<String>,
) -> String {
    match object.get(field).and_then(Value::as_str) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => {
            violations.push(format!("{field} is missing or not a non-empty string"));
            String::new()
        }
    }
}

fn validate_thinking_log(object: &Map<String, Value>, violations: &mut Vec<String>) -> Vec<String> {
    let Some(entries) = object.get("thinking_log").and_then(Value::as_array) else {
        violations.push("thinking_log must be an array of strings".to_string());
        return Vec::new();
    };

    let mut sanitized = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        match entry.as_str() {
            Some(text) => {
                let trimmed = text.trim();
                sanitized.push(if trimmed.is_empty() {
                    text.to_string()
                } else {
                    trimmed.to_string()
                });
            }
            None => violations.push(format!("thinking_log[{index}] must be a string")),
        }
    }
    sanitized
}

fn validate_tool_plan(object: &Map<String, Value>, violations: &mut Vec<String>) -> Vec<PlanStep> {
    let entries = match object.get("tool_plan").and_then(Value::as_array) {
        Some(entries) if !entries.is_empty() => entries,
        _ => {
            violations.push("tool_plan must contain at least one step".to_string());
            return Vec::new();
        }
    };

    let mut steps = Vec::with_capacity(entries.len());
    let mut seen_ids = BTreeSet::new();
    for (index, entry) in entries.iter().enumerate() {
        if let Some(step) = validate_plan_entry(entry, index, &mut seen_ids, violations) {
            steps.push(step);
        }
    }
    steps
}

fn validate_plan_entry(
    entry: &Value,
    index: usize,
    seen_ids: &mut BTreeSet<StepId>,
    violations: &mut Vec<String>,
) -> Option<PlanStep> {
    let Some(object) = entry.as_object() else {
        violations.push(format!("tool_plan[{index}] must be an object"));
        return None;
    };

    let mut entry_valid = true;

    let need_tool = match object.get("need_tool").and_then(Value::as_bool) {
        Some(flag) => flag,
        None => {
            violations.push(format!("tool_plan[{index}].need_tool must be a boolean"));
            entry_valid = false;
            false
        }
    };

    let reason = match object.get("reason").and_then(Value::as_str) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        _ => {
            violations.push(format!(
                "tool_plan[{index}].reason must be a non-empty string"
            ));
            entry_valid = false;
            String::new()
        }
    };

    let tool = match object.get("tool") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) => Some(name.trim().to_string()).filter(|name| !name.is_empty()),
        Some(_) => {
            violations.push(format!("tool_plan[{index}].tool must be a string"));
            entry_valid = false;
            None
        }
    };

    // Args are deep-cloned into a fresh map so later mutation of the
    // raw payload can never leak into executed steps.
    let args = match object.get("args") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            violations.push(format!("tool_plan[{index}].args must be an object"));
            entry_valid = false;
            None
        }
    };

    let save_as = match object.get("save_as") {
        None | Some(Value::Null) => synthesized_step_id(index + 1),
        Some(Value::String(raw)) if raw.trim().is_empty() => synthesized_step_id(index + 1),
        Some(Value::String(raw)) => match StepId::parse(raw.trim()) {
            Ok(id) => id,
            Err(detail) => {
                violations.push(format!("tool_plan[{index}].save_as invalid: {detail}"));
                entry_valid = false;
                synthesized_step_id(index + 1)
            }
        },
        Some(_) => {
            violations.push(format!("tool_plan[{index}].save_as must be a string"));
            entry_valid = false;
            synthesized_step_id(index + 1)
        }
    };

    if !seen_ids.insert(save_as.clone()) {
        violations.push(format!(
            "tool_plan[{index}].save_as `{save_as}` duplicates an earlier step"
        ));
        entry_valid = false;
    }

    if !entry_valid {
        return None;
    }

    Some(if need_tool {
        PlanStep::Tool {
            tool,
            reason,
            args,
            save_as,
        }
    } else {
        PlanStep::NoTool { reason, save_as }
    })
}
