pub mod error;
pub mod executor;
pub mod hydrate;
pub mod reference;
pub mod registry;

pub use error::StepError;
pub use executor::{PlanExecutor, TurnOutcome, TurnReport};
pub use registry::ToolRegistry;

use crate::session::{ErrorDetail, RunStatus};
use crate::shared::json_path::get_deep_value;
use serde::Serialize;
use serde_json::Value;

/// Execution-time record keyed by a step's `save_as`. Lives for the
/// current turn only; consumed by the reference resolver and the
/// template hydrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedResult {
    pub tool: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl NamedResult {
    /// Path lookup against the record. Top-level fields win; any other
    /// leading segment is retried inside `result`, so `value` and
    /// `result.value` address the same data while storage itself stays
    /// namespaced.
    pub fn lookup(&self, segments: &[String]) -> Option<Value> {
        let (head, rest) = segments.split_first()?;
        match head.as_str() {
            "tool" if rest.is_empty() => Some(Value::String(self.tool.clone())),
            "status" if rest.is_empty() => Some(Value::String(self.status.as_str().to_string())),
            "result" => {
                let result = self.result.as_ref()?;
                if rest.is_empty() {
                    Some(result.clone())
                } else {
                    get_deep_value(result, rest).cloned()
                }
            }
            "error" => {
                let error = serde_json::to_value(self.error.as_ref()?).ok()?;
                if rest.is_empty() {
                    Some(error)
                } else {
                    get_deep_value(&error, rest).cloned()
                }
            }
            _ => {
                let result = self.result.as_ref()?;
                get_deep_value(result, segments).cloned()
            }
        }
    }
}
