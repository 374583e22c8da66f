pub mod runtime;

pub use runtime::run_snippet;

use crate::config::SandboxLimits;
use crate::shared::text::clamp_u64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SandboxError {
    #[error("{detail}")]
    ForbiddenApi { detail: String },
    #[error("Exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("{0}")]
    Runtime(String),
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),
}

impl SandboxError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ForbiddenApi { .. } => "forbidden_api",
            Self::Timeout { .. } => "timeout",
            Self::Runtime(_) => "runtime_error",
            Self::Unavailable(_) => "sandbox_unavailable",
        }
    }
}

/// One sandbox invocation. Constructed fresh per call via `sanitize`,
/// never reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxConfig {
    pub code: String,
    pub args: Map<String, Value>,
    pub timeout_ms: u64,
}

impl SandboxConfig {
    /// Validates raw plan-step arguments into a runnable config.
    /// Failures here are input-preparation errors, not sandbox errors.
    pub fn sanitize(
        raw_args: Option<&Map<String, Value>>,
        limits: &SandboxLimits,
    ) -> Result<Self, String> {
        let empty = Map::new();
        let source = raw_args.unwrap_or(&empty);

        let code = match source.get("code").and_then(Value::as_str) {
            Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
            _ => return Err("js.run_sandbox requires a `code` string".to_string()),
        };
        if code.chars().count() > limits.max_code_chars {
            return Err(format!(
                "code must be <= {} characters",
                limits.max_code_chars
            ));
        }

        let args = match source.get("args") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err("args must be an object".to_string()),
        };

        let timeout_ms = match source.get("timeoutMs").and_then(Value::as_f64) {
            Some(raw) if raw.is_finite() => clamp_u64(
                raw.round().max(0.0) as u64,
                limits.min_timeout_ms,
                limits.max_timeout_ms,
            ),
            _ => limits.default_timeout_ms,
        };

        Ok(Self {
            code,
            args,
            timeout_ms,
        })
    }
}

/// Result/console-log/duration triple produced by a successful run.
/// `stringified` marks results that had to be serialized to keep them
/// representable in text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxOutcome {
    pub result: Value,
    pub logs: Vec<String>,
    pub time_ms: u64,
    pub stringified: bool,
}
