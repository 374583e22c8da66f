use crate::config::{ConfigError, CoreSettings, SandboxLimits};
use crate::orchestration::error::StepError;
use crate::sandbox::{run_snippet, SandboxConfig};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

pub const CLOCK_TOOL: &str = "get_current_date";
pub const SANDBOX_TOOL: &str = "js.run_sandbox";
pub const AGGREGATE_TOOL: &str = "math.aggregate";

/// Date/time intent markers, English and Chinese, matched against the
/// step reason plus the turn's restatement/reply/user text when a
/// `need_tool` step carries no tool id.
pub const TIME_INTENT_KEYWORDS: [&str; 10] = [
    "time", "date", "today", "now", "現在", "時間", "日期", "今天", "what time", "clock",
];

pub fn normalize_tool_name(raw: &str) -> Option<&'static str> {
    match raw.trim().to_lowercase().as_str() {
        "get_current_date" | "clock.now" | "time.now" | "get_time" => Some(CLOCK_TOOL),
        "js.run_sandbox" => Some(SANDBOX_TOOL),
        "math.aggregate" => Some(AGGREGATE_TOOL),
        _ => None,
    }
}

pub fn matches_time_intent(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TIME_INTENT_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateOp {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// Prepared, validated input for one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    Clock,
    Sandbox(SandboxConfig),
    Aggregate { op: AggregateOp, items: Vec<f64> },
}

impl ToolInput {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Clock => CLOCK_TOOL,
            Self::Sandbox(_) => SANDBOX_TOOL,
            Self::Aggregate { .. } => AGGREGATE_TOOL,
        }
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            Self::Sandbox(config) => Some(config.timeout_ms),
            _ => None,
        }
    }

    /// Plain-data view for the audit trail and detail records.
    pub fn as_value(&self) -> Value {
        match self {
            Self::Clock => json!({}),
            Self::Sandbox(config) => serde_json::to_value(config).unwrap_or(Value::Null),
            Self::Aggregate { op, items } => json!({ "op": op.as_str(), "items": items }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub name: &'static str,
    pub inferred: bool,
}

/// Fixed mapping from tool identifier to input preparation and
/// execution. Constructed once from settings and passed by reference
/// into the executor; no ambient registry exists.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    timezone: Option<chrono_tz::Tz>,
    sandbox_limits: SandboxLimits,
}

impl ToolRegistry {
    pub fn new(settings: &CoreSettings) -> Result<Self, ConfigError> {
        Ok(Self {
            timezone: settings.timezone_tz()?,
            sandbox_limits: settings.sandbox,
        })
    }

    /// Resolves a plan step's tool id: direct id or alias first.
    /// Keyword inference only supplements an absent id; an explicit
    /// but unknown id fails instead of being silently overridden.
    pub fn resolve_step_tool(
        &self,
        declared: Option<&str>,
        intent_text: &str,
    ) -> Result<ResolvedTool, StepError> {
        if let Some(raw) = declared.map(str::trim).filter(|raw| !raw.is_empty()) {
            return normalize_tool_name(raw)
                .map(|name| ResolvedTool {
                    name,
                    inferred: false,
                })
                .ok_or_else(|| StepError::UnsupportedTool {
                    tool: raw.to_string(),
                });
        }
        if matches_time_intent(intent_text) {
            return Ok(ResolvedTool {
                name: CLOCK_TOOL,
                inferred: true,
            });
        }
        Err(StepError::UnsupportedTool {
            tool: "unspecified".to_string(),
        })
    }

    pub fn prepare_input(
        &self,
        tool: &str,
        args: Option<&Map<String, Value>>,
    ) -> Result<ToolInput, StepError> {
        match tool {
            CLOCK_TOOL => Ok(ToolInput::Clock),
            SANDBOX_TOOL => SandboxConfig::sanitize(args, &self.sandbox_limits)
                .map(ToolInput::Sandbox)
                .map_err(|detail| StepError::ArgsInvalid {
                    tool: SANDBOX_TOOL.to_string(),
                    detail,
                }),
            AGGREGATE_TOOL => {
                sanitize_aggregate_args(args).map_err(|detail| StepError::ArgsInvalid {
                    tool: AGGREGATE_TOOL.to_string(),
                    detail,
                })
            }
            other => Err(StepError::UnsupportedTool {
                tool: other.to_string(),
            }),
        }
    }

    pub fn run(&self, input: &ToolInput) -> Result<Value, StepError> {
        match input {
            ToolInput::Clock => Ok(clock_reading(self.timezone)),
            ToolInput::Sandbox(config) => {
                let outcome = run_snippet(config)?;
                serde_json::to_value(&outcome).map_err(|err| StepError::ToolFailure {
                    tool: SANDBOX_TOOL.to_string(),
                    detail: err.to_string(),
                })
            }
            ToolInput::Aggregate { op, items } => {
                Ok(json!({ "value": aggregate_numbers(*op, items) }))
            }
        }
    }
}

fn sanitize_aggregate_args(args: Option<&Map<String, Value>>) -> Result<ToolInput, String> {
    let empty = Map::new();
    let source = args.unwrap_or(&empty);

    let op = source
        .get("op")
        .and_then(Value::as_str)
        .and_then(AggregateOp::parse)
        .ok_or_else(|| "math.aggregate requires op: sum | avg | min | max".to_string())?;

    let raw_items = match source.get("items").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items,
        _ => return Err("math.aggregate requires at least one items number".to_string()),
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for (index, raw) in raw_items.iter().enumerate() {
        let number = match raw {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number.filter(|value| value.is_finite()) {
            Some(value) => items.push(value),
            None => return Err(format!("items[{index}] must be a finite number")),
        }
    }

    Ok(ToolInput::Aggregate { op, items })
}

fn aggregate_numbers(op: AggregateOp, items: &[f64]) -> f64 {
    match op {
        AggregateOp::Sum => items.iter().sum(),
        AggregateOp::Avg => items.iter().sum::<f64>() / items.len() as f64,
        AggregateOp::Min => items.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateOp::Max => items.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// `{ iso, local, epochMs }` for the current instant. Never fails: an
/// unset timezone falls back to UTC formatting for `local`.
pub fn clock_reading(timezone: Option<chrono_tz::Tz>) -> Value {
    let now = Utc::now();
    let iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let local = match timezone {
        Some(tz) => now
            .with_timezone(&tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        None => now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    };
    json!({
        "iso": iso,
        "local": local,
        "epochMs": now.timestamp_millis(),
    })
}
