use crate::config::CoreSettings;
use crate::contract::{PlanStep, ResponseContract};
use crate::orchestration::error::StepError;
use crate::orchestration::hydrate::{hydrate_reply_template, HydrationContext, DEFAULT_FALLBACK};
use crate::orchestration::reference::resolve_arg_references;
use crate::orchestration::registry::{ToolInput, ToolRegistry};
use crate::orchestration::NamedResult;
use crate::session::{ErrorDetail, RunStatus, ToolRun, Turn};
use crate::shared::logging::append_turn_log_line;
use crate::shared::text::json_preview;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

const LOG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    Executing,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured per-run record for the presentation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRunDetail {
    pub tool: String,
    pub status: StepStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    pub stringified: bool,
}

/// Plain-data progress stream: status transitions, reply snapshots
/// after each hydration pass, detail records, and thinking-log lines,
/// in emission order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ProgressEvent {
    StepStatus {
        step_id: String,
        status: StepStatus,
        message: String,
    },
    Reply {
        text: String,
    },
    ToolDetail {
        detail: ToolRunDetail,
    },
    Thinking {
        line: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnProgress {
    pub events: Vec<ProgressEvent>,
}

impl TurnProgress {
    fn step_status(&mut self, step_id: &str, status: StepStatus, message: impl Into<String>) {
        self.events.push(ProgressEvent::StepStatus {
            step_id: step_id.to_string(),
            status,
            message: message.into(),
        });
    }

    fn reply(&mut self, text: &str) {
        self.events.push(ProgressEvent::Reply {
            text: text.to_string(),
        });
    }

    fn tool_detail(&mut self, detail: ToolRunDetail) {
        self.events.push(ProgressEvent::ToolDetail { detail });
    }

    fn thinking(&mut self, line: impl Into<String>) {
        self.events.push(ProgressEvent::Thinking { line: line.into() });
    }

    pub fn thinking_lines(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Thinking { line } => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn statuses_for(&self, step_id: &str) -> Vec<StepStatus> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::StepStatus {
                    step_id: id,
                    status,
                    ..
                } if id == step_id => Some(*status),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Final reply text, hydrated against the terminal named-result
    /// set.
    pub reply: String,
    pub named_results: BTreeMap<String, NamedResult>,
    pub progress: TurnProgress,
}

/// Drives one turn: resolves each plan step's tool and references,
/// executes it, and stops the remaining plan on first failure.
#[derive(Debug, Clone)]
pub struct PlanExecutor<'a> {
    registry: &'a ToolRegistry,
    settings: &'a CoreSettings,
}

struct StepScope<'a> {
    turn: &'a mut Turn,
    contract: &'a ResponseContract,
    user_input: &'a str,
    named_results: &'a mut BTreeMap<String, NamedResult>,
    last_result: &'a mut Option<Value>,
    progress: &'a mut TurnProgress,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, settings: &'a CoreSettings) -> Self {
        Self { registry, settings }
    }

    pub fn execute_turn(
        &self,
        turn: &mut Turn,
        contract: &ResponseContract,
        user_input: &str,
    ) -> TurnReport {
        let mut progress = TurnProgress::default();
        for line in &contract.thinking_log {
            progress.thinking(line.clone());
        }

        let total = contract.tool_plan.len();
        progress.thinking(format!("[plan] preparing {total} step(s)"));
        for step in &contract.tool_plan {
            let tool_label = match step {
                PlanStep::NoTool { .. } => "No tool".to_string(),
                PlanStep::Tool { tool, .. } => {
                    tool.clone().unwrap_or_else(|| "unspecified".to_string())
                }
            };
            progress.step_status(step.save_as().as_str(), StepStatus::Planned, tool_label);
        }

        let mut named_results = BTreeMap::new();
        let mut last_result: Option<Value> = None;
        let mut failed_index = None;

        for (index, step) in contract.tool_plan.iter().enumerate() {
            let label = format!("Step {}/{}", index + 1, total);
            let mut scope = StepScope {
                turn: &mut *turn,
                contract,
                user_input,
                named_results: &mut named_results,
                last_result: &mut last_result,
                progress: &mut progress,
            };
            let status = self.run_single_step(&mut scope, step, &label);
            if status == StepStatus::Failed {
                failed_index = Some(index);
                break;
            }
        }

        if let Some(failed_at) = failed_index {
            for step in &contract.tool_plan[failed_at + 1..] {
                let step_id = step.save_as().as_str();
                progress.step_status(
                    step_id,
                    StepStatus::Skipped,
                    "Skipped due to earlier failure",
                );
                self.log_line(
                    &turn.id,
                    &format!("step_id={step_id} transition=skipped"),
                );
            }
        }

        // One more hydration pass with the terminal named-result set,
        // so the caller's displayed text reflects the final state even
        // if intermediate passes used partial results.
        let reply = hydrate_reply_template(
            &contract.visible_reply,
            &HydrationContext {
                last_result: last_result.as_ref(),
                named_results: &named_results,
                fallback: DEFAULT_FALLBACK,
            },
        );
        progress.reply(&reply);

        let outcome = if failed_index.is_some() {
            TurnOutcome::Failed
        } else {
            TurnOutcome::Succeeded
        };
        self.log_line(
            &turn.id,
            &format!(
                "outcome={} steps={total}",
                match outcome {
                    TurnOutcome::Succeeded => "succeeded",
                    TurnOutcome::Failed => "failed",
                }
            ),
        );

        TurnReport {
            outcome,
            reply,
            named_results,
            progress,
        }
    }

    fn run_single_step(
        &self,
        scope: &mut StepScope<'_>,
        step: &PlanStep,
        label: &str,
    ) -> StepStatus {
        let step_id = step.save_as().as_str().to_string();
        scope
            .progress
            .thinking(format!("[plan] {label} - {}", step.reason()));

        let (tool, reason, args) = match step {
            PlanStep::NoTool { reason, .. } => {
                scope.progress.step_status(
                    &step_id,
                    StepStatus::Succeeded,
                    format!("No tool needed - {reason}"),
                );
                scope
                    .progress
                    .thinking(format!("[decide] {label} no tool needed"));
                self.log_line(
                    &scope.turn.id,
                    &format!("step_id={step_id} transition=succeeded tool=none"),
                );
                return StepStatus::Succeeded;
            }
            PlanStep::Tool {
                tool, reason, args, ..
            } => (tool, reason, args),
        };

        let intent_text = [
            reason.as_str(),
            &scope.contract.restatement,
            &scope.contract.visible_reply,
            scope.user_input,
        ]
        .join(" ");

        let resolved_tool = match self
            .registry
            .resolve_step_tool(tool.as_deref(), &intent_text)
        {
            Ok(resolved) => resolved,
            Err(error) => {
                scope.progress.thinking(format!(
                    "[warn] unsupported tool: {}",
                    tool.as_deref().unwrap_or("unspecified")
                ));
                return self.fail_step(scope, &step_id, label, "unresolved", reason, None, &error);
            }
        };
        if resolved_tool.inferred {
            scope.progress.thinking(format!(
                "[decide] {label} inferred {} from intent text",
                resolved_tool.name
            ));
        }
        let tool_name = resolved_tool.name;

        let resolved = resolve_arg_references(args.as_ref(), scope.named_results);
        if !resolved.errors.is_empty() {
            let error = StepError::MissingReference {
                refs: resolved.errors.clone(),
            };
            scope
                .progress
                .thinking(format!("[guard] missing ref {}", resolved.errors.join(", ")));
            return self.fail_step(scope, &step_id, label, tool_name, reason, None, &error);
        }

        let input = match self.registry.prepare_input(tool_name, resolved.value.as_ref()) {
            Ok(input) => input,
            Err(error) => {
                scope
                    .progress
                    .thinking(format!("[error] {tool_name} args invalid"));
                let input_preview = resolved.value.clone().map(Value::Object);
                return self.fail_step(
                    scope,
                    &step_id,
                    label,
                    tool_name,
                    reason,
                    input_preview,
                    &error,
                );
            }
        };

        scope.progress.step_status(
            &step_id,
            StepStatus::Executing,
            format!("Tool: {tool_name}"),
        );
        scope
            .progress
            .thinking(format!("[tool] {label} {tool_name} start"));
        self.log_line(
            &scope.turn.id,
            &format!("step_id={step_id} transition=executing tool={tool_name}"),
        );

        let run_index = scope.turn.push_tool_run(ToolRun {
            id: step_id.clone(),
            tool: tool_name.to_string(),
            args_raw: args.clone().map(Value::Object),
            args_resolved: Some(input.as_value()),
            status: RunStatus::Started,
            result: None,
            error: None,
            time_ms: None,
        });

        let started = Instant::now();
        match self.registry.run(&input) {
            Ok(result) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                if let Some(run) = scope.turn.tool_run_mut(run_index) {
                    run.status = RunStatus::Succeeded;
                    run.result = Some(result.clone());
                    run.time_ms = Some(elapsed_ms);
                }
                self.record_success(scope, &step_id, tool_name, reason, &input, result, elapsed_ms);
                StepStatus::Succeeded
            }
            Err(error) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let detail = ErrorDetail {
                    code: error.code().to_string(),
                    detail: error.to_string(),
                };
                if let Some(run) = scope.turn.tool_run_mut(run_index) {
                    run.status = RunStatus::Failed;
                    run.error = Some(detail.clone());
                    run.time_ms = Some(elapsed_ms);
                }
                scope.named_results.insert(
                    step_id.clone(),
                    NamedResult {
                        tool: tool_name.to_string(),
                        status: RunStatus::Failed,
                        result: None,
                        error: Some(detail.clone()),
                    },
                );
                scope
                    .progress
                    .thinking(format!("[error] {tool_name} {}", detail.code));
                scope.progress.step_status(
                    &step_id,
                    StepStatus::Failed,
                    format!("{tool_name} ({})", detail.code),
                );
                scope.progress.tool_detail(ToolRunDetail {
                    tool: tool_name.to_string(),
                    status: StepStatus::Failed,
                    reason: reason.clone(),
                    input: Some(input.as_value()),
                    result: None,
                    error: Some(detail.clone()),
                    logs: Vec::new(),
                    time_ms: Some(elapsed_ms),
                    timeout_ms: input.timeout_ms(),
                    stringified: false,
                });
                self.hydrate_partial(scope);
                self.log_line(
                    &scope.turn.id,
                    &format!(
                        "step_id={step_id} transition=failed tool={tool_name} code={}",
                        detail.code
                    ),
                );
                StepStatus::Failed
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_success(
        &self,
        scope: &mut StepScope<'_>,
        step_id: &str,
        tool_name: &str,
        reason: &str,
        input: &ToolInput,
        result: Value,
        elapsed_ms: u64,
    ) {
        let logs = result
            .get("logs")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let stringified = result
            .get("stringified")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        scope
            .progress
            .thinking(format!("[tool] {tool_name} done ({elapsed_ms}ms)"));
        if !logs.is_empty() {
            scope.progress.thinking(format!(
                "[log] {}",
                json_preview(&Value::from(logs.clone()), LOG_PREVIEW_CHARS)
            ));
        }
        if stringified {
            scope.progress.thinking("[guard] stringified result");
        }
        scope.progress.thinking("[decide] fulfilled");
        scope.progress.step_status(
            step_id,
            StepStatus::Succeeded,
            format!("{tool_name} ({elapsed_ms}ms)"),
        );
        scope.progress.tool_detail(ToolRunDetail {
            tool: tool_name.to_string(),
            status: StepStatus::Succeeded,
            reason: reason.to_string(),
            input: Some(input.as_value()),
            result: Some(result.clone()),
            error: None,
            logs,
            time_ms: Some(elapsed_ms),
            timeout_ms: input.timeout_ms(),
            stringified,
        });

        scope.named_results.insert(
            step_id.to_string(),
            NamedResult {
                tool: tool_name.to_string(),
                status: RunStatus::Succeeded,
                result: Some(result.clone()),
                error: None,
            },
        );
        *scope.last_result = Some(result);
        self.hydrate_partial(scope);
        self.log_line(
            &scope.turn.id,
            &format!("step_id={step_id} transition=succeeded tool={tool_name} time_ms={elapsed_ms}"),
        );
    }

    fn fail_step(
        &self,
        scope: &mut StepScope<'_>,
        step_id: &str,
        _label: &str,
        tool_name: &str,
        reason: &str,
        input: Option<Value>,
        error: &StepError,
    ) -> StepStatus {
        let detail = ErrorDetail {
            code: error.code().to_string(),
            detail: error.to_string(),
        };
        scope.progress.step_status(
            step_id,
            StepStatus::Failed,
            format!("{tool_name} ({})", detail.code),
        );
        scope.progress.tool_detail(ToolRunDetail {
            tool: tool_name.to_string(),
            status: StepStatus::Failed,
            reason: reason.to_string(),
            input,
            result: None,
            error: Some(detail.clone()),
            logs: Vec::new(),
            time_ms: None,
            timeout_ms: None,
            stringified: false,
        });
        self.hydrate_partial(scope);
        self.log_line(
            &scope.turn.id,
            &format!(
                "step_id={step_id} transition=failed tool={tool_name} code={}",
                detail.code
            ),
        );
        StepStatus::Failed
    }

    /// Re-hydrates the in-progress reply so a UI consumer can show
    /// partial progress mid-plan.
    fn hydrate_partial(&self, scope: &mut StepScope<'_>) {
        let hydrated = hydrate_reply_template(
            &scope.contract.visible_reply,
            &HydrationContext {
                last_result: scope.last_result.as_ref(),
                named_results: scope.named_results,
                fallback: DEFAULT_FALLBACK,
            },
        );
        scope.progress.reply(&hydrated);
    }

    /// Audit logging is best-effort: a failed append never fails the
    /// turn.
    fn log_line(&self, turn_id: &str, line: &str) {
        if let Some(root) = &self.settings.state_root {
            let _ = append_turn_log_line(root, &format!("turn_id={turn_id} {line}"));
        }
    }
}
