pub mod memory;

use crate::shared::ids::generate_turn_id;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Started,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub detail: String,
}

/// Audit record for one tool invocation. Mutated in place while the
/// step runs; frozen once a terminal status is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRun {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub args_raw: Option<Value>,
    #[serde(default)]
    pub args_resolved: Option<Value>,
    pub status: RunStatus,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub time_ms: Option<u64>,
}

/// One user interaction and everything executed in response to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    pub tool_runs: Vec<ToolRun>,
}

impl Turn {
    pub fn push_tool_run(&mut self, run: ToolRun) -> usize {
        self.tool_runs.push(run);
        self.tool_runs.len() - 1
    }

    pub fn tool_run_mut(&mut self, index: usize) -> Option<&mut ToolRun> {
        self.tool_runs.get_mut(index)
    }
}

/// Bounded turn history plus the single active turn, tracked by id
/// comparison rather than locking.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    history: VecDeque<Turn>,
    history_cap: usize,
    active_turn_id: Option<String>,
}

impl SessionState {
    pub fn new(history_cap: usize) -> Self {
        Self {
            history: VecDeque::new(),
            history_cap: history_cap.max(1),
            active_turn_id: None,
        }
    }

    pub fn start_turn(&mut self) -> Turn {
        let turn = Turn {
            id: generate_turn_id(Utc::now().timestamp_millis()),
            tool_runs: Vec::new(),
        };
        self.active_turn_id = Some(turn.id.clone());
        turn
    }

    /// Retires the turn into history, dropping the oldest entry past
    /// the cap. Clears active status only if the ids still match.
    pub fn finish_turn(&mut self, turn: Turn) {
        if self.active_turn_id.as_deref() == Some(turn.id.as_str()) {
            self.active_turn_id = None;
        }
        self.history.push_back(turn);
        while self.history.len() > self.history_cap {
            self.history.pop_front();
        }
    }

    pub fn active_turn_id(&self) -> Option<&str> {
        self.active_turn_id.as_deref()
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
