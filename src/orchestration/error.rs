use crate::sandbox::SandboxError;

/// Step-stage failures. Terminal for the remaining plan but local to
/// it: completed step results and the audit trail are always retained.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("unsupported tool `{tool}`")]
    UnsupportedTool { tool: String },
    #[error("missing reference: {}", .refs.join(", "))]
    MissingReference { refs: Vec<String> },
    #[error("invalid arguments for `{tool}`: {detail}")]
    ArgsInvalid { tool: String, detail: String },
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("tool `{tool}` failed: {detail}")]
    ToolFailure { tool: String, detail: String },
}

impl StepError {
    /// Stable code recorded in the `ToolRun` audit trail and surfaced
    /// to the presentation collaborator.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedTool { .. } => "unsupported_tool",
            Self::MissingReference { .. } => "missing_reference",
            Self::ArgsInvalid { .. } => "args_invalid",
            Self::Sandbox(error) => error.code(),
            Self::ToolFailure { .. } => "runtime_error",
        }
    }
}
