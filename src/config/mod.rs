use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_TURN_HISTORY_CAP: usize = 10;
pub const MAX_SANDBOX_CODE_CHARS: usize = 1000;
pub const MIN_SANDBOX_TIMEOUT_MS: u64 = 50;
pub const MAX_SANDBOX_TIMEOUT_MS: u64 = 1500;
pub const DEFAULT_SANDBOX_TIMEOUT_MS: u64 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to write settings {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown timezone `{value}`")]
    InvalidTimezone { value: String },
    #[error("invalid sandbox limits: {reason}")]
    InvalidSandboxLimits { reason: String },
    #[error("turn history cap must be at least 1")]
    InvalidHistoryCap,
}

/// Upper bounds the sandbox tool enforces when sanitizing plan-step
/// arguments. Timeouts outside `[min_timeout_ms, max_timeout_ms]` are
/// clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SandboxLimits {
    pub max_code_chars: usize,
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub default_timeout_ms: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_code_chars: MAX_SANDBOX_CODE_CHARS,
            min_timeout_ms: MIN_SANDBOX_TIMEOUT_MS,
            max_timeout_ms: MAX_SANDBOX_TIMEOUT_MS,
            default_timeout_ms: DEFAULT_SANDBOX_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CoreSettings {
    /// IANA timezone name for the clock tool's `local` field. `None`
    /// falls back to the host's local timezone.
    pub timezone: Option<String>,
    pub max_turn_history: usize,
    /// When set, the executor appends an audit line per step transition
    /// under `<state_root>/logs/turns.log`.
    pub state_root: Option<PathBuf>,
    pub sandbox: SandboxLimits,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            timezone: None,
            max_turn_history: DEFAULT_TURN_HISTORY_CAP,
            state_root: None,
            sandbox: SandboxLimits::default(),
        }
    }
}

impl CoreSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turn_history == 0 {
            return Err(ConfigError::InvalidHistoryCap);
        }
        self.timezone_tz()?;
        let sandbox = &self.sandbox;
        if sandbox.min_timeout_ms > sandbox.max_timeout_ms {
            return Err(ConfigError::InvalidSandboxLimits {
                reason: format!(
                    "min_timeout_ms {} exceeds max_timeout_ms {}",
                    sandbox.min_timeout_ms, sandbox.max_timeout_ms
                ),
            });
        }
        if sandbox.default_timeout_ms < sandbox.min_timeout_ms
            || sandbox.default_timeout_ms > sandbox.max_timeout_ms
        {
            return Err(ConfigError::InvalidSandboxLimits {
                reason: format!(
                    "default_timeout_ms {} is outside [{}, {}]",
                    sandbox.default_timeout_ms, sandbox.min_timeout_ms, sandbox.max_timeout_ms
                ),
            });
        }
        if sandbox.max_code_chars == 0 {
            return Err(ConfigError::InvalidSandboxLimits {
                reason: "max_code_chars must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn timezone_tz(&self) -> Result<Option<chrono_tz::Tz>, ConfigError> {
        match &self.timezone {
            None => Ok(None),
            Some(raw) => chrono_tz::Tz::from_str(raw.trim())
                .map(Some)
                .map_err(|_| ConfigError::InvalidTimezone {
                    value: raw.clone(),
                }),
        }
    }
}

pub fn load_settings(path: &Path) -> Result<CoreSettings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let settings: CoreSettings =
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &CoreSettings) -> Result<(), ConfigError> {
    settings.validate()?;
    let encoded = serde_yaml::to_string(settings).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.display().to_string(),
            source,
        })?;
    }
    fs::write(path, encoded).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })
}
