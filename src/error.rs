use std::path::PathBuf;

use thiserror::Error;

/// Errors from talking to the tmux binary
#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("`{command}` exited with code {}: {stderr}", .code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("tmux binary `{0}` not found")]
    NotFound(String),

    #[error("failed to parse output of `{command}`: {detail}")]
    Parse { command: String, detail: String },

    #[error("tmux io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TmuxError {
    /// True when tmux ran but the command itself reported failure
    pub fn is_command_failure(&self) -> bool {
        matches!(self, TmuxError::CommandFailed { .. })
    }
}

/// Errors while locating or parsing a layout file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("layout file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported layout format for {} (expected .yaml, .yml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The first invariant a layout violates. Raised before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("session_name is empty")]
    EmptySessionName,

    #[error("session_name {0:?} may not contain ':' or '.'")]
    InvalidSessionName(String),

    #[error("session has no windows")]
    NoWindows,

    #[error("window {window} has no panes")]
    NoPanes { window: String },

    #[error("windows {first} and {second} are both marked focus")]
    MultipleFocusedWindows { first: String, second: String },

    #[error("windows {first} and {second} both ask for window_index {index}")]
    DuplicateWindowIndex {
        index: u32,
        first: String,
        second: String,
    },

    #[error("window {window}: panes {first} and {second} are both marked focus")]
    MultipleFocusedPanes {
        window: String,
        first: usize,
        second: usize,
    },

    #[error("window {window}: option {key:?} must be a string, number or boolean")]
    InvalidOption { window: String, key: String },

    #[error("start_directory {} is not an existing directory", .0.display())]
    StartDirectory(PathBuf),

    #[error("before_script {} does not exist", .0.display())]
    BeforeScriptMissing(PathBuf),

    #[error("undefined environment variable ${var} in {field}")]
    UndefinedVariable { field: &'static str, var: String },
}

/// Where in the apply sequence a failure happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    CreateWindow { index: usize },
    SetOption { window: usize, key: String },
    SplitPane { window: usize, pane: usize },
    SelectLayout { window: usize },
    SendKeys { window: usize, pane: usize },
    Focus,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::CreateWindow { index } => write!(f, "creating window {}", index),
            Stage::SetOption { window, key } => {
                write!(f, "setting option {} on window {}", key, window)
            }
            Stage::SplitPane { window, pane } => {
                write!(f, "splitting pane {} in window {}", pane, window)
            }
            Stage::SelectLayout { window } => write!(f, "selecting layout of window {}", window),
            Stage::SendKeys { window, pane } => {
                write!(f, "sending commands to pane {} in window {}", pane, window)
            }
            Stage::Focus => write!(f, "applying focus"),
        }
    }
}

/// Failures while mutating tmux state
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("session {0:?} already exists")]
    AlreadyExists(String),

    #[error("session {0:?} is already being applied by this process")]
    InProgress(String),

    #[error("multiplexer unavailable: {0}")]
    MultiplexerUnavailable(#[source] TmuxError),

    #[error("creating session failed: {0}")]
    CreateSession(#[source] TmuxError),

    #[error("before_script {} failed with exit code {}: {stderr}", .script.display(), .exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    BeforeScriptFailed {
        script: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{stage} failed after {completed_windows} completed window(s): {source}")]
    PartialFailure {
        completed_windows: usize,
        stage: Stage,
        #[source]
        source: TmuxError,
    },

    #[error("apply cancelled after {completed_windows} completed window(s)")]
    Cancelled { completed_windows: usize },
}
