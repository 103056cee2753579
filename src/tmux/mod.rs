mod client;
mod heuristics;

#[cfg(test)]
pub mod fake;

pub use client::{attach_args, TmuxClient, TmuxExecutor};
pub use heuristics::{classify_command, PaneCommand};

use async_trait::async_trait;

use crate::error::TmuxError;

/// Runs one tmux command line and returns its stdout.
///
/// The builder only talks to tmux through this trait, so tests can swap in
/// an in-memory session table.
#[async_trait]
pub trait TmuxRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError>;
}

#[async_trait]
impl<T: TmuxRunner + ?Sized> TmuxRunner for &T {
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        (**self).run(args).await
    }
}

/// Represents a tmux session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxSession {
    /// Session ID (e.g., "$0")
    pub id: String,
    /// Session name
    pub name: String,
    /// Number of windows
    pub windows: usize,
    /// Number of attached clients
    pub attached_clients: usize,
}

/// A window as reported by `list-windows`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxWindow {
    pub id: String,
    pub name: String,
    /// Layout string (e.g. "b25d,80x24,0,0,1")
    pub layout: String,
    pub active: bool,
}

/// A pane as reported by `list-panes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TmuxPane {
    pub id: String,
    pub current_command: String,
    pub current_path: String,
    pub active: bool,
}
