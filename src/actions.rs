use std::collections::VecDeque;

use crate::config::{PaneSpec, WindowSpec};

/// A shell command queued for one pane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// From the window's `shell_command_before`
    Prepare(String),
    /// The pane's own command
    Run(String),
}

impl Action {
    pub fn command(&self) -> &str {
        match self {
            Action::Prepare(cmd) | Action::Run(cmd) => cmd,
        }
    }
}

/// What happened to a dispatched action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// Typed into the pane; pane commands are not waited on, so no exit code
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: Action,
    pub status: ActionStatus,
}

/// Ordered commands for a single pane, drained front to back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaneQueue {
    actions: VecDeque<Action>,
}

impl PaneQueue {
    /// `shell_command_before` entries first, then the pane's commands
    pub fn for_pane(window: &WindowSpec, pane: &PaneSpec) -> Self {
        let actions = window
            .shell_command_before
            .iter()
            .cloned()
            .map(Action::Prepare)
            .chain(pane.commands.iter().cloned().map(Action::Run))
            .collect();
        Self { actions }
    }

    pub fn pop(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}
