//! Turns a validated layout into a live tmux session.
//!
//! The sequence is strictly ordered because tmux's notion of the current
//! window and pane is stateful: create session, run the before-script,
//! populate windows and panes in layout order, then apply focus. Nothing is
//! rolled back once windows exist; errors report how far the build got.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tokio::process::Command;

use crate::actions::{ActionOutcome, ActionStatus, PaneQueue};
use crate::config::{option_value, ValidSpec, WindowSpec};
use crate::error::{ApplyError, Stage, TmuxError};
use crate::tmux::{TmuxClient, TmuxRunner};

/// Session names with a live [`SessionHandle`] in this process
static OPEN_SESSIONS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// What to do when the target session is already running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingSession {
    /// Refuse with [`ApplyError::AlreadyExists`]
    #[default]
    Fail,
    /// Leave it untouched and hand back a handle to it
    Attach,
}

/// Best-effort stop signal, checked before every window and pane
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reservation of a session name; released on drop
#[derive(Debug)]
struct SessionGuard {
    name: String,
}

impl SessionGuard {
    fn acquire(name: &str) -> Result<Self, ApplyError> {
        let mut open = OPEN_SESSIONS.lock().unwrap_or_else(|e| e.into_inner());
        if !open.insert(name.to_string()) {
            return Err(ApplyError::InProgress(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut open = OPEN_SESSIONS.lock().unwrap_or_else(|e| e.into_inner());
        open.remove(&self.name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneHandle {
    pub id: String,
    pub outcomes: Vec<ActionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    pub id: String,
    pub name: Option<String>,
    pub panes: Vec<PaneHandle>,
}

/// A live session produced (or found) by [`WorkspaceBuilder::apply`]
#[derive(Debug)]
pub struct SessionHandle {
    pub name: String,
    pub session_id: String,
    /// Empty when `attached_existing` is set
    pub windows: Vec<WindowHandle>,
    pub focused_window: usize,
    /// The session was already running and was left as is
    pub attached_existing: bool,
    _guard: SessionGuard,
}

impl SessionHandle {
    pub fn pane_count(&self) -> usize {
        self.windows.iter().map(|w| w.panes.len()).sum()
    }
}

/// Builds tmux sessions from validated layouts
pub struct WorkspaceBuilder<R> {
    client: TmuxClient<R>,
    existing: ExistingSession,
    cancel: CancelToken,
}

impl<R: TmuxRunner> WorkspaceBuilder<R> {
    pub fn new(client: TmuxClient<R>) -> Self {
        Self {
            client,
            existing: ExistingSession::default(),
            cancel: CancelToken::default(),
        }
    }

    #[must_use]
    pub fn existing_session(mut self, policy: ExistingSession) -> Self {
        self.existing = policy;
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn client(&self) -> &TmuxClient<R> {
        &self.client
    }

    /// Build `spec` as a session named `target`.
    pub async fn apply(&self, spec: &ValidSpec, target: &str) -> Result<SessionHandle, ApplyError> {
        let version = self
            .client
            .version()
            .await
            .map_err(ApplyError::MultiplexerUnavailable)?;
        tracing::debug!(%version, "multiplexer found");

        let guard = SessionGuard::acquire(target)?;

        let exists = self
            .client
            .has_session(target)
            .await
            .map_err(ApplyError::MultiplexerUnavailable)?;
        if exists {
            return match self.existing {
                ExistingSession::Fail => Err(ApplyError::AlreadyExists(target.to_string())),
                ExistingSession::Attach => self.existing_handle(target, guard).await,
            };
        }

        let layout = spec.spec();
        let first = &layout.windows[0];
        // The initial pane is the first pane, so it gets that pane's directory
        let created = self
            .client
            .new_session(target, first.name.as_deref(), &first.panes[0].start_directory)
            .await
            .map_err(ApplyError::CreateSession)?;
        tracing::info!(session = target, id = %created.session_id, "session created");

        if let Some(script) = &layout.before_script {
            if let Err(e) = run_before_script(script, &layout.start_directory).await {
                if let Err(kill) = self.client.kill_session(&created.session_id).await {
                    tracing::warn!(session = target, error = %kill, "failed to kill session after before_script failure");
                }
                return Err(e);
            }
        }

        let mut windows = Vec::with_capacity(layout.windows.len());
        for (index, window) in layout.windows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ApplyError::Cancelled {
                    completed_windows: index,
                });
            }

            let partial = |stage: Stage| {
                move |source: TmuxError| ApplyError::PartialFailure {
                    completed_windows: index,
                    stage,
                    source,
                }
            };

            let (window_id, first_pane) = if index == 0 {
                if let Some(window_index) = window.index {
                    self.client
                        .move_window(&created.window_id, &created.session_id, window_index)
                        .await
                        .map_err(partial(Stage::CreateWindow { index }))?;
                }
                (created.window_id.clone(), created.pane_id.clone())
            } else {
                self.client
                    .new_window(
                        &created.session_id,
                        window.name.as_deref(),
                        window.index,
                        &window.panes[0].start_directory,
                    )
                    .await
                    .map_err(partial(Stage::CreateWindow { index }))?
            };

            let handle = self
                .build_window(window, index, window_id, first_pane)
                .await?;
            tracing::info!(window = %window.label(index), panes = handle.panes.len(), "window ready");
            windows.push(handle);
        }

        let completed = windows.len();
        let focus_failed = |source: TmuxError| ApplyError::PartialFailure {
            completed_windows: completed,
            stage: Stage::Focus,
            source,
        };
        for (index, window) in windows.iter().enumerate() {
            let pane = &window.panes[spec.focused_pane(index)];
            self.client
                .select_pane(&pane.id)
                .await
                .map_err(focus_failed)?;
        }
        self.client
            .select_window(&windows[spec.focused_window()].id)
            .await
            .map_err(focus_failed)?;

        Ok(SessionHandle {
            name: target.to_string(),
            session_id: created.session_id,
            windows,
            focused_window: spec.focused_window(),
            attached_existing: false,
            _guard: guard,
        })
    }

    /// Options, panes and pane commands for one window
    async fn build_window(
        &self,
        window: &WindowSpec,
        index: usize,
        window_id: String,
        first_pane: String,
    ) -> Result<WindowHandle, ApplyError> {
        let partial = |stage: Stage| {
            move |source: TmuxError| ApplyError::PartialFailure {
                completed_windows: index,
                stage,
                source,
            }
        };

        for (key, value) in &window.options {
            let value = option_value(value).unwrap_or_default();
            self.client
                .set_window_option(&window_id, key, &value)
                .await
                .map_err(partial(Stage::SetOption {
                    window: index,
                    key: key.clone(),
                }))?;
        }

        let mut panes = Vec::with_capacity(window.panes.len());
        for (pane_index, pane) in window.panes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ApplyError::Cancelled {
                    completed_windows: index,
                });
            }

            let pane_id = if pane_index == 0 {
                first_pane.clone()
            } else {
                let id = self
                    .client
                    .split_window(&window_id, &pane.start_directory)
                    .await
                    .map_err(partial(Stage::SplitPane {
                        window: index,
                        pane: pane_index,
                    }))?;
                // Re-tiling after every split keeps room for the next one
                if let Some(layout) = &window.layout {
                    self.client
                        .select_layout(&window_id, layout)
                        .await
                        .map_err(partial(Stage::SelectLayout { window: index }))?;
                }
                id
            };

            let mut queue = PaneQueue::for_pane(window, pane);
            let mut outcomes = Vec::with_capacity(queue.len());
            while let Some(action) = queue.pop() {
                tracing::debug!(pane = %pane_id, command = action.command(), "send-keys");
                self.client
                    .send_keys(&pane_id, action.command())
                    .await
                    .map_err(partial(Stage::SendKeys {
                        window: index,
                        pane: pane_index,
                    }))?;
                outcomes.push(ActionOutcome {
                    action,
                    status: ActionStatus::Sent,
                });
            }

            panes.push(PaneHandle {
                id: pane_id,
                outcomes,
            });
        }

        if let Some(layout) = &window.layout {
            self.client
                .select_layout(&window_id, layout)
                .await
                .map_err(partial(Stage::SelectLayout { window: index }))?;
        }

        Ok(WindowHandle {
            id: window_id,
            name: window.name.clone(),
            panes,
        })
    }

    async fn existing_handle(
        &self,
        target: &str,
        guard: SessionGuard,
    ) -> Result<SessionHandle, ApplyError> {
        let sessions = self
            .client
            .list_sessions()
            .await
            .map_err(ApplyError::MultiplexerUnavailable)?;
        let existing = sessions.into_iter().find(|s| s.name == target);
        if let Some(session) = &existing {
            tracing::info!(
                session = target,
                windows = session.windows,
                clients = session.attached_clients,
                "session already running, attaching"
            );
        }
        Ok(SessionHandle {
            name: target.to_string(),
            session_id: existing.map(|s| s.id).unwrap_or_default(),
            windows: Vec::new(),
            focused_window: 0,
            attached_existing: true,
            _guard: guard,
        })
    }
}

/// Run the before-script through the shell, blocking the build until it exits
async fn run_before_script(script: &Path, cwd: &Path) -> Result<(), ApplyError> {
    tracing::info!(script = %script.display(), "running before_script");
    let output = Command::new("sh")
        .arg("-c")
        .arg("\"$0\"")
        .arg(script)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ApplyError::BeforeScriptFailed {
            script: script.to_path_buf(),
            exit_code: None,
            stderr: e.to_string(),
        })?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        tracing::info!(target: "before_script", "{}", line);
    }

    if !output.status.success() {
        return Err(ApplyError::BeforeScriptFailed {
            script: script.to_path_buf(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
