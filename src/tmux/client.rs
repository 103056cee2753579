use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use super::{TmuxPane, TmuxRunner, TmuxSession, TmuxWindow};
use crate::error::TmuxError;

const SESSION_FORMAT: &str = "#{session_id}\t#{session_name}\t#{session_windows}\t#{session_attached}";
const WINDOW_FORMAT: &str = "#{window_id}\t#{window_name}\t#{window_layout}\t#{window_active}";
const PANE_FORMAT: &str = "#{pane_id}\t#{pane_current_command}\t#{pane_current_path}\t#{pane_active}";

/// Runs the real tmux binary
#[derive(Debug, Clone)]
pub struct TmuxExecutor {
    /// Path to tmux binary
    tmux_bin: String,
    socket_name: Option<String>,
    socket_path: Option<String>,
}

impl TmuxExecutor {
    pub fn new(tmux_bin: impl Into<String>) -> Self {
        Self {
            tmux_bin: tmux_bin.into(),
            socket_name: None,
            socket_path: None,
        }
    }

    /// `tmux -L <name>`
    #[must_use]
    pub fn with_socket_name(mut self, name: impl Into<String>) -> Self {
        self.socket_name = Some(name.into());
        self
    }

    /// `tmux -S <path>`, wins over the socket name
    #[must_use]
    pub fn with_socket_path(mut self, path: impl Into<String>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Arguments placed before every subcommand
    fn global_args(&self) -> Vec<&str> {
        if let Some(path) = &self.socket_path {
            vec!["-S", path.as_str()]
        } else if let Some(name) = &self.socket_name {
            vec!["-L", name.as_str()]
        } else {
            Vec::new()
        }
    }

    /// Full command line for `args`, binary first
    pub fn command_line(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.tmux_bin.as_str())
            .chain(self.global_args())
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }
}

impl Default for TmuxExecutor {
    fn default() -> Self {
        Self::new("tmux")
    }
}

#[async_trait]
impl TmuxRunner for TmuxExecutor {
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        tracing::debug!(args = ?args, "tmux");
        let output = Command::new(&self.tmux_bin)
            .args(self.global_args())
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TmuxError::NotFound(self.tmux_bin.clone())
                } else {
                    TmuxError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(TmuxError::CommandFailed {
                command: self.command_line(args).join(" "),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Ids tmux hands back for a freshly created session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub session_id: String,
    pub window_id: String,
    pub pane_id: String,
}

/// Client for interacting with tmux via CLI
pub struct TmuxClient<R = TmuxExecutor> {
    runner: R,
}

impl Default for TmuxClient<TmuxExecutor> {
    fn default() -> Self {
        Self::with_runner(TmuxExecutor::default())
    }
}

impl<R: TmuxRunner> TmuxClient<R> {
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// `tmux -V`; fails with [`TmuxError::NotFound`] when the binary is missing
    pub async fn version(&self) -> Result<String, TmuxError> {
        Ok(self.runner.run(&["-V"]).await?.trim().to_string())
    }

    /// Exact-name session lookup
    pub async fn has_session(&self, name: &str) -> Result<bool, TmuxError> {
        let target = format!("={}", name);
        match self.runner.run(&["has-session", "-t", target.as_str()]).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_command_failure() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// List all tmux sessions; an absent server means no sessions
    pub async fn list_sessions(&self) -> Result<Vec<TmuxSession>, TmuxError> {
        let output = match self.runner.run(&["list-sessions", "-F", SESSION_FORMAT]).await {
            Ok(output) => output,
            Err(TmuxError::CommandFailed { stderr, .. })
                if stderr.contains("no server running")
                    || stderr.contains("no sessions")
                    || stderr.contains("error connecting") =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| -> Result<TmuxSession, TmuxError> {
                let [id, name, windows, attached] = split_fields::<4>(line, "list-sessions")?;
                Ok(TmuxSession {
                    id: id.to_string(),
                    name: name.to_string(),
                    windows: windows.parse().unwrap_or(0),
                    attached_clients: attached.parse().unwrap_or(0),
                })
            })
            .collect()
    }

    /// Create a detached session whose first window is named and rooted as given
    pub async fn new_session(
        &self,
        name: &str,
        window_name: Option<&str>,
        start_directory: &Path,
    ) -> Result<NewSession, TmuxError> {
        let dir = start_directory.display().to_string();
        let mut args = vec![
            "new-session",
            "-d",
            "-P",
            "-F",
            "#{session_id}\t#{window_id}\t#{pane_id}",
            "-s",
            name,
            "-c",
            dir.as_str(),
        ];
        if let Some(window_name) = window_name {
            args.extend(["-n", window_name]);
        }
        let output = self.runner.run(&args).await?;
        let [session_id, window_id, pane_id] = split_fields::<3>(output.trim(), "new-session")?;
        Ok(NewSession {
            session_id: session_id.to_string(),
            window_id: window_id.to_string(),
            pane_id: pane_id.to_string(),
        })
    }

    /// Add a window to the session, at `window_index` when given;
    /// returns (window id, first pane id)
    pub async fn new_window(
        &self,
        session_id: &str,
        window_name: Option<&str>,
        window_index: Option<u32>,
        start_directory: &Path,
    ) -> Result<(String, String), TmuxError> {
        let target = match window_index {
            Some(i) => format!("{}:{}", session_id, i),
            None => format!("{}:", session_id),
        };
        let dir = start_directory.display().to_string();
        let mut args = vec![
            "new-window",
            "-d",
            "-P",
            "-F",
            "#{window_id}\t#{pane_id}",
            "-t",
            target.as_str(),
            "-c",
            dir.as_str(),
        ];
        if let Some(window_name) = window_name {
            args.extend(["-n", window_name]);
        }
        let output = self.runner.run(&args).await?;
        let [window_id, pane_id] = split_fields::<2>(output.trim(), "new-window")?;
        Ok((window_id.to_string(), pane_id.to_string()))
    }

    /// Renumber a window within its session
    pub async fn move_window(
        &self,
        window_id: &str,
        session_id: &str,
        window_index: u32,
    ) -> Result<(), TmuxError> {
        let target = format!("{}:{}", session_id, window_index);
        self.runner
            .run(&["move-window", "-s", window_id, "-t", target.as_str()])
            .await
            .map(drop)
    }

    /// Split the window's active pane; returns the new pane id
    pub async fn split_window(
        &self,
        window_id: &str,
        start_directory: &Path,
    ) -> Result<String, TmuxError> {
        let dir = start_directory.display().to_string();
        let output = self
            .runner
            .run(&["split-window", "-P", "-F", "#{pane_id}", "-t", window_id, "-c", dir.as_str()])
            .await?;
        Ok(output.trim().to_string())
    }

    pub async fn select_layout(&self, window_id: &str, layout: &str) -> Result<(), TmuxError> {
        self.runner
            .run(&["select-layout", "-t", window_id, layout])
            .await
            .map(drop)
    }

    pub async fn set_window_option(
        &self,
        window_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), TmuxError> {
        self.runner
            .run(&["set-window-option", "-t", window_id, key, value])
            .await
            .map(drop)
    }

    /// Type `command` literally into the pane and press Enter
    pub async fn send_keys(&self, pane_id: &str, command: &str) -> Result<(), TmuxError> {
        self.runner
            .run(&["send-keys", "-t", pane_id, "-l", command])
            .await?;
        self.runner
            .run(&["send-keys", "-t", pane_id, "Enter"])
            .await
            .map(drop)
    }

    pub async fn select_window(&self, window_id: &str) -> Result<(), TmuxError> {
        self.runner
            .run(&["select-window", "-t", window_id])
            .await
            .map(drop)
    }

    pub async fn select_pane(&self, pane_id: &str) -> Result<(), TmuxError> {
        self.runner
            .run(&["select-pane", "-t", pane_id])
            .await
            .map(drop)
    }

    /// Kill a session
    pub async fn kill_session(&self, target: &str) -> Result<(), TmuxError> {
        self.runner
            .run(&["kill-session", "-t", target])
            .await
            .map(drop)
    }

    pub async fn list_windows(&self, session: &str) -> Result<Vec<TmuxWindow>, TmuxError> {
        let target = format!("={}", session);
        let output = self
            .runner
            .run(&["list-windows", "-t", target.as_str(), "-F", WINDOW_FORMAT])
            .await?;
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| -> Result<TmuxWindow, TmuxError> {
                let [id, name, layout, active] = split_fields::<4>(line, "list-windows")?;
                Ok(TmuxWindow {
                    id: id.to_string(),
                    name: name.to_string(),
                    layout: layout.to_string(),
                    active: active == "1",
                })
            })
            .collect()
    }

    pub async fn list_panes(&self, window_id: &str) -> Result<Vec<TmuxPane>, TmuxError> {
        let output = self
            .runner
            .run(&["list-panes", "-t", window_id, "-F", PANE_FORMAT])
            .await?;
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| -> Result<TmuxPane, TmuxError> {
                let [id, command, path, active] = split_fields::<4>(line, "list-panes")?;
                Ok(TmuxPane {
                    id: id.to_string(),
                    current_command: command.to_string(),
                    current_path: path.to_string(),
                    active: active == "1",
                })
            })
            .collect()
    }

    /// Options set locally on the window, as (name, value) pairs
    pub async fn show_window_options(
        &self,
        window_id: &str,
    ) -> Result<Vec<(String, String)>, TmuxError> {
        let output = self
            .runner
            .run(&["show-window-options", "-t", window_id])
            .await?;
        Ok(output
            .lines()
            .filter_map(|line| line.trim().split_once(' '))
            .map(|(key, value)| (key.to_string(), unquote(value.trim()).to_string()))
            .collect())
    }

    /// Name of the session this process runs inside, if any
    pub async fn current_session(&self) -> Result<Option<String>, TmuxError> {
        if std::env::var_os("TMUX").is_none() {
            return Ok(None);
        }
        let output = self
            .runner
            .run(&["display-message", "-p", "#{session_name}"])
            .await?;
        let name = output.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    /// Move the current client to `session` (only valid inside tmux)
    pub async fn switch_client(&self, session: &str) -> Result<(), TmuxError> {
        let target = format!("={}", session);
        self.runner
            .run(&["switch-client", "-t", target.as_str()])
            .await
            .map(drop)
    }
}

/// Get the command to attach to a session (for external execution)
pub fn attach_args(session: &str) -> Vec<String> {
    vec![
        "attach-session".to_string(),
        "-t".to_string(),
        format!("={}", session),
    ]
}

fn split_fields<'a, const N: usize>(line: &'a str, command: &str) -> Result<[&'a str; N], TmuxError> {
    let parts: Vec<&str> = line.split('\t').collect();
    parts.try_into().map_err(|parts: Vec<&str>| TmuxError::Parse {
        command: command.to_string(),
        detail: format!("expected {} tab-separated fields, got {}: {:?}", N, parts.len(), line),
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
