use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{PaneSpec, RawPane, RawSession, SessionSpec, WindowSpec};
use crate::error::ValidationError;

/// `$NAME` or `${NAME}`
static RE_ENV_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap());

/// Normalize a parsed layout.
///
/// Shorthand panes become full panes, session-level `shell_command_before`
/// is pushed down into every window, and directories trickle from session
/// to window to pane. Paths get `~` and environment variables expanded and
/// are then resolved against `base_dir`, the directory holding the file.
pub fn expand(raw: RawSession, base_dir: &Path) -> Result<SessionSpec, ValidationError> {
    let start_directory = match raw.start_directory {
        Some(dir) => resolve(&dir, base_dir, "start_directory")?,
        None => base_dir.to_path_buf(),
    };
    let before_script = raw
        .before_script
        .map(|script| resolve(&script, base_dir, "before_script"))
        .transpose()?;

    let mut windows = Vec::with_capacity(raw.windows.len());
    for window in raw.windows {
        let window_dir = match window.start_directory {
            Some(dir) => resolve(&dir, &start_directory, "start_directory")?,
            None => start_directory.clone(),
        };

        let mut panes = Vec::with_capacity(window.panes.len());
        for pane in window.panes {
            panes.push(match pane {
                RawPane::Shorthand(command) => PaneSpec {
                    focus: false,
                    commands: command.into_iter().filter(|c| !is_blank(c)).collect(),
                    start_directory: window_dir.clone(),
                },
                RawPane::Full(config) => PaneSpec {
                    focus: config.focus,
                    commands: config.shell_command,
                    start_directory: match config.start_directory {
                        Some(dir) => resolve(&dir, &window_dir, "start_directory")?,
                        None => window_dir.clone(),
                    },
                },
            });
        }

        let shell_command_before = raw
            .shell_command_before
            .iter()
            .cloned()
            .chain(window.shell_command_before)
            .collect();

        windows.push(WindowSpec {
            name: window.window_name,
            index: window.window_index,
            focus: window.focus,
            layout: window.layout,
            options: window.options,
            shell_command_before,
            start_directory: window_dir,
            panes,
        });
    }

    Ok(SessionSpec {
        name: raw.session_name,
        start_directory,
        before_script,
        windows,
    })
}

/// A bare `pane` entry is the conventional spelling of an idle shell
fn is_blank(command: &str) -> bool {
    let trimmed = command.trim();
    trimmed.is_empty() || trimmed == "pane"
}

fn resolve(raw: &str, base: &Path, field: &'static str) -> Result<PathBuf, ValidationError> {
    let expanded = expand_vars(raw, field)?;
    let path = expand_home(&expanded);
    let joined = if path.is_absolute() {
        path
    } else {
        base.join(path)
    };
    Ok(normalize(&joined))
}

fn expand_vars(raw: &str, field: &'static str) -> Result<String, ValidationError> {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;
    for caps in RE_ENV_VAR.captures_iter(raw) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let value = std::env::var(name).map_err(|_| ValidationError::UndefinedVariable {
            field,
            var: name.to_string(),
        })?;
        out.push_str(&raw[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&raw[last..]);
    Ok(out)
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Lexically drop `.` and fold `..` so paths read cleanly in tmux
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
