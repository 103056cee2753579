use super::{SessionSpec, WindowSpec};
use crate::error::ValidationError;

/// A layout that passed validation, with focus defaults resolved.
///
/// Only [`validate`] builds one, so holding a `ValidSpec` means every
/// invariant held at validation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSpec {
    spec: SessionSpec,
    focused_window: usize,
    focused_panes: Vec<usize>,
}

impl ValidSpec {
    pub fn spec(&self) -> &SessionSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Index of the window to select; the first if none asked for focus
    pub fn focused_window(&self) -> usize {
        self.focused_window
    }

    /// Index of the pane to select in `window`; the first if none asked
    pub fn focused_pane(&self, window: usize) -> usize {
        self.focused_panes.get(window).copied().unwrap_or(0)
    }
}

/// Check the layout's invariants, reporting the first one violated.
pub fn validate(spec: SessionSpec) -> Result<ValidSpec, ValidationError> {
    check_name(&spec.name)?;

    if spec.windows.is_empty() {
        return Err(ValidationError::NoWindows);
    }

    let mut focused_window: Option<usize> = None;
    let mut focused_panes = Vec::with_capacity(spec.windows.len());
    for (index, window) in spec.windows.iter().enumerate() {
        focused_panes.push(check_window(window, index)?);
        if let Some(wanted) = window.index {
            if let Some(first) = spec.windows[..index].iter().position(|w| w.index == Some(wanted)) {
                return Err(ValidationError::DuplicateWindowIndex {
                    index: wanted,
                    first: spec.windows[first].label(first),
                    second: window.label(index),
                });
            }
        }
        if window.focus {
            if let Some(first) = focused_window {
                return Err(ValidationError::MultipleFocusedWindows {
                    first: spec.windows[first].label(first),
                    second: window.label(index),
                });
            }
            focused_window = Some(index);
        }
    }

    if !spec.start_directory.is_dir() {
        return Err(ValidationError::StartDirectory(spec.start_directory.clone()));
    }
    for window in &spec.windows {
        let dirs = std::iter::once(&window.start_directory)
            .chain(window.panes.iter().map(|p| &p.start_directory));
        for dir in dirs {
            if !dir.is_dir() {
                return Err(ValidationError::StartDirectory(dir.clone()));
            }
        }
    }

    if let Some(script) = &spec.before_script {
        if !script.exists() {
            return Err(ValidationError::BeforeScriptMissing(script.clone()));
        }
    }

    Ok(ValidSpec {
        spec,
        focused_window: focused_window.unwrap_or(0),
        focused_panes,
    })
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptySessionName);
    }
    // tmux reads these as target separators
    if name.contains([':', '.']) {
        return Err(ValidationError::InvalidSessionName(name.to_string()));
    }
    Ok(())
}

/// Returns the focused pane index for the window
fn check_window(window: &WindowSpec, index: usize) -> Result<usize, ValidationError> {
    if window.panes.is_empty() {
        return Err(ValidationError::NoPanes {
            window: window.label(index),
        });
    }

    let mut focused: Option<usize> = None;
    for (pane_index, pane) in window.panes.iter().enumerate() {
        if !pane.focus {
            continue;
        }
        if let Some(first) = focused {
            return Err(ValidationError::MultipleFocusedPanes {
                window: window.label(index),
                first,
                second: pane_index,
            });
        }
        focused = Some(pane_index);
    }

    for (key, value) in &window.options {
        if option_value(value).is_none() {
            return Err(ValidationError::InvalidOption {
                window: window.label(index),
                key: key.clone(),
            });
        }
    }

    Ok(focused.unwrap_or(0))
}

/// Render a scalar option value the way `tmux set-window-option` expects
pub fn option_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Bool(true) => Some("on".to_string()),
        serde_json::Value::Bool(false) => Some("off".to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}
