//! In-memory stand-in for a tmux server, for tests.
//!
//! Understands the subset of commands [`TmuxClient`](super::TmuxClient)
//! issues and keeps a session table so tests can assert on the result.

use std::sync::Mutex;

use async_trait::async_trait;

use super::TmuxRunner;
use crate::error::TmuxError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakePane {
    pub id: String,
    pub dir: String,
    pub current_command: String,
    pub active: bool,
    /// Lines submitted with Enter
    pub keys: Vec<String>,
    pending: String,
}

impl FakePane {
    pub fn new(id: &str, dir: &str, current_command: &str) -> Self {
        Self {
            id: id.to_string(),
            dir: dir.to_string(),
            current_command: current_command.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeWindow {
    pub id: String,
    pub name: String,
    /// Index requested through `new-window -t` or `move-window`
    pub index: Option<u32>,
    pub layout: String,
    pub active: bool,
    pub options: Vec<(String, String)>,
    pub panes: Vec<FakePane>,
}

impl FakeWindow {
    pub fn new(id: &str, name: &str, panes: Vec<FakePane>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            layout: "b25d,80x24,0,0,1".to_string(),
            panes,
            ..Default::default()
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn active_pane(&self) -> Option<&FakePane> {
        self.panes.iter().find(|p| p.active)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeSession {
    pub id: String,
    pub name: String,
    pub windows: Vec<FakeWindow>,
}

impl FakeSession {
    pub fn active_window(&self) -> Option<&FakeWindow> {
        self.windows.iter().find(|w| w.active)
    }
}

#[derive(Debug, Default)]
struct State {
    server_down: bool,
    next_id: usize,
    sessions: Vec<FakeSession>,
    calls: Vec<Vec<String>>,
    /// (command, nth call of it that fails)
    fail_on: Option<(String, usize)>,
}

impl State {
    fn id(&mut self, sigil: char) -> String {
        self.next_id += 1;
        format!("{}{}", sigil, self.next_id)
    }

    fn window_mut(&mut self, id: &str) -> Result<&mut FakeWindow, TmuxError> {
        self.sessions
            .iter_mut()
            .flat_map(|s| s.windows.iter_mut())
            .find(|w| w.id == id)
            .ok_or_else(|| failed(&format!("can't find window: {}", id)))
    }

    fn session_of_window(&mut self, id: &str) -> Result<&mut FakeSession, TmuxError> {
        self.sessions
            .iter_mut()
            .find(|s| s.windows.iter().any(|w| w.id == id))
            .ok_or_else(|| failed(&format!("can't find window: {}", id)))
    }

    fn window_of_pane(&mut self, id: &str) -> Result<&mut FakeWindow, TmuxError> {
        self.sessions
            .iter_mut()
            .flat_map(|s| s.windows.iter_mut())
            .find(|w| w.panes.iter().any(|p| p.id == id))
            .ok_or_else(|| failed(&format!("can't find pane: {}", id)))
    }

    fn session_index(&self, target: &str) -> Option<usize> {
        let target = target.split(':').next().unwrap_or_default();
        self.sessions.iter().position(|s| {
            s.id == target || s.name == target || target.strip_prefix('=') == Some(s.name.as_str())
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeTmux {
    state: Mutex<State>,
}

impl FakeTmux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `list-sessions` behave as if no server is running
    pub fn stop_server(&self) {
        self.lock().server_down = true;
    }

    /// Fail the `nth` (1-based) invocation of `command`
    pub fn fail_on(&self, command: &str, nth: usize) {
        self.lock().fail_on = Some((command.to_string(), nth));
    }

    pub fn seed(&self, session: FakeSession) {
        self.lock().sessions.push(session);
    }

    pub fn session(&self, name: &str) -> Option<FakeSession> {
        self.lock().sessions.iter().find(|s| s.name == name).cloned()
    }

    pub fn sent_keys(&self, pane_id: &str) -> Vec<String> {
        self.lock()
            .sessions
            .iter()
            .flat_map(|s| s.windows.iter())
            .flat_map(|w| w.panes.iter())
            .find(|p| p.id == pane_id)
            .map(|p| p.keys.clone())
            .unwrap_or_default()
    }

    /// How many times `command` was invoked
    pub fn count(&self, command: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some(command))
            .count()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn failed(stderr: &str) -> TmuxError {
    TmuxError::CommandFailed {
        command: "tmux".to_string(),
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

fn flag<'a>(args: &[&'a str], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| *a == name)
        .and_then(|i| args.get(i + 1).copied())
}

/// The `N` in a `session:N` target
fn window_index(target: &str) -> Option<u32> {
    target.split_once(':').and_then(|(_, i)| i.parse().ok())
}

fn require<'a>(args: &[&'a str], name: &str) -> Result<&'a str, TmuxError> {
    flag(args, name).ok_or_else(|| failed(&format!("missing {}", name)))
}

#[async_trait]
impl TmuxRunner for FakeTmux {
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let mut state = self.lock();
        state.calls.push(args.iter().map(|a| a.to_string()).collect());

        let command = args.first().copied().unwrap_or_default();
        let occurrences = state
            .calls
            .iter()
            .filter(|c| c.first().map(String::as_str) == Some(command))
            .count();
        if let Some((fail_cmd, nth)) = &state.fail_on {
            if fail_cmd == command && *nth == occurrences {
                return Err(failed("injected failure"));
            }
        }

        match command {
            "-V" => Ok("tmux 3.4\n".to_string()),
            "has-session" => {
                let target = require(args, "-t")?;
                state
                    .session_index(target)
                    .map(|_| String::new())
                    .ok_or_else(|| failed(&format!("can't find session: {}", target)))
            }
            "list-sessions" => {
                if state.server_down || state.sessions.is_empty() {
                    return Err(failed("no server running on /tmp/tmux-1000/default"));
                }
                Ok(state
                    .sessions
                    .iter()
                    .map(|s| format!("{}\t{}\t{}\t0\n", s.id, s.name, s.windows.len()))
                    .collect())
            }
            "new-session" => {
                let name = require(args, "-s")?;
                if state.session_index(&format!("={}", name)).is_some() {
                    return Err(failed(&format!("duplicate session: {}", name)));
                }
                let dir = flag(args, "-c").unwrap_or("/");
                let (sid, wid, pid) = (state.id('$'), state.id('@'), state.id('%'));
                let mut pane = FakePane::new(&pid, dir, "bash");
                pane.active = true;
                let mut window = FakeWindow::new(&wid, flag(args, "-n").unwrap_or("bash"), vec![pane]);
                window.active = true;
                state.server_down = false;
                state.sessions.push(FakeSession {
                    id: sid.clone(),
                    name: name.to_string(),
                    windows: vec![window],
                });
                Ok(format!("{}\t{}\t{}\n", sid, wid, pid))
            }
            "new-window" => {
                let target = require(args, "-t")?;
                let index = state
                    .session_index(target)
                    .ok_or_else(|| failed(&format!("can't find session: {}", target)))?;
                let dir = flag(args, "-c").unwrap_or("/");
                let (wid, pid) = (state.id('@'), state.id('%'));
                let mut pane = FakePane::new(&pid, dir, "bash");
                pane.active = true;
                let mut window = FakeWindow::new(&wid, flag(args, "-n").unwrap_or("bash"), vec![pane]);
                window.index = window_index(target);
                state.sessions[index].windows.push(window);
                Ok(format!("{}\t{}\n", wid, pid))
            }
            "split-window" => {
                let target = require(args, "-t")?;
                let dir = flag(args, "-c").unwrap_or("/").to_string();
                let pid = state.id('%');
                let window = state.window_mut(target)?;
                for pane in &mut window.panes {
                    pane.active = false;
                }
                let mut pane = FakePane::new(&pid, &dir, "bash");
                pane.active = true;
                window.panes.push(pane);
                Ok(format!("{}\n", pid))
            }
            "move-window" => {
                let source = require(args, "-s")?;
                let target = require(args, "-t")?;
                state.window_mut(source)?.index = window_index(target);
                Ok(String::new())
            }
            "select-layout" => {
                let target = require(args, "-t")?;
                let layout = args.last().copied().unwrap_or_default().to_string();
                state.window_mut(target)?.layout = layout;
                Ok(String::new())
            }
            "set-window-option" => {
                let target = require(args, "-t")?;
                let (key, value) = match args {
                    [.., key, value] => (key.to_string(), value.to_string()),
                    _ => return Err(failed("missing option")),
                };
                let window = state.window_mut(target)?;
                window.options.retain(|(k, _)| *k != key);
                window.options.push((key, value));
                Ok(String::new())
            }
            "send-keys" => {
                let target = require(args, "-t")?;
                let literal = args.contains(&"-l");
                let key = args.last().copied().unwrap_or_default();
                let window = state.window_of_pane(target)?;
                let pane = window
                    .panes
                    .iter_mut()
                    .find(|p| p.id == target)
                    .ok_or_else(|| failed("can't find pane"))?;
                if literal {
                    pane.pending.push_str(key);
                } else if key == "Enter" {
                    let line = std::mem::take(&mut pane.pending);
                    pane.keys.push(line);
                }
                Ok(String::new())
            }
            "select-window" => {
                let target = require(args, "-t")?;
                let session = state.session_of_window(target)?;
                for window in &mut session.windows {
                    window.active = window.id == target;
                }
                Ok(String::new())
            }
            "select-pane" => {
                let target = require(args, "-t")?;
                let window = state.window_of_pane(target)?;
                for pane in &mut window.panes {
                    pane.active = pane.id == target;
                }
                Ok(String::new())
            }
            "kill-session" => {
                let target = require(args, "-t")?;
                let index = state
                    .session_index(target)
                    .ok_or_else(|| failed(&format!("can't find session: {}", target)))?;
                state.sessions.remove(index);
                Ok(String::new())
            }
            "list-windows" => {
                let target = require(args, "-t")?;
                let index = state
                    .session_index(target)
                    .ok_or_else(|| failed(&format!("can't find session: {}", target)))?;
                Ok(state.sessions[index]
                    .windows
                    .iter()
                    .map(|w| {
                        format!("{}\t{}\t{}\t{}\n", w.id, w.name, w.layout, u8::from(w.active))
                    })
                    .collect())
            }
            "list-panes" => {
                let target = require(args, "-t")?;
                Ok(state
                    .window_mut(target)?
                    .panes
                    .iter()
                    .map(|p| {
                        format!(
                            "{}\t{}\t{}\t{}\n",
                            p.id,
                            p.current_command,
                            p.dir,
                            u8::from(p.active)
                        )
                    })
                    .collect())
            }
            "show-window-options" => {
                let target = require(args, "-t")?;
                Ok(state
                    .window_mut(target)?
                    .options
                    .iter()
                    .map(|(k, v)| format!("{} {}\n", k, v))
                    .collect())
            }
            "display-message" => Ok(state
                .sessions
                .first()
                .map(|s| format!("{}\n", s.name))
                .unwrap_or_default()),
            "switch-client" => Ok(String::new()),
            other => Err(failed(&format!("unknown command: {}", other))),
        }
    }
}
