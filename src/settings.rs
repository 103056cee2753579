use std::path::PathBuf;

use crate::cli::Cli;
use crate::tmux::{TmuxClient, TmuxExecutor};

/// Directory name under $HOME holding named layouts
const CONFIG_DIR_NAME: &str = ".tmuxp";

/// Runtime settings gathered from flags and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub tmux_bin: String,
    pub socket_name: Option<String>,
    pub socket_path: Option<String>,
    pub config_dir: PathBuf,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            tmux_bin: cli.tmux_bin.clone(),
            socket_name: cli.socket_name.clone(),
            socket_path: cli.socket_path.clone(),
            config_dir: cli.config_dir.clone().unwrap_or_else(default_config_dir),
        }
    }

    /// Apply global flags typed on a command line being completed
    #[must_use]
    pub fn with_globals(mut self, globals: &[(String, String)]) -> Self {
        for (flag, value) in globals {
            match flag.as_str() {
                "-L" | "--socket-name" => self.socket_name = Some(value.clone()),
                "-S" | "--socket-path" => self.socket_path = Some(value.clone()),
                "--tmux-bin" => self.tmux_bin = value.clone(),
                "--config-dir" => self.config_dir = PathBuf::from(value),
                _ => {}
            }
        }
        self
    }

    pub fn executor(&self) -> TmuxExecutor {
        let mut executor = TmuxExecutor::new(&self.tmux_bin);
        if let Some(name) = &self.socket_name {
            executor = executor.with_socket_name(name);
        }
        if let Some(path) = &self.socket_path {
            executor = executor.with_socket_path(path);
        }
        executor
    }

    pub fn client(&self) -> TmuxClient {
        TmuxClient::with_runner(self.executor())
    }
}

/// `~/.tmuxp`, or `./.tmuxp` when there is no home directory
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(CONFIG_DIR_NAME)
}
