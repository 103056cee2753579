//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::completion::Shell;
use crate::config::Format;

/// Build tmux sessions from YAML/JSON layout files
#[derive(Parser, Debug)]
#[command(name = "tmuxp")]
#[command(version)]
pub struct Cli {
    /// tmux executable to drive
    #[arg(long, global = true, env = "TMUXP_TMUX_BIN", default_value = "tmux")]
    pub tmux_bin: String,

    /// tmux server socket name (passed as `-L`)
    #[arg(short = 'L', long, global = true, env = "TMUXP_SOCKET_NAME")]
    pub socket_name: Option<String>,

    /// tmux server socket path (passed as `-S`)
    #[arg(short = 'S', long, global = true, env = "TMUXP_SOCKET_PATH")]
    pub socket_path: Option<String>,

    /// Directory searched for named layouts [default: ~/.tmuxp]
    #[arg(long, global = true, env = "TMUXP_CONFIGDIR")]
    pub config_dir: Option<PathBuf>,

    /// More log output (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a session from a layout file
    Load {
        /// Layout file, project directory, or name in the config directory
        target: String,

        /// Override the session name from the layout
        #[arg(short = 's', long)]
        session_name: Option<String>,

        /// Build the session without attaching to it
        #[arg(short = 'd', long)]
        detached: bool,

        /// Attach to the session if it is already running instead of failing
        #[arg(long)]
        attach_existing: bool,
    },

    /// Write a running session out as a layout file
    Freeze {
        /// Session to freeze [default: the current session]
        session: Option<String>,

        /// Output file [default: stdout]
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Completion callback used by the generated scripts
    #[command(name = "__complete", hide = true)]
    Complete {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },
}
