//! Tab-completion queries.
//!
//! The generated shell script calls back into `tmuxp __complete <words>`,
//! so candidates are always computed fresh: layout files are listed on each
//! call and session names come straight from tmux. Any failure yields no
//! candidates rather than an error.

use std::path::Path;

use walkdir::WalkDir;

use crate::config::Format;
use crate::tmux::{TmuxClient, TmuxRunner};

/// Subcommands offered at the command position
pub const SUBCOMMANDS: &[&str] = &["load", "freeze"];

/// Global flags that take a value, as accepted before the subcommand
const VALUE_FLAGS: &[&str] = &[
    "-L",
    "--socket-name",
    "-S",
    "--socket-path",
    "--tmux-bin",
    "--config-dir",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
}

/// Candidates for the last word in `words` (everything after the program
/// name; the last entry is the word under the cursor, possibly empty).
pub async fn complete<R: TmuxRunner>(
    words: &[String],
    client: &TmuxClient<R>,
    config_dir: &Path,
) -> Vec<String> {
    let current = words.last().map(String::as_str).unwrap_or_default();
    let (_, positional) = split_globals(words);
    // the word under the cursor is a flag value
    if positional.is_empty() && !words.is_empty() {
        return Vec::new();
    }

    let candidates = match positional {
        [] | [_] => SUBCOMMANDS.iter().map(|s| s.to_string()).collect(),
        [command, _] if command == "load" => list_layouts(config_dir),
        [command, _] if command == "freeze" => match client.list_sessions().await {
            Ok(sessions) => sessions.into_iter().map(|s| s.name).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "session completion unavailable");
                Vec::new()
            }
        },
        _ => Vec::new(),
    };

    candidates
        .into_iter()
        .filter(|c| c.starts_with(current))
        .collect()
}

/// Split leading global flags off the completion words.
///
/// Returns the `(flag, value)` pairs (`--flag=value` is split too) and the
/// words from the subcommand on. The word under the cursor is never taken
/// as a flag.
pub fn split_globals(words: &[String]) -> (Vec<(String, String)>, &[String]) {
    let mut globals = Vec::new();
    let mut i = 0;
    while i + 1 < words.len() {
        let word = words[i].as_str();
        if !word.starts_with('-') {
            break;
        }
        match word.split_once('=') {
            Some((name, value)) if VALUE_FLAGS.contains(&name) => {
                globals.push((name.to_string(), value.to_string()));
                i += 1;
            }
            _ if VALUE_FLAGS.contains(&word) => {
                globals.push((word.to_string(), words[i + 1].clone()));
                i += 2;
            }
            _ => i += 1,
        }
    }
    (globals, &words[i..])
}

/// Layout file names directly inside `config_dir`, sorted
pub fn list_layouts(config_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = WalkDir::new(config_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| Format::from_path(entry.path()).is_some())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    names
}

/// Completion script for `shell`, wired to the `bin` executable
pub fn script(shell: Shell, bin: &str) -> String {
    let func = format!("_{}_complete", bin.replace(|c: char| !c.is_ascii_alphanumeric(), "_"));
    let body = format!(
        r#"{func}() {{
    local IFS=$'\n'
    COMPREPLY=( $({bin} __complete -- "${{COMP_WORDS[@]:1:COMP_CWORD}}" 2>/dev/null) )
}}
complete -o default -F {func} {bin}
"#
    );
    match shell {
        Shell::Bash => body,
        Shell::Zsh => format!("autoload -U +X bashcompinit && bashcompinit\n{}", body),
    }
}
