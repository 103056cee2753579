use once_cell::sync::Lazy;
use regex::Regex;

/// What a pane was running when it was frozen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneCommand {
    /// An interactive shell prompt; the pane freezes as an idle shell
    Shell,
    /// A language REPL or script host; not worth replaying on load
    Interpreter,
    /// Anything else, replayed as the pane's command
    Program(String),
}

/// Login shells show up with a leading dash (e.g. "-zsh")
static RE_SHELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-|^(?:(?:ba|z|fi|k|tc|c|da|mk|o|ya|x|elvi)?sh|pwsh|nu)$").unwrap());

static RE_INTERPRETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:python[0-9.]*|[Pp]ython|ruby|irb|node|perl|php)$").unwrap());

/// Classify `#{pane_current_command}` for freezing
pub fn classify_command(current: &str) -> PaneCommand {
    let current = current.trim();

    if current.is_empty() || RE_SHELL.is_match(current) {
        return PaneCommand::Shell;
    }

    if RE_INTERPRETER.is_match(current) {
        return PaneCommand::Interpreter;
    }

    PaneCommand::Program(current.to_string())
}
