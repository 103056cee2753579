//! Session layout files: the on-disk format, lookup and parsing.
//!
//! Loading goes raw file -> [`RawSession`] -> [`expand`] -> [`validate`].
//! The raw types mirror what users write (shorthand panes, string-or-list
//! commands); everything downstream works on the normalized [`SessionSpec`].

mod expand;
mod validate;

pub use expand::expand;
pub use validate::{option_value, validate, ValidSpec};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// File names looked up when `load` is pointed at a directory
pub const PROJECT_FILES: &[&str] = &[".tmuxp.yaml", ".tmuxp.yml", ".tmuxp.json"];

/// Serialization format of a layout file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Some(Format::Yaml),
            Some("json") => Some(Format::Json),
            _ => None,
        }
    }

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Yaml => &["yaml", "yml"],
            Format::Json => &["json"],
        }
    }
}

/// Session as written in a layout file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSession {
    #[serde(default)]
    pub session_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_script: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub shell_command_before: Vec<String>,
    #[serde(default)]
    pub windows: Vec<RawWindow>,
}

/// Window as written in a layout file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_name: Option<String>,
    /// Explicit tmux window index; otherwise tmux picks the next free one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_index: Option<u32>,
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "is_false")]
    pub focus: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub shell_command_before: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_directory: Option<String>,
    #[serde(default)]
    pub panes: Vec<RawPane>,
}

/// A pane entry: either a bare command string (or null for an idle shell)
/// or a full mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPane {
    Shorthand(Option<String>),
    Full(RawPaneConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPaneConfig {
    #[serde(default, deserialize_with = "flag", skip_serializing_if = "is_false")]
    pub focus: bool,
    #[serde(
        default,
        alias = "command",
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub shell_command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_directory: Option<String>,
}

/// Normalized session, every path absolute, every pane in full form
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSpec {
    pub name: String,
    pub start_directory: PathBuf,
    pub before_script: Option<PathBuf>,
    pub windows: Vec<WindowSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    pub name: Option<String>,
    pub index: Option<u32>,
    pub focus: bool,
    pub layout: Option<String>,
    pub options: BTreeMap<String, serde_json::Value>,
    pub shell_command_before: Vec<String>,
    pub start_directory: PathBuf,
    pub panes: Vec<PaneSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaneSpec {
    pub focus: bool,
    /// Empty means an idle shell
    pub commands: Vec<String>,
    pub start_directory: PathBuf,
}

impl WindowSpec {
    /// Display label used in log lines and error messages
    pub fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("{} ({})", index, name),
            None => index.to_string(),
        }
    }
}

/// Read and parse a layout file, choosing the parser by extension
pub fn load_file(path: &Path) -> Result<RawSession, ConfigError> {
    let format =
        Format::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_str(&content, format, path)
}

/// Parse layout text; `path` is only used for error messages
pub fn parse_str(content: &str, format: Format, path: &Path) -> Result<RawSession, ConfigError> {
    match format {
        Format::Yaml => serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        Format::Json => serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Render a layout in the given format
pub fn to_string(session: &RawSession, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Yaml => serde_yaml::to_string(session)?,
        Format::Json => serde_json::to_string_pretty(session)? + "\n",
    })
}

/// Resolve what the user passed to `load` into a layout file.
///
/// Accepts a file path, a project directory containing a `.tmuxp.*` file,
/// or a bare name looked up in `config_dir` with any supported extension.
pub fn find_layout(target: &str, config_dir: &Path) -> Result<PathBuf, ConfigError> {
    let direct = PathBuf::from(target);
    if direct.is_file() {
        return Ok(direct);
    }
    if direct.is_dir() {
        let found = PROJECT_FILES
            .iter()
            .map(|name| direct.join(name))
            .find(|p| p.is_file());
        return found.ok_or(ConfigError::NotFound(direct));
    }

    let in_config_dir = config_dir.join(target);
    if Format::from_path(&in_config_dir).is_some() && in_config_dir.is_file() {
        return Ok(in_config_dir);
    }

    [Format::Yaml, Format::Json]
        .iter()
        .flat_map(|f| f.extensions())
        .map(|ext| config_dir.join(format!("{}.{}", target, ext)))
        .find(|p| p.is_file())
        .ok_or(ConfigError::NotFound(direct))
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Commands may be given as one string or a list. Nulls and nested lists in
/// a list are flattened; older freezes wrote `[]` for an idle shell.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Item {
        Command(String),
        Nested(Vec<Option<String>>),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<Option<Item>>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(items)) => items
            .into_iter()
            .flatten()
            .flat_map(|item| match item {
                Item::Command(cmd) => vec![cmd],
                Item::Nested(cmds) => cmds.into_iter().flatten().collect(),
            })
            .collect(),
    })
}

/// Focus flags: booleans, or the strings "true"/"false" older freezes wrote
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Flag::Bool(b)) => Ok(b),
        Some(Flag::Text(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {:?}",
                other
            ))),
        },
    }
}
