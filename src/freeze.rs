use std::collections::BTreeMap;

use crate::config::{RawPane, RawPaneConfig, RawSession, RawWindow};
use crate::error::TmuxError;
use crate::tmux::{classify_command, PaneCommand, TmuxClient, TmuxPane, TmuxRunner};

/// Snapshot a running session as a layout `load` can rebuild.
///
/// Windows keep their name, exact layout string, local options and active
/// flag. A directory shared by every pane of a window moves up to the
/// window; panes only keep commands worth replaying (see
/// [`classify_command`]).
pub async fn freeze<R: TmuxRunner>(
    client: &TmuxClient<R>,
    session: &str,
) -> Result<RawSession, TmuxError> {
    let mut windows = Vec::new();
    for window in client.list_windows(session).await? {
        let options = client
            .show_window_options(&window.id)
            .await?
            .into_iter()
            .map(|(key, value)| (key, option_json(&value)))
            .collect::<BTreeMap<_, _>>();
        let panes = client.list_panes(&window.id).await?;

        let shared_dir = panes
            .first()
            .map(|p| p.current_path.clone())
            .filter(|dir| panes.iter().all(|p| &p.current_path == dir));

        windows.push(RawWindow {
            window_name: Some(window.name),
            window_index: None,
            focus: window.active,
            layout: Some(window.layout),
            options,
            shell_command_before: Vec::new(),
            start_directory: shared_dir.clone(),
            panes: panes
                .iter()
                .map(|pane| freeze_pane(pane, shared_dir.is_none()))
                .collect(),
        });
    }

    tracing::debug!(session, windows = windows.len(), "session frozen");
    Ok(RawSession {
        session_name: session.to_string(),
        windows,
        ..Default::default()
    })
}

fn freeze_pane(pane: &TmuxPane, own_directory: bool) -> RawPane {
    let shell_command = match classify_command(&pane.current_command) {
        PaneCommand::Program(cmd) => vec![cmd],
        PaneCommand::Shell | PaneCommand::Interpreter => Vec::new(),
    };
    let start_directory = own_directory.then(|| pane.current_path.clone());

    if !pane.active && shell_command.is_empty() && start_directory.is_none() {
        return RawPane::Shorthand(None);
    }
    RawPane::Full(RawPaneConfig {
        focus: pane.active,
        shell_command,
        start_directory,
    })
}

/// Numbers come back as numbers, everything else as tmux printed it
fn option_json(value: &str) -> serde_json::Value {
    value
        .parse::<i64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkspaceBuilder;
    use crate::config::{self, expand, parse_str, validate, Format};
    use crate::tmux::fake::{FakePane, FakeSession, FakeTmux, FakeWindow};
    use std::path::Path;

    fn seeded(dir_a: &str, dir_b: &str) -> FakeTmux {
        let fake = FakeTmux::new();

        let mut editor = FakeWindow::new(
            "@1",
            "editor",
            vec![FakePane::new("%1", dir_a, "vim"), FakePane::new("%2", dir_a, "-zsh")],
        );
        editor.layout = "main-horizontal-ish,80x24,0,0".into();
        editor.options.push(("main-pane-height".into(), "35".into()));
        editor.panes[1].active = true;

        let mut logs = FakeWindow::new(
            "@2",
            "logs",
            vec![FakePane::new("%3", dir_a, "python3"), FakePane::new("%4", dir_b, "tail")],
        );
        logs.active = true;
        logs.panes[0].active = true;

        fake.seed(FakeSession {
            id: "$1".into(),
            name: "work".into(),
            windows: vec![editor, logs],
        });
        fake
    }

    #[tokio::test]
    async fn test_freeze_shape() {
        let fake = seeded("/src/app", "/var/log");
        let raw = freeze(&TmuxClient::with_runner(&fake), "work").await.unwrap();

        assert_eq!(raw.session_name, "work");
        assert_eq!(raw.windows.len(), 2);

        let editor = &raw.windows[0];
        assert_eq!(editor.window_name.as_deref(), Some("editor"));
        assert!(!editor.focus);
        assert_eq!(editor.start_directory.as_deref(), Some("/src/app"));
        assert_eq!(editor.options["main-pane-height"], serde_json::json!(35));
        assert_eq!(
            editor.panes,
            vec![
                RawPane::Full(RawPaneConfig {
                    shell_command: vec!["vim".into()],
                    ..Default::default()
                }),
                RawPane::Full(RawPaneConfig {
                    focus: true,
                    ..Default::default()
                }),
            ]
        );

        let logs = &raw.windows[1];
        assert!(logs.focus);
        assert_eq!(logs.start_directory, None);
        assert_eq!(
            logs.panes,
            vec![
                RawPane::Full(RawPaneConfig {
                    focus: true,
                    start_directory: Some("/src/app".into()),
                    ..Default::default()
                }),
                RawPane::Full(RawPaneConfig {
                    shell_command: vec!["tail".into()],
                    start_directory: Some("/var/log".into()),
                    ..Default::default()
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_frozen_layout_loads_with_same_semantics() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let dir_a = a.path().display().to_string();
        let dir_b = b.path().display().to_string();
        let fake = seeded(&dir_a, &dir_b);
        let raw = freeze(&TmuxClient::with_runner(&fake), "work").await.unwrap();

        for format in [Format::Yaml, Format::Json] {
            let text = config::to_string(&raw, format).unwrap();
            let back = parse_str(&text, format, Path::new("frozen")).unwrap();
            assert_eq!(back, raw);

            let valid = validate(expand(back, a.path()).unwrap()).unwrap();
            let spec = valid.spec();
            assert_eq!(spec.windows.len(), 2);
            assert_eq!(valid.focused_window(), 1);
            assert_eq!(valid.focused_pane(0), 1);
            assert_eq!(valid.focused_pane(1), 0);
            assert_eq!(spec.windows[0].panes[0].commands, vec!["vim"]);
            assert!(spec.windows[1].panes[0].commands.is_empty());
            assert_eq!(spec.windows[1].panes[1].start_directory, b.path());
            assert_eq!(spec.windows[0].start_directory, a.path());
        }
    }

    #[tokio::test]
    async fn test_frozen_layout_rebuilds_pane_directories() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let dir_a = a.path().display().to_string();
        let dir_b = b.path().display().to_string();
        let source = seeded(&dir_a, &dir_b);
        let raw = freeze(&TmuxClient::with_runner(&source), "work").await.unwrap();

        // loaded from somewhere else, so nothing falls back to the session root
        let elsewhere = tempfile::tempdir().unwrap();
        let target = FakeTmux::new();
        let builder = WorkspaceBuilder::new(TmuxClient::with_runner(&target));
        let valid = validate(expand(raw, elsewhere.path()).unwrap()).unwrap();
        builder.apply(&valid, "work-rebuilt").await.unwrap();

        let rebuilt = target.session("work-rebuilt").unwrap();
        let dirs: Vec<Vec<String>> = rebuilt
            .windows
            .iter()
            .map(|w| w.panes.iter().map(|p| p.dir.clone()).collect())
            .collect();
        assert_eq!(
            dirs,
            vec![
                vec![dir_a.clone(), dir_a.clone()],
                vec![dir_a.clone(), dir_b.clone()],
            ]
        );
        assert_eq!(rebuilt.windows[0].panes[0].keys, vec!["vim"]);
        assert_eq!(rebuilt.windows[1].panes[1].keys, vec!["tail"]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_an_error() {
        let fake = FakeTmux::new();
        let err = freeze(&TmuxClient::with_runner(&fake), "ghost").await.unwrap_err();
        assert!(err.is_command_failure());
    }

    #[test]
    fn test_idle_pane_uses_shorthand() {
        let pane = TmuxPane {
            id: "%1".into(),
            current_command: "bash".into(),
            current_path: "/tmp".into(),
            active: false,
        };
        assert_eq!(freeze_pane(&pane, false), RawPane::Shorthand(None));
    }
}
