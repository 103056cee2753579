use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod actions;
mod builder;
mod cli;
mod completion;
mod config;
mod error;
mod freeze;
mod settings;
mod tmux;

use builder::{CancelToken, ExistingSession, SessionHandle, WorkspaceBuilder};
use cli::{Cli, Command};
use config::Format;
use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so `freeze` output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(cli.verbose, std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let settings = Settings::from_cli(&cli);
    match cli.command {
        Command::Load {
            target,
            session_name,
            detached,
            attach_existing,
        } => load_layout(&settings, &target, session_name, detached, attach_existing).await,
        Command::Freeze {
            session,
            output,
            format,
        } => freeze_session(&settings, session, output.as_deref(), format).await,
        Command::Completions { shell } => {
            print!("{}", completion::script(shell, "tmuxp"));
            Ok(())
        }
        Command::Complete { words } => {
            let (globals, _) = completion::split_globals(&words);
            let settings = settings.with_globals(&globals);
            let client = settings.client();
            for candidate in completion::complete(&words, &client, &settings.config_dir).await {
                println!("{}", candidate);
            }
            Ok(())
        }
    }
}

/// `RUST_LOG` decides unless `-v` was given; with neither, warnings only
fn log_filter(verbose: u8, rust_log: Option<&str>) -> EnvFilter {
    let filter = EnvFilter::new(rust_log.unwrap_or_default());
    let level = match verbose {
        0 if rust_log.is_some() => return filter,
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    filter.add_directive(level.into())
}

async fn load_layout(
    settings: &Settings,
    target: &str,
    session_name: Option<String>,
    detached: bool,
    attach_existing: bool,
) -> Result<()> {
    let path = config::find_layout(target, &settings.config_dir)?;
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("/"));
    tracing::debug!(layout = %path.display(), "loading layout");

    let raw = config::load_file(&path)?;
    let mut spec = config::expand(raw, base_dir)
        .with_context(|| format!("invalid layout {}", path.display()))?;
    if let Some(name) = session_name {
        spec.name = name;
    }
    let spec = config::validate(spec).with_context(|| format!("invalid layout {}", path.display()))?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let policy = if attach_existing {
        ExistingSession::Attach
    } else {
        ExistingSession::Fail
    };
    let builder = WorkspaceBuilder::new(settings.client())
        .existing_session(policy)
        .cancel_token(cancel);
    let handle = builder.apply(&spec, spec.name()).await?;
    report(&handle);

    if detached {
        return Ok(());
    }
    attach(settings, &builder, &handle.name).await
}

fn report(handle: &SessionHandle) {
    if handle.attached_existing {
        eprintln!("Session '{}' already running", handle.name);
        return;
    }
    for window in &handle.windows {
        for pane in &window.panes {
            for outcome in &pane.outcomes {
                tracing::debug!(
                    session = %handle.session_id,
                    window = window.name.as_deref().unwrap_or(&window.id),
                    pane = %pane.id,
                    command = outcome.action.command(),
                    status = ?outcome.status,
                    "pane command"
                );
            }
        }
    }
    if let Some(focused) = handle.windows.get(handle.focused_window) {
        tracing::debug!(window = %focused.id, "focused window");
    }
    eprintln!(
        "Session '{}' ready: {} windows, {} panes",
        handle.name,
        handle.windows.len(),
        handle.pane_count()
    );
}

/// Switch to the session when already inside tmux, otherwise attach the
/// terminal to it and wait for the client to detach.
async fn attach(
    settings: &Settings,
    builder: &WorkspaceBuilder<tmux::TmuxExecutor>,
    session: &str,
) -> Result<()> {
    if std::env::var_os("TMUX").is_some() {
        builder
            .client()
            .switch_client(session)
            .await
            .with_context(|| format!("failed to switch to {}", session))?;
        return Ok(());
    }

    let args = tmux::attach_args(session);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let cmd = settings.executor().command_line(&args);
    let status = std::process::Command::new(&cmd[0])
        .args(&cmd[1..])
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to run {}", cmd[0]))?;
    if !status.success() {
        bail!("attach to {} exited with {}", session, status);
    }
    Ok(())
}

async fn freeze_session(
    settings: &Settings,
    session: Option<String>,
    output: Option<&Path>,
    format: Format,
) -> Result<()> {
    let client = settings.client();
    let session = match session {
        Some(name) => name,
        None => match client.current_session().await? {
            Some(name) => name,
            None => bail!("no session given and not running inside tmux"),
        },
    };

    let raw = freeze::freeze(&client, &session)
        .await
        .with_context(|| format!("failed to freeze {}", session))?;
    let text = config::to_string(&raw, format)?;

    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Saved session '{}' to {}", session, path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}
