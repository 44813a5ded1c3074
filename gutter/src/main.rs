//! gutter: annotate a git diff in the terminal and print the comments as a
//! review prompt.
//!
//! # Startup sequence
//!
//! 1. Parse the command line; `gutter config --path` exits here.
//! 2. Tracing to the state-dir log file (never the terminal).
//! 3. Config and theme; read-only, safe before terminal init.
//! 4. Panic hook, SIGTERM flag, then `init_tui()`.
//! 5. Event task, git worker, app state, first diff request.
//!
//! The loop exits only through `break`, so `restore_tui()` always runs before
//! the prompt is printed to stdout.

mod app;
mod config;
mod event;
mod git;
mod theme;
mod tui;
mod ui;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gutter_core::prompt::generate_prompt;
use gutter_core::DiffSession;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::event::AppEvent;
use crate::ui::keybindings::{handle_key, handle_mouse, KeyAction};

#[derive(Debug, Parser)]
#[command(version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Any directory inside the repository to review.
    #[arg(default_value = ".")]
    path: String,

    #[command(flatten)]
    session: SessionArgs,
}

/// Which comparison to open. Without a flag: working tree against the index.
#[derive(Debug, Args)]
#[group(multiple = false)]
struct SessionArgs {
    /// Index against HEAD.
    #[arg(long)]
    staged: bool,

    /// Working tree against HEAD.
    #[arg(long)]
    head: bool,

    /// A commit against its parent.
    #[arg(long, value_name = "REV")]
    commit: Option<String>,

    /// Two revisions.
    #[arg(long, value_name = "A..B", value_parser = parse_range)]
    range: Option<DiffSession>,

    /// A branch against its merge-base with main.
    #[arg(long, value_name = "NAME")]
    branch: Option<String>,
}

impl SessionArgs {
    fn into_session(self) -> DiffSession {
        if self.staged {
            DiffSession::Staged
        } else if self.head {
            DiffSession::Head
        } else if let Some(hash) = self.commit {
            DiffSession::Commit { hash }
        } else if let Some(range) = self.range {
            range
        } else if let Some(name) = self.branch {
            DiffSession::Branch { name }
        } else {
            DiffSession::Unstaged
        }
    }
}

fn parse_range(raw: &str) -> Result<DiffSession, String> {
    match raw.split_once("..") {
        Some((from, to)) if !from.is_empty() && !to.is_empty() && !to.starts_with('.') => {
            Ok(DiffSession::Range { from: from.to_owned(), to: to.to_owned() })
        }
        _ => Err(format!("expected FROM..TO, got `{raw}`")),
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect the configuration.
    Config {
        /// Print where the config file is read from.
        #[arg(long)]
        path: bool,
    },
}

/// Routes `tracing` output to `path`, filtered by `GUTTER_LOG` (default
/// `info`).
fn init_tracing(path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    let filter = EnvFilter::try_from_env("GUTTER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("installing the tracing subscriber")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(Command::Config { path }) = cli.command {
        if path {
            println!("{}", config::config_path().display());
        } else {
            println!("{:#?}", config::Config::load(&config::config_path()));
        }
        return Ok(());
    }

    init_tracing(&config::log_path())?;
    let config = config::Config::load(&config::config_path());
    let theme = theme::Theme::from_name(&config.theme);
    let session = cli.session.into_session();
    info!(path = %cli.path, session = %session.label(), "starting");

    tui::install_panic_hook();
    let term_flag = tui::register_sigterm();
    let mut terminal = tui::init_tui().context("initialising the terminal")?;

    let handler = event::EventHandler::new();
    event::spawn_event_task(handler.tx.clone());
    let mut rx = handler.rx;

    let git = match git::GitProvider::spawn(cli.path.clone(), handler.tx.clone()) {
        Ok(git) => git,
        Err(err) => {
            tui::restore_tui()?;
            return Err(err).context("starting the git worker");
        }
    };
    let mut state = app::AppState::new(&config, session, git, handler.tx.clone());
    state.request_diff();

    let mut result = Ok(());
    'event_loop: loop {
        tokio::select! {
            // Heartbeat so SIGTERM is noticed even when no events arrive.
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break 'event_loop };
                match event {
                    AppEvent::Render => {
                        if let Err(err) = terminal.draw(|frame| ui::render(frame, &mut state, &theme)) {
                            result = Err(err).context("drawing a frame");
                            break 'event_loop;
                        }
                    }
                    AppEvent::Key(key) => {
                        if handle_key(key, &mut state) == KeyAction::Quit {
                            break 'event_loop;
                        }
                    }
                    AppEvent::Mouse(mouse) => {
                        handle_mouse(mouse, &mut state);
                    }
                    AppEvent::Resize(_, _) => {}
                    AppEvent::Tick => state.tick(Instant::now()),
                    AppEvent::DiffLoaded(payload) => state.apply_diff(*payload),
                    AppEvent::Expanded { file, result } => state.apply_expansion(&file, result),
                    AppEvent::FileLoaded { path, result } => state.apply_file(path, result),
                }
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    tui::restore_tui()?;
    result?;

    let prompt = generate_prompt(state.anchors.comments());
    if prompt.is_empty() {
        info!("exiting without comments");
    } else {
        info!(comments = state.anchors.len(), "printing review prompt");
        println!("{prompt}");
    }
    if state.anchors.draft().is_some_and(|d| !d.text.trim().is_empty()) {
        warn!("unsaved comment draft discarded on exit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_flags_pick_the_comparison() {
        let cli = Cli::parse_from(["gutter", "--range", "v1.0..HEAD"]);
        assert_eq!(
            cli.session.into_session(),
            DiffSession::Range { from: "v1.0".into(), to: "HEAD".into() }
        );
        let cli = Cli::parse_from(["gutter", "repo", "--branch", "feature"]);
        assert_eq!(cli.path, "repo");
        assert_eq!(cli.session.into_session(), DiffSession::Branch { name: "feature".into() });
        assert_eq!(Cli::parse_from(["gutter"]).session.into_session(), DiffSession::Unstaged);
    }

    #[test]
    fn conflicting_or_malformed_sessions_are_rejected() {
        assert!(Cli::try_parse_from(["gutter", "--staged", "--head"]).is_err());
        assert!(Cli::try_parse_from(["gutter", "--range", "main"]).is_err());
        assert!(parse_range("a...b").is_err());
    }

    #[test]
    fn config_subcommand_parses() {
        let cli = Cli::parse_from(["gutter", "config", "--path"]);
        assert!(matches!(cli.command, Some(Command::Config { path: true })));
    }
}
