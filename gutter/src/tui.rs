//! Terminal lifecycle.
//!
//! The TUI draws on stderr. Stdout stays clean for the review prompt printed
//! on exit, so `gutter | pbcopy` or `gutter > review.md` capture only the
//! prompt.

use std::io::{stderr, BufWriter, Stderr};
use std::panic;
use std::sync::{atomic::AtomicBool, Arc};

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use signal_hook::consts::SIGTERM;
use signal_hook::flag::register;

/// The terminal gutter draws on: crossterm over a buffered stderr writer.
///
/// The buffer batches each frame's escape sequences into a few write(2)
/// calls, which keeps the 30 FPS redraw from flickering.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Puts the terminal into TUI mode.
///
/// Enables raw mode, enters the alternate screen and turns on mouse capture,
/// which the gutter drag and double-click handling depend on. Pair with
/// [`restore_tui`] on every exit path.
///
/// # Errors
///
/// Returns `Err` if raw mode cannot be enabled, the escape sequences cannot
/// be written, or `Terminal::new` fails to query the terminal size.
pub fn init_tui() -> std::io::Result<Tui> {
    let mut out = BufWriter::new(stderr());
    enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(out))
}

/// Returns the terminal to its pre-TUI state.
///
/// Disables raw mode, leaves the alternate screen and releases the mouse.
/// Idempotent. It has to run on every exit path, the panic hook included,
/// because ratatui does not restore the terminal on `Drop`. It must also run
/// before the review prompt is printed, or the prompt lands on the
/// alternate screen and vanishes.
///
/// # Errors
///
/// Returns `Err` if raw mode cannot be disabled or the escape sequences
/// cannot be written. The panic hook ignores the error.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    execute!(stderr(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Installs a panic hook that restores the terminal first.
///
/// Must be called before [`init_tui`]. The previous hook (the default
/// printer, or the test harness's) still runs afterwards, now on a usable
/// terminal. Without it a panic leaves raw mode and the alternate screen on,
/// and the message is never seen.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Best effort: we are already panicking.
        let _ = restore_tui();
        original_hook(panic_info);
    }));
}

/// Registers a SIGTERM handler that flips an `AtomicBool`.
///
/// The returned flag goes from `false` to `true` when the process receives
/// SIGTERM. The main loop polls it on every event and on a 50 ms heartbeat,
/// then leaves through the normal exit path so the terminal is restored and
/// collected comments are still printed.
///
/// # Panics
///
/// Panics if the OS refuses to register the signal handler, which is treated
/// as a fatal initialisation error.
pub fn register_sigterm() -> Arc<AtomicBool> {
    let term = Arc::new(AtomicBool::new(false));
    register(SIGTERM, Arc::clone(&term)).expect("Failed to register SIGTERM handler");
    term
}
