//! Event bus for gutter.
//!
//! Terminal input, timer ticks and background results are normalised into a
//! single `AppEvent` enum and sent over a tokio unbounded MPSC channel. The
//! main loop receives from this channel and dispatches accordingly.
//!
//! Two independent intervals drive the render and logic cycles:
//! - **Render interval** (33 ms ≈ 30 FPS) triggers a `terminal.draw()` call.
//! - **Tick interval** (50 ms) drives the search re-scan debounce.

use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use gutter_core::{ExpandError, Hunk, SourceError};
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::git::types::DiffPayload;

/// All events the application can receive from any source.
///
/// Results of background work carry their own identity (the session of a
/// diff, the file of an expansion) so the main loop can drop the ones that
/// arrive after the user has moved on.
#[derive(Debug)]
pub enum AppEvent {
    /// A key press from the terminal (`KeyEventKind::Press` only).
    ///
    /// Release and repeat events are filtered in [`spawn_event_task`]; some
    /// platforms report both a press and a release for every keystroke.
    Key(KeyEvent),
    /// A mouse event: presses and releases drive gutter selection, drags
    /// extend it, and the wheel scrolls.
    Mouse(MouseEvent),
    /// Terminal was resized to (columns, rows). The next `Render` picks up
    /// the new size; nothing else needs to happen.
    Resize(u16, u16),
    /// Logic tick (50 ms): fires a due search debounce.
    Tick,
    /// Render tick (≈30 FPS / 33 ms): triggers a `terminal.draw()` call.
    Render,
    /// A diff load finished on the git thread, successfully or not.
    DiffLoaded(Box<DiffPayload>),
    /// A context expansion finished. `Err(StaleSession)` means the session
    /// changed while the source was being fetched.
    Expanded {
        file: String,
        result: Result<Vec<Hunk>, ExpandError>,
    },
    /// Working-copy text for the flat file viewer.
    FileLoaded {
        path: String,
        result: Result<String, SourceError>,
    },
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender is cloned into the input task, the git worker and every
/// spawned expansion; the receiver is owned by the main loop.
pub struct EventHandler {
    /// Send half; clone this for each background task that produces events.
    pub tx: mpsc::UnboundedSender<AppEvent>,
    /// Receive half; the main loop awaits `.recv()` on it.
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    /// Creates a handler over a fresh unbounded channel.
    ///
    /// Producers are bounded by input and timer rates plus one result per
    /// request, and the main loop drains every event, so no backpressure is
    /// needed.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the task that feeds terminal input and timer ticks into `tx`.
///
/// The task ends on its own once the receiver is dropped. `reader.next()` is
/// fused so a terminated crossterm stream is never polled again.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(50));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let tick_tick = tick_interval.tick();
            let render_tick = render_interval.tick();
            let crossterm_event = reader.next().fuse();

            let sent = tokio::select! {
                _ = tick_tick => tx.send(AppEvent::Tick),
                _ = render_tick => tx.send(AppEvent::Render),
                maybe_event = crossterm_event => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        tx.send(AppEvent::Key(key))
                    }
                    Some(Ok(Event::Resize(w, h))) => tx.send(AppEvent::Resize(w, h)),
                    Some(Ok(Event::Mouse(mouse))) => tx.send(AppEvent::Mouse(mouse)),
                    _ => Ok(()),
                },
            };
            if sent.is_err() {
                break;
            }
        }
    });
}
