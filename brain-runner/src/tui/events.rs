use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent};

/// Events that the TUI event loop processes. Snapshot updates arrive
/// separately through the runner's watch channel.
#[derive(Debug)]
pub enum TuiEvent {
    /// Keyboard input event
    Key(KeyEvent),
    /// 1-second tick for elapsed time updates
    Tick,
}

/// Manages the two event sources: keyboard and tick timer.
pub struct EventHandler {
    rx: mpsc::Receiver<TuiEvent>,
    _keyboard_handle: std::thread::JoinHandle<()>,
    _tick_handle: std::thread::JoinHandle<()>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        // Keyboard event thread
        let tx_key = tx.clone();
        let keyboard_handle = std::thread::spawn(move || loop {
            if event::poll(Duration::from_millis(100)).unwrap_or(false) {
                if let Ok(Event::Key(key)) = event::read() {
                    if tx_key.send(TuiEvent::Key(key)).is_err() {
                        break;
                    }
                }
            }
        });

        // Tick timer thread (1 second interval)
        let tx_tick = tx.clone();
        let tick_handle = std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));
            if tx_tick.send(TuiEvent::Tick).is_err() {
                break;
            }
        });

        Self {
            rx,
            _keyboard_handle: keyboard_handle,
            _tick_handle: tick_handle,
        }
    }

    /// Try to receive the next event, blocking up to the given timeout.
    pub fn next(&self, timeout: Duration) -> Option<TuiEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
