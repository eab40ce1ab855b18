//! Bridges the real terminal onto search loop events.

use cityweather_core::search::{Event, Key};
use console::Term;
use std::{
    sync::mpsc::{self, SyncSender},
    thread,
    time::Duration,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

const RESIZE_POLL: Duration = Duration::from_millis(250);

/// Map a console key onto the loop's key set. Keys the loop has no use for
/// are dropped here.
pub fn map_key(key: console::Key) -> Option<Key> {
    match key {
        console::Key::CtrlC | console::Key::Char('\u{3}') => Some(Key::CtrlC),
        console::Key::Enter => Some(Key::Enter),
        console::Key::Escape => Some(Key::Esc),
        console::Key::Backspace => Some(Key::Backspace),
        console::Key::ArrowUp => Some(Key::Up),
        console::Key::ArrowDown => Some(Key::Down),
        console::Key::Char(c) if !c.is_control() => Some(Key::Char(c)),
        _ => None,
    }
}

/// Opened by the view after each frame. The key reader only starts a new
/// read once it is open, so no raw-mode read is left pending when the loop
/// quits without drawing again.
pub struct KeyGate(SyncSender<()>);

impl KeyGate {
    pub fn open(&self) {
        let _ = self.0.try_send(());
    }
}

/// Blocking key reads on a plain thread. The thread ends when the gate is
/// dropped, the loop is gone, or a read fails.
pub fn spawn_key_reader(term: Term, events: UnboundedSender<Event>) -> KeyGate {
    let (gate, opened) = mpsc::sync_channel(1);

    thread::spawn(move || {
        while opened.recv().is_ok() {
            let Some(key) = next_key(&term) else {
                let _ = events.send(Event::Key(Key::CtrlC));
                break;
            };
            // Frames drawn during the read say nothing about this key.
            while opened.try_recv().is_ok() {}
            if events.send(Event::Key(key)).is_err() {
                break;
            }
        }
        debug!("key reader stopped");
    });

    KeyGate(gate)
}

fn next_key(term: &Term) -> Option<Key> {
    loop {
        match term.read_key() {
            Ok(key) => {
                if let Some(key) = map_key(key) {
                    return Some(key);
                }
            }
            Err(err) => {
                warn!(error = %err, "terminal read failed");
                return None;
            }
        }
    }
}

/// Reports the initial size, then every change.
pub fn spawn_resize_watcher(term: Term, events: UnboundedSender<Event>) {
    tokio::spawn(async move {
        let mut last = None;
        let mut ticker = tokio::time::interval(RESIZE_POLL);
        loop {
            ticker.tick().await;
            let (height, width) = term.size();
            if last == Some((width, height)) {
                continue;
            }
            last = Some((width, height));
            if events.send(Event::Resize { width, height }).is_err() {
                break;
            }
        }
    });
}

/// Restores the cursor when dropped, however the screen is left.
pub struct CursorGuard {
    term: Term,
}

impl CursorGuard {
    pub fn hide(term: Term) -> Self {
        let _ = term.hide_cursor();
        Self { term }
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        let _ = self.term.show_cursor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_keys_pass_through() {
        assert_eq!(map_key(console::Key::Char('/')), Some(Key::Char('/')));
        assert_eq!(map_key(console::Key::Char('é')), Some(Key::Char('é')));
    }

    #[test]
    fn control_keys_are_mapped() {
        assert_eq!(map_key(console::Key::Escape), Some(Key::Esc));
        assert_eq!(map_key(console::Key::ArrowDown), Some(Key::Down));
        assert_eq!(map_key(console::Key::Char('\u{3}')), Some(Key::CtrlC));
        assert_eq!(map_key(console::Key::CtrlC), Some(Key::CtrlC));
    }

    #[test]
    fn unused_keys_are_dropped() {
        assert_eq!(map_key(console::Key::Tab), None);
        assert_eq!(map_key(console::Key::Char('\u{7}')), None);
    }
}
