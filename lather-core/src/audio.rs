//! Sound output.
//!
//! The app plays a completion sound through an [`AudioSink`]. The sink
//! receives the `src` of the `<audio>` element's source; what it does with
//! it is up to the embedding.

use std::cell::RefCell;
use std::io::Write;

use tracing::{info, warn};

/// Something that can play a sound.
pub trait AudioSink {
    fn play(&self, source: &str);
}

/// Discards every sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, _source: &str) {}
}

/// Rings the terminal bell.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl AudioSink for TerminalBell {
    fn play(&self, source: &str) {
        info!(source, "ringing terminal bell");
        let mut stdout = std::io::stdout().lock();
        if let Err(err) = stdout.write_all(b"\x07").and_then(|()| stdout.flush()) {
            warn!(%err, "could not ring the terminal bell");
        }
    }
}

/// Remembers what it was asked to play.
#[derive(Debug, Default)]
pub struct RecordingSink {
    played: RefCell<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.borrow().clone()
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, source: &str) {
        self.played.borrow_mut().push(source.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.play("a.wav");
        sink.play("b.wav");
        assert_eq!(sink.played(), vec!["a.wav", "b.wav"]);
    }
}
