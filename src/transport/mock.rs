//! Scripted in-memory transport for tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use crate::core::{Error, Result};
use crate::session::ManualClock;
use super::Transport;

#[derive(Default)]
struct State {
    incoming: VecDeque<String>,
    /// (written line prefix, lines queued when it is written)
    replies: VecDeque<(String, Vec<String>)>,
    written: Vec<String>,
    reads: usize,
    fail_writes: bool,
}

/// Replays lines and records writes. Clones share the same script, so a
/// test keeps one clone to inspect after moving the other into a session.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    state: Arc<Mutex<State>>,
    clock: Option<ManualClock>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timed-out reads advance this clock by their timeout
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Lines already waiting before anything is written
    pub fn preload(self, lines: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .incoming
            .extend(lines.iter().map(|l| l.to_string()));
        self
    }

    /// Queues `lines` the first time a line starting with `prefix` is written
    pub fn reply(self, prefix: &str, lines: &[&str]) -> Self {
        self.state.lock().unwrap().replies.push_back((
            prefix.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        ));
        self
    }

    /// Makes every later write fail like a dropped connection
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    pub fn written(&self) -> Vec<String> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Error::transport("broken pipe"));
        }
        let text = String::from_utf8_lossy(bytes).trim_end().to_string();
        if let Some(idx) = state.replies.iter().position(|(p, _)| text.starts_with(p.as_str())) {
            if let Some((_, lines)) = state.replies.remove(idx) {
                state.incoming.extend(lines);
            }
        }
        state.written.push(text);
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        match state.incoming.pop_front() {
            Some(line) => Ok(Some(Bytes::from(line))),
            None => {
                if let Some(clock) = &self.clock {
                    clock.advance(timeout);
                }
                Ok(None)
            }
        }
    }

    fn bytes_available(&mut self) -> Result<bool> {
        Ok(!self.state.lock().unwrap().incoming.is_empty())
    }
}
