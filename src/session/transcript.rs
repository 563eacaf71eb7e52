use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::trace;

/// Which way a transcript line travelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
    /// Session notes such as connects and retries
    Info,
}

impl Direction {
    pub fn symbol(&self) -> char {
        match self {
            Direction::Sent => '>',
            Direction::Received => '<',
            Direction::Info => '#',
        }
    }
}

/// One line of the session transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub at: DateTime<Utc>,
    pub direction: Direction,
    pub text: String,
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = self.direction.symbol();
        write!(
            f,
            "{} {}{}{} {}",
            self.at.to_rfc3339_opts(SecondsFormat::Micros, true),
            symbol,
            symbol,
            symbol,
            self.text
        )
    }
}

/// Receives every non-blank line sent or received by a session
pub trait Transcript: Send {
    fn record(&mut self, entry: &TranscriptEntry);
}

impl<F> Transcript for F
where
    F: FnMut(&TranscriptEntry) + Send,
{
    fn record(&mut self, entry: &TranscriptEntry) {
        self(entry)
    }
}

/// Default transcript: one `trace!` event per line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTranscript;

impl Transcript for TracingTranscript {
    fn record(&mut self, entry: &TranscriptEntry) {
        trace!(direction = %entry.direction.symbol(), "{}", entry.text);
    }
}
