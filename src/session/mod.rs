//! Command/response session over a [`Transport`]
//!
//! The modem interleaves unsolicited status lines with command replies in
//! no fixed order, so a reply is found by scanning every line read until
//! one contains the expected text. Reads are bounded by a retry budget
//! rather than true cancellation.
//!
//! A session serves one command at a time. Share it between tasks through
//! [`crate::tile::TileHandle`], which serializes access.

mod clock;
mod transcript;

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::core::{Error, Result, SessionConfig};
use crate::protocol::{codec, decode_line, split_overlap, Sentence};
use crate::transport::Transport;

pub use self::clock::{Clock, SystemClock};
pub use self::transcript::{Direction, TracingTranscript, Transcript, TranscriptEntry};

#[cfg(test)]
pub(crate) use self::clock::ManualClock;

/// Decides whether a received line is the awaited response.
///
/// Text matches by substring, the modem's own convention; closures allow
/// stricter rules without touching the session.
pub trait ResponseMatcher {
    fn matches(&self, line: &str) -> bool;

    /// Short description used in timeout errors
    fn describe(&self) -> String;
}

impl ResponseMatcher for str {
    fn matches(&self, line: &str) -> bool {
        line.contains(self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl ResponseMatcher for String {
    fn matches(&self, line: &str) -> bool {
        line.contains(self.as_str())
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

impl<F> ResponseMatcher for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, line: &str) -> bool {
        self(line)
    }

    fn describe(&self) -> String {
        "<predicate>".to_string()
    }
}

/// Exclusive owner of a transport and its read/retry policy
pub struct Session<T> {
    transport: T,
    config: SessionConfig,
    clock: Box<dyn Clock>,
    transcript: Box<dyn Transcript>,
}

impl<T: Transport> Session<T> {
    /// Creates a session using the wall clock and the tracing transcript
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Session {
            transport,
            config,
            clock: Box::new(SystemClock),
            transcript: Box::new(TracingTranscript),
        }
    }

    /// Replaces the clock used for retry pauses and read windows
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replaces the transcript hook
    pub fn with_transcript(mut self, transcript: impl Transcript + 'static) -> Self {
        self.transcript = Box::new(transcript);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Releases the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Frames and writes one command without waiting for anything
    pub fn write(&mut self, command: &str) -> Result<()> {
        let frame = codec::encode(command);
        self.transport.write_all(&frame)?;
        let text = String::from_utf8_lossy(&frame);
        debug!(command = text.trim_end(), "Sent");
        self.record(Direction::Sent, text.trim_end());
        Ok(())
    }

    /// Writes an unframed console line, e.g. the eval kit's `@show solar`
    pub fn write_raw(&mut self, line: &str) -> Result<()> {
        let mut buf = bytes::BytesMut::with_capacity(line.len() + 1);
        codec::encode_raw(line, &mut buf);
        self.transport.write_all(&buf)?;
        debug!(line, "Sent raw");
        self.record(Direction::Sent, line);
        Ok(())
    }

    /// Adds an informational note to the transcript
    pub fn note(&mut self, text: &str) {
        self.record(Direction::Info, text);
    }

    /// Writes a command and waits for a line matching `expect`, using the
    /// configured retry budget
    pub fn write_and_expect<M>(&mut self, command: &str, expect: &M) -> Result<String>
    where
        M: ResponseMatcher + ?Sized,
    {
        let (retries, delay) = (self.config.max_retries, self.config.retry_delay);
        self.write_and_expect_with(command, expect, retries, delay)
    }

    /// [`Session::write_and_expect`] with an explicit retry budget
    pub fn write_and_expect_with<M>(
        &mut self,
        command: &str,
        expect: &M,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<String>
    where
        M: ResponseMatcher + ?Sized,
    {
        self.write(command)?;
        self.read_expectantly(expect, max_retries, retry_delay)
    }

    /// Reads until a line matches `expect`.
    ///
    /// Each attempt makes one blocking read, then drains whatever is
    /// already buffered. Attempts after the first are preceded by
    /// `retry_delay`. After `max_retries + 1` attempts without a match the
    /// call fails with [`Error::Timeout`] carrying every line seen.
    pub fn read_expectantly<M>(
        &mut self,
        expect: &M,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<String>
    where
        M: ResponseMatcher + ?Sized,
    {
        let line_timeout = self.config.line_timeout;
        let mut seen = Vec::new();

        for attempt in 0..=max_retries {
            if attempt > 0 {
                warn!(attempt, expect = %expect.describe(), "Read retry");
                self.note(&format!("Read Retry #{}", attempt));
                self.clock.sleep(retry_delay);
            }

            if let Some(line) = self.read_line(line_timeout)? {
                if expect.matches(&line) {
                    return Ok(line);
                }
                seen.push(line);
            }

            while self.transport.bytes_available()? {
                match self.read_line(line_timeout)? {
                    Some(line) if expect.matches(&line) => return Ok(line),
                    Some(line) => seen.push(line),
                    None => break,
                }
            }
        }

        Err(Error::timeout(expect.describe(), seen))
    }

    /// Passively decodes sentences for `duration`.
    ///
    /// Power rail lines and unreadable frames are skipped; a sentence glued
    /// to the end of a power line is still yielded. A transport error ends
    /// the sequence after being yielded once.
    pub fn read_monitor(&mut self, duration: Duration) -> Monitor<'_, T> {
        let deadline = self.clock.now() + duration;
        Monitor {
            session: self,
            deadline,
            done: false,
        }
    }

    /// Collects every raw line received during `duration`
    pub fn capture(&mut self, duration: Duration) -> Result<Vec<String>> {
        let deadline = self.clock.now() + duration;
        let mut lines = Vec::new();
        while let Some(timeout) = self.remaining(deadline) {
            if let Some(line) = self.read_line(timeout)? {
                lines.push(line);
            }
        }
        Ok(lines)
    }

    fn remaining(&self, deadline: Instant) -> Option<Duration> {
        let now = self.clock.now();
        if now >= deadline {
            None
        } else {
            Some((deadline - now).min(self.config.line_timeout))
        }
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let Some(raw) = self.transport.read_line(timeout)? else {
            return Ok(None);
        };
        let line = String::from_utf8_lossy(&raw).trim_end().to_string();
        trace!(line = %line, "Received");
        self.record(Direction::Received, &line);
        Ok(Some(line))
    }

    fn record(&mut self, direction: Direction, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.transcript.record(&TranscriptEntry {
            at: Utc::now(),
            direction,
            text: text.to_string(),
        });
    }
}

/// Finite sequence of sentences read during a monitor window
pub struct Monitor<'a, T> {
    session: &'a mut Session<T>,
    deadline: Instant,
    done: bool,
}

impl<T: Transport> Iterator for Monitor<'_, T> {
    type Item = Result<Sentence>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(timeout) = self.session.remaining(self.deadline) else {
                self.done = true;
                break;
            };

            let line = match self.session.read_line(timeout) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let (head, tail) = split_overlap(&line);
            let text = if head.starts_with('$') {
                head
            } else if let Some(tail) = tail {
                tail
            } else {
                trace!(line = %line, "Skipping console line");
                continue;
            };

            match decode_line(text.as_bytes()) {
                Ok(sentence) => return Some(Ok(sentence)),
                Err(e) => debug!(line = text, error = %e, "Dropping unreadable sentence"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::ScriptedTransport;
    use std::sync::{Arc, Mutex};

    fn session(transport: &ScriptedTransport, clock: &ManualClock) -> Session<ScriptedTransport> {
        Session::new(transport.clone(), SessionConfig::default()).with_clock(clock.clone())
    }

    #[test]
    fn test_write_exact_bytes() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new();
        let mut session = session(&transport, &clock);

        session.write("$DT 1").unwrap();
        session.write_raw("@show solar").unwrap();
        assert_eq!(transport.written(), vec!["$DT 1*01", "@show solar"]);
    }

    #[test]
    fn test_match_after_unsolicited_line() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new().reply("$DT 1", &["$GN 1,2,3,4,5*00", "$DT OK*11"]);
        let mut session = session(&transport, &clock);

        let line = session.write_and_expect("$DT 1", "$DT OK").unwrap();
        assert_eq!(line, "$DT OK*11");
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_first_line_match_leaves_rest_buffered() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new().reply("$FV", &["$FV 1.0*00", "$RT RSSI=-88*2d"]);
        let mut session = session(&transport, &clock);

        session.write_and_expect("$FV", "$FV ").unwrap();
        assert_eq!(transport.reads(), 1);
    }

    #[test]
    fn test_timeout_after_exact_attempts() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new()
            .with_clock(clock.clone())
            .reply("$DT 1", &["$RT RSSI=-88*2d"]);
        let mut session = session(&transport, &clock);

        let err = session
            .write_and_expect_with("$DT 1", "$DT OK", 3, Duration::from_millis(200))
            .unwrap_err();

        match err {
            Error::Timeout { expect, lines } => {
                assert_eq!(expect, "$DT OK");
                assert_eq!(lines, vec!["$RT RSSI=-88*2d"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(transport.reads(), 4);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(200); 3]);
    }

    #[test]
    fn test_zero_retries_reads_once() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new().with_clock(clock.clone());
        let mut session = session(&transport, &clock);

        let err = session.read_expectantly("$MM ", 0, Duration::from_millis(200)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(transport.reads(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_late_reply_found_on_retry() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new().with_clock(clock.clone());
        let mut session = session(&transport, &clock);

        session.write("$GS @").unwrap();
        assert!(session.read_expectantly("$GS ", 0, Duration::ZERO).is_err());

        let transport = transport.preload(&["$GS 109,214,12,0,G3*7C"]);
        let line = session.read_expectantly("$GS ", 2, Duration::from_millis(10)).unwrap();
        assert_eq!(line, "$GS 109,214,12,0,G3*7C");
        assert_eq!(transport.reads(), 2);
    }

    #[test]
    fn test_predicate_matcher() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new().reply("$DT @", &["$DT OK*34", "$DT 20210909102029,V*43"]);
        let mut session = session(&transport, &clock);

        let is_stamp = |line: &str| line.starts_with("$DT ") && line.contains(',');
        let line = session.write_and_expect("$DT @", &is_stamp).unwrap();
        assert_eq!(line, "$DT 20210909102029,V*43");
    }

    #[test]
    fn test_transport_error_propagates() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new();
        transport.fail_writes();
        let mut session = session(&transport, &clock);

        let err = session.write_and_expect("$FV", "$FV ").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_transcript_records_directions() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new()
            .with_clock(clock.clone())
            .reply("$MM", &["", "$MM 7*17"]);
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let mut session = session(&transport, &clock).with_transcript(move |e: &TranscriptEntry| {
            sink.lock().unwrap().push((e.direction, e.text.clone()));
        });

        session.write_and_expect("$MM C=U", "$MM ").unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (Direction::Sent, "$MM C=U*0B".to_string()),
                (Direction::Received, "$MM 7*17".to_string()),
            ]
        );
    }

    #[test]
    fn test_monitor_window() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new().with_clock(clock.clone()).preload(&[
            "$RT RSSI=-88*2d",
            "SOL: 1.128V 0.0A$DT 20210909102029,V*43",
            "BAT: 3.992V 0.156A",
            "$GN 1,2,3,4,5*00",
            "$GS 109,214,12,0,G3*7C",
        ]);
        let mut session = session(&transport, &clock);

        let tags: Vec<String> = session
            .read_monitor(Duration::from_secs(10))
            .map(|s| s.unwrap().tag)
            .collect();
        assert_eq!(tags, vec!["$RT", "$DT", "$GS"]);
        // five lines, then empty reads of 2 s each until the window closes
        assert_eq!(transport.reads(), 10);
    }

    #[test]
    fn test_capture_collects_raw_lines() {
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new()
            .with_clock(clock.clone())
            .preload(&["SOL: 1.128V 0.0A", "$RT RSSI=-88*2d"]);
        let mut session = session(&transport, &clock);

        let lines = session.capture(Duration::from_secs(1)).unwrap();
        assert_eq!(lines, vec!["SOL: 1.128V 0.0A", "$RT RSSI=-88*2d"]);
    }
}
