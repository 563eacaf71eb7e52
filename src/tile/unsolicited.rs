use tracing::warn;

use crate::core::Result;
use crate::session::{ResponseMatcher, Session};
use crate::transport::Transport;
use super::client::{ack_of, decode_response};

/// An unsolicited report mode switched on for the lifetime of the guard.
///
/// The mode is switched off by [`Unsolicited::finish`], or on drop if the
/// guard is abandoned early (e.g. by `?`), so the modem is never left
/// emitting reports after a failed exchange.
pub struct Unsolicited<'a, T: Transport> {
    session: &'a mut Session<T>,
    tag: &'static str,
    active: bool,
}

impl<'a, T: Transport> Unsolicited<'a, T> {
    /// Sends `<tag> 1` and waits for `<tag> OK`
    pub fn enable(session: &'a mut Session<T>, tag: &'static str) -> Result<Self> {
        let mut guard = Unsolicited {
            session,
            tag,
            active: true,
        };
        guard.switch("1")?;
        Ok(guard)
    }

    /// Sends `<tag> @` to request a report now
    pub fn query<M>(&mut self, expect: &M) -> Result<String>
    where
        M: ResponseMatcher + ?Sized,
    {
        self.session.write_and_expect(&format!("{} @", self.tag), expect)
    }

    /// Switches the mode off, reporting any failure
    pub fn finish(mut self) -> Result<()> {
        self.active = false;
        self.disable()
    }

    fn disable(&mut self) -> Result<()> {
        self.switch("0")
    }

    fn switch(&mut self, mode: &str) -> Result<()> {
        let line = self
            .session
            .write_and_expect(&format!("{} {}", self.tag, mode), &ack_of(self.tag))?;
        decode_response(&line, self.tag).map(|_| ())
    }
}

impl<T: Transport> Drop for Unsolicited<'_, T> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            if let Err(e) = self.disable() {
                warn!(tag = self.tag, error = %e, "Failed to disable unsolicited reports");
            }
        }
    }
}
