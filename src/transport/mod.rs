//! Byte stream transports
//!
//! The session only needs three things from the link to the modem: write
//! bytes, read one line within a timeout, and tell whether more data is
//! already waiting. Serial ports and the eval kit's telnet socket both
//! provide that through [`StreamTransport`].

mod serial;
mod tcp;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::core::{Error, Result};
use crate::protocol::LineCodec;

pub use self::serial::SerialTransport;
pub use self::tcp::{TcpTransport, TelnetStream};

/// Duplex line-oriented link to the modem
pub trait Transport: Send {
    /// Writes every byte, blocking on flow control if needed
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads one line without its terminator; `None` if `timeout` elapses first
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Bytes>>;

    /// True if a read would find data without waiting
    fn bytes_available(&mut self) -> Result<bool>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        (**self).read_line(timeout)
    }

    fn bytes_available(&mut self) -> Result<bool> {
        (**self).bytes_available()
    }
}

/// A blocking byte stream whose read timeout can be adjusted per read
pub trait LineStream: Read + Write + Send {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// True if unread bytes are waiting in the OS buffer
    fn has_pending(&mut self) -> io::Result<bool>;
}

/// Line framing over any [`LineStream`].
///
/// Bytes of a line that has not finished arriving when a read times out
/// stay buffered and are completed by the next read.
pub struct StreamTransport<S> {
    stream: S,
    codec: LineCodec,
    buffer: BytesMut,
}

impl<S: LineStream> StreamTransport<S> {
    /// Wraps an open stream
    pub fn new(stream: S, max_line_len: usize) -> Self {
        StreamTransport {
            stream,
            codec: LineCodec::new(max_line_len),
            buffer: BytesMut::with_capacity(max_line_len),
        }
    }

    /// Returns the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl<S: LineStream> Transport for StreamTransport<S> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];

        loop {
            if let Some(line) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(line));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.stream.set_read_timeout(deadline - now)?;

            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(Error::transport("stream closed by peer")),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(None)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn bytes_available(&mut self) -> Result<bool> {
        if self.codec.has_line(&self.buffer) {
            return Ok(true);
        }
        Ok(self.stream.has_pending()?)
    }
}
