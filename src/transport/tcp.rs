use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::core::{Error, Result, SessionConfig, TcpConfig};
use super::{LineStream, StreamTransport};

/// Tile reached through the eval kit's telnet console
pub type TcpTransport = StreamTransport<TelnetStream>;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

/// Position inside a telnet command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Telnet {
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Socket to the telnet console with option negotiation stripped out.
///
/// Every option the console offers or asks for is refused, leaving a plain
/// byte stream.
pub struct TelnetStream {
    stream: TcpStream,
    state: Telnet,
    replies: Vec<u8>,
}

impl TelnetStream {
    pub fn new(stream: TcpStream) -> Self {
        TelnetStream {
            stream,
            state: Telnet::Data,
            replies: Vec::new(),
        }
    }

    pub fn get_ref(&self) -> &TcpStream {
        &self.stream
    }

    /// Compacts `buf` in place to its data bytes and returns their count
    fn filter(&mut self, buf: &mut [u8]) -> usize {
        let mut kept = 0;
        for i in 0..buf.len() {
            let byte = buf[i];
            self.state = match (self.state, byte) {
                (Telnet::Data, IAC) => Telnet::Iac,
                (Telnet::Data, _) | (Telnet::Iac, IAC) => {
                    buf[kept] = byte;
                    kept += 1;
                    Telnet::Data
                }
                (Telnet::Iac, WILL..=DONT) => Telnet::Negotiate(byte),
                (Telnet::Iac, SB) => Telnet::Sub,
                (Telnet::Iac, _) => Telnet::Data,
                (Telnet::Negotiate(command), option) => {
                    self.refuse(command, option);
                    Telnet::Data
                }
                (Telnet::Sub, IAC) => Telnet::SubIac,
                (Telnet::Sub, _) => Telnet::Sub,
                (Telnet::SubIac, SE) => Telnet::Data,
                (Telnet::SubIac, _) => Telnet::Sub,
            };
        }
        kept
    }

    fn refuse(&mut self, command: u8, option: u8) {
        // WONT and DONT already leave the option off
        let reply = match command {
            DO => WONT,
            WILL => DONT,
            _ => return,
        };
        debug!(command, option, "Refusing telnet option");
        self.replies.extend_from_slice(&[IAC, reply, option]);
    }
}

impl Read for TelnetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.stream.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let kept = self.filter(&mut buf[..n]);
            if !self.replies.is_empty() {
                let replies = std::mem::take(&mut self.replies);
                self.stream.write_all(&replies)?;
            }
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

impl Write for TelnetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl LineStream for TelnetStream {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))
    }

    fn has_pending(&mut self) -> io::Result<bool> {
        let mut peeked = [0u8; 1];
        self.stream.set_nonblocking(true)?;
        let result = self.stream.peek(&mut peeked);
        self.stream.set_nonblocking(false)?;
        match result {
            // A closed socket reads as available so the next read reports it
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl StreamTransport<TelnetStream> {
    /// Connects to the first reachable address of the configured host
    pub fn connect(config: &TcpConfig, session: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let addrs = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| Error::transport(format!("Failed to resolve {}: {}", config.host, e)))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!(%addr, "Tile telnet connected");
                    return Ok(StreamTransport::new(TelnetStream::new(stream), session.max_line_len));
                }
                Err(e) => {
                    debug!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => Error::transport(format!("Failed to connect to {}: {}", config.host, e)),
            None => Error::transport(format!("No addresses for {}", config.host)),
        })
    }
}
