use std::io;
use thiserror::Error;

/// Reasons a received line could not be decoded as a framed sentence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Bad checksum: expected {expected:02X}, found {found:02X}")]
    BadChecksum { expected: u8, found: u8 },
}

/// Custom error types for the Tile client
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("No response containing {expect:?} after {} unmatched lines", .lines.len())]
    Timeout {
        /// What the response was expected to contain
        expect: String,
        /// Every line read while waiting, in arrival order
        lines: Vec<String>,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Rejected by modem: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tile worker disconnected")]
    Disconnected,
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Error::Transport(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Error::Rejected(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout(expect: impl Into<String>, lines: Vec<String>) -> Self {
        Error::Timeout {
            expect: expect.into(),
            lines,
        }
    }

    /// True if the expected response never arrived
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True if the session can no longer be used and must be reconnected
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Transport(_) | Error::Disconnected)
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
