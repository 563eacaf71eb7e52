//! Swarm Tile client
//!
//! This library talks to a Swarm Tile satellite modem over a serial port or
//! the eval kit's telnet console. Commands are checksum-framed ASCII lines
//! (`$DT 1*01`); replies are picked out of a stream that also carries
//! unsolicited status reports.
pub mod core;
pub mod protocol;
pub mod session;
pub mod tile;
pub mod transport;
mod util;

// Re-export commonly used items
pub use crate::core::{
    Error, FrameError, GpsStatus, PowerStatus, Result, SerialConfig, SessionConfig, TcpConfig,
};
pub use crate::protocol::{Sentence, StatusSnapshot};
pub use crate::session::Session;
pub use crate::tile::{MessagePayload, SendReceipt, TileClient, TileHandle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
