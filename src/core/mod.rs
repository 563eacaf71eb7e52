//! Core types and traits for the Tile client
//!
//! This module contains the fundamental building blocks used throughout the library.

pub mod config;
pub mod error;
pub mod serde;
pub mod types;

pub use self::config::{SerialConfig, SessionConfig, TcpConfig};
pub use self::error::{Error, FrameError, Result};
pub use self::types::{
    FixQuality, FixType, GpsPosition, GpsStatus, PowerStatus, Rail, RailReading, GNSS_FIX_TYPES,
};

/// Tile UART baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default eval kit telnet port
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Default number of read retries for an expected response
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Maximum accepted line length in bytes
pub const MAX_LINE_LEN: usize = 512;

/// Maximum user payload of a single `$TD` message in bytes
pub const MAX_MESSAGE_LEN: usize = 192;

/// Highest application id accepted by `$TD AI=`
pub const MAX_APPLICATION_ID: u16 = 64_999;
