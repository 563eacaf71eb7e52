//! Tile client facade
//!
//! Each operation is a scripted exchange built on [`crate::session::Session`]:
//!
//! - `get_gps_time`: switch `$DT` reports on, request one, switch them off
//! - `get_gps_stats`: the same for `$GN` then `$GS`, merged into one status
//! - `get_message_count` / `get_firmware_version`: single queries
//! - `send_message`: one `$TD` frame, acknowledged or reported as failed
//!
//! # Examples
//!
//! ```no_run
//! use swarm_tile::{SerialConfig, SessionConfig, TileClient};
//!
//! let serial = SerialConfig {
//!     device: "/dev/ttyUSB0".to_string(),
//!     ..Default::default()
//! };
//! let mut tile = TileClient::open_serial(&serial, SessionConfig::default()).unwrap();
//! println!("{}", tile.get_firmware_version().unwrap());
//! match tile.get_gps_time().unwrap() {
//!     Some(time) => println!("GPS time {}", time),
//!     None => println!("no GPS time yet"),
//! }
//! ```

mod client;
mod handle;
mod unsolicited;

pub use self::client::{MessagePayload, SendReceipt, TileClient};
pub use self::handle::TileHandle;
pub use self::unsolicited::Unsolicited;
