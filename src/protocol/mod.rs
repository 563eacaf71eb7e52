//! Protocol implementation module
//!
//! This module defines the Tile sentence framing, decoding of the known
//! sentence types, and folding of status sentences into a snapshot.

pub mod codec;
pub mod message;
pub mod state;

pub use self::codec::{checksum, decode_line, encode, split_overlap, LineCodec};
pub use self::message::{
    parse, parse_power, DateTimeField, Field, PowerReading, SendAck, Sentence,
};
pub use self::state::{fold, fold_line, fold_text, StatusSnapshot};
