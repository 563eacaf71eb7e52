//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

use std::fmt::Write;

/// Encodes bytes as uppercase hex, two digits per byte
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // Writing to a String cannot fail
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// True if `text` is printable ASCII that can sit inside a quoted field
pub fn is_quotable(text: &str) -> bool {
    text.bytes().all(|b| (0x20..=0x7e).contains(&b) && b != b'"')
}
