use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::core::{Error, FrameError, MAX_LINE_LEN};
use super::message::Sentence;

/// XOR of every byte after the opening tag marker
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().skip(1).fold(0, |acc, b| acc ^ b)
}

/// Frames a command as `<command>*XX\n`
pub fn encode(command: &str) -> Bytes {
    let mut dst = BytesMut::with_capacity(command.len() + 4);
    encode_into(command, &mut dst);
    dst.freeze()
}

fn encode_into(command: &str, dst: &mut BytesMut) {
    dst.reserve(command.len() + 4);
    dst.extend_from_slice(command.as_bytes());
    dst.extend_from_slice(format!("*{:02X}\n", checksum(command.as_bytes())).as_bytes());
}

/// Decodes one received line, verifying its checksum
pub fn decode_line(raw: &[u8]) -> Result<Sentence, FrameError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| FrameError::Malformed("line is not valid UTF-8".into()))?;
    let text = text.trim_end_matches(['\r', '\n']);

    let (body, digits) = text
        .rsplit_once('*')
        .ok_or_else(|| FrameError::Malformed(format!("no checksum delimiter in {:?}", text)))?;
    if !body.starts_with('$') {
        return Err(FrameError::Malformed(format!("no tag marker in {:?}", text)));
    }
    if digits.len() != 2 {
        return Err(FrameError::Malformed(format!("bad checksum field {:?}", digits)));
    }
    let found = u8::from_str_radix(digits, 16)
        .map_err(|_| FrameError::Malformed(format!("bad checksum field {:?}", digits)))?;

    let expected = checksum(body.as_bytes());
    if expected != found {
        return Err(FrameError::BadChecksum { expected, found });
    }

    let (tag, payload) = body.split_once(' ').unwrap_or((body, ""));
    Ok(Sentence::new(tag, payload))
}

/// Splits a line holding two concatenated sentences.
///
/// A `$` past the first character starts a second sentence; the tail is
/// returned for re-parsing. A line with no `$`, or one that starts with
/// `$`, has no overlap.
pub fn split_overlap(line: &str) -> (&str, Option<&str>) {
    match line.find('$') {
        Some(idx) if idx > 0 => (&line[..idx], Some(&line[idx..])),
        _ => (line, None),
    }
}

/// Newline-delimited codec for the Tile byte stream
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_len: usize,
    /// Set while skipping the rest of an oversized line
    discarding: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        LineCodec::new(MAX_LINE_LEN)
    }
}

impl LineCodec {
    /// Creates a new line codec
    pub fn new(max_line_len: usize) -> Self {
        LineCodec {
            max_line_len,
            discarding: false,
        }
    }

    /// True if a complete line is sitting in the buffer
    pub fn has_line(&self, src: &BytesMut) -> bool {
        src.contains(&b'\n')
    }
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = match src.iter().position(|b| *b == b'\n') {
                Some(idx) => idx,
                None => {
                    if src.len() > self.max_line_len {
                        warn!(len = src.len(), "Discarding oversized line");
                        src.clear();
                        self.discarding = true;
                    }
                    return Ok(None);
                }
            };

            let mut line = src.split_to(newline + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if newline > self.max_line_len {
                warn!(len = newline, "Discarding oversized line");
                continue;
            }

            line.truncate(newline);
            while line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            // Leading carriage returns come from `\r\n` endings split across lines
            while line.first() == Some(&b'\r') {
                line.advance(1);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line.freeze()));
        }
    }
}

impl Encoder<&str> for LineCodec {
    type Error = Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(item, dst);
        Ok(())
    }
}

/// Appends an unframed console line
pub fn encode_raw(line: &str, dst: &mut BytesMut) {
    dst.put_slice(line.as_bytes());
    dst.put_u8(b'\n');
}
