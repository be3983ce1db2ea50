//! Single-frame parser for the imager's PGM dialect.
//!
//! # Layout
//! ```text
//! P5\n
//! #"Site unique ID" = "rabb"\n        ← zero or more comment lines,
//! #"Image request start" = "..."\n      anywhere before the max value
//! 512 256\n
//! 65535<one whitespace byte>
//! <width × height samples>           ← u16 big-endian if max > 255, else u8
//! ```
//! Frames are concatenated with no separator.  The parser consumes exactly
//! one frame and leaves the stream positioned at the first byte after its
//! pixel block.

use std::io::{self, BufRead, Read};

use byteorder::{BigEndian, ByteOrder};
use log::trace;

use crate::error::DecodeError;
use crate::metadata::Metadata;

pub const MAGIC: &[u8; 2] = b"P5";
pub const FRAME_WIDTH:  usize = 512;
pub const FRAME_HEIGHT: usize = 256;
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;
pub const COMMENT_MARKER: u8 = b'#';
/// Longest header token accepted; real tokens are at most five digits.
pub const MAX_TOKEN_LEN: usize = 32;
/// Longest comment line accepted, marker and newline included.
pub const MAX_COMMENT_LEN: usize = 4096;

// ── FrameHeader ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub width:     usize,
    pub height:    usize,
    pub max_value: u16,
}

impl FrameHeader {
    pub fn is_16bit(&self) -> bool {
        self.max_value > 255
    }

    pub fn bytes_per_sample(&self) -> usize {
        if self.is_16bit() { 2 } else { 1 }
    }

    /// Size in bytes of the pixel block that follows the header on the wire.
    pub fn block_size(&self) -> usize {
        self.width * self.height * self.bytes_per_sample()
    }
}

// ── Frame ────────────────────────────────────────────────────────────────────

/// One decoded image.  Samples are `u16`, row-major, `height × width`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header:   FrameHeader,
    metadata: Metadata,
    pixels:   Vec<u16>,
}

impl Frame {
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<u16> {
        if row >= self.header.height || col >= self.header.width {
            return None;
        }
        self.pixels.get(row * self.header.width + col).copied()
    }

    pub fn into_parts(self) -> (FrameHeader, Metadata, Vec<u16>) {
        (self.header, self.metadata, self.pixels)
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

/// Parse the next frame from `reader`.
///
/// Returns `Ok(None)` when only whitespace remains before end of stream.
/// With `no_metadata`, comment lines are consumed but not recorded.
pub fn read_frame<R: BufRead>(reader: &mut R, no_metadata: bool) -> Result<Option<Frame>, DecodeError> {
    skip_whitespace(reader)?;
    if peek(reader)?.is_none() {
        return Ok(None);
    }

    let magic = read_token(reader)?;
    if magic.as_slice() != MAGIC {
        return Err(DecodeError::format(format!(
            "bad magic token {:?}, expected {:?}",
            String::from_utf8_lossy(&magic),
            String::from_utf8_lossy(MAGIC),
        )));
    }

    let mut metadata = Metadata::new();
    let mut sink = if no_metadata { None } else { Some(&mut metadata) };

    let width     = header_number(reader, &mut sink, "width")?;
    let height    = header_number(reader, &mut sink, "height")?;
    let max_value = header_number(reader, &mut sink, "max value")?;

    if width != FRAME_WIDTH as u64 || height != FRAME_HEIGHT as u64 {
        return Err(DecodeError::format(format!(
            "unsupported dimensions {width}x{height}, expected {FRAME_WIDTH}x{FRAME_HEIGHT}"
        )));
    }
    let max_value = match u16::try_from(max_value) {
        Ok(v) if v > 0 => v,
        _ => {
            return Err(DecodeError::format(format!(
                "max value {max_value} outside 1..=65535"
            )))
        }
    };
    let header = FrameHeader { width: FRAME_WIDTH, height: FRAME_HEIGHT, max_value };

    // Exactly one whitespace byte separates the max value from the samples.
    match peek(reader)? {
        Some(b) if b.is_ascii_whitespace() => reader.consume(1),
        Some(b) => {
            return Err(DecodeError::format(format!(
                "unexpected byte 0x{b:02x} after max value"
            )))
        }
        None => {
            return Err(DecodeError::Truncated { expected: header.block_size(), received: 0 })
        }
    }

    let block  = read_block(reader, header.block_size())?;
    let pixels = if header.is_16bit() {
        let mut samples = vec![0u16; FRAME_PIXELS];
        BigEndian::read_u16_into(&block, &mut samples);
        samples
    } else {
        block.into_iter().map(u16::from).collect()
    };

    trace!(
        "parsed frame: max value {}, {} metadata entries",
        header.max_value,
        metadata.len()
    );
    Ok(Some(Frame { header, metadata, pixels }))
}

/// Parse a comment body (without the leading marker) as `key=value`.
///
/// Both sides are trimmed and lose one pair of surrounding double quotes.
/// Returns `None` for plain comments and for entries with an empty key.
pub fn parse_metadata_line(body: &str) -> Option<(String, String)> {
    let (key, value) = body.split_once('=')?;
    let key = unquote(key.trim());
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

// ── Byte-level helpers ───────────────────────────────────────────────────────

fn peek<R: BufRead>(reader: &mut R) -> Result<Option<u8>, DecodeError> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(buf.first().copied()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::from_read(e)),
        }
    }
}

fn skip_whitespace<R: BufRead>(reader: &mut R) -> Result<(), DecodeError> {
    while let Some(b) = peek(reader)? {
        if !b.is_ascii_whitespace() {
            break;
        }
        reader.consume(1);
    }
    Ok(())
}

/// Read bytes up to (not including) the next whitespace, comment marker or EOF.
fn read_token<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, DecodeError> {
    let mut token = Vec::new();
    while let Some(b) = peek(reader)? {
        if b.is_ascii_whitespace() || b == COMMENT_MARKER {
            break;
        }
        if token.len() == MAX_TOKEN_LEN {
            return Err(DecodeError::format("header token too long"));
        }
        token.push(b);
        reader.consume(1);
    }
    Ok(token)
}

/// Consume one comment line, marker included, through its terminating `\n`.
fn read_comment<R: BufRead>(reader: &mut R) -> Result<String, DecodeError> {
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(MAX_COMMENT_LEN as u64)
        .read_until(b'\n', &mut line)
        .map_err(DecodeError::from_read)?;
    if line.len() == MAX_COMMENT_LEN && line.last() != Some(&b'\n') {
        return Err(DecodeError::format(format!(
            "comment line longer than {MAX_COMMENT_LEN} bytes"
        )));
    }
    let body = line.strip_prefix(&[COMMENT_MARKER]).unwrap_or(&line);
    Ok(String::from_utf8_lossy(body).trim_end_matches(['\r', '\n']).to_string())
}

/// Read the next numeric header token, consuming whitespace and comments
/// in front of it.  Metadata comments are recorded into `sink` when present.
fn header_number<R: BufRead>(
    reader: &mut R,
    sink:   &mut Option<&mut Metadata>,
    field:  &str,
) -> Result<u64, DecodeError> {
    loop {
        skip_whitespace(reader)?;
        match peek(reader)? {
            None => {
                return Err(DecodeError::format(format!(
                    "stream ended before header {field}"
                )))
            }
            Some(COMMENT_MARKER) => {
                let body = read_comment(reader)?;
                if let Some(meta) = sink.as_deref_mut() {
                    if let Some((key, value)) = parse_metadata_line(&body) {
                        meta.insert(key, value);
                    }
                }
            }
            Some(_) => break,
        }
    }

    let token = read_token(reader)?;
    std::str::from_utf8(&token)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| {
            DecodeError::format(format!(
                "unparsable header {field} {:?}",
                String::from_utf8_lossy(&token)
            ))
        })
}

fn read_block<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, DecodeError> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(DecodeError::Truncated { expected: len, received: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::from_read(e)),
        }
    }
    Ok(buf)
}
