//! Input decompression: transparent gzip unwrapping.
//!
//! # Detection rules
//! A stream is gzip when its first two bytes are the gzip magic
//! `0x1f 0x8b`.  The `.gz` suffix is advisory: a `.gz` path whose content
//! lacks the magic is rejected rather than read as raw PGM, because such a
//! file is almost certainly damaged.  A raw stream is passed through
//! unchanged whatever its name.
//!
//! # Error attribution
//! Every error raised by the gzip layer is re-wrapped around a
//! [`CorruptStream`] marker so that the frame parser can report it as a
//! decompression failure instead of a generic I/O failure.  The byte source
//! underneath is consumed lazily; bytes that are never read are never
//! validated.
//!
//! # Members and padding
//! Concatenated members are decoded back to back.  NUL bytes after a member
//! are skipped, so a stream padded with zeros after its last member ends
//! cleanly.  Any other trailing bytes must start a valid member.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::bufread::GzDecoder;
use thiserror::Error;

use crate::error::DecodeError;

/// Leading bytes of every gzip member (RFC 1952 §2.3.1).
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Capacity of the read buffers placed around raw and decoded streams.
pub const READ_BUFFER_SIZE: usize = 256 * 1024;

// ── Compression ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

impl Compression {
    /// Classify a stream from its path and its first bytes.
    pub fn detect(path: &Path, head: &[u8]) -> Result<Self, DecodeError> {
        if head.starts_with(&GZIP_MAGIC) {
            return Ok(Compression::Gzip);
        }
        if has_gz_suffix(path) {
            return Err(DecodeError::Decompression(format!(
                "{} has a .gz suffix but is not a gzip stream",
                path.display()
            )));
        }
        Ok(Compression::None)
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
        }
    }
}

pub fn has_gz_suffix(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

// ── Error tagging ────────────────────────────────────────────────────────────

/// Marker carried inside `io::Error`s produced by the gzip layer.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CorruptStream(pub String);

/// A `Read` adapter over consecutive gzip members that tags every error of
/// the decoder.
pub struct GzipStream<R: BufRead> {
    member: Option<GzDecoder<R>>,
}

impl<R: BufRead> GzipStream<R> {
    pub fn new(reader: R) -> Self {
        Self { member: Some(GzDecoder::new(reader)) }
    }
}

impl<R: BufRead> Read for GzipStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(member) = self.member.as_mut() {
            let n = member.read(buf).map_err(tag_error)?;
            if n > 0 {
                return Ok(n);
            }
            let Some(finished) = self.member.take() else { break };
            let mut source = finished.into_inner();
            if skip_padding(&mut source).map_err(tag_error)? {
                break;
            }
            self.member = Some(GzDecoder::new(source));
        }
        Ok(0)
    }
}

fn tag_error(e: io::Error) -> io::Error {
    if e.kind() == io::ErrorKind::Interrupted {
        return e;
    }
    io::Error::new(e.kind(), CorruptStream(format!("gzip stream: {e}")))
}

/// Consume NUL bytes.  Returns `true` when the source is then exhausted.
fn skip_padding<R: BufRead>(source: &mut R) -> io::Result<bool> {
    loop {
        let (zeros, available) = match source.fill_buf() {
            Ok(buf) => (buf.iter().take_while(|&&b| b == 0).count(), buf.len()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available == 0 {
            return Ok(true);
        }
        source.consume(zeros);
        if zeros < available {
            return Ok(false);
        }
    }
}

// ── Opening ──────────────────────────────────────────────────────────────────

/// Wrap `reader` so that it yields decompressed bytes.
///
/// The leading bytes are inspected through the buffer without being
/// consumed, so the returned reader starts at offset 0 of the content.
pub fn open<R>(path: &Path, reader: R) -> Result<(Compression, Box<dyn BufRead + Send>), DecodeError>
where
    R: Read + Send + 'static,
{
    let mut buffered = BufReader::with_capacity(READ_BUFFER_SIZE, reader);
    let head = peek_head(&mut buffered)?;
    let compression = Compression::detect(path, &head)?;

    let stream: Box<dyn BufRead + Send> = match compression {
        Compression::None => Box::new(buffered),
        Compression::Gzip => Box::new(BufReader::with_capacity(
            READ_BUFFER_SIZE,
            GzipStream::new(buffered),
        )),
    };
    Ok((compression, stream))
}

/// Return up to the first `GZIP_MAGIC.len()` bytes without consuming them.
fn peek_head<R: Read>(reader: &mut BufReader<R>) -> Result<Vec<u8>, DecodeError> {
    loop {
        match reader.fill_buf() {
            Ok(_)  => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DecodeError::Io(e)),
        }
    }
    let buf = reader.buffer();
    Ok(buf[..buf.len().min(GZIP_MAGIC.len())].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn read_all(path: &str, bytes: Vec<u8>) -> Result<Vec<u8>, DecodeError> {
        let (_, mut stream) = open(Path::new(path), Cursor::new(bytes))?;
        let mut out = Vec::new();
        stream.read_to_end(&mut out).map_err(DecodeError::from_read)?;
        Ok(out)
    }

    #[test]
    fn raw_stream_passes_through() {
        let out = read_all("frame.pgm", b"P5\n512 256\n".to_vec()).unwrap();
        assert_eq!(out, b"P5\n512 256\n");
    }

    #[test]
    fn gzip_detected_by_magic_regardless_of_name() {
        let payload = b"P5 hello".to_vec();
        let (c, _) = open(Path::new("frame.pgm"), Cursor::new(gzip(&payload))).unwrap();
        assert_eq!(c, Compression::Gzip);
        assert_eq!(read_all("frame.pgm", gzip(&payload)).unwrap(), payload);
    }

    #[test]
    fn multi_member_gzip_is_concatenated() {
        let mut bytes = gzip(b"first ");
        bytes.extend(gzip(b"second"));
        assert_eq!(read_all("x.pgm.gz", bytes).unwrap(), b"first second");
    }

    #[test]
    fn trailing_zero_padding_ends_the_stream() {
        let mut bytes = gzip(b"P5 frames");
        bytes.extend([0u8; 16]);
        assert_eq!(read_all("x.pgm.gz", bytes).unwrap(), b"P5 frames");
    }

    #[test]
    fn zero_padding_between_members_is_skipped() {
        let mut bytes = gzip(b"first ");
        bytes.extend([0u8; 5]);
        bytes.extend(gzip(b"second"));
        bytes.extend([0u8; 3]);
        assert_eq!(read_all("x.pgm.gz", bytes).unwrap(), b"first second");
    }

    #[test]
    fn trailing_garbage_after_member_is_decompression_error() {
        let mut bytes = gzip(b"payload");
        bytes.extend_from_slice(b"\0\0junk");
        let err = read_all("x.pgm.gz", bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decompression);
    }

    #[test]
    fn gz_suffix_without_magic_is_rejected() {
        let err = read_all("x.pgm.gz", b"P5\n".to_vec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decompression);
    }

    #[test]
    fn corrupt_gzip_header_is_decompression_error() {
        let mut bytes = GZIP_MAGIC.to_vec();
        bytes.extend_from_slice(b"not a deflate member at all");
        let err = read_all("x.pgm.gz", bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decompression);
    }

    #[test]
    fn empty_raw_stream_is_fine() {
        assert!(read_all("empty.pgm", Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn suffix_check_is_case_insensitive() {
        assert!(has_gz_suffix(Path::new("a.pgm.GZ")));
        assert!(!has_gz_suffix(Path::new("a.pgm")));
    }
}
