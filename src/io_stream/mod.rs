//! Frame stream walker.
//!
//! [`FrameReader`] applies the frame parser repeatedly to one byte stream and
//! yields frames in encounter order.  [`read_frames`] opens a file,
//! unwraps gzip if needed and collects the whole stream into a
//! [`FrameBatch`] with
//! all-or-nothing semantics: a file contributes every frame it holds or
//! none at all.  Partial counts would make cube assembly ambiguous across
//! files, so frames parsed before a failure are discarded.

use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use log::trace;

use crate::codec;
use crate::error::DecodeError;
use crate::frame::{read_frame, Frame};
use crate::metadata::Metadata;

/// Per-file walking options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Stop after the first successfully parsed frame.
    pub first_frame: bool,
    /// Consume metadata comments without materializing them.
    pub no_metadata: bool,
}

// ── FrameReader ──────────────────────────────────────────────────────────────

pub struct FrameReader<R: BufRead> {
    reader:  R,
    options: WalkOptions,
    yielded: usize,
    done:    bool,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R, options: WalkOptions) -> Self {
        Self { reader, options, yielded: 0, done: false }
    }

    /// Number of frames yielded so far.
    pub fn frames_read(&self) -> usize {
        self.yielded
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<Frame, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.options.first_frame && self.yielded == 1 {
            // Remaining bytes are deliberately left unread.
            self.done = true;
            return None;
        }
        match read_frame(&mut self.reader, self.options.no_metadata) {
            Ok(Some(frame)) => {
                self.yielded += 1;
                Some(Ok(frame))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for FrameReader<R> {}

// ── FrameBatch ───────────────────────────────────────────────────────────────

/// Frames of one file in encounter order.
///
/// Pixel blocks are concatenated into one row-major buffer, so a batch can
/// be moved into a cube without another copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBatch {
    pub pixels:   Vec<u16>,
    pub metadata: Vec<Metadata>,
}

impl FrameBatch {
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn push(&mut self, frame: Frame) {
        let (_, metadata, pixels) = frame.into_parts();
        if self.pixels.is_empty() {
            self.pixels = pixels;
        } else {
            self.pixels.extend_from_slice(&pixels);
        }
        self.metadata.push(metadata);
    }
}

impl FromIterator<Frame> for FrameBatch {
    fn from_iter<I: IntoIterator<Item = Frame>>(iter: I) -> Self {
        let mut batch = FrameBatch::default();
        for frame in iter {
            batch.push(frame);
        }
        batch
    }
}

// ── File-level entry point ───────────────────────────────────────────────────

/// Decode every frame of the file at `path`.
///
/// The file handle lives only for the duration of this call and is closed
/// on every exit path.  A stream holding no frame at all is rejected, since
/// it cannot contribute to the cube.
pub fn read_frames(path: &Path, options: WalkOptions) -> Result<FrameBatch, DecodeError> {
    let file = File::open(path)?;
    let (compression, stream) = codec::open(path, file)?;
    trace!("{}: opened ({} compression)", path.display(), compression.name());

    let mut batch = FrameBatch::default();
    for frame in FrameReader::new(stream, options) {
        batch.push(frame?);
    }
    if batch.is_empty() {
        return Err(DecodeError::format("no frames found"));
    }
    trace!("{}: {} frame(s)", path.display(), batch.len());
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::frame::{FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH};
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn frame_bytes(index: usize) -> Vec<u8> {
        let mut out = format!("P5\n#frame={index}\n{FRAME_WIDTH} {FRAME_HEIGHT}\n65535\n").into_bytes();
        for _ in 0..FRAME_PIXELS {
            out.extend_from_slice(&(index as u16).to_be_bytes());
        }
        out
    }

    fn stream(n: usize) -> Vec<u8> {
        (0..n).flat_map(frame_bytes).collect()
    }

    #[test]
    fn yields_all_frames_in_order() {
        let reader = FrameReader::new(Cursor::new(stream(3)), WalkOptions::default());
        let frames: Vec<Frame> = reader.map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 3);
        for (i, f) in frames.iter().enumerate() {
            assert_eq!(f.metadata().get("frame"), Some(i.to_string().as_str()));
            assert_eq!(f.pixel(10, 10), Some(i as u16));
        }
    }

    #[test]
    fn first_frame_ignores_trailing_garbage() {
        let mut bytes = stream(1);
        bytes.extend_from_slice(b"this is not a frame");
        let opts = WalkOptions { first_frame: true, ..Default::default() };
        let mut reader = FrameReader::new(Cursor::new(bytes), opts);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert_eq!(reader.frames_read(), 1);
    }

    #[test]
    fn stops_after_first_error() {
        let mut bytes = stream(2);
        bytes.extend_from_slice(b"P6\n");
        bytes.extend(stream(1));
        let results: Vec<_> = FrameReader::new(Cursor::new(bytes), WalkOptions::default()).collect();
        assert_eq!(results.len(), 3);
        assert!(results[2].is_err());
    }

    #[test]
    fn whitespace_between_frames_is_tolerated() {
        let mut bytes = b"\n \t".to_vec();
        bytes.extend(frame_bytes(0));
        bytes.extend_from_slice(b"\n\r\n  ");
        bytes.extend(frame_bytes(1));
        bytes.extend_from_slice(b"\n\n");
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        let batch = read_frames(tmp.path(), WalkOptions::default()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.metadata[1].get("frame"), Some("1"));
        assert_eq!(batch.pixels.len(), 2 * FRAME_PIXELS);
        assert_eq!(batch.pixels[FRAME_PIXELS], 1);
    }

    #[test]
    fn batch_concatenates_pixel_blocks_in_order() {
        let reader = FrameReader::new(Cursor::new(stream(3)), WalkOptions::default());
        let batch: FrameBatch = reader.map(|f| f.unwrap()).collect();
        assert_eq!(batch.len(), 3);
        let firsts: Vec<u16> = batch.pixels.chunks_exact(FRAME_PIXELS).map(|f| f[0]).collect();
        assert_eq!(firsts, vec![0, 1, 2]);
    }

    #[test]
    fn failing_file_contributes_nothing() {
        let mut bytes = stream(4);
        bytes.truncate(bytes.len() - 1);
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(&bytes).unwrap();

        let err = read_frames(tmp.path(), WalkOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn empty_file_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        let err = read_frames(tmp.path(), WalkOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_frames(Path::new("/nonexistent/rabb.pgm"), WalkOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
