//! Deterministic merge of per-file outcomes into one pixel cube.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{DecodeError, ErrorKind};
use crate::frame::{FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH};
use crate::io_stream::FrameBatch;
use crate::metadata::Metadata;

// ── Cube ─────────────────────────────────────────────────────────────────────

/// Stack of frames with logical shape `(height, width, depth)`.
///
/// Storage is one contiguous buffer, frame-major, each frame row-major:
/// sample `(row, col, k)` lives at `k * height * width + row * width + col`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cube {
    height: usize,
    width:  usize,
    depth:  usize,
    data:   Vec<u16>,
}

impl Cube {
    pub fn empty() -> Self {
        Self { height: FRAME_HEIGHT, width: FRAME_WIDTH, depth: 0, data: Vec::new() }
    }

    /// Append whole frames.  The first non-empty buffer becomes the storage
    /// itself, grown to hold `total_frames`; later buffers are copied in and
    /// dropped.
    fn append(&mut self, pixels: Vec<u16>, total_frames: usize) {
        let n = self.height * self.width;
        debug_assert_eq!(pixels.len() % n, 0);
        self.depth += pixels.len() / n;
        if self.data.is_empty() {
            self.data = pixels;
            self.data.reserve_exact((total_frames * n).saturating_sub(self.data.len()));
        } else {
            self.data.extend_from_slice(&pixels);
        }
    }

    /// `(height, width, depth)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.depth)
    }

    pub fn height(&self) -> usize { self.height }
    pub fn width(&self)  -> usize { self.width }
    pub fn depth(&self)  -> usize { self.depth }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn get(&self, row: usize, col: usize, frame: usize) -> Option<u16> {
        if row >= self.height || col >= self.width || frame >= self.depth {
            return None;
        }
        self.data
            .get(frame * self.height * self.width + row * self.width + col)
            .copied()
    }

    /// Samples of frame `k`, row-major.
    pub fn frame(&self, k: usize) -> Option<&[u16]> {
        let n = self.height * self.width;
        self.data.get(k * n..(k + 1) * n)
    }

    pub fn frames(&self) -> impl Iterator<Item = &[u16]> {
        self.data.chunks_exact(self.height * self.width)
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }
}

// ── ReadResult ───────────────────────────────────────────────────────────────

/// A file that contributed no frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProblematicFile {
    pub path:   PathBuf,
    pub kind:   ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub cube:        Cube,
    /// One entry per cube frame, in cube order.
    pub metadata:    Vec<Metadata>,
    /// Failed files, in input order.
    pub problematic: Vec<ProblematicFile>,
}

impl ReadResult {
    pub fn frame_count(&self) -> usize {
        self.cube.depth()
    }

    pub fn is_clean(&self) -> bool {
        self.problematic.is_empty()
    }

    /// BLAKE3 fingerprint of the cube shape and samples, hex encoded.
    pub fn digest(&self) -> String {
        let (h, w, d) = self.cube.shape();
        let mut hasher = blake3::Hasher::new();
        for dim in [h, w, d] {
            hasher.update(&(dim as u64).to_le_bytes());
        }
        let mut bytes = Vec::with_capacity(FRAME_PIXELS * 2);
        for frame in self.cube.frames() {
            bytes.clear();
            bytes.extend(frame.iter().flat_map(|s| s.to_le_bytes()));
            hasher.update(&bytes);
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────────

pub type FileOutcome = Result<FrameBatch, DecodeError>;

/// Merge index-tagged outcomes, in any order, into a [`ReadResult`].
///
/// `paths[i]` is the input that produced outcome index `i`.  The result is
/// ordered by input index, then by frame order within each file.  Each
/// batch is released as soon as it has been merged.
pub fn aggregate(paths: &[PathBuf], mut outcomes: Vec<(usize, FileOutcome)>) -> ReadResult {
    outcomes.sort_by_key(|(index, _)| *index);

    let total: usize = outcomes
        .iter()
        .filter_map(|(_, o)| o.as_ref().ok())
        .map(FrameBatch::len)
        .sum();

    let mut cube        = Cube::empty();
    let mut metadata    = Vec::with_capacity(total);
    let mut problematic = Vec::new();

    for (index, outcome) in outcomes {
        match outcome {
            Ok(batch) => {
                cube.append(batch.pixels, total);
                metadata.extend(batch.metadata);
            }
            Err(e) => problematic.push(ProblematicFile {
                path:   paths.get(index).cloned().unwrap_or_default(),
                kind:   e.kind(),
                reason: e.to_string(),
            }),
        }
    }

    ReadResult { cube, metadata, problematic }
}
