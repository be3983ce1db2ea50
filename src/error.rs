//! Error taxonomy.
//!
//! [`DecodeError`] describes why one input file could not contribute frames.
//! It is always caught at the file-task boundary and turned into a
//! [`ProblematicFile`](crate::aggregate::ProblematicFile) entry; it never
//! fails a whole read.
//!
//! [`ConfigError`] is the only fatal class: it reports misuse of the call
//! interface and is returned before any file is opened.

use std::io;
use serde::Serialize;
use thiserror::Error;

use crate::codec::CorruptStream;

// ── Per-file errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Format error: {0}")]
    Format(String),
    /// The stream ended before the declared pixel block was complete.
    #[error("Truncated pixel block: expected {expected} bytes, got {received}")]
    Truncated {
        expected: usize,
        received: usize,
    },
}

/// Flat discriminant of [`DecodeError`], carried by problematic-file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Decompression,
    Format,
    TruncatedData,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Io(_)            => ErrorKind::Io,
            DecodeError::Decompression(_) => ErrorKind::Decompression,
            DecodeError::Format(_)        => ErrorKind::Format,
            DecodeError::Truncated { .. } => ErrorKind::TruncatedData,
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        DecodeError::Format(msg.into())
    }

    /// Classify an I/O error raised while reading a frame.
    ///
    /// Errors produced by the gzip layer are tagged with [`CorruptStream`]
    /// and map to `Decompression`; everything else is a plain `Io` failure.
    pub(crate) fn from_read(err: io::Error) -> Self {
        let corrupt = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<CorruptStream>())
            .map(|c| c.to_string());
        match corrupt {
            Some(msg) => DecodeError::Decompression(msg),
            None      => DecodeError::Io(err),
        }
    }
}

// ── Fatal configuration errors ───────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("workers must be at least 1 (got {0})")]
    InvalidWorkers(usize),
    #[error("no input files supplied")]
    EmptySource,
}
