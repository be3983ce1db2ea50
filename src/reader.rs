//! High-level [`read`] API — the primary embedding surface.
//!
//! ```no_run
//! use rainbow_readfile::{read, ReadOptions};
//!
//! let opts = ReadOptions { workers: 4, ..Default::default() };
//! let result = read(
//!     vec!["20130205_0500_rabb_rainbow-08_full.pgm.gz", "20130205_0501_rabb_rainbow-08_full.pgm.gz"],
//!     &opts,
//! )?;
//! assert_eq!(result.cube.shape().0, 256);
//! for bad in &result.problematic {
//!     eprintln!("{}: {}", bad.path.display(), bad.reason);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::aggregate::{aggregate, ReadResult};
use crate::error::ConfigError;
use crate::io_stream::{read_frames, WalkOptions};
use crate::pool::{effective_workers, run_indexed};

// ── Source ───────────────────────────────────────────────────────────────────

/// One input path or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Single(PathBuf),
    List(Vec<PathBuf>),
}

impl Source {
    /// Normalize to a non-empty list of paths.
    pub fn into_paths(self) -> Result<Vec<PathBuf>, ConfigError> {
        let paths = match self {
            Source::Single(p)  => vec![p],
            Source::List(list) => list,
        };
        if paths.is_empty() {
            return Err(ConfigError::EmptySource);
        }
        Ok(paths)
    }
}

impl From<PathBuf> for Source {
    fn from(p: PathBuf) -> Self { Source::Single(p) }
}

impl From<&Path> for Source {
    fn from(p: &Path) -> Self { Source::Single(p.to_path_buf()) }
}

impl From<&PathBuf> for Source {
    fn from(p: &PathBuf) -> Self { Source::Single(p.clone()) }
}

impl From<String> for Source {
    fn from(p: String) -> Self { Source::Single(p.into()) }
}

impl From<&str> for Source {
    fn from(p: &str) -> Self { Source::Single(p.into()) }
}

impl<P: AsRef<Path>> From<Vec<P>> for Source {
    fn from(list: Vec<P>) -> Self {
        Source::List(list.iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

impl<P: AsRef<Path>> From<&[P]> for Source {
    fn from(list: &[P]) -> Self {
        Source::List(list.iter().map(|p| p.as_ref().to_path_buf()).collect())
    }
}

// ── ReadOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Degree of parallel decode; must be at least 1.
    pub workers:     usize,
    /// Keep only the first frame of every file.
    pub first_frame: bool,
    /// Parse over metadata comments without materializing them.
    pub no_metadata: bool,
    /// Log failed files at `debug` instead of `warn`.
    pub quiet:       bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            workers:     1,
            first_frame: false,
            no_metadata: false,
            quiet:       false,
        }
    }
}

impl ReadOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers < 1 {
            return Err(ConfigError::InvalidWorkers(self.workers));
        }
        Ok(())
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            first_frame: self.first_frame,
            no_metadata: self.no_metadata,
        }
    }
}

// ── read ─────────────────────────────────────────────────────────────────────

/// Decode every input into one cube.
///
/// Per-file failures never fail the call: they are reported in
/// [`ReadResult::problematic`] and the file contributes no frames.  Only a
/// malformed configuration (`workers == 0`, empty input list) is an error.
pub fn read(source: impl Into<Source>, options: &ReadOptions) -> Result<ReadResult, ConfigError> {
    options.validate()?;
    let paths = source.into().into_paths()?;
    let walk  = options.walk_options();

    debug!(
        "reading {} file(s) with {} worker(s), first_frame={}, no_metadata={}",
        paths.len(),
        effective_workers(options.workers, paths.len()),
        options.first_frame,
        options.no_metadata,
    );

    let outcomes = run_indexed(paths.len(), options.workers, |i| {
        let path = &paths[i];
        let outcome = read_frames(path, walk);
        if let Err(e) = &outcome {
            if options.quiet {
                debug!("{}: {e}", path.display());
            } else {
                warn!("{}: {e}", path.display());
            }
        }
        outcome
    });

    let result = aggregate(&paths, outcomes);
    debug!(
        "read {} frame(s), {} problematic file(s)",
        result.frame_count(),
        result.problematic.len()
    );
    Ok(result)
}
