pub mod error;
pub mod codec;
pub mod metadata;
pub mod frame;
pub mod io_stream;
pub mod pool;
pub mod aggregate;
pub mod reader;

pub use error::{ConfigError, DecodeError, ErrorKind};
pub use codec::Compression;
pub use metadata::Metadata;
pub use frame::{Frame, FrameHeader, FRAME_HEIGHT, FRAME_WIDTH};
pub use io_stream::{read_frames, FrameBatch, FrameReader, WalkOptions};
pub use aggregate::{Cube, ProblematicFile, ReadResult};
pub use reader::{read, ReadOptions, Source};
