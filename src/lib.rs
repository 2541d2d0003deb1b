//! dynamic-fs - A filesystem overlay of synthetic files
//!
//! Serves a fixed set of in-memory files through the same read API as the
//! real filesystem, and falls back to the real filesystem for every path the
//! overlay does not contain.

pub mod fs;
pub mod manifest;

pub use fs::{
    BufferEncoding, DynamicFs, DynamicFsOptions, FileContent, FileData, FileSystem, FsError,
    HostFs, InitialFiles, LoadError, ReadOptions, ReadStream, ReaddirOptions, Stats, StreamEvent,
};
pub use manifest::Manifest;
