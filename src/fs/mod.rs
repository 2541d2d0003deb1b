//! File System Module
//!
//! Provides the overlay filesystem and the pieces it is built from:
//! - DynamicFs: synthetic files layered over a host filesystem
//! - HostFs: the real filesystem, used as the default fallback

pub mod types;
pub mod encoding;
pub mod path;
pub mod tree;
pub mod stats;
pub mod stream;
pub mod host_fs;
pub mod dynamic_fs;

pub use types::*;
pub use encoding::{BufferEncoding, UnknownEncoding};
pub use stats::Stats;
pub use stream::{ReadStream, StreamEvent};
pub use host_fs::HostFs;
pub use dynamic_fs::{DynamicFs, DynamicFsOptions};
