//! File System Types
//!
//! Core types and the `FileSystem` trait shared by the overlay and the host
//! filesystem it falls back to.

use std::ops::Range;
use std::str::FromStr;

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

use super::encoding::{decode, BufferEncoding, UnknownEncoding};
use super::stats::Stats;
use super::stream::ReadStream;

/// File system errors
///
/// The overlay synthesizes only `IsDirectory` and `NotDirectory`; everything
/// else comes from the host filesystem as `Host`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("EISDIR: illegal operation on a directory, read")]
    IsDirectory,

    #[error("ENOTDIR: not a directory, scandir '{path}'")]
    NotDirectory { path: String },

    #[error("{code}: {description}, {syscall}{}", quoted_path(.path))]
    Host {
        code: String,
        description: String,
        syscall: String,
        path: Option<String>,
        errno: Option<i32>,
    },
}

fn quoted_path(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" '{}'", p),
        None => String::new(),
    }
}

impl FsError {
    /// The errno-style discriminator (`EISDIR`, `ENOTDIR`, `ENOENT`, ...).
    pub fn code(&self) -> &str {
        match self {
            Self::IsDirectory => "EISDIR",
            Self::NotDirectory { .. } => "ENOTDIR",
            Self::Host { code, .. } => code,
        }
    }

    /// The path the error refers to, if it carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::IsDirectory => None,
            Self::NotDirectory { path } => Some(path),
            Self::Host { path, .. } => path.as_deref(),
        }
    }

    /// The system call the error is attributed to.
    pub fn syscall(&self) -> &str {
        match self {
            Self::IsDirectory => "read",
            Self::NotDirectory { .. } => "scandir",
            Self::Host { syscall, .. } => syscall,
        }
    }
}

/// Errors raised while building an overlay or loading a manifest.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot store an overlay file at the root directory")]
    EmptyPath,

    #[error("cannot store '{path}': '{file}' is a file")]
    FileInPath { path: String, file: String },

    #[error("cannot store '{path}': it is a directory")]
    DirectoryInPlace { path: String },

    #[error("cannot read manifest '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {format} manifest: {message}")]
    Parse { format: &'static str, message: String },

    #[error("unsupported manifest format: '{0}'")]
    UnknownFormat(String),

    #[error("invalid content for '{path}': {message}")]
    InvalidContent { path: String, message: String },
}

/// Content supplied for a synthetic file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileContent::Text(s) => s.into_bytes(),
            FileContent::Binary(b) => b,
        }
    }
}

impl From<String> for FileContent {
    fn from(s: String) -> Self {
        FileContent::Text(s)
    }
}

impl From<&str> for FileContent {
    fn from(s: &str) -> Self {
        FileContent::Text(s.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(v: Vec<u8>) -> Self {
        FileContent::Binary(v)
    }
}

impl From<&[u8]> for FileContent {
    fn from(v: &[u8]) -> Self {
        FileContent::Binary(v.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for FileContent {
    fn from(v: &[u8; N]) -> Self {
        FileContent::Binary(v.to_vec())
    }
}

/// Initial files map type. Order matters: later entries win.
pub type InitialFiles = IndexMap<String, FileContent>;

/// Options for reads and read streams.
///
/// `start`/`end` describe the half-open byte range `[start, end)` and only
/// apply to read streams. An `end` of zero reads to the end of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub encoding: Option<BufferEncoding>,
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: BufferEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_range(mut self, start: Option<usize>, end: Option<usize>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Byte range selected from a buffer of `len` bytes, clamped to it.
    pub fn byte_range(&self, len: usize) -> Range<usize> {
        let start = self.start.unwrap_or(0).min(len);
        let end = self.end_offset().unwrap_or(len).min(len).max(start);
        start..end
    }

    /// The exclusive end offset, or `None` when the read runs to the end.
    pub fn end_offset(&self) -> Option<usize> {
        self.end.filter(|&end| end != 0)
    }
}

impl From<BufferEncoding> for ReadOptions {
    fn from(encoding: BufferEncoding) -> Self {
        Self::new().with_encoding(encoding)
    }
}

/// A bare encoding label is shorthand for `{ encoding: <label> }`.
impl FromStr for ReadOptions {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.parse::<BufferEncoding>()?))
    }
}

/// File contents as returned by a read: raw bytes, or text when an encoding
/// was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Buffer(Vec<u8>),
    Text(String),
}

impl FileData {
    /// Wrap `bytes`, decoding them when an encoding is given.
    pub fn from_bytes(bytes: Vec<u8>, encoding: Option<BufferEncoding>) -> Self {
        match encoding {
            Some(encoding) => FileData::Text(decode(&bytes, encoding)),
            None => FileData::Buffer(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileData::Buffer(b) => b,
            FileData::Text(s) => s.as_bytes(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileData::Text(s) => Some(s),
            FileData::Buffer(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileData::Buffer(b) => b,
            FileData::Text(s) => s.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Options for readdir operation
#[derive(Debug, Clone, Default)]
pub struct ReaddirOptions {
    /// List every descendant as a `/`-separated path relative to the directory
    pub recursive: bool,
}

/// Options for mkdir operation
#[derive(Debug, Clone, Default)]
pub struct MkdirOptions {
    pub recursive: bool,
}

/// Options for rm operation
#[derive(Debug, Clone, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

/// Abstract filesystem interface implemented by the host adapter and by the
/// overlay itself, so overlays can be stacked on any implementation.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Check if a path exists
    fn exists_sync(&self, path: &str) -> bool;

    /// Read a whole file, decoding it when `options.encoding` is set
    fn read_file_sync(&self, path: &str, options: &ReadOptions) -> Result<FileData, FsError>;

    async fn read_file(&self, path: &str, options: &ReadOptions) -> Result<FileData, FsError>;

    /// Read directory contents (entry names, sorted)
    fn readdir_sync(&self, path: &str, options: &ReaddirOptions) -> Result<Vec<String>, FsError>;

    async fn readdir(&self, path: &str, options: &ReaddirOptions) -> Result<Vec<String>, FsError>;

    /// Get file/directory information (follows symlinks)
    fn stat_sync(&self, path: &str) -> Result<Stats, FsError>;

    async fn stat(&self, path: &str) -> Result<Stats, FsError>;

    /// Get file/directory information (does not follow symlinks)
    fn lstat_sync(&self, path: &str) -> Result<Stats, FsError>;

    async fn lstat(&self, path: &str) -> Result<Stats, FsError>;

    /// Resolve a path to its canonical absolute form
    fn realpath_sync(&self, path: &str) -> Result<String, FsError>;

    async fn realpath(&self, path: &str) -> Result<String, FsError>;

    /// Read the target of a symbolic link
    fn readlink_sync(&self, path: &str) -> Result<String, FsError>;

    async fn readlink(&self, path: &str) -> Result<String, FsError>;

    /// Write content to a file, creating it if it doesn't exist
    fn write_file_sync(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError>;

    /// Create a directory
    fn mkdir_sync(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError>;

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError>;

    /// Remove a file or directory
    fn rm_sync(&self, path: &str, options: &RmOptions) -> Result<(), FsError>;

    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError>;

    /// Open a readable event stream over a file
    fn create_read_stream(&self, path: &str, options: &ReadOptions) -> ReadStream;
}

// ============================================================================
// Tests
// ============================================================================
