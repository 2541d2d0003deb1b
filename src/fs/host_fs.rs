//! Host File System
//!
//! `FileSystem` implementation backed by the real filesystem: `std::fs` for
//! the sync forms and `tokio::fs` for the async forms. Errors are reported in
//! the `CODE: description, syscall 'path'` shape of the host platform.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::stats::Stats;
use super::stream::ReadStream;
use super::types::*;

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostFs;

impl HostFs {
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// Error translation
// ============================================================================

/// Translate an I/O error into the errno-coded shape callers branch on.
pub(crate) fn host_error(err: io::Error, syscall: &str, path: Option<&str>) -> FsError {
    let errno = err.raw_os_error();
    let (code, description) = match errno.and_then(errno_name) {
        Some(known) => known,
        None => kind_name(&err),
    };
    let description = if code == "UNKNOWN" {
        err.to_string()
    } else {
        description.to_string()
    };
    FsError::Host {
        code: code.to_string(),
        description,
        syscall: syscall.to_string(),
        path: path.map(str::to_string),
        errno,
    }
}

/// Reading a directory fails on `read`, not `open`, and carries no path.
fn read_error(err: io::Error, path: &str) -> FsError {
    if is_directory_error(&err) {
        host_error(err, "read", None)
    } else {
        host_error(err, "open", Some(path))
    }
}

fn is_directory_error(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EISDIR)
    }
    #[cfg(not(unix))]
    {
        err.kind() == io::ErrorKind::IsADirectory
    }
}

#[cfg(unix)]
fn errno_name(errno: i32) -> Option<(&'static str, &'static str)> {
    let name = match errno {
        libc::ENOENT => ("ENOENT", "no such file or directory"),
        libc::EACCES => ("EACCES", "permission denied"),
        libc::EEXIST => ("EEXIST", "file already exists"),
        libc::EISDIR => ("EISDIR", "illegal operation on a directory"),
        libc::ENOTDIR => ("ENOTDIR", "not a directory"),
        libc::ENOTEMPTY => ("ENOTEMPTY", "directory not empty"),
        libc::ELOOP => ("ELOOP", "too many symbolic links encountered"),
        libc::EPERM => ("EPERM", "operation not permitted"),
        libc::EINVAL => ("EINVAL", "invalid argument"),
        libc::ENAMETOOLONG => ("ENAMETOOLONG", "name too long"),
        libc::EMFILE => ("EMFILE", "too many open files"),
        libc::EBADF => ("EBADF", "bad file descriptor"),
        libc::EBUSY => ("EBUSY", "resource busy or locked"),
        libc::EROFS => ("EROFS", "read-only file system"),
        libc::ENOSPC => ("ENOSPC", "no space left on device"),
        libc::EXDEV => ("EXDEV", "cross-device link not permitted"),
        libc::EIO => ("EIO", "i/o error"),
        _ => return None,
    };
    Some(name)
}

#[cfg(not(unix))]
fn errno_name(_errno: i32) -> Option<(&'static str, &'static str)> {
    None
}

fn kind_name(err: &io::Error) -> (&'static str, &'static str) {
    match err.kind() {
        io::ErrorKind::NotFound => ("ENOENT", "no such file or directory"),
        io::ErrorKind::PermissionDenied => ("EACCES", "permission denied"),
        io::ErrorKind::AlreadyExists => ("EEXIST", "file already exists"),
        io::ErrorKind::InvalidInput => ("EINVAL", "invalid argument"),
        _ => ("UNKNOWN", "unknown error"),
    }
}

fn lossy(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ============================================================================
// FileSystem trait implementation
// ============================================================================

#[async_trait]
impl FileSystem for HostFs {
    fn exists_sync(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn read_file_sync(&self, path: &str, options: &ReadOptions) -> Result<FileData, FsError> {
        let bytes = std::fs::read(path).map_err(|e| read_error(e, path))?;
        Ok(FileData::from_bytes(bytes, options.encoding))
    }

    async fn read_file(&self, path: &str, options: &ReadOptions) -> Result<FileData, FsError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| read_error(e, path))?;
        Ok(FileData::from_bytes(bytes, options.encoding))
    }

    fn readdir_sync(&self, path: &str, options: &ReaddirOptions) -> Result<Vec<String>, FsError> {
        let scandir = |e| host_error(e, "scandir", Some(path));
        let mut names = Vec::new();
        let mut pending = vec![(PathBuf::from(path), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            for entry in std::fs::read_dir(&dir).map_err(scandir)? {
                let entry = entry.map_err(scandir)?;
                let name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
                if options.recursive && entry.file_type().map_err(scandir)?.is_dir() {
                    pending.push((entry.path(), format!("{}/", name)));
                }
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn readdir(&self, path: &str, options: &ReaddirOptions) -> Result<Vec<String>, FsError> {
        let scandir = |e| host_error(e, "scandir", Some(path));
        let mut names = Vec::new();
        let mut pending = vec![(PathBuf::from(path), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(scandir)?;
            while let Some(entry) = entries.next_entry().await.map_err(scandir)? {
                let name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
                if options.recursive && entry.file_type().await.map_err(scandir)?.is_dir() {
                    pending.push((entry.path(), format!("{}/", name)));
                }
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn stat_sync(&self, path: &str) -> Result<Stats, FsError> {
        std::fs::metadata(path)
            .map(Stats::Host)
            .map_err(|e| host_error(e, "stat", Some(path)))
    }

    async fn stat(&self, path: &str) -> Result<Stats, FsError> {
        tokio::fs::metadata(path)
            .await
            .map(Stats::Host)
            .map_err(|e| host_error(e, "stat", Some(path)))
    }

    fn lstat_sync(&self, path: &str) -> Result<Stats, FsError> {
        std::fs::symlink_metadata(path)
            .map(Stats::Host)
            .map_err(|e| host_error(e, "lstat", Some(path)))
    }

    async fn lstat(&self, path: &str) -> Result<Stats, FsError> {
        tokio::fs::symlink_metadata(path)
            .await
            .map(Stats::Host)
            .map_err(|e| host_error(e, "lstat", Some(path)))
    }

    fn realpath_sync(&self, path: &str) -> Result<String, FsError> {
        std::fs::canonicalize(path)
            .map(|p| lossy(&p))
            .map_err(|e| host_error(e, "realpath", Some(path)))
    }

    async fn realpath(&self, path: &str) -> Result<String, FsError> {
        tokio::fs::canonicalize(path)
            .await
            .map(|p| lossy(&p))
            .map_err(|e| host_error(e, "realpath", Some(path)))
    }

    fn readlink_sync(&self, path: &str) -> Result<String, FsError> {
        std::fs::read_link(path)
            .map(|p| lossy(&p))
            .map_err(|e| host_error(e, "readlink", Some(path)))
    }

    async fn readlink(&self, path: &str) -> Result<String, FsError> {
        tokio::fs::read_link(path)
            .await
            .map(|p| lossy(&p))
            .map_err(|e| host_error(e, "readlink", Some(path)))
    }

    fn write_file_sync(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        std::fs::write(path, content).map_err(|e| host_error(e, "open", Some(path)))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| host_error(e, "open", Some(path)))
    }

    fn mkdir_sync(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let result = if options.recursive {
            std::fs::create_dir_all(path)
        } else {
            std::fs::create_dir(path)
        };
        result.map_err(|e| host_error(e, "mkdir", Some(path)))
    }

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        let result = if options.recursive {
            tokio::fs::create_dir_all(path).await
        } else {
            tokio::fs::create_dir(path).await
        };
        result.map_err(|e| host_error(e, "mkdir", Some(path)))
    }

    fn rm_sync(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        let meta = match std::fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if options.force && e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(host_error(e, "lstat", Some(path))),
        };
        let result = if meta.is_dir() {
            if !options.recursive {
                return Err(rm_directory_error(path));
            }
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        result.map_err(|e| host_error(e, "rm", Some(path)))
    }

    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        let meta = match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if options.force && e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(host_error(e, "lstat", Some(path))),
        };
        let result = if meta.is_dir() {
            if !options.recursive {
                return Err(rm_directory_error(path));
            }
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        result.map_err(|e| host_error(e, "rm", Some(path)))
    }

    fn create_read_stream(&self, path: &str, options: &ReadOptions) -> ReadStream {
        ReadStream::from_host(path, options)
    }
}

fn rm_directory_error(path: &str) -> FsError {
    FsError::Host {
        code: "ERR_FS_EISDIR".to_string(),
        description: "path is a directory".to_string(),
        syscall: "rm".to_string(),
        path: Some(path.to_string()),
        errno: None,
    }
}

// ============================================================================
// Tests
// ============================================================================
