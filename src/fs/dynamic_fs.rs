//! Dynamic File System
//!
//! The overlay facade. Paths present in the in-memory tree are served from
//! memory; everything else, and every operation the overlay does not
//! emulate, is forwarded unchanged to the host `FileSystem`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::host_fs::HostFs;
use super::path::split_path;
use super::stats::Stats;
use super::stream::ReadStream;
use super::tree::{Directory, Node, NodeRef, PathTree};
use super::types::*;

/// Options for creating a `DynamicFs`.
#[derive(Default)]
pub struct DynamicFsOptions {
    /// Directory that `.`-prefixed paths are resolved against
    /// (defaults to the process working directory)
    pub base_dir: Option<String>,
    /// Filesystem to fall back to (defaults to `HostFs`)
    pub host: Option<Arc<dyn FileSystem>>,
}

/// A filesystem overlay of synthetic files over a host filesystem.
pub struct DynamicFs {
    tree: PathTree,
    base_dir: String,
    host: Arc<dyn FileSystem>,
}

impl DynamicFs {
    /// Build an overlay over the real filesystem.
    pub fn new<I, K, V>(files: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FileContent>,
    {
        Self::with_options(files, DynamicFsOptions::default())
    }

    /// Build an overlay with an explicit base directory and/or host.
    ///
    /// Files are stored in iteration order, so a later entry for the same
    /// path replaces an earlier one.
    pub fn with_options<I, K, V>(files: I, options: DynamicFsOptions) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FileContent>,
    {
        let base_dir = options.base_dir.unwrap_or_else(default_base_dir);
        let host = options.host.unwrap_or_else(|| Arc::new(HostFs::new()));

        let mut tree = PathTree::new();
        for (path, content) in files {
            let path = path.into();
            let segments = split_path(&path, &base_dir);
            tree.store(&segments, content.into().into_bytes())?;
        }
        tracing::info!(files = tree.file_count(), base_dir = %base_dir, "overlay loaded");

        Ok(Self { tree, base_dir, host })
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    /// Number of synthetic files in the overlay.
    pub fn file_count(&self) -> usize {
        self.tree.file_count()
    }

    /// Whether `path` is served from the overlay.
    pub fn is_synthetic(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Run `call` against the host filesystem.
    ///
    /// Every fallback and every operation the overlay does not emulate goes
    /// through here, with its arguments untouched.
    pub fn forward<'a, T>(
        &'a self,
        op: &'static str,
        path: &str,
        call: impl FnOnce(&'a dyn FileSystem) -> T,
    ) -> T {
        tracing::debug!(op, path, "forwarding to host filesystem");
        call(self.host.as_ref())
    }

    fn lookup(&self, path: &str) -> Option<NodeRef<'_>> {
        self.tree.search(&split_path(path, &self.base_dir))
    }

    fn hit(&self, op: &'static str, path: &str) -> Option<NodeRef<'_>> {
        let node = self.lookup(path);
        if node.is_some() {
            tracing::debug!(op, path, "serving from overlay");
        }
        node
    }
}

impl fmt::Debug for DynamicFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicFs")
            .field("base_dir", &self.base_dir)
            .field("files", &self.tree.file_count())
            .finish_non_exhaustive()
    }
}

fn default_base_dir() -> String {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "/".to_string())
}

fn read_node(node: NodeRef<'_>, options: &ReadOptions) -> Result<FileData, FsError> {
    match node {
        NodeRef::File(content) => Ok(FileData::from_bytes(content.to_vec(), options.encoding)),
        NodeRef::Directory(_) => Err(FsError::IsDirectory),
    }
}

fn list_node(
    node: NodeRef<'_>,
    path: &str,
    options: &ReaddirOptions,
) -> Result<Vec<String>, FsError> {
    match node {
        NodeRef::Directory(children) if options.recursive => {
            let mut names = Vec::new();
            list_descendants(children, "", &mut names);
            names.sort();
            Ok(names)
        }
        NodeRef::Directory(children) => Ok(children.keys().cloned().collect()),
        NodeRef::File(_) => Err(FsError::NotDirectory { path: path.to_string() }),
    }
}

fn list_descendants(dir: &Directory, prefix: &str, names: &mut Vec<String>) {
    for (name, node) in dir {
        let entry = format!("{}{}", prefix, name);
        if let Node::Directory(children) = node {
            list_descendants(children, &format!("{}/", entry), names);
        }
        names.push(entry);
    }
}

// ============================================================================
// FileSystem trait implementation
// ============================================================================

#[async_trait]
impl FileSystem for DynamicFs {
    fn exists_sync(&self, path: &str) -> bool {
        self.hit("exists", path).is_some() || self.forward("exists", path, |fs| fs.exists_sync(path))
    }

    fn read_file_sync(&self, path: &str, options: &ReadOptions) -> Result<FileData, FsError> {
        match self.hit("read_file", path) {
            Some(node) => read_node(node, options),
            None => self.forward("read_file", path, |fs| fs.read_file_sync(path, options)),
        }
    }

    async fn read_file(&self, path: &str, options: &ReadOptions) -> Result<FileData, FsError> {
        if !self.is_synthetic(path) {
            return self.forward("read_file", path, |fs| fs.read_file(path, options)).await;
        }
        tokio::task::yield_now().await;
        self.read_file_sync(path, options)
    }

    fn readdir_sync(&self, path: &str, options: &ReaddirOptions) -> Result<Vec<String>, FsError> {
        match self.hit("readdir", path) {
            Some(node) => list_node(node, path, options),
            None => self.forward("readdir", path, |fs| fs.readdir_sync(path, options)),
        }
    }

    async fn readdir(&self, path: &str, options: &ReaddirOptions) -> Result<Vec<String>, FsError> {
        if !self.is_synthetic(path) {
            return self.forward("readdir", path, |fs| fs.readdir(path, options)).await;
        }
        tokio::task::yield_now().await;
        self.readdir_sync(path, options)
    }

    fn stat_sync(&self, path: &str) -> Result<Stats, FsError> {
        match self.hit("stat", path) {
            Some(node) => Ok(Stats::from_node(node)),
            None => self.forward("stat", path, |fs| fs.stat_sync(path)),
        }
    }

    async fn stat(&self, path: &str) -> Result<Stats, FsError> {
        if !self.is_synthetic(path) {
            return self.forward("stat", path, |fs| fs.stat(path)).await;
        }
        tokio::task::yield_now().await;
        self.stat_sync(path)
    }

    fn lstat_sync(&self, path: &str) -> Result<Stats, FsError> {
        self.forward("lstat", path, |fs| fs.lstat_sync(path))
    }

    async fn lstat(&self, path: &str) -> Result<Stats, FsError> {
        self.forward("lstat", path, |fs| fs.lstat(path)).await
    }

    fn realpath_sync(&self, path: &str) -> Result<String, FsError> {
        self.forward("realpath", path, |fs| fs.realpath_sync(path))
    }

    async fn realpath(&self, path: &str) -> Result<String, FsError> {
        self.forward("realpath", path, |fs| fs.realpath(path)).await
    }

    fn readlink_sync(&self, path: &str) -> Result<String, FsError> {
        self.forward("readlink", path, |fs| fs.readlink_sync(path))
    }

    async fn readlink(&self, path: &str) -> Result<String, FsError> {
        self.forward("readlink", path, |fs| fs.readlink(path)).await
    }

    fn write_file_sync(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        self.forward("write_file", path, |fs| fs.write_file_sync(path, content))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), FsError> {
        self.forward("write_file", path, |fs| fs.write_file(path, content)).await
    }

    fn mkdir_sync(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        self.forward("mkdir", path, |fs| fs.mkdir_sync(path, options))
    }

    async fn mkdir(&self, path: &str, options: &MkdirOptions) -> Result<(), FsError> {
        self.forward("mkdir", path, |fs| fs.mkdir(path, options)).await
    }

    fn rm_sync(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        self.forward("rm", path, |fs| fs.rm_sync(path, options))
    }

    async fn rm(&self, path: &str, options: &RmOptions) -> Result<(), FsError> {
        self.forward("rm", path, |fs| fs.rm(path, options)).await
    }

    fn create_read_stream(&self, path: &str, options: &ReadOptions) -> ReadStream {
        match self.hit("create_read_stream", path) {
            Some(NodeRef::File(content)) => ReadStream::from_memory(path, Ok(content), options),
            Some(NodeRef::Directory(_)) => {
                ReadStream::from_memory(path, Err(FsError::IsDirectory), options)
            }
            None => self.forward("create_read_stream", path, |fs| {
                fs.create_read_stream(path, options)
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::encoding::BufferEncoding;
    use crate::fs::stream::StreamEvent;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn utf8() -> ReadOptions {
        BufferEncoding::Utf8.into()
    }

    fn sample() -> DynamicFs {
        DynamicFs::new([("/a/b.txt", "hello")]).unwrap()
    }

    #[test]
    fn test_concrete_scenario() {
        let fs = sample();
        assert!(fs.exists_sync("/a"));
        assert_eq!(fs.readdir_sync("/a", &ReaddirOptions::default()).unwrap(), vec!["b.txt"]);
        assert_eq!(
            fs.read_file_sync("/a/b.txt", &utf8()).unwrap(),
            FileData::Text("hello".to_string())
        );

        let err = fs.read_file_sync("/a", &ReadOptions::new()).unwrap_err();
        assert_eq!(err.code(), "EISDIR");

        let err = fs.readdir_sync("/a/b.txt", &ReaddirOptions::default()).unwrap_err();
        assert_eq!(err.code(), "ENOTDIR");
        assert!(err.to_string().contains("/a/b.txt"));
    }

    #[test]
    fn test_read_file_returns_exact_bytes() {
        let binary: &[u8] = &[0, 159, 146, 150, 255];
        let fs = DynamicFs::new([("/bin/blob", FileContent::from(binary))]).unwrap();
        assert_eq!(
            fs.read_file_sync("/bin/blob", &ReadOptions::new()).unwrap(),
            FileData::Buffer(binary.to_vec())
        );
        assert_eq!(
            fs.read_file_sync("/bin/blob", &BufferEncoding::Hex.into()).unwrap(),
            FileData::Text("009f9296ff".to_string())
        );
    }

    #[test]
    fn test_readdir_sorted_regardless_of_insertion() {
        let fs = DynamicFs::new([
            ("/d/zeta.txt", "z"),
            ("/d/alpha.txt", "a"),
            ("/d/mid/inner.txt", "m"),
            ("/d/Beta.txt", "b"),
        ])
        .unwrap();
        assert_eq!(
            fs.readdir_sync("/d", &ReaddirOptions::default()).unwrap(),
            vec!["Beta.txt", "alpha.txt", "mid", "zeta.txt"]
        );
    }

    #[test]
    fn test_stat_predicates() {
        let fs = sample();
        let file = fs.stat_sync("/a/b.txt").unwrap();
        assert!(file.is_file());
        assert!(!file.is_directory());
        assert!(!file.is_symbolic_link());
        assert!(!file.is_fifo());
        assert!(!file.is_socket());
        assert!(!file.is_block_device());
        assert!(!file.is_character_device());

        let dir = fs.stat_sync("/a").unwrap();
        assert!(dir.is_directory());
        assert!(!dir.is_file());
    }

    #[test]
    fn test_partial_overlap_falls_through() {
        let fs = sample();
        assert!(!fs.is_synthetic("/a/missing/b.txt"));
        assert!(!fs.is_synthetic("/a/b.txt/child"));
    }

    #[test]
    fn test_missing_paths_match_host() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt").to_string_lossy().into_owned();
        let fs = sample();
        let host = HostFs::new();

        assert!(!fs.exists_sync(&missing));
        assert_eq!(
            fs.read_file_sync(&missing, &ReadOptions::new()).unwrap_err(),
            host.read_file_sync(&missing, &ReadOptions::new()).unwrap_err()
        );
        assert_eq!(
            fs.readdir_sync(&missing, &ReaddirOptions::default()).unwrap_err(),
            host.readdir_sync(&missing, &ReaddirOptions::default()).unwrap_err()
        );
        assert_eq!(
            fs.stat_sync(&missing).unwrap_err(),
            host.stat_sync(&missing).unwrap_err()
        );
    }

    #[tokio::test]
    async fn test_missing_paths_match_host_async() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.txt").to_string_lossy().into_owned();
        let fs = sample();
        let host = HostFs::new();
        let listing = ReaddirOptions::default();

        let err = fs.read_file(&missing, &ReadOptions::new()).await.unwrap_err();
        assert_eq!(err, host.read_file(&missing, &ReadOptions::new()).await.unwrap_err());
        assert_eq!(err.code(), "ENOENT");

        let err = fs.readdir(&missing, &listing).await.unwrap_err();
        assert_eq!(err, host.readdir(&missing, &listing).await.unwrap_err());
        assert_eq!(err.syscall(), "scandir");

        let err = fs.stat(&missing).await.unwrap_err();
        assert_eq!(err, host.stat(&missing).await.unwrap_err());
        assert_eq!(err.syscall(), "stat");
    }

    #[tokio::test]
    async fn test_readdir_recursive() {
        let fs = DynamicFs::new([
            ("/r/top.txt", "t"),
            ("/r/sub/deeper/leaf.txt", "l"),
            ("/r/sub/mid.txt", "m"),
        ])
        .unwrap();
        let options = ReaddirOptions { recursive: true };
        let expected = vec!["sub", "sub/deeper", "sub/deeper/leaf.txt", "sub/mid.txt", "top.txt"];
        assert_eq!(fs.readdir_sync("/r", &options).unwrap(), expected);
        assert_eq!(fs.readdir("/r", &options).await.unwrap(), expected);

        // Listing options reach the host on fallback.
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("inner")).unwrap();
        std::fs::write(dir.path().join("inner/file.txt"), "").unwrap();
        let real = dir.path().to_string_lossy().into_owned();
        assert_eq!(
            fs.readdir(&real, &options).await.unwrap(),
            vec!["inner", "inner/file.txt"]
        );
    }

    #[test]
    fn test_real_files_are_still_visible() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.txt");
        std::fs::write(&real, "on disk").unwrap();
        let real = real.to_string_lossy().into_owned();

        let fs = sample();
        assert!(fs.exists_sync(&real));
        assert_eq!(
            fs.read_file_sync(&real, &utf8()).unwrap(),
            FileData::Text("on disk".to_string())
        );
        assert!(!fs.stat_sync(&real).unwrap().is_synthetic());
    }

    #[test]
    fn test_empty_overlay_does_not_claim_root() {
        let fs = DynamicFs::new(InitialFiles::new()).unwrap();
        assert!(!fs.is_synthetic("/"));
        assert!(sample().is_synthetic("/"));
    }

    #[test]
    fn test_dot_relative_paths_use_base_dir() {
        let fs = DynamicFs::with_options(
            [("./config.json", "{}")],
            DynamicFsOptions { base_dir: Some("/srv/app".to_string()), host: None },
        )
        .unwrap();
        assert_eq!(fs.base_dir(), "/srv/app");
        assert!(fs.is_synthetic("/srv/app/config.json"));
        assert!(fs.is_synthetic("./config.json"));
        assert!(fs.is_synthetic("../app/config.json"));
    }

    #[test]
    fn test_last_write_wins() {
        let fs = DynamicFs::new([("/a/b.txt", "first"), ("/a//b.txt", "second")]).unwrap();
        assert_eq!(fs.file_count(), 1);
        assert_eq!(
            fs.read_file_sync("/a/b.txt", &utf8()).unwrap(),
            FileData::Text("second".to_string())
        );
    }

    #[test]
    fn test_conflicting_entries_are_rejected() {
        let err = DynamicFs::new([("/a/b.txt", "x"), ("/a", "y")]).unwrap_err();
        assert!(matches!(err, LoadError::DirectoryInPlace { .. }));

        let err = DynamicFs::new([("/a", "y"), ("/a/b.txt", "x")]).unwrap_err();
        assert!(matches!(err, LoadError::FileInPath { .. }));

        let err = DynamicFs::new([("/", "root")]).unwrap_err();
        assert!(matches!(err, LoadError::EmptyPath));
    }

    #[tokio::test]
    async fn test_async_forms_mirror_sync() {
        let fs = sample();
        assert_eq!(
            fs.read_file("/a/b.txt", &utf8()).await.unwrap(),
            FileData::Text("hello".to_string())
        );
        assert_eq!(fs.read_file("/a", &ReadOptions::new()).await.unwrap_err(), FsError::IsDirectory);
        assert_eq!(fs.readdir("/a", &ReaddirOptions::default()).await.unwrap(), vec!["b.txt"]);
        assert_eq!(
            fs.readdir("/a/b.txt", &ReaddirOptions::default()).await.unwrap_err(),
            FsError::NotDirectory { path: "/a/b.txt".to_string() }
        );
        assert!(fs.stat("/a").await.unwrap().is_directory());
    }

    #[tokio::test]
    async fn test_async_result_arrives_after_a_scheduler_turn() {
        let fs = sample();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        tokio::spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });
        fs.read_file("/a/b.txt", &ReadOptions::new()).await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stream_synthetic_file() {
        let fs = sample();
        let opts = utf8().with_range(Some(1), Some(3));
        let events = fs.create_read_stream("/a/b.txt", &opts).collect_events().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Open,
                StreamEvent::Data(FileData::Text("el".to_string())),
                StreamEvent::End,
                StreamEvent::Close,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_synthetic_directory() {
        let fs = sample();
        let events = fs.create_read_stream("/a", &ReadOptions::new()).collect_events().await;
        assert_eq!(
            events,
            vec![StreamEvent::Open, StreamEvent::Error(FsError::IsDirectory), StreamEvent::Close]
        );
    }

    #[tokio::test]
    async fn test_stream_falls_back_to_host() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real.txt");
        std::fs::write(&real, "streamed").unwrap();

        let fs = sample();
        let stream = fs.create_read_stream(&real.to_string_lossy(), &"utf8".parse().unwrap());
        assert_eq!(stream.read_to_end().await.unwrap(), FileData::Text("streamed".to_string()));
    }

    #[tokio::test]
    async fn test_unemulated_operations_are_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let virtual_path = dir.path().join("virtual.txt").to_string_lossy().into_owned();
        let written = dir.path().join("written.txt").to_string_lossy().into_owned();
        let fs = DynamicFs::new([(virtual_path.clone(), "in memory")]).unwrap();

        // lstat is never emulated, even for overlay paths.
        assert_eq!(fs.lstat_sync(&virtual_path).unwrap_err().code(), "ENOENT");
        assert_eq!(fs.lstat(&virtual_path).await.unwrap_err().code(), "ENOENT");

        fs.write_file(&written, b"to disk").await.unwrap();
        assert_eq!(std::fs::read(&written).unwrap(), b"to disk");
        assert!(fs.realpath_sync(&written).unwrap().ends_with("written.txt"));
        fs.rm_sync(&written, &RmOptions::default()).unwrap();
        assert!(!fs.exists_sync(&written));
    }

    #[test]
    fn test_overlays_stack() {
        let lower: Arc<dyn FileSystem> =
            Arc::new(DynamicFs::new([("/lower/file.txt", "below")]).unwrap());
        let upper = DynamicFs::with_options(
            [("/upper/file.txt", "above")],
            DynamicFsOptions { base_dir: None, host: Some(lower) },
        )
        .unwrap();

        assert_eq!(
            upper.read_file_sync("/lower/file.txt", &utf8()).unwrap(),
            FileData::Text("below".to_string())
        );
        assert_eq!(
            upper.read_file_sync("/upper/file.txt", &utf8()).unwrap(),
            FileData::Text("above".to_string())
        );
        // The root of the upper overlay shadows the lower one.
        assert_eq!(upper.readdir_sync("/", &ReaddirOptions::default()).unwrap(), vec!["upper"]);
    }
}
