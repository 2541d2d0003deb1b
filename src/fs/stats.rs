//! File Status
//!
//! A status descriptor with the predicate set of a real status object, backed
//! either by an overlay node or by host metadata.

use std::fs::Metadata;

use super::tree::NodeRef;

#[derive(Debug, Clone)]
pub enum Stats {
    /// A synthetic file of the given length.
    File { size: u64 },
    /// A synthetic directory.
    Directory,
    /// Metadata reported by the host filesystem.
    Host(Metadata),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Special {
    BlockDevice,
    CharacterDevice,
    Fifo,
    Socket,
}

#[cfg(unix)]
fn special(meta: &Metadata) -> Option<Special> {
    use std::os::unix::fs::FileTypeExt;
    let ft = meta.file_type();
    if ft.is_block_device() {
        Some(Special::BlockDevice)
    } else if ft.is_char_device() {
        Some(Special::CharacterDevice)
    } else if ft.is_fifo() {
        Some(Special::Fifo)
    } else if ft.is_socket() {
        Some(Special::Socket)
    } else {
        None
    }
}

#[cfg(not(unix))]
fn special(_meta: &Metadata) -> Option<Special> {
    None
}

impl Stats {
    pub fn from_node(node: NodeRef<'_>) -> Self {
        match node {
            NodeRef::File(content) => Stats::File { size: content.len() as u64 },
            NodeRef::Directory(_) => Stats::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        match self {
            Stats::File { .. } => true,
            Stats::Directory => false,
            Stats::Host(meta) => meta.file_type().is_file(),
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            Stats::File { .. } => false,
            Stats::Directory => true,
            Stats::Host(meta) => meta.file_type().is_dir(),
        }
    }

    pub fn is_symbolic_link(&self) -> bool {
        match self {
            Stats::Host(meta) => meta.file_type().is_symlink(),
            _ => false,
        }
    }

    pub fn is_block_device(&self) -> bool {
        self.special() == Some(Special::BlockDevice)
    }

    pub fn is_character_device(&self) -> bool {
        self.special() == Some(Special::CharacterDevice)
    }

    pub fn is_fifo(&self) -> bool {
        self.special() == Some(Special::Fifo)
    }

    pub fn is_socket(&self) -> bool {
        self.special() == Some(Special::Socket)
    }

    /// Size in bytes; zero for synthetic directories.
    pub fn size(&self) -> u64 {
        match self {
            Stats::File { size } => *size,
            Stats::Directory => 0,
            Stats::Host(meta) => meta.len(),
        }
    }

    /// Whether this descriptor came from the overlay rather than the host.
    pub fn is_synthetic(&self) -> bool {
        !matches!(self, Stats::Host(_))
    }

    /// Short name of the entry type, as `stat` tools print it.
    pub fn kind(&self) -> &'static str {
        if self.is_file() {
            return "regular file";
        }
        if self.is_directory() {
            return "directory";
        }
        if self.is_symbolic_link() {
            return "symbolic link";
        }
        match self.special() {
            Some(Special::BlockDevice) => "block special file",
            Some(Special::CharacterDevice) => "character special file",
            Some(Special::Fifo) => "fifo",
            Some(Special::Socket) => "socket",
            None => "unknown",
        }
    }

    fn special(&self) -> Option<Special> {
        match self {
            Stats::Host(meta) => special(meta),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
