//! Path Tree
//!
//! The in-memory tree holding synthetic files. It is filled once while an
//! overlay is constructed and only read afterwards.

use std::collections::BTreeMap;

use super::types::LoadError;

/// Children of a directory, keyed by segment. Iteration is sorted.
pub type Directory = BTreeMap<String, Node>;

/// A tree node: a directory of further nodes, or the bytes of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directory(Directory),
    File(Vec<u8>),
}

impl Node {
    pub fn as_ref(&self) -> NodeRef<'_> {
        match self {
            Node::Directory(children) => NodeRef::Directory(children),
            Node::File(content) => NodeRef::File(content),
        }
    }
}

/// Borrowed view of a node found by a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    Directory(&'a Directory),
    File(&'a [u8]),
}

impl NodeRef<'_> {
    pub fn is_file(&self) -> bool {
        matches!(self, NodeRef::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, NodeRef::Directory(_))
    }
}

#[derive(Debug, Default)]
pub struct PathTree {
    root: Directory,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of file nodes anywhere in the tree.
    pub fn file_count(&self) -> usize {
        fn count(dir: &Directory) -> usize {
            dir.values()
                .map(|node| match node {
                    Node::Directory(children) => count(children),
                    Node::File(_) => 1,
                })
                .sum()
        }
        count(&self.root)
    }

    /// Walk the tree along `segments`.
    ///
    /// A missing segment anywhere ends the walk with `None`: a missing
    /// intermediate directory behaves like an empty one, so nothing below it
    /// can be found, and nothing is created. A file has no children either.
    /// No segments address the root, which only counts as present once the
    /// tree holds something.
    pub fn search(&self, segments: &[String]) -> Option<NodeRef<'_>> {
        if segments.is_empty() {
            return (!self.is_empty()).then_some(NodeRef::Directory(&self.root));
        }
        let mut current = NodeRef::Directory(&self.root);
        for segment in segments {
            current = match current {
                NodeRef::Directory(children) => children.get(segment)?.as_ref(),
                NodeRef::File(_) => return None,
            };
        }
        Some(current)
    }

    /// Walk the tree along all but the last segment, creating directories as
    /// needed, and return the containing directory with the final segment.
    pub fn prepare<'t, 's>(
        &'t mut self,
        segments: &'s [String],
    ) -> Result<(&'t mut Directory, &'s str), LoadError> {
        let (filename, parents) = segments.split_last().ok_or(LoadError::EmptyPath)?;
        let mut dir = &mut self.root;
        for (depth, segment) in parents.iter().enumerate() {
            let node = dir
                .entry(segment.clone())
                .or_insert_with(|| Node::Directory(Directory::new()));
            dir = match node {
                Node::Directory(children) => children,
                Node::File(_) => {
                    return Err(LoadError::FileInPath {
                        path: display(segments),
                        file: display(&segments[..=depth]),
                    })
                }
            };
        }
        Ok((dir, filename))
    }

    /// Store file content at `segments`, replacing an earlier file there.
    pub fn store(&mut self, segments: &[String], content: Vec<u8>) -> Result<(), LoadError> {
        let (dir, filename) = self.prepare(segments)?;
        match dir.get_mut(filename) {
            Some(Node::Directory(_)) => Err(LoadError::DirectoryInPlace {
                path: display(segments),
            }),
            Some(Node::File(existing)) => {
                *existing = content;
                Ok(())
            }
            None => {
                dir.insert(filename.to_string(), Node::File(content));
                Ok(())
            }
        }
    }
}

fn display(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

// ============================================================================
// Tests
// ============================================================================
