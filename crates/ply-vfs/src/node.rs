use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VfsError};

/// File content plus whether learners may edit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLeaf {
    pub content: String,
    pub modifiable: bool,
}

impl FileLeaf {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            modifiable: true,
        }
    }

    /// A leaf learners cannot edit.
    pub fn locked(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            modifiable: false,
        }
    }
}

/// A folder owns its children by value, so the tree cannot contain cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderNode {
    pub children: IndexMap<String, FileNode>,
    pub modifiable: bool,
}

impl FolderNode {
    pub fn new(modifiable: bool) -> Self {
        Self {
            children: IndexMap::new(),
            modifiable,
        }
    }

    pub(crate) fn child(&self, segments: &[&str]) -> Option<&FileNode> {
        let (first, rest) = segments.split_first()?;
        let node = self.children.get(*first)?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            FileNode::Folder(folder) => folder.child(rest),
            FileNode::File(_) => None,
        }
    }

    pub(crate) fn child_mut(&mut self, segments: &[&str]) -> Option<&mut FileNode> {
        let (first, rest) = segments.split_first()?;
        let node = self.children.get_mut(*first)?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            FileNode::Folder(folder) => folder.child_mut(rest),
            FileNode::File(_) => None,
        }
    }

    /// Fails if any existing segment along `segments` is a file.
    pub(crate) fn check_parents(&self, segments: &[&str]) -> Result<()> {
        let mut current = self;
        for (depth, segment) in segments.iter().enumerate() {
            match current.children.get(*segment) {
                Some(FileNode::Folder(folder)) => current = folder,
                Some(FileNode::File(_)) => {
                    return Err(VfsError::NotAFolder {
                        path: segments[..=depth].join("/"),
                    });
                }
                None => return Ok(()),
            }
        }
        Ok(())
    }

    /// Walks down `segments`, creating missing folders on the way.
    pub(crate) fn descend_or_create(&mut self, segments: &[&str]) -> Result<&mut FolderNode> {
        let mut current = self;
        for (depth, segment) in segments.iter().enumerate() {
            let node = current
                .children
                .entry((*segment).to_string())
                .or_insert_with(|| FileNode::Folder(FolderNode::new(true)));
            current = match node {
                FileNode::Folder(folder) => folder,
                FileNode::File(_) => {
                    return Err(VfsError::NotAFolder {
                        path: segments[..=depth].join("/"),
                    });
                }
            };
        }
        Ok(current)
    }

    /// Removes and returns the node at `segments`.
    pub(crate) fn detach(&mut self, segments: &[&str]) -> Option<FileNode> {
        let (name, parents) = segments.split_last()?;
        let parent = if parents.is_empty() {
            self
        } else {
            match self.child_mut(parents)? {
                FileNode::Folder(folder) => folder,
                FileNode::File(_) => return None,
            }
        };
        parent.children.shift_remove(*name)
    }
}

impl Default for FolderNode {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileNode {
    File(FileLeaf),
    Folder(FolderNode),
}

impl FileNode {
    pub fn is_file(&self) -> bool {
        matches!(self, FileNode::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileNode::Folder(_))
    }

    pub fn modifiable(&self) -> bool {
        match self {
            FileNode::File(leaf) => leaf.modifiable,
            FileNode::Folder(folder) => folder.modifiable,
        }
    }

    pub fn as_file(&self) -> Option<&FileLeaf> {
        match self {
            FileNode::File(leaf) => Some(leaf),
            FileNode::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            FileNode::Folder(folder) => Some(folder),
            FileNode::File(_) => None,
        }
    }
}

/// Ordering used by file explorers: folders before files, then by name.
///
/// ```
/// use ply_vfs::{FileLeaf, FileNode, FolderNode, display_order};
///
/// let folder = FileNode::Folder(FolderNode::new(true));
/// let file = FileNode::File(FileLeaf::new(""));
/// let mut entries = vec![("b.js", &file), ("z", &folder), ("a.js", &file)];
/// entries.sort_by(|a, b| display_order(*a, *b));
/// let names: Vec<_> = entries.iter().map(|(name, _)| *name).collect();
/// assert_eq!(names, ["z", "a.js", "b.js"]);
/// ```
pub fn display_order(a: (&str, &FileNode), b: (&str, &FileNode)) -> Ordering {
    match (a.1.is_folder(), b.1.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.0.cmp(b.0),
    }
}
