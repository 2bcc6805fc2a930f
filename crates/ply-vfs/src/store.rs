use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Result, VfsError};
use crate::node::{FileLeaf, FileNode, FolderNode};
use crate::path::{ModulePath, split_path};

/// Flattened view of the tree: full path to leaf, in path order.
pub type FlatFiles = BTreeMap<ModulePath, FileLeaf>;

/// Outcome of a create operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Created {
    New,
    /// The name was already taken; nothing was changed.
    Conflict,
}

/// Hierarchical in-memory project tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFileStore {
    root: FolderNode,
}

impl VirtualFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from a flattened view.
    ///
    /// Empty folders are not represented in [`FlatFiles`] and do not come back.
    pub fn from_flat(files: &FlatFiles) -> Result<Self> {
        let mut store = Self::new();
        for (path, leaf) in files {
            if store.create_file_with(path.as_str(), leaf.clone())? == Created::Conflict {
                return Err(VfsError::AlreadyExists {
                    path: path.to_string(),
                });
            }
        }
        Ok(store)
    }

    pub fn root(&self) -> &FolderNode {
        &self.root
    }

    /// Creates an editable file, creating missing parent folders.
    pub fn create_file(&mut self, path: &str, content: impl Into<String>) -> Result<Created> {
        self.create_file_with(path, FileLeaf::new(content))
    }

    pub fn create_file_with(&mut self, path: &str, leaf: FileLeaf) -> Result<Created> {
        self.insert(path, FileNode::File(leaf))
    }

    /// Creates an editable folder, creating missing parent folders.
    pub fn create_folder(&mut self, path: &str) -> Result<Created> {
        self.create_folder_with(path, true)
    }

    pub fn create_folder_with(&mut self, path: &str, modifiable: bool) -> Result<Created> {
        self.insert(path, FileNode::Folder(FolderNode::new(modifiable)))
    }

    fn insert(&mut self, path: &str, node: FileNode) -> Result<Created> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            return Err(VfsError::InvalidPath {
                path: path.to_string(),
                reason: "path is empty",
            });
        };

        self.root.check_parents(parents)?;
        let folder = self.root.descend_or_create(parents)?;
        if folder.children.contains_key(*name) {
            warn!(path, "a file or folder with this name already exists");
            return Ok(Created::Conflict);
        }

        folder.children.insert((*name).to_string(), node);
        debug!(path, "created node");
        Ok(Created::New)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&FileNode> {
        let segments = split_path(path).ok()?;
        self.root.child(&segments)
    }

    pub fn get_file(&self, path: &str) -> Option<&FileLeaf> {
        self.get(path).and_then(FileNode::as_file)
    }

    /// Removes a file or a folder with everything below it.
    pub fn delete(&mut self, path: &str) -> Result<FileNode> {
        let segments = split_path(path)?;
        let removed = self.root.detach(&segments).ok_or_else(|| VfsError::NotFound {
            path: path.to_string(),
        })?;
        debug!(path, "deleted node");
        Ok(removed)
    }

    /// Replaces the content of an existing, modifiable file.
    pub fn update(&mut self, path: &str, content: impl Into<String>) -> Result<()> {
        let segments = split_path(path)?;
        match self.root.child_mut(&segments) {
            Some(FileNode::File(leaf)) if !leaf.modifiable => Err(VfsError::ReadOnly {
                path: path.to_string(),
            }),
            Some(FileNode::File(leaf)) => {
                leaf.content = content.into();
                Ok(())
            }
            Some(FileNode::Folder(_)) => Err(VfsError::NotAFile {
                path: path.to_string(),
            }),
            None => Err(VfsError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    /// Moves the node at `from` to `to` as a single step.
    ///
    /// The move is staged on a copy of the tree and committed only when every
    /// step succeeds, so a failed move leaves the store untouched.
    pub fn relocate(&mut self, from: &str, to: &str) -> Result<()> {
        let source = split_path(from)?;
        let target = split_path(to)?;
        if target.starts_with(&source) {
            return Err(VfsError::InvalidMove {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        let Some((name, parents)) = target.split_last() else {
            return Err(VfsError::InvalidPath {
                path: to.to_string(),
                reason: "path is empty",
            });
        };

        let mut staged = self.root.clone();
        let node = staged.detach(&source).ok_or_else(|| VfsError::NotFound {
            path: from.to_string(),
        })?;
        let folder = staged.descend_or_create(parents)?;
        if folder.children.contains_key(*name) {
            return Err(VfsError::AlreadyExists {
                path: to.to_string(),
            });
        }
        folder.children.insert((*name).to_string(), node);

        self.root = staged;
        debug!(from, to, "relocated node");
        Ok(())
    }

    /// Alias of [`relocate`](Self::relocate).
    pub fn move_node(&mut self, from: &str, to: &str) -> Result<()> {
        self.relocate(from, to)
    }

    /// Every leaf keyed by its full `/`-joined path.
    pub fn flatten(&self) -> FlatFiles {
        let mut files = FlatFiles::new();
        flatten_into(&self.root, "", &mut files);
        files
    }
}

fn flatten_into(folder: &FolderNode, prefix: &str, files: &mut FlatFiles) {
    for (name, node) in &folder.children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        match node {
            FileNode::File(leaf) => {
                files.insert(ModulePath::new(path), leaf.clone());
            }
            FileNode::Folder(child) => flatten_into(child, &path, files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(paths: &[&str]) -> VirtualFileStore {
        let mut store = VirtualFileStore::new();
        for path in paths {
            assert_eq!(store.create_file(path, *path).unwrap(), Created::New);
        }
        store
    }

    #[test]
    fn test_create_file_makes_intermediate_folders() {
        let store = store_with(&["src/components/App.jsx"]);
        assert!(store.get("src").unwrap().is_folder());
        assert!(store.get("src/components").unwrap().is_folder());
        assert_eq!(
            store.get_file("src/components/App.jsx").unwrap().content,
            "src/components/App.jsx"
        );
    }

    #[test]
    fn test_create_conflict_is_noop() {
        let mut store = store_with(&["index.js"]);
        assert_eq!(store.create_file("index.js", "other").unwrap(), Created::Conflict);
        assert_eq!(store.create_folder("index.js").unwrap(), Created::Conflict);
        assert_eq!(store.get_file("index.js").unwrap().content, "index.js");
    }

    #[test]
    fn test_create_below_file_fails_without_side_effects() {
        let mut store = store_with(&["a.js"]);
        let err = store.create_file("a.js/b/c.js", "").unwrap_err();
        assert_eq!(err, VfsError::NotAFolder { path: "a.js".into() });
        assert_eq!(store.flatten().len(), 1);
    }

    #[test]
    fn test_delete_folder_removes_subtree() {
        let mut store = store_with(&["src/a.js", "src/lib/b.js", "index.js"]);
        let removed = store.delete("src").unwrap();
        assert!(removed.is_folder());
        assert!(!store.exists("src/lib/b.js"));
        assert!(store.exists("index.js"));
        assert!(matches!(store.delete("src"), Err(VfsError::NotFound { .. })));
    }

    #[test]
    fn test_update() {
        let mut store = store_with(&["a.js"]);
        store.update("a.js", "changed").unwrap();
        assert_eq!(store.get_file("a.js").unwrap().content, "changed");

        store.create_folder("dir").unwrap();
        assert!(matches!(store.update("dir", "x"), Err(VfsError::NotAFile { .. })));
        assert!(matches!(store.update("missing.js", "x"), Err(VfsError::NotFound { .. })));
    }

    #[test]
    fn test_update_locked_file_is_rejected() {
        let mut store = VirtualFileStore::new();
        store
            .create_file_with("tests/spec.js", FileLeaf::locked("expect(1)"))
            .unwrap();
        let err = store.update("tests/spec.js", "nope").unwrap_err();
        assert_eq!(err, VfsError::ReadOnly { path: "tests/spec.js".into() });
        assert_eq!(store.get_file("tests/spec.js").unwrap().content, "expect(1)");
    }

    #[test]
    fn test_relocate_file_and_folder() {
        let mut store = store_with(&["src/a.js", "src/lib/b.js"]);
        store.relocate("src/a.js", "app/main.js").unwrap();
        assert!(!store.exists("src/a.js"));
        assert_eq!(store.get_file("app/main.js").unwrap().content, "src/a.js");

        store.relocate("src/lib", "app/lib").unwrap();
        assert!(store.exists("app/lib/b.js"));
        assert!(!store.exists("src/lib"));
    }

    #[test]
    fn test_relocate_failures_leave_store_untouched() {
        let mut store = store_with(&["src/a.js", "src/b.js", "readme.md"]);
        let before = store.clone();

        assert!(matches!(
            store.relocate("src/a.js", "src/b.js"),
            Err(VfsError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.relocate("src", "src/nested"),
            Err(VfsError::InvalidMove { .. })
        ));
        assert!(matches!(
            store.relocate("src/a.js", "readme.md/a.js"),
            Err(VfsError::NotAFolder { .. })
        ));
        assert!(matches!(
            store.relocate("missing.js", "other.js"),
            Err(VfsError::NotFound { .. })
        ));

        assert_eq!(store, before);
    }

    #[test]
    fn test_flatten_skips_folders() {
        let mut store = store_with(&["src/index.js", "public/index.html"]);
        store.create_folder("empty").unwrap();
        let flat = store.flatten();
        let keys: Vec<_> = flat.keys().map(ModulePath::as_str).collect();
        assert_eq!(keys, ["public/index.html", "src/index.js"]);
    }

    #[test]
    fn test_from_flat_rejects_file_folder_clash() {
        let mut flat = FlatFiles::new();
        flat.insert("a".into(), FileLeaf::new(""));
        flat.insert("a/b.js".into(), FileLeaf::new(""));
        assert!(VirtualFileStore::from_flat(&flat).is_err());
    }
}
