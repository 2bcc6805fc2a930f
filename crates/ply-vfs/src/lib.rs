//! # ply-vfs
//!
//! The in-memory project tree that learners edit and the bundler reads.
//!
//! The store is an explicit value owned by its caller. Editing operations mutate
//! it synchronously; a bundling pass works on [`FlatFiles`], an owned snapshot
//! produced by [`VirtualFileStore::flatten`], so in-flight builds never observe
//! later edits.
//!
//! ```
//! use ply_vfs::{Created, VirtualFileStore};
//!
//! let mut store = VirtualFileStore::new();
//! store.create_file("src/index.js", "import './style.css'")?;
//! assert_eq!(store.create_folder("src")?, Created::Conflict);
//!
//! store.relocate("src/index.js", "src/main.js")?;
//! let files = store.flatten();
//! assert!(files.contains_key("src/main.js"));
//! # Ok::<(), ply_vfs::VfsError>(())
//! ```

mod error;
mod node;
mod path;
mod store;

pub use error::{Result, VfsError};
pub use node::{FileLeaf, FileNode, FolderNode, display_order};
pub use path::ModulePath;
pub use store::{Created, FlatFiles, VirtualFileStore};
