/// Errors raised by structural operations on the virtual tree.
///
/// Name conflicts on create are not errors: they are logged and reported as
/// [`Created::Conflict`](crate::Created).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VfsError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("'{path}' is a file, not a folder")]
    NotAFolder { path: String },

    #[error("'{path}' is a folder, not a file")]
    NotAFile { path: String },

    #[error("No file or folder at '{path}'")]
    NotFound { path: String },

    #[error("'{path}' already exists")]
    AlreadyExists { path: String },

    /// Moving a node onto itself or into its own subtree.
    #[error("Cannot move '{from}' to '{to}'")]
    InvalidMove { from: String, to: String },

    #[error("'{path}' is read-only")]
    ReadOnly { path: String },
}

pub type Result<T> = std::result::Result<T, VfsError>;
