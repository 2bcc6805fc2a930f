//! Error taxonomy for a bundling pass.

use crate::resolver::ResolveError;

/// Every way a bundling pass can fail.
///
/// A pass reports at most one of these: the first failure aborts the pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    /// The project descriptor has no `main` field.
    #[error("{descriptor} does not declare a \"main\" entry point")]
    EntryPointMissing { descriptor: String },

    /// The declared entry point is not a file in the project.
    #[error("Entry point '{entry}' declared in {descriptor} does not exist")]
    EntryPointNotFound { entry: String, descriptor: String },

    /// A relative import could not be resolved to a project file.
    #[error("Could not resolve '{importee}' from '{importer}': {reason}")]
    FileNotFound {
        importee: String,
        importer: String,
        reason: String,
    },

    /// A bare import names a package missing from the dependency manifest.
    #[error(
        "'{specifier}' is imported by '{importer}' but is not listed in the dependencies of {descriptor}"
    )]
    Dependency {
        specifier: String,
        importer: String,
        descriptor: String,
    },

    /// A dialect transform rejected a file.
    #[error("{id}: {message}")]
    Compile {
        id: String,
        message: String,
        pos: Option<u32>,
    },

    /// Anything else caught at the pass boundary.
    #[error("{message}")]
    Generic {
        message: String,
        id: Option<String>,
        pos: Option<u32>,
    },
}

/// Result type alias for ply-bundler operations.
pub type Result<T> = std::result::Result<T, BundleError>;

impl BundleError {
    pub fn compile(id: impl Into<String>, message: impl Into<String>, pos: Option<u32>) -> Self {
        BundleError::Compile {
            id: id.into(),
            message: message.into(),
            pos,
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        BundleError::Generic {
            message: message.into(),
            id: None,
            pos: None,
        }
    }

    /// Stable name shown to learners.
    pub fn name(&self) -> &'static str {
        match self {
            BundleError::EntryPointMissing { .. } => "EntryPointMissingError",
            BundleError::EntryPointNotFound { .. } => "EntryPointNotFoundError",
            BundleError::FileNotFound { .. } => "FileNotFoundError",
            BundleError::Dependency { .. } => "DependencyError",
            BundleError::Compile { .. } => "CompileError",
            BundleError::Generic { .. } => "GenericBundleError",
        }
    }

    /// Message without the location prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            BundleError::Compile { message, .. } | BundleError::Generic { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    /// The file the failure points at, when known.
    pub fn location(&self) -> Option<&str> {
        match self {
            BundleError::EntryPointMissing { descriptor }
            | BundleError::EntryPointNotFound { descriptor, .. } => Some(descriptor),
            BundleError::FileNotFound { importer, .. } | BundleError::Dependency { importer, .. } => {
                Some(importer)
            }
            BundleError::Compile { id, .. } => Some(id),
            BundleError::Generic { id, .. } => id.as_deref(),
        }
    }

    /// Byte offset into [`location`](Self::location), when known.
    pub fn position(&self) -> Option<u32> {
        match self {
            BundleError::Compile { pos, .. } | BundleError::Generic { pos, .. } => *pos,
            _ => None,
        }
    }
}

impl From<ResolveError> for BundleError {
    fn from(error: ResolveError) -> Self {
        let reason = error.reason().to_string();
        let (importee, importer) = error.into_parts();
        BundleError::FileNotFound {
            importee,
            importer,
            reason,
        }
    }
}

impl miette::Diagnostic for BundleError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            BundleError::EntryPointMissing { .. } => "ENTRY_POINT_MISSING",
            BundleError::EntryPointNotFound { .. } => "ENTRY_POINT_NOT_FOUND",
            BundleError::FileNotFound { .. } => "FILE_NOT_FOUND",
            BundleError::Dependency { .. } => "DEPENDENCY_ERROR",
            BundleError::Compile { .. } => "COMPILE_ERROR",
            BundleError::Generic { .. } => "BUNDLE_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            BundleError::EntryPointMissing { descriptor } => Some(Box::new(format!(
                "Add a \"main\" field to {} naming the file to run, e.g. \"src/index.js\".",
                descriptor
            ))),
            BundleError::EntryPointNotFound { entry, .. } => Some(Box::new(format!(
                "Create '{}' or point \"main\" at an existing file.",
                entry
            ))),
            BundleError::FileNotFound { importee, .. } => Some(Box::new(format!(
                "Check the spelling of '{}' and that the file exists.",
                importee
            ))),
            BundleError::Dependency {
                specifier,
                descriptor,
                ..
            } => Some(Box::new(format!(
                "Add \"{}\" with a version to \"dependencies\" in {}.",
                specifier, descriptor
            ))),
            _ => None,
        }
    }
}
