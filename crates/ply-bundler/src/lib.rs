#![cfg_attr(docsrs, feature(doc_cfg))]

//! # ply-bundler
//!
//! Builds a runnable preview from an in-memory project: one ES module bundle,
//! the concatenated stylesheets, and the project's public files.
//!
//! ## Quick Start
//!
//! ```
//! use ply_bundler::{Bundler, BundlerConfig, ScriptPlugin};
//! use ply_vfs::{FileLeaf, FlatFiles, ModulePath};
//!
//! let mut files = FlatFiles::new();
//! files.insert(
//!     ModulePath::from("package.json"),
//!     FileLeaf::new(r#"{ "main": "src/index.js", "dependencies": { "react": "18.2.0" } }"#),
//! );
//! files.insert(
//!     ModulePath::from("src/index.js"),
//!     FileLeaf::new("import React from 'react';\nconsole.log(<h1>Hello</h1>);"),
//! );
//!
//! let result = Bundler::new(BundlerConfig::default())
//!     .plugin(ScriptPlugin::new())
//!     .bundle(&files);
//!
//! assert!(result.error.is_none());
//! assert!(result.js.contains("https://esm.sh/react@18.2.0"));
//! ```
//!
//! Failures never escape [`Bundler::bundle`]: they come back as an
//! [`ErrorRecord`] ready for the preview overlay. Use
//! [`Bundler::try_bundle`] to get the typed [`BundleError`] instead.

pub mod bundler;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod external;
pub mod graph;
pub mod linker;
pub mod plugins;
pub mod resolver;
pub mod transform;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

pub use bundler::{BundleOutput, BundleResult, Bundler, PassState};
pub use config::{BundlerConfig, CONFIG_FILE, ConfigError};
pub use descriptor::{DependencyManifest, DescriptorError, PackageDescriptor};
pub use diagnostics::{
    ErrorRecord, GENERIC_ERROR_NAME, line_col_to_offset, sanitize, sanitize_message, sanitize_panic,
};
pub use error::{BundleError, Result};
pub use external::{ExternalRef, ExternalResolver};
pub use plugins::{
    EmittedStylesheet, Plugin, PluginContext, PluginRegistry, ResolvedId, SCRIPT_EXTENSIONS,
    ScriptPlugin, SharedPlugin,
};
pub use resolver::{ResolveError, ResolveOptions};
pub use transform::{JsxPragma, ScriptKind, transform_script};

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging, init_logging_from_env};
