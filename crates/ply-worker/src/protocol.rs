//! Messages exchanged with the execution boundary.
//!
//! Both directions are plain JSON with camelCase keys so a browser host can
//! post them straight through `postMessage`.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use ply_bundler::{BundleResult, ErrorRecord, sanitize_panic};
use ply_plugin_svelte::CompiledComponent;
use ply_vfs::{FileLeaf, FlatFiles, ModulePath};
use serde::{Deserialize, Serialize};

/// Which plugin set a request is bundled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// JavaScript, TypeScript and JSX with stylesheets.
    #[default]
    Script,
    /// Svelte components on top of the script dialect.
    Component,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Script => "script",
            Dialect::Component => "component",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of a snapshot as the editor sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotFile {
    pub value: String,
    #[serde(default = "default_modifiable")]
    pub modifiable: bool,
}

fn default_modifiable() -> bool {
    true
}

impl From<&FileLeaf> for SnapshotFile {
    fn from(leaf: &FileLeaf) -> Self {
        Self {
            value: leaf.content.clone(),
            modifiable: leaf.modifiable,
        }
    }
}

impl From<SnapshotFile> for FileLeaf {
    fn from(file: SnapshotFile) -> Self {
        FileLeaf {
            content: file.value,
            modifiable: file.modifiable,
        }
    }
}

/// Inbound message: a full project snapshot to bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRequest {
    /// Echoed back in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default)]
    pub files: BTreeMap<String, SnapshotFile>,
}

impl BundleRequest {
    pub fn new(dialect: Dialect, files: &FlatFiles) -> Self {
        Self {
            id: None,
            dialect,
            files: files
                .iter()
                .map(|(path, leaf)| (path.to_string(), SnapshotFile::from(leaf)))
                .collect(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// The snapshot as the bundler's flat view. A leading `/` on a key is
    /// dropped.
    pub fn into_flat_files(self) -> FlatFiles {
        self.files
            .into_iter()
            .map(|(path, file)| {
                let path = match path.strip_prefix('/') {
                    Some(stripped) => stripped.to_string(),
                    None => path,
                };
                (ModulePath::from(path), FileLeaf::from(file))
            })
            .collect()
    }
}

/// Outbound message. `error` is present exactly when the pass failed, in
/// which case the other fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub js: String,
    pub css: String,
    pub public: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl BundleResponse {
    pub fn from_result(id: Option<u64>, result: BundleResult) -> Self {
        Self {
            id,
            js: result.js,
            css: result.css,
            public: result.public_assets,
            error: result.error,
        }
    }

    /// Failure response for a pass that panicked, `entry_point` locating it.
    pub fn from_panic(id: Option<u64>, payload: &(dyn Any + Send), entry_point: &str) -> Self {
        Self::from_result(id, BundleResult::failure(sanitize_panic(payload, entry_point)))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// What a host component compiler returns for one component.
///
/// A browser host wraps Svelte's `compile` so that it returns
/// `{ js: result.js.code, css: result.css?.code }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCompileOutput {
    pub js: String,
    #[serde(default)]
    pub css: Option<String>,
}

impl From<HostCompileOutput> for CompiledComponent {
    fn from(output: HostCompileOutput) -> Self {
        CompiledComponent {
            js: output.js,
            typescript: false,
            css: output.css.filter(|css| !css.trim().is_empty()),
            spans: Vec::new(),
        }
    }
}
