//! Project descriptor (`package.json`) parsing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Maximum accepted descriptor size (1MB). Playground descriptors are tiny.
pub const MAX_DESCRIPTOR_SIZE: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("{file} exceeds the maximum size of {max} bytes")]
    TooLarge { file: String, max: usize },

    #[error("Invalid {file}: {source}")]
    Invalid {
        file: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The subset of `package.json` the bundler reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    pub name: Option<String>,
    /// Entry point of the project.
    pub main: Option<String>,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: IndexMap<String, String>,
}

impl PackageDescriptor {
    /// Parses descriptor text; `file` only labels errors.
    pub fn parse(file: &str, source: &str) -> Result<Self, DescriptorError> {
        if source.len() > MAX_DESCRIPTOR_SIZE {
            return Err(DescriptorError::TooLarge {
                file: file.to_string(),
                max: MAX_DESCRIPTOR_SIZE,
            });
        }
        serde_json::from_str(source).map_err(|source| DescriptorError::Invalid {
            file: file.to_string(),
            source,
        })
    }

    /// Entry point with a leading `./` removed, if declared. A blank `main`
    /// counts as undeclared.
    pub fn entry_point(&self) -> Option<&str> {
        let mut entry = self.main.as_deref()?.trim();
        while let Some(rest) = entry.strip_prefix("./") {
            entry = rest;
        }
        (!entry.is_empty()).then_some(entry)
    }

    /// Dev dependencies first, then runtime dependencies: on a name collision
    /// the runtime version wins.
    pub fn manifest(&self) -> DependencyManifest {
        let mut packages = IndexMap::new();
        for (name, version) in self.dev_dependencies.iter().chain(&self.dependencies) {
            packages.insert(name.clone(), version.clone());
        }
        DependencyManifest { packages }
    }
}

/// Package name to pinned version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyManifest {
    packages: IndexMap<String, String>,
}

impl DependencyManifest {
    pub fn get(&self, package: &str) -> Option<&str> {
        self.packages.get(package).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.packages
            .iter()
            .map(|(name, version)| (name.as_str(), version.as_str()))
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for DependencyManifest {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            packages: iter
                .into_iter()
                .map(|(name, version)| (name.into(), version.into()))
                .collect(),
        }
    }
}
