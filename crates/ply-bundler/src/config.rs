//! Bundler configuration.
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! `ply.toml`, and `PLY_*` environment variables (`PLY_CDN_BASE_URL`, ...).

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::resolver::ResolveOptions;

/// Default file name looked up by [`BundlerConfig::load`].
pub const CONFIG_FILE: &str = "ply.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String, hint: String },
}

impl miette::Diagnostic for ConfigError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new("INVALID_CONFIG"))
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            ConfigError::Invalid { hint, .. } => Some(Box::new(hint.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Origin used to build URLs for external dependencies.
    pub cdn_base_url: String,
    /// Name of the project descriptor at the tree root.
    pub descriptor_file: String,
    /// Files under this prefix skip the graph and are copied verbatim.
    pub public_prefix: String,
    /// Factory called for JSX elements.
    pub jsx_pragma: String,
    /// Component used for JSX fragments.
    pub jsx_pragma_frag: String,
    /// Upper bound on modules in one pass.
    pub max_modules: usize,
    /// Resolve `./dir` to `./dir/index.*`.
    pub resolve_index_files: bool,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            cdn_base_url: "https://esm.sh".to_string(),
            descriptor_file: "package.json".to_string(),
            public_prefix: "public/".to_string(),
            jsx_pragma: "React.createElement".to_string(),
            jsx_pragma_frag: "React.Fragment".to_string(),
            max_modules: 10_000,
            resolve_index_files: true,
        }
    }
}

impl BundlerConfig {
    /// Defaults, then `ply.toml` in `dir` if present, then `PLY_*` variables.
    pub fn load(dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(dir) = dir {
            figment = figment.merge(Toml::file(dir.join(CONFIG_FILE)));
        }
        Self::from_figment(figment.merge(Env::prefixed("PLY_")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
                hint: format!("Check {} syntax and field types", CONFIG_FILE),
            })
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            index_files: self.resolve_index_files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BundlerConfig::default();
        assert_eq!(config.cdn_base_url, "https://esm.sh");
        assert_eq!(config.descriptor_file, "package.json");
        assert_eq!(config.public_prefix, "public/");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = Figment::new()
            .merge(Serialized::defaults(BundlerConfig::default()))
            .merge(Toml::string(
                r#"
                cdn_base_url = "https://cdn.skypack.dev"
                jsx_pragma = "h"
                "#,
            ));
        let config = BundlerConfig::from_figment(figment).unwrap();
        assert_eq!(config.cdn_base_url, "https://cdn.skypack.dev");
        assert_eq!(config.jsx_pragma, "h");
        assert_eq!(config.jsx_pragma_frag, "React.Fragment");
    }

    #[test]
    fn test_invalid_field_type() {
        let figment = Figment::new()
            .merge(Serialized::defaults(BundlerConfig::default()))
            .merge(Toml::string("max_modules = \"lots\""));
        let err = BundlerConfig::from_figment(figment).unwrap_err();
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "public_prefix = \"static/\"\n").unwrap();
        let config = BundlerConfig::load(Some(dir.path())).unwrap();
        assert_eq!(config.public_prefix, "static/");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BundlerConfig::load(Some(dir.path())).unwrap();
        assert_eq!(config.descriptor_file, "package.json");
    }
}
