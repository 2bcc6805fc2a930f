//! Bare specifier to CDN URL mapping.

use serde::{Deserialize, Serialize};

use crate::descriptor::DependencyManifest;

/// A dependency served by the CDN instead of being bundled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRef {
    pub specifier: String,
    pub version: String,
    pub url: String,
}

/// Maps bare specifiers to pinned CDN URLs (`base/package@version[/subpath]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalResolver {
    base_url: String,
}

impl ExternalResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `None` when the package is not in the manifest.
    ///
    /// ```
    /// use ply_bundler::{DependencyManifest, ExternalResolver};
    ///
    /// let manifest: DependencyManifest = [("react-dom", "18.2.0")].into_iter().collect();
    /// let resolver = ExternalResolver::new("https://esm.sh/");
    /// let url = resolver.resolve("react-dom/client", &manifest).unwrap().url;
    /// assert_eq!(url, "https://esm.sh/react-dom@18.2.0/client");
    /// assert!(resolver.resolve("left-pad", &manifest).is_none());
    /// ```
    pub fn resolve(&self, specifier: &str, manifest: &DependencyManifest) -> Option<ExternalRef> {
        let (package, subpath) = match manifest.get(specifier) {
            Some(_) => (specifier, ""),
            None => split_package_name(specifier),
        };
        let version = manifest.get(package)?;

        let url = if subpath.is_empty() {
            format!("{}/{}@{}", self.base_url, package, version)
        } else {
            format!("{}/{}@{}/{}", self.base_url, package, version, subpath)
        };

        Some(ExternalRef {
            specifier: specifier.to_string(),
            version: version.to_string(),
            url,
        })
    }
}

/// Splits `@scope/pkg/sub/path` into `("@scope/pkg", "sub/path")`.
pub fn split_package_name(specifier: &str) -> (&str, &str) {
    let name_end = if specifier.starts_with('@') {
        specifier.find('/').and_then(|first| {
            specifier[first + 1..]
                .find('/')
                .map(|second| first + 1 + second)
        })
    } else {
        specifier.find('/')
    };

    match name_end {
        Some(end) => (&specifier[..end], &specifier[end + 1..]),
        None => (specifier, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> DependencyManifest {
        [
            ("react", "18.2.0"),
            ("@emotion/react", "11.11.1"),
            ("lodash/fp", "4.17.21"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_plain_package() {
        let resolver = ExternalResolver::new("https://esm.sh");
        let external = resolver.resolve("react", &manifest()).unwrap();
        assert_eq!(external.url, "https://esm.sh/react@18.2.0");
        assert_eq!(external.version, "18.2.0");
        assert_eq!(external.specifier, "react");
    }

    #[test]
    fn test_scoped_package_with_subpath() {
        let resolver = ExternalResolver::new("https://cdn.example");
        let external = resolver.resolve("@emotion/react/jsx-runtime", &manifest()).unwrap();
        assert_eq!(
            external.url,
            "https://cdn.example/@emotion/react@11.11.1/jsx-runtime"
        );
    }

    #[test]
    fn test_exact_manifest_key_wins() {
        let resolver = ExternalResolver::new("https://esm.sh");
        let external = resolver.resolve("lodash/fp", &manifest()).unwrap();
        assert_eq!(external.url, "https://esm.sh/lodash/fp@4.17.21");
    }

    #[test]
    fn test_unlisted_package() {
        let resolver = ExternalResolver::new("https://esm.sh");
        assert_eq!(resolver.resolve("left-pad", &manifest()), None);
        assert_eq!(resolver.resolve("@scope/missing", &manifest()), None);
    }

    #[test]
    fn test_split_package_name() {
        assert_eq!(split_package_name("react"), ("react", ""));
        assert_eq!(split_package_name("react-dom/client"), ("react-dom", "client"));
        assert_eq!(split_package_name("@scope/pkg"), ("@scope/pkg", ""));
        assert_eq!(split_package_name("@scope/pkg/a/b"), ("@scope/pkg", "a/b"));
        assert_eq!(split_package_name("@scope"), ("@scope", ""));
    }
}
