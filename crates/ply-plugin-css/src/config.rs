//! Stylesheet processing options

/// Options for [`CssPlugin`](crate::CssPlugin).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssPluginOptions {
    /// Minify with lightningcss before emitting.
    ///
    /// Merges longhands into shorthands, drops whitespace and shortens
    /// colors and lengths.
    pub minify: bool,

    /// Substrings; a stylesheet whose path contains one is left to other plugins.
    pub exclude: Vec<String>,

    /// Substrings; when non-empty only matching stylesheets are claimed.
    pub include: Vec<String>,
}

impl Default for CssPluginOptions {
    fn default() -> Self {
        Self {
            minify: true,
            exclude: Vec::new(),
            include: Vec::new(),
        }
    }
}

impl CssPluginOptions {
    /// Default options: minify, no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable minification.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ply_plugin_css::CssPluginOptions;
    ///
    /// let options = CssPluginOptions::new().with_minify(false);
    /// assert!(!options.minify);
    /// ```
    pub fn with_minify(mut self, enabled: bool) -> Self {
        self.minify = enabled;
        self
    }

    /// Add exclusion pattern
    ///
    /// # Arguments
    ///
    /// * `pattern` - Substring matched against the stylesheet's project path
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Add inclusion pattern
    ///
    /// # Arguments
    ///
    /// * `pattern` - Substring matched against the stylesheet's project path
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Exclusions win over inclusions; no inclusions means everything.
    pub(crate) fn matches(&self, path: &str) -> bool {
        if self.exclude.iter().any(|pattern| path.contains(pattern.as_str())) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|pattern| path.contains(pattern.as_str()))
    }
}
