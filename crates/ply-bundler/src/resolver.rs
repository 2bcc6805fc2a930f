//! Relative import resolution against the flattened project.
//!
//! Resolution is a pure function of `(importee, importer, files)`: no I/O and
//! no state, so the same snapshot always yields the same answer.
//!
//! ```text
//! importer: src/components/App.jsx
//!
//!   ./Button      -> src/components/Button.jsx   (extension resolved)
//!   ../utils/math -> src/utils/math.ts
//!   ../../x.js    -> x.js
//!   ../../../x.js -> AboveRoot
//!   react         -> None (bare, handled by the external resolver)
//! ```

use std::ops::Bound;

use ply_vfs::{FlatFiles, ModulePath};

/// Why a relative specifier did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("'{importee}' walks above the project root from '{importer}'")]
    AboveRoot { importee: String, importer: String },

    #[error("'{importee}' imported from '{importer}' does not exist")]
    NotFound { importee: String, importer: String },
}

impl ResolveError {
    pub fn reason(&self) -> &'static str {
        match self {
            ResolveError::AboveRoot { .. } => "the path walks above the project root",
            ResolveError::NotFound { .. } => "no such file in the project",
        }
    }

    pub fn into_parts(self) -> (String, String) {
        match self {
            ResolveError::AboveRoot { importee, importer }
            | ResolveError::NotFound { importee, importer } => (importee, importer),
        }
    }
}

/// Knobs for [`resolve_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Also try `<candidate>/index.*` when the candidate itself is missing.
    pub index_files: bool,
}

/// True for `./x` and `../x` style specifiers.
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolves `importee` as imported from `importer` with default options.
pub fn resolve(
    importee: &str,
    importer: &str,
    files: &FlatFiles,
) -> Result<Option<ModulePath>, ResolveError> {
    resolve_with(importee, importer, files, ResolveOptions::default())
}

/// Resolves `importee` as imported from `importer`.
///
/// Returns `Ok(None)` for bare specifiers, which belong to the external resolver.
pub fn resolve_with(
    importee: &str,
    importer: &str,
    files: &FlatFiles,
    options: ResolveOptions,
) -> Result<Option<ModulePath>, ResolveError> {
    if let Some((key, _)) = files.get_key_value(importee) {
        return Ok(Some(key.clone()));
    }
    if !is_relative(importee) {
        return Ok(None);
    }

    let candidate = join_relative(importee, importer)?;
    let resolved = find_with_extension(&candidate, files).or_else(|| {
        options
            .index_files
            .then(|| find_with_extension(&format!("{candidate}/index"), files))
            .flatten()
    });

    resolved.map(Some).ok_or_else(|| ResolveError::NotFound {
        importee: importee.to_string(),
        importer: importer.to_string(),
    })
}

/// Joins a relative specifier onto the importer's directory.
///
/// The root is its own parent only in the sense that `./x` from a root file is
/// `x`; any `../` from the root fails.
fn join_relative(importee: &str, importer: &str) -> Result<String, ResolveError> {
    let mut rest = importee;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    let mut ups = 0;
    while let Some(stripped) = rest.strip_prefix("../") {
        rest = stripped;
        ups += 1;
    }

    let segments: Vec<&str> = importer.split('/').collect();
    if ups > segments.len() - 1 {
        return Err(ResolveError::AboveRoot {
            importee: importee.to_string(),
            importer: importer.to_string(),
        });
    }

    let kept = &segments[..segments.len() - ups - 1];
    if kept.is_empty() {
        Ok(rest.to_string())
    } else {
        Ok(format!("{}/{}", kept.join("/"), rest))
    }
}

/// Exact key, else the first key (in path order) that equals `candidate` once
/// its own extension is stripped.
fn find_with_extension(candidate: &str, files: &FlatFiles) -> Option<ModulePath> {
    if let Some((key, _)) = files.get_key_value(candidate) {
        return Some(key.clone());
    }

    // Any match must start with the candidate, so a range scan is enough.
    files
        .range::<str, _>((Bound::Included(candidate), Bound::Unbounded))
        .map(|(key, _)| key)
        .take_while(|key| key.as_str().starts_with(candidate))
        .find(|key| key.without_extension() == candidate)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ply_vfs::FileLeaf;
    use proptest::prelude::*;

    fn files(paths: &[&str]) -> FlatFiles {
        paths
            .iter()
            .map(|path| (ModulePath::from(*path), FileLeaf::new("")))
            .collect()
    }

    fn resolved(importee: &str, importer: &str, files: &FlatFiles) -> String {
        resolve(importee, importer, files)
            .unwrap()
            .unwrap()
            .into_string()
    }

    #[test]
    fn test_canonical_key_returned_unchanged() {
        let files = files(&["src/index.js"]);
        assert_eq!(resolved("src/index.js", "anything.js", &files), "src/index.js");
    }

    #[test]
    fn test_same_directory() {
        let files = files(&["src/index.js", "src/App.jsx"]);
        assert_eq!(resolved("./App.jsx", "src/index.js", &files), "src/App.jsx");
    }

    #[test]
    fn test_parent_directories() {
        let files = files(&["src/components/App.jsx", "src/utils/math.ts", "x.js"]);
        assert_eq!(
            resolved("../utils/math.ts", "src/components/App.jsx", &files),
            "src/utils/math.ts"
        );
        assert_eq!(resolved("../../x.js", "src/components/App.jsx", &files), "x.js");
    }

    #[test]
    fn test_root_importer() {
        let files = files(&["index.js", "util.js"]);
        assert_eq!(resolved("./util.js", "index.js", &files), "util.js");
        assert_eq!(resolved("./util", "index.js", &files), "util.js");
    }

    #[test]
    fn test_walking_above_root_fails() {
        let files = files(&["src/index.js", "x.js"]);
        assert!(matches!(
            resolve("../x.js", "index.js", &files),
            Err(ResolveError::AboveRoot { .. })
        ));
        assert!(matches!(
            resolve("../../x.js", "src/index.js", &files),
            Err(ResolveError::AboveRoot { .. })
        ));
    }

    #[test]
    fn test_extension_resolution() {
        let files = files(&["src/index.js", "src/App.tsx", "src/Apple.js"]);
        assert_eq!(resolved("./App", "src/index.js", &files), "src/App.tsx");
        assert_eq!(resolved("./Apple", "src/index.js", &files), "src/Apple.js");
    }

    #[test]
    fn test_extension_resolution_prefers_path_order() {
        let files = files(&["src/index.js", "src/util.ts", "src/util.js"]);
        assert_eq!(resolved("./util", "src/index.js", &files), "src/util.js");
    }

    #[test]
    fn test_exact_key_beats_extension_match() {
        let files = files(&["src/index.js", "src/data", "src/data.json"]);
        assert_eq!(resolved("./data", "src/index.js", &files), "src/data");
    }

    #[test]
    fn test_missing_file_carries_both_sides() {
        let files = files(&["src/index.js"]);
        let err = resolve("./missing", "src/index.js", &files).unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                importee: "./missing".into(),
                importer: "src/index.js".into(),
            }
        );
    }

    #[test]
    fn test_bare_specifiers_are_not_handled() {
        let files = files(&["src/index.js"]);
        assert_eq!(resolve("react", "src/index.js", &files).unwrap(), None);
        assert_eq!(resolve("@scope/pkg/sub", "src/index.js", &files).unwrap(), None);
    }

    #[test]
    fn test_index_files_are_opt_in() {
        let files = files(&["src/index.js", "src/lib/index.ts"]);
        assert!(resolve("./lib", "src/index.js", &files).is_err());

        let options = ResolveOptions { index_files: true };
        let path = resolve_with("./lib", "src/index.js", &files, options)
            .unwrap()
            .unwrap();
        assert_eq!(path, "src/lib/index.ts");
    }

    proptest! {
        #[test]
        fn resolution_is_deterministic(
            dirs in prop::collection::vec("[a-c]{1,2}", 0..4),
            name in "[a-c]{1,3}",
            ups in 0usize..4,
        ) {
            let importer = if dirs.is_empty() {
                "entry.js".to_string()
            } else {
                format!("{}/entry.js", dirs.join("/"))
            };
            let target = format!("{name}.js");
            let files = files(&[importer.as_str(), target.as_str(), "a/b.ts", "a.js", "b/c.jsx"]);
            let importee = if ups == 0 {
                format!("./{name}")
            } else {
                format!("{}{name}", "../".repeat(ups))
            };

            let first = resolve(&importee, &importer, &files);
            let second = resolve(&importee, &importer, &files);
            prop_assert_eq!(&first, &second);
            if ups > dirs.len() {
                let above_root = matches!(first, Err(ResolveError::AboveRoot { .. }));
                prop_assert!(above_root);
            }
        }
    }
}
