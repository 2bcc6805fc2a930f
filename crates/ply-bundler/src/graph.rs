//! Per-pass module graph.

use indexmap::{IndexMap, IndexSet};
use ply_vfs::ModulePath;
use rustc_hash::FxHashMap;

use crate::linker::ModuleRecord;
use crate::plugins::ResolvedId;

/// One bundled module.
#[derive(Debug, Clone)]
pub struct ModuleGraphNode {
    pub id: ModulePath,
    /// Index into the registry of the plugin that resolved this module.
    pub owner: usize,
    /// Transformed JavaScript.
    pub code: String,
    pub record: ModuleRecord,
    /// Specifier as written in `code` to what it resolved to.
    pub edges: IndexMap<String, ResolvedId>,
}

impl ModuleGraphNode {
    /// Specifier to graph key, as the linker consumes it.
    pub fn targets(&self) -> FxHashMap<String, String> {
        self.edges
            .iter()
            .map(|(specifier, resolved)| (specifier.clone(), resolved.key().to_string()))
            .collect()
    }

    pub fn local_dependencies(&self) -> impl Iterator<Item = &ModulePath> {
        self.edges.values().filter_map(|resolved| match resolved {
            ResolvedId::Local(path) => Some(path),
            ResolvedId::External(_) => None,
        })
    }
}

/// Modules in discovery order plus the CDN URLs they reference.
#[derive(Debug, Clone)]
pub struct ModuleGraph {
    entry: ModulePath,
    modules: IndexMap<ModulePath, ModuleGraphNode>,
    externals: IndexSet<String>,
}

impl ModuleGraph {
    pub fn new(entry: ModulePath) -> Self {
        Self {
            entry,
            modules: IndexMap::new(),
            externals: IndexSet::new(),
        }
    }

    pub fn entry(&self) -> &ModulePath {
        &self.entry
    }

    pub fn insert(&mut self, node: ModuleGraphNode) {
        for resolved in node.edges.values() {
            if let ResolvedId::External(external) = resolved {
                self.externals.insert(external.url.clone());
            }
        }
        self.modules.insert(node.id.clone(), node);
    }

    pub fn get(&self, id: &str) -> Option<&ModuleGraphNode> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    pub fn modules(&self) -> impl Iterator<Item = &ModuleGraphNode> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// CDN URLs in first-seen order.
    pub fn externals(&self) -> impl Iterator<Item = &str> {
        self.externals.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::ExternalRef;

    fn node(id: &str, edges: Vec<(&str, ResolvedId)>) -> ModuleGraphNode {
        ModuleGraphNode {
            id: id.into(),
            owner: 0,
            code: String::new(),
            record: ModuleRecord::default(),
            edges: edges
                .into_iter()
                .map(|(specifier, resolved)| (specifier.to_string(), resolved))
                .collect(),
        }
    }

    fn react() -> ResolvedId {
        ResolvedId::External(ExternalRef {
            specifier: "react".into(),
            version: "18.2.0".into(),
            url: "https://esm.sh/react@18.2.0".into(),
        })
    }

    #[test]
    fn test_externals_are_collected_once() {
        let mut graph = ModuleGraph::new("src/index.js".into());
        graph.insert(node(
            "src/index.js",
            vec![("react", react()), ("./App", ResolvedId::Local("src/App.jsx".into()))],
        ));
        graph.insert(node("src/App.jsx", vec![("react", react())]));

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.externals().collect::<Vec<_>>(), ["https://esm.sh/react@18.2.0"]);
    }

    #[test]
    fn test_targets_and_local_dependencies() {
        let entry = node(
            "src/index.js",
            vec![("react", react()), ("./App", ResolvedId::Local("src/App.jsx".into()))],
        );
        let targets = entry.targets();
        assert_eq!(targets["./App"], "src/App.jsx");
        assert_eq!(targets["react"], "https://esm.sh/react@18.2.0");
        assert_eq!(
            entry.local_dependencies().map(ModulePath::as_str).collect::<Vec<_>>(),
            ["src/App.jsx"]
        );
    }

    #[test]
    fn test_discovery_order_is_kept() {
        let mut graph = ModuleGraph::new("b.js".into());
        graph.insert(node("b.js", vec![]));
        graph.insert(node("a.js", vec![]));
        let ids: Vec<_> = graph.modules().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["b.js", "a.js"]);
        assert!(graph.contains("a.js"));
        assert_eq!(graph.entry(), "b.js");
    }
}
