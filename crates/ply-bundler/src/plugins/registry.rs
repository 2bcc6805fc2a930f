//! Ordered plugin registry.
//!
//! Plugins are consulted in the order they were added. The first plugin whose
//! `resolve_id` returns `Some` owns the module for the rest of the pass.

use std::fmt;
use std::sync::Arc;

use super::{Plugin, PluginContext, ResolvedId, SharedPlugin};
use crate::error::Result;

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<SharedPlugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin after the ones already registered.
    pub fn add<P: Plugin + 'static>(&mut self, plugin: P) -> &mut Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn add_shared(&mut self, plugin: SharedPlugin) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    /// Builder form of [`add`](Self::add).
    pub fn with<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.add(plugin);
        self
    }

    pub fn get(&self, index: usize) -> Option<&SharedPlugin> {
        self.plugins.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedPlugin> {
        self.plugins.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().into_owned()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Tries each plugin in order; returns the index of the owner and its answer.
    pub fn resolve_id(
        &self,
        ctx: &PluginContext<'_>,
        importee: &str,
        importer: &str,
    ) -> Result<Option<(usize, ResolvedId)>> {
        for (index, plugin) in self.plugins.iter().enumerate() {
            if let Some(resolved) = plugin.resolve_id(ctx, importee, importer)? {
                tracing::trace!(plugin = %plugin.name(), importee, id = resolved.key(), "resolved");
                return Ok(Some((index, resolved)));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
