//! Tool registry and the tools exposed to the agent.
//!
//! Every tool takes a single string input and returns a string result. The
//! registry preserves insertion order, which is also the order the tools are
//! presented to the reasoning engine.

mod document;
mod sql;
mod web;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use document::{ChromaCollection, DocumentSearch};
pub use sql::{seed_sample_data, SqlQuery};
pub use web::WebSearch;

use crate::config::Config;
use crate::llm::{Embedder, ReasoningEngine};

/// A capability the agent can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name used in `Action:` lines.
    fn name(&self) -> &str;

    /// One-line description shown in the tool catalog.
    fn description(&self) -> &str;

    /// Run the tool. Errors become observations, never session failures.
    async fn invoke(&self, input: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is registered twice")]
    DuplicateTool(String),

    #[error("Unknown tool '{name}'. Available tools: {available}")]
    UnknownTool { name: String, available: String },
}

/// Ordered set of tools available to a session.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        if self.get(tool.name()).is_some() {
            return Err(RegistryError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Tools in registration order.
    pub fn list(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Narrow the registry to the given names, keeping registry order.
    ///
    /// Fails if a requested name is not registered.
    pub fn restricted_to<S: AsRef<str>>(&self, names: &[S]) -> Result<ToolRegistry, RegistryError> {
        let wanted: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        if let Some(missing) = wanted.iter().find(|n| self.get(n).is_none()) {
            return Err(RegistryError::UnknownTool {
                name: missing.to_string(),
                available: self.names().join(", "),
            });
        }
        let tools = self
            .tools
            .iter()
            .filter(|t| wanted.contains(&t.name()))
            .cloned()
            .collect();
        Ok(ToolRegistry { tools })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Build the process-wide catalog from configuration.
///
/// The SQL tool is always present. Web search needs a Tavily key; document
/// retrieval needs its feature flag plus an embedding backend. `ENABLED_TOOLS`
/// then narrows the result.
pub fn build_registry(
    config: &Config,
    engine: Arc<dyn ReasoningEngine>,
    embedder: Option<Arc<dyn Embedder>>,
) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SqlQuery::new(config.tools.database_path.clone())))?;

    match &config.tools.tavily_api_key {
        Some(key) => registry.register(Arc::new(WebSearch::new(key.clone())?))?,
        None => tracing::warn!("TAVILY_API_KEY not set, web_search tool disabled"),
    }

    if config.tools.enable_document_tool {
        match embedder {
            Some(embedder) => {
                let collection = ChromaCollection::new(
                    &config.tools.chroma_host,
                    config.tools.chroma_port,
                    &config.tools.collection_name,
                )?;
                registry.register(Arc::new(DocumentSearch::new(
                    Arc::new(collection),
                    embedder,
                    engine,
                    config.tools.top_k,
                )))?;
            }
            None => tracing::warn!(
                "ENABLE_DOCUMENT_TOOL is set but no embedding backend is configured, query_10k_report disabled"
            ),
        }
    }

    if let Some(enabled) = &config.tools.enabled_tools {
        let unknown: Vec<&String> = enabled
            .iter()
            .filter(|n| registry.get(n).is_none())
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "ENABLED_TOOLS names tools that are not available");
        }
        let available: Vec<&String> = enabled
            .iter()
            .filter(|n| registry.get(n).is_some())
            .collect();
        registry = registry.restricted_to(&available)?;
    }

    tracing::info!(tools = ?registry.names(), "Tool registry built");
    Ok(registry)
}
