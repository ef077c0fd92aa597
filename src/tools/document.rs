//! Annual report retrieval tool: embed, retrieve chunks, synthesize.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::Tool;
use crate::llm::{Embedder, ReasoningEngine};

/// Nearest-neighbour lookup over stored report chunks.
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    async fn nearest(&self, embedding: &[f32], k: usize) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<&'a [f32]>,
    n_results: usize,
    include: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
}

/// Handle to a Chroma collection over its REST API.
///
/// The collection id is resolved on first use and cached for the life of the
/// handle; concurrent first calls share a single lookup.
pub struct ChromaCollection {
    http: reqwest::Client,
    base_url: String,
    name: String,
    id: OnceCell<String>,
}

impl ChromaCollection {
    pub fn new(host: &str, port: u16, name: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: format!("http://{}:{}/api/v1", host, port),
            name: name.to_string(),
            id: OnceCell::new(),
        })
    }

    async fn collection_id(&self) -> anyhow::Result<&str> {
        let id = self
            .id
            .get_or_try_init(|| async {
                tracing::info!("Connecting to Chroma collection '{}' at {}", self.name, self.base_url);
                let url = format!("{}/collections/{}", self.base_url, self.name);
                let response = self.http.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    anyhow::bail!("Chroma returned {} for collection '{}'", status, self.name);
                }
                let info: CollectionInfo = response.json().await?;
                Ok::<_, anyhow::Error>(info.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl ChunkRetriever for ChromaCollection {
    async fn nearest(&self, embedding: &[f32], k: usize) -> anyhow::Result<Vec<String>> {
        let id = self.collection_id().await?;
        let url = format!("{}/collections/{}/query", self.base_url, id);
        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: k,
            include: ["documents"],
        };

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chroma query failed ({}): {}", status, body);
        }

        let body: QueryResponse = response.json().await?;
        Ok(body
            .documents
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .collect())
    }
}

/// Answer questions from the company's annual (10-K) report.
pub struct DocumentSearch {
    retriever: Arc<dyn ChunkRetriever>,
    embedder: Arc<dyn Embedder>,
    engine: Arc<dyn ReasoningEngine>,
    top_k: usize,
}

impl DocumentSearch {
    pub fn new(
        retriever: Arc<dyn ChunkRetriever>,
        embedder: Arc<dyn Embedder>,
        engine: Arc<dyn ReasoningEngine>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            embedder,
            engine,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for DocumentSearch {
    fn name(&self) -> &str {
        "query_10k_report"
    }

    fn description(&self) -> &str {
        "Search Google's 2023 10-K annual report and get a synthesized answer. Use for business strategy, risk factors and operations in 2023. Input: a natural-language question."
    }

    async fn invoke(&self, input: &str) -> anyhow::Result<String> {
        let query = input.trim();
        if query.is_empty() {
            anyhow::bail!("Empty report query");
        }
        tracing::info!("Using 10-K report tool for query: '{}'", query);

        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;
        let chunks = self.retriever.nearest(&embedding, self.top_k).await?;
        tracing::debug!(chunks = chunks.len(), "Retrieved report chunks");

        if chunks.is_empty() {
            return Ok("No relevant sections found in the 10-K report.".to_string());
        }

        let prompt = synthesis_prompt(query, &chunks);
        let answer = self
            .engine
            .generate(&prompt)
            .await
            .context("Failed to synthesize answer")?;
        Ok(answer.trim().to_string())
    }
}

fn synthesis_prompt(query: &str, chunks: &[String]) -> String {
    format!(
        "You are a financial analyst assistant. Answer the question based only on the \
provided context from a company's 10-K report. Do not use any external knowledge. \
If the answer is not in the context, say so clearly.\n\n\
Context from the 10-K report:\n---\n{}\n---\n\n\
Question: {}\n\n\
Answer:",
        chunks.join("\n\n---\n\n"),
        query
    )
}
