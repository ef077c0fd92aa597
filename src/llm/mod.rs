//! Reasoning engine clients.
//!
//! The agent loop only needs "prompt in, text out", so the seam is a single
//! async trait. Gemini is the production backend; the mock backend answers
//! with canned text so the service can run without an API key.

mod error;
mod gemini;
mod mock;

use async_trait::async_trait;

pub use error::LlmError;
pub use gemini::GeminiClient;
pub use mock::MockEngine;

/// Text generation backend driving the agent loop.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Generate a continuation for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Embedding backend used by retrieval tools.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}
