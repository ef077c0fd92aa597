use async_trait::async_trait;

use super::{LlmError, ReasoningEngine};

/// Canned backend for running without model quota.
///
/// Always finishes in one step, echoing the question found in the prompt.
#[derive(Debug, Default, Clone)]
pub struct MockEngine;

#[async_trait]
impl ReasoningEngine for MockEngine {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let question = prompt
            .lines()
            .rev()
            .find_map(|line| line.strip_prefix("Question: "))
            .unwrap_or("your question")
            .trim();

        Ok(format!(
            "Thought: Running in mock mode, no tools will be called.\n\
             Final Answer: This is a mock response for \"{}\". A live model would \
             combine the internal financial database, the annual report and current \
             market news to answer it.",
            question
        ))
    }
}
