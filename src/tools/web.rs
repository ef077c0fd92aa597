//! Web search tool backed by the Tavily search API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Tool;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: usize = 5;
const MAX_SNIPPET_CHARS: usize = 800;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// Search the web for current information.
pub struct WebSearch {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl WebSearch {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; Aegis/0.3)")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: TAVILY_SEARCH_URL.to_string(),
        })
    }
}

#[async_trait]
impl Tool for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information such as news, market sentiment and recent stock price movements. Input: a search query."
    }

    async fn invoke(&self, input: &str) -> anyhow::Result<String> {
        let query = input.trim();
        if query.is_empty() {
            anyhow::bail!("Empty search query");
        }

        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: MAX_RESULTS,
            search_depth: "basic",
        };

        let response = self.http.post(&self.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Search API error {}: {}", status, body));
        }

        let body: SearchResponse = response.json().await?;
        Ok(format_results(query, &body.results))
    }
}

fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for: {}", query);
    }

    results
        .iter()
        .take(MAX_RESULTS)
        .map(|r| {
            let snippet: String = r.content.chars().take(MAX_SNIPPET_CHARS).collect();
            format!("{}\n{}\nURL: {}", r.title.trim(), snippet.trim(), r.url)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
