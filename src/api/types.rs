//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::agent::ErrorKind;

/// Request to answer a question.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// The user question
    pub question: String,

    /// Optional allow-list of tool names (uses every registered tool if not specified)
    #[serde(default)]
    pub tools: Option<Vec<String>>,

    /// Optional iteration ceiling override
    #[serde(default)]
    pub max_iterations: Option<usize>,
}

/// Successful answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,

    /// Reasoning cycles the session used
    pub iterations: usize,
}

/// Error body. Never carries prompt or scratchpad content.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Present when a session ran and failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_ready: bool,
    pub message: String,
}

/// Service description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
    pub status: String,
    pub tools: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_optional_fields_default() {
        let req: QueryRequest = serde_json::from_str(r#"{"question": "Q3 profit?"}"#).unwrap();
        assert_eq!(req.question, "Q3 profit?");
        assert!(req.tools.is_none());
        assert!(req.max_iterations.is_none());
    }

    #[test]
    fn error_response_omits_missing_kind() {
        let body = serde_json::to_value(ErrorResponse {
            error: "question is required".to_string(),
            kind: None,
        })
        .unwrap();
        assert!(body.get("kind").is_none());
    }
}
