//! Terminal outcome of an agent session.

use serde::Serialize;

use super::scratchpad::Scratchpad;

/// Failure kinds that end a session.
///
/// Parse errors, tool failures and unknown tools never appear here: the loop
/// turns them into scratchpad observations so the engine can correct itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The reasoning engine failed or timed out.
    ReasoningEngineError,
    /// The iteration ceiling was reached without a final answer.
    IterationLimitExceeded,
    /// The caller cancelled the session.
    CancellationRequested,
}

/// Exactly one per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    Success { answer: String },
    Failure { kind: ErrorKind, detail: String },
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionResult::Success { .. })
    }

    pub fn answer(&self) -> Option<&str> {
        match self {
            SessionResult::Success { answer } => Some(answer),
            SessionResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SessionResult::Success { .. } => None,
            SessionResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Text safe to show an end user. Never contains prompt or scratchpad content.
    pub fn user_message(&self) -> String {
        match self {
            SessionResult::Success { answer } => answer.clone(),
            SessionResult::Failure { kind, .. } => match kind {
                ErrorKind::ReasoningEngineError => {
                    "The reasoning service is currently unavailable. Please try again later."
                }
                ErrorKind::IterationLimitExceeded => {
                    "The agent could not reach an answer within the allowed number of steps."
                }
                ErrorKind::CancellationRequested => "The request was cancelled.",
            }
            .to_string(),
        }
    }
}

/// A finished session with its transcript, for callers that log or inspect it.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub result: SessionResult,
    pub scratchpad: Scratchpad,
    /// Reasoning engine calls made.
    pub cycles: usize,
    /// Tool calls dispatched (successful or not).
    pub tool_invocations: usize,
}
