//! Core agent loop implementation.
//!
//! One session is an explicit state machine:
//! `Reasoning -> Dispatching -> Observing -> (Reasoning | Terminated)`.
//! Each engine call and tool call completes before the next step starts.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::llm::{LlmError, ReasoningEngine};
use crate::tools::ToolRegistry;
use crate::util::truncate_chars;

use super::parser::{parse, ParseError, ParsedStep};
use super::prompt::build_prompt;
use super::result::{ErrorKind, SessionReport, SessionResult};
use super::scratchpad::{Scratchpad, ScratchpadEntry};

/// Action recorded for corrective entries after unparsable output.
pub const FORMAT_ERROR_ACTION: &str = "_Exception";

/// Longest scratchpad excerpt carried in a failure detail.
const FAILURE_EXCERPT_CHARS: usize = 500;

/// Recoverable dispatch failures, rendered into observations.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("'{name}' is not a valid tool. Valid tools are: {valid}.")]
    UnknownTool { name: String, valid: String },

    #[error("Tool '{name}' failed: {message}")]
    Failed { name: String, message: String },

    #[error("Tool '{name}' timed out after {seconds}s")]
    TimedOut { name: String, seconds: u64 },
}

/// Loop limits.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Iteration ceiling; at least 1.
    pub max_iterations: usize,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    pub max_observation_chars: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            max_observation_chars: 4000,
        }
    }
}

impl From<&Config> for AgentOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_iterations: config.max_iterations,
            llm_timeout: config.llm_timeout,
            tool_timeout: config.tool_timeout,
            max_observation_chars: config.max_observation_chars,
        }
    }
}

enum State {
    Reasoning,
    Dispatching {
        thought: String,
        action: String,
        action_input: String,
    },
    Observing(ScratchpadEntry),
    Terminated(SessionResult),
}

/// The agent: a reasoning engine plus a fixed tool registry.
///
/// Cheap to clone and safe to share; each `run` owns its own scratchpad.
#[derive(Clone)]
pub struct Agent {
    engine: Arc<dyn ReasoningEngine>,
    tools: Arc<ToolRegistry>,
    options: AgentOptions,
}

impl Agent {
    /// Create a new agent.
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        tools: Arc<ToolRegistry>,
        mut options: AgentOptions,
    ) -> Self {
        options.max_iterations = options.max_iterations.max(1);
        Self {
            engine,
            tools,
            options,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Same engine, different tool set (e.g. a per-request allow-list).
    pub fn with_tools(&self, tools: ToolRegistry) -> Self {
        Self {
            tools: Arc::new(tools),
            ..self.clone()
        }
    }

    pub fn with_max_iterations(&self, max_iterations: usize) -> Self {
        let mut options = self.options.clone();
        options.max_iterations = max_iterations.max(1);
        Self {
            options,
            ..self.clone()
        }
    }

    /// Answer a question.
    pub async fn run(&self, question: &str) -> SessionResult {
        self.run_cancellable(question, &CancellationToken::new())
            .await
    }

    /// Answer a question, stopping early if `cancel` fires.
    pub async fn run_cancellable(&self, question: &str, cancel: &CancellationToken) -> SessionResult {
        self.run_session(question, cancel).await.result
    }

    /// Answer a question and return the full transcript.
    pub async fn run_session(&self, question: &str, cancel: &CancellationToken) -> SessionReport {
        let span = tracing::info_span!("session", id = %Uuid::new_v4());
        self.drive(question, cancel).instrument(span).await
    }

    async fn drive(&self, question: &str, cancel: &CancellationToken) -> SessionReport {
        tracing::info!(
            question_len = question.len(),
            tools = ?self.tools.names(),
            max_iterations = self.options.max_iterations,
            "Starting session"
        );

        let mut scratchpad = Scratchpad::new();
        let mut cycles = 0;
        let mut tool_invocations = 0;
        let mut state = State::Reasoning;

        let result = loop {
            state = match state {
                State::Reasoning => {
                    if cancel.is_cancelled() {
                        State::Terminated(cancelled(&scratchpad))
                    } else {
                        cycles += 1;
                        tracing::debug!("Agent iteration {}", cycles);
                        let prompt = build_prompt(question, &scratchpad, self.tools.list());
                        match self.reason(&prompt, cancel).await {
                            Reasoned::Cancelled => State::Terminated(cancelled(&scratchpad)),
                            Reasoned::Failed(e) => {
                                if e.is_rate_limited() {
                                    tracing::warn!("Reasoning engine is rate limited: {}", e);
                                } else {
                                    tracing::error!("Reasoning engine failed: {}", e);
                                }
                                State::Terminated(SessionResult::Failure {
                                    kind: ErrorKind::ReasoningEngineError,
                                    detail: e.to_string(),
                                })
                            }
                            Reasoned::Text(raw) => self.interpret(&raw),
                        }
                    }
                }
                State::Dispatching {
                    thought,
                    action,
                    action_input,
                } => {
                    tool_invocations += 1;
                    tracing::info!(tool = %action, input_len = action_input.len(), "Calling tool");
                    let observation = match self.dispatch(&action, &action_input).await {
                        Ok(output) => truncate_chars(&output, self.options.max_observation_chars),
                        Err(e) => {
                            tracing::warn!("{}", e);
                            e.to_string()
                        }
                    };
                    State::Observing(ScratchpadEntry {
                        thought,
                        action,
                        action_input,
                        observation,
                    })
                }
                State::Observing(entry) => {
                    tracing::debug!(
                        observation = %truncate_chars(&entry.observation, 200),
                        "Observation recorded"
                    );
                    scratchpad.push(entry);
                    if scratchpad.len() >= self.options.max_iterations {
                        tracing::warn!(
                            "Max iterations ({}) reached without completion",
                            self.options.max_iterations
                        );
                        State::Terminated(SessionResult::Failure {
                            kind: ErrorKind::IterationLimitExceeded,
                            detail: scratchpad.last_excerpt(FAILURE_EXCERPT_CHARS),
                        })
                    } else if cancel.is_cancelled() {
                        State::Terminated(cancelled(&scratchpad))
                    } else {
                        State::Reasoning
                    }
                }
                State::Terminated(result) => break result,
            };
        };

        match &result {
            SessionResult::Success { answer } => tracing::info!(
                cycles,
                tool_invocations,
                answer_len = answer.len(),
                "Session completed"
            ),
            SessionResult::Failure { kind, .. } => {
                tracing::info!(cycles, tool_invocations, ?kind, "Session failed")
            }
        }

        SessionReport {
            result,
            scratchpad,
            cycles,
            tool_invocations,
        }
    }

    /// One engine call, bounded by the timeout and raced against cancellation.
    async fn reason(&self, prompt: &str, cancel: &CancellationToken) -> Reasoned {
        let call = tokio::time::timeout(self.options.llm_timeout, self.engine.generate(prompt));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Reasoned::Cancelled,
            outcome = call => match outcome {
                Ok(Ok(text)) => Reasoned::Text(text),
                Ok(Err(e)) => Reasoned::Failed(e),
                Err(_) => Reasoned::Failed(LlmError::Timeout(self.options.llm_timeout.as_secs())),
            },
        }
    }

    fn interpret(&self, raw: &str) -> State {
        match parse(raw) {
            Ok(ParsedStep::FinalAnswer { text, .. }) => State::Terminated(SessionResult::Success {
                answer: text.trim().to_string(),
            }),
            Ok(ParsedStep::ToolInvocation {
                thought,
                action,
                action_input,
            }) => State::Dispatching {
                thought,
                action,
                action_input,
            },
            Err(e) => {
                tracing::warn!(reason = %e.reason, "Could not parse engine output");
                State::Observing(correction_entry(&e))
            }
        }
    }

    /// Run the named tool. A running tool call is allowed to finish even if
    /// the session is cancelled meanwhile; the loop checks afterwards.
    async fn dispatch(&self, action: &str, input: &str) -> Result<String, DispatchError> {
        let tool = self
            .tools
            .get(action)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownTool {
                name: action.to_string(),
                valid: match self.tools.names() {
                    names if names.is_empty() => "none".to_string(),
                    names => names.join(", "),
                },
            })?;

        // A separate task so a panicking tool cannot take the session down.
        let owned_input = input.to_string();
        let mut handle = tokio::spawn(async move { tool.invoke(&owned_input).await });

        match tokio::time::timeout(self.options.tool_timeout, &mut handle).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(e))) => Err(DispatchError::Failed {
                name: action.to_string(),
                message: format!("{:#}", e),
            }),
            Ok(Err(join_error)) => Err(DispatchError::Failed {
                name: action.to_string(),
                message: if join_error.is_panic() {
                    "the tool crashed".to_string()
                } else {
                    join_error.to_string()
                },
            }),
            Err(_) => {
                handle.abort();
                Err(DispatchError::TimedOut {
                    name: action.to_string(),
                    seconds: self.options.tool_timeout.as_secs(),
                })
            }
        }
    }
}

enum Reasoned {
    Text(String),
    Failed(LlmError),
    Cancelled,
}

fn correction_entry(error: &ParseError) -> ScratchpadEntry {
    ScratchpadEntry {
        thought: String::new(),
        action: FORMAT_ERROR_ACTION.to_string(),
        action_input: error.raw_excerpt.clone(),
        observation: format!(
            "Invalid Format: {}. Respond with a `Thought:` line followed by either an `Action:` line and an `Action Input:` line, or a single `Final Answer:` line.",
            error.reason
        ),
    }
}

fn cancelled(scratchpad: &Scratchpad) -> SessionResult {
    tracing::info!("Session cancelled after {} iterations", scratchpad.len());
    SessionResult::Failure {
        kind: ErrorKind::CancellationRequested,
        detail: format!("cancelled after {} iterations", scratchpad.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_message_names_tool_and_alternatives() {
        let err = DispatchError::UnknownTool {
            name: "calculator".to_string(),
            valid: "echo, web_search".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'calculator' is not a valid tool. Valid tools are: echo, web_search."
        );
    }

    #[test]
    fn correction_entry_asks_for_the_format() {
        let entry = correction_entry(&ParseError {
            reason: "missing `Action:`/`Action Input:` or `Final Answer:`".to_string(),
            raw_excerpt: "just text".to_string(),
        });
        assert_eq!(entry.action, FORMAT_ERROR_ACTION);
        assert_eq!(entry.action_input, "just text");
        assert!(entry.observation.starts_with("Invalid Format: missing"));
    }

    #[test]
    fn options_clamp_zero_ceiling() {
        let agent = Agent::new(
            Arc::new(crate::llm::MockEngine),
            Arc::new(ToolRegistry::new()),
            AgentOptions {
                max_iterations: 0,
                ..AgentOptions::default()
            },
        );
        assert_eq!(agent.options().max_iterations, 1);
        assert_eq!(agent.with_max_iterations(0).options().max_iterations, 1);
    }
}
