//! End-to-end tests for the reasoning loop using scripted engines and in-process tools.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aegis::agent::{Agent, AgentOptions, ErrorKind, SessionResult, FORMAT_ERROR_ACTION};
use aegis::llm::{LlmError, ReasoningEngine};
use aegis::tools::{Tool, ToolRegistry};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Replays canned replies in order, then repeats `fallback`. Records every prompt.
struct ScriptedEngine {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    fn new(replies: Vec<&str>) -> Arc<Self> {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    fn with_results(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback: "Thought: keep going\nAction: echo\nAction Input: again".to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Never answers.
struct HangingEngine;

#[async_trait]
impl ReasoningEngine for HangingEngine {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        std::future::pending().await
    }
}

struct Echo {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns its input unchanged."
    }

    async fn invoke(&self, input: &str) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(input.to_string());
        Ok(input.to_string())
    }
}

struct Failing;

#[async_trait]
impl Tool for Failing {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    async fn invoke(&self, _input: &str) -> anyhow::Result<String> {
        anyhow::bail!("backend unreachable")
    }
}

struct Slow;

#[async_trait]
impl Tool for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Takes far too long."
    }

    async fn invoke(&self, _input: &str) -> anyhow::Result<String> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("late".to_string())
    }
}

struct Panicking;

#[async_trait]
impl Tool for Panicking {
    fn name(&self) -> &str {
        "boom"
    }

    fn description(&self) -> &str {
        "Panics."
    }

    async fn invoke(&self, _input: &str) -> anyhow::Result<String> {
        panic!("tool bug")
    }
}

/// Fires the session token while it runs, then finishes normally.
struct CancelsMidCall {
    cancel: CancellationToken,
}

#[async_trait]
impl Tool for CancelsMidCall {
    fn name(&self) -> &str {
        "report"
    }

    fn description(&self) -> &str {
        "Produces a report."
    }

    async fn invoke(&self, _input: &str) -> anyhow::Result<String> {
        self.cancel.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok("report finished".to_string())
    }
}

fn echo_tool() -> Arc<Echo> {
    Arc::new(Echo {
        calls: Mutex::new(Vec::new()),
    })
}

fn registry(tools: Vec<Arc<dyn Tool>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool).unwrap();
    }
    Arc::new(registry)
}

fn options(max_iterations: usize) -> AgentOptions {
    AgentOptions {
        max_iterations,
        llm_timeout: Duration::from_secs(5),
        tool_timeout: Duration::from_millis(200),
        max_observation_chars: 4000,
    }
}

fn agent(engine: Arc<dyn ReasoningEngine>, tools: Vec<Arc<dyn Tool>>, max_iterations: usize) -> Agent {
    Agent::new(engine, registry(tools), options(max_iterations))
}

#[tokio::test]
async fn echo_then_answer_takes_two_cycles() {
    let engine = ScriptedEngine::new(vec![
        "Thought: use echo\nAction: echo\nAction Input: X",
        "Thought: done\nFinal Answer: X",
    ]);
    let echo = echo_tool();
    let agent = agent(engine.clone(), vec![echo.clone()], 5);

    let report = agent.run_session("What is X?", &CancellationToken::new()).await;

    assert_eq!(report.result, SessionResult::Success { answer: "X".to_string() });
    assert_eq!(report.cycles, 2);
    assert_eq!(report.tool_invocations, 1);
    assert_eq!(*echo.calls.lock().unwrap(), vec!["X".to_string()]);

    let entries = report.scratchpad.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].thought, "use echo");
    assert_eq!(entries[0].action, "echo");
    assert_eq!(entries[0].observation, "X");

    let prompts = engine.prompts();
    assert!(prompts[1].contains("Action: echo\nAction Input: X\nObservation: X\n"));
}

#[tokio::test]
async fn immediate_final_answer_skips_tools() {
    let engine = ScriptedEngine::new(vec!["Thought: I know this.\nFinal Answer: 42"]);
    let echo = echo_tool();
    let agent = agent(engine.clone(), vec![echo.clone()], 5);

    let report = agent.run_session("Meaning of life?", &CancellationToken::new()).await;

    assert_eq!(report.result.answer(), Some("42"));
    assert_eq!(report.cycles, 1);
    assert_eq!(report.tool_invocations, 0);
    assert!(report.scratchpad.is_empty());
    assert!(echo.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ceiling_of_one_stops_after_first_tool_call() {
    let engine = ScriptedEngine::new(vec!["Thought: t\nAction: echo\nAction Input: X"]);
    let echo = echo_tool();
    let agent = agent(engine.clone(), vec![echo.clone()], 1);

    let report = agent.run_session("q", &CancellationToken::new()).await;

    assert_eq!(report.result.error_kind(), Some(ErrorKind::IterationLimitExceeded));
    assert_eq!(report.scratchpad.len(), 1);
    assert_eq!(echo.calls.lock().unwrap().len(), 1);
    assert_eq!(engine.prompts().len(), 1);
}

#[tokio::test]
async fn scratchpad_never_exceeds_ceiling() {
    let engine = ScriptedEngine::new(vec![]);
    let agent = agent(engine.clone(), vec![echo_tool()], 4);

    let report = agent.run_session("loop forever", &CancellationToken::new()).await;

    assert_eq!(report.result.error_kind(), Some(ErrorKind::IterationLimitExceeded));
    assert_eq!(report.scratchpad.len(), 4);
    assert_eq!(report.cycles, 4);
    match report.result {
        SessionResult::Failure { detail, .. } => assert!(detail.contains("Action: echo")),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn unknown_tool_becomes_observation_and_session_continues() {
    let engine = ScriptedEngine::new(vec![
        "Thought: calc\nAction: calculator\nAction Input: 2+2",
        "Thought: fine\nFinal Answer: 4",
    ]);
    let agent = agent(engine.clone(), vec![echo_tool()], 5);

    let report = agent.run_session("2+2?", &CancellationToken::new()).await;

    assert_eq!(report.result.answer(), Some("4"));
    let observation = &report.scratchpad.entries()[0].observation;
    assert!(observation.contains("'calculator' is not a valid tool"));
    assert!(observation.contains("echo"));
    assert!(engine.prompts()[1].contains("'calculator' is not a valid tool"));
}

#[tokio::test]
async fn failing_tool_is_recoverable() {
    let engine = ScriptedEngine::new(vec![
        "Thought: try\nAction: flaky\nAction Input: anything",
        "Thought: give up on it\nFinal Answer: unavailable",
    ]);
    let agent = agent(engine, vec![Arc::new(Failing)], 5);

    let report = agent.run_session("q", &CancellationToken::new()).await;

    assert_eq!(report.result.answer(), Some("unavailable"));
    let observation = &report.scratchpad.entries()[0].observation;
    assert!(observation.contains("Tool 'flaky' failed"));
    assert!(observation.contains("backend unreachable"));
}

#[tokio::test]
async fn slow_tool_times_out_into_observation() {
    let engine = ScriptedEngine::new(vec![
        "Thought: wait\nAction: slow\nAction Input: go",
        "Thought: ok\nFinal Answer: timed out",
    ]);
    let agent = agent(engine, vec![Arc::new(Slow)], 5);

    let report = agent.run_session("q", &CancellationToken::new()).await;

    assert!(report.result.is_success());
    assert!(report.scratchpad.entries()[0]
        .observation
        .contains("Tool 'slow' timed out"));
}

#[tokio::test]
async fn panicking_tool_does_not_end_session() {
    let engine = ScriptedEngine::new(vec![
        "Thought: risky\nAction: boom\nAction Input: x",
        "Thought: ok\nFinal Answer: survived",
    ]);
    let agent = agent(engine, vec![Arc::new(Panicking)], 5);

    let report = agent.run_session("q", &CancellationToken::new()).await;

    assert_eq!(report.result.answer(), Some("survived"));
    assert!(report.scratchpad.entries()[0].observation.contains("Tool 'boom' failed"));
}

#[tokio::test]
async fn unparsable_output_gets_corrective_observation() {
    let engine = ScriptedEngine::new(vec![
        "I am not sure what to do here.",
        "Thought: now properly\nFinal Answer: fixed",
    ]);
    let agent = agent(engine.clone(), vec![echo_tool()], 5);

    let report = agent.run_session("q", &CancellationToken::new()).await;

    assert_eq!(report.result.answer(), Some("fixed"));
    assert_eq!(report.tool_invocations, 0);
    let entry = &report.scratchpad.entries()[0];
    assert_eq!(entry.action, FORMAT_ERROR_ACTION);
    assert!(entry.observation.starts_with("Invalid Format:"));
    assert!(engine.prompts()[1].contains("Invalid Format:"));
}

#[tokio::test]
async fn engine_error_is_fatal() {
    let engine = ScriptedEngine::with_results(vec![Err(LlmError::RateLimited(
        "quota exhausted".to_string(),
    ))]);
    let echo = echo_tool();
    let agent = agent(engine, vec![echo.clone()], 5);

    let result = agent.run("q").await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ReasoningEngineError));
    assert!(!result.user_message().contains("quota"));
    assert!(echo.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn engine_timeout_is_fatal() {
    let agent = Agent::new(
        Arc::new(HangingEngine),
        registry(vec![]),
        AgentOptions {
            llm_timeout: Duration::from_millis(50),
            ..options(5)
        },
    );

    let result = agent.run("q").await;

    assert_eq!(result.error_kind(), Some(ErrorKind::ReasoningEngineError));
}

#[tokio::test]
async fn cancelled_before_start_never_calls_engine() {
    let engine = ScriptedEngine::new(vec!["Thought: t\nFinal Answer: a"]);
    let agent = agent(engine.clone(), vec![], 5);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = agent.run_cancellable("q", &cancel).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::CancellationRequested));
    assert!(engine.prompts().is_empty());
}

#[tokio::test]
async fn cancellation_interrupts_waiting_engine() {
    let agent = agent(Arc::new(HangingEngine), vec![], 5);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let result = agent.run_cancellable("q", &cancel).await;

    assert_eq!(result.error_kind(), Some(ErrorKind::CancellationRequested));
}

#[tokio::test]
async fn markdown_wrapped_labels_still_dispatch() {
    let engine = ScriptedEngine::new(vec![
        "**Thought:** use echo\n**Action:** echo\n**Action Input:** X",
        "Thought: done\nFinal Answer: X",
    ]);
    let echo = echo_tool();
    let agent = agent(engine, vec![echo.clone()], 5);

    let result = agent.run("q").await;

    assert_eq!(result.answer(), Some("X"));
    assert_eq!(*echo.calls.lock().unwrap(), vec!["X".to_string()]);
}

#[tokio::test]
async fn empty_action_input_is_passed_through() {
    let engine = ScriptedEngine::new(vec![
        "Thought: nothing to send\nAction: echo\nAction Input:",
        "Thought: done\nFinal Answer: ok",
    ]);
    let echo = echo_tool();
    let agent = agent(engine, vec![echo.clone()], 5);

    let result = agent.run("q").await;

    assert!(result.is_success());
    assert_eq!(*echo.calls.lock().unwrap(), vec![String::new()]);
}

#[tokio::test]
async fn long_observations_are_truncated() {
    let long = "y".repeat(500);
    let reply = format!("Thought: t\nAction: echo\nAction Input: {}", long);
    let engine = ScriptedEngine::new(vec![reply.as_str(), "Thought: d\nFinal Answer: ok"]);
    let agent = Agent::new(
        engine,
        registry(vec![echo_tool()]),
        AgentOptions {
            max_observation_chars: 100,
            ..options(5)
        },
    );

    let report = agent.run_session("q", &CancellationToken::new()).await;

    let observation = &report.scratchpad.entries()[0].observation;
    assert!(observation.ends_with("... [truncated]"));
    assert!(observation.chars().count() < 200);
}

#[tokio::test]
async fn sessions_on_one_agent_do_not_share_state() {
    let engine = ScriptedEngine::new(vec![
        "Thought: a\nAction: echo\nAction Input: first",
        "Thought: a\nFinal Answer: one",
        "Thought: b\nFinal Answer: two",
    ]);
    let agent = agent(engine.clone(), vec![echo_tool()], 5);

    let first = agent.run_session("first?", &CancellationToken::new()).await;
    let second = agent.run_session("second?", &CancellationToken::new()).await;

    assert_eq!(first.scratchpad.len(), 1);
    assert!(second.scratchpad.is_empty());
    let last_prompt = engine.prompts().pop().unwrap();
    assert!(!last_prompt.contains("Action Input: first"));
}

#[tokio::test]
async fn cancellation_during_tool_call_keeps_its_observation() {
    let engine = ScriptedEngine::new(vec![
        "Thought: need the report\nAction: report\nAction Input: Q3",
        "Thought: done\nFinal Answer: should not be reached",
    ]);
    let cancel = CancellationToken::new();
    let tool = Arc::new(CancelsMidCall {
        cancel: cancel.clone(),
    });
    let agent = agent(engine.clone(), vec![tool], 5);

    let report = agent.run_session("q", &cancel).await;

    assert_eq!(report.result.error_kind(), Some(ErrorKind::CancellationRequested));
    assert_eq!(report.tool_invocations, 1);
    assert_eq!(report.scratchpad.len(), 1);
    assert_eq!(report.scratchpad.entries()[0].observation, "report finished");
    assert_eq!(engine.prompts().len(), 1);
}

#[tokio::test]
async fn ceiling_takes_precedence_over_cancellation_in_same_cycle() {
    let engine = ScriptedEngine::new(vec!["Thought: t\nAction: report\nAction Input: Q3"]);
    let cancel = CancellationToken::new();
    let tool = Arc::new(CancelsMidCall {
        cancel: cancel.clone(),
    });
    let agent = agent(engine, vec![tool], 1);

    let report = agent.run_session("q", &cancel).await;

    assert_eq!(report.result.error_kind(), Some(ErrorKind::IterationLimitExceeded));
    assert_eq!(report.scratchpad.entries()[0].observation, "report finished");
}

#[tokio::test]
async fn final_answer_with_recommendation_line_succeeds_first_time() {
    let engine = ScriptedEngine::new(vec![
        "Thought: I now know the final answer.\nFinal Answer: Alphabet looks strong.\nAction: Hold the position until Q3 results.",
    ]);
    let echo = echo_tool();
    let agent = agent(engine.clone(), vec![echo.clone()], 5);

    let report = agent.run_session("Should we invest?", &CancellationToken::new()).await;

    assert_eq!(
        report.result.answer(),
        Some("Alphabet looks strong.\nAction: Hold the position until Q3 results.")
    );
    assert_eq!(report.cycles, 1);
    assert!(report.scratchpad.is_empty());
    assert!(echo.calls.lock().unwrap().is_empty());
}
