//! Agent module - the ReAct reasoning loop.
//!
//! The agent alternates reasoning and acting:
//! 1. Build a prompt from the question, the tool catalog and the scratchpad
//! 2. Ask the reasoning engine for the next step
//! 3. Normalize and parse the reply into a tool call or a final answer
//! 4. Run the tool, record the observation, repeat until an answer or the ceiling

mod agent_loop;
pub mod parser;
mod prompt;
mod result;
mod scratchpad;

pub use agent_loop::{Agent, AgentOptions, DispatchError, FORMAT_ERROR_ACTION};
pub use parser::{normalize, parse, ParseError, ParsedStep};
pub use prompt::build_prompt;
pub use result::{ErrorKind, SessionReport, SessionResult};
pub use scratchpad::{Scratchpad, ScratchpadEntry};
