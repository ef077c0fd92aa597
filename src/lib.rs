//! # Aegis
//!
//! A ReAct-style financial analyst agent.
//!
//! This library provides:
//! - A reasoning loop that lets a language model call tools until it can answer
//! - Tools over an internal SQLite database, web search and a 10-K vector store
//! - An HTTP API for submitting questions
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aegis::agent::{Agent, AgentOptions};
//! use aegis::llm::MockEngine;
//! use aegis::tools::ToolRegistry;
//!
//! let agent = Agent::new(Arc::new(MockEngine), Arc::new(ToolRegistry::new()), AgentOptions::default());
//! let result = agent.run("What was our Q3 profit?").await;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;
pub mod util;

pub use config::Config;
