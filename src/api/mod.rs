//! HTTP API for submitting questions to the agent.

mod routes;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentOptions};
use crate::config::Config;
use crate::llm::{Embedder, GeminiClient, MockEngine, ReasoningEngine};
use crate::tools::build_registry;

pub use routes::{router, status_for, AppState};

/// Build the reasoning engine, embedder and agent described by `config`.
pub fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    let gemini = match &config.api_key {
        Some(key) => Some(Arc::new(
            GeminiClient::new(
                key.clone(),
                config.default_model.clone(),
                config.tools.embed_model.clone(),
            )
            .context("Failed to create Gemini client")?,
        )),
        None => None,
    };

    let engine: Arc<dyn ReasoningEngine> = match (&gemini, config.mock_mode) {
        (Some(client), false) => {
            tracing::info!("Using Gemini model {}", client.model());
            client.clone() as Arc<dyn ReasoningEngine>
        }
        _ => {
            tracing::info!("Using mock reasoning engine");
            Arc::new(MockEngine)
        }
    };
    let embedder = gemini.map(|client| client as Arc<dyn Embedder>);

    let tools = build_registry(config, engine.clone(), embedder)?;
    tracing::info!("Registered tools: {:?}", tools.names());

    Ok(Agent::new(engine, Arc::new(tools), AgentOptions::from(config)))
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = match build_agent(&config) {
        Ok(agent) => AppState::new(agent, shutdown.clone()),
        Err(e) => {
            tracing::error!("Agent initialization failed: {:#}", e);
            AppState::unavailable(format!("{:#}", e), shutdown.clone())
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router(Arc::new(state)))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
            tracing::info!("Shutting down, cancelling running sessions");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    Ok(())
}
