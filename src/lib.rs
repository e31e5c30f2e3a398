//! Deckbridge: a tool-orchestration bridge between an LLM agent and
//! MCP-style tool servers.
//!
//! The server side ([`mcp::ToolServer`]) exposes a [`tools::ToolRegistry`]
//! over newline-delimited JSON-RPC. The client side
//! ([`agent::Orchestrator`]) connects to any number of servers, offers their
//! tools to a Gemini model and routes the calls the model makes.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use deckbridge::prelude::*;
//!
//! # async fn example() -> deckbridge::error::Result<()> {
//! let provider = Arc::new(GeminiProvider::new("gemini-2.0-flash", "api-key"));
//! let mut agent = Orchestrator::new(provider, OrchestratorOptions::default());
//! agent.connect(&ServerTarget::from_script("build/index.js")?).await?;
//! if let Some(reply) = agent.process_query("Make a deck for Acme").await {
//!     println!("{reply}");
//! }
//! agent.cleanup().await;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod mcp;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod slides;
pub mod tools;
pub mod types;
pub mod util;
