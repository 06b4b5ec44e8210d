//! cortex-agent: conversation protocol engine for the Snowflake Cortex Agents API.
//!
//! Each turn mints a fresh key-pair JWT, streams the agent's server-sent
//! events, runs at most one client-side SQL tool round trip through a
//! [`ToolExecutor`](tools::ToolExecutor), and returns the final answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use cortex_agent::prelude::*;
//!
//! # async fn example() -> cortex_agent::error::Result<()> {
//! let config = SessionConfig::from_env()?;
//! let mut session = AgentSession::from_config(config)?;
//! session.start_conversation();
//!
//! let answer = session
//!     .send_message("What are the total sales by category?")
//!     .await
//!     .into_result()?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
