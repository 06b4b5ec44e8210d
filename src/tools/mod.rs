//! Client-side tool execution.

pub mod executor;
pub mod sql_api;

pub use executor::{ExecutionError, FnExecutor, QueryId, ToolExecutor};
pub use sql_api::SqlApiExecutor;
