//! MCP agent module providing process session and filesystem search tools.
//!
//! This module is organized into the following submodules:
//!
//! - `buffer`: Append-only paginated buffer shared by sessions and searches
//! - `types`: Serializable response types for MCP tools
//! - `config`: Configuration resolution with environment variable support
//! - `error`: Error kinds surfaced to MCP clients
//! - `guard`: Allowed-directory checks for every path argument
//! - `process`: Process sessions and their registry
//! - `search`: Streaming file and content search
//! - `storage`: Storage traits and DashMap implementations
//! - `context`: Shared registries handed to every connection
//! - `commands`: MCP tool implementations

pub mod buffer;
pub mod commands;
pub(crate) mod config;
pub mod context;
pub mod error;
pub mod guard;
pub(crate) mod message;
pub mod process;
pub(crate) mod schema;
pub mod search;
pub mod storage;
pub mod types;

pub use commands::McpAgentCommands;
pub use config::{ProcessSettings, REAPER_INTERVAL, SearchSettings};
pub use context::AgentContext;
