//! Aggregating MCP proxy: connects to configured upstream MCP servers and
//! re-exposes their tools behind `search_tools` and `call_tool`.

pub mod bootstrap;
pub mod config;
pub mod facade;
pub mod serve;

pub use bootstrap::run;
pub use config::{load_config, ServerConfig};
pub use facade::{Facade, DEFAULT_SEARCH_LIMIT};
