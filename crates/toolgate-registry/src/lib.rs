//! The aggregate tool catalogue and its connection lifecycle.

pub mod record;
pub mod registry;

pub use record::{ToolBackend, ToolRecord, INTERNAL_SERVER};
pub use registry::{ServerStatus, ToolRegistry};
