//! Declarative skills: YAML loading, templated multi-step execution, and the
//! dispatcher that routes calls to upstream tools or skill interpretation.

pub mod dispatch;
pub mod executor;
pub mod loader;
pub mod template;

pub use dispatch::execute_tool;
pub use executor::execute_skill;
pub use loader::{load_skills, parse_skills};
pub use template::{stringify, substitute};
