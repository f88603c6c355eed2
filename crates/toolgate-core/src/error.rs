use thiserror::Error;

pub type ToolgateResult<T> = Result<T, ToolgateError>;

#[derive(Error, Debug)]
pub enum ToolgateError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Tool enumeration error: {0}")]
    Enumeration(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Skills error: {0}")]
    Skills(String),

    #[error("Tool '{tool}' not found on server '{server}'")]
    ToolNotFound { tool: String, server: String },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
