//! Runtime settings. The environment is read exactly once at startup and the
//! resulting record is passed into the constructors that need it.

use std::env;
use std::path::PathBuf;

/// Retrieval mode for `search_tools`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Weighted lexical fuzzy matching (default).
    #[default]
    Fuse,
    /// Embedding similarity.
    Vector,
}

impl SearchMode {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "vector" => SearchMode::Vector,
            _ => SearchMode::Fuse,
        }
    }
}

/// Logging configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// One of DEBUG, INFO, WARN, ERROR.
    pub level: String,
    pub file_path: Option<PathBuf>,
    pub show_timestamp: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file_path: None,
            show_timestamp: true,
        }
    }
}

/// Process-wide configuration, resolved once in `main`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub skills_path: PathBuf,
    pub search_mode: SearchMode,
    pub embedding_model: String,
    pub cache_dir: PathBuf,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("mcp-config.json"),
            skills_path: PathBuf::from("skills.yaml"),
            search_mode: SearchMode::Fuse,
            embedding_model: "Xenova/all-MiniLM-L6-v2".to_string(),
            cache_dir: PathBuf::from(".cache/embeddings"),
            log: LogSettings::default(),
        }
    }
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Self {
            config_path: env_path("MCP_CONFIG_PATH").unwrap_or(defaults.config_path),
            skills_path: env_path("MCP_SKILLS_PATH").unwrap_or(defaults.skills_path),
            search_mode: env::var("MCP_SEARCH_MODE")
                .map(|v| SearchMode::parse(&v))
                .unwrap_or(defaults.search_mode),
            embedding_model: env::var("MCP_EMBEDDING_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.embedding_model),
            cache_dir: env_path("MCP_CACHE_DIR").unwrap_or(defaults.cache_dir),
            log: LogSettings {
                level: env::var("LOG_LEVEL")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| v.trim().to_uppercase())
                    .unwrap_or(defaults.log.level),
                file_path: env_path("LOG_FILE_PATH"),
                show_timestamp: env::var("LOG_SHOW_TIMESTAMP")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.log.show_timestamp),
            },
        }
    }

    pub fn vector_mode(&self) -> bool {
        self.search_mode == SearchMode::Vector
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Truthy values: true, 1, yes, on (case-insensitive).
fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
