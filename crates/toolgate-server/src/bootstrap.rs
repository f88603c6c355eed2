//! Startup wiring: config, upstream connections, cache GC, skills, serve.

use crate::config::{load_config, ServerConfig};
use crate::facade::Facade;
use crate::serve::serve;
use std::collections::HashSet;
use std::sync::Arc;
use toolgate_core::{Settings, ToolgateResult};
use toolgate_embed::{generate_server_hash, EmbeddingService, DEFAULT_DIMENSION};
use toolgate_mcp::{McpClient, UpstreamClient};
use toolgate_registry::ToolRegistry;
use toolgate_skills::load_skills;
use tracing::{info, warn};

/// Build the registry, connect everything, and serve until stdin closes.
pub async fn run(settings: Settings) -> ToolgateResult<()> {
    let servers = load_config(&settings.config_path).await?;
    info!(
        servers = servers.len(),
        mode = ?settings.search_mode,
        "starting toolgate"
    );

    let embeddings = Arc::new(EmbeddingService::new(
        settings.embedding_model.clone(),
        DEFAULT_DIMENSION,
        settings.cache_dir.clone(),
    ));
    let registry = Arc::new(ToolRegistry::new(
        embeddings.clone(),
        settings.vector_mode(),
    ));

    connect_upstreams(&registry, &servers).await;

    if settings.vector_mode() {
        let active: HashSet<String> = servers
            .iter()
            .map(|(name, config)| {
                generate_server_hash(name, &config.command, &config.args, &config.env)
            })
            .collect();
        embeddings.cleanup_unused_cache(&active).await;
    }

    register_skills(&registry, &settings).await?;

    let (vectors, bytes) = registry.embedding_stats().await;
    info!(
        tools = registry.tool_count().await,
        embeddings = vectors,
        embedding_bytes = bytes,
        "catalogue ready"
    );
    for status in registry.server_statuses().await {
        info!(server = %status.name, tools = status.tool_count, "upstream connected");
    }

    let facade = Arc::new(Facade::new(registry, settings.search_mode));
    serve(facade).await
}

/// Connect all configured upstreams concurrently, then register their tools
/// in config order so duplicate-name resolution stays deterministic. A
/// failing server is logged and skipped; the rest are kept.
async fn connect_upstreams(registry: &Arc<ToolRegistry>, servers: &[(String, ServerConfig)]) {
    let mut handles = Vec::with_capacity(servers.len());
    for (name, config) in servers {
        let name = name.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let hash = generate_server_hash(&name, &config.command, &config.args, &config.env);
            let client = McpClient::connect(&name, &config.command, &config.args, &config.env)
                .await
                .map(Arc::new);
            (name, hash, client)
        }));
    }

    for handle in handles {
        let (name, hash, client) = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "upstream connection task aborted");
                continue;
            }
        };
        let client: Arc<dyn UpstreamClient> = match client {
            Ok(client) => client,
            Err(e) => {
                warn!(server = %name, error = %e, "failed to connect upstream server");
                continue;
            }
        };
        if let Err(e) = registry
            .register_tools_from_client(&name, client, Some(&hash))
            .await
        {
            warn!(server = %name, error = %e, "failed to enumerate upstream tools");
        }
    }
}

/// Ingest the skills file if it exists. Absence is fine; a malformed file is
/// a startup failure.
async fn register_skills(registry: &Arc<ToolRegistry>, settings: &Settings) -> ToolgateResult<()> {
    match tokio::fs::try_exists(&settings.skills_path).await {
        Ok(true) => {}
        _ => {
            info!(path = %settings.skills_path.display(), "no skills file");
            return Ok(());
        }
    }

    let skills = load_skills(&settings.skills_path).await?;
    let count = skills.len();
    for skill in skills {
        registry.register_skill(skill).await?;
    }
    info!(skills = count, "skills registered");
    Ok(())
}
