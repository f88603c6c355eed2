//! The tool registry: upstream connection lifecycle, catalogue assembly,
//! embedding attachment, and skill ingestion.

use crate::record::{ToolBackend, ToolRecord, INTERNAL_SERVER};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use toolgate_core::{SkillDefinition, ToolgateResult};
use toolgate_embed::{generate_server_hash, EmbeddingMap, EmbeddingService};
use toolgate_mcp::{McpClient, UpstreamClient};
use tracing::{info, warn};

/// In-flight embedding generations per server during registration.
const EMBED_CONCURRENCY: usize = 10;

/// Connection metadata for one upstream server.
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub name: String,
    pub tool_count: usize,
    pub connected_at: DateTime<Utc>,
}

struct RegistryInner {
    tools: Vec<Arc<ToolRecord>>,
    index: HashMap<(String, String), Arc<ToolRecord>>,
    servers: Vec<ServerStatus>,
    /// Monotonic version counter; advanced by every successful mutation.
    updated_at: u64,
}

/// The aggregate tool catalogue.
///
/// Registration appends; readers take snapshots, so search and dispatch
/// observe a consistent catalogue without holding the lock.
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
    embeddings: Arc<EmbeddingService>,
    vector_mode: bool,
}

impl ToolRegistry {
    pub fn new(embeddings: Arc<EmbeddingService>, vector_mode: bool) -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                tools: Vec::new(),
                index: HashMap::new(),
                servers: Vec::new(),
                updated_at: 0,
            }),
            embeddings,
            vector_mode,
        }
    }

    pub fn vector_mode(&self) -> bool {
        self.vector_mode
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    /// Spawn an upstream MCP server, enumerate its tools, and insert them.
    pub async fn connect_server(
        &self,
        name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> ToolgateResult<usize> {
        let client = McpClient::connect(name, command, args, env).await?;
        let hash = generate_server_hash(name, command, args, env);
        self.register_tools_from_client(name, Arc::new(client), Some(&hash))
            .await
    }

    /// Enumerate tools from a connected client and insert their records.
    ///
    /// In vector mode, embeddings are hydrated from the cached map where
    /// possible and generated (with bounded concurrency) otherwise; a
    /// generation failure registers the tool without a vector. When new
    /// vectors were produced and a `server_hash` is known, the merged map is
    /// persisted before returning.
    pub async fn register_tools_from_client(
        &self,
        server_name: &str,
        client: Arc<dyn UpstreamClient>,
        server_hash: Option<&str>,
    ) -> ToolgateResult<usize> {
        let tools = client.list_tools().await?;

        let mut records: Vec<ToolRecord> = tools
            .into_iter()
            .map(|def| {
                ToolRecord::new(
                    server_name,
                    def.name,
                    def.description,
                    def.input_schema,
                    ToolBackend::Upstream(client.clone()),
                )
            })
            .collect();

        if self.vector_mode {
            let cached = match server_hash {
                Some(hash) => self
                    .embeddings
                    .get_cached_embeddings(hash)
                    .await
                    .unwrap_or_default(),
                None => EmbeddingMap::new(),
            };
            let generated = self.attach_embeddings(&mut records, &cached).await;

            if !generated.is_empty() {
                if let Some(hash) = server_hash {
                    let mut merged = cached;
                    merged.extend(generated);
                    if let Err(e) = self.embeddings.save_embeddings_to_cache(hash, &merged).await {
                        warn!(server = %server_name, error = %e, "failed to persist embedding cache");
                    }
                }
            }
        }

        let inserted = self.insert_records(records, Some(server_name)).await;
        info!(server = %server_name, tools = inserted, "upstream tools registered");
        Ok(inserted)
    }

    /// Resolve embeddings for the given records, consuming the cached map
    /// where entries match the model dimension and generating the rest.
    /// Returns the newly generated vectors keyed by tool name.
    async fn attach_embeddings(
        &self,
        records: &mut [ToolRecord],
        cached: &EmbeddingMap,
    ) -> EmbeddingMap {
        let dimension = self.embeddings.dimension();
        let mut pending: Vec<usize> = Vec::new();

        for (i, record) in records.iter_mut().enumerate() {
            match cached.get(&record.name) {
                Some(vector) if vector.len() == dimension => {
                    record.embedding = Some(vector.clone());
                }
                Some(vector) => {
                    warn!(
                        tool = %record.name,
                        cached_len = vector.len(),
                        expected = dimension,
                        "cached embedding has wrong dimension, regenerating"
                    );
                    pending.push(i);
                }
                None => pending.push(i),
            }
        }

        let semaphore = Arc::new(Semaphore::new(EMBED_CONCURRENCY));
        let mut handles = Vec::with_capacity(pending.len());
        for i in pending {
            let text = records[i].embedding_text();
            let name = records[i].name.clone();
            let service = self.embeddings.clone();
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (i, name, service.generate_embedding(&text).await)
            }));
        }

        let mut generated = EmbeddingMap::new();
        for handle in handles {
            match handle.await {
                Ok((i, name, Ok(vector))) => {
                    generated.insert(name, vector.clone());
                    records[i].embedding = Some(vector);
                }
                Ok((_, name, Err(e))) => {
                    warn!(tool = %name, error = %e, "embedding generation failed, registering without vector");
                }
                Err(e) => {
                    warn!(error = %e, "embedding task aborted");
                }
            }
        }
        generated
    }

    /// Register a skill as a tool on the synthetic `internal` server.
    pub async fn register_skill(&self, skill: SkillDefinition) -> ToolgateResult<()> {
        let definition = Arc::new(skill);
        let mut record = ToolRecord::new(
            INTERNAL_SERVER,
            definition.name.clone(),
            definition.description.clone(),
            definition.input_schema(),
            ToolBackend::Skill(definition.clone()),
        );

        if self.vector_mode {
            match self
                .embeddings
                .generate_embedding(&record.embedding_text())
                .await
            {
                Ok(vector) => record.embedding = Some(vector),
                Err(e) => {
                    warn!(skill = %definition.name, error = %e, "skill embedding generation failed");
                }
            }
        }

        self.insert_records(vec![record], None).await;
        info!(skill = %definition.name, "skill registered");
        Ok(())
    }

    /// Append records, refresh the secondary index, and advance the version
    /// counter. Returns how many records were inserted.
    async fn insert_records(&self, records: Vec<ToolRecord>, server: Option<&str>) -> usize {
        let mut inner = self.inner.write().await;
        let mut inserted = 0;
        for record in records {
            let key = (record.server.clone(), record.name.clone());
            if inner.index.contains_key(&key) {
                warn!(server = %key.0, tool = %key.1, "duplicate tool ignored");
                continue;
            }
            let record = Arc::new(record);
            inner.index.insert(key, record.clone());
            inner.tools.push(record);
            inserted += 1;
        }
        if let Some(name) = server {
            inner.servers.push(ServerStatus {
                name: name.to_string(),
                tool_count: inserted,
                connected_at: Utc::now(),
            });
        }
        inner.updated_at += 1;
        inserted
    }

    /// O(1) lookup by primary key.
    pub async fn get_tool(&self, server: &str, name: &str) -> Option<Arc<ToolRecord>> {
        let inner = self.inner.read().await;
        inner
            .index
            .get(&(server.to_string(), name.to_string()))
            .cloned()
    }

    /// All records with the given name, in registration order.
    pub async fn find_by_name(&self, name: &str) -> Vec<Arc<ToolRecord>> {
        let inner = self.inner.read().await;
        inner
            .tools
            .iter()
            .filter(|t| t.name == name)
            .cloned()
            .collect()
    }

    /// A consistent view of the catalogue: the records and the version they
    /// belong to.
    pub async fn snapshot(&self) -> (Vec<Arc<ToolRecord>>, u64) {
        let inner = self.inner.read().await;
        (inner.tools.clone(), inner.updated_at)
    }

    pub async fn updated_at(&self) -> u64 {
        self.inner.read().await.updated_at
    }

    pub async fn tool_count(&self) -> usize {
        self.inner.read().await.tools.len()
    }

    pub async fn server_statuses(&self) -> Vec<ServerStatus> {
        self.inner.read().await.servers.clone()
    }

    /// Number of stored vectors and their estimated memory footprint.
    pub async fn embedding_stats(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        let mut vectors = 0;
        let mut bytes = 0;
        for tool in &inner.tools {
            if let Some(embedding) = &tool.embedding {
                vectors += 1;
                bytes += tool.name.chars().count() * 2 + embedding.len() * 8;
            }
        }
        (vectors, bytes)
    }
}
