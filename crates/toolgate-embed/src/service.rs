//! Embedding service: lazy model initialisation shared by all callers, plus
//! access to the on-disk cache.

use crate::cache::{EmbeddingCache, EmbeddingMap};
use crate::model::{EmbeddingModel, HashedTextModel};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use toolgate_core::ToolgateResult;
use tracing::info;

/// Loads the embedding model. The default loader constructs the in-tree
/// hashed encoder; deployments with a real inference runtime substitute
/// their own.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> ToolgateResult<Arc<dyn EmbeddingModel>>;
}

struct HashedModelLoader {
    model_name: String,
    dimension: usize,
}

#[async_trait]
impl ModelLoader for HashedModelLoader {
    async fn load(&self) -> ToolgateResult<Arc<dyn EmbeddingModel>> {
        Ok(Arc::new(HashedTextModel::new(
            self.model_name.clone(),
            self.dimension,
        )))
    }
}

/// Text-to-vector service with a process-wide model singleton.
///
/// The model is loaded on first use. Concurrent first callers serialise on
/// the slot mutex, so exactly one load is ever in flight; a failed load
/// leaves the slot empty and a later call retries.
pub struct EmbeddingService {
    loader: Arc<dyn ModelLoader>,
    slot: Mutex<Option<Arc<dyn EmbeddingModel>>>,
    cache: EmbeddingCache,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(model_name: impl Into<String>, dimension: usize, cache_dir: PathBuf) -> Self {
        let model_name = model_name.into();
        Self {
            loader: Arc::new(HashedModelLoader {
                model_name,
                dimension,
            }),
            slot: Mutex::new(None),
            cache: EmbeddingCache::new(cache_dir),
            dimension,
        }
    }

    /// Build a service around a custom loader.
    pub fn with_loader(loader: Arc<dyn ModelLoader>, dimension: usize, cache_dir: PathBuf) -> Self {
        Self {
            loader,
            slot: Mutex::new(None),
            cache: EmbeddingCache::new(cache_dir),
            dimension,
        }
    }

    /// Build a service around an already-initialised model.
    pub fn with_model(model: Arc<dyn EmbeddingModel>, cache_dir: PathBuf) -> Self {
        let dimension = model.dimension();
        Self {
            loader: Arc::new(PreloadedLoader {
                model: model.clone(),
            }),
            slot: Mutex::new(Some(model)),
            cache: EmbeddingCache::new(cache_dir),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    async fn model(&self) -> ToolgateResult<Arc<dyn EmbeddingModel>> {
        let mut slot = self.slot.lock().await;
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }
        // Slot stays empty on failure so a later caller can retry.
        let model = self.loader.load().await?;
        info!(model = %model.name(), dimension = model.dimension(), "embedding model loaded");
        *slot = Some(model.clone());
        Ok(model)
    }

    /// Encode a text into an L2-normalised vector, initialising the model on
    /// first use.
    pub async fn generate_embedding(&self, text: &str) -> ToolgateResult<Vec<f32>> {
        let model = self.model().await?;
        model.embed(text).await
    }

    /// Read the cached embedding map for a server hash, or `None` on miss.
    pub async fn get_cached_embeddings(&self, hash: &str) -> Option<EmbeddingMap> {
        self.cache.get_cached_embeddings(hash).await
    }

    /// Persist the embedding map for a server hash.
    pub async fn save_embeddings_to_cache(
        &self,
        hash: &str,
        map: &EmbeddingMap,
    ) -> ToolgateResult<()> {
        self.cache.save_embeddings_to_cache(hash, map).await
    }

    /// Drop cache files for servers no longer configured.
    pub async fn cleanup_unused_cache(&self, active_hashes: &HashSet<String>) {
        self.cache.cleanup_unused_cache(active_hashes).await
    }
}

struct PreloadedLoader {
    model: Arc<dyn EmbeddingModel>,
}

#[async_trait]
impl ModelLoader for PreloadedLoader {
    async fn load(&self) -> ToolgateResult<Arc<dyn EmbeddingModel>> {
        Ok(self.model.clone())
    }
}
