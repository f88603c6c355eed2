//! Mode-switched tool search with fused ranking.

use crate::fuzzy::{FuzzyHit, FuzzyIndex};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use toolgate_core::text::tokenize;
use toolgate_core::{SearchMode, ToolgateResult};
use toolgate_registry::{ToolRecord, ToolRegistry};
use tracing::debug;

/// Minimum cosine similarity for a vector-mode hit.
const VECTOR_SCORE_FLOOR: f32 = 0.35;

/// Coverage-score gap below which two records are considered tied and fall
/// through to the fuzzy score.
const COVERAGE_TIE_EPSILON: f32 = 0.1;

struct FuzzyCache {
    built_at: u64,
    index: Arc<FuzzyIndex>,
    records: Vec<Arc<ToolRecord>>,
}

/// Relevance-ranked lookup over the registry's catalogue.
///
/// The fuzzy index is cached against the registry version: a lookup reuses
/// the index while `built_at` equals the registry's `updated_at` and
/// rebuilds otherwise.
pub struct SearchEngine {
    registry: Arc<ToolRegistry>,
    mode: SearchMode,
    fuzzy_cache: RwLock<Option<FuzzyCache>>,
}

impl SearchEngine {
    pub fn new(registry: Arc<ToolRegistry>, mode: SearchMode) -> Self {
        Self {
            registry,
            mode,
            fuzzy_cache: RwLock::new(None),
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Top-`limit` records for a query. `limit == 0` yields an empty list.
    pub async fn search_tools(
        &self,
        query: &str,
        limit: usize,
    ) -> ToolgateResult<Vec<Arc<ToolRecord>>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match self.mode {
            SearchMode::Fuse => Ok(self.search_fuzzy(query, limit).await),
            SearchMode::Vector => self.search_vector(query, limit).await,
        }
    }

    async fn fuzzy_index(&self) -> (Arc<FuzzyIndex>, Vec<Arc<ToolRecord>>) {
        let version = self.registry.updated_at().await;
        {
            let cache = self.fuzzy_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.built_at == version {
                    return (cached.index.clone(), cached.records.clone());
                }
            }
        }

        let (records, built_at) = self.registry.snapshot().await;
        let index = Arc::new(FuzzyIndex::build(&records));
        debug!(tools = records.len(), version = built_at, "fuzzy index rebuilt");

        let mut cache = self.fuzzy_cache.write().await;
        // Last writer wins; the index is deterministic for a given version.
        *cache = Some(FuzzyCache {
            built_at,
            index: index.clone(),
            records: records.clone(),
        });
        (index, records)
    }

    async fn search_fuzzy(&self, query: &str, limit: usize) -> Vec<Arc<ToolRecord>> {
        let (index, records) = self.fuzzy_index().await;
        if records.is_empty() {
            return Vec::new();
        }

        let lowered = query.to_lowercase();
        let mut hits: Vec<FuzzyHit> = index.search(&lowered);

        // Too few hits: retry with individual query tokens and append any
        // record not already in the result set.
        if hits.len() < limit {
            let mut seen: HashSet<(String, String)> = hits
                .iter()
                .map(|h| key_of(&records[h.index]))
                .collect();
            for token in tokenize(&lowered, 4) {
                for hit in index.search(&token) {
                    if seen.insert(key_of(&records[hit.index])) {
                        hits.push(hit);
                    }
                }
            }
        }

        let query_words = tokenize(&lowered, 2);
        let mut ranked: Vec<(f32, FuzzyHit)> = hits
            .into_iter()
            .map(|hit| (coverage_score(&records[hit.index], &query_words), hit))
            .collect();

        ranked.sort_by(|(cov_a, hit_a), (cov_b, hit_b)| {
            if (cov_a - cov_b).abs() > COVERAGE_TIE_EPSILON {
                cov_b.partial_cmp(cov_a).unwrap_or(std::cmp::Ordering::Equal)
            } else {
                hit_a
                    .score
                    .partial_cmp(&hit_b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            }
        });

        ranked
            .into_iter()
            .take(limit)
            .map(|(_, hit)| records[hit.index].clone())
            .collect()
    }

    async fn search_vector(
        &self,
        query: &str,
        limit: usize,
    ) -> ToolgateResult<Vec<Arc<ToolRecord>>> {
        let query_embedding = self
            .registry
            .embeddings()
            .generate_embedding(query)
            .await?;

        let (records, _) = self.registry.snapshot().await;
        let mut scored: Vec<(f32, Arc<ToolRecord>)> = records
            .into_iter()
            .filter_map(|record| {
                let embedding = record.embedding.as_ref()?;
                let score = toolgate_embed::dot(&query_embedding, embedding);
                (score > VECTOR_SCORE_FLOOR).then_some((score, record))
            })
            .collect();

        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, record)| record).collect())
    }
}

fn key_of(record: &Arc<ToolRecord>) -> (String, String) {
    (record.server.clone(), record.name.clone())
}

/// Integer-weighted coverage: +1 per query word contained in the record's
/// normalised text, +0.5 more when the name contains it.
fn coverage_score(record: &Arc<ToolRecord>, query_words: &[String]) -> f32 {
    let name = record.name.to_lowercase();
    let mut score = 0.0;
    for word in query_words {
        if record.normalized_text.contains(word.as_str()) {
            score += 1.0;
        }
        if name.contains(word.as_str()) {
            score += 0.5;
        }
    }
    score
}
