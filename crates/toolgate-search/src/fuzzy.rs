//! Weighted fuzzy index over tool records.
//!
//! Four string fields participate in scoring, with fixed weights. A field
//! score of 0 is a perfect match and 1 no match at all; field scores combine
//! multiplicatively as `score_i ^ weight_i`, so a strong match on one field
//! is enough to qualify a record. Combined scores above the threshold are
//! dropped.

use std::collections::HashMap;
use std::sync::Arc;
use toolgate_registry::ToolRecord;

pub const WEIGHT_NAME: f32 = 0.50;
pub const WEIGHT_DESCRIPTION: f32 = 0.30;
pub const WEIGHT_KEYWORDS: f32 = 0.15;
pub const WEIGHT_SERVER: f32 = 0.05;

/// Records scoring above this are not considered matches.
pub const SCORE_THRESHOLD: f32 = 0.40;

/// Floor for a perfect field score inside the multiplicative combination.
const MIN_FIELD_SCORE: f32 = 0.001;

struct IndexEntry {
    name: String,
    description: String,
    keywords: String,
    server: String,
}

/// A match: record position in the indexed snapshot plus its fuzzy score
/// (lower is better).
#[derive(Debug, Clone, Copy)]
pub struct FuzzyHit {
    pub index: usize,
    pub score: f32,
}

/// Lexical index over a registry snapshot. Rebuilt whenever the registry
/// version advances; see the engine's cache.
pub struct FuzzyIndex {
    entries: Vec<IndexEntry>,
}

impl FuzzyIndex {
    pub fn build(records: &[Arc<ToolRecord>]) -> Self {
        let entries = records
            .iter()
            .map(|record| IndexEntry {
                name: record.name.to_lowercase(),
                description: record.description.to_lowercase(),
                keywords: record.schema_keywords.to_lowercase(),
                server: record.server.to_lowercase(),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score every entry against a lowercased query and return matches in
    /// ascending score order.
    pub fn search(&self, query: &str) -> Vec<FuzzyHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<FuzzyHit> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let score = combined_score(query, entry);
                (score <= SCORE_THRESHOLD).then_some(FuzzyHit { index, score })
            })
            .collect();

        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        hits
    }
}

fn combined_score(query: &str, entry: &IndexEntry) -> f32 {
    let fields = [
        (field_score(query, &entry.name), WEIGHT_NAME),
        (field_score(query, &entry.description), WEIGHT_DESCRIPTION),
        (field_score(query, &entry.keywords), WEIGHT_KEYWORDS),
        (field_score(query, &entry.server), WEIGHT_SERVER),
    ];
    fields
        .iter()
        .map(|(score, weight)| score.max(MIN_FIELD_SCORE).powf(*weight))
        .product()
}

/// Distance between a query and one field: 0 exact, small for substring
/// containment, bigram dissimilarity otherwise.
fn field_score(query: &str, text: &str) -> f32 {
    if text.is_empty() {
        return 1.0;
    }
    if text == query {
        return 0.0;
    }
    if text.contains(query) {
        // Longer shared fraction scores closer to exact.
        let coverage = query.chars().count() as f32 / text.chars().count() as f32;
        return 0.05 + 0.15 * (1.0 - coverage);
    }
    1.0 - bigram_similarity(query, text)
}

/// Dice coefficient over character bigrams.
fn bigram_similarity(a: &str, b: &str) -> f32 {
    let a_grams = bigrams(a);
    let b_grams = bigrams(b);
    if a_grams.is_empty() || b_grams.is_empty() {
        return 0.0;
    }

    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for gram in &a_grams {
        *counts.entry(*gram).or_insert(0) += 1;
    }
    let mut shared = 0usize;
    for gram in &b_grams {
        if let Some(count) = counts.get_mut(gram) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }
    (2.0 * shared as f32) / (a_grams.len() + b_grams.len()) as f32
}

fn bigrams(text: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}
