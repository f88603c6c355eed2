//! Hybrid search over the tool catalogue: lexical fuzzy matching with a
//! version-keyed index cache, or embedding similarity, selected at startup.

pub mod engine;
pub mod fuzzy;

pub use engine::SearchEngine;
pub use fuzzy::{FuzzyHit, FuzzyIndex};
