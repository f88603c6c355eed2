//! Embedding generation and the on-disk embedding cache.
//!
//! # Main types
//!
//! - [`EmbeddingModel`] — trait for text encoders producing L2-normalised
//!   vectors; [`HashedTextModel`] is the built-in deterministic encoder.
//! - [`EmbeddingService`] — lazy, shared model initialisation plus cache
//!   access.
//! - [`EmbeddingCache`] — per-server JSON cache files with startup GC.

pub mod cache;
pub mod model;
pub mod service;

pub use cache::{calculate_memory_usage, generate_server_hash, EmbeddingCache, EmbeddingMap};
pub use model::{dot, l2_normalize, EmbeddingModel, HashedTextModel, DEFAULT_DIMENSION};
pub use service::{EmbeddingService, ModelLoader};
