//! Property-listing knowledge base.
//!
//! Turns a listings CSV and a guidelines PDF into an in-memory vector store
//! and answers questions against it:
//!
//! - [`records`]: CSV rows to [`PropertyRecord`]s
//! - [`guidelines`]: PDF text to section-labelled [`GuidelineChunk`]s
//! - [`embeddings`]: providers plus the batching, retrying [`EmbeddingClient`]
//! - [`store`]: exact nearest-neighbour search
//! - [`base`]: the [`KnowledgeBase`] lifecycle and snapshots
//! - [`query`]: the [`QueryEngine`]

pub mod base;
pub mod embeddings;
pub mod guidelines;
pub mod query;
pub mod records;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use base::{KnowledgeBase, SourceSet};
pub use embeddings::{EmbeddingClient, EmbeddingConfig, EmbeddingProvider};
pub use guidelines::{ChunkingOptions, GuidelineChunk, GuidelineDocument};
pub use query::{build_context, Answer, QueryEngine, DEFAULT_TOP_K};
pub use records::{format_price, load_properties, parse_price, PropertyBatch, PropertyRecord};
pub use snapshot::Snapshot;
pub use store::FlatVectorStore;
pub use types::{BuildStats, EmbeddedItem, ItemSource, KnowledgeState, SearchHit};
pub use vector_index::{DistanceMetric, VectorIndex};
