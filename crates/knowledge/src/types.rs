//! Knowledge system type definitions.

use crate::guidelines::GuidelineChunk;
use crate::records::PropertyRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an embedded vector points back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ItemSource {
    Property(PropertyRecord),
    Guideline(GuidelineChunk),
}

impl ItemSource {
    /// Text sent to the embedding service and shown in prompt context.
    pub fn render(&self) -> String {
        match self {
            ItemSource::Property(record) => record.render(),
            ItemSource::Guideline(chunk) => chunk.render(),
        }
    }

    /// Short label for listings ("property" or "guideline").
    pub fn kind(&self) -> &'static str {
        match self {
            ItemSource::Property(_) => "property",
            ItemSource::Guideline(_) => "guideline",
        }
    }

    pub fn as_property(&self) -> Option<&PropertyRecord> {
        match self {
            ItemSource::Property(record) => Some(record),
            ItemSource::Guideline(_) => None,
        }
    }

    pub fn as_guideline(&self) -> Option<&GuidelineChunk> {
        match self {
            ItemSource::Guideline(chunk) => Some(chunk),
            ItemSource::Property(_) => None,
        }
    }
}

/// A vector together with the item it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedItem {
    pub vector: Vec<f32>,
    pub source: ItemSource,
}

impl EmbeddedItem {
    pub fn new(vector: Vec<f32>, source: ItemSource) -> Self {
        Self { vector, source }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// One result of a nearest-neighbour search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 1-based rank
    pub rank: usize,

    /// Distance under the store's metric; smaller is closer
    pub distance: f32,

    pub item: ItemSource,
}

/// Lifecycle state of a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum KnowledgeState {
    Empty,
    Loading,
    Ready,
    Failed(String),
}

impl KnowledgeState {
    pub fn is_ready(&self) -> bool {
        matches!(self, KnowledgeState::Ready)
    }
}

impl fmt::Display for KnowledgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnowledgeState::Empty => write!(f, "empty"),
            KnowledgeState::Loading => write!(f, "loading"),
            KnowledgeState::Ready => write!(f, "ready"),
            KnowledgeState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    /// Property records indexed
    pub records: usize,

    /// Rows skipped because they were sold
    pub sold_skipped: usize,

    /// Rows rejected with a parse error
    pub rejected_rows: usize,

    /// Guideline chunks indexed
    pub chunks: usize,

    /// Items in the vector store
    pub embedded: usize,

    pub embedding_model: String,
    pub dimensions: usize,
    pub duration_ms: u64,

    /// Why the guideline source was skipped, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidelines_error: Option<String>,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Properties indexed: {}", self.records)?;
        writeln!(f, "Sold rows skipped:  {}", self.sold_skipped)?;
        writeln!(f, "Rows rejected:      {}", self.rejected_rows)?;
        writeln!(f, "Guideline chunks:   {}", self.chunks)?;
        writeln!(
            f,
            "Vectors stored:     {} ({} x {})",
            self.embedded, self.embedding_model, self.dimensions
        )?;
        if let Some(err) = &self.guidelines_error {
            writeln!(f, "Guidelines skipped: {}", err)?;
        }
        write!(f, "Build time:         {}ms", self.duration_ms)
    }
}
