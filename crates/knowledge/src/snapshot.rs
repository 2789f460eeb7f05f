//! JSON snapshots of a built knowledge base.
//!
//! A snapshot lets `ask`/`search` skip re-embedding the sources. It is a
//! cache, not a database: files are written whole and read back whole, and
//! a snapshot embedded with a different model or dimension is refused.

use crate::embeddings::EmbeddingConfig;
use crate::types::{BuildStats, EmbeddedItem};
use crate::vector_index::DistanceMetric;
use chrono::{DateTime, Utc};
use estate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Snapshot format version; bumped on incompatible layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Identity of a source file at build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: String,
    pub sha256: String,
}

impl FileFingerprint {
    pub fn of_file(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self {
            path: path.display().to_string(),
            sha256: format!("{:x}", Sha256::digest(&bytes)),
        })
    }
}

/// Fingerprints of the sources a knowledge base was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<FileFingerprint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<FileFingerprint>,
}

impl SourceFingerprints {
    /// Fingerprint both sources; an unreadable file is simply left out.
    pub fn capture(csv: &Path, pdf: &Path) -> Self {
        Self {
            csv: FileFingerprint::of_file(csv).ok(),
            pdf: FileFingerprint::of_file(pdf).ok(),
        }
    }
}

/// Embedding settings recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEmbedding {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

/// On-disk form of a ready knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub metric: DistanceMetric,
    pub embedding: SnapshotEmbedding,
    #[serde(default)]
    pub sources: SourceFingerprints,
    #[serde(default)]
    pub stats: BuildStats,
    pub items: Vec<EmbeddedItem>,
}

impl Snapshot {
    pub fn new(
        metric: DistanceMetric,
        embedding: &EmbeddingConfig,
        sources: SourceFingerprints,
        stats: BuildStats,
        items: Vec<EmbeddedItem>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            metric,
            embedding: SnapshotEmbedding {
                provider: embedding.provider.clone(),
                model: embedding.model.clone(),
                dimensions: embedding.dimensions,
            },
            sources,
            stats,
            items,
        }
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;

        tracing::info!(
            "Saved snapshot with {} items to {:?}",
            self.items.len(),
            path
        );
        Ok(())
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AppError::Knowledge(format!(
                "Unsupported snapshot version {} in {:?} (expected {})",
                snapshot.version, path, SNAPSHOT_VERSION
            )));
        }

        tracing::debug!(
            "Loaded snapshot from {:?} created at {}",
            path,
            snapshot.created_at.to_rfc3339()
        );
        Ok(snapshot)
    }

    /// Refuse a snapshot whose vectors are not comparable with `active`.
    pub fn check_compatible(&self, active: &EmbeddingConfig) -> AppResult<()> {
        let recorded = EmbeddingConfig {
            provider: self.embedding.provider.clone(),
            model: self.embedding.model.clone(),
            dimensions: self.embedding.dimensions,
            ..active.clone()
        };
        active
            .validate_consistency(&recorded)
            .map_err(|e| AppError::Knowledge(format!("Snapshot is incompatible: {}", e)))
    }
}
