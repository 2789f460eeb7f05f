//! Knowledge base lifecycle: build, rebuild, snapshot.
//!
//! A [`KnowledgeBase`] moves `Empty -> Loading -> Ready` on success and
//! `Empty -> Loading -> Failed` otherwise. Every build starts from a fresh
//! store; nothing is updated incrementally.

use crate::embeddings::EmbeddingClient;
use crate::guidelines::{ChunkingOptions, GuidelineChunk, GuidelineDocument};
use crate::records::{load_properties, PropertyRecord};
use crate::snapshot::{Snapshot, SourceFingerprints};
use crate::store::FlatVectorStore;
use crate::types::{BuildStats, EmbeddedItem, ItemSource, KnowledgeState};
use crate::vector_index::{DistanceMetric, VectorIndex};
use estate_core::{AppConfig, AppError, AppResult};
use estate_llm::RetryPolicy;
use std::path::Path;
use std::time::{Duration, Instant};

/// Normalized inputs ready to be embedded.
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    pub records: Vec<PropertyRecord>,
    pub chunks: Vec<GuidelineChunk>,

    /// Rows dropped as sold
    pub sold_skipped: usize,

    /// Rows dropped with a parse error
    pub rejected_rows: usize,

    /// Why the guideline source contributed nothing, if it failed
    pub guidelines_error: Option<String>,
}

impl SourceSet {
    pub fn new(records: Vec<PropertyRecord>, chunks: Vec<GuidelineChunk>) -> Self {
        Self {
            records,
            chunks,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.chunks.is_empty()
    }
}

/// The searchable knowledge base and its lifecycle state.
#[derive(Debug)]
pub struct KnowledgeBase {
    state: KnowledgeState,
    store: Option<FlatVectorStore>,
    stats: Option<BuildStats>,
    sources: SourceFingerprints,
    embeddings: EmbeddingClient,
    chunking: ChunkingOptions,
    metric: DistanceMetric,
}

impl KnowledgeBase {
    pub fn new(embeddings: EmbeddingClient, chunking: ChunkingOptions, metric: DistanceMetric) -> Self {
        Self {
            state: KnowledgeState::Empty,
            store: None,
            stats: None,
            sources: SourceFingerprints::default(),
            embeddings,
            chunking,
            metric,
        }
    }

    /// Wire up the embedding client, chunking and metric from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedding_config = crate::embeddings::EmbeddingConfig::from_app_config(config);
        let retry = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
        );
        let api_key = config.api_key.as_deref();
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let embeddings = EmbeddingClient::from_config(&embedding_config, api_key, retry, timeout)?;
        let chunking = ChunkingOptions::new(config.chunk_size, config.chunk_overlap)?;
        let metric = DistanceMetric::parse(&config.metric)?;

        Ok(Self::new(embeddings, chunking, metric))
    }

    pub fn state(&self) -> &KnowledgeState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Stats of the last successful build or loaded snapshot.
    pub fn stats(&self) -> Option<&BuildStats> {
        self.stats.as_ref()
    }

    pub fn embeddings(&self) -> &EmbeddingClient {
        &self.embeddings
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The store, or `AppError::NotReady` unless the base is ready.
    pub fn store(&self) -> AppResult<&FlatVectorStore> {
        match (&self.state, &self.store) {
            (KnowledgeState::Ready, Some(store)) => Ok(store),
            _ => Err(AppError::NotReady {
                state: self.state.to_string(),
            }),
        }
    }

    /// Build from a listings CSV and a guidelines PDF.
    ///
    /// Rejected rows and an unreadable PDF are logged and skipped. The build
    /// fails when nothing at all is left to index, when the CSV itself
    /// cannot be read, or when embedding fails.
    pub async fn build(&mut self, csv_path: &Path, pdf_path: &Path) -> AppResult<BuildStats> {
        self.begin();
        self.sources = SourceFingerprints::capture(csv_path, pdf_path);

        let started = Instant::now();
        let result = match self.load_sources(csv_path, pdf_path) {
            Ok(sources) => self.index(sources, started).await,
            Err(e) => Err(e),
        };
        self.finish(result)
    }

    /// Build from already-normalized records and chunks.
    pub async fn build_from_sources(&mut self, sources: SourceSet) -> AppResult<BuildStats> {
        self.begin();
        self.sources = SourceFingerprints::default();

        let result = self.index(sources, Instant::now()).await;
        self.finish(result)
    }

    /// Write the ready store to `path` as JSON.
    pub fn save_snapshot(&self, path: &Path) -> AppResult<()> {
        let store = self.store()?;
        let snapshot = Snapshot::new(
            store.metric(),
            &self.embeddings.config(),
            self.sources.clone(),
            self.stats.clone().unwrap_or_default(),
            store.items().to_vec(),
        );
        snapshot.save(path)
    }

    /// Replace the current contents with a snapshot from `path`.
    ///
    /// The snapshot must have been embedded with the same model and
    /// dimension as this base's embedding client.
    pub fn load_snapshot(&mut self, path: &Path) -> AppResult<BuildStats> {
        self.begin();

        let result = Snapshot::load(path).and_then(|snapshot| {
            snapshot.check_compatible(&self.embeddings.config())?;
            let store = FlatVectorStore::from_items(snapshot.metric, snapshot.items)?;
            if store.is_empty() {
                return Err(AppError::EmptyStore);
            }

            let mut stats = snapshot.stats;
            stats.embedded = store.len();
            Ok((store, stats, snapshot.sources))
        });

        match result {
            Ok((store, stats, sources)) => {
                tracing::info!("Knowledge base restored from {:?}", path);
                self.metric = store.metric();
                self.sources = sources;
                self.finish(Ok((store, stats)))
            }
            Err(e) => self.finish(Err(e)),
        }
    }

    fn begin(&mut self) {
        if self.store.is_some() {
            tracing::info!("Discarding previous knowledge base");
        }
        self.store = None;
        self.stats = None;
        self.state = KnowledgeState::Loading;
    }

    fn finish(&mut self, result: AppResult<(FlatVectorStore, BuildStats)>) -> AppResult<BuildStats> {
        match result {
            Ok((store, stats)) => {
                self.store = Some(store);
                self.stats = Some(stats.clone());
                self.state = KnowledgeState::Ready;
                Ok(stats)
            }
            Err(e) => {
                tracing::error!("Knowledge base build failed: {}", e);
                self.state = KnowledgeState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn load_sources(&self, csv_path: &Path, pdf_path: &Path) -> AppResult<SourceSet> {
        let batch = load_properties(csv_path)?;

        let (chunks, guidelines_error) = match GuidelineDocument::open(pdf_path) {
            Ok(document) => {
                let chunks: Vec<GuidelineChunk> = document.chunks(&self.chunking)?.collect();
                tracing::info!(
                    "Split {:?} into {} chunks across {} pages",
                    pdf_path,
                    chunks.len(),
                    document.page_count()
                );
                (chunks, None)
            }
            Err(e) => {
                tracing::warn!("Skipping guidelines {:?}: {}", pdf_path, e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        Ok(SourceSet {
            records: batch.records,
            chunks,
            sold_skipped: batch.sold,
            rejected_rows: batch.rejected,
            guidelines_error,
        })
    }

    async fn index(
        &self,
        sources: SourceSet,
        started: Instant,
    ) -> AppResult<(FlatVectorStore, BuildStats)> {
        if sources.is_empty() {
            return Err(AppError::EmptyStore);
        }

        let records = sources.records.len();
        let chunks = sources.chunks.len();
        let items: Vec<ItemSource> = sources
            .records
            .into_iter()
            .map(ItemSource::Property)
            .chain(sources.chunks.into_iter().map(ItemSource::Guideline))
            .collect();

        let texts: Vec<String> = items.iter().map(ItemSource::render).collect();
        let vectors = self.embeddings.embed_batch(&texts).await?;

        let mut store = FlatVectorStore::with_dimensions(self.metric, self.embeddings.dimensions());
        for (vector, source) in vectors.into_iter().zip(items) {
            store.insert(EmbeddedItem::new(vector, source))?;
        }

        let stats = BuildStats {
            records,
            sold_skipped: sources.sold_skipped,
            rejected_rows: sources.rejected_rows,
            chunks,
            embedded: store.len(),
            embedding_model: self.embeddings.model_name().to_string(),
            dimensions: self.embeddings.dimensions(),
            duration_ms: started.elapsed().as_millis() as u64,
            guidelines_error: sources.guidelines_error,
        };

        tracing::info!(
            "Knowledge base ready: {} properties, {} guideline chunks",
            stats.records,
            stats.chunks
        );

        Ok((store, stats))
    }
}
