//! End-to-end tests: CSV and guideline text in, retrieval and answers out.

use crate::base::{KnowledgeBase, SourceSet};
use crate::embeddings::providers::MockProvider;
use crate::embeddings::{EmbeddingClient, EmbeddingProvider};
use crate::guidelines::{ChunkingOptions, GuidelineChunk, GuidelineDocument};
use crate::query::QueryEngine;
use crate::records::load_properties;
use crate::types::{ItemSource, KnowledgeState};
use crate::vector_index::{DistanceMetric, VectorIndex};
use estate_core::{AppError, AppResult};
use estate_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage, RetryPolicy};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

const LISTINGS: &str = "Property ID,Start Price,Location,Amenities,Nearby,Furnishing,BHK,Status\n\
    P1,₹1.2 Cr,Velachery,gym;pool,Phoenix Mall,Semi,3 BHK,available\n\
    P2,₹80L,Adyar,garden,Adyar Park,Full,2 BHK,available\n\
    P3,\"92,50,000\",Tambaram,clubhouse,Railway station,Unfurnished,2 BHK,available\n\
    P4,₹1.5 Cr,Anna Nagar,pool;terrace,Tower Park,Full,4 BHK,available\n\
    P5,65 L,OMR,gym,Tech park,Semi,1 BHK,available\n\
    P6,₹1.1 Cr,Velachery,gym;pool,Phoenix Mall,Semi,3 BHK,Sold\n";

const GUIDELINES: &str = "COMMUNITY GUIDELINES\n\
    These rules apply to every resident and visitor.\n\
    1. PETS\n\
    Dogs must be leashed in all common areas.\n\
    2. PARKING\n\
    Each flat gets one covered bay. Visitors use the marked visitor bays.\n\
    3. MOVE-IN\n\
    Book the service lift with the facility office 48 hours ahead.\n";

const QUESTION: &str = "Which properties in Velachery have a gym?";

/// Embedding provider that counts calls and delegates to the mock.
#[derive(Debug)]
struct CountingEmbedder {
    inner: MockProvider,
    calls: AtomicUsize,
    fail: bool,
}

impl CountingEmbedder {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: MockProvider::new(256),
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn provider_name(&self) -> &str {
        "counting"
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Llm("connection refused".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Chat client that records requests and replies with a canned answer.
struct RecordingLlm {
    reply: Option<String>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl RecordingLlm {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for RecordingLlm {
    fn provider_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Some(reply) => Ok(LlmResponse {
                content: reply.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
            None => Err(AppError::Llm("503 Service Unavailable".to_string())),
        }
    }
}

fn listings_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(LISTINGS.as_bytes()).unwrap();
    file
}

fn guideline_chunks() -> Vec<GuidelineChunk> {
    GuidelineDocument::from_pages([GUIDELINES])
        .chunks(&ChunkingOptions::new(120, 20).unwrap())
        .unwrap()
        .collect()
}

fn knowledge_base(embedder: Arc<CountingEmbedder>) -> KnowledgeBase {
    KnowledgeBase::new(
        EmbeddingClient::new(embedder, 4, RetryPolicy::immediate(2)),
        ChunkingOptions::new(120, 20).unwrap(),
        DistanceMetric::Euclidean,
    )
}

async fn ready_knowledge_base() -> KnowledgeBase {
    let csv = listings_file();
    let batch = load_properties(csv.path()).unwrap();

    let mut kb = knowledge_base(CountingEmbedder::new(false));
    let sources = SourceSet {
        records: batch.records,
        chunks: guideline_chunks(),
        sold_skipped: batch.sold,
        rejected_rows: batch.rejected,
        guidelines_error: None,
    };
    kb.build_from_sources(sources).await.unwrap();
    kb
}

fn property_ids(kb: &KnowledgeBase) -> Vec<String> {
    kb.store()
        .unwrap()
        .items()
        .iter()
        .filter_map(|item| item.source.as_property())
        .map(|record| record.id.clone())
        .collect()
}

#[tokio::test]
async fn test_velachery_gym_listing_is_retrieved() {
    let kb = ready_knowledge_base().await;
    let engine = QueryEngine::new(&kb, RecordingLlm::replying("unused"), "gpt-3.5-turbo")
        .with_top_k(3);

    let hits = engine.retrieve(QUESTION).await.unwrap();
    assert_eq!(hits.len(), 3);

    let p1 = hits
        .iter()
        .filter_map(|hit| hit.item.as_property())
        .find(|record| record.id == "P1")
        .expect("P1 should be among the top results");
    assert_eq!(p1.price, 12_000_000);
    assert_eq!(p1.location, "Velachery");
    assert_eq!(p1.amenities, vec!["gym", "pool"]);
}

#[tokio::test]
async fn test_sold_listing_is_never_indexed_or_retrieved() {
    let kb = ready_knowledge_base().await;
    let ids = property_ids(&kb);
    assert_eq!(ids, vec!["P1", "P2", "P3", "P4", "P5"]);

    let store_size = kb.store().unwrap().len();
    let engine = QueryEngine::new(&kb, RecordingLlm::replying("unused"), "gpt-3.5-turbo")
        .with_top_k(store_size + 5);

    for question in [QUESTION, "P6 sold Velachery gym pool Phoenix Mall", "anything"] {
        let hits = engine.retrieve(question).await.unwrap();
        assert_eq!(hits.len(), store_size);
        assert!(hits
            .iter()
            .filter_map(|hit| hit.item.as_property())
            .all(|record| record.id != "P6"));
    }
}

#[tokio::test]
async fn test_search_results_are_bounded_and_sorted() {
    let kb = ready_knowledge_base().await;
    let store = kb.store().unwrap();
    let query = kb.embeddings().embed(QUESTION).await.unwrap();

    for k in [1, 3, store.len(), store.len() * 2] {
        let hits = store.search(&query, k).unwrap();
        assert_eq!(hits.len(), k.min(store.len()));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(hits.iter().enumerate().all(|(i, h)| h.rank == i + 1));
    }
}

#[tokio::test]
async fn test_answer_is_returned_verbatim_with_context() {
    let kb = ready_knowledge_base().await;
    let llm = RecordingLlm::replying("  P1 in Velachery has a gym and a pool.\n");
    let engine = QueryEngine::new(&kb, llm.clone(), "gpt-3.5-turbo")
        .with_system_prompt("You are a helpful real estate assistant.")
        .with_top_k(3);

    let answer = engine.answer(QUESTION).await.unwrap();
    assert_eq!(answer, "  P1 in Velachery has a gym and a pool.\n");

    let requests = llm.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-3.5-turbo");
    assert_eq!(
        requests[0].system.as_deref(),
        Some("You are a helpful real estate assistant.")
    );
    assert!(requests[0].prompt.contains("Property ID: P1"));
    assert!(requests[0].prompt.contains(QUESTION));
}

#[tokio::test]
async fn test_ask_keeps_sources() {
    let kb = ready_knowledge_base().await;
    let engine = QueryEngine::new(&kb, RecordingLlm::replying("ok"), "gpt-3.5-turbo")
        .with_top_k(2);

    let answer = engine.ask("Can I keep a dog?").await.unwrap();
    assert_eq!(answer.answer, "ok");
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.question, "Can I keep a dog?");
}

#[tokio::test]
async fn test_query_before_build_is_not_ready_and_offline() {
    let embedder = CountingEmbedder::new(false);
    let llm = RecordingLlm::replying("unused");
    let kb = knowledge_base(embedder.clone());
    let engine = QueryEngine::new(&kb, llm.clone(), "gpt-3.5-turbo");

    let err = engine.answer(QUESTION).await.unwrap_err();
    assert!(matches!(err, AppError::NotReady { .. }));
    assert!(matches!(
        engine.retrieve(QUESTION).await,
        Err(AppError::NotReady { .. })
    ));

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_failed_build_leaves_base_not_ready() {
    let embedder = CountingEmbedder::new(true);
    let mut kb = knowledge_base(embedder.clone());

    let csv = listings_file();
    let err = kb
        .build(csv.path(), Path::new("/no/such/guidelines.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Embedding(_)));
    assert!(matches!(kb.state(), KnowledgeState::Failed(_)));
    // One batch, two attempts
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

    let llm = RecordingLlm::replying("unused");
    let engine = QueryEngine::new(&kb, llm.clone(), "gpt-3.5-turbo");
    assert!(matches!(
        engine.answer(QUESTION).await,
        Err(AppError::NotReady { .. })
    ));
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_completion_failure_after_retries() {
    let kb = ready_knowledge_base().await;
    let llm = RecordingLlm::failing();
    let engine = QueryEngine::new(&kb, llm.clone(), "gpt-3.5-turbo")
        .with_retry(RetryPolicy::immediate(3));

    let err = engine.answer(QUESTION).await.unwrap_err();
    assert!(matches!(err, AppError::Completion(_)));
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn test_zero_items_is_empty_store() {
    let mut kb = knowledge_base(CountingEmbedder::new(false));
    let err = kb.build_from_sources(SourceSet::default()).await.unwrap_err();
    assert!(matches!(err, AppError::EmptyStore));
}

#[tokio::test]
async fn test_rebuild_from_same_sources_is_stable() {
    let csv = listings_file();
    let mut kb = knowledge_base(CountingEmbedder::new(false));

    let mut counts = Vec::new();
    for _ in 0..2 {
        let batch = load_properties(csv.path()).unwrap();
        let stats = kb
            .build_from_sources(SourceSet::new(batch.records, guideline_chunks()))
            .await
            .unwrap();
        counts.push((stats.records, stats.chunks));
    }

    assert_eq!(counts[0], counts[1]);
    assert_eq!(counts[0].0, 5);
    assert!(counts[0].1 >= 4);
}

#[test]
fn test_every_guideline_chunk_is_labelled_and_bounded() {
    for chunk in guideline_chunks() {
        assert!(chunk.text.chars().count() <= 120);
        assert!(!chunk.section.is_empty());
        assert!(
            chunk.section == "COMMUNITY GUIDELINES" || chunk.section.starts_with(char::is_numeric),
            "unexpected label {:?}",
            chunk.section
        );
    }
}

#[test]
fn test_items_carry_exactly_one_source() {
    let chunk = guideline_chunks().remove(0);
    let source = ItemSource::Guideline(chunk);
    assert!(source.as_guideline().is_some());
    assert!(source.as_property().is_none());
}
