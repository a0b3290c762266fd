//! End-to-end tests for the retrieval engine: ingest through chunking and
//! embedding into the persistent store, then query it back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;

use ragstore::chunking::ChunkingConfig;
use ragstore::embeddings::Embedder;
use ragstore::service::RetrievalService;
use ragstore::store::KnowledgeStore;
use ragstore::{RagError, Result};

/// Deterministic embedder: one vector bucket per vocabulary word, so
/// cosine similarity tracks lexical overlap exactly.
struct StubEmbedder {
    available: AtomicBool,
}

const VOCAB: [&str; 8] = [
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta",
];
const DIMENSION: usize = VOCAB.len() + 1;

impl StubEmbedder {
    fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; DIMENSION];
        for word in text.split_whitespace() {
            let bucket = VOCAB
                .iter()
                .position(|v| *v == word)
                .unwrap_or(VOCAB.len());
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl Embedder for StubEmbedder {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if !self.is_available() {
            return Err(RagError::EmbedderUnavailable(
                "stub backend switched off".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

fn open_service(dir: &TempDir) -> RetrievalService {
    let store = KnowledgeStore::open(
        dir.path().join("documents.json"),
        dir.path().join("vectors.idx"),
        DIMENSION,
    )
    .expect("store should open");
    RetrievalService::new(
        store,
        Arc::new(StubEmbedder::new()),
        ChunkingConfig {
            chunk_size: 4,
            overlap: 1,
        },
    )
    .expect("service should construct")
}

#[test]
fn two_source_scenario_ranks_overlapping_source_first() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    // 8 words, windows of 4 advancing by 3: starts at 0, 3, 6.
    assert!(
        service
            .ingest("a.txt", "alpha beta alpha beta alpha beta alpha beta", "txt")
            .unwrap()
    );
    assert!(service.ingest("b.txt", "gamma delta", "txt").unwrap());

    let stats = service.stats().unwrap();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.total_chunks, 4);

    let results = service.retrieve("alpha beta", 2).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.record.file_name == "a.txt"));
}

#[test]
fn save_load_round_trip_reproduces_retrieval() {
    let dir = TempDir::new().unwrap();

    let before = {
        let service = open_service(&dir);
        service
            .ingest("a.txt", "alpha beta gamma delta epsilon zeta eta", "txt")
            .unwrap();
        service.ingest("b.txt", "theta alpha", "txt").unwrap();
        service.retrieve("alpha epsilon theta", 4).unwrap()
    };

    // A fresh process over the same artifacts must answer identically.
    let service = open_service(&dir);
    let after = service.retrieve("alpha epsilon theta", 4).unwrap();

    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(after.iter()) {
        assert_eq!(b.record, a.record);
        assert_eq!(b.score, a.score);
    }
}

#[test]
fn reingesting_after_reload_does_not_reuse_ids() {
    let dir = TempDir::new().unwrap();

    {
        let service = open_service(&dir);
        service.ingest("a.txt", "alpha beta gamma delta epsilon", "txt").unwrap();
    }

    let service = open_service(&dir);
    service.ingest("a.txt", "alpha beta gamma delta epsilon", "txt").unwrap();

    let results = service.retrieve("alpha", 10).unwrap();
    let mut ids: Vec<String> = results.iter().map(|r| r.record.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), results.len(), "ids must stay unique after reload");
}

#[test]
fn corrupted_artifacts_recover_as_empty_store() {
    let dir = TempDir::new().unwrap();

    {
        let service = open_service(&dir);
        service.ingest("a.txt", "alpha beta gamma", "txt").unwrap();
    }

    std::fs::write(dir.path().join("vectors.idx"), b"garbage").unwrap();

    let service = open_service(&dir);
    assert_eq!(service.stats().unwrap().total_chunks, 0);
    assert!(service.retrieve("alpha", 3).unwrap().is_empty());

    // The recovered store remains fully usable.
    assert!(service.ingest("c.txt", "delta epsilon", "txt").unwrap());
    assert_eq!(service.retrieve("delta", 1).unwrap().len(), 1);
}

#[test]
fn clear_then_reopen_stays_empty() {
    let dir = TempDir::new().unwrap();

    {
        let service = open_service(&dir);
        service.ingest("a.txt", "alpha beta gamma", "txt").unwrap();
        service.clear().unwrap();
    }

    let service = open_service(&dir);
    assert_eq!(service.stats().unwrap().total_chunks, 0);
    assert!(service.retrieve("alpha", 5).unwrap().is_empty());
}

#[test]
fn compose_prompt_carries_retrieved_context() {
    let dir = TempDir::new().unwrap();
    let service = open_service(&dir);

    service.ingest("runbook.txt", "alpha beta gamma", "txt").unwrap();

    let results = service.retrieve("alpha", 1).unwrap();
    let prompt = RetrievalService::compose_prompt("what is alpha?", &results)
        .expect("context was retrieved");

    assert!(prompt.contains("From runbook.txt: alpha beta gamma"));
    assert!(prompt.contains("QUESTION: what is alpha?"));

    let no_prompt = RetrievalService::compose_prompt("anything", &[]);
    assert!(no_prompt.is_none());
}
