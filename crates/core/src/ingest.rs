use crate::chunking::{chunk_units, ChunkingConfig};
use crate::collection::{ensure_collection, CollectionStatus};
use crate::config::{EngineConfig, Topology, DIMENSION_PROBE_TEXT};
use crate::embeddings::{EmbeddingProvider, OllamaEmbeddings};
use crate::error::IngestError;
use crate::loader::load_directory;
use crate::models::EmbeddedRecord;
use crate::store::VectorStore;
use crate::stores::{MemoryStore, QdrantStore};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// One entry of the ingestion progress stream. Each event renders as a
/// single UTF-8 line; [`ProgressEvent::Finished`] is the end-of-stream
/// sentinel and is always the last event, error or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Status(String),
    Warning(String),
    Error(String),
    Finished,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Status(message) => formatter.write_str(message),
            ProgressEvent::Warning(message) => write!(formatter, "warning: {message}"),
            ProgressEvent::Error(message) => write!(formatter, "error: {message}"),
            ProgressEvent::Finished => formatter.write_str("done"),
        }
    }
}

/// A ready-to-query binding of a collection to the store and embedding
/// provider it was built with. Cheap to clone and share across requests.
#[derive(Clone)]
pub struct IndexHandle {
    pub collection: String,
    pub store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

/// Orchestrates loader, chunker, embedding provider, and vector store into
/// one get-or-build ingestion run.
pub struct IngestionPipeline {
    config: EngineConfig,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IngestionPipeline {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
        }
    }

    /// Build a pipeline for the configured topology. Topology only decides
    /// how the vector store is constructed; all later stages are identical.
    pub async fn for_topology(config: EngineConfig) -> Result<Self, IngestError> {
        let store: Arc<dyn VectorStore> = match config.topology {
            Topology::Memory => Arc::new(MemoryStore::ephemeral()),
            Topology::Disk => Arc::new(MemoryStore::persistent(config.index_path.clone()).await?),
            Topology::Server => Arc::new(QdrantStore::new(config.qdrant_url.clone())?),
        };

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbeddings::new(
            config.ollama_url.clone(),
            config.embedding_model.clone(),
        ));

        Ok(Self::new(config, store, embedder))
    }

    fn handle(&self) -> IndexHandle {
        IndexHandle {
            collection: self.config.collection.clone(),
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
        }
    }

    /// Run one ingestion pass, reporting progress through `events`.
    ///
    /// Returns a usable [`IndexHandle`] even when no new documents were
    /// found, so repeated calls with `recreate = false` act as get-or-build.
    /// Only a failure during the chunk/embed/upsert write phase yields
    /// `None`; everything earlier degrades to warnings.
    pub async fn run(
        &self,
        events: &mpsc::Sender<ProgressEvent>,
        recreate: bool,
    ) -> Option<IndexHandle> {
        let collection = self.config.collection.clone();

        match ensure_collection(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &collection,
            DIMENSION_PROBE_TEXT,
            recreate,
        )
        .await
        {
            Ok((dimensions, CollectionStatus::Created)) => {
                info!(collection = %collection, dimensions, "collection created");
                let _ = events
                    .send(ProgressEvent::Status(format!(
                        "Created collection '{collection}' (size={dimensions})."
                    )))
                    .await;
            }
            Ok((_, CollectionStatus::AlreadyExists)) => {
                let _ = events
                    .send(ProgressEvent::Status(format!(
                        "Collection '{collection}' already exists."
                    )))
                    .await;
            }
            Err(ensure_error) => {
                // Non-fatal: the store itself rejects incompatible writes.
                warn!(%ensure_error, "collection create/inspect failed");
                let _ = events
                    .send(ProgressEvent::Warning(format!(
                        "while creating/inspecting collection: {ensure_error}"
                    )))
                    .await;
            }
        }

        let dir = self.config.knowledge_dir.clone();
        let units = if dir.is_dir() {
            let _ = events
                .send(ProgressEvent::Status(format!(
                    "Scanning files in '{}'...",
                    dir.display()
                )))
                .await;

            match load_directory(&dir) {
                Ok(report) => {
                    for file in &report.loaded {
                        let _ = events
                            .send(ProgressEvent::Status(format!(
                                "Loaded {} docs from {}",
                                file.unit_count, file.source_name
                            )))
                            .await;
                    }
                    for skipped in &report.skipped {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
                        let _ = events
                            .send(ProgressEvent::Warning(format!(
                                "failed to load {}: {}",
                                skipped.path.display(),
                                skipped.reason
                            )))
                            .await;
                    }
                    report.units
                }
                Err(load_error) => {
                    let _ = events
                        .send(ProgressEvent::Warning(format!(
                            "cannot scan '{}': {load_error}",
                            dir.display()
                        )))
                        .await;
                    Vec::new()
                }
            }
        } else {
            let _ = events
                .send(ProgressEvent::Warning(format!(
                    "Directory '{}' not found, skipping.",
                    dir.display()
                )))
                .await;
            Vec::new()
        };

        if units.is_empty() {
            let _ = events
                .send(ProgressEvent::Status(
                    "No new documents to index.".to_string(),
                ))
                .await;
            return Some(self.handle());
        }

        let _ = events
            .send(ProgressEvent::Status(
                "Splitting documents into chunks...".to_string(),
            ))
            .await;

        let chunking = match ChunkingConfig::new(self.config.chunk_size, self.config.chunk_overlap)
        {
            Ok(chunking) => chunking,
            Err(config_error) => {
                error!(%config_error, "invalid chunking config");
                let _ = events
                    .send(ProgressEvent::Error(config_error.to_string()))
                    .await;
                return None;
            }
        };

        let chunks = match chunk_units(&units, chunking) {
            Ok(chunks) => chunks,
            Err(chunk_error) => {
                let _ = events
                    .send(ProgressEvent::Error(chunk_error.to_string()))
                    .await;
                return None;
            }
        };

        let _ = events
            .send(ProgressEvent::Status(format!(
                "Total chunks: {}",
                chunks.len()
            )))
            .await;

        // Write phase: any failure here is fatal to this run. The upsert is
        // one bulk call, so a failed run never leaves a silent partial index.
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(embed_error) => {
                error!(%embed_error, "embedding failed during write phase");
                let _ = events
                    .send(ProgressEvent::Error(format!(
                        "embedding failed: {embed_error}"
                    )))
                    .await;
                return None;
            }
        };

        let records: Vec<EmbeddedRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedRecord {
                id: Uuid::new_v4().to_string(),
                vector,
                chunk,
            })
            .collect();

        if let Err(upsert_error) = self.store.upsert(&collection, &records).await {
            error!(%upsert_error, "bulk upsert failed");
            let _ = events
                .send(ProgressEvent::Error(format!(
                    "upsert failed: {upsert_error}"
                )))
                .await;
            return None;
        }

        info!(collection = %collection, records = records.len(), "index populated");
        let _ = events
            .send(ProgressEvent::Status("Vector store populated.".to_string()))
            .await;

        Some(self.handle())
    }

    /// Run the pipeline on a worker task, bridging its progress to a
    /// non-blocking consumer one event at a time. The returned receiver
    /// yields events in order and closes after the `Finished` sentinel; the
    /// join handle resolves to the final result.
    pub fn spawn(self, recreate: bool) -> (mpsc::Receiver<ProgressEvent>, JoinHandle<Option<IndexHandle>>) {
        let (sender, receiver) = mpsc::channel(1);

        let worker = tokio::spawn(async move {
            let result = self.run(&sender, recreate).await;
            let _ = sender.send(ProgressEvent::Finished).await;
            result
        });

        (receiver, worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::retriever::fetch_candidates;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn test_config(knowledge_dir: &Path) -> EngineConfig {
        EngineConfig {
            topology: Topology::Memory,
            knowledge_dir: knowledge_dir.to_path_buf(),
            chunk_size: 64,
            chunk_overlap: 16,
            ..EngineConfig::default()
        }
    }

    fn memory_pipeline(knowledge_dir: &Path) -> IngestionPipeline {
        IngestionPipeline::new(
            test_config(knowledge_dir),
            Arc::new(MemoryStore::ephemeral()),
            Arc::new(HashedNgramEmbedder { dimensions: 32 }),
        )
    }

    async fn run_collecting(
        pipeline: &IngestionPipeline,
        recreate: bool,
    ) -> (Vec<ProgressEvent>, Option<IndexHandle>) {
        let (sender, mut receiver) = mpsc::channel(256);
        let result = pipeline.run(&sender, recreate).await;
        drop(sender);

        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        (events, result)
    }

    fn status_lines(events: &[ProgressEvent]) -> Vec<String> {
        events.iter().map(|event| event.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_directory_still_yields_a_handle() {
        let dir = tempdir().unwrap();
        let pipeline = memory_pipeline(dir.path());

        let (events, result) = run_collecting(&pipeline, false).await;
        let lines = status_lines(&events);

        assert!(lines.iter().any(|line| line.contains("No new documents")));
        let handle = result.expect("empty ingest should still produce a handle");
        assert_eq!(handle.collection, "knowledge_base");
        assert!(handle.store.collection_exists("knowledge_base").await.unwrap());
    }

    #[tokio::test]
    async fn missing_directory_warns_instead_of_failing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let pipeline = memory_pipeline(&missing);

        let (events, result) = run_collecting(&pipeline, false).await;

        assert!(events
            .iter()
            .any(|event| matches!(event, ProgressEvent::Warning(message) if message.contains("not found"))));
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn documents_are_loaded_chunked_and_searchable() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("notes.txt"),
            "Deserialization turns a byte stream back into a structured value.",
        )
        .unwrap();
        fs::write(dir.path().join("team.csv"), "name,role\nada,engineer\n").unwrap();

        let pipeline = memory_pipeline(dir.path());
        let (events, result) = run_collecting(&pipeline, false).await;
        let lines = status_lines(&events);

        assert!(lines.iter().any(|line| line.starts_with("Created collection")));
        assert!(lines.iter().any(|line| line.contains("docs from notes.txt")));
        assert!(lines.iter().any(|line| line.contains("docs from team.csv")));
        assert!(lines.iter().any(|line| line.starts_with("Total chunks:")));
        assert!(lines.iter().any(|line| line == "Vector store populated."));

        let handle = result.expect("populated ingest should produce a handle");
        let candidates = fetch_candidates(&handle, "deserialization", 3).await.unwrap();
        assert!(!candidates.is_empty());
    }

    #[tokio::test]
    async fn skipped_files_do_not_abort_ingestion() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.pdf"), b"%PDF-1.4\n%broken").unwrap();
        fs::write(dir.path().join("fine.txt"), "readable content").unwrap();

        let pipeline = memory_pipeline(dir.path());
        let (events, result) = run_collecting(&pipeline, false).await;

        assert!(events
            .iter()
            .any(|event| matches!(event, ProgressEvent::Warning(message) if message.contains("broken.pdf"))));
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn repeated_runs_without_recreate_are_safe() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "idempotent get-or-build").unwrap();

        let pipeline = memory_pipeline(dir.path());
        let (_, first) = run_collecting(&pipeline, false).await;
        let (events, second) = run_collecting(&pipeline, false).await;

        assert!(first.is_some());
        assert!(second.is_some());
        assert!(status_lines(&events)
            .iter()
            .any(|line| line.contains("already exists")));
    }

    #[tokio::test]
    async fn failed_run_reports_an_error_before_the_sentinel() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "content that reaches the write phase").unwrap();

        // overlap == size is rejected by the chunker, failing the write phase
        let config = EngineConfig {
            chunk_size: 32,
            chunk_overlap: 32,
            ..test_config(dir.path())
        };
        let pipeline = IngestionPipeline::new(
            config,
            Arc::new(MemoryStore::ephemeral()),
            Arc::new(HashedNgramEmbedder { dimensions: 32 }),
        );

        let (mut receiver, worker) = pipeline.spawn(false);
        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }

        assert_eq!(events.last(), Some(&ProgressEvent::Finished));
        assert!(matches!(
            events.get(events.len() - 2),
            Some(ProgressEvent::Error(_))
        ));
        assert!(worker.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn spawned_run_ends_with_the_finished_sentinel() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "bridged producer").unwrap();

        let pipeline = memory_pipeline(dir.path());
        let (mut receiver, worker) = pipeline.spawn(false);

        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }

        assert_eq!(events.last(), Some(&ProgressEvent::Finished));
        let result = worker.await.unwrap();
        assert!(result.is_some());
    }
}
