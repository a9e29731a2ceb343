pub mod answer;
pub mod chain;
pub mod chunking;
pub mod collection;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod rerank;
pub mod retriever;
pub mod store;
pub mod stores;

pub use answer::{format_context, synthesize, ChatModel, OllamaChat, NO_RELEVANT_DOCUMENTS};
pub use chain::RagChain;
pub use chunking::{chunk_units, normalize_whitespace, split_text, ChunkingConfig};
pub use collection::{ensure_collection, CollectionStatus};
pub use config::{EngineConfig, Topology, DIMENSION_PROBE_TEXT};
pub use embeddings::{
    EmbeddingProvider, HashedNgramEmbedder, OllamaEmbeddings, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{EmbeddingError, IngestError, QueryError, Result, StoreError};
pub use ingest::{IndexHandle, IngestionPipeline, ProgressEvent};
pub use loader::{
    digest_file, discover_supported_files, load_directory, load_file, DirectoryLoad, FileKind,
    LoadedFile, SkippedFile,
};
pub use models::{
    Candidate, ContentUnit, DocChunk, EmbeddedRecord, RankingOptions, ScoredCandidate,
};
pub use rerank::rerank;
pub use retriever::{fetch_candidates, OVERFETCH_FACTOR};
pub use store::VectorStore;
pub use stores::{MemoryStore, QdrantStore};
