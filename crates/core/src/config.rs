use std::path::PathBuf;
use std::str::FromStr;

/// Storage topology for the vector store. Selecting a topology only changes
/// how the store is constructed; every other stage is topology-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Ephemeral in-process index, destroyed at process exit.
    Memory,
    /// In-process index persisted as a snapshot at `index_path`.
    Disk,
    /// Remote Qdrant instance reached over HTTP at `qdrant_url`.
    Server,
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(Topology::Memory),
            "disk" => Ok(Topology::Disk),
            "server" => Ok(Topology::Server),
            other => Err(format!(
                "unknown topology '{other}' (expected memory, disk, or server)"
            )),
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Topology::Memory => "memory",
            Topology::Disk => "disk",
            Topology::Server => "server",
        };
        formatter.write_str(name)
    }
}

/// Process-wide engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub topology: Topology,
    pub collection: String,
    pub qdrant_url: String,
    pub index_path: PathBuf,
    pub ollama_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub knowledge_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            topology: Topology::Server,
            collection: "knowledge_base".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            index_path: PathBuf::from("/tmp/kb_rag_index"),
            ollama_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text:latest".to_string(),
            chat_model: "gemma3:latest".to_string(),
            knowledge_dir: PathBuf::from("knowledge_base"),
            chunk_size: 512,
            chunk_overlap: 102,
        }
    }
}

/// Sample string embedded once to probe the provider's dimensionality.
pub const DIMENSION_PROBE_TEXT: &str = "hello world";
