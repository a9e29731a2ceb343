use serde::{Deserialize, Serialize};

/// One normalized piece of loaded source material, prior to chunking.
///
/// Structured sources (CSV rows, spreadsheet rows) carry a zero-based
/// `row_id`; generic sources may carry a `page` number instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentUnit {
    pub text: String,
    /// Basename of the originating file.
    pub source_name: String,
    pub is_structured: bool,
    pub row_id: Option<u64>,
    pub page: Option<u32>,
    /// Sha256 checksum of the originating file.
    pub checksum: String,
}

/// A bounded-size slice of a [`ContentUnit`]'s text plus a copy of its
/// metadata. The unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocChunk {
    pub text: String,
    pub source_name: String,
    #[serde(default)]
    pub is_structured: bool,
    #[serde(default)]
    pub row_id: Option<u64>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub checksum: String,
}

impl DocChunk {
    pub fn from_unit(unit: &ContentUnit, text: String) -> Self {
        Self {
            text,
            source_name: unit.source_name.clone(),
            is_structured: unit.is_structured,
            row_id: unit.row_id,
            page: unit.page,
            checksum: unit.checksum.clone(),
        }
    }
}

/// A chunk plus its embedding vector, as stored in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: DocChunk,
}

/// A retrieved chunk paired with its raw similarity score, before re-ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk: DocChunk,
    /// Cosine similarity reported by the store; higher is better. A store
    /// that omits the score is treated as scoring 0.0 at ranking time.
    pub similarity: Option<f64>,
}

/// A candidate after re-ranking, with an auditable score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub chunk: DocChunk,
    pub similarity: f64,
    pub payload_bonus: f64,
    pub combined: f64,
}

/// Caller-supplied knobs for the re-ranking stage.
#[derive(Debug, Clone)]
pub struct RankingOptions {
    pub top_k: usize,
    /// Sources granted a +0.5 payload bonus by exact `source_name` match.
    pub preferred_sources: Vec<String>,
    /// Case-sensitive substring filters applied to `source_name`; empty
    /// means no filtering.
    pub filename_filters: Vec<String>,
    pub weight_sim: f64,
    pub weight_payload: f64,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            preferred_sources: Vec::new(),
            filename_filters: Vec::new(),
            weight_sim: 0.7,
            weight_payload: 0.3,
        }
    }
}
