use crate::error::QueryError;
use crate::ingest::IndexHandle;
use crate::models::Candidate;
use tracing::debug;

/// How far past `top_k` the store is queried, leaving the re-ranker enough
/// material to filter without starving the final result.
pub const OVERFETCH_FACTOR: usize = 4;

/// Embed `query` with the handle's provider and fetch an over-sized
/// candidate set from its collection.
pub async fn fetch_candidates(
    handle: &IndexHandle,
    query: &str,
    top_k: usize,
) -> Result<Vec<Candidate>, QueryError> {
    if query.trim().is_empty() {
        return Err(QueryError::Request("query is empty".to_string()));
    }

    let vector = handle.embedder.embed(query).await?;
    let limit = top_k.saturating_mul(OVERFETCH_FACTOR).max(1);
    let candidates = handle.store.search(&handle.collection, &vector, limit).await?;

    debug!(requested = limit, returned = candidates.len(), "raw retrieval");
    Ok(candidates)
}
