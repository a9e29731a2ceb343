use crate::error::StoreError;
use crate::models::{Candidate, EmbeddedRecord};
use async_trait::async_trait;

/// A vector-store engine holding named collections of embedded records.
///
/// Collection lookup is an explicit query so idempotent creation never has
/// to treat a failed create as an already-exists signal.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a collection of this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create a collection with the given vector dimensionality under
    /// cosine distance. Calling this for an existing collection is an error;
    /// callers check existence first.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), StoreError>;

    /// Delete a collection. A missing collection is not an error.
    async fn delete_collection(&self, name: &str) -> Result<(), StoreError>;

    /// Bulk upsert, all-or-nothing per call. Records whose vector length
    /// does not match the collection's dimensionality are rejected.
    async fn upsert(&self, collection: &str, records: &[EmbeddedRecord]) -> Result<(), StoreError>;

    /// Similarity search under cosine distance, descending score, at most
    /// `limit` candidates.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError>;
}
