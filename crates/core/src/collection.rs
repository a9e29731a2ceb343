use crate::embeddings::EmbeddingProvider;
use crate::error::IngestError;
use crate::store::VectorStore;
use tracing::warn;

/// Which branch `ensure_collection` took, reported for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    AlreadyExists,
}

/// Guarantee a collection of the right dimensionality exists.
///
/// Dimensionality is probed by embedding `probe_text` with the same provider
/// that will embed the documents, which pins the collection's vector size to
/// the provider's output size. With `recreate`, any existing collection is
/// deleted first, losing all prior records.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    name: &str,
    probe_text: &str,
    recreate: bool,
) -> Result<(usize, CollectionStatus), IngestError> {
    let probe = embedder.embed(probe_text).await?;
    let dimensions = probe.len();

    if recreate {
        store.delete_collection(name).await?;
    }

    if store.collection_exists(name).await? {
        return Ok((dimensions, CollectionStatus::AlreadyExists));
    }

    match store.create_collection(name, dimensions).await {
        Ok(()) => Ok((dimensions, CollectionStatus::Created)),
        Err(error) => {
            // A concurrent creator winning the race still counts as success.
            if store.collection_exists(name).await.unwrap_or(false) {
                warn!(collection = name, %error, "create raced an existing collection");
                return Ok((dimensions, CollectionStatus::AlreadyExists));
            }
            Err(error.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::models::{DocChunk, EmbeddedRecord};
    use crate::stores::MemoryStore;

    const COLLECTION: &str = "knowledge_base";

    #[tokio::test]
    async fn creates_collection_with_probed_dimensions() {
        let store = MemoryStore::ephemeral();
        let embedder = HashedNgramEmbedder { dimensions: 64 };

        let (dimensions, status) =
            ensure_collection(&store, &embedder, COLLECTION, "hello world", false)
                .await
                .unwrap();

        assert_eq!(dimensions, 64);
        assert_eq!(status, CollectionStatus::Created);
        assert!(store.collection_exists(COLLECTION).await.unwrap());
    }

    #[tokio::test]
    async fn second_call_reports_already_exists() {
        let store = MemoryStore::ephemeral();
        let embedder = HashedNgramEmbedder { dimensions: 16 };

        ensure_collection(&store, &embedder, COLLECTION, "hello world", false)
            .await
            .unwrap();
        let (_, status) = ensure_collection(&store, &embedder, COLLECTION, "hello world", false)
            .await
            .unwrap();

        assert_eq!(status, CollectionStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn recreate_drops_prior_records() {
        let store = MemoryStore::ephemeral();
        let embedder = HashedNgramEmbedder { dimensions: 4 };

        ensure_collection(&store, &embedder, COLLECTION, "hello world", false)
            .await
            .unwrap();
        store
            .upsert(
                COLLECTION,
                &[EmbeddedRecord {
                    id: "stale".to_string(),
                    vector: vec![1.0, 0.0, 0.0, 0.0],
                    chunk: DocChunk {
                        text: "stale".to_string(),
                        source_name: "old.txt".to_string(),
                        is_structured: false,
                        row_id: None,
                        page: None,
                        checksum: String::new(),
                    },
                }],
            )
            .await
            .unwrap();

        let (_, status) = ensure_collection(&store, &embedder, COLLECTION, "hello world", true)
            .await
            .unwrap();
        assert_eq!(status, CollectionStatus::Created);

        let hits = store
            .search(COLLECTION, &[1.0, 0.0, 0.0, 0.0], 10)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
