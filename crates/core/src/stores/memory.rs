use crate::error::StoreError;
use crate::models::{Candidate, EmbeddedRecord};
use crate::store::VectorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionData {
    dimensions: usize,
    records: Vec<EmbeddedRecord>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    collections: HashMap<String, CollectionData>,
}

/// In-process cosine-similarity store. Serves the `memory` topology as-is;
/// with a snapshot path it also serves the `disk` topology, persisting the
/// full index as JSON after every mutation.
pub struct MemoryStore {
    inner: RwLock<HashMap<String, CollectionData>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn ephemeral() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    pub async fn persistent(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let collections = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?.collections,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                return Err(StoreError::Request(format!(
                    "cannot read index snapshot {}: {error}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            inner: RwLock::new(collections),
            snapshot_path: Some(path),
        })
    }

    async fn persist(&self, collections: &HashMap<String, CollectionData>) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            saved_at: Utc::now(),
            collections: collections
                .iter()
                .map(|(name, data)| {
                    (
                        name.clone(),
                        CollectionData {
                            dimensions: data.dimensions,
                            records: data.records.clone(),
                        },
                    )
                })
                .collect(),
        };

        let bytes = serde_json::to_vec(&snapshot)?;

        // Write-then-rename so an interrupted write never truncates the
        // previous snapshot.
        let staging = staging_path(path);
        tokio::fs::write(&staging, bytes).await.map_err(|error| {
            StoreError::Request(format!(
                "cannot write index snapshot {}: {error}",
                staging.display()
            ))
        })?;
        tokio::fs::rename(&staging, path).await.map_err(|error| {
            StoreError::Request(format!(
                "cannot replace index snapshot {}: {error}",
                path.display()
            ))
        })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let dot: f64 = left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    let left_norm: f64 = left.iter().map(|a| f64::from(*a).powi(2)).sum::<f64>().sqrt();
    let right_norm: f64 = right.iter().map(|b| f64::from(*b).powi(2)).sum::<f64>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm * right_norm)
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.inner.read().await.contains_key(name))
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), StoreError> {
        let mut collections = self.inner.write().await;
        if collections.contains_key(name) {
            return Err(StoreError::Request(format!(
                "collection '{name}' already exists"
            )));
        }

        collections.insert(
            name.to_string(),
            CollectionData {
                dimensions,
                records: Vec::new(),
            },
        );
        self.persist(&collections).await
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self.inner.write().await;
        if collections.remove(name).is_some() {
            self.persist(&collections).await?;
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddedRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut collections = self.inner.write().await;
        let data = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::Request(format!("unknown collection '{collection}'")))?;

        for record in records {
            if record.vector.len() != data.dimensions {
                return Err(StoreError::Request(format!(
                    "vector dimension {} does not match collection dimension {}",
                    record.vector.len(),
                    data.dimensions
                )));
            }
        }

        for record in records {
            match data.records.iter_mut().find(|held| held.id == record.id) {
                Some(held) => *held = record.clone(),
                None => data.records.push(record.clone()),
            }
        }

        self.persist(&collections).await
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let collections = self.inner.read().await;
        let data = collections
            .get(collection)
            .ok_or_else(|| StoreError::Request(format!("unknown collection '{collection}'")))?;

        if vector.len() != data.dimensions {
            return Err(StoreError::Request(format!(
                "query vector dimension {} does not match collection dimension {}",
                vector.len(),
                data.dimensions
            )));
        }

        let mut scored: Vec<Candidate> = data
            .records
            .iter()
            .map(|record| Candidate {
                chunk: record.chunk.clone(),
                similarity: Some(cosine_similarity(vector, &record.vector)),
            })
            .collect();

        scored.sort_by(|left, right| {
            right
                .similarity
                .unwrap_or(0.0)
                .total_cmp(&left.similarity.unwrap_or(0.0))
        });
        scored.truncate(limit);

        Ok(scored)
    }
}
