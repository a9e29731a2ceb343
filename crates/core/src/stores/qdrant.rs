use crate::error::StoreError;
use crate::models::{Candidate, DocChunk, EmbeddedRecord};
use crate::store::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

/// REST client for a remote Qdrant instance; serves the `server` topology.
pub struct QdrantStore {
    endpoint: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;
        Ok(Self {
            endpoint,
            client: Client::new(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.endpoint, name)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
        let response = self.client.get(self.collection_url(name)).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: status.to_string(),
            }),
        }
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.collection_url(name))
            .json(&json!({
                "vectors": {
                    "size": dimensions,
                    "distance": "Cosine",
                }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let response = self.client.delete(self.collection_url(name)).send().await?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn upsert(&self, collection: &str, records: &[EmbeddedRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let points = records
            .iter()
            .map(|record| {
                json!({
                    "id": record.id,
                    "vector": record.vector,
                    "payload": {
                        "text": record.chunk.text,
                        "source": record.chunk.source_name,
                        "is_structured": record.chunk.is_structured,
                        "row_id": record.chunk.row_id,
                        "page": record.chunk.page,
                        "checksum": record.chunk.checksum,
                    },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<Candidate>, StoreError> {
        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, collection
            ))
            .json(&json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut candidates = Vec::new();
        for hit in hits {
            let chunk = DocChunk {
                text: hit
                    .pointer("/payload/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source_name: hit
                    .pointer("/payload/source")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                is_structured: hit
                    .pointer("/payload/is_structured")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                row_id: hit.pointer("/payload/row_id").and_then(Value::as_u64),
                page: hit
                    .pointer("/payload/page")
                    .and_then(Value::as_u64)
                    .map(|page| page as u32),
                checksum: hit
                    .pointer("/payload/checksum")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            };

            candidates.push(Candidate {
                chunk,
                similarity: hit.pointer("/score").and_then(Value::as_f64),
            });
        }

        Ok(candidates)
    }
}
