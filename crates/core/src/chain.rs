use crate::answer::{synthesize, ChatModel};
use crate::ingest::IndexHandle;
use crate::models::{RankingOptions, ScoredCandidate};
use crate::rerank::rerank;
use crate::retriever::fetch_candidates;
use std::sync::Arc;
use tracing::{info, warn};

/// The full query path: retrieve, re-rank, synthesize.
///
/// Built once after ingestion around a ready [`IndexHandle`], then shared
/// read-only across requests. Every failure along the path degrades into a
/// structured `(answer, sources)` pair; `ask` never returns an error.
pub struct RagChain {
    handle: IndexHandle,
    model: Arc<dyn ChatModel>,
    defaults: RankingOptions,
}

impl RagChain {
    pub fn new(handle: IndexHandle, model: Arc<dyn ChatModel>, defaults: RankingOptions) -> Self {
        Self {
            handle,
            model,
            defaults,
        }
    }

    pub fn handle(&self) -> &IndexHandle {
        &self.handle
    }

    /// Answer `query` from the indexed knowledge base.
    ///
    /// `file_filters` narrows candidates to sources whose name contains one
    /// of the given substrings; an empty slice means no filtering.
    pub async fn ask(
        &self,
        query: &str,
        top_k: usize,
        file_filters: &[String],
    ) -> (String, Vec<ScoredCandidate>) {
        let candidates = match fetch_candidates(&self.handle, query, top_k).await {
            Ok(candidates) => candidates,
            Err(retrieval_error) => {
                // Fail-closed to an empty evidence set, same as a ranking
                // failure; the caller still gets a structured answer.
                warn!(%retrieval_error, "retrieval failed");
                Vec::new()
            }
        };

        let options = RankingOptions {
            top_k,
            filename_filters: file_filters.to_vec(),
            preferred_sources: self.defaults.preferred_sources.clone(),
            weight_sim: self.defaults.weight_sim,
            weight_payload: self.defaults.weight_payload,
        };

        let ranked = rerank(candidates, &options);
        info!(query, ranked = ranked.len(), "retrieval complete");

        synthesize(self.model.as_ref(), ranked, query).await
    }
}
