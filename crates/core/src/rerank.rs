use crate::error::QueryError;
use crate::models::{Candidate, RankingOptions, ScoredCandidate};
use tracing::warn;

/// Bonus for candidates whose source is in `preferred_sources`.
const PREFERRED_SOURCE_BONUS: f64 = 0.5;
/// Bonus for candidates originating from tabular, row-oriented sources.
const STRUCTURED_DATA_BONUS: f64 = 0.2;

/// Re-rank raw candidates by combined score.
///
/// `combined = weight_sim * similarity + weight_payload * payload_bonus`.
/// The weights are independent multipliers, not a convex combination, and
/// bonuses are uncapped. Fail-closed: any scoring failure returns an empty
/// result rather than a partial or corrupt ranking.
pub fn rerank(candidates: Vec<Candidate>, options: &RankingOptions) -> Vec<ScoredCandidate> {
    match try_rerank(candidates, options) {
        Ok(ranked) => ranked,
        Err(ranking_error) => {
            warn!(%ranking_error, "re-ranking failed, returning no results");
            Vec::new()
        }
    }
}

fn try_rerank(
    candidates: Vec<Candidate>,
    options: &RankingOptions,
) -> Result<Vec<ScoredCandidate>, QueryError> {
    let filtered: Vec<Candidate> = if options.filename_filters.is_empty() {
        candidates
    } else {
        // Substring containment, case-sensitive.
        candidates
            .into_iter()
            .filter(|candidate| {
                options
                    .filename_filters
                    .iter()
                    .any(|filter| candidate.chunk.source_name.contains(filter.trim()))
            })
            .collect()
    };

    let mut scored = Vec::with_capacity(filtered.len());
    for candidate in filtered {
        let mut payload_bonus = 0.0;
        if options
            .preferred_sources
            .iter()
            .any(|source| source == &candidate.chunk.source_name)
        {
            payload_bonus += PREFERRED_SOURCE_BONUS;
        }
        if candidate.chunk.is_structured {
            payload_bonus += STRUCTURED_DATA_BONUS;
        }

        let similarity = candidate.similarity.unwrap_or(0.0);
        let combined = options.weight_sim * similarity + options.weight_payload * payload_bonus;

        if !combined.is_finite() {
            return Err(QueryError::Ranking(format!(
                "non-finite combined score for candidate from '{}'",
                candidate.chunk.source_name
            )));
        }

        scored.push(ScoredCandidate {
            chunk: candidate.chunk,
            similarity,
            payload_bonus,
            combined,
        });
    }

    // Vec::sort_by is stable, so ties keep their retrieval order.
    scored.sort_by(|left, right| right.combined.total_cmp(&left.combined));
    scored.truncate(options.top_k);

    Ok(scored)
}
