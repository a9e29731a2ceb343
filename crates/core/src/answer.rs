use crate::error::QueryError;
use crate::models::ScoredCandidate;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

/// Fixed answer returned when retrieval produced no candidates. The language
/// model is not invoked in that case.
pub const NO_RELEVANT_DOCUMENTS: &str =
    "I could not find any relevant documents to answer your question.";

const PROMPT_TEMPLATE: &str = "\
You are an expert AI assistant that provides comprehensive answers based on the provided context documents.

INSTRUCTIONS:
1. Use the context documents below to answer the question thoroughly
2. If information is found in multiple documents, synthesize the information coherently
3. Cite the source documents when possible (e.g., \"According to [Document Name]...\")
4. If the information is not available in the context, clearly state this
5. Provide detailed, well-structured answers
6. When dealing with technical topics, explain concepts clearly

CONTEXT DOCUMENTS:
{context}

QUESTION: {input}

ANSWER:";

/// Single-shot text generation capability.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError>;
}

/// Chat client for an Ollama server's `/api/generate` endpoint.
pub struct OllamaChat {
    endpoint: String,
    model: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaChat {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|error| QueryError::Generation(error.to_string()))?;

        if !response.status().is_success() {
            return Err(QueryError::Generation(format!(
                "ollama returned {}",
                response.status()
            )));
        }

        let payload: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|error| QueryError::Generation(error.to_string()))?;

        Ok(payload.response)
    }
}

/// Render ranked candidates into the grounding block of the prompt, each
/// prefixed with a `[Document i]` marker and its source/score metadata.
pub fn format_context(candidates: &[ScoredCandidate]) -> String {
    let mut sections = Vec::with_capacity(candidates.len());

    for (index, candidate) in candidates.iter().enumerate() {
        let doc_type = if candidate.chunk.is_structured {
            "Structured Data"
        } else {
            "Document"
        };
        sections.push(format!(
            "[Document {number}]\n[{doc_type} from: {source}, Relevance: {score:.3}]\n{content}",
            number = index + 1,
            source = candidate.chunk.source_name,
            score = candidate.combined,
            content = candidate.chunk.text.trim(),
        ));
    }

    sections.join("\n\n==================================================\n\n")
}

fn render_prompt(context: &str, query: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{input}", query)
}

/// Synthesize an answer from ranked candidates.
///
/// Empty candidates short-circuit to [`NO_RELEVANT_DOCUMENTS`] without a
/// model call. A model failure degrades to an error-describing answer with
/// the retrieved sources preserved, so callers can still show the evidence.
pub async fn synthesize(
    model: &dyn ChatModel,
    candidates: Vec<ScoredCandidate>,
    query: &str,
) -> (String, Vec<ScoredCandidate>) {
    if candidates.is_empty() {
        return (NO_RELEVANT_DOCUMENTS.to_string(), Vec::new());
    }

    let prompt = render_prompt(&format_context(&candidates), query);

    match model.generate(&prompt).await {
        Ok(answer) => (answer, candidates),
        Err(generation_error) => {
            warn!(%generation_error, "answer generation failed");
            (
                format!("An error occurred while generating the response: {generation_error}"),
                candidates,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocChunk;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingModel {
        calls: AtomicUsize,
        last_prompt: Mutex<String>,
        fail: bool,
    }

    impl RecordingModel {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(String::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = prompt.to_string();
            if self.fail {
                Err(QueryError::Generation("model unavailable".to_string()))
            } else {
                Ok("a grounded answer".to_string())
            }
        }
    }

    fn scored(source: &str, text: &str, structured: bool) -> ScoredCandidate {
        ScoredCandidate {
            chunk: DocChunk {
                text: text.to_string(),
                source_name: source.to_string(),
                is_structured: structured,
                row_id: None,
                page: None,
                checksum: String::new(),
            },
            similarity: 0.8,
            payload_bonus: 0.0,
            combined: 0.56,
        }
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_model() {
        let model = RecordingModel::new(false);
        let (answer, sources) = synthesize(&model, Vec::new(), "anything").await;

        assert_eq!(answer, NO_RELEVANT_DOCUMENTS);
        assert!(sources.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prompt_embeds_context_and_question() {
        let model = RecordingModel::new(false);
        let candidates = vec![scored("guide.pdf", "serialization basics", false)];

        let (answer, sources) = synthesize(&model, candidates, "what is serialization?").await;

        assert_eq!(answer, "a grounded answer");
        assert_eq!(sources.len(), 1);
        let prompt = model.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("[Document 1]"));
        assert!(prompt.contains("guide.pdf"));
        assert!(prompt.contains("QUESTION: what is serialization?"));
    }

    #[tokio::test]
    async fn model_failure_degrades_but_keeps_sources() {
        let model = RecordingModel::new(true);
        let candidates = vec![scored("guide.pdf", "some evidence", false)];

        let (answer, sources) = synthesize(&model, candidates, "question").await;

        assert!(answer.contains("model unavailable"));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].chunk.source_name, "guide.pdf");
    }

    #[test]
    fn context_marks_structured_sources() {
        let context = format_context(&[scored("rows.csv", "a,b,c", true)]);
        assert!(context.contains("Structured Data from: rows.csv"));
    }
}
