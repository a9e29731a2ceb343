use chrono::Utc;
use clap::{Parser, Subcommand};
use kb_rag_core::{
    normalize_whitespace, EngineConfig, IngestionPipeline, OllamaChat, RagChain, RankingOptions,
    ScoredCandidate, Topology,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kb-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Vector store topology: memory, disk, or server
    #[arg(long, default_value = "server")]
    topology: Topology,

    /// Collection name in the vector store
    #[arg(long, default_value = "knowledge_base")]
    collection: String,

    /// Qdrant base URL (server topology)
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Index snapshot path (disk topology)
    #[arg(long, default_value = "/tmp/kb_rag_index")]
    index_path: PathBuf,

    /// Ollama base URL
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Embedding model name
    #[arg(long, default_value = "nomic-embed-text:latest")]
    embedding_model: String,

    /// Chat model name for answer synthesis
    #[arg(long, default_value = "gemma3:latest")]
    chat_model: String,

    /// Directory containing the knowledge-base files
    #[arg(long, default_value = "knowledge_base")]
    knowledge_dir: PathBuf,

    /// Chunk size in characters
    #[arg(long, default_value = "512")]
    chunk_size: usize,

    /// Overlap between consecutive chunks, in characters
    #[arg(long, default_value = "102")]
    chunk_overlap: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest the knowledge directory into the vector store.
    Ingest {
        /// Delete and rebuild the collection, losing all prior records.
        #[arg(long, default_value_t = false)]
        recreate: bool,
    },
    /// Ask a question against the indexed knowledge base.
    Ask {
        /// The question to answer
        #[arg(long)]
        query: String,
        /// Number of sources to ground the answer on
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Sources granted a ranking bonus (repeatable)
        #[arg(long = "preferred-source")]
        preferred_sources: Vec<String>,
        /// Filename substring filters (repeatable)
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Weight of the raw similarity signal
        #[arg(long, default_value = "0.7")]
        weight_sim: f64,
        /// Weight of the metadata payload bonus
        #[arg(long, default_value = "0.3")]
        weight_payload: f64,
    },
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            topology: self.topology,
            collection: self.collection.clone(),
            qdrant_url: self.qdrant_url.clone(),
            index_path: self.index_path.clone(),
            ollama_url: self.ollama_url.clone(),
            embedding_model: self.embedding_model.clone(),
            chat_model: self.chat_model.clone(),
            knowledge_dir: self.knowledge_dir.clone(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        }
    }
}

async fn build_index(
    config: EngineConfig,
    recreate: bool,
) -> anyhow::Result<kb_rag_core::IndexHandle> {
    let pipeline = IngestionPipeline::for_topology(config)
        .await
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    let (mut events, worker) = pipeline.spawn(recreate);
    while let Some(event) = events.recv().await {
        println!("{event}");
    }

    worker
        .await?
        .ok_or_else(|| anyhow::anyhow!("vector store initialization failed"))
}

fn print_sources(sources: &[ScoredCandidate]) {
    if sources.is_empty() {
        return;
    }

    println!("\nFound {} relevant documents:", sources.len());
    for (index, source) in sources.iter().enumerate() {
        let cleaned = normalize_whitespace(&source.chunk.text);
        let display: String = if cleaned.chars().count() > 300 {
            format!("{}...", cleaned.chars().take(300).collect::<String>())
        } else {
            cleaned
        };

        let doc_type = if source.chunk.is_structured {
            "structured"
        } else {
            "text"
        };

        println!("Document {}:", index + 1);
        println!("  content: {display}");
        println!(
            "  combined={:.4} similarity={:.4} bonus={:.2}",
            source.combined, source.similarity, source.payload_bonus
        );
        println!("  type={doc_type} source={}", source.chunk.source_name);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        topology = %config.topology,
        started_at = %Utc::now().to_rfc3339(),
        "kb-rag boot"
    );

    match cli.command {
        Command::Ingest { recreate } => {
            let handle = build_index(config, recreate).await?;
            println!(
                "collection '{}' ready at {}",
                handle.collection,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            query,
            top_k,
            preferred_sources,
            filters,
            weight_sim,
            weight_payload,
        } => {
            let handle = build_index(config.clone(), false).await?;
            let model = Arc::new(OllamaChat::new(
                config.ollama_url.clone(),
                config.chat_model.clone(),
            ));
            let chain = RagChain::new(
                handle,
                model,
                RankingOptions {
                    top_k,
                    preferred_sources,
                    filename_filters: Vec::new(),
                    weight_sim,
                    weight_payload,
                },
            );

            let (answer, sources) = chain.ask(&query, top_k, &filters).await;
            print_sources(&sources);
            println!("\nAnswer:\n{answer}");
        }
    }

    Ok(())
}
