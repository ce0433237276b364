mod server;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pdf_rag_core::{
    discover_pdf_files, AnswerGenerator, ChatCompletionsGenerator, ChunkingConfig,
    GenerationConfig, IndexConfig, MemoryIndex, PineconeIndex, RagConfig, RagService,
    RetrievalConfig, VectorIndex,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-rag", version, about = "Ingest PDFs and answer questions with citations")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Hosted Pinecone index with integrated embeddings.
    Pinecone,
    /// Process-local index; contents are lost on exit.
    Memory,
}

#[derive(Args, Debug)]
struct Settings {
    /// Vector index backend
    #[arg(long, env = "INDEX_BACKEND", value_enum, default_value = "pinecone", global = true)]
    backend: Backend,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true, global = true)]
    pinecone_api_key: Option<String>,

    /// Groq (OpenAI-compatible) API key
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true, global = true)]
    groq_api_key: Option<String>,

    /// Characters per chunk
    #[arg(long, env = "CHUNK_SIZE", default_value_t = 500, global = true)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = 60, global = true)]
    chunk_overlap: usize,

    /// Records per upsert request
    #[arg(long, env = "BATCH_SIZE", default_value_t = 96, global = true)]
    batch_size: usize,

    /// Pinecone index name
    #[arg(long, env = "PINECONE_INDEX_NAME", default_value = "rag-pipeline-reranker", global = true)]
    index_name: String,

    /// Cloud for a newly created index
    #[arg(long, env = "PINECONE_CLOUD", default_value = "aws", global = true)]
    cloud: String,

    /// Region for a newly created index
    #[arg(long, env = "PINECONE_REGION", default_value = "us-east-1", global = true)]
    region: String,

    /// Embedding model of a newly created index
    #[arg(long, env = "PINECONE_EMBEDDING_MODEL", default_value = "llama-text-embed-v2", global = true)]
    embedding_model: String,

    /// Rerank model
    #[arg(long, env = "PINECONE_RERANKER_MODEL", default_value = "bge-reranker-v2-m3", global = true)]
    rerank_model: String,

    /// Index namespace
    #[arg(long, env = "PINECONE_NAMESPACE", default_value = pdf_rag_core::DEFAULT_NAMESPACE, global = true)]
    namespace: String,

    /// Candidates fetched by the first search pass
    #[arg(long, env = "TOP_K", default_value_t = 5, global = true)]
    top_k: usize,

    /// Hits kept after reranking
    #[arg(long, env = "TOP_N", default_value_t = 4, global = true)]
    top_n: usize,

    /// OpenAI-compatible base URL for generation
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.groq.com/openai/v1", global = true)]
    llm_base_url: String,

    /// Chat model
    #[arg(long, env = "LLM_MODEL", default_value = "openai/gpt-oss-120b", global = true)]
    llm_model: String,

    /// Sampling temperature, 0 is deterministic
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.0, global = true)]
    temperature: f32,

    /// Maximum output tokens, unbounded when unset
    #[arg(long, env = "LLM_MAX_TOKENS", global = true)]
    max_tokens: Option<u32>,

    /// Retries on rate limits and server errors
    #[arg(long, env = "LLM_MAX_RETRIES", default_value_t = 2, global = true)]
    max_retries: u32,
}

impl Settings {
    fn rag_config(&self) -> RagConfig {
        RagConfig {
            chunking: ChunkingConfig {
                chunk_size: self.chunk_size,
                overlap: self.chunk_overlap,
            },
            index: IndexConfig {
                api_key: self.pinecone_api_key.clone(),
                index_name: self.index_name.clone(),
                cloud: self.cloud.clone(),
                region: self.region.clone(),
                embedding_model: self.embedding_model.clone(),
                namespace: self.namespace.clone(),
                batch_size: self.batch_size,
                ..IndexConfig::default()
            },
            retrieval: RetrievalConfig {
                top_k: self.top_k,
                top_n: self.top_n,
                rerank_model: self.rerank_model.clone(),
                ..RetrievalConfig::default()
            },
            generation: GenerationConfig {
                api_key: self.groq_api_key.clone(),
                base_url: self.llm_base_url.clone(),
                model: self.llm_model.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                max_retries: self.max_retries,
                ..GenerationConfig::default()
            },
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Address to bind
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Ingest one PDF, or every PDF under a folder.
    Ingest {
        /// PDF file or folder that contains PDFs recursively.
        #[arg(long)]
        path: String,
    },
    /// Answer one question from the terminal.
    Query {
        /// Question to answer
        #[arg(long)]
        query: String,
        /// Rerank the candidates before answering.
        #[arg(long, default_value_t = false)]
        rerank: bool,
    },
}

impl Command {
    /// Whether the command reaches the chat backend.
    fn answers_questions(&self) -> bool {
        !matches!(self, Command::Ingest { .. })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = cli.settings.rag_config();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?cli.settings.backend,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match cli.settings.backend {
        Backend::Pinecone => {
            config.validate_remote()?;
            let api_key = config.index.api_key.clone().unwrap_or_default();
            let index = PineconeIndex::new(api_key, config.index.clone());
            info!(index = %index.index_name(), "using pinecone index");
            run(index, config, cli.command).await
        }
        Backend::Memory => {
            config.validate()?;
            run(MemoryIndex::new(), config, cli.command).await
        }
    }
}

async fn run<I>(index: I, config: RagConfig, command: Command) -> anyhow::Result<()>
where
    I: VectorIndex + 'static,
{
    let api_key = if command.answers_questions() {
        config.generation.required_api_key()?.to_string()
    } else {
        // ingest never calls the generator
        config.generation.api_key.clone().unwrap_or_default()
    };
    let generator = ChatCompletionsGenerator::new(api_key, config.generation.clone())?;

    index.ensure_collection().await?;
    let service = RagService::new(index, generator, config)?;

    match command {
        Command::Serve { bind } => server::serve(Arc::new(service), &bind).await,
        Command::Ingest { path } => ingest_path(&service, &path).await,
        Command::Query { query, rerank } => {
            let answer = service.answer(&query, rerank).await?;
            println!("{}", answer.answer);
            println!();
            for (position, reference) in answer.reference.iter().enumerate() {
                println!("[{}] {} p.{}", position + 1, reference.source, reference.page_no);
            }
            Ok(())
        }
    }
}

async fn ingest_path<I, G>(service: &RagService<I, G>, path: &str) -> anyhow::Result<()>
where
    I: VectorIndex,
    G: AnswerGenerator,
{
    let root = Path::new(path);
    if !root.is_dir() {
        let outcome = service.ingest(path).await?;
        println!("{}: {} chunks ({})", outcome.source_doc, outcome.chunks, outcome.message);
        return Ok(());
    }

    let files = discover_pdf_files(root);
    if files.is_empty() {
        anyhow::bail!("no pdf files found in {}", root.display());
    }

    let mut total = 0;
    let mut failed = 0;
    for file in files {
        let file = file.to_string_lossy().to_string();
        match service.ingest(&file).await {
            Ok(outcome) => {
                total += outcome.chunks;
                println!("{}: {} chunks ({})", outcome.source_doc, outcome.chunks, outcome.message);
            }
            Err(error) => {
                failed += 1;
                warn!(path = %file, reason = %error, "skipped pdf");
            }
        }
    }

    println!("{total} chunks ingested at {}", Utc::now().to_rfc3339());
    if failed > 0 {
        warn!(failed, folder = %path, "some files were skipped");
    }
    Ok(())
}
