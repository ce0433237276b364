use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;

pub const DEFAULT_NAMESPACE: &str = "example-namespace";

#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    pub api_key: Option<String>,
    pub index_name: String,
    pub cloud: String,
    pub region: String,
    pub embedding_model: String,
    pub namespace: String,
    pub batch_size: usize,
    /// How many times to poll a freshly created index before giving up.
    pub ready_poll_attempts: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_name: "rag-pipeline-reranker".to_string(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            embedding_model: "llama-text-embed-v2".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            batch_size: 96,
            ready_poll_attempts: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub top_n: usize,
    pub rerank_model: String,
    pub rank_fields: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            top_n: 4,
            rerank_model: "bge-reranker-v2-m3".to_string(),
            rank_fields: vec!["chunk_text".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// `None` leaves the output length to the backend.
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "openai/gpt-oss-120b".to_string(),
            temperature: 0.0,
            max_tokens: None,
            max_retries: 2,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    /// The key for the chat backend. Only commands that answer questions need it.
    pub fn required_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::Missing("GROQ_API_KEY")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RagConfig {
    pub chunking: ChunkingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

impl RagConfig {
    /// Checks every setting that would otherwise fail late or loop forever.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;

        if self.index.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "batch_size",
                value: "0".to_string(),
            });
        }
        if self.index.namespace.trim().is_empty() {
            return Err(ConfigError::Missing("namespace"));
        }
        if self.index.index_name.trim().is_empty() {
            return Err(ConfigError::Missing("index_name"));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "top_k",
                value: "0".to_string(),
            });
        }
        if self.retrieval.top_n == 0 {
            return Err(ConfigError::Invalid {
                key: "top_n",
                value: "0".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Invalid {
                key: "temperature",
                value: self.generation.temperature.to_string(),
            });
        }

        Ok(())
    }

    /// Like [`RagConfig::validate`], but also requires both API keys.
    /// `validate` plus the credentials a hosted Pinecone index needs.
    pub fn validate_remote(&self) -> Result<(), ConfigError> {
        self.validate()?;
        match self.index.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err(ConfigError::Missing("PINECONE_API_KEY")),
        }
    }
}
