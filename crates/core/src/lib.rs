pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod service;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_pages, normalize_text, window_ranges, ChunkingConfig, PageStream};
pub use config::{GenerationConfig, IndexConfig, RagConfig, RetrievalConfig, DEFAULT_NAMESPACE};
pub use embeddings::{cosine_similarity, Embedder, TrigramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, IngestError, RagError, ServiceError};
pub use extractor::{extract_pages, LopdfExtractor, PdfExtractor};
pub use fingerprint::digest_file;
pub use generation::{answer_prompt, build_context, ChatCompletionsGenerator, Prompt};
pub use ingest::{build_records, discover_pdf_files, normalize_path_separators, record_id};
pub use models::{
    Chunk, HitFields, IngestOutcome, IngestRecord, Page, PlainHit, QueryAnswer, RawHit,
    RerankOptions, RerankedHit, RetrievedHit, SourceRef,
};
pub use retrieval::{merge_hits, Retriever};
pub use service::{RagService, DUPLICATE_MESSAGE, INGESTED_MESSAGE, NO_CONTEXT_ANSWER};
pub use stores::{MemoryIndex, PineconeIndex};
pub use traits::{AnswerGenerator, VectorIndex, SOURCE_HASH_FIELD};
