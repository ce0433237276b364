use crate::config::RagConfig;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::fingerprint::digest_file;
use crate::generation::answer_prompt;
use crate::ingest::{build_records, normalize_path_separators};
use crate::models::{IngestOutcome, QueryAnswer, SourceRef};
use crate::retrieval::Retriever;
use crate::traits::{AnswerGenerator, VectorIndex, SOURCE_HASH_FIELD};
use crate::{ConfigError, IngestError, RagError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

pub const DUPLICATE_MESSAGE: &str = "doc already exist";
pub const INGESTED_MESSAGE: &str = "document ingested successfully";
pub const NO_CONTEXT_ANSWER: &str = "I could not find any relevant passages in the indexed documents.";

/// Ingest and query pipelines over an injected index, generator and extractor.
///
/// The duplicate check and the upsert are two separate index calls, so two
/// concurrent ingests of the same file can both pass the check. Record ids are
/// derived from the content, so the second write overwrites the first.
pub struct RagService<I, G, X = LopdfExtractor> {
    index: I,
    generator: G,
    extractor: Arc<X>,
    config: RagConfig,
}

impl<I, G> RagService<I, G, LopdfExtractor>
where
    I: VectorIndex,
    G: AnswerGenerator,
{
    pub fn new(index: I, generator: G, config: RagConfig) -> Result<Self, ConfigError> {
        Self::with_extractor(index, generator, LopdfExtractor, config)
    }
}

impl<I, G, X> RagService<I, G, X>
where
    I: VectorIndex,
    G: AnswerGenerator,
    X: PdfExtractor + Send + Sync + 'static,
{
    pub fn with_extractor(
        index: I,
        generator: G,
        extractor: X,
        config: RagConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            index,
            generator,
            extractor: Arc::new(extractor),
            config,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn namespace(&self) -> &str {
        &self.config.index.namespace
    }

    #[instrument(skip(self), fields(namespace = %self.config.index.namespace))]
    pub async fn ingest(&self, file_path: &str) -> Result<IngestOutcome, RagError> {
        let source_doc = normalize_path_separators(file_path);
        let path = PathBuf::from(&source_doc);

        let fingerprint = {
            let path = path.clone();
            run_blocking(move || digest_file(&path)).await?
        };

        if self
            .index
            .find_by_field(self.namespace(), SOURCE_HASH_FIELD, &fingerprint)
            .await?
        {
            info!(source_doc = %source_doc, %fingerprint, "document already indexed");
            return Ok(IngestOutcome {
                source_doc,
                chunks: 0,
                message: DUPLICATE_MESSAGE.to_string(),
                fingerprint,
            });
        }

        let records = {
            let extractor = Arc::clone(&self.extractor);
            let chunking = self.config.chunking;
            let fingerprint = fingerprint.clone();
            run_blocking(move || build_records(&path, &fingerprint, chunking, &*extractor)).await?
        };

        let chunks = self.index.upsert(self.namespace(), &records).await?;
        info!(source_doc = %source_doc, chunks, "document ingested");

        Ok(IngestOutcome {
            source_doc,
            chunks,
            message: INGESTED_MESSAGE.to_string(),
            fingerprint,
        })
    }

    #[instrument(skip(self), fields(namespace = %self.config.index.namespace))]
    pub async fn answer(&self, query: &str, rerank: bool) -> Result<QueryAnswer, RagError> {
        if query.trim().is_empty() {
            return Err(RagError::Validation("query must not be empty".to_string()));
        }

        let hits = Retriever::new(&self.index, &self.config.retrieval)
            .retrieve(self.namespace(), query, rerank)
            .await?;
        let reference = hits.iter().map(SourceRef::from).collect::<Vec<_>>();

        let answer = if hits.is_empty() {
            NO_CONTEXT_ANSWER.to_string()
        } else {
            let prompt = answer_prompt(query, &hits);
            self.generator.generate(&prompt.system, &prompt.user).await?
        };

        info!(hits = hits.len(), rerank, "answered query");
        Ok(QueryAnswer {
            answer,
            reference,
            rerank,
        })
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, RagError>
where
    F: FnOnce() -> Result<T, IngestError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|error| RagError::Task(error.to_string()))?
        .map_err(RagError::from)
}
