use crate::models::{IngestRecord, RawHit, RerankOptions};
use crate::ServiceError;
use async_trait::async_trait;

/// Field holding the document fingerprint on every stored record.
pub const SOURCE_HASH_FIELD: &str = "source_hash_value";

/// A namespaced vector index with server-side embedding.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn has_collection(&self) -> Result<bool, ServiceError>;

    async fn create_collection(&self) -> Result<(), ServiceError>;

    /// Polls until a freshly created collection accepts reads and writes.
    async fn wait_until_ready(&self) -> Result<(), ServiceError>;

    async fn ensure_collection(&self) -> Result<(), ServiceError> {
        if !self.has_collection().await? {
            self.create_collection().await?;
        }
        self.wait_until_ready().await
    }

    /// Writes records in sequential batches and returns how many were sent.
    /// Batches written before a failure stay in the index.
    async fn upsert(&self, namespace: &str, records: &[IngestRecord]) -> Result<usize, ServiceError>;

    async fn search(
        &self,
        namespace: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RawHit>, ServiceError>;

    async fn search_with_rerank(
        &self,
        namespace: &str,
        query_text: &str,
        options: &RerankOptions,
    ) -> Result<Vec<RawHit>, ServiceError>;

    async fn find_by_field(
        &self,
        namespace: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, ServiceError>;
}
