//! In-process [`VectorIndex`] for tests and offline runs.
//!
//! Records are embedded locally with [`TrigramEmbedder`] and searched by
//! brute-force cosine similarity. The rerank pass re-scores the candidates by
//! the share of query terms found in the rank fields.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::embeddings::{cosine_similarity, Embedder, TrigramEmbedder};
use crate::models::{HitFields, IngestRecord, PlainHit, RawHit, RerankOptions, RerankedHit};
use crate::traits::VectorIndex;
use crate::ServiceError;

struct StoredRecord {
    record: IngestRecord,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct MemoryIndex {
    embedder: TrigramEmbedder,
    created: RwLock<bool>,
    namespaces: RwLock<HashMap<String, Vec<StoredRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(namespace)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    fn ranked(&self, namespace: &str, query_text: &str, top_k: usize) -> Vec<(f64, IngestRecord)> {
        let query = self.embedder.embed(query_text);
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = namespaces.get(namespace) else {
            return Vec::new();
        };

        let mut scored = stored
            .iter()
            .map(|item| {
                (
                    f64::from(cosine_similarity(&query, &item.vector)),
                    item.record.clone(),
                )
            })
            .collect::<Vec<_>>();
        scored.sort_by(|left, right| right.0.total_cmp(&left.0));
        scored.truncate(top_k);
        scored
    }
}

fn fields_of(record: &IngestRecord) -> HitFields {
    HitFields {
        chunk_text: Some(record.chunk_text.clone()),
        page_no: Some(record.page_no.clone()),
        source: Some(record.source.clone()),
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|character: char| !character.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_value<'a>(record: &'a IngestRecord, field: &str) -> Option<&'a str> {
    match field {
        "id" | "_id" => Some(&record.id),
        "chunk_text" => Some(&record.chunk_text),
        "page_no" => Some(&record.page_no),
        "source" => Some(&record.source),
        "source_hash_value" => Some(&record.source_hash_value),
        _ => None,
    }
}

fn term_overlap(query: &HashSet<String>, record: &IngestRecord, rank_fields: &[String]) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let mut found = HashSet::new();
    for field in rank_fields {
        if let Some(value) = field_value(record, field) {
            found.extend(terms(value));
        }
    }
    query.intersection(&found).count() as f64 / query.len() as f64
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn has_collection(&self) -> Result<bool, ServiceError> {
        Ok(*self.created.read().unwrap_or_else(PoisonError::into_inner))
    }

    async fn create_collection(&self) -> Result<(), ServiceError> {
        *self.created.write().unwrap_or_else(PoisonError::into_inner) = true;
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<(), ServiceError> {
        if self.has_collection().await? {
            Ok(())
        } else {
            Err(ServiceError::NotReady("memory index was never created".to_string()))
        }
    }

    async fn upsert(&self, namespace: &str, records: &[IngestRecord]) -> Result<usize, ServiceError> {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let stored = namespaces.entry(namespace.to_string()).or_default();

        for record in records {
            let vector = self.embedder.embed(&record.chunk_text);
            match stored.iter_mut().find(|item| item.record.id == record.id) {
                Some(existing) => {
                    existing.record = record.clone();
                    existing.vector = vector;
                }
                None => stored.push(StoredRecord {
                    record: record.clone(),
                    vector,
                }),
            }
        }

        Ok(records.len())
    }

    async fn search(
        &self,
        namespace: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RawHit>, ServiceError> {
        Ok(self
            .ranked(namespace, query_text, top_k)
            .into_iter()
            .map(|(score, record)| {
                RawHit::Plain(PlainHit {
                    id: Some(record.id.clone()),
                    score: Some(score),
                    fields: fields_of(&record),
                })
            })
            .collect())
    }

    async fn search_with_rerank(
        &self,
        namespace: &str,
        query_text: &str,
        options: &RerankOptions,
    ) -> Result<Vec<RawHit>, ServiceError> {
        let query_terms = terms(query_text);
        let mut candidates = self
            .ranked(namespace, query_text, options.top_k)
            .into_iter()
            .map(|(_, record)| (term_overlap(&query_terms, &record, &options.rank_fields), record))
            .collect::<Vec<_>>();

        candidates.sort_by(|left, right| right.0.total_cmp(&left.0));
        candidates.truncate(options.top_n);

        Ok(candidates
            .into_iter()
            .map(|(score, record)| {
                RawHit::Reranked(RerankedHit {
                    id: Some(record.id.clone()),
                    rerank_score: Some(score),
                    fields: fields_of(&record),
                })
            })
            .collect())
    }

    async fn find_by_field(
        &self,
        namespace: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, ServiceError> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(namespaces.get(namespace).is_some_and(|stored| {
            stored
                .iter()
                .any(|item| field_value(&item.record, field) == Some(value))
        }))
    }
}
