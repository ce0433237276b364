use crate::config::RetrievalConfig;
use crate::models::{HitFields, RawHit, RerankOptions, RetrievedHit};
use crate::traits::VectorIndex;
use crate::ServiceError;
use tracing::debug;

impl From<RawHit> for RetrievedHit {
    fn from(raw: RawHit) -> Self {
        let (id, score, fields) = match raw {
            RawHit::Plain(hit) => (hit.id, hit.score, hit.fields),
            RawHit::Reranked(hit) => (hit.id, hit.rerank_score, hit.fields),
        };
        let HitFields {
            chunk_text,
            page_no,
            source,
        } = fields;

        RetrievedHit {
            id: id.unwrap_or_default(),
            score: score.unwrap_or(0.0),
            chunk_text: chunk_text.unwrap_or_default(),
            page_no: page_no.unwrap_or_default(),
            source: source.unwrap_or_default(),
        }
    }
}

/// Normalizes index hits into one shape. Order is kept as returned.
pub fn merge_hits(raw_hits: Vec<RawHit>) -> Vec<RetrievedHit> {
    raw_hits.into_iter().map(RetrievedHit::from).collect()
}

pub struct Retriever<'a, I: VectorIndex + ?Sized> {
    index: &'a I,
    config: &'a RetrievalConfig,
}

impl<'a, I: VectorIndex + ?Sized> Retriever<'a, I> {
    pub fn new(index: &'a I, config: &'a RetrievalConfig) -> Self {
        Self { index, config }
    }

    pub fn rerank_options(&self) -> RerankOptions {
        RerankOptions {
            model: self.config.rerank_model.clone(),
            top_k: self.config.top_k,
            top_n: self.config.top_n,
            rank_fields: self.config.rank_fields.clone(),
        }
    }

    pub async fn retrieve(
        &self,
        namespace: &str,
        query: &str,
        rerank: bool,
    ) -> Result<Vec<RetrievedHit>, ServiceError> {
        let raw_hits = if rerank {
            self.index
                .search_with_rerank(namespace, query, &self.rerank_options())
                .await?
        } else {
            self.index.search(namespace, query, self.config.top_k).await?
        };

        let hits = merge_hits(raw_hits);
        debug!(namespace, rerank, hits = hits.len(), "retrieved hits");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IngestRecord, PlainHit, RerankedHit};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn plain(id: &str, score: f64, text: &str) -> RawHit {
        RawHit::Plain(PlainHit {
            id: Some(id.to_string()),
            score: Some(score),
            fields: HitFields {
                chunk_text: Some(text.to_string()),
                page_no: Some("2".to_string()),
                source: Some("handbook.pdf".to_string()),
            },
        })
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let hits = merge_hits(vec![RawHit::Reranked(RerankedHit::default())]);

        assert_eq!(
            hits,
            vec![RetrievedHit {
                id: String::new(),
                score: 0.0,
                chunk_text: String::new(),
                page_no: String::new(),
                source: String::new(),
            }]
        );
    }

    #[test]
    fn merge_keeps_upstream_order_and_scores() {
        let hits = merge_hits(vec![
            plain("low-score-first", 0.1, "a"),
            RawHit::Reranked(RerankedHit {
                id: Some("reranked".to_string()),
                rerank_score: Some(0.97),
                fields: HitFields::default(),
            }),
            plain("high", 0.9, "c"),
        ]);

        let ids = hits.iter().map(|hit| hit.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["low-score-first", "reranked", "high"]);
        assert_eq!(hits[0].score, 0.1);
        assert_eq!(hits[1].score, 0.97);
        assert_eq!(hits[0].page_no, "2");
    }

    #[derive(Default)]
    struct RecordingIndex {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn has_collection(&self) -> Result<bool, ServiceError> {
            Ok(true)
        }

        async fn create_collection(&self) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn wait_until_ready(&self) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn upsert(&self, _namespace: &str, records: &[IngestRecord]) -> Result<usize, ServiceError> {
            Ok(records.len())
        }

        async fn search(
            &self,
            namespace: &str,
            _query_text: &str,
            top_k: usize,
        ) -> Result<Vec<RawHit>, ServiceError> {
            self.calls
                .lock()
                .expect("lock")
                .push(format!("search:{namespace}:{top_k}"));
            Ok(vec![plain("p", 0.5, "plain")])
        }

        async fn search_with_rerank(
            &self,
            namespace: &str,
            _query_text: &str,
            options: &RerankOptions,
        ) -> Result<Vec<RawHit>, ServiceError> {
            self.calls.lock().expect("lock").push(format!(
                "rerank:{namespace}:{}:{}:{}",
                options.model, options.top_k, options.top_n
            ));
            Ok(Vec::new())
        }

        async fn find_by_field(
            &self,
            _namespace: &str,
            _field: &str,
            _value: &str,
        ) -> Result<bool, ServiceError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn retriever_picks_search_mode() {
        let index = RecordingIndex::default();
        let config = RetrievalConfig::default();
        let retriever = Retriever::new(&index, &config);

        let plain_hits = retriever.retrieve("docs", "q", false).await.expect("plain");
        let reranked_hits = retriever.retrieve("docs", "q", true).await.expect("rerank");

        assert_eq!(plain_hits.len(), 1);
        assert!(reranked_hits.is_empty());
        assert_eq!(
            *index.calls.lock().expect("lock"),
            vec![
                "search:docs:5".to_string(),
                "rerank:docs:bge-reranker-v2-m3:5:4".to_string()
            ]
        );
    }
}
