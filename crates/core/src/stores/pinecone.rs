use crate::config::IndexConfig;
use crate::models::{IngestRecord, PlainHit, RawHit, RerankOptions, RerankedHit};
use crate::traits::VectorIndex;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2025-01";
const BACKEND: &str = "pinecone";
const SEARCH_FIELDS: [&str; 3] = ["source", "chunk_text", "page_no"];

/// Pinecone index with an integrated embedding model.
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    control_plane: String,
    config: IndexConfig,
    host: OnceCell<Url>,
    poll_interval: Duration,
}

impl PineconeIndex {
    pub fn new(api_key: impl Into<String>, config: IndexConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            control_plane: CONTROL_PLANE_URL.to_string(),
            config,
            host: OnceCell::new(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.config.index_name
    }

    async fn describe(&self) -> Result<Option<Value>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/indexes/{}", self.control_plane, self.config.index_name))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }

    async fn data_plane(&self) -> Result<&Url, ServiceError> {
        self.host
            .get_or_try_init(|| async {
                let description = self.describe().await?.ok_or_else(|| {
                    ServiceError::NotReady(format!("index {} does not exist", self.config.index_name))
                })?;
                host_url(&description)
            })
            .await
    }

    async fn post_search(&self, namespace: &str, body: &Value) -> Result<Option<Value>, ServiceError> {
        let url = namespace_url(self.data_plane().await?, namespace, "search")?;

        let response = self
            .client
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await?;

        // An unknown namespace has simply never been written to.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn has_collection(&self) -> Result<bool, ServiceError> {
        Ok(self.describe().await?.is_some())
    }

    async fn create_collection(&self) -> Result<(), ServiceError> {
        info!(index = %self.config.index_name, "creating pinecone index");

        let response = self
            .client
            .post(format!("{}/indexes/create-for-model", self.control_plane))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&create_index_body(&self.config))
            .send()
            .await?;

        // 409: created concurrently by another process.
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        check_status(response).await?;
        Ok(())
    }

    async fn wait_until_ready(&self) -> Result<(), ServiceError> {
        for attempt in 0..self.config.ready_poll_attempts.max(1) {
            if attempt > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }

            if let Some(description) = self.describe().await? {
                if is_ready(&description) {
                    info!(index = %self.config.index_name, "pinecone index is ready");
                    return Ok(());
                }
            }
            debug!(index = %self.config.index_name, attempt, "waiting for pinecone index");
        }

        Err(ServiceError::NotReady(format!(
            "index {} not ready after {} polls",
            self.config.index_name, self.config.ready_poll_attempts
        )))
    }

    async fn upsert(&self, namespace: &str, records: &[IngestRecord]) -> Result<usize, ServiceError> {
        if records.is_empty() {
            return Ok(0);
        }

        let url = namespace_url(self.data_plane().await?, namespace, "upsert")?;

        let mut written = 0;
        for (batch_index, (size, body)) in upsert_batches(records, self.config.batch_size)?
            .into_iter()
            .enumerate()
        {
            let response = self
                .client
                .post(url.clone())
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .header(CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await?;
            check_status(response).await?;

            written += size;
            debug!(namespace, batch = batch_index, records = size, "upserted batch");
        }

        info!(index = %self.config.index_name, namespace, records = written, "upsert finished");
        Ok(written)
    }

    async fn search(
        &self,
        namespace: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RawHit>, ServiceError> {
        let body = search_body(query_text, top_k, None, None);
        match self.post_search(namespace, &body).await? {
            Some(response) => parse_hits(&response, false),
            None => Ok(Vec::new()),
        }
    }

    async fn search_with_rerank(
        &self,
        namespace: &str,
        query_text: &str,
        options: &RerankOptions,
    ) -> Result<Vec<RawHit>, ServiceError> {
        let body = search_body(query_text, options.top_k, None, Some(options));
        match self.post_search(namespace, &body).await? {
            Some(response) => parse_hits(&response, true),
            None => Ok(Vec::new()),
        }
    }

    async fn find_by_field(
        &self,
        namespace: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, ServiceError> {
        let filter = json!({ field: { "$eq": value } });
        let body = search_body(value, 1, Some(filter), None);
        match self.post_search(namespace, &body).await? {
            Some(response) => Ok(!parse_hits(&response, false)?.is_empty()),
            None => Ok(false),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let details = response.text().await.unwrap_or_default();
    Err(ServiceError::BackendResponse {
        backend: BACKEND.to_string(),
        status: status.as_u16(),
        details,
    })
}

fn create_index_body(config: &IndexConfig) -> Value {
    json!({
        "name": config.index_name,
        "cloud": config.cloud,
        "region": config.region,
        "embed": {
            "model": config.embedding_model,
            "field_map": { "text": "chunk_text" },
        },
    })
}

fn is_ready(description: &Value) -> bool {
    description
        .pointer("/status/ready")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn host_url(description: &Value) -> Result<Url, ServiceError> {
    let host = description
        .pointer("/host")
        .and_then(Value::as_str)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ServiceError::NotReady("index description has no host".to_string()))?;

    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    };
    let base = format!("{}/", base.trim_end_matches('/'));
    Ok(Url::parse(&base)?)
}

/// `records/namespaces/{namespace}/{action}` under the data-plane host, with
/// the namespace escaped as a single path segment.
fn namespace_url(host: &Url, namespace: &str, action: &str) -> Result<Url, ServiceError> {
    let mut url = host.clone();
    url.path_segments_mut()
        .map_err(|_| ServiceError::Request(format!("{host} cannot carry a path")))?
        .pop_if_empty()
        .extend(["records", "namespaces", namespace, action]);
    Ok(url)
}

/// Splits records into sequential NDJSON bodies of at most `batch_size`
/// records, each paired with its record count.
fn upsert_batches(
    records: &[IngestRecord],
    batch_size: usize,
) -> Result<Vec<(usize, String)>, ServiceError> {
    records
        .chunks(batch_size.max(1))
        .map(|batch| -> Result<(usize, String), ServiceError> {
            Ok((batch.len(), ndjson_body(batch)?))
        })
        .collect()
}

fn ndjson_body(records: &[IngestRecord]) -> Result<String, ServiceError> {
    let mut body = String::new();
    for record in records {
        let line = json!({
            "_id": record.id,
            "chunk_text": record.chunk_text,
            "source": record.source,
            "page_no": record.page_no,
            "source_hash_value": record.source_hash_value,
        });
        body.push_str(&serde_json::to_string(&line)?);
        body.push('\n');
    }
    Ok(body)
}

fn search_body(
    query_text: &str,
    top_k: usize,
    filter: Option<Value>,
    rerank: Option<&RerankOptions>,
) -> Value {
    let mut query = json!({
        "inputs": { "text": query_text },
        "top_k": top_k,
    });
    if let Some(filter) = filter {
        query["filter"] = filter;
    }

    let mut body = json!({
        "query": query,
        "fields": SEARCH_FIELDS,
    });
    if let Some(options) = rerank {
        body["rerank"] = json!({
            "model": options.model,
            "top_n": options.top_n,
            "rank_fields": options.rank_fields,
        });
    }
    body
}

fn parse_hits(response: &Value, reranked: bool) -> Result<Vec<RawHit>, ServiceError> {
    let hits = response
        .pointer("/result/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.into_iter()
        .map(|hit| -> Result<RawHit, ServiceError> {
            Ok(if reranked {
                RawHit::Reranked(serde_json::from_value::<RerankedHit>(hit)?)
            } else {
                RawHit::Plain(serde_json::from_value::<PlainHit>(hit)?)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HitFields;

    fn record(id: &str) -> IngestRecord {
        IngestRecord {
            id: id.to_string(),
            page_no: "0,1".to_string(),
            source: "handbook.pdf".to_string(),
            chunk_text: "leave policy \"annual\"".to_string(),
            source_hash_value: "abc123".to_string(),
        }
    }

    #[test]
    fn upsert_body_is_one_json_object_per_line() {
        let body = ndjson_body(&[record("chunk-0"), record("chunk-1")]).expect("serializes");
        let lines = body.lines().collect::<Vec<_>>();

        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).expect("valid json");
        assert_eq!(first["_id"], "chunk-0");
        assert_eq!(first["page_no"], "0,1");
        assert_eq!(first["source_hash_value"], "abc123");
        assert_eq!(first["chunk_text"], "leave policy \"annual\"");
    }

    #[test]
    fn rerank_search_body_carries_rerank_block() {
        let options = RerankOptions {
            model: "bge-reranker-v2-m3".to_string(),
            top_k: 5,
            top_n: 4,
            rank_fields: vec!["chunk_text".to_string()],
        };
        let body = search_body("promotion process", options.top_k, None, Some(&options));

        assert_eq!(body["query"]["inputs"]["text"], "promotion process");
        assert_eq!(body["query"]["top_k"], 5);
        assert_eq!(body["rerank"]["top_n"], 4);
        assert_eq!(body["rerank"]["rank_fields"][0], "chunk_text");
        assert_eq!(body["fields"].as_array().map(Vec::len), Some(3));
        assert!(body["query"].get("filter").is_none());
    }

    #[test]
    fn duplicate_lookup_filters_on_field() {
        let filter = json!({ "source_hash_value": { "$eq": "abc" } });
        let body = search_body("abc", 1, Some(filter), None);

        assert_eq!(body["query"]["filter"]["source_hash_value"]["$eq"], "abc");
        assert!(body.get("rerank").is_none());
    }

    #[test]
    fn hits_are_parsed_with_missing_fields() {
        let response = json!({
            "result": {
                "hits": [
                    {"_id": "a", "_score": 0.9, "fields": {"chunk_text": "alpha", "page_no": "3", "source": "x.pdf"}},
                    {"_id": "b", "fields": {"page_no": 4}},
                    {}
                ]
            }
        });

        let hits = parse_hits(&response, false).expect("parses");
        assert_eq!(hits.len(), 3);
        assert_eq!(
            hits[1],
            RawHit::Plain(PlainHit {
                id: Some("b".to_string()),
                score: None,
                fields: HitFields {
                    chunk_text: None,
                    page_no: Some("4".to_string()),
                    source: None,
                },
            })
        );
        assert!(matches!(parse_hits(&response, true).expect("parses")[0], RawHit::Reranked(_)));
    }

    #[test]
    fn empty_response_has_no_hits() {
        assert!(parse_hits(&json!({}), false).expect("parses").is_empty());
    }

    #[test]
    fn host_gets_a_scheme_and_trailing_slash() {
        let description = json!({"host": "rag-abc.svc.aped-4627.pinecone.io", "status": {"ready": true}});
        let url = host_url(&description).expect("valid host");

        assert_eq!(url.as_str(), "https://rag-abc.svc.aped-4627.pinecone.io/");
        assert_eq!(
            namespace_url(&url, "docs", "search").expect("joins").as_str(),
            "https://rag-abc.svc.aped-4627.pinecone.io/records/namespaces/docs/search"
        );
        assert!(is_ready(&description));
        assert!(!is_ready(&json!({"status": {"ready": false}})));
    }

    #[test]
    fn create_body_maps_text_to_chunk_text() {
        let body = create_index_body(&IndexConfig::default());
        assert_eq!(body["embed"]["field_map"]["text"], "chunk_text");
        assert_eq!(body["embed"]["model"], "llama-text-embed-v2");
        assert_eq!(body["cloud"], "aws");
    }

    #[test]
    fn namespace_is_escaped_as_one_segment() {
        let host = Url::parse("https://rag-abc.svc.pinecone.io/").expect("valid");

        let url = namespace_url(&host, "team/a?b#c", "upsert").expect("joins");
        assert_eq!(
            url.as_str(),
            "https://rag-abc.svc.pinecone.io/records/namespaces/team%2Fa%3Fb%23c/upsert"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn upsert_is_split_into_bounded_batches() {
        let records = (0..97)
            .map(|index| record(&format!("chunk-{index}")))
            .collect::<Vec<_>>();

        let batches = upsert_batches(&records, 96).expect("serializes");
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, 96);
        assert_eq!(batches[0].1.lines().count(), 96);
        assert_eq!(batches[1].0, 1);
        assert!(batches[1].1.contains("\"_id\":\"chunk-96\""));

        assert_eq!(upsert_batches(&records[..96], 96).expect("serializes").len(), 1);
        assert!(upsert_batches(&[], 96).expect("serializes").is_empty());
        assert_eq!(upsert_batches(&records[..3], 0).expect("serializes").len(), 3);
    }
}
