use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Text of a single PDF page, numbered from 0 in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page_no: u32,
    pub text: String,
}

impl Page {
    pub fn new(page_no: u32, text: impl Into<String>) -> Self {
        Self {
            page_no,
            text: text.into(),
        }
    }
}

/// One fixed-size window over the merged document text.
///
/// `start..end` is the untrimmed character range of the window inside the
/// merged buffer; `page_no` holds every page tagged inside that range,
/// sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub page_no: Vec<u32>,
    pub chunk_text: String,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn page_label(&self) -> String {
        self.page_no
            .iter()
            .map(|page| page.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A chunk ready to be written to the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    pub id: String,
    pub page_no: String,
    pub source: String,
    pub chunk_text: String,
    pub source_hash_value: String,
}

/// Stored fields returned with a search hit. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HitFields {
    #[serde(default)]
    pub chunk_text: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub page_no: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Page numbers are stored as strings, but older records hold bare numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub fields: HitFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RerankedHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(rename = "_score", default)]
    pub rerank_score: Option<f64>,
    #[serde(default)]
    pub fields: HitFields,
}

/// Search result as it arrives from the index, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawHit {
    Plain(PlainHit),
    Reranked(RerankedHit),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedHit {
    pub id: String,
    pub score: f64,
    pub chunk_text: String,
    pub page_no: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub page_no: String,
}

impl From<&RetrievedHit> for SourceRef {
    fn from(hit: &RetrievedHit) -> Self {
        Self {
            source: hit.source.clone(),
            page_no: hit.page_no.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub source_doc: String,
    pub chunks: usize,
    pub message: String,
    pub fingerprint: String,
}

impl IngestOutcome {
    pub fn is_duplicate(&self) -> bool {
        self.chunks == 0 && self.message == crate::service::DUPLICATE_MESSAGE
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub reference: Vec<SourceRef>,
    pub rerank: bool,
}

/// Options for a search followed by a rerank pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankOptions {
    pub model: String,
    pub top_k: usize,
    pub top_n: usize,
    pub rank_fields: Vec<String>,
}
