//! Prompt construction and the hosted chat model.
//!
//! Every retrieved hit becomes a numbered context block. The number is the
//! only handle the model gets for citing it, so block `[n]` is always the
//! `n`-th entry of the reference list returned to the caller.

use crate::config::GenerationConfig;
use crate::models::RetrievedHit;
use crate::traits::AnswerGenerator;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const BACKEND: &str = "chat-completions";

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the \
numbered context passages provided by the user. Cite every statement with the number of the passage \
it comes from in square brackets, for example [1] or [2][3]. If the passages do not contain the \
answer, say that you do not know. Do not invent sources.";

/// Labels each hit as `[n] source (p.pages)` followed by its text.
pub fn build_context(hits: &[RetrievedHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(index, hit)| {
            let mut header = format!("[{}] {}", index + 1, hit.source);
            if !hit.page_no.is_empty() {
                header.push_str(&format!(" (p.{})", hit.page_no));
            }
            format!("{header}\n{}", hit.chunk_text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn answer_prompt(query: &str, hits: &[RetrievedHit]) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!("Context:\n{}\n\nQuestion: {}", build_context(hits), query.trim()),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_answer(response: ChatResponse) -> Result<String, ServiceError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ServiceError::Request("chat response had no message content".to_string()))
}

/// Rate limits and server errors are worth another attempt.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry `attempt`: 1s, 2s, 4s, ... capped at 32s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// OpenAI-compatible `/chat/completions` client (Groq by default).
///
/// Retry strategy:
/// - HTTP 429 or 5xx: retry with exponential backoff
/// - other HTTP 4xx: fail immediately
/// - network error: retry
pub struct ChatCompletionsGenerator {
    client: Client,
    api_key: String,
    config: GenerationConfig,
}

impl ChatCompletionsGenerator {
    pub fn new(api_key: impl Into<String>, config: GenerationConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl AnswerGenerator for ChatCompletionsGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let response = self
                .client
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        debug!(model = %self.config.model, attempt, "chat completion succeeded");
                        return parse_answer(response.json().await?);
                    }

                    let details = response.text().await.unwrap_or_default();
                    let error = ServiceError::BackendResponse {
                        backend: BACKEND.to_string(),
                        status: status.as_u16(),
                        details,
                    };

                    if is_retryable(status) {
                        warn!(attempt, %status, "retrying chat completion");
                        last_error = Some(error);
                        continue;
                    }

                    return Err(error);
                }
                Err(error) => {
                    warn!(attempt, %error, "chat completion request failed");
                    last_error = Some(ServiceError::Http(error));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ServiceError::Request("chat completion failed after retries".to_string())))
    }
}
