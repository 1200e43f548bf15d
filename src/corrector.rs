// Correction service adapter. One request per call and no retries here:
// retry policy belongs to the orchestrator, which must tell service failures
// apart from alignment failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CorrectionConfig;
use crate::error::CorrectionError;

/// Text in, corrected text out. Implementations may alter content arbitrarily.
#[async_trait]
pub trait Corrector: Send + Sync {
    async fn correct(&self, text: &str) -> Result<String, CorrectionError>;
}

/// Prompt asking for spelling/accent/formatting fixes only
pub fn build_prompt(chunk: &str) -> String {
    format!(
        "Fix only spelling mistakes, wrong accents and formatting problems in the text below. \
         Do not rephrase, reorder, add or remove sentences, and leave markup such as HTML tags untouched. \
         Answer with the corrected text only.\n\
         Original:\n\
         {chunk}\n\
         Corrected:\n"
    )
}

/// Re-attach the source's leading and trailing whitespace to a trimmed response
///
/// Models routinely strip or pad their answers; piece edges must keep the
/// document's exact whitespace for committed ranges to join seamlessly.
pub fn preserve_edges(source: &str, response: &str) -> String {
    let body = response.trim();
    let leading = &source[..source.len() - source.trim_start().len()];
    let trailing = &source[source.trim_end().len()..];

    if source.trim().is_empty() {
        return source.to_string();
    }

    let mut result = String::with_capacity(leading.len() + body.len() + trailing.len());
    result.push_str(leading);
    result.push_str(body);
    result.push_str(trailing);
    result
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
    error: Option<String>,
}

/// Corrector backed by an Ollama-compatible `/api/chat` endpoint
pub struct OllamaCorrector {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaCorrector {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, CorrectionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &CorrectionConfig) -> Result<Self, CorrectionError> {
        Self::new(&config.service_url, &config.model, config.request_timeout())
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl Corrector for OllamaCorrector {
    async fn correct(&self, text: &str) -> Result<String, CorrectionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(text),
            }],
            stream: false,
        };

        debug!("Sending {} chars to {} ({})", text.len(), self.chat_url(), self.model);
        let response = self.client.post(self.chat_url()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CorrectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CorrectionError::MalformedResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(CorrectionError::MalformedResponse(error));
        }

        let content = body
            .message
            .map(|m| m.content)
            .ok_or_else(|| CorrectionError::MalformedResponse("response has no message".into()))?;

        if content.trim().is_empty() {
            return Err(CorrectionError::EmptyResponse);
        }
        Ok(content)
    }
}
