//! Client for OpenAI-compatible chat completion APIs (Groq, Together)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{build_http_client, require_api_key, CompletionProvider};
use crate::config::{ProviderKind, ProviderSettings};
use crate::errors::{ClientResult, ProviderError};
use crate::types::ChatTurn;

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    kind: ProviderKind,
    api_key: String,
    model_name: String,
    base_url: String,
    http_client: Client,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl OpenAiCompatClient {
    pub fn new(settings: &ProviderSettings) -> ClientResult<Self> {
        Ok(Self {
            kind: settings.kind,
            api_key: require_api_key(settings)?,
            model_name: settings.model_name(),
            base_url: settings.endpoint(),
            http_client: build_http_client()?,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatClient {
    fn provider_name(&self) -> &'static str {
        self.kind.name()
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn complete(&self, messages: &[ChatTurn], temperature: f32) -> ClientResult<String> {
        debug!(
            provider = self.kind.name(),
            model = %self.model_name,
            turns = messages.len(),
            "Calling chat completions"
        );

        let request = ChatCompletionRequest {
            model: &self.model_name,
            messages: messages
                .iter()
                .map(|turn| Message {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            temperature,
        };

        let response = self
            .http_client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => {
                    let mut message = err.error.message;
                    if let Some(kind) = err.error.error_type {
                        message.push_str(&format!(" (type: {})", kind));
                    }
                    if let Some(code) = err.error.code.filter(|c| !c.is_null()) {
                        message.push_str(&format!(" (code: {})", code));
                    }
                    message
                }
                Err(_) => body,
            };
            return Err(ProviderError::HttpError {
                status_code: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::ParsingError(format!(
                "Failed to parse {} response: {}",
                self.kind.name(),
                e
            ))
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Token usage"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                ProviderError::ResponseError(format!("No text generated by {}", self.kind.name()))
            })
    }
}
