//! Client for the Google Gemini `generateContent` API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{build_http_client, require_api_key, CompletionProvider};
use crate::config::ProviderSettings;
use crate::errors::{ClientResult, ProviderError};
use crate::types::{ChatTurn, Role};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model_name: String,
    base_url: String,
    http_client: Client,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize, Debug)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

impl ErrorBody {
    /// Message, status and any detail reasons (e.g. `API_KEY_INVALID`)
    fn render(&self) -> String {
        let reasons: Vec<&str> = self
            .details
            .iter()
            .filter_map(|d| d.reason.as_deref())
            .collect();
        if reasons.is_empty() {
            format!("{} ({})", self.message, self.status)
        } else {
            format!("{} ({}; {})", self.message, self.status, reasons.join(", "))
        }
    }
}

impl GeminiClient {
    pub fn new(settings: &ProviderSettings) -> ClientResult<Self> {
        Ok(Self {
            api_key: require_api_key(settings)?,
            model_name: settings.model_name(),
            base_url: settings.endpoint(),
            http_client: build_http_client()?,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_name)
    }

    /// Translates turns into Gemini's shape: the leading system turn becomes
    /// `systemInstruction` and assistant turns use the `model` role.
    fn build_request<'a>(messages: &'a [ChatTurn], temperature: f32) -> GenerateContentRequest<'a> {
        let (system, rest) = match messages.split_first() {
            Some((first, rest)) if first.role == Role::System => (Some(first), rest),
            _ => (None, messages),
        };

        let contents = rest
            .iter()
            .map(|turn| Content {
                role: Some(match turn.role {
                    Role::Assistant => "model",
                    Role::User | Role::System => "user",
                }),
                parts: vec![Part {
                    text: &turn.content,
                }],
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction: system.map(|turn| Content {
                role: None,
                parts: vec![Part {
                    text: &turn.content,
                }],
            }),
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model_name(&self) -> String {
        self.model_name.clone()
    }

    async fn complete(&self, messages: &[ChatTurn], temperature: f32) -> ClientResult<String> {
        debug!(model = %self.model_name, turns = messages.len(), "Calling Gemini");

        let request = Self::build_request(messages, temperature);
        let response = self
            .http_client
            .post(self.api_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(err) => err.error.render(),
                Err(_) => body,
            };
            return Err(ProviderError::HttpError {
                status_code: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParsingError(format!("Failed to parse Gemini response: {}", e)))?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                completion_tokens = usage.candidates_token_count,
                "Gemini token usage"
            );
        }

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::ResponseError(
                "No text generated by Gemini".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Captured = Arc<Mutex<Option<(Option<String>, Value)>>>;

    async fn spawn_fake(status: StatusCode, reply: Value) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let app = Router::new()
            .route(
                "/models/:action",
                post(
                    move |State(captured): State<Captured>,
                          headers: axum::http::HeaderMap,
                          Json(body): Json<Value>| {
                        let reply = reply.clone();
                        async move {
                            let key = headers
                                .get("x-goog-api-key")
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_string);
                            *captured.lock().unwrap() = Some((key, body));
                            (status, Json(reply))
                        }
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    fn client_for(base_url: String) -> GeminiClient {
        let mut settings = ProviderSettings::new(ProviderKind::Gemini);
        settings.api_key = Some("test-key".to_string());
        settings.base_url = Some(base_url);
        GeminiClient::new(&settings).unwrap()
    }

    #[test]
    fn test_request_maps_roles() {
        let turns = vec![
            ChatTurn::system("be brief"),
            ChatTurn::user("hi"),
            ChatTurn::assistant("hello"),
            ChatTurn::user("again"),
        ];
        let request = GeminiClient::build_request(&turns, 0.3);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(value["contents"].as_array().unwrap().len(), 3);
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][2]["role"], "user");
        assert!((value["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_request_without_system_turn() {
        let turns = vec![ChatTurn::user("hi")];
        let value = serde_json::to_value(GeminiClient::build_request(&turns, 0.7)).unwrap();
        assert!(value.get("systemInstruction").is_none());
        assert_eq!(value["contents"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_complete_success() {
        let (url, captured) = spawn_fake(
            StatusCode::OK,
            json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]}}],
                "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2}
            }),
        )
        .await;

        let client = client_for(url);
        let text = client
            .complete(&[ChatTurn::system("sys"), ChatTurn::user("hi")], 0.7)
            .await
            .unwrap();
        assert_eq!(text, "Hello there");

        let (key, body) = captured.lock().unwrap().clone().unwrap();
        assert_eq!(key.as_deref(), Some("test-key"));
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
    }

    #[tokio::test]
    async fn test_complete_error_carries_status() {
        let (url, _) = spawn_fake(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}),
        )
        .await;

        let err = client_for(url)
            .complete(&[ChatTurn::user("hi")], 0.7)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(429));
        assert!(err.to_string().contains("Resource has been exhausted"));
    }

    #[tokio::test]
    async fn test_invalid_key_error_keeps_detail_reason() {
        let (url, _) = spawn_fake(
            StatusCode::BAD_REQUEST,
            json!({"error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": "API_KEY_INVALID",
                    "domain": "googleapis.com"
                }]
            }}),
        )
        .await;

        let err = client_for(url)
            .complete(&[ChatTurn::user("hi")], 0.7)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("API_KEY_INVALID"));
        assert_eq!(crate::classify(&err), crate::ErrorCategory::Authentication);
    }

    #[tokio::test]
    async fn test_complete_empty_candidates() {
        let (url, _) = spawn_fake(StatusCode::OK, json!({"candidates": []})).await;
        let err = client_for(url)
            .complete(&[ChatTurn::user("hi")], 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ResponseError(_)));
    }
}
