use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Duration as ChronoDuration;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use studymate_core::{ChatTurn, ProviderConfig, ProviderSlot, UnifiedConfig};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::coordinator::{self, ChatRequest};
use crate::error::ApiError;
use crate::extraction::UploadedFile;
use crate::gateway::ProviderGateway;
use crate::images::{create_image_store, ImageStore, ImageStoreRef};
use crate::mailer::{ContactMessage, Mailer, MailerRef, SmtpMailer};
use crate::prompt::{PromptBuilder, RequestContext};
use crate::quiz::{QuizQuestion, QuizRequest};
use crate::session::{InMemorySessionStore, SessionLocks, SessionStore, SessionStoreRef};
use crate::summary::SummaryRequest;

const MAX_CHAT_FILES: usize = 10;

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UnifiedConfig>,
    pub gateway: Arc<ProviderGateway>,
    pub sessions: SessionStoreRef,
    pub session_locks: Arc<SessionLocks>,
    pub prompts: PromptBuilder,
    pub images: ImageStoreRef,
    pub mailer: Option<MailerRef>,
}

impl AppState {
    /// Wires every collaborator from configuration
    pub fn from_config(config: UnifiedConfig) -> anyhow::Result<Self> {
        let gateway = ProviderGateway::from_config(&config.providers)
            .context("Failed to initialize AI providers")?;

        let sessions: SessionStoreRef = if config.session.ttl_secs == 0 {
            Arc::new(InMemorySessionStore::new())
        } else {
            let ttl = ChronoDuration::from_std(std::time::Duration::from_secs(config.session.ttl_secs))
                .context("session.ttl_secs is out of range")?;
            Arc::new(InMemorySessionStore::with_ttl(ttl))
        };

        let images = create_image_store(&config).context("Failed to initialize image storage")?;

        let mailer = SmtpMailer::from_config(&config.mail)
            .context("Failed to initialize contact mailer")?
            .map(|mailer| Arc::new(mailer) as MailerRef);
        if mailer.is_none() {
            info!("SMTP is not configured; the contact endpoint is disabled");
        }

        Ok(Self {
            prompts: PromptBuilder::new(&config.prompt),
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            sessions,
            session_locks: Arc::new(SessionLocks::new()),
            images,
            mailer,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatUsage {
    provider: String,
    provider_used: ProviderSlot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QuizResponse {
    questions: Vec<QuizQuestion>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    session_id: String,
    turns: Vec<ChatTurn>,
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Builds the router with every route and layer attached
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let uploads = ServeDir::new(server.upload_dir.clone());
    let body_limit = DefaultBodyLimit::max(server.max_upload_bytes);
    let cors = cors_layer(&server.allowed_origins);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(handle_chat))
        .route("/api/quiz", post(handle_quiz))
        .route("/api/summarize", post(handle_summarize))
        .route("/api/upload-profile-image", post(handle_profile_image))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/contact", post(handle_contact))
        .route("/api/contact", post(handle_contact))
        .nest_service("/uploads", uploads)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl-C
pub async fn run_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!("Starting HTTP server on {}", addr);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn multipart_error(e: impl std::fmt::Display) -> ApiError {
    ApiError::Validation(format!("Invalid multipart body: {}", e))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the chat form into a `ChatRequest`
async fn read_chat_form(mut multipart: Multipart) -> Result<ChatRequest, ApiError> {
    let mut request = ChatRequest {
        session_id: None,
        user_message: String::new(),
        messages: Vec::new(),
        config: ProviderConfig::default(),
        files: Vec::new(),
        context: RequestContext::now(),
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "files[]" => {
                if request.files.len() >= MAX_CHAT_FILES {
                    return Err(ApiError::Validation(format!(
                        "At most {} files can be attached",
                        MAX_CHAT_FILES
                    )));
                }
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                request.files.push(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "messages" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    request.messages = serde_json::from_str(&text).map_err(|e| {
                        ApiError::Validation(format!(
                            "messages must be a JSON array of {{role, content}}: {}",
                            e
                        ))
                    })?;
                }
            }
            "config" => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.trim().is_empty() {
                    request.config = serde_json::from_str(&text).unwrap_or_else(|e| {
                        warn!(error = %e, "Ignoring malformed chat config");
                        ProviderConfig::default()
                    });
                }
            }
            "userMessage" => request.user_message = field.text().await.map_err(multipart_error)?,
            "sessionId" => request.session_id = non_empty(field.text().await.map_err(multipart_error)?),
            "location" => request.context.location = non_empty(field.text().await.map_err(multipart_error)?),
            "weather" => request.context.weather = non_empty(field.text().await.map_err(multipart_error)?),
            "localTime" => request.context.local_time = non_empty(field.text().await.map_err(multipart_error)?),
            other => debug!(field = other, "Ignoring unknown chat form field"),
        }
    }

    Ok(request)
}

async fn handle_chat(State(state): State<AppState>, multipart: Multipart) -> Result<Json<ChatResponse>, ApiError> {
    let request = read_chat_form(multipart).await?;
    let outcome = coordinator::process_chat(&state, request).await?;

    Ok(Json(ChatResponse {
        choices: vec![ChatChoice {
            message: ChatMessage {
                role: "assistant",
                content: outcome.result.text,
            },
        }],
        usage: ChatUsage {
            provider: outcome.result.provider,
            provider_used: outcome.result.provider_used,
        },
        session_id: outcome.session_id,
    }))
}

async fn handle_quiz(
    State(state): State<AppState>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Result<Json<QuizResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let questions = coordinator::generate_quiz(&state, request).await?;
    Ok(Json(QuizResponse { questions }))
}

async fn handle_summarize(
    State(state): State<AppState>,
    payload: Result<Json<SummaryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let notes = coordinator::summarize(&state, request).await?;
    Ok(Json(json!({ "notes": notes })))
}

async fn handle_profile_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("profileImage") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("profile").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let url = state.images.store(&file_name, &content_type, bytes).await?;
        info!(backend = state.images.backend_name(), "Profile image uploaded");
        return Ok(Json(json!({ "success": true, "imageUrl": url })));
    }

    Err(ApiError::Validation("profileImage file is required".to_string()))
}

async fn handle_contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactMessage>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(contact) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    if contact.name.trim().is_empty() || contact.email.trim().is_empty() || contact.message.trim().is_empty() {
        return Err(ApiError::Validation("name, email and message are required".to_string()));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| ApiError::Configuration("Contact email is not configured".to_string()))?;
    mailer.send_contact(&contact).await?;
    Ok(Json(json!({ "success": true })))
}

async fn list_sessions(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut sessions = state.sessions.list_sessions().await?;
    sessions.sort();
    Ok(Json(json!({ "sessions": sessions })))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let turns = state.sessions.get_history(&id).await?;
    Ok(Json(SessionResponse { session_id: id, turns }))
}

async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let _guard = state.session_locks.lock(&id).await;
    let existed = state.sessions.delete_session(&id).await?;
    debug!(session_id = %id, existed, "Deleted session");
    Ok(StatusCode::NO_CONTENT)
}
