use studymate_core::{ChatTurn, ProviderConfig, ProviderResult};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::extraction::{self, UploadedFile};
use crate::http_server::AppState;
use crate::moderation::moderate_content;
use crate::prompt::RequestContext;
use crate::quiz::{self, QuizQuestion, QuizRequest};
use crate::session::SessionStore;
use crate::summary::{self, SummaryRequest};

/// A normalized chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// When set, history comes from (and the exchange goes to) the session store
    pub session_id: Option<String>,
    pub user_message: String,
    /// History supplied by the caller; ignored when `session_id` is set
    pub messages: Vec<ChatTurn>,
    pub config: ProviderConfig,
    pub files: Vec<UploadedFile>,
    pub context: RequestContext,
}

#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub result: ProviderResult,
    pub session_id: Option<String>,
}

/// Rejects text that trips the content screen
fn screen(text: &str) -> Result<(), ApiError> {
    let verdict = moderate_content(text);
    match verdict.reason {
        Some(reason) if !verdict.allowed => {
            warn!(reason = %reason, "Blocked request by content policy");
            Err(ApiError::ContentBlocked(reason))
        }
        _ => Ok(()),
    }
}

/// Process a single chat message from the user
pub async fn process_chat(state: &AppState, request: ChatRequest) -> Result<ChatOutcome, ApiError> {
    let user_message = request.user_message.trim().to_string();
    if user_message.is_empty() {
        return Err(ApiError::Validation("userMessage is required".to_string()));
    }
    screen(&user_message)?;

    let files = extraction::extract_all(&request.files).await;

    let session_id = request
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());

    // Held until the exchange is stored so turns of one session never interleave
    let _guard = match &session_id {
        Some(id) => Some(state.session_locks.lock(id).await),
        None => None,
    };

    let history = match &session_id {
        Some(id) => state.sessions.get_history(id).await?,
        None => request.messages,
    };
    debug!(
        session_id = session_id.as_deref().unwrap_or("-"),
        history_turns = history.len(),
        files = files.len(),
        "Building chat prompt"
    );

    let messages = state.prompts.build_prompt(
        &user_message,
        &history,
        &files,
        &request.config,
        &request.context,
    );

    let result = state.gateway.complete(&messages, &request.config).await?;
    info!(
        provider = %result.provider,
        provider_used = %result.provider_used,
        "Chat completed"
    );

    if let Some(id) = &session_id {
        state
            .sessions
            .append_all(
                id,
                vec![ChatTurn::user(user_message), ChatTurn::assistant(result.text.clone())],
            )
            .await?;
    }

    Ok(ChatOutcome { result, session_id })
}

/// Generate multiple-choice questions about a topic
pub async fn generate_quiz(state: &AppState, request: QuizRequest) -> Result<Vec<QuizQuestion>, ApiError> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::Validation("topic is required".to_string()));
    }
    screen(topic)?;

    let count = request.question_count();
    let prompt = quiz::build_quiz_prompt(topic, request.difficulty(), count);
    let result = state.gateway.complete(&prompt, &quiz::quiz_settings()).await?;

    let mut questions = quiz::parse_quiz(&result.text);
    if questions.is_empty() {
        return Err(ApiError::Upstream(format!(
            "{} returned no usable quiz questions",
            result.provider
        )));
    }
    questions.truncate(count);
    Ok(questions)
}

/// Turn submitted material into study notes
pub async fn summarize(state: &AppState, request: SummaryRequest) -> Result<String, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::Validation("text is required".to_string()));
    }
    screen(&request.text)?;

    let prompt = summary::build_summary_prompt(
        &request.text,
        request.style(),
        state.config.prompt.summary_input_chars,
    );
    let result = state
        .gateway
        .complete(&prompt, &summary::summary_settings())
        .await?;
    Ok(result.text)
}
