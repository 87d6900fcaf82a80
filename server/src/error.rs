use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::gateway::GatewayError;
use crate::images::ImageStoreError;
use crate::mailer::MailError;
use crate::moderation::BlockReason;
use crate::session::SessionStoreError;

/// Error type for the HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Message blocked by content policy ({0})")]
    ContentBlocked(BlockReason),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Storage(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::ContentBlocked(_) => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) | ApiError::Upstream(_) | ApiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured => ApiError::Configuration(e.to_string()),
            GatewayError::Upstream { .. } => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<SessionStoreError> for ApiError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::InvalidId(_) => ApiError::Validation(e.to_string()),
            SessionStoreError::StorageError(_) => ApiError::Storage(e.to_string()),
        }
    }
}

impl From<ImageStoreError> for ApiError {
    fn from(e: ImageStoreError) -> Self {
        match e {
            ImageStoreError::UnsupportedType(_) | ImageStoreError::Empty => {
                ApiError::Validation(e.to_string())
            }
            ImageStoreError::NotConfigured(_) => ApiError::Configuration(e.to_string()),
            ImageStoreError::Io(_) | ImageStoreError::Upload(_) => ApiError::Storage(e.to_string()),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        match e {
            MailError::InvalidAddress(_) => ApiError::Validation(e.to_string()),
            MailError::NotConfigured(_) => ApiError::Configuration(e.to_string()),
            MailError::Build(_) | MailError::Transport(_) => ApiError::Storage(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = match &self {
            ApiError::ContentBlocked(reason) => json!({
                "error": self.to_string(),
                "reason": reason,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studymate_core::ProviderError;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::ContentBlocked(BlockReason::Adult).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Configuration("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Upstream("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_errors_map_to_taxonomy() {
        let api: ApiError = GatewayError::NotConfigured.into();
        assert!(matches!(api, ApiError::Configuration(ref m) if m == "no AI provider configured"));

        let api: ApiError = GatewayError::Upstream {
            provider: "groq".to_string(),
            source: ProviderError::HttpError {
                status_code: 500,
                message: "model overloaded".to_string(),
            },
        }
        .into();
        assert!(matches!(api, ApiError::Upstream(ref m) if m.contains("model overloaded")));
    }
}
