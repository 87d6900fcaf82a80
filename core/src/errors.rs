use thiserror::Error;

/// Errors raised while talking to a hosted completion provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Response Error: {0}")]
    ResponseError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// HTTP status reported by the provider, if the failure carried one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            ProviderError::Timeout(crate::client::CONNECT_TIMEOUT_SECS)
        } else if e.is_decode() {
            ProviderError::ParsingError(e.to_string())
        } else {
            ProviderError::RequestError(e.to_string())
        }
    }
}

/// Result type for provider operations
pub type ClientResult<T> = Result<T, ProviderError>;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration value for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_reqwest_timeout_maps_to_timeout() {
        let app = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let err = client
            .post(format!("http://{}/slow", addr))
            .send()
            .await
            .unwrap_err();

        let err = ProviderError::from(err);
        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(crate::classify(&err) == crate::ErrorCategory::Other);
    }

    #[tokio::test]
    async fn test_connection_failure_is_request_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .post(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();
        assert!(matches!(ProviderError::from(err), ProviderError::RequestError(_)));
    }
}
