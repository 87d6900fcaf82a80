use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{ProviderKind, ProviderSettings};
use crate::errors::{ClientResult, ProviderError};
use crate::gemini::GeminiClient;
use crate::openai_compat::OpenAiCompatClient;
use crate::types::ChatTurn;

/// Common trait for all hosted completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Completes the conversation; the first turn may be a system turn
    async fn complete(&self, messages: &[ChatTurn], temperature: f32) -> ClientResult<String>;

    /// Provider name (for logging and the `usage` block of responses)
    fn provider_name(&self) -> &'static str;

    fn model_name(&self) -> String;
}

/// Type alias for shared provider trait objects
pub type ProviderRef = Arc<dyn CompletionProvider>;

/// Builds the HTTP client shared by the provider implementations
/// Connect timeout of the shared client; the only timeout reqwest enforces here
pub(crate) const CONNECT_TIMEOUT_SECS: u64 = 10;

pub(crate) fn build_http_client() -> ClientResult<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| ProviderError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Creates a provider client for a configured slot.
///
/// Returns `Ok(None)` when the slot has no credential, so callers can treat
/// an absent key the same as an absent slot.
pub fn create_provider(settings: &ProviderSettings) -> ClientResult<Option<ProviderRef>> {
    if !settings.has_credential() {
        debug!(provider = settings.kind.name(), "No API key configured");
        return Ok(None);
    }

    let client: ProviderRef = match settings.kind {
        ProviderKind::Gemini => Arc::new(GeminiClient::new(settings)?),
        ProviderKind::Groq | ProviderKind::Together => Arc::new(OpenAiCompatClient::new(settings)?),
    };

    info!(
        provider = client.provider_name(),
        model = %client.model_name(),
        "Created completion provider"
    );
    Ok(Some(client))
}

/// Extracts the key from a slot, rejecting empty values
pub(crate) fn require_api_key(settings: &ProviderSettings) -> ClientResult<String> {
    settings
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::ConfigError(format!(
                "API key is required for {}",
                settings.kind.name()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_yields_no_provider() {
        let settings = ProviderSettings::new(ProviderKind::Groq);
        assert!(create_provider(&settings).unwrap().is_none());

        let mut blank = ProviderSettings::new(ProviderKind::Gemini);
        blank.api_key = Some("   ".to_string());
        assert!(create_provider(&blank).unwrap().is_none());
    }

    #[test]
    fn test_factory_picks_client_by_kind() {
        let mut settings = ProviderSettings::new(ProviderKind::Together);
        settings.api_key = Some("key".to_string());
        let provider = create_provider(&settings).unwrap().unwrap();
        assert_eq!(provider.provider_name(), "together");

        settings.kind = ProviderKind::Gemini;
        let provider = create_provider(&settings).unwrap().unwrap();
        assert_eq!(provider.provider_name(), "gemini");
        assert_eq!(provider.model_name(), "gemini-2.0-flash");
    }
}
