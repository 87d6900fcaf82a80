use std::time::Duration;

use studymate_core::{
    classify, create_provider, ChatTurn, ClientResult, ProviderConfig, ProviderError, ProviderRef,
    ProviderResult, ProviderSlot, ProvidersConfig,
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("no AI provider configured")]
    NotConfigured,

    #[error("{provider}: {source}")]
    Upstream {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

/// Routes completions to the primary provider, switching to the fallback
/// once when the primary fails for a credential or quota reason.
pub struct ProviderGateway {
    primary: Option<ProviderRef>,
    fallback: Option<ProviderRef>,
    timeout: Duration,
}

impl ProviderGateway {
    pub fn new(primary: Option<ProviderRef>, fallback: Option<ProviderRef>, timeout: Duration) -> Self {
        Self {
            primary,
            fallback,
            timeout,
        }
    }

    /// Builds the gateway from configuration; slots without a key stay empty
    pub fn from_config(config: &ProvidersConfig) -> ClientResult<Self> {
        let primary = match &config.primary {
            Some(settings) => create_provider(settings)?,
            None => None,
        };
        let fallback = match &config.fallback {
            Some(settings) => create_provider(settings)?,
            None => None,
        };

        if primary.is_none() && fallback.is_none() {
            warn!("No AI provider has an API key; completion requests will fail");
        }
        Ok(Self::new(primary, fallback, Duration::from_secs(config.timeout_secs)))
    }

    pub fn has_provider(&self) -> bool {
        self.primary.is_some() || self.fallback.is_some()
    }

    async fn call(&self, provider: &ProviderRef, messages: &[ChatTurn], temperature: f32) -> ClientResult<String> {
        match tokio::time::timeout(self.timeout, provider.complete(messages, temperature)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Completes `messages` with at most one primary and one fallback call
    pub async fn complete(
        &self,
        messages: &[ChatTurn],
        config: &ProviderConfig,
    ) -> Result<ProviderResult, GatewayError> {
        let temperature = config.temperature();

        if let Some(primary) = &self.primary {
            debug!(provider = primary.provider_name(), "Trying primary provider");
            match self.call(primary, messages, temperature).await {
                Ok(text) => {
                    return Ok(ProviderResult {
                        text,
                        provider_used: ProviderSlot::Primary,
                        provider: primary.provider_name().to_string(),
                    })
                }
                Err(e) => {
                    let category = classify(&e);
                    if !category.is_fallback_eligible() {
                        warn!(provider = primary.provider_name(), error = %e, "Primary provider failed");
                        return Err(GatewayError::Upstream {
                            provider: primary.provider_name().to_string(),
                            source: e,
                        });
                    }
                    info!(
                        provider = primary.provider_name(),
                        category = ?category,
                        error = %e,
                        "Primary provider rejected the request, switching to fallback"
                    );
                }
            }
        }

        let fallback = self.fallback.as_ref().ok_or(GatewayError::NotConfigured)?;
        debug!(provider = fallback.provider_name(), "Trying fallback provider");
        match self.call(fallback, messages, temperature).await {
            Ok(text) => Ok(ProviderResult {
                text,
                provider_used: ProviderSlot::Fallback,
                provider: fallback.provider_name().to_string(),
            }),
            Err(e) => {
                warn!(provider = fallback.provider_name(), error = %e, "Fallback provider failed");
                Err(GatewayError::Upstream {
                    provider: fallback.provider_name().to_string(),
                    source: e,
                })
            }
        }
    }
}
