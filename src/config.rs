use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SessionError};

/// API version used when minting a realtime session.
pub const SESSIONS_API_VERSION: &str = "2025-04-01-preview";

/// An opaque bearer credential. Never validated, never logged, wiped on drop.
#[derive(Clone, serde::Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Explicit session configuration.
///
/// Everything a session needs travels in this struct; nothing is read from
/// ambient state after construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Realtime deployment name, e.g. `gpt-4o-mini-realtime-preview`.
    pub deployment: String,
    /// Azure region hosting the realtime WebRTC endpoint, e.g. `swedencentral`.
    pub region: String,
    /// Assistant voice requested when minting a session.
    pub voice: String,
    /// Standing API key, used to mint a short-lived ephemeral key.
    pub api_key: Option<Secret>,
    /// Pre-issued ephemeral key. When present, no session is minted and this
    /// value is forwarded as the bearer token as-is.
    pub ephemeral_key: Option<Secret>,
}

impl SessionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            region: region.into(),
            voice: "alloy".into(),
            api_key: None,
            ephemeral_key: None,
        }
    }

    /// Loads configuration from the `AZURE_OPENAI_*` environment variables,
    /// reading `.env` first.
    pub fn from_env() -> Result<Self> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let endpoint = require_var("AZURE_OPENAI_ENDPOINT")?;
        let deployment = require_var("AZURE_OPENAI_DEPLOYMENT")?;
        let region = require_var("AZURE_OPENAI_REGION")?;

        let mut config = Self::new(endpoint, deployment, region);
        if let Ok(key) = std::env::var("AZURE_OPENAI_API_KEY") {
            if !key.is_empty() {
                config.api_key = Some(Secret::new(key));
            }
        }
        if let Ok(voice) = std::env::var("AZURE_OPENAI_VOICE") {
            if !voice.is_empty() {
                config.voice = voice;
            }
        }
        Ok(config)
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(key));
        self
    }

    pub fn with_ephemeral_key(mut self, key: impl Into<String>) -> Self {
        self.ephemeral_key = Some(Secret::new(key));
        self
    }

    /// A session needs either a standing API key or a pre-issued ephemeral key.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_none() && self.ephemeral_key.is_none() {
            return Err(SessionError::Config(
                "either an API key or an ephemeral key is required".into(),
            ));
        }
        Ok(())
    }

    /// URL for minting an ephemeral session.
    pub fn sessions_url(&self) -> String {
        format!(
            "{}/openai/realtimeapi/sessions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            SESSIONS_API_VERSION
        )
    }

    /// URL for the one-shot SDP offer/answer exchange.
    pub fn webrtc_url(&self) -> String {
        format!(
            "https://{}.realtimeapi-preview.ai.azure.com/v1/realtimertc?model={}",
            self.region, self.deployment
        )
    }
}

fn require_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(SessionError::Config(format!(
            "missing environment variable: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env_vars() {
        std::env::remove_var("AZURE_OPENAI_ENDPOINT");
        std::env::remove_var("AZURE_OPENAI_DEPLOYMENT");
        std::env::remove_var("AZURE_OPENAI_REGION");
        std::env::remove_var("AZURE_OPENAI_API_KEY");
        std::env::remove_var("AZURE_OPENAI_VOICE");
    }

    #[test]
    #[serial]
    fn from_env_requires_endpoint_deployment_region() {
        clear_env_vars();
        assert!(SessionConfig::from_env().is_err());

        std::env::set_var("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com");
        std::env::set_var("AZURE_OPENAI_DEPLOYMENT", "gpt-4o-mini-realtime-preview");
        assert!(SessionConfig::from_env().is_err());

        std::env::set_var("AZURE_OPENAI_REGION", "swedencentral");
        std::env::set_var("AZURE_OPENAI_API_KEY", "k-123");
        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.endpoint, "https://res.openai.azure.com");
        assert_eq!(config.deployment, "gpt-4o-mini-realtime-preview");
        assert_eq!(config.region, "swedencentral");
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.api_key.unwrap().expose(), "k-123");
        clear_env_vars();
    }

    #[test]
    fn urls_are_built_from_config() {
        let config = SessionConfig::new(
            "https://res.openai.azure.com/",
            "gpt-4o-mini-realtime-preview",
            "swedencentral",
        );
        assert_eq!(
            config.sessions_url(),
            format!(
                "https://res.openai.azure.com/openai/realtimeapi/sessions?api-version={}",
                SESSIONS_API_VERSION
            )
        );
        assert_eq!(
            config.webrtc_url(),
            "https://swedencentral.realtimeapi-preview.ai.azure.com/v1/realtimertc?model=gpt-4o-mini-realtime-preview"
        );
    }

    #[test]
    fn validate_requires_some_credential() {
        let config = SessionConfig::new("e", "d", "r");
        assert!(config.validate().is_err());
        assert!(config.clone().with_api_key("k").validate().is_ok());
        assert!(config.with_ephemeral_key("ek").validate().is_ok());
    }

    #[test]
    fn secret_debug_does_not_leak() {
        let secret = Secret::new("very-secret");
        assert_eq!(format!("{:?}", secret), "Secret(***)");
    }
}
