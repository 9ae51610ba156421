use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info, warn};

use crate::config::{Secret, SessionConfig};
use crate::error::{Result, SessionError};
use crate::peer::types::EphemeralSession;

/// One-shot HTTP signaling against the realtime endpoints.
///
/// Two requests exist in total: an optional JSON POST that mints a short-lived
/// ephemeral key, and exactly one `application/sdp` POST that exchanges the
/// offer for an answer. No timeouts beyond client defaults, no retries.
pub struct SignalingClient {
    http: reqwest::Client,
}

impl SignalingClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Mints a realtime session and returns its id plus the ephemeral bearer
    /// key (valid for roughly a minute).
    pub async fn mint_ephemeral_key(
        &self,
        config: &SessionConfig,
        api_key: &Secret,
    ) -> Result<EphemeralSession> {
        let url = config.sessions_url();
        debug!(%url, "minting ephemeral session");

        let response = self
            .http
            .post(&url)
            .header("api-key", api_key.expose())
            .json(&serde_json::json!({
                "model": config.deployment,
                "voice": config.voice,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::SessionRejected { status, body });
        }

        let session: EphemeralSession = response.json().await?;
        info!(session_id = %session.id, "ephemeral session minted");
        Ok(session)
    }

    /// Submits the local offer SDP and returns the response body as answer
    /// SDP text.
    ///
    /// The body is passed through regardless of HTTP status: a failure
    /// response is handed to the caller as if it were SDP and fails at the
    /// set-remote-description step instead. Likely unintended upstream, kept
    /// deliberately; a warning is logged so the real cause is visible.
    pub async fn exchange_offer(
        &self,
        url: &str,
        bearer: &Secret,
        offer_sdp: String,
    ) -> Result<String> {
        debug!(%url, offer_len = offer_sdp.len(), "posting SDP offer");

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", bearer.expose()))
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer_sdp)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "SDP exchange returned non-success status, passing body through");
        }
        let answer = response.text().await?;
        debug!(answer_len = answer.len(), "received answer SDP");
        Ok(answer)
    }
}

impl Default for SignalingClient {
    fn default() -> Self {
        Self::new()
    }
}
