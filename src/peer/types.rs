use serde::Deserialize;

use crate::config::Secret;

/// Response to minting a realtime session.
#[derive(Debug, Deserialize)]
pub struct EphemeralSession {
    pub id: String,
    pub client_secret: ClientSecret,
}

/// The short-lived bearer key used for the SDP exchange.
#[derive(Debug, Deserialize)]
pub struct ClientSecret {
    pub value: Secret,
}

/// Loosely typed server event carried on the data channel.
///
/// The service sends many event kinds; only the transcript fields are pulled
/// out, everything else is surfaced as raw text.
#[derive(Debug, Deserialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub delta: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_session_parses_minimal_response() {
        let json = r#"{"id":"sess_1","client_secret":{"value":"ek"},"voice":"alloy"}"#;
        let session: EphemeralSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "sess_1");
        assert_eq!(session.client_secret.value.expose(), "ek");
    }

    #[test]
    fn channel_event_tolerates_unknown_fields() {
        let json = r#"{"type":"session.created","session":{"id":"s"}}"#;
        let event: ChannelEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, "session.created");
        assert!(event.delta.is_none());
        assert!(event.transcript.is_none());
    }
}
