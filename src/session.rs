use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::audio::{AudioInput, AudioOutput, CpalInput, CpalOutput};
use crate::config::{Secret, SessionConfig};
use crate::error::{Result, SessionError};
use crate::events::{self, EventSink, SessionEvent};
use crate::peer;
use crate::signaling::SignalingClient;

/// Capture chunks buffered between the microphone callback and the track
/// pump before chunks are dropped.
const CAPTURE_QUEUE: usize = 32;

/// One realtime voice session.
///
/// Owns the peer connection, the data channel and both audio devices. Setup
/// is an unbroken forward sequence; the only teardown path is [`Session::close`].
pub struct Session {
    pc: Arc<RTCPeerConnection>,
    dc: Arc<RTCDataChannel>,
    input: Box<dyn AudioInput>,
    output: Box<dyn AudioOutput>,
    events: EventSink,
    event_rx: Option<UnboundedReceiver<SessionEvent>>,
    session_id: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connects using the default microphone and speaker.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        Self::connect_with(
            config,
            Box::new(CpalInput::new()),
            Box::new(CpalOutput::new()),
        )
        .await
    }

    /// Connects with explicit audio endpoints.
    ///
    /// The sequence runs in strict order and the first failure aborts it:
    /// audio devices, bearer resolution, peer connection and track wiring,
    /// data channel, offer, one HTTP exchange, answer.
    pub async fn connect_with(
        config: SessionConfig,
        mut input: Box<dyn AudioInput>,
        mut output: Box<dyn AudioOutput>,
    ) -> Result<Self> {
        config.validate()?;

        let (events, event_rx) = events::channel();
        let signaling = SignalingClient::new();

        // Devices come first: a denied microphone aborts the session before
        // any network request is issued.
        let (pcm_tx, pcm_rx) = mpsc::channel(CAPTURE_QUEUE);
        let capture_rate = input.start(pcm_tx)?;
        let (playback_rate, sink) = output.start()?;

        let (bearer, session_id) = resolve_bearer(&signaling, &config).await?;

        let pc = peer::new_peer(events.clone()).await?;
        peer::track::attach_remote_audio(&pc, sink, playback_rate, events.clone());
        peer::track::add_microphone_track(&pc, pcm_rx, capture_rate).await?;

        // The channel must exist before the offer so it is negotiated with it.
        let dc = peer::create_channel(&pc, &events).await?;

        let offer = pc.create_offer(None).await?;
        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(offer).await?;
        // The one-shot HTTP exchange carries no trickle candidates, so the
        // offer must include everything.
        let _ = gather_complete.recv().await;

        let local = pc
            .local_description()
            .await
            .ok_or_else(|| SessionError::Sdp("local description missing after offer".into()))?;

        let answer_sdp = signaling
            .exchange_offer(&config.webrtc_url(), &bearer, local.sdp)
            .await?;
        let answer = RTCSessionDescription::answer(answer_sdp)?;
        pc.set_remote_description(answer).await?;

        info!("session connected");
        Ok(Self {
            pc,
            dc,
            input,
            output,
            events,
            event_rx: Some(event_rx),
            session_id,
        })
    }

    /// Takes the observer event receiver. Yields `None` after the first call.
    pub fn events(&mut self) -> Option<UnboundedReceiver<SessionEvent>> {
        self.event_rx.take()
    }

    /// Id of the minted realtime session, when one was minted.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Sends a text message over the data channel.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.dc
            .send_text(text.into())
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        Ok(())
    }

    /// Tears the session down: channel, connection, audio devices. Emits
    /// exactly one closed event.
    pub async fn close(mut self) -> Result<()> {
        let _ = self.dc.close().await;
        let _ = self.pc.close().await;
        self.input.stop();
        self.output.stop();
        self.events.emit_closed();
        info!("session closed");
        Ok(())
    }
}

/// Picks the bearer for the SDP exchange: a pre-issued ephemeral key is
/// forwarded as-is, otherwise one is minted with the standing API key.
async fn resolve_bearer(
    signaling: &SignalingClient,
    config: &SessionConfig,
) -> Result<(Secret, Option<String>)> {
    if let Some(key) = &config.ephemeral_key {
        return Ok((key.clone(), None));
    }
    let api_key = config
        .api_key
        .as_ref()
        .ok_or_else(|| SessionError::Config("no credential available".into()))?;
    let session = signaling.mint_ephemeral_key(config, api_key).await?;
    Ok((session.client_secret.value.clone(), Some(session.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioSink;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct DeniedInput;

    impl AudioInput for DeniedInput {
        fn start(&mut self, _tx: mpsc::Sender<Vec<f32>>) -> Result<u32> {
            Err(SessionError::Audio("permission denied".into()))
        }

        fn stop(&mut self) {}
    }

    struct SilentInput;

    impl AudioInput for SilentInput {
        fn start(&mut self, _tx: mpsc::Sender<Vec<f32>>) -> Result<u32> {
            Ok(48_000)
        }

        fn stop(&mut self) {}
    }

    struct NullSink;

    impl AudioSink for NullSink {
        fn write(&mut self, _samples: &[f32]) {}
    }

    struct NullOutput;

    impl AudioOutput for NullOutput {
        fn start(&mut self) -> Result<(u32, Box<dyn AudioSink>)> {
            Ok((48_000, Box::new(NullSink)))
        }

        fn stop(&mut self) {}
    }

    #[tokio::test]
    async fn denied_microphone_issues_no_network_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = SessionConfig::new(server.uri(), "deployment", "region").with_api_key("key");
        let err = Session::connect_with(config, Box::new(DeniedInput), Box::new(NullOutput))
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Audio(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_credential_fails_validation_before_anything_else() {
        let config = SessionConfig::new("https://e", "d", "r");
        let err = Session::connect_with(config, Box::new(DeniedInput), Box::new(NullOutput))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[tokio::test]
    async fn close_emits_exactly_one_closed_event() {
        let (events, mut rx) = events::channel();
        let pc = peer::new_peer(events.clone()).await.unwrap();
        let dc = peer::create_channel(&pc, &events).await.unwrap();

        let session = Session {
            pc,
            dc,
            input: Box::new(SilentInput),
            output: Box::new(NullOutput),
            events,
            event_rx: None,
            session_id: None,
        };
        session.close().await.unwrap();

        // Internal tasks may keep sink clones alive, so drain with a timeout
        // instead of waiting for the channel to close.
        let mut closed = 0;
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(500), rx.recv()).await
        {
            if event == SessionEvent::Closed {
                closed += 1;
            }
        }
        assert_eq!(closed, 1);
    }
}
