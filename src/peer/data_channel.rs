use std::sync::Arc;

use tracing::{debug, info};
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::Result;
use crate::events::EventSink;
use crate::peer::types::ChannelEvent;

/// Label of the bidirectional message channel.
pub const CHANNEL_LABEL: &str = "realtime-channel";

/// Creates the named data channel and attaches its observers. Must run
/// before the offer is created so the channel is negotiated with it.
pub async fn create_channel(
    pc: &Arc<RTCPeerConnection>,
    events: &EventSink,
) -> Result<Arc<RTCDataChannel>> {
    let dc = pc
        .create_data_channel(CHANNEL_LABEL, Some(RTCDataChannelInit::default()))
        .await?;
    attach_dc(&dc, events.clone());
    Ok(dc)
}

/// Common observer wiring for the data channel.
pub fn attach_dc(dc: &Arc<RTCDataChannel>, events: EventSink) {
    let label = dc.label().to_owned();

    dc.on_open(Box::new({
        let events = events.clone();
        let label = label.clone();
        move || {
            info!("data channel {label:?} open");
            events.emit_channel_open(&label);
            Box::pin(async {})
        }
    }));

    dc.on_message(Box::new({
        let events = events.clone();
        move |msg| {
            let text = String::from_utf8_lossy(&msg.data).into_owned();
            handle_channel_message(&text, &events);
            Box::pin(async {})
        }
    }));

    dc.on_close(Box::new(move || {
        debug!("data channel {label:?} closed");
        Box::pin(async {})
    }));
}

/// Surfaces one inbound message: always the raw text, plus a transcript
/// event when the JSON carries transcript content.
pub fn handle_channel_message(text: &str, events: &EventSink) {
    events.emit_message(text.to_owned());

    let Ok(event) = serde_json::from_str::<ChannelEvent>(text) else {
        return;
    };
    match event.kind.as_str() {
        "response.audio_transcript.delta" => {
            if let Some(delta) = event.delta {
                events.emit_transcript(delta, false);
            }
        }
        "response.audio_transcript.done" => {
            if let Some(transcript) = event.transcript {
                events.emit_transcript(transcript, true);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, SessionEvent};

    #[tokio::test]
    async fn every_message_produces_one_raw_event_in_order() {
        let (sink, mut rx) = events::channel();
        handle_channel_message("first", &sink);
        handle_channel_message("second", &sink);

        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::ChannelMessage {
                text: "first".into()
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::ChannelMessage {
                text: "second".into()
            })
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn transcript_delta_is_extracted() {
        let (sink, mut rx) = events::channel();
        let json = r#"{"type":"response.audio_transcript.delta","delta":"hel"}"#;
        handle_channel_message(json, &sink);

        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::ChannelMessage { .. })
        ));
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Transcript {
                text: "hel".into(),
                is_final: false
            })
        );
    }

    #[tokio::test]
    async fn transcript_done_is_final() {
        let (sink, mut rx) = events::channel();
        let json = r#"{"type":"response.audio_transcript.done","transcript":"hello there"}"#;
        handle_channel_message(json, &sink);

        rx.recv().await; // raw message
        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::Transcript {
                text: "hello there".into(),
                is_final: true
            })
        );
    }

    #[tokio::test]
    async fn non_json_messages_stay_raw_only() {
        let (sink, mut rx) = events::channel();
        handle_channel_message("not json at all", &sink);
        rx.recv().await;
        assert!(rx.try_recv().is_err());
    }
}
