use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// Observer events produced by a running session.
///
/// Events fire zero or more times, driven by the runtime, unordered relative
/// to the setup sequence. Arrival order of data-channel messages is preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The data channel reached the open state.
    ChannelOpen { label: String },
    /// A raw text message arrived on the data channel.
    ChannelMessage { text: String },
    /// Transcript text extracted from a data-channel message.
    Transcript { text: String, is_final: bool },
    /// A remote audio track started playing.
    RemoteTrackStarted { codec: String },
    /// The peer connection changed state.
    StateChanged(RTCPeerConnectionState),
    /// The session was closed by the local side.
    Closed,
}

/// Cloneable sender half handed to every observer callback.
#[derive(Clone)]
pub struct EventSink {
    tx: UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }

    pub fn emit_channel_open(&self, label: &str) {
        self.emit(SessionEvent::ChannelOpen {
            label: label.to_owned(),
        });
    }

    pub fn emit_message(&self, text: String) {
        self.emit(SessionEvent::ChannelMessage { text });
    }

    pub fn emit_transcript(&self, text: String, is_final: bool) {
        self.emit(SessionEvent::Transcript { text, is_final });
    }

    pub fn emit_state(&self, state: RTCPeerConnectionState) {
        self.emit(SessionEvent::StateChanged(state));
    }

    pub fn emit_closed(&self) {
        self.emit(SessionEvent::Closed);
    }
}

/// Creates the event pipe: one sink for the observers, one receiver for the
/// session consumer.
pub fn channel() -> (EventSink, UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emit_order() {
        let (sink, mut rx) = channel();
        sink.emit_channel_open("realtime-channel");
        sink.emit_message("first".into());
        sink.emit_message("second".into());
        sink.emit_closed();

        assert_eq!(
            rx.recv().await,
            Some(SessionEvent::ChannelOpen {
                label: "realtime-channel".into()
            })
        );
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
        assert_eq!(rx.recv().await, Some(SessionEvent::Closed));
    }

    #[test]
    fn emit_after_receiver_dropped_is_silent() {
        let (sink, rx) = channel();
        drop(rx);
        sink.emit_closed();
    }
}
