use reqwest::StatusCode;

/// Errors surfaced by session setup and teardown.
///
/// Setup is a strict forward sequence; the first failing step aborts the
/// whole sequence and nothing after it runs.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("audio device error: {0}")]
    Audio(String),

    #[error("signaling request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session endpoint rejected the request ({status}): {body}")]
    SessionRejected { status: StatusCode, body: String },

    #[error("webrtc error: {0}")]
    WebRtc(#[from] webrtc::Error),

    #[error("sdp error: {0}")]
    Sdp(String),

    #[error("data channel is closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
