//! Realtime voice client for the Azure OpenAI Realtime API over WebRTC.
//!
//! A [`Session`] captures microphone audio, negotiates a peer connection
//! through a one-shot SDP exchange over HTTP, plays the assistant's audio
//! reply, and surfaces data-channel traffic as [`SessionEvent`]s.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::{Secret, SessionConfig};
pub use error::{Result, SessionError};
pub use events::SessionEvent;
pub use session::Session;
pub use signaling::SignalingClient;
