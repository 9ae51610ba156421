//! Audio capture, playback and the PCMU wire codec.

pub mod capture;
pub mod g711;
pub mod playback;
pub mod resample;

use tokio::sync::mpsc::Sender;

use crate::error::Result;

pub use capture::CpalInput;
pub use playback::CpalOutput;
pub use resample::MonoResampler;

/// Sample rate of the negotiated PCMU tracks.
pub const WIRE_SAMPLE_RATE: u32 = 8_000;

/// Microphone side of a session.
pub trait AudioInput: Send {
    /// Starts capture and returns the device sample rate. Mono f32 chunks
    /// are delivered on `tx`; chunks are dropped when the consumer lags.
    fn start(&mut self, tx: Sender<Vec<f32>>) -> Result<u32>;

    fn stop(&mut self);
}

/// Speaker side of a session.
pub trait AudioOutput: Send {
    /// Starts playback and returns the device sample rate together with the
    /// sink remote audio is written to.
    fn start(&mut self) -> Result<(u32, Box<dyn AudioSink>)>;

    fn stop(&mut self);
}

/// Destination for decoded remote audio, already at the device rate.
pub trait AudioSink: Send {
    fn write(&mut self, samples: &[f32]);
}
