use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::audio::AudioInput;
use crate::error::{Result, SessionError};

/// Frames per chunk handed to the session pump, as a fraction of the sample
/// rate. 50 chunks per second gives 20 ms chunks.
const CHUNKS_PER_SEC: u32 = 50;

/// Microphone capture backed by cpal.
///
/// cpal streams are not `Send`, so the stream lives on its own thread and the
/// callback forwards mono f32 chunks over the session channel. Chunks are
/// dropped when the consumer lags.
pub struct CpalInput {
    handle: Option<CaptureHandle>,
}

struct CaptureHandle {
    stop_tx: std_mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

impl CpalInput {
    pub fn new() -> Self {
        Self { handle: None }
    }
}

impl Default for CpalInput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioInput for CpalInput {
    fn start(&mut self, tx: Sender<Vec<f32>>) -> Result<u32> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<u32>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture(tx, ready_tx, stop_rx))
            .map_err(|e| SessionError::Audio(format!("failed to spawn capture thread: {e}")))?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| SessionError::Audio("capture thread exited during setup".into()))??;

        self.handle = Some(CaptureHandle { stop_tx, join });
        Ok(sample_rate)
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.join();
            debug!("capture thread stopped");
        }
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture(
    tx: Sender<Vec<f32>>,
    ready_tx: std_mpsc::Sender<Result<u32>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(SessionError::Audio(
                "no input device available".into(),
            )));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::Audio(format!(
                "failed to get default input config: {e}"
            ))));
            return;
        }
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let chunk = (sample_rate / CHUNKS_PER_SEC) as usize;
    info!(
        "input device {:?}: {:?}, {} Hz, {} channels",
        device.name().unwrap_or_default(),
        supported.sample_format(),
        sample_rate,
        channels
    );

    let config: cpal::StreamConfig = supported.config();
    let err_fn = |e| warn!("input stream error: {e}");

    let mut pusher = ChunkPusher::new(tx, channels, chunk);
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| pusher.push(data),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                pusher.push(&converted);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data
                    .iter()
                    .map(|&s| (s as i32 - 32768) as f32 / 32768.0)
                    .collect();
                pusher.push(&converted);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(SessionError::Audio(format!(
                "unsupported input sample format: {other:?}"
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::Audio(format!(
                "failed to build input stream: {e}"
            ))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SessionError::Audio(format!(
            "failed to start input stream: {e}"
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(sample_rate));

    // Park until the session tears down; dropping the stream stops capture.
    let _ = stop_rx.recv();
    drop(stream);
}

/// Downmixes interleaved frames to mono and forwards fixed-size chunks.
struct ChunkPusher {
    tx: Sender<Vec<f32>>,
    channels: usize,
    chunk: usize,
    buf: Vec<f32>,
}

impl ChunkPusher {
    fn new(tx: Sender<Vec<f32>>, channels: usize, chunk: usize) -> Self {
        Self {
            tx,
            channels,
            chunk,
            buf: Vec::with_capacity(chunk),
        }
    }

    fn push(&mut self, data: &[f32]) {
        for frame in data.chunks_exact(self.channels) {
            let sum: f32 = frame.iter().sum();
            self.buf.push(sum / self.channels as f32);
            if self.buf.len() >= self.chunk {
                let full = std::mem::replace(&mut self.buf, Vec::with_capacity(self.chunk));
                // Drop the chunk if the consumer lags.
                let _ = self.tx.try_send(full);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pusher_downmixes_and_chunks() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let mut pusher = ChunkPusher::new(tx, 2, 4);
        // Two stereo frames per push; a chunk is 4 mono frames.
        pusher.push(&[0.2, 0.4, -0.2, -0.4]);
        assert!(rx.try_recv().is_err());
        pusher.push(&[1.0, 0.0, 0.0, 1.0]);
        let chunk = rx.recv().await.unwrap();
        assert_eq!(chunk.len(), 4);
        assert!((chunk[0] - 0.3).abs() < 1e-6);
        assert!((chunk[1] + 0.3).abs() < 1e-6);
        assert!((chunk[2] - 0.5).abs() < 1e-6);
        assert!((chunk[3] - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn pusher_drops_chunks_when_consumer_lags() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let mut pusher = ChunkPusher::new(tx, 1, 2);
        pusher.push(&[0.1, 0.1]);
        pusher.push(&[0.2, 0.2]); // channel full, dropped
        assert_eq!(rx.recv().await.unwrap(), vec![0.1, 0.1]);
        assert!(rx.try_recv().is_err());
    }
}
