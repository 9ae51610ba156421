use std::sync::mpsc as std_mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{debug, info, warn};

use crate::audio::{AudioOutput, AudioSink};
use crate::error::{Result, SessionError};

/// Ring buffer capacity in seconds of device-rate audio.
const BUFFER_SECONDS: usize = 2;

/// Speaker playback backed by cpal.
///
/// Mirrors the capture side: the stream lives on its own thread and the
/// output callback drains a lock-free ring buffer, zero-filling on underrun.
pub struct CpalOutput {
    handle: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_tx: std_mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

impl CpalOutput {
    pub fn new() -> Self {
        Self { handle: None }
    }
}

impl Default for CpalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutput for CpalOutput {
    fn start(&mut self) -> Result<(u32, Box<dyn AudioSink>)> {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(u32, HeapProd<f32>)>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("speaker-playback".into())
            .spawn(move || run_playback(ready_tx, stop_rx))
            .map_err(|e| SessionError::Audio(format!("failed to spawn playback thread: {e}")))?;

        let (sample_rate, producer) = ready_rx
            .recv()
            .map_err(|_| SessionError::Audio("playback thread exited during setup".into()))??;

        self.handle = Some(PlaybackHandle { stop_tx, join });
        Ok((sample_rate, Box::new(RingSink { producer })))
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.stop_tx.send(());
            let _ = handle.join.join();
            debug!("playback thread stopped");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

struct RingSink {
    producer: HeapProd<f32>,
}

impl AudioSink for RingSink {
    fn write(&mut self, samples: &[f32]) {
        let pushed = self.producer.push_slice(samples);
        if pushed < samples.len() {
            debug!("playback buffer full, dropped {} samples", samples.len() - pushed);
        }
    }
}

fn run_playback(
    ready_tx: std_mpsc::Sender<Result<(u32, HeapProd<f32>)>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(SessionError::Audio(
                "no output device available".into(),
            )));
            return;
        }
    };

    let supported = match device.default_output_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::Audio(format!(
                "failed to get default output config: {e}"
            ))));
            return;
        }
    };

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    info!(
        "output device {:?}: {:?}, {} Hz, {} channels",
        device.name().unwrap_or_default(),
        supported.sample_format(),
        sample_rate,
        channels
    );

    let rb = HeapRb::<f32>::new(sample_rate as usize * BUFFER_SECONDS);
    let (producer, consumer) = rb.split();

    let config: cpal::StreamConfig = supported.config();
    let err_fn = |e| warn!("output stream error: {e}");

    let mut writer = FrameWriter::new(consumer, channels);
    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| writer.fill_f32(data),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| writer.fill_i16(data),
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(SessionError::Audio(format!(
                "unsupported output sample format: {other:?}"
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(SessionError::Audio(format!(
                "failed to build output stream: {e}"
            ))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(SessionError::Audio(format!(
            "failed to start output stream: {e}"
        ))));
        return;
    }

    let _ = ready_tx.send(Ok((sample_rate, producer)));

    let _ = stop_rx.recv();
    drop(stream);
}

/// Duplicates buffered mono samples across the device channels, zero-filling
/// on underrun.
struct FrameWriter {
    consumer: HeapCons<f32>,
    channels: usize,
}

impl FrameWriter {
    fn new(consumer: HeapCons<f32>, channels: usize) -> Self {
        Self { consumer, channels }
    }

    fn fill_f32(&mut self, data: &mut [f32]) {
        for frame in data.chunks_mut(self.channels) {
            let sample = self.consumer.try_pop().unwrap_or(0.0);
            frame.fill(sample);
        }
    }

    fn fill_i16(&mut self, data: &mut [i16]) {
        for frame in data.chunks_mut(self.channels) {
            let sample = self.consumer.try_pop().unwrap_or(0.0);
            let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            frame.fill(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_writer_duplicates_mono_across_channels() {
        let rb = HeapRb::<f32>::new(16);
        let (mut producer, consumer) = rb.split();
        producer.push_slice(&[0.5, -0.5]);

        let mut writer = FrameWriter::new(consumer, 2);
        let mut data = [1.0f32; 6];
        writer.fill_f32(&mut data);
        // Two buffered frames duplicated, then underrun silence.
        assert_eq!(data, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn ring_sink_drops_overflow() {
        let rb = HeapRb::<f32>::new(4);
        let (producer, mut consumer) = rb.split();
        let mut sink = RingSink { producer };
        sink.write(&[0.1; 8]);
        let mut out = [0.0f32; 8];
        assert_eq!(consumer.pop_slice(&mut out), 4);
    }
}
