use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, warn};
use webrtc::api::media_engine::MIME_TYPE_PCMU;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::audio::{g711, AudioSink, MonoResampler, WIRE_SAMPLE_RATE};
use crate::error::Result;
use crate::events::{EventSink, SessionEvent};

/// Samples per 20 ms PCMU packet.
const FRAME: usize = (WIRE_SAMPLE_RATE / 50) as usize;
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Attaches the captured microphone audio to the connection as a PCMU track
/// and spawns the pump that feeds it.
pub async fn add_microphone_track(
    pc: &Arc<RTCPeerConnection>,
    mut pcm_rx: Receiver<Vec<f32>>,
    capture_rate: u32,
) -> Result<()> {
    let track = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_PCMU.to_owned(),
            clock_rate: WIRE_SAMPLE_RATE,
            channels: 1,
            ..Default::default()
        },
        "audio".to_owned(),
        format!("voicewire-{}", crate::utils::random_id()),
    ));

    let rtp_sender = pc
        .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
        .await?;

    // Drain RTCP so the interceptors keep running.
    tokio::spawn(async move {
        let mut rtcp_buf = vec![0u8; 1500];
        while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
    });

    let mut resampler = MonoResampler::new(
        capture_rate,
        WIRE_SAMPLE_RATE,
        (capture_rate / 50) as usize,
    )?;

    tokio::spawn(async move {
        let mut staged: Vec<f32> = Vec::with_capacity(FRAME * 4);
        while let Some(chunk) = pcm_rx.recv().await {
            match resampler.push(&chunk) {
                Ok(resampled) => staged.extend(resampled),
                Err(e) => {
                    warn!("dropping capture chunk: {e}");
                    continue;
                }
            }
            while staged.len() >= FRAME {
                let frame: Vec<f32> = staged.drain(..FRAME).collect();
                let sample = Sample {
                    data: Bytes::from(g711::encode_f32(&frame)),
                    duration: FRAME_DURATION,
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    debug!("stopping microphone pump: {e}");
                    return;
                }
            }
        }
        debug!("capture channel closed, microphone pump done");
    });

    Ok(())
}

/// Registers the inbound media observer: the first remote audio track is
/// decoded and written to the playback sink for the rest of the session.
pub fn attach_remote_audio(
    pc: &Arc<RTCPeerConnection>,
    sink: Box<dyn AudioSink>,
    device_rate: u32,
    events: EventSink,
) {
    let slot = Arc::new(Mutex::new(Some(sink)));

    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        let events = events.clone();
        let slot = Arc::clone(&slot);
        Box::pin(async move {
            if track.kind() != RTPCodecType::Audio {
                return;
            }
            let Some(mut sink) = slot.lock().ok().and_then(|mut guard| guard.take()) else {
                debug!("ignoring additional remote track");
                return;
            };

            let codec = track.codec().capability.mime_type.clone();
            debug!("remote audio track started ({codec})");
            events.emit(SessionEvent::RemoteTrackStarted { codec });

            tokio::spawn(async move {
                let mut resampler =
                    match MonoResampler::new(WIRE_SAMPLE_RATE, device_rate, FRAME) {
                        Ok(resampler) => resampler,
                        Err(e) => {
                            warn!("cannot play remote audio: {e}");
                            return;
                        }
                    };
                while let Ok((rtp, _)) = track.read_rtp().await {
                    if rtp.payload.is_empty() {
                        continue;
                    }
                    let pcm = g711::decode_to_f32(&rtp.payload);
                    match resampler.push(&pcm) {
                        Ok(resampled) => sink.write(&resampled),
                        Err(e) => warn!("dropping remote packet: {e}"),
                    }
                }
                debug!("remote track ended");
            });
        })
    }));
}
