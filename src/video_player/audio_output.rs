// SPDX-License-Identifier: MPL-2.0
//! Audio output using cpal for low-latency playback.
//!
//! The output device pulls decoded PCM straight from the session's
//! [`AudioStream`] inside the cpal callback. The feed counts the frames it
//! hands to the device; minus the device-reported output latency, that count
//! is the playback position the synchronizer uses as its master clock.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use super::decoder::{AudioFormat, AudioStream};
use super::Volume;
use crate::error::{Error, Result, VideoError};

/// Output side of a session's audio.
pub trait AudioFeed {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn set_volume(&mut self, volume: Volume);
    fn volume(&self) -> Volume;

    /// Seconds of audio the device has actually played.
    fn position_secs(&self) -> f64;
}

/// Creates one [`AudioFeed`] per session.
pub trait AudioFeedFactory {
    /// Layout the output device plays natively, asked for before the
    /// decoder opens so audio can be resampled to it. `None` keeps the
    /// stream's own rate.
    fn output_format(&self) -> Option<AudioFormat> {
        None
    }

    /// # Errors
    ///
    /// Fails if no output device can play `format`.
    fn create(
        &self,
        format: AudioFormat,
        stream: Box<dyn AudioStream>,
        volume: Volume,
    ) -> Result<Box<dyn AudioFeed>>;
}

/// Shared state between audio thread and main thread.
#[derive(Debug)]
struct SharedState {
    /// Current volume (stored as u32 bits of f32 for atomic access).
    volume_bits: AtomicU32,

    /// Pause state. Paused output is silence and does not advance position.
    paused: AtomicBool,

    /// Frames handed to the device while playing.
    frames_written: AtomicU64,

    /// Most recent callback-to-playback latency in microseconds.
    latency_us: AtomicU64,
}

impl SharedState {
    fn new(initial_volume: Volume) -> Self {
        Self {
            volume_bits: AtomicU32::new(initial_volume.value().to_bits()),
            paused: AtomicBool::new(true),
            frames_written: AtomicU64::new(0),
            latency_us: AtomicU64::new(0),
        }
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    fn set_volume(&self, volume: f32) {
        self.volume_bits.store(volume.to_bits(), Ordering::Relaxed);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    #[allow(clippy::cast_precision_loss)]
    fn position_secs(&self, sample_rate: u32) -> f64 {
        if sample_rate == 0 {
            return 0.0;
        }
        let played = self.frames_written.load(Ordering::Acquire) as f64 / f64::from(sample_rate);
        let latency = self.latency_us.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        (played - latency).max(0.0)
    }
}

/// Fills `data`, interleaved with `device_channels` per frame, from
/// `stream` through `scratch`, applies `gain`, and converts to the device
/// sample type.
///
/// A mono stream is copied to the first two device channels; channels the
/// stream does not have are silent.
fn render<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    scratch: &mut Vec<f32>,
    stream: &mut dyn AudioStream,
    gain: f32,
    device_channels: usize,
) {
    let device_channels = device_channels.max(1);
    let stream_channels = usize::from(stream.format().channels.max(1));
    let frames = data.len() / device_channels;

    scratch.resize(frames * stream_channels, 0.0);
    let chunk = stream.buffer_len().max(1);
    for block in scratch.chunks_mut(chunk) {
        stream.refill(block);
    }

    for (frame, out) in data.chunks_mut(device_channels).enumerate() {
        for (channel, sample) in out.iter_mut().enumerate() {
            let value = if channel < stream_channels.max(2) {
                let source = frame * stream_channels + channel.min(stream_channels - 1);
                scratch.get(source).copied().unwrap_or(0.0)
            } else {
                0.0
            };
            // Clamping to slightly below 1.0 prevents i16 overflow
            // (dasp's from_sample overflows at exactly 1.0 for i16).
            *sample = T::from_sample((value * gain).clamp(-1.0, 0.999_999_9));
        }
    }
}

/// [`AudioFeed`] playing through the system's default output device.
pub struct CpalAudioFeed {
    shared_state: Arc<SharedState>,
    sample_rate: u32,
    channels: u16,
    volume: Volume,
    stopped: bool,

    /// The audio stream (kept alive to maintain playback).
    stream: cpal::Stream,
}

impl CpalAudioFeed {
    /// Opens the default output device at its own channel count and the
    /// stream's sample rate, which the decoder already resampled to the
    /// device rate. The feed starts paused.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::AudioOutput`] if no output device is found, the
    /// device rejects the format, or the stream fails to start.
    pub fn new(format: AudioFormat, source: Box<dyn AudioStream>, volume: Volume) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| audio_error("No audio output device found".to_string()))?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| audio_error(format!("Failed to get audio config: {e}")))?;
        let sample_format = supported_config.sample_format();
        if supported_config.sample_rate().0 != format.sample_rate {
            log::debug!(
                "stream rate {} Hz differs from device rate {} Hz",
                format.sample_rate,
                supported_config.sample_rate().0
            );
        }

        let config = cpal::StreamConfig {
            channels: supported_config.channels(),
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared_state = Arc::new(SharedState::new(volume));
        let shared_for_stream = Arc::clone(&shared_state);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, source, shared_for_stream)?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, source, shared_for_stream)?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, source, shared_for_stream)?
            }
            other => {
                return Err(audio_error(format!(
                    "Unsupported audio sample format: {other:?}"
                )))
            }
        };

        stream
            .play()
            .map_err(|e| audio_error(format!("Failed to start audio stream: {e}")))?;

        log::info!(
            "audio output: {} ch stream on {} ch device @ {} Hz ({sample_format:?})",
            format.channels,
            config.channels,
            format.sample_rate
        );

        Ok(Self {
            shared_state,
            sample_rate: format.sample_rate,
            channels: config.channels,
            volume,
            stopped: false,
            stream,
        })
    }

    /// Builds an audio output stream for a specific sample format.
    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        mut source: Box<dyn AudioStream>,
        shared_state: Arc<SharedState>,
    ) -> Result<cpal::Stream> {
        let device_channels = usize::from(config.channels.max(1));
        let channels = device_channels as u64;
        let mut scratch: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], info: &cpal::OutputCallbackInfo| {
                    if shared_state.is_paused() {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    render(
                        data,
                        &mut scratch,
                        source.as_mut(),
                        shared_state.volume(),
                        device_channels,
                    );
                    shared_state
                        .frames_written
                        .fetch_add(data.len() as u64 / channels, Ordering::Release);

                    let timestamp = info.timestamp();
                    if let Some(latency) = timestamp.playback.duration_since(&timestamp.callback) {
                        #[allow(clippy::cast_possible_truncation)]
                        let latency_us = latency.as_micros() as u64;
                        shared_state.latency_us.store(latency_us, Ordering::Relaxed);
                    }
                },
                |err| {
                    log::warn!("Audio output error: {err}");
                },
                None,
            )
            .map_err(|e| audio_error(format!("Failed to build audio stream: {e}")))
    }

    /// Returns the output sample rate.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of device channels.
    #[must_use]
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn audio_error(message: String) -> Error {
    Error::Video(VideoError::AudioOutput(message))
}

impl AudioFeed for CpalAudioFeed {
    fn play(&mut self) {
        if self.stopped {
            return;
        }
        self.shared_state.set_paused(false);
    }

    fn pause(&mut self) {
        self.shared_state.set_paused(true);
    }

    fn stop(&mut self) {
        self.shared_state.set_paused(true);
        self.stopped = true;
        if let Err(err) = self.stream.pause() {
            log::debug!("could not pause audio stream: {err}");
        }
    }

    fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        self.shared_state.set_volume(volume.value());
    }

    fn volume(&self) -> Volume {
        self.volume
    }

    fn position_secs(&self) -> f64 {
        self.shared_state.position_secs(self.sample_rate)
    }
}

/// Creates [`CpalAudioFeed`]s on the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalAudioFeedFactory;

impl AudioFeedFactory for CpalAudioFeedFactory {
    fn output_format(&self) -> Option<AudioFormat> {
        let config = cpal::default_host()
            .default_output_device()?
            .default_output_config()
            .inspect_err(|e| log::debug!("no default audio config: {e}"))
            .ok()?;
        Some(AudioFormat {
            channels: config.channels(),
            sample_rate: config.sample_rate().0,
        })
    }

    fn create(
        &self,
        format: AudioFormat,
        stream: Box<dyn AudioStream>,
        volume: Volume,
    ) -> Result<Box<dyn AudioFeed>> {
        Ok(Box::new(CpalAudioFeed::new(format, stream, volume)?))
    }
}
