// SPDX-License-Identifier: MPL-2.0
//! Scripted stand-ins for the decoder and the audio device.
//!
//! These let the synchronizer be exercised tick by tick against a
//! [`ManualClock`](super::sync::ManualClock) with no media files, no
//! FFmpeg, and no sound card.

use super::audio_output::{AudioFeed, AudioFeedFactory};
use super::decoder::{
    AudioFormat, AudioStream, DecodeEngine, EngineFactory, FrameRef, OpenedStream, StreamInfo,
    VideoPull,
};
use super::pipeline::FrameSlot;
use super::source::StreamReader;
use super::sync::{Clock, ManualClock};
use super::Volume;
use crate::error::{Error, Result, VideoError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Shape of a fake stream.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub info: StreamInfo,
    /// Presentation time of each frame in decode order.
    pub frames: Vec<f64>,
    /// Frame indices the engine is "late" for: before delivering such a
    /// frame it hands out the previous one once more.
    pub late_frames: Vec<usize>,
    /// Once this many frames are out, every pull repeats the last one.
    pub stall_after: Option<usize>,
    /// Frames reported as not decoded yet before the first one arrives.
    pub not_ready_pulls: usize,
    pub fail_open: Option<VideoError>,
}

impl Script {
    /// `seconds` of video at `fps`, 64x36 with a padded 80-pixel buffer.
    pub fn clip(seconds: f64, fps: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = (seconds * fps).round() as usize;
        Self {
            info: StreamInfo {
                buffer_width: 80,
                width: 64,
                height: 36,
                audio: None,
            },
            frames: (0..count).map(|i| i as f64 / fps).collect(),
            late_frames: Vec::new(),
            stall_after: None,
            not_ready_pulls: 0,
            fail_open: None,
        }
    }

    pub fn with_audio(mut self) -> Self {
        self.info.audio = Some(AudioFormat {
            channels: 2,
            sample_rate: 48_000,
        });
        self
    }
}

/// Counters shared between a factory, its engines, and the test.
#[derive(Debug, Clone, Default)]
pub(crate) struct EngineLog {
    inner: Arc<Mutex<EngineCounts>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct EngineCounts {
    pub created: usize,
    pub opened: usize,
    pub disposed: usize,
    pub pulls: usize,
    /// Output layout passed to the most recent `open`.
    pub audio_output: Option<AudioFormat>,
}

impl EngineLog {
    pub fn counts(&self) -> EngineCounts {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut EngineCounts)) {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

pub(crate) struct ScriptedEngine {
    script: Script,
    log: EngineLog,
    opened: bool,
    disposed: bool,
    cursor: usize,
    not_ready_left: usize,
    late_served: Vec<usize>,
    slot: Mutex<FrameSlot>,
    last_pts: f64,
}

impl ScriptedEngine {
    fn new(script: Script, log: EngineLog) -> Self {
        let not_ready_left = script.not_ready_pulls;
        Self {
            script,
            log,
            opened: false,
            disposed: false,
            cursor: 0,
            not_ready_left,
            late_served: Vec::new(),
            slot: Mutex::new(FrameSlot::default()),
            last_pts: 0.0,
        }
    }

    fn repeat(&mut self) -> VideoPull<'_> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        VideoPull::Frame(FrameRef::new(slot))
    }
}

impl DecodeEngine for ScriptedEngine {
    fn open(
        &mut self,
        _reader: StreamReader,
        audio_output: Option<AudioFormat>,
    ) -> Result<OpenedStream> {
        self.log.update(|c| {
            c.opened += 1;
            c.audio_output = audio_output;
        });
        if let Some(err) = self.script.fail_open.clone() {
            return Err(Error::Video(err));
        }
        self.opened = true;

        // Same layout rule as the FFmpeg resampler.
        let mut info = self.script.info;
        info.audio = info.audio.map(|source| {
            let channels = audio_output.map_or(source.channels, |out| out.channels);
            AudioFormat {
                channels: if channels == 1 { 1 } else { 2 },
                sample_rate: audio_output.map_or(source.sample_rate, |out| out.sample_rate),
            }
        });
        let audio = info.audio.map(|format| {
            Box::new(SilentStream { format }) as Box<dyn AudioStream>
        });
        Ok(OpenedStream { info, audio })
    }

    fn next_video_frame(&mut self) -> VideoPull<'_> {
        if !self.opened || self.disposed {
            return VideoPull::EndOfStream;
        }
        self.log.update(|c| c.pulls += 1);

        if self.not_ready_left > 0 {
            self.not_ready_left -= 1;
            return VideoPull::NotReady;
        }
        if self.cursor > 0 && self.script.stall_after.is_some_and(|n| self.cursor >= n) {
            return self.repeat();
        }
        if self.cursor > 0
            && self.script.late_frames.contains(&self.cursor)
            && !self.late_served.contains(&self.cursor)
        {
            self.late_served.push(self.cursor);
            return self.repeat();
        }
        let Some(&pts) = self.script.frames.get(self.cursor) else {
            return VideoPull::EndOfStream;
        };

        #[allow(clippy::cast_possible_truncation)]
        let fill = self.cursor as u8;
        self.cursor += 1;
        self.last_pts = pts;

        let frame_bytes = self.script.info.frame_bytes();
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = FrameSlot::new(vec![fill; frame_bytes], pts);
        VideoPull::Frame(FrameRef::new(slot))
    }

    fn current_frame_timestamp(&self) -> f64 {
        self.last_pts
    }

    fn is_buffered(&self) -> bool {
        self.opened && !self.disposed
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.log.update(|c| c.disposed += 1);
        }
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

pub(crate) struct ScriptedFactory {
    pub script: Script,
    pub log: EngineLog,
}

impl ScriptedFactory {
    pub fn new(script: Script) -> (Self, EngineLog) {
        let log = EngineLog::default();
        (
            Self {
                script,
                log: log.clone(),
            },
            log,
        )
    }
}

impl EngineFactory for ScriptedFactory {
    fn create(&self) -> Result<Box<dyn DecodeEngine>> {
        self.log.update(|c| c.created += 1);
        Ok(Box::new(ScriptedEngine::new(
            self.script.clone(),
            self.log.clone(),
        )))
    }
}

struct SilentStream {
    format: AudioFormat,
}

impl AudioStream for SilentStream {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn buffer_len(&self) -> usize {
        1024
    }

    fn refill(&mut self, buf: &mut [f32]) -> usize {
        buf.fill(0.0);
        buf.len()
    }
}

/// What the fake audio device has been told, visible to tests.
#[derive(Debug, Clone, Default)]
pub(crate) struct FeedLog {
    inner: Arc<Mutex<FeedState>>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FeedState {
    pub created: usize,
    pub playing: bool,
    pub stopped: bool,
    pub volume: Option<f32>,
    /// Stream layout the device was opened with.
    pub format: Option<AudioFormat>,
    /// Played time carried over from previous play spans.
    played: Duration,
    playing_since: Option<Duration>,
}

impl FeedLog {
    pub fn state(&self) -> FeedState {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut FeedState) -> R) -> R {
        f(&mut self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Audio device whose position runs off a [`ManualClock`] while playing.
struct FakeFeed {
    clock: ManualClock,
    log: FeedLog,
    volume: Volume,
}

impl AudioFeed for FakeFeed {
    fn play(&mut self) {
        let now = self.clock.now();
        self.log.update(|s| {
            if !s.playing && !s.stopped {
                s.playing = true;
                s.playing_since = Some(now);
            }
        });
    }

    fn pause(&mut self) {
        let now = self.clock.now();
        self.log.update(|s| {
            if let Some(since) = s.playing_since.take() {
                s.played += now.saturating_sub(since);
            }
            s.playing = false;
        });
    }

    fn stop(&mut self) {
        self.pause();
        self.log.update(|s| s.stopped = true);
    }

    fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
        self.log.update(|s| s.volume = Some(volume.value()));
    }

    fn volume(&self) -> Volume {
        self.volume
    }

    fn position_secs(&self) -> f64 {
        let now = self.clock.now();
        self.log.update(|s| {
            let running = s
                .playing_since
                .map_or(Duration::ZERO, |since| now.saturating_sub(since));
            (s.played + running).as_secs_f64()
        })
    }
}

pub(crate) struct FakeFeedFactory {
    clock: ManualClock,
    log: FeedLog,
    fail: bool,
    device: Option<AudioFormat>,
}

impl FakeFeedFactory {
    pub fn new(clock: ManualClock) -> (Self, FeedLog) {
        let log = FeedLog::default();
        (
            Self {
                clock,
                log: log.clone(),
                fail: false,
                device: None,
            },
            log,
        )
    }

    /// Reports `format` as the device's native layout.
    pub fn with_device(mut self, format: AudioFormat) -> Self {
        self.device = Some(format);
        self
    }

    /// A factory whose device never opens.
    pub fn failing(clock: ManualClock) -> Self {
        Self {
            clock,
            log: FeedLog::default(),
            fail: true,
            device: None,
        }
    }
}

impl AudioFeedFactory for FakeFeedFactory {
    fn output_format(&self) -> Option<AudioFormat> {
        self.device
    }

    fn create(
        &self,
        format: AudioFormat,
        _stream: Box<dyn AudioStream>,
        volume: Volume,
    ) -> Result<Box<dyn AudioFeed>> {
        if self.fail {
            return Err(Error::Video(VideoError::AudioOutput(
                "no device".to_string(),
            )));
        }
        // Each session gets a fresh device.
        self.log.update(|s| {
            *s = FeedState {
                created: s.created + 1,
                volume: Some(volume.value()),
                format: Some(format),
                ..FeedState::default()
            };
        });
        Ok(Box::new(FakeFeed {
            clock: self.clock.clone(),
            log: self.log.clone(),
            volume,
        }))
    }
}
