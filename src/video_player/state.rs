// SPDX-License-Identifier: MPL-2.0
//! Playback state machine and frame synchronizer.
//!
//! [`VideoPlayer`] owns one playback session at a time: a decode engine, an
//! optional audio feed and the per-session clock. The host calls
//! [`VideoPlayer::update`] once per rendered frame; each call advances the
//! target position (from the audio device when one is active, from the wall
//! clock otherwise) and pulls decoded frames up to it, uploading the newest
//! into the presentation texture.

use super::audio_output::{AudioFeed, AudioFeedFactory};
use super::decoder::{DecodeEngine, EngineFactory, StreamInfo, VideoPull};
use super::source::{MediaSource, ReaderStats};
use super::sync::{Clock, PlaybackClock, SystemClock};
use super::texture::{FrameSink, TextureBackend, TextureFilter};
use super::Volume;
use crate::config::PlayerConfig;
use crate::error::{Error, Result, VideoError};

/// Timestamps closer than this are the same presentation instant.
const PTS_EPSILON: f64 = 1e-6;

/// Lifecycle of a [`VideoPlayer`].
///
/// State transitions:
/// - `Idle` → `Loading` (load)
/// - `Loading` → `Ready` (source opened) or `Idle` (open failed)
/// - `Ready` → `Playing` (play)
/// - `Playing` ⇄ `Paused` (pause / resume)
/// - `Playing` → `Stopped` (end of a non-looping stream, or stop)
/// - `Stopped` → `Loading` (load, or play with a previous source)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No source loaded.
    #[default]
    Idle,

    /// A source is being opened.
    Loading,

    /// Source opened, waiting for `play()`.
    Ready,

    /// Frames are advancing on every `update()`.
    Playing,

    /// Position frozen; the session stays open.
    Paused,

    /// Playback ended or was stopped. The session is gone but the last
    /// source is remembered so `play()` can start it over.
    Stopped,
}

/// Outcome of one [`VideoPlayer::update`] tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUpdate {
    /// The player is not in the `Playing` state.
    NotPlaying,
    /// The presented frame is still current.
    NoNewFrame,
    /// A new frame was uploaded to the texture.
    NewFrame,
    /// The decoder handed back the frame already on screen.
    FrameRepeated,
    /// The stream ended and the player stopped.
    Finished,
    /// The stream ended and looping re-opened it from the start.
    Restarted,
}

impl FrameUpdate {
    /// Whether the texture changed and the host should redraw.
    #[must_use]
    pub fn has_new_frame(self) -> bool {
        self == Self::NewFrame
    }
}

/// Everything that lives for one opened source.
struct Session {
    source: MediaSource,
    engine: Box<dyn DecodeEngine>,
    info: StreamInfo,
    audio: Option<Box<dyn AudioFeed>>,
    clock: PlaybackClock,
    /// Raw timestamp of the frame on screen, `None` before the first one.
    shown_pts: Option<f64>,
    /// End of stream was reached on a tick that also uploaded a frame.
    pending_end: bool,
    reader: ReaderStats,
}

impl Session {
    fn close(mut self) {
        if let Some(mut audio) = self.audio.take() {
            audio.stop();
        }
        self.engine.dispose();
        log::info!(
            "closed {} after reading {} bytes",
            self.source,
            self.reader.bytes_read()
        );
    }
}

type SizeCallback = Box<dyn FnMut(u32, u32)>;
type CompletionCallback = Box<dyn FnMut(&MediaSource)>;

/// Pull-based video player synchronizing decoded frames to a master clock.
pub struct VideoPlayer<B: TextureBackend> {
    engines: Box<dyn EngineFactory>,
    audio_factory: Option<Box<dyn AudioFeedFactory>>,
    sink: FrameSink<B>,
    clock: Box<dyn Clock>,
    config: PlayerConfig,
    state: PlaybackState,
    session: Option<Session>,
    last_source: Option<MediaSource>,
    volume: Volume,
    looping: bool,
    /// `play()` arrived before the source was ready.
    play_requested: bool,
    on_video_size: Option<SizeCallback>,
    on_completion: Option<CompletionCallback>,
}

impl<B: TextureBackend> VideoPlayer<B> {
    /// Creates a player driven by the system monotonic clock.
    ///
    /// Without an audio factory every session runs on the wall clock.
    pub fn new(
        engines: Box<dyn EngineFactory>,
        audio: Option<Box<dyn AudioFeedFactory>>,
        backend: B,
        config: PlayerConfig,
    ) -> Self {
        Self::with_clock(engines, audio, backend, config, Box::new(SystemClock::new()))
    }

    /// Creates a player reading time from `clock`.
    pub fn with_clock(
        engines: Box<dyn EngineFactory>,
        audio: Option<Box<dyn AudioFeedFactory>>,
        backend: B,
        config: PlayerConfig,
        clock: Box<dyn Clock>,
    ) -> Self {
        let config = config.sanitized();
        Self {
            engines,
            audio_factory: audio,
            sink: FrameSink::new(backend, config.min_filter, config.mag_filter),
            clock,
            state: PlaybackState::Idle,
            session: None,
            last_source: None,
            volume: Volume::new(config.volume),
            looping: config.looping,
            play_requested: false,
            on_video_size: None,
            on_completion: None,
            config,
        }
    }

    /// Opens `source`, replacing any current session.
    ///
    /// On success the player is `Ready`, or `Playing` if `play()` was
    /// called while the source was loading.
    ///
    /// # Errors
    ///
    /// Returns `VideoError::SourceNotFound` without touching the current
    /// session when the source does not exist. Any other open failure
    /// leaves the player `Idle` with no session.
    pub fn load(&mut self, source: MediaSource) -> Result<()> {
        if !source.exists() {
            log::error!("source not found: {source}");
            self.play_requested = false;
            return Err(Error::Video(VideoError::SourceNotFound(source.name())));
        }

        self.close_session();
        self.sink.release();
        self.state = PlaybackState::Loading;
        log::info!("loading {source}");

        match self.open_session(&source) {
            Ok(session) => {
                let (width, height) = (session.info.width, session.info.height);
                self.session = Some(session);
                self.last_source = Some(source);
                self.state = PlaybackState::Ready;
                if let Some(callback) = self.on_video_size.as_mut() {
                    callback(width, height);
                }
                if self.play_requested {
                    self.start_playing();
                }
                Ok(())
            }
            Err(err) => {
                log::error!("failed to open {source}: {err}");
                self.state = PlaybackState::Idle;
                self.play_requested = false;
                Err(err)
            }
        }
    }

    /// Loads `source` and starts playing it.
    ///
    /// # Errors
    ///
    /// See [`VideoPlayer::load`].
    pub fn play_source(&mut self, source: MediaSource) -> Result<()> {
        self.play_requested = true;
        self.load(source)
    }

    /// Starts or resumes playback.
    ///
    /// Before a source is ready the request is remembered and applied once
    /// loading completes. From `Stopped` the last source starts over.
    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Ready => self.start_playing(),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Playing => {}
            PlaybackState::Idle | PlaybackState::Loading => self.play_requested = true,
            PlaybackState::Stopped => {
                if let Some(source) = self.last_source.clone() {
                    if let Err(err) = self.play_source(source) {
                        log::warn!("could not restart playback: {err}");
                    }
                }
            }
        }
    }

    fn start_playing(&mut self) {
        self.play_requested = false;
        if self.session.is_some() {
            self.state = PlaybackState::Playing;
        }
    }

    /// Advances playback by one tick.
    ///
    /// Call once per rendered frame. Frames are pulled from the decoder
    /// until the presented one reaches the target position, at most
    /// `max_frames_per_tick` per call.
    pub fn update(&mut self) -> FrameUpdate {
        if self.state != PlaybackState::Playing {
            return FrameUpdate::NotPlaying;
        }
        let now = self.clock.now();
        let max_pulls = self.config.max_frames_per_tick;
        let Some(session) = self.session.as_mut() else {
            return FrameUpdate::NotPlaying;
        };
        if session.pending_end {
            return self.end_of_stream();
        }

        if !session.clock.is_started() {
            session.clock.start(now);
            if let Some(audio) = session.audio.as_mut() {
                audio.play();
            }
        }
        let audio_position = session.audio.as_ref().map(|audio| audio.position_secs());
        let target = session.clock.tick(now, audio_position);

        let mut outcome = FrameUpdate::NoNewFrame;
        let mut ended = false;
        for _ in 0..max_pulls {
            if session.shown_pts.is_some()
                && session.engine.current_frame_timestamp() + PTS_EPSILON >= target
            {
                break;
            }
            match session.engine.next_video_frame() {
                VideoPull::Frame(frame) => {
                    let pts = frame.pts();
                    if session.shown_pts == Some(pts) {
                        if outcome != FrameUpdate::NewFrame {
                            outcome = FrameUpdate::FrameRepeated;
                        }
                        break;
                    }
                    let info = session.info;
                    if let Err(err) =
                        self.sink
                            .upload(frame.pixels(), info.buffer_width, info.height)
                    {
                        log::warn!("frame upload failed: {err}");
                        break;
                    }
                    session.shown_pts = Some(pts);
                    outcome = FrameUpdate::NewFrame;
                }
                VideoPull::NotReady => break,
                VideoPull::EndOfStream => {
                    ended = true;
                    break;
                }
            }
        }

        if !ended {
            return outcome;
        }
        if outcome == FrameUpdate::NewFrame {
            // Report the last frame now; finish or loop on the next tick.
            session.pending_end = true;
            return outcome;
        }
        self.end_of_stream()
    }

    fn end_of_stream(&mut self) -> FrameUpdate {
        let Some(session) = self.session.take() else {
            return FrameUpdate::NotPlaying;
        };
        let source = session.source.clone();
        let geometry = (session.info.width, session.info.height);
        session.close();

        if self.looping {
            match self.open_session(&source) {
                Ok(session) => {
                    let size = (session.info.width, session.info.height);
                    self.session = Some(session);
                    if size != geometry {
                        if let Some(callback) = self.on_video_size.as_mut() {
                            callback(size.0, size.1);
                        }
                    }
                    log::debug!("looping {source}");
                    return FrameUpdate::Restarted;
                }
                Err(err) => log::error!("failed to re-open {source} for looping: {err}"),
            }
        }

        self.state = PlaybackState::Stopped;
        log::info!("finished {source}");
        if let Some(callback) = self.on_completion.as_mut() {
            callback(&source);
        }
        FrameUpdate::Finished
    }

    /// Freezes playback at the current position.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.clock.pause();
            if let Some(audio) = session.audio.as_mut() {
                audio.pause();
            }
        }
        self.state = PlaybackState::Paused;
    }

    /// Continues from exactly where `pause()` left off.
    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            session.clock.resume(now);
            // Before the first tick the device is started by update().
            if session.clock.is_started() {
                if let Some(audio) = session.audio.as_mut() {
                    audio.play();
                }
            }
        }
        self.state = PlaybackState::Playing;
    }

    /// Ends the session and releases its decoder, audio device and texture.
    pub fn stop(&mut self) {
        self.close_session();
        self.sink.release();
        self.play_requested = false;
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Releases everything and forgets the last source. Safe to call any
    /// number of times.
    pub fn dispose(&mut self) {
        self.stop();
        self.last_source = None;
        self.state = PlaybackState::Idle;
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    fn open_session(&mut self, source: &MediaSource) -> Result<Session> {
        let mut engine = self.engines.create()?;
        let reader = source.open(self.config.read_buffer_bytes)?;
        let stats = reader.stats();
        let audio_output = self
            .audio_factory
            .as_ref()
            .and_then(|factory| factory.output_format());
        let opened = engine.open(reader, audio_output)?;

        let audio = match (opened.audio, self.audio_factory.as_ref()) {
            (Some(stream), Some(factory)) => {
                match factory.create(stream.format(), stream, self.volume) {
                    Ok(mut feed) => {
                        feed.set_volume(self.volume);
                        Some(feed)
                    }
                    Err(err) => {
                        log::warn!("continuing without audio: {err}");
                        None
                    }
                }
            }
            _ => None,
        };

        log::info!(
            "opened {source}: {}x{} (buffer width {}), audio: {}",
            opened.info.width,
            opened.info.height,
            opened.info.buffer_width,
            if audio.is_some() { "yes" } else { "no" }
        );

        Ok(Session {
            source: source.clone(),
            engine,
            info: opened.info,
            audio,
            clock: PlaybackClock::new(self.config.stall_guard_secs),
            shown_pts: None,
            pending_end: false,
            reader: stats,
        })
    }

    /// The texture holding the most recent frame.
    #[must_use]
    pub fn texture(&self) -> Option<&B::Texture> {
        self.sink.current_texture()
    }

    /// Whether the decoder has a full lookahead of frames ready.
    #[must_use]
    pub fn is_buffered(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.engine.is_buffered())
    }

    /// True while frames advance on `update()`.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    fn info(&self) -> Option<StreamInfo> {
        self.session.as_ref().map(|session| session.info)
    }

    /// Display width in pixels, 0 without a session.
    #[must_use]
    pub fn video_width(&self) -> u32 {
        self.info().map_or(0, |info| info.width)
    }

    /// Display height in pixels, 0 without a session.
    #[must_use]
    pub fn video_height(&self) -> u32 {
        self.info().map_or(0, |info| info.height)
    }

    /// Pixels per row of the frame buffer, which may exceed the display
    /// width when the decoder pads rows.
    #[must_use]
    pub fn buffer_width(&self) -> u32 {
        self.info().map_or(0, |info| info.buffer_width)
    }

    /// Presentation time of the frame on screen, in milliseconds.
    #[must_use]
    pub fn current_timestamp_ms(&self) -> u64 {
        self.session
            .as_ref()
            .filter(|session| session.shown_pts.is_some())
            .map_or(0, |session| {
                let secs = session.engine.current_frame_timestamp().max(0.0);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let ms = (secs * 1000.0).round() as u64;
                ms
            })
    }

    /// Target position of the playback clock, in seconds.
    #[must_use]
    pub fn position_secs(&self) -> f64 {
        self.session
            .as_ref()
            .map_or(0.0, |session| session.clock.position())
    }

    /// Sets the audio gain. Kept across loads and loop restarts.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = Volume::new(volume);
        if let Some(audio) = self.session.as_mut().and_then(|s| s.audio.as_mut()) {
            audio.set_volume(self.volume);
        }
    }

    /// Current audio gain in 0.0–1.0.
    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume.value()
    }

    /// Restart from the beginning instead of stopping at the end.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Whether the end of the stream restarts playback.
    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Minification and magnification filters of the texture.
    pub fn set_filter(&mut self, min: TextureFilter, mag: TextureFilter) {
        self.sink.set_filter(min, mag);
    }

    /// Called with the display size whenever a source finishes loading.
    pub fn set_on_video_size(&mut self, callback: impl FnMut(u32, u32) + 'static) {
        self.on_video_size = Some(Box::new(callback));
    }

    /// Called once when a non-looping stream plays to its end.
    pub fn set_on_completion(&mut self, callback: impl FnMut(&MediaSource) + 'static) {
        self.on_completion = Some(Box::new(callback));
    }

    /// Frame sink statistics, mostly for diagnostics.
    #[must_use]
    pub fn sink(&self) -> &FrameSink<B> {
        &self.sink
    }
}

impl<B: TextureBackend> Drop for VideoPlayer<B> {
    fn drop(&mut self) {
        self.close_session();
    }
}
