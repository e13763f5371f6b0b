// SPDX-License-Identifier: MPL-2.0
//! Media player port.
//!
//! The embedding application talks to playback through [`MediaPlayer`].
//! [`VideoPlayer`] implements it with a real decoder; [`StubPlayer`] stands
//! in on targets without a decode backend so the host can compile and run
//! unchanged, with every load reporting the media as unsupported.

use super::state::{FrameUpdate, PlaybackState, VideoPlayer};
use super::texture::{TextureBackend, TextureFilter};
use super::MediaSource;
use crate::config::DEFAULT_VOLUME;
use crate::error::{Error, Result, VideoError};

/// Port for a frame-pulling media player.
///
/// # Lifecycle
///
/// 1. Call `load()` (or `play_source()`) with a media source
/// 2. Call `play()`
/// 3. Call `update()` once per rendered frame and draw `texture()` when it
///    reports a new frame
/// 4. Call `dispose()` when done
pub trait MediaPlayer {
    /// Texture handed to the renderer.
    type Texture;

    /// Opens a source.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] if the source is missing or cannot be
    /// decoded.
    fn load(&mut self, source: MediaSource) -> Result<()>;

    /// Opens a source and starts playing it.
    ///
    /// # Errors
    ///
    /// Same as [`MediaPlayer::load`].
    fn play_source(&mut self, source: MediaSource) -> Result<()>;

    fn play(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn dispose(&mut self);

    /// Advances playback by one render tick.
    fn update(&mut self) -> FrameUpdate;

    fn texture(&self) -> Option<&Self::Texture>;
    fn is_buffered(&self) -> bool;
    fn is_playing(&self) -> bool;
    fn state(&self) -> PlaybackState;
    fn video_width(&self) -> u32;
    fn video_height(&self) -> u32;
    fn buffer_width(&self) -> u32;
    fn current_timestamp_ms(&self) -> u64;
    fn position_secs(&self) -> f64;

    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;
    fn set_looping(&mut self, looping: bool);
    fn is_looping(&self) -> bool;
    fn set_filter(&mut self, min: TextureFilter, mag: TextureFilter);

    /// Registers the listener told the display size of each loaded source.
    fn set_on_video_size(&mut self, callback: Box<dyn FnMut(u32, u32)>);

    /// Registers the listener told when a non-looping source plays out.
    fn set_on_completion(&mut self, callback: Box<dyn FnMut(&MediaSource)>);
}

impl<B: TextureBackend> MediaPlayer for VideoPlayer<B> {
    type Texture = B::Texture;

    fn load(&mut self, source: MediaSource) -> Result<()> {
        VideoPlayer::load(self, source)
    }

    fn play_source(&mut self, source: MediaSource) -> Result<()> {
        VideoPlayer::play_source(self, source)
    }

    fn play(&mut self) {
        VideoPlayer::play(self);
    }

    fn pause(&mut self) {
        VideoPlayer::pause(self);
    }

    fn resume(&mut self) {
        VideoPlayer::resume(self);
    }

    fn stop(&mut self) {
        VideoPlayer::stop(self);
    }

    fn dispose(&mut self) {
        VideoPlayer::dispose(self);
    }

    fn update(&mut self) -> FrameUpdate {
        VideoPlayer::update(self)
    }

    fn texture(&self) -> Option<&B::Texture> {
        VideoPlayer::texture(self)
    }

    fn is_buffered(&self) -> bool {
        VideoPlayer::is_buffered(self)
    }

    fn is_playing(&self) -> bool {
        VideoPlayer::is_playing(self)
    }

    fn state(&self) -> PlaybackState {
        VideoPlayer::state(self)
    }

    fn video_width(&self) -> u32 {
        VideoPlayer::video_width(self)
    }

    fn video_height(&self) -> u32 {
        VideoPlayer::video_height(self)
    }

    fn buffer_width(&self) -> u32 {
        VideoPlayer::buffer_width(self)
    }

    fn current_timestamp_ms(&self) -> u64 {
        VideoPlayer::current_timestamp_ms(self)
    }

    fn position_secs(&self) -> f64 {
        VideoPlayer::position_secs(self)
    }

    fn set_volume(&mut self, volume: f32) {
        VideoPlayer::set_volume(self, volume);
    }

    fn volume(&self) -> f32 {
        VideoPlayer::volume(self)
    }

    fn set_looping(&mut self, looping: bool) {
        VideoPlayer::set_looping(self, looping);
    }

    fn is_looping(&self) -> bool {
        VideoPlayer::is_looping(self)
    }

    fn set_filter(&mut self, min: TextureFilter, mag: TextureFilter) {
        VideoPlayer::set_filter(self, min, mag);
    }

    fn set_on_video_size(&mut self, callback: Box<dyn FnMut(u32, u32)>) {
        VideoPlayer::set_on_video_size(self, callback);
    }

    fn set_on_completion(&mut self, callback: Box<dyn FnMut(&MediaSource)>) {
        VideoPlayer::set_on_completion(self, callback);
    }
}

/// Player for targets with no decode backend.
///
/// Every load fails with [`VideoError::Unsupported`]. It never produces a
/// texture and reports itself buffered so hosts waiting on buffering do
/// not hang.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPlayer {
    looping: bool,
}

impl StubPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaPlayer for StubPlayer {
    type Texture = ();

    fn load(&mut self, source: MediaSource) -> Result<()> {
        log::warn!("no decode backend available for {source}");
        Err(Error::Video(VideoError::Unsupported))
    }

    fn play_source(&mut self, source: MediaSource) -> Result<()> {
        self.load(source)
    }

    fn play(&mut self) {}
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn stop(&mut self) {}
    fn dispose(&mut self) {}

    fn update(&mut self) -> FrameUpdate {
        FrameUpdate::NotPlaying
    }

    fn texture(&self) -> Option<&()> {
        None
    }

    fn is_buffered(&self) -> bool {
        true
    }

    fn is_playing(&self) -> bool {
        false
    }

    fn state(&self) -> PlaybackState {
        PlaybackState::Idle
    }

    fn video_width(&self) -> u32 {
        0
    }

    fn video_height(&self) -> u32 {
        0
    }

    fn buffer_width(&self) -> u32 {
        0
    }

    fn current_timestamp_ms(&self) -> u64 {
        0
    }

    fn position_secs(&self) -> f64 {
        0.0
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn volume(&self) -> f32 {
        DEFAULT_VOLUME
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_filter(&mut self, _min: TextureFilter, _mag: TextureFilter) {}

    // Nothing ever loads, so neither listener can fire.
    fn set_on_video_size(&mut self, _callback: Box<dyn FnMut(u32, u32)>) {}
    fn set_on_completion(&mut self, _callback: Box<dyn FnMut(&MediaSource)>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::video_player::sync::ManualClock;
    use crate::video_player::testing::{Script, ScriptedFactory};
    use crate::video_player::texture::{CpuTexture, CpuTextureBackend};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn _assert_object_safe(_: &dyn MediaPlayer<Texture = ()>) {}

    fn clip() -> MediaSource {
        MediaSource::memory("clip.mp4", vec![1u8; 32])
    }

    /// Drives any player through a short session.
    fn drive<P: MediaPlayer>(player: &mut P, clock: &ManualClock) -> usize {
        let mut frames = 0;
        for _ in 0..10 {
            if player.update().has_new_frame() {
                frames += 1;
            }
            clock.advance(std::time::Duration::from_millis(40));
        }
        frames
    }

    #[test]
    fn stub_rejects_every_load() {
        let mut stub = StubPlayer::new();
        let err = stub.load(clip()).expect_err("stub cannot decode");
        assert!(matches!(err, Error::Video(VideoError::Unsupported)));
        assert!(stub.play_source(clip()).is_err());
    }

    #[test]
    fn stub_reports_neutral_values() {
        let mut stub = StubPlayer::new();
        stub.play();
        assert!(stub.is_buffered());
        assert!(!stub.is_playing());
        assert!(stub.texture().is_none());
        assert_eq!(stub.state(), PlaybackState::Idle);
        assert_eq!(stub.update(), FrameUpdate::NotPlaying);
        assert_eq!(stub.video_width(), 0);
        assert_eq!(stub.video_height(), 0);
        assert_eq!(stub.buffer_width(), 0);
        assert_eq!(stub.current_timestamp_ms(), 0);
        assert_eq!(drive(&mut stub, &ManualClock::new()), 0);
    }

    #[test]
    fn stub_remembers_looping() {
        let mut stub = StubPlayer::new();
        stub.set_looping(true);
        assert!(stub.is_looping());
    }

    #[test]
    fn video_player_works_through_the_port() {
        let clock = ManualClock::new();
        let (factory, _) = ScriptedFactory::new(Script::clip(1.0, 25.0));
        let mut player = VideoPlayer::with_clock(
            Box::new(factory),
            None,
            CpuTextureBackend::new(),
            PlayerConfig::default(),
            Box::new(clock.clone()),
        );

        MediaPlayer::play_source(&mut player, clip()).expect("load");
        assert_eq!(drive(&mut player, &clock), 10);
        assert!(MediaPlayer::texture(&player).is_some());
        assert_eq!(MediaPlayer::video_width(&player), 64);
    }

    #[test]
    fn listeners_registered_through_the_port_fire() {
        let clock = ManualClock::new();
        let (factory, _) = ScriptedFactory::new(Script::clip(0.2, 25.0));
        let mut player = VideoPlayer::with_clock(
            Box::new(factory),
            None,
            CpuTextureBackend::new(),
            PlayerConfig::default(),
            Box::new(clock.clone()),
        );
        let sizes = Rc::new(RefCell::new(Vec::new()));
        let finished = Rc::new(RefCell::new(Vec::new()));

        {
            let port: &mut dyn MediaPlayer<Texture = CpuTexture> = &mut player;
            let seen = Rc::clone(&sizes);
            port.set_on_video_size(Box::new(move |w, h| seen.borrow_mut().push((w, h))));
            let seen = Rc::clone(&finished);
            port.set_on_completion(Box::new(move |source: &MediaSource| {
                seen.borrow_mut().push(source.name());
            }));
            port.play_source(clip()).expect("load");
        }
        drive(&mut player, &clock);

        assert_eq!(*sizes.borrow(), vec![(64, 36)]);
        assert_eq!(*finished.borrow(), vec!["clip.mp4".to_string()]);
    }

    #[test]
    fn stub_accepts_listeners() {
        let fired = Rc::new(Cell::new(false));
        let mut stub = StubPlayer::new();
        let seen = Rc::clone(&fired);
        stub.set_on_completion(Box::new(move |_| seen.set(true)));
        let seen = Rc::clone(&fired);
        stub.set_on_video_size(Box::new(move |_, _| seen.set(true)));

        assert!(stub.play_source(clip()).is_err());
        assert_eq!(drive(&mut stub, &ManualClock::new()), 0);
        assert!(!fired.get());
    }
}
