// SPDX-License-Identifier: MPL-2.0
//! Streaming video playback.
//!
//! FFmpeg decodes on a worker thread into a small ring of RGB frames and an
//! audio sample queue. The host pulls frames with [`VideoPlayer::update`],
//! which keeps video locked to the audio device's playback position (or to
//! the wall clock for silent media) and uploads each new frame into a
//! texture through a [`TextureBackend`].

pub mod audio_output;
mod avio;
pub mod backend;
pub mod decoder;
pub mod library;
mod pipeline;
pub mod source;
mod state;
pub mod sync;
pub mod texture;
mod volume;
pub mod wgpu_texture;

#[cfg(test)]
pub(crate) mod testing;

pub use audio_output::{AudioFeed, AudioFeedFactory, CpalAudioFeed, CpalAudioFeedFactory};
pub use backend::{MediaPlayer, StubPlayer};
pub use decoder::{
    AudioFormat, AudioStream, DecodeEngine, EngineFactory, FfmpegDecoder, FfmpegDecoderFactory,
    FrameRef, OpenedStream, StreamInfo, VideoPull,
};
pub use library::CodecLibrary;
pub use source::{MediaSource, ReaderStats, StreamReader};
pub use state::{FrameUpdate, PlaybackState, VideoPlayer};
pub use sync::{Clock, ManualClock, PlaybackClock, SystemClock};
pub use texture::{CpuTexture, CpuTextureBackend, FrameSink, TextureBackend, TextureFilter};
pub use volume::Volume;
pub use wgpu_texture::{WgpuTexture, WgpuTextureBackend};

use crate::config::PlayerConfig;
use std::sync::Arc;

/// Creates a player backed by FFmpeg and the default audio output device.
///
/// Debug logging on `library` follows `config.debug_logging`.
pub fn create_player<B: TextureBackend>(
    library: Arc<CodecLibrary>,
    backend: B,
    config: PlayerConfig,
) -> VideoPlayer<B> {
    library.set_debug_logging(config.debug_logging);
    let engines = FfmpegDecoderFactory::new(
        library,
        config.lookahead_frames,
        config.audio_buffer_samples,
    );
    VideoPlayer::new(
        Box::new(engines),
        Some(Box::new(CpalAudioFeedFactory)),
        backend,
        config,
    )
}
