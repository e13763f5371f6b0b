// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the pipeline. Constants are organized by category.
//!
//! # Categories
//!
//! - **Volume**: Audio feed volume settings
//! - **Lookahead**: Decoder frame queue and audio buffer sizes
//! - **Pacing**: Per-tick synchronization limits
//! - **I/O**: Byte source buffering

// ==========================================================================
// Volume Defaults
// ==========================================================================

/// Default playback volume (0.0 to 1.0).
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Minimum volume level.
pub const MIN_VOLUME: f32 = 0.0;

/// Maximum volume level.
pub const MAX_VOLUME: f32 = 1.0;

// ==========================================================================
// Lookahead Defaults
// ==========================================================================

/// Number of slots in the decoded frame ring.
///
/// One slot always stays free, so the decoder runs `N - 1` frames ahead of
/// the displayed one.
pub const DEFAULT_LOOKAHEAD_FRAMES: usize = 4;

/// Smallest usable ring: one displayed slot plus one free slot.
pub const MIN_LOOKAHEAD_FRAMES: usize = 2;

/// Upper bound on ring depth (each slot holds a full RGB frame).
pub const MAX_LOOKAHEAD_FRAMES: usize = 32;

/// Interleaved samples handed to the audio device per refill.
pub const DEFAULT_AUDIO_BUFFER_SAMPLES: usize = 1024;

/// Minimum audio refill size in samples.
pub const MIN_AUDIO_BUFFER_SAMPLES: usize = 64;

/// Maximum audio refill size in samples.
pub const MAX_AUDIO_BUFFER_SAMPLES: usize = 65_536;

/// Decoded PCM the worker keeps queued ahead of the device, in seconds.
pub const AUDIO_QUEUE_SECS: f64 = 0.5;

// ==========================================================================
// Pacing Defaults
// ==========================================================================

/// Largest wall-clock step a single tick may add to the target position.
/// Longer stalls (debugger, GC, window drag) are not caught up.
pub const DEFAULT_STALL_GUARD_SECS: f64 = 0.25;

/// Minimum stall guard in seconds.
pub const MIN_STALL_GUARD_SECS: f64 = 0.01;

/// Maximum stall guard in seconds.
pub const MAX_STALL_GUARD_SECS: f64 = 5.0;

/// Maximum frames pulled from the decoder during one tick.
pub const DEFAULT_MAX_FRAMES_PER_TICK: u32 = 8;

/// Maximum configurable frames per tick.
pub const MAX_FRAMES_PER_TICK: u32 = 120;

// ==========================================================================
// I/O Defaults
// ==========================================================================

/// Read-ahead buffer on the byte source (1 MiB).
pub const DEFAULT_READ_BUFFER_BYTES: usize = 1024 * 1024;

/// Minimum read-ahead buffer.
pub const MIN_READ_BUFFER_BYTES: usize = 4 * 1024;

/// Buffer handed to the demuxer's custom I/O context.
pub const AVIO_BUFFER_BYTES: usize = 32 * 1024;

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    assert!(MIN_VOLUME >= 0.0);
    assert!(MAX_VOLUME >= DEFAULT_VOLUME);
    assert!(DEFAULT_VOLUME >= MIN_VOLUME);

    assert!(MIN_LOOKAHEAD_FRAMES > 1);
    assert!(DEFAULT_LOOKAHEAD_FRAMES >= MIN_LOOKAHEAD_FRAMES);
    assert!(DEFAULT_LOOKAHEAD_FRAMES <= MAX_LOOKAHEAD_FRAMES);

    assert!(DEFAULT_AUDIO_BUFFER_SAMPLES >= MIN_AUDIO_BUFFER_SAMPLES);
    assert!(DEFAULT_AUDIO_BUFFER_SAMPLES <= MAX_AUDIO_BUFFER_SAMPLES);

    assert!(MIN_STALL_GUARD_SECS > 0.0);
    assert!(DEFAULT_STALL_GUARD_SECS >= MIN_STALL_GUARD_SECS);
    assert!(DEFAULT_STALL_GUARD_SECS <= MAX_STALL_GUARD_SECS);

    assert!(DEFAULT_MAX_FRAMES_PER_TICK > 0);
    assert!(DEFAULT_MAX_FRAMES_PER_TICK <= MAX_FRAMES_PER_TICK);

    assert!(DEFAULT_READ_BUFFER_BYTES >= MIN_READ_BUFFER_BYTES);
};
