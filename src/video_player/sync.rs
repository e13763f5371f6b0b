// SPDX-License-Identifier: MPL-2.0
//! Audio/Video synchronization for media playback.
//!
//! Video presentation is paced against a reference position that advances
//! once per `update()` tick. When an audio feed is playing, its position is
//! the reference (audio is the master clock). Without audio, wall-clock
//! deltas between ticks advance the reference instead.
//!
//! # Synchronization Strategy
//!
//! Audio playback drives the timing because:
//! - Audio hardware free-runs on its own clock and cannot be nudged
//! - Audio discontinuities are more noticeable than video frame repeats
//! - Polling the wall clock independently of the device would drift
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐
//! │ PCM queue   │────▶│ AudioFeed    │──▶ position_secs() (master)
//! └─────────────┘     └──────────────┘           │
//!                                                │ target position
//!                                                ▼
//! ┌─────────────┐     ┌──────────────┐    ┌──────────────┐
//! │ Frame ring  │────▶│ update() pull│───▶│ FrameSink    │
//! └─────────────┘     └──────────────┘    └──────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source for the synchronizer.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Real monotonic time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests and offline rendering.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the player.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_us: Arc<AtomicU64>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward by `step`.
    #[allow(clippy::cast_possible_truncation)] // u128 microseconds won't overflow u64 for reasonable durations
    pub fn advance(&self, step: Duration) {
        self.now_us
            .fetch_add(step.as_micros() as u64, Ordering::SeqCst);
    }

    /// Jumps to an absolute time.
    #[allow(clippy::cast_possible_truncation)]
    pub fn set(&self, now: Duration) {
        self.now_us.store(now.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }
}

/// Per-session timing state.
///
/// Tracks the target presentation position the synchronizer pulls frames
/// up to. Time spent paused never reaches the target.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    /// Clock reading when the first tick latched the start.
    stream_start: Option<Duration>,
    last_tick: Option<Duration>,
    target_position: f64,
    paused: bool,
    stall_guard: Duration,
}

impl PlaybackClock {
    /// Creates a clock that accepts at most `stall_guard_secs` of wall time
    /// per tick.
    #[must_use]
    pub fn new(stall_guard_secs: f64) -> Self {
        Self {
            stream_start: None,
            last_tick: None,
            target_position: 0.0,
            paused: false,
            stall_guard: Duration::from_secs_f64(stall_guard_secs.max(0.0)),
        }
    }

    /// Latches the stream start. Later calls have no effect.
    pub fn start(&mut self, now: Duration) {
        if self.stream_start.is_none() {
            self.stream_start = Some(now);
            self.last_tick = Some(now);
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.stream_start.is_some()
    }

    #[must_use]
    pub fn stream_start(&self) -> Option<Duration> {
        self.stream_start
    }

    /// Advances the target position for one tick and returns it.
    ///
    /// `audio_position` is the output device's playback position when an
    /// audio feed is active; it replaces the target outright. Otherwise the
    /// wall time since the previous tick is added, capped at the stall guard.
    pub fn tick(&mut self, now: Duration, audio_position: Option<f64>) -> f64 {
        if self.paused {
            return self.target_position;
        }

        match audio_position {
            Some(position) => self.target_position = position,
            None => {
                let last = self.last_tick.unwrap_or(now);
                let delta = now.saturating_sub(last).min(self.stall_guard);
                self.target_position += delta.as_secs_f64();
            }
        }
        self.last_tick = Some(now);
        self.target_position
    }

    /// Freezes the target position.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Unfreezes the target position. The time spent paused is skipped, so
    /// the position continues exactly where it stopped.
    pub fn resume(&mut self, now: Duration) {
        if self.paused {
            self.paused = false;
            if self.stream_start.is_some() {
                self.last_tick = Some(now);
            }
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Current target position in seconds.
    #[must_use]
    pub fn position(&self) -> f64 {
        self.target_position
    }

    /// Returns to the unstarted state at position zero.
    pub fn reset(&mut self) {
        self.stream_start = None;
        self.last_tick = None;
        self.target_position = 0.0;
        self.paused = false;
    }
}
