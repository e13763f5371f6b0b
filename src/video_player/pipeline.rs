// SPDX-License-Identifier: MPL-2.0
//! State shared between the decoder worker thread and its consumers.
//!
//! The worker writes decoded frames into a fixed ring of slots and appends
//! decoded PCM to a queue. The main thread pulls frames out of the ring and
//! the audio device callback drains the PCM queue. Nothing else crosses
//! threads.
//!
//! # Ring layout
//!
//! ```text
//!          displayed frame      pending frames         free
//!               │          ┌─────────┴─────────┐        │
//!   slots: [ (d-1)%N ] [ d%N ] ... [ (w-1)%N ] [ w%N ...]
//! ```
//!
//! `w` counts frames ever written and `d` counts frames ever pulled. The
//! worker only writes while `w - d < N - 1`, so the slot of the displayed
//! frame is never overwritten while the consumer still borrows it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Pixels and presentation time of one decoded frame.
#[derive(Debug, Default)]
pub struct FrameSlot {
    pub(crate) data: Vec<u8>,
    pub(crate) pts: f64,
}

impl FrameSlot {
    pub(crate) fn new(data: Vec<u8>, pts: f64) -> Self {
        Self { data, pts }
    }
}

/// Outcome of one consumer pull against the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RingPull {
    /// A pending frame was promoted to displayed; it lives in this slot.
    Advanced(usize),
    /// Nothing new yet; the displayed frame is still in this slot.
    Repeated(usize),
    /// No frame has been decoded yet.
    NotReady,
    /// Decoding finished and every frame has been pulled.
    Ended,
}

/// What the worker should produce next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Demand {
    pub video: bool,
    pub audio: bool,
}

impl Demand {
    pub fn any(self) -> bool {
        self.video || self.audio
    }
}

#[derive(Debug)]
struct PipelineState {
    written: u64,
    displayed: u64,
    video_ended: bool,
    audio_ended: bool,
    audio_detached: bool,
    shutdown: bool,
    pcm: VecDeque<f32>,
    pcm_target: usize,
    secs_per_sample: f64,
}

/// Synchronized ring + PCM queue. Always used behind an `Arc`.
#[derive(Debug)]
pub struct Pipeline {
    state: Mutex<PipelineState>,
    changed: Condvar,
    slots: Vec<Mutex<FrameSlot>>,
    /// Seconds added to every video timestamp, stored as `f64` bits.
    timestamp_offset: AtomicU64,
}

impl Pipeline {
    /// Creates a pipeline with `depth` frame slots. `depth` must be at least 2.
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(2);
        Self {
            state: Mutex::new(PipelineState {
                written: 0,
                displayed: 0,
                video_ended: false,
                audio_ended: true,
                audio_detached: true,
                shutdown: false,
                pcm: VecDeque::new(),
                pcm_target: 0,
                secs_per_sample: 0.0,
            }),
            changed: Condvar::new(),
            slots: (0..depth).map(|_| Mutex::new(FrameSlot::default())).collect(),
            timestamp_offset: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ----------------------------------------------------------------------
    // Worker side
    // ----------------------------------------------------------------------

    /// Enables the PCM queue for a stream with the given layout. The worker
    /// keeps roughly `queue_secs` of audio decoded ahead.
    pub(crate) fn enable_audio(&self, channels: u16, sample_rate: u32, queue_secs: f64) {
        let samples_per_sec = f64::from(channels) * f64::from(sample_rate);
        let mut state = self.lock();
        state.audio_detached = false;
        state.audio_ended = false;
        state.pcm_target = (samples_per_sec * queue_secs).ceil() as usize;
        state.secs_per_sample = if samples_per_sec > 0.0 {
            1.0 / samples_per_sec
        } else {
            0.0
        };
    }

    /// Blocks until the consumer wants more frames or audio, shutdown is
    /// requested, or `timeout` elapses. Returns `None` on shutdown.
    pub(crate) fn wait_for_demand(&self, timeout: Duration) -> Option<Demand> {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |s| {
                !s.shutdown && !Self::demand_of(s, self.slots.len()).any()
            })
            .unwrap_or_else(PoisonError::into_inner);

        if state.shutdown {
            None
        } else {
            Some(Self::demand_of(&state, self.slots.len()))
        }
    }

    fn demand_of(state: &PipelineState, depth: usize) -> Demand {
        let pending = state.written - state.displayed;
        Demand {
            video: !state.video_ended && pending < (depth as u64 - 1),
            audio: !state.audio_ended
                && !state.audio_detached
                && state.pcm.len() < state.pcm_target,
        }
    }

    /// Current demand without blocking.
    #[cfg(test)]
    pub(crate) fn demand(&self) -> Demand {
        Self::demand_of(&self.lock(), self.slots.len())
    }

    /// Writes one frame into the next free slot.
    ///
    /// Blocks while the ring is full. Returns `false` if the pipeline was
    /// shut down, in which case the frame is dropped.
    pub(crate) fn write_frame(&self, pts: f64, fill: impl FnOnce(&mut Vec<u8>)) -> bool {
        let index = {
            let state = self.lock();
            let depth = self.slots.len() as u64;
            let state = self
                .changed
                .wait_while(state, |s| !s.shutdown && s.written - s.displayed >= depth - 1)
                .unwrap_or_else(PoisonError::into_inner);
            if state.shutdown {
                return false;
            }
            (state.written % depth) as usize
        };

        {
            let mut slot = self.slots[index]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            fill(&mut slot.data);
            slot.pts = pts;
        }

        let mut state = self.lock();
        if state.shutdown {
            return false;
        }
        state.written += 1;
        self.changed.notify_all();
        true
    }

    /// Appends decoded samples. Discarded when audio is detached.
    pub(crate) fn push_pcm(&self, samples: &[f32]) {
        let mut state = self.lock();
        if state.audio_detached || state.shutdown {
            return;
        }
        state.pcm.extend(samples.iter().copied());
    }

    pub(crate) fn finish_video(&self) {
        let mut state = self.lock();
        state.video_ended = true;
        self.changed.notify_all();
    }

    pub(crate) fn finish_audio(&self) {
        let mut state = self.lock();
        state.audio_ended = true;
        self.changed.notify_all();
    }

    pub(crate) fn is_audio_wanted(&self) -> bool {
        let state = self.lock();
        !state.audio_detached && !state.audio_ended
    }

    // ----------------------------------------------------------------------
    // Consumer side
    // ----------------------------------------------------------------------

    /// Advances to the next pending frame without blocking.
    pub(crate) fn pull(&self) -> RingPull {
        let mut state = self.lock();
        let depth = self.slots.len() as u64;
        if state.written > state.displayed {
            state.displayed += 1;
            self.changed.notify_all();
            RingPull::Advanced(((state.displayed - 1) % depth) as usize)
        } else if state.video_ended || state.shutdown {
            RingPull::Ended
        } else if state.displayed > 0 {
            RingPull::Repeated(((state.displayed - 1) % depth) as usize)
        } else {
            RingPull::NotReady
        }
    }

    pub(crate) fn slot(&self, index: usize) -> MutexGuard<'_, FrameSlot> {
        self.slots[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// True when the lookahead is full, or decoding ended with frames left.
    pub fn is_buffered(&self) -> bool {
        let state = self.lock();
        let pending = state.written - state.displayed;
        pending >= self.slots.len() as u64 - 1 || (state.video_ended && pending > 0)
    }

    /// Seconds added to decoded timestamps to compensate for audio underruns.
    pub fn timestamp_offset(&self) -> f64 {
        f64::from_bits(self.timestamp_offset.load(Ordering::Acquire))
    }

    fn add_timestamp_offset(&self, secs: f64) {
        let mut current = self.timestamp_offset.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + secs).to_bits();
            match self.timestamp_offset.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Requests the worker to stop and wakes every waiter.
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shutdown = true;
        state.pcm.clear();
        self.changed.notify_all();
    }

    // ----------------------------------------------------------------------
    // Audio device side
    // ----------------------------------------------------------------------

    /// Fills `buf` with queued PCM and returns how many real samples were
    /// copied. The remainder is silence. While the audio stream is still
    /// live, the silence duration is added to the video timestamp offset so
    /// video stays aligned with what the listener actually hears.
    pub(crate) fn refill_audio(&self, buf: &mut [f32]) -> usize {
        let mut state = self.lock();
        let available = state.pcm.len().min(buf.len());
        for (dst, src) in buf.iter_mut().zip(state.pcm.drain(..available)) {
            *dst = src;
        }
        buf[available..].fill(0.0);

        let missing = buf.len() - available;
        if missing > 0 && !state.audio_ended && !state.shutdown {
            let secs = missing as f64 * state.secs_per_sample;
            drop(state);
            log::debug!("audio underrun: {missing} samples of silence");
            self.add_timestamp_offset(secs);
        } else {
            drop(state);
        }
        self.changed.notify_all();
        available
    }

    /// Stops routing audio into the queue. Already queued PCM is dropped.
    pub(crate) fn detach_audio(&self) {
        let mut state = self.lock();
        state.audio_detached = true;
        state.pcm.clear();
        self.changed.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn queued_pcm(&self) -> usize {
        self.lock().pcm.len()
    }
}
