// SPDX-License-Identifier: MPL-2.0
//! Codec library initialization service.
//!
//! FFmpeg must be initialized once per process before any demuxer is
//! opened. Instead of a hidden global, callers share one [`CodecLibrary`]
//! (usually as `Arc<CodecLibrary>`) and ask it to [`ensure_loaded`] before
//! decoding. The first call performs the initialization and records the
//! outcome; every later call returns that same outcome.
//!
//! [`ensure_loaded`]: CodecLibrary::ensure_loaded

use crate::error::{Error, Result, VideoError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Handle to the process's FFmpeg initialization state.
#[derive(Debug, Default)]
pub struct CodecLibrary {
    outcome: OnceLock<std::result::Result<(), String>>,
    debug_logging: AtomicBool,
}

impl CodecLibrary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes FFmpeg if it has not been initialized through this handle.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::LibraryUnavailable`] when FFmpeg fails to
    /// initialize. The failure is sticky: later calls report it again
    /// without retrying.
    pub fn ensure_loaded(&self) -> Result<()> {
        let outcome = self.outcome.get_or_init(|| {
            ffmpeg_next::init().map_err(|e| e.to_string())?;
            apply_log_level(self.debug_logging.load(Ordering::Relaxed));
            log::info!("FFmpeg initialized");
            Ok(())
        });

        outcome
            .clone()
            .map_err(|msg| Error::Video(VideoError::LibraryUnavailable(msg)))
    }

    /// Returns true once [`ensure_loaded`](Self::ensure_loaded) has succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }

    /// Switches FFmpeg's internal logging between debug and error level.
    ///
    /// Loads the library first when needed. A load failure is logged and
    /// otherwise ignored.
    pub fn set_debug_logging(&self, enabled: bool) {
        self.debug_logging.store(enabled, Ordering::Relaxed);
        match self.ensure_loaded() {
            Ok(()) => apply_log_level(enabled),
            Err(err) => log::warn!("cannot change FFmpeg log level: {err}"),
        }
    }

    #[must_use]
    pub fn debug_logging(&self) -> bool {
        self.debug_logging.load(Ordering::Relaxed)
    }
}

fn apply_log_level(debug: bool) {
    let level = if debug {
        ffmpeg_next::ffi::AV_LOG_DEBUG
    } else {
        ffmpeg_next::ffi::AV_LOG_ERROR
    };
    // SAFETY: av_log_set_level is thread-safe and only affects logging
    unsafe {
        ffmpeg_next::ffi::av_log_set_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_library_is_not_loaded() {
        let library = CodecLibrary::new();
        assert!(!library.is_loaded());
        assert!(!library.debug_logging());
    }

    #[test]
    fn ensure_loaded_is_idempotent() {
        let library = CodecLibrary::new();
        assert!(library.ensure_loaded().is_ok());
        assert!(library.is_loaded());
        assert!(library.ensure_loaded().is_ok());
    }

    #[test]
    fn set_debug_logging_loads_and_records_flag() {
        let library = CodecLibrary::new();
        library.set_debug_logging(true);
        assert!(library.is_loaded());
        assert!(library.debug_logging());
        library.set_debug_logging(false);
        assert!(!library.debug_logging());
    }
}
