// SPDX-License-Identifier: MPL-2.0
//! This module handles the player's configuration, including loading and saving
//! playback preferences to a `settings.toml` file.
//!
//! # Examples
//!
//! ```no_run
//! use vidstream::config::{self, PlayerConfig};
//! use std::path::PathBuf;
//!
//! // Load existing configuration
//! let mut config = config::load().unwrap_or_default();
//!
//! // Modify a setting
//! config.looping = true;
//!
//! // Save the modified configuration
//! config::save(&config).expect("Failed to save config");
//!
//! // To load/save from a specific path (e.g., for testing)
//! let temp_dir = PathBuf::from("./temp_config_dir");
//! std::fs::create_dir_all(&temp_dir).unwrap();
//! let temp_file = temp_dir.join("test_settings.toml");
//! config::save_to_path(&config, &temp_file).expect("Failed to save to path");
//! let loaded_config = config::load_from_path(&temp_file).expect("Failed to load from path");
//! assert!(loaded_config.looping);
//! std::fs::remove_dir_all(&temp_dir).unwrap();
//! ```

mod defaults;

pub use defaults::*;

use crate::error::Result;
use crate::video_player::TextureFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "vidstream";

/// Playback preferences shared by every session a player opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial audio volume (0.0 to 1.0).
    pub volume: f32,
    /// Restart from the beginning when the stream ends.
    pub looping: bool,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    /// Depth of the decoded frame ring. Must be greater than one.
    pub lookahead_frames: usize,
    /// Interleaved samples per audio refill.
    pub audio_buffer_samples: usize,
    /// Largest wall-clock step accepted in one tick when no audio clock exists.
    pub stall_guard_secs: f64,
    /// Upper bound on frames pulled per `update()` call.
    pub max_frames_per_tick: u32,
    /// Read-ahead buffer size for the byte source.
    pub read_buffer_bytes: usize,
    /// Raise FFmpeg's own log level to debug.
    pub debug_logging: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            looping: false,
            min_filter: TextureFilter::Linear,
            mag_filter: TextureFilter::Linear,
            lookahead_frames: DEFAULT_LOOKAHEAD_FRAMES,
            audio_buffer_samples: DEFAULT_AUDIO_BUFFER_SAMPLES,
            stall_guard_secs: DEFAULT_STALL_GUARD_SECS,
            max_frames_per_tick: DEFAULT_MAX_FRAMES_PER_TICK,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            debug_logging: false,
        }
    }
}

impl PlayerConfig {
    /// Returns a copy with every numeric field clamped into its valid range.
    ///
    /// Hand-edited settings files can hold anything; the player only ever
    /// works with sanitized values.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let stall_guard_secs = if self.stall_guard_secs.is_finite() {
            self.stall_guard_secs
                .clamp(MIN_STALL_GUARD_SECS, MAX_STALL_GUARD_SECS)
        } else {
            DEFAULT_STALL_GUARD_SECS
        };
        let volume = if self.volume.is_finite() {
            self.volume.clamp(MIN_VOLUME, MAX_VOLUME)
        } else {
            DEFAULT_VOLUME
        };

        Self {
            volume,
            looping: self.looping,
            min_filter: self.min_filter,
            mag_filter: self.mag_filter,
            lookahead_frames: self
                .lookahead_frames
                .clamp(MIN_LOOKAHEAD_FRAMES, MAX_LOOKAHEAD_FRAMES),
            audio_buffer_samples: self
                .audio_buffer_samples
                .clamp(MIN_AUDIO_BUFFER_SAMPLES, MAX_AUDIO_BUFFER_SAMPLES),
            stall_guard_secs,
            max_frames_per_tick: self.max_frames_per_tick.clamp(1, MAX_FRAMES_PER_TICK),
            read_buffer_bytes: self.read_buffer_bytes.max(MIN_READ_BUFFER_BYTES),
            debug_logging: self.debug_logging,
        }
    }
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path.push(CONFIG_FILE);
        path
    })
}

pub fn load() -> Result<PlayerConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(PlayerConfig::default())
}

pub fn save(config: &PlayerConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<PlayerConfig> {
    let content = fs::read_to_string(path)?;
    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(err) => {
            log::warn!(
                "ignoring unreadable settings file {}: {}",
                path.display(),
                err
            );
            Ok(PlayerConfig::default())
        }
    }
}

pub fn save_to_path(config: &PlayerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
