// SPDX-License-Identifier: MPL-2.0
//! `vidstream` is a pull-based streaming video decode pipeline.
//!
//! It demuxes and decodes a media file with FFmpeg on a private worker
//! thread, keeps a small ring of decoded frames ahead of presentation, feeds
//! the decoded audio to the system output device, and paces video against
//! the audio clock (or the wall clock when there is no audio track). The
//! embedding application drives everything by calling
//! [`video_player::VideoPlayer::update`] once per rendered frame.

#![doc(html_root_url = "https://docs.rs/vidstream/0.1.0")]

pub mod config;
pub mod error;
pub mod video_player;

#[cfg(test)]
pub(crate) mod test_utils;
