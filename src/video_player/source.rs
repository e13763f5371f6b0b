// SPDX-License-Identifier: MPL-2.0
//! Byte sources for the decode pipeline.
//!
//! A [`MediaSource`] names where compressed bytes come from. Opening it
//! yields a [`StreamReader`], the pull-style "fill this buffer" adapter the
//! decoder worker thread calls whenever the demuxer needs more input.
//!
//! The reader is `Send` and owned by exactly one thread at a time. The only
//! state it shares with the main thread is [`ReaderStats`], a handful of
//! atomics.

use crate::error::{Error, Result, VideoError};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Where a media stream's bytes live.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// A file on the local filesystem.
    File(PathBuf),
    /// Bytes already in memory, such as an asset compiled into the binary.
    Memory { name: String, bytes: Arc<[u8]> },
}

impl MediaSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        MediaSource::File(path.into())
    }

    pub fn memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        MediaSource::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Looks up an asset embedded with `rust-embed`.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::SourceNotFound`] if the asset folder has no
    /// entry at `path`.
    pub fn embedded<A: rust_embed::RustEmbed>(path: &str) -> Result<Self> {
        let file = A::get(path)
            .ok_or_else(|| Error::Video(VideoError::SourceNotFound(path.to_string())))?;
        Ok(Self::memory(path, file.data.into_owned()))
    }

    /// Returns true if the source can currently be opened.
    #[must_use]
    pub fn exists(&self) -> bool {
        match self {
            MediaSource::File(path) => path.is_file(),
            MediaSource::Memory { .. } => true,
        }
    }

    /// Human-readable name used in logs and notifications.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            MediaSource::File(path) => path.display().to_string(),
            MediaSource::Memory { name, .. } => name.clone(),
        }
    }

    /// Returns the filesystem path for file sources.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            MediaSource::File(path) => Some(path),
            MediaSource::Memory { .. } => None,
        }
    }

    /// Opens the source for sequential reading with a read-ahead buffer of
    /// `buffer_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::SourceNotFound`] if the file is missing, or an
    /// I/O error if it exists but cannot be opened.
    pub fn open(&self, buffer_size: usize) -> Result<StreamReader> {
        let inner: Box<dyn Read + Send> = match self {
            MediaSource::File(path) => match File::open(path) {
                Ok(file) => Box::new(file),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(Error::Video(VideoError::SourceNotFound(self.name())));
                }
                Err(err) => return Err(err.into()),
            },
            MediaSource::Memory { bytes, .. } => Box::new(Cursor::new(Arc::clone(bytes))),
        };

        Ok(StreamReader::new(self.name(), inner, buffer_size))
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Read-side counters visible from any thread.
#[derive(Debug, Clone, Default)]
pub struct ReaderStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    bytes_read: AtomicU64,
    closed: AtomicBool,
}

impl ReaderStats {
    /// Total bytes handed to the decoder so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.inner.bytes_read.load(Ordering::Relaxed)
    }

    /// True once the reader (and with it the byte channel) has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Pull-style byte reader invoked from the decoder's worker thread.
pub struct StreamReader {
    name: String,
    inner: BufReader<Box<dyn Read + Send>>,
    stats: ReaderStats,
    exhausted: bool,
}

impl StreamReader {
    pub fn new(name: impl Into<String>, reader: Box<dyn Read + Send>, buffer_size: usize) -> Self {
        Self {
            name: name.into(),
            inner: BufReader::with_capacity(buffer_size.max(1), reader),
            stats: ReaderStats::default(),
            exhausted: false,
        }
    }

    /// Fills `buf` from its start and returns the number of bytes written.
    ///
    /// The destination is reused across calls; nothing from a previous fill
    /// is retained. Returns 0 once the source is exhausted. A read failure is
    /// logged and also reported as 0, which the decoder treats as end of
    /// stream.
    pub fn fill_buffer(&mut self, buf: &mut [u8]) -> usize {
        if self.exhausted || buf.is_empty() {
            return 0;
        }

        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    log::warn!("read error on {}: {}", self.name, err);
                    self.exhausted = true;
                    break;
                }
            }
        }

        self.stats
            .inner
            .bytes_read
            .fetch_add(filled as u64, Ordering::Relaxed);
        filled
    }

    /// Returns a handle to this reader's counters.
    #[must_use]
    pub fn stats(&self) -> ReaderStats {
        self.stats.clone()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReader")
            .field("name", &self.name)
            .field("bytes_read", &self.stats.bytes_read())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.stats.inner.closed.store(true, Ordering::Release);
    }
}
