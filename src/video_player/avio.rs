// SPDX-License-Identifier: MPL-2.0
//! Demuxer input backed by a [`StreamReader`] instead of a file path.
//!
//! FFmpeg pulls bytes through a custom AVIO context whose read callback
//! forwards to [`StreamReader::fill_buffer`]. The callback runs on whichever
//! thread drives the demuxer, which in this crate is always the decoder
//! worker that owns the [`ReaderInput`].

use super::source::StreamReader;
use crate::config::AVIO_BUFFER_BYTES;
use crate::error::{Error, Result, VideoError};
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Input;
use std::ffi::{c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

/// An opened demuxer plus the AVIO context and reader it reads through.
///
/// Dropping it closes the demuxer first, then frees the AVIO buffer and
/// context, then drops the reader (closing the byte channel).
pub(crate) struct ReaderInput {
    input: Option<Input>,
    avio: *mut ffi::AVIOContext,
    reader: *mut StreamReader,
}

impl ReaderInput {
    /// Probes the stream and reads enough of it to know its layout.
    ///
    /// # Errors
    ///
    /// Fails if FFmpeg cannot allocate its contexts, does not recognize the
    /// container, or cannot find stream information.
    pub fn open(reader: StreamReader) -> Result<Self> {
        let name = reader.name().to_string();

        // SAFETY: every pointer handed to FFmpeg below is either freshly
        // allocated by FFmpeg or the boxed reader, which outlives the AVIO
        // context because `Drop` releases them in reverse order.
        unsafe {
            let buffer = ffi::av_malloc(AVIO_BUFFER_BYTES).cast::<u8>();
            if buffer.is_null() {
                return Err(alloc_error("AVIO buffer"));
            }

            let reader = Box::into_raw(Box::new(reader));
            let avio = ffi::avio_alloc_context(
                buffer,
                AVIO_BUFFER_BYTES as c_int,
                0,
                reader.cast::<c_void>(),
                Some(read_packet),
                None,
                None,
            );
            if avio.is_null() {
                ffi::av_free(buffer.cast::<c_void>());
                drop(Box::from_raw(reader));
                return Err(alloc_error("AVIO context"));
            }

            let mut partial = Self {
                input: None,
                avio,
                reader,
            };

            let mut ctx = ffi::avformat_alloc_context();
            if ctx.is_null() {
                return Err(alloc_error("format context"));
            }
            (*ctx).pb = avio;
            (*ctx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;

            // On failure avformat_open_input frees `ctx` itself.
            let ret = ffi::avformat_open_input(
                &mut ctx,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if ret < 0 {
                let err = ffmpeg_next::Error::from(ret);
                log::error!("cannot open {name}: {err}");
                return Err(err.into());
            }

            let ret = ffi::avformat_find_stream_info(ctx, ptr::null_mut());
            if ret < 0 {
                ffi::avformat_close_input(&mut ctx);
                let err = ffmpeg_next::Error::from(ret);
                log::error!("cannot read stream info from {name}: {err}");
                return Err(err.into());
            }

            partial.input = Some(Input::wrap(ctx));
            Ok(partial)
        }
    }

    pub fn input(&self) -> &Input {
        // `open` only returns values with the demuxer set.
        match &self.input {
            Some(input) => input,
            None => unreachable!("ReaderInput without demuxer"),
        }
    }

    pub fn input_mut(&mut self) -> &mut Input {
        match &mut self.input {
            Some(input) => input,
            None => unreachable!("ReaderInput without demuxer"),
        }
    }
}

impl Drop for ReaderInput {
    fn drop(&mut self) {
        // Closes the demuxer; with AVFMT_FLAG_CUSTOM_IO it leaves `pb` alone.
        drop(self.input.take());

        // SAFETY: `avio` and `reader` were created in `open` and are freed
        // exactly once here, after nothing can call `read_packet` anymore.
        unsafe {
            if !self.avio.is_null() {
                ffi::av_freep(ptr::addr_of_mut!((*self.avio).buffer).cast::<c_void>());
                ffi::avio_context_free(&mut self.avio);
            }
            if !self.reader.is_null() {
                drop(Box::from_raw(self.reader));
                self.reader = ptr::null_mut();
            }
        }
    }
}

fn alloc_error(what: &str) -> Error {
    Error::Video(VideoError::Other(format!("FFmpeg could not allocate {what}")))
}

/// AVIO read callback. Returns the byte count or `AVERROR_EOF`.
unsafe extern "C" fn read_packet(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int {
    let eof = c_int::from(ffmpeg_next::Error::Eof);
    if opaque.is_null() || buf.is_null() || buf_size <= 0 {
        return eof;
    }

    // SAFETY: `opaque` is the boxed reader installed in `ReaderInput::open`
    // and FFmpeg guarantees `buf` holds `buf_size` writable bytes.
    let reader = unsafe { &mut *opaque.cast::<StreamReader>() };
    let dst = unsafe { std::slice::from_raw_parts_mut(buf, buf_size as usize) };

    // A panic must not unwind into C.
    match catch_unwind(AssertUnwindSafe(|| reader.fill_buffer(dst))) {
        Ok(0) | Err(_) => eof,
        Ok(n) => n as c_int,
    }
}
