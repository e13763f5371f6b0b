// SPDX-License-Identifier: MPL-2.0
//! Decode engine binding.
//!
//! [`DecodeEngine`] is the boundary between the synchronizer and whatever
//! actually demuxes and decodes. [`FfmpegDecoder`] implements it with a
//! private worker thread that owns every FFmpeg object:
//!
//! ```text
//! StreamReader ─▶ AVIO ─▶ demuxer ─┬─▶ video decoder ─▶ RGB24 scaler ─▶ frame ring
//!                                  └─▶ audio decoder ─▶ f32 resampler ─▶ PCM queue
//! ```
//!
//! The ring and the PCM queue live in a shared [`Pipeline`]; the consumer
//! side never touches FFmpeg and never blocks on decoding.

use super::avio::ReaderInput;
use super::library::CodecLibrary;
use super::pipeline::{FrameSlot, Pipeline, RingPull};
use super::source::StreamReader;
use crate::config::AUDIO_QUEUE_SECS;
use crate::error::{Error, Result, VideoError};
use crossbeam_channel::Sender;
use ffmpeg_next::format::context::Input;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long an idle worker sleeps before re-checking demand.
const IDLE_WAIT: Duration = Duration::from_millis(20);

/// Frame duration assumed when a stream reports no usable rate.
const FALLBACK_FRAME_SECS: f64 = 1.0 / 25.0;

/// Extra output samples per resampled frame for the resampler's delay.
const RESAMPLE_SLACK: usize = 256;

/// Decoded audio layout handed to the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// Geometry and audio layout reported by a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Pixels per row in the decode buffer. At least `width`; codecs pad
    /// rows for alignment.
    pub buffer_width: u32,
    /// Presented width in pixels.
    pub width: u32,
    /// Presented height in pixels.
    pub height: u32,
    pub audio: Option<AudioFormat>,
}

impl StreamInfo {
    /// Bytes per packed RGB24 row of the decode buffer.
    #[must_use]
    pub fn row_bytes(&self) -> usize {
        self.buffer_width as usize * 3
    }

    /// Bytes in one full decoded frame.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.row_bytes() * self.height as usize
    }
}

/// Result of [`DecodeEngine::open`].
pub struct OpenedStream {
    pub info: StreamInfo,
    /// Handle the audio device pulls PCM through. `None` for silent streams.
    pub audio: Option<Box<dyn AudioStream>>,
}

impl std::fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedStream")
            .field("info", &self.info)
            .field("audio", &self.audio.is_some())
            .finish()
    }
}

/// A decoded frame borrowed from the engine.
///
/// Holds packed RGB24 rows, `buffer_width * 3` bytes each. The borrow ends
/// at the next pull, so the caller must copy the pixels out first.
pub struct FrameRef<'a> {
    slot: MutexGuard<'a, FrameSlot>,
}

impl<'a> FrameRef<'a> {
    pub(crate) fn new(slot: MutexGuard<'a, FrameSlot>) -> Self {
        Self { slot }
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.slot.data
    }

    /// Presentation time in seconds as decoded, without drift correction.
    #[must_use]
    pub fn pts(&self) -> f64 {
        self.slot.pts
    }
}

/// Outcome of [`DecodeEngine::next_video_frame`].
pub enum VideoPull<'a> {
    /// The next frame, or the previous one again if nothing newer is ready.
    Frame(FrameRef<'a>),
    /// Nothing has been decoded yet.
    NotReady,
    /// Every frame has been delivered.
    EndOfStream,
}

/// Decoded PCM source pulled by the audio device.
///
/// Called from the audio callback thread. Dropping the handle tells the
/// engine to stop decoding audio.
pub trait AudioStream: Send {
    fn format(&self) -> AudioFormat;

    /// Interleaved samples the device should request per refill.
    fn buffer_len(&self) -> usize;

    /// Fills `buf` with interleaved f32 samples and returns how many were
    /// real audio. The rest is silence.
    fn refill(&mut self, buf: &mut [f32]) -> usize;
}

/// Demux + decode backend for one playback session.
pub trait DecodeEngine {
    /// Opens a stream read through `reader`.
    ///
    /// With `audio_output` set, decoded audio is resampled to that rate and
    /// downmixed to mono when it asks for one channel, stereo otherwise.
    /// Without it audio keeps its own rate.
    ///
    /// # Errors
    ///
    /// Returns a [`VideoError`] if the container or codec is unsupported or
    /// the data is corrupt. The failure is logged before returning.
    fn open(
        &mut self,
        reader: StreamReader,
        audio_output: Option<AudioFormat>,
    ) -> Result<OpenedStream>;

    /// Pulls the next decoded frame. Never blocks on decoding.
    fn next_video_frame(&mut self) -> VideoPull<'_>;

    /// Timestamp of the most recently pulled frame in seconds, including
    /// the audio drift correction.
    fn current_frame_timestamp(&self) -> f64;

    /// True once the lookahead queue is full.
    fn is_buffered(&self) -> bool;

    /// Releases every decoder resource. Safe to call more than once.
    fn dispose(&mut self);
}

/// Creates one engine per playback session.
pub trait EngineFactory {
    /// # Errors
    ///
    /// Fails if the backing codec library cannot be loaded.
    fn create(&self) -> Result<Box<dyn DecodeEngine>>;
}

// ==========================================================================
// FFmpeg engine
// ==========================================================================

/// Builds [`FfmpegDecoder`]s, loading FFmpeg on first use.
#[derive(Debug, Clone)]
pub struct FfmpegDecoderFactory {
    library: Arc<CodecLibrary>,
    lookahead_frames: usize,
    audio_buffer_samples: usize,
}

impl FfmpegDecoderFactory {
    #[must_use]
    pub fn new(library: Arc<CodecLibrary>, lookahead_frames: usize, audio_buffer_samples: usize) -> Self {
        Self {
            library,
            lookahead_frames,
            audio_buffer_samples,
        }
    }
}

impl EngineFactory for FfmpegDecoderFactory {
    fn create(&self) -> Result<Box<dyn DecodeEngine>> {
        self.library.ensure_loaded()?;
        Ok(Box::new(FfmpegDecoder::new(
            self.lookahead_frames,
            self.audio_buffer_samples,
        )))
    }
}

/// FFmpeg-backed [`DecodeEngine`].
pub struct FfmpegDecoder {
    depth: usize,
    audio_buffer_samples: usize,
    pipeline: Option<Arc<Pipeline>>,
    worker: Option<JoinHandle<()>>,
    last_pts: f64,
}

impl FfmpegDecoder {
    /// Creates an idle decoder with a ring of `lookahead_frames` slots.
    #[must_use]
    pub fn new(lookahead_frames: usize, audio_buffer_samples: usize) -> Self {
        Self {
            depth: lookahead_frames.max(2),
            audio_buffer_samples,
            pipeline: None,
            worker: None,
            last_pts: 0.0,
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("decoder worker terminated abnormally");
            }
        }
    }
}

impl DecodeEngine for FfmpegDecoder {
    fn open(
        &mut self,
        reader: StreamReader,
        audio_output: Option<AudioFormat>,
    ) -> Result<OpenedStream> {
        self.dispose();

        let name = reader.name().to_string();
        let pipeline = Arc::new(Pipeline::new(self.depth));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let worker_pipeline = Arc::clone(&pipeline);
        let handle = thread::Builder::new()
            .name("vidstream-decode".to_string())
            .spawn(move || run_worker(reader, audio_output, worker_pipeline, ready_tx))?;
        self.worker = Some(handle);

        let info = match ready_rx.recv() {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                pipeline.shutdown();
                self.join_worker();
                return Err(err);
            }
            Err(_) => {
                pipeline.shutdown();
                self.join_worker();
                log::error!("decoder worker for {name} exited during open");
                return Err(Error::Video(VideoError::DecodingFailed(
                    "decoder worker exited during open".to_string(),
                )));
            }
        };

        log::info!(
            "opened {name}: {}x{} (buffer width {}), audio {:?}",
            info.width,
            info.height,
            info.buffer_width,
            info.audio
        );

        let audio = info.audio.map(|format| {
            let channels = usize::from(format.channels.max(1));
            let buffer_len = (self.audio_buffer_samples / channels).max(1) * channels;
            Box::new(PipelineAudio {
                pipeline: Arc::clone(&pipeline),
                format,
                buffer_len,
            }) as Box<dyn AudioStream>
        });

        self.last_pts = 0.0;
        self.pipeline = Some(pipeline);
        Ok(OpenedStream { info, audio })
    }

    fn next_video_frame(&mut self) -> VideoPull<'_> {
        let Some(pipeline) = &self.pipeline else {
            return VideoPull::EndOfStream;
        };
        match pipeline.pull() {
            RingPull::Advanced(index) | RingPull::Repeated(index) => {
                let slot = pipeline.slot(index);
                self.last_pts = slot.pts;
                VideoPull::Frame(FrameRef::new(slot))
            }
            RingPull::NotReady => VideoPull::NotReady,
            RingPull::Ended => VideoPull::EndOfStream,
        }
    }

    fn current_frame_timestamp(&self) -> f64 {
        let offset = self
            .pipeline
            .as_ref()
            .map_or(0.0, |pipeline| pipeline.timestamp_offset());
        self.last_pts + offset
    }

    fn is_buffered(&self) -> bool {
        self.pipeline
            .as_ref()
            .is_some_and(|pipeline| pipeline.is_buffered())
    }

    fn dispose(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
        self.join_worker();
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// [`AudioStream`] reading from a pipeline's PCM queue.
struct PipelineAudio {
    pipeline: Arc<Pipeline>,
    format: AudioFormat,
    buffer_len: usize,
}

impl AudioStream for PipelineAudio {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    fn refill(&mut self, buf: &mut [f32]) -> usize {
        self.pipeline.refill_audio(buf)
    }
}

impl Drop for PipelineAudio {
    fn drop(&mut self) {
        self.pipeline.detach_audio();
    }
}

// ==========================================================================
// Worker thread
// ==========================================================================

fn run_worker(
    reader: StreamReader,
    audio_output: Option<AudioFormat>,
    pipeline: Arc<Pipeline>,
    ready: Sender<Result<StreamInfo>>,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut worker = match Worker::open(reader, audio_output, Arc::clone(&pipeline)) {
            Ok(worker) => worker,
            Err(err) => {
                let _ = ready.send(Err(err));
                return;
            }
        };
        if ready.send(Ok(worker.info)).is_err() {
            return;
        }
        worker.run();
    }));

    if outcome.is_err() {
        log::error!("decoder worker panicked; ending stream");
    }
    pipeline.finish_video();
    pipeline.finish_audio();
}

fn is_again(err: &ffmpeg_next::Error) -> bool {
    matches!(err, ffmpeg_next::Error::Other { errno } if *errno == ffmpeg_next::error::EAGAIN)
}

struct VideoLane {
    index: usize,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    decoded: ffmpeg_next::frame::Video,
    rgb: ffmpeg_next::frame::Video,
    packets: VecDeque<ffmpeg_next::Packet>,
    time_base: f64,
    frame_secs: f64,
    last_pts: Option<f64>,
    flushed: bool,
}

struct AudioLane {
    index: usize,
    decoder: ffmpeg_next::decoder::Audio,
    resampler: ffmpeg_next::software::resampling::Context,
    decoded: ffmpeg_next::frame::Audio,
    packets: VecDeque<ffmpeg_next::Packet>,
    channels: u16,
    /// Output rate after resampling.
    rate: u32,
    flushed: bool,
}

struct Worker {
    input: ReaderInput,
    pipeline: Arc<Pipeline>,
    info: StreamInfo,
    video: Option<VideoLane>,
    audio: Option<AudioLane>,
    demux_done: bool,
}

impl Worker {
    fn open(
        reader: StreamReader,
        audio_output: Option<AudioFormat>,
        pipeline: Arc<Pipeline>,
    ) -> Result<Self> {
        let name = reader.name().to_string();
        let input = ReaderInput::open(reader)?;

        let video = open_video_lane(input.input()).inspect_err(|err| {
            log::error!("cannot decode video in {name}: {err}");
        })?;

        let buffer_width = buffer_width_of(&video.rgb);
        let info_width = video.decoder.width();
        let info_height = video.decoder.height();

        let audio = match open_audio_lane(input.input(), audio_output) {
            Ok(lane) => lane,
            Err(err) => {
                log::warn!("ignoring undecodable audio in {name}: {err}");
                None
            }
        };

        let audio_format = audio.as_ref().map(|lane| AudioFormat {
            channels: lane.channels,
            sample_rate: lane.rate,
        });
        if let Some(format) = audio_format {
            pipeline.enable_audio(format.channels, format.sample_rate, AUDIO_QUEUE_SECS);
        }

        Ok(Self {
            input,
            pipeline,
            info: StreamInfo {
                buffer_width,
                width: info_width,
                height: info_height,
                audio: audio_format,
            },
            video: Some(video),
            audio,
            demux_done: false,
        })
    }

    fn run(&mut self) {
        while let Some(demand) = self.pipeline.wait_for_demand(IDLE_WAIT) {
            if self.audio.is_some() && !self.pipeline.is_audio_wanted() {
                log::debug!("audio detached; discarding audio packets");
                self.audio = None;
            }
            if self.video.is_none() && self.audio.is_none() {
                break;
            }
            if demand.video {
                self.step_video();
            }
            if demand.audio {
                self.step_audio();
            }
        }
        log::debug!("decoder worker finished");
    }

    /// Reads one packet and routes it to its lane.
    fn demux_one(&mut self) {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(self.input.input_mut()) {
            Ok(()) => {
                let index = packet.stream();
                if let Some(lane) = self.video.as_mut().filter(|lane| lane.index == index) {
                    lane.packets.push_back(packet);
                } else if let Some(lane) = self.audio.as_mut().filter(|lane| lane.index == index) {
                    lane.packets.push_back(packet);
                }
            }
            Err(ffmpeg_next::Error::Eof) => {
                log::debug!("demuxer reached end of input");
                self.demux_done = true;
            }
            Err(err) => {
                log::warn!("demux error, treating as end of input: {err}");
                self.demux_done = true;
            }
        }
    }

    fn finish_video(&mut self) {
        self.video = None;
        self.pipeline.finish_video();
    }

    fn finish_audio(&mut self) {
        self.audio = None;
        self.pipeline.finish_audio();
    }

    fn step_video(&mut self) {
        let Some(lane) = self.video.as_mut() else {
            return;
        };

        match lane.decoder.receive_frame(&mut lane.decoded) {
            Ok(()) => {
                lane.emit(&self.pipeline);
                return;
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.finish_video();
                return;
            }
            Err(err) if is_again(&err) && !lane.flushed => {}
            Err(err) => {
                log::warn!("video decode failed, ending stream: {err}");
                self.finish_video();
                return;
            }
        }

        if let Some(packet) = lane.packets.pop_front() {
            if let Err(err) = lane.decoder.send_packet(&packet) {
                log::warn!("dropping video packet: {err}");
            }
        } else if self.demux_done {
            lane.flushed = true;
            if let Err(err) = lane.decoder.send_eof() {
                log::debug!("video decoder flush: {err}");
                self.finish_video();
            }
        } else {
            self.demux_one();
        }
    }

    fn step_audio(&mut self) {
        let Some(lane) = self.audio.as_mut() else {
            return;
        };

        match lane.decoder.receive_frame(&mut lane.decoded) {
            Ok(()) => {
                lane.emit(&self.pipeline);
                return;
            }
            Err(ffmpeg_next::Error::Eof) => {
                self.finish_audio();
                return;
            }
            Err(err) if is_again(&err) && !lane.flushed => {}
            Err(err) => {
                log::warn!("audio decode failed, ending audio: {err}");
                self.finish_audio();
                return;
            }
        }

        if let Some(packet) = lane.packets.pop_front() {
            if let Err(err) = lane.decoder.send_packet(&packet) {
                log::warn!("dropping audio packet: {err}");
            }
        } else if self.demux_done {
            lane.flushed = true;
            if let Err(err) = lane.decoder.send_eof() {
                log::debug!("audio decoder flush: {err}");
                self.finish_audio();
            }
        } else {
            self.demux_one();
        }
    }
}

impl VideoLane {
    /// Converts the decoded frame to RGB24 and writes it into the ring.
    fn emit(&mut self, pipeline: &Pipeline) {
        if let Err(err) = self.scaler.run(&self.decoded, &mut self.rgb) {
            log::warn!("scaling failed, dropping frame: {err}");
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let pts = match self.decoded.timestamp() {
            Some(ts) => (ts as f64 * self.time_base).max(0.0),
            None => self.last_pts.map_or(0.0, |last| last + self.frame_secs),
        };
        self.last_pts = Some(pts);

        let rgb = &self.rgb;
        let row_bytes = buffer_width_of(rgb) as usize * 3;
        let written = pipeline.write_frame(pts, |data| {
            copy_rows(rgb.data(0), rgb.stride(0), row_bytes, rgb.height() as usize, data);
        });
        if !written {
            log::debug!("pipeline shut down; dropped frame at {pts:.3}s");
        }
    }
}

impl AudioLane {
    /// Resamples the decoded frame to packed f32 and queues it.
    fn emit(&mut self, pipeline: &Pipeline) {
        if self.decoded.channel_layout().is_empty() {
            let layout = layout_or_default(self.decoded.channel_layout(), self.decoded.channels());
            self.decoded.set_channel_layout(layout);
        }

        // Preallocated so upsampling never truncates the converted frame.
        let capacity = resampled_capacity(self.decoded.samples(), self.decoded.rate(), self.rate);
        let mut resampled = ffmpeg_next::frame::Audio::new(
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
            capacity,
            output_layout(self.channels),
        );
        if let Err(err) = self.resampler.run(&self.decoded, &mut resampled) {
            log::warn!("resampling failed, dropping audio frame: {err}");
            return;
        }
        pipeline.push_pcm(&packed_samples(&resampled, self.channels));
    }
}

fn open_video_lane(input: &Input) -> Result<VideoLane> {
    let stream = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or(Error::Video(VideoError::NoVideoStream))?;

    let parameters = stream.parameters();
    let codec_id = parameters.id();
    let context = ffmpeg_next::codec::context::Context::from_parameters(parameters)?;
    let decoder = context.decoder().video().map_err(|err| match err {
        ffmpeg_next::Error::DecoderNotFound => {
            Error::Video(VideoError::UnsupportedCodec(format!("{codec_id:?}")))
        }
        other => other.into(),
    })?;

    let (width, height) = (decoder.width(), decoder.height());
    if width == 0 || height == 0 {
        return Err(Error::Video(VideoError::CorruptedFile));
    }

    let scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| Error::Video(VideoError::DecodingFailed(format!("scaler setup: {e}"))))?;

    let rate = stream.avg_frame_rate();
    let frame_secs = if rate.numerator() > 0 && rate.denominator() > 0 {
        f64::from(rate.denominator()) / f64::from(rate.numerator())
    } else {
        FALLBACK_FRAME_SECS
    };
    let time_base = stream.time_base();

    Ok(VideoLane {
        index: stream.index(),
        decoder,
        scaler,
        decoded: ffmpeg_next::frame::Video::empty(),
        rgb: ffmpeg_next::frame::Video::new(ffmpeg_next::format::Pixel::RGB24, width, height),
        packets: VecDeque::new(),
        time_base: f64::from(time_base.numerator()) / f64::from(time_base.denominator()),
        frame_secs,
        last_pts: None,
        flushed: false,
    })
}

fn open_audio_lane(input: &Input, output: Option<AudioFormat>) -> Result<Option<AudioLane>> {
    let Some(stream) = input.streams().best(ffmpeg_next::media::Type::Audio) else {
        return Ok(None);
    };

    let context = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = context.decoder().audio()?;

    // Mono stays mono unless the device wants more; everything else is
    // downmixed to stereo, or to mono for a mono device.
    let channels = match output.map_or(decoder.channels(), |format| format.channels) {
        1 => 1,
        _ => 2,
    };
    let rate = output.map_or(decoder.rate(), |format| format.sample_rate);

    let input_layout = layout_or_default(decoder.channel_layout(), decoder.channels());

    let resampler = ffmpeg_next::software::resampling::Context::get(
        decoder.format(),
        input_layout,
        decoder.rate(),
        ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
        output_layout(channels),
        rate,
    )
    .map_err(|e| Error::Video(VideoError::DecodingFailed(format!("resampler setup: {e}"))))?;

    Ok(Some(AudioLane {
        index: stream.index(),
        decoder,
        resampler,
        decoded: ffmpeg_next::frame::Audio::empty(),
        packets: VecDeque::new(),
        channels,
        rate,
        flushed: false,
    }))
}

/// Containers that store only a channel count leave the layout empty; the
/// resampler needs a concrete one.
fn layout_or_default(layout: ffmpeg_next::ChannelLayout, channels: u16) -> ffmpeg_next::ChannelLayout {
    if layout.is_empty() {
        ffmpeg_next::ChannelLayout::default(i32::from(channels))
    } else {
        layout
    }
}

fn output_layout(channels: u16) -> ffmpeg_next::ChannelLayout {
    if channels == 1 {
        ffmpeg_next::ChannelLayout::MONO
    } else {
        ffmpeg_next::ChannelLayout::STEREO
    }
}

/// Output samples needed to hold `samples` input samples converted from
/// `from` Hz to `to` Hz.
fn resampled_capacity(samples: usize, from: u32, to: u32) -> usize {
    if from == 0 {
        return samples + RESAMPLE_SLACK;
    }
    let scaled = (samples as u64 * u64::from(to)).div_ceil(u64::from(from));
    usize::try_from(scaled).unwrap_or(usize::MAX - RESAMPLE_SLACK) + RESAMPLE_SLACK
}

/// Pixels per row of an RGB24 frame, derived from its stride when the
/// stride is a whole number of pixels.
fn buffer_width_of(frame: &ffmpeg_next::frame::Video) -> u32 {
    let stride = frame.stride(0);
    if stride % 3 == 0 && stride / 3 >= frame.width() as usize {
        u32::try_from(stride / 3).unwrap_or(frame.width())
    } else {
        frame.width()
    }
}

/// Copies `rows` rows of `row_bytes` each out of a strided plane.
fn copy_rows(src: &[u8], stride: usize, row_bytes: usize, rows: usize, dst: &mut Vec<u8>) {
    dst.clear();
    dst.reserve(row_bytes * rows);
    for y in 0..rows {
        let start = y * stride;
        let end = (start + row_bytes).min(src.len());
        if start >= end {
            break;
        }
        dst.extend_from_slice(&src[start..end]);
    }
    dst.resize(row_bytes * rows, 0);
}

/// Reads interleaved f32 samples out of a packed audio frame.
fn packed_samples(frame: &ffmpeg_next::frame::Audio, channels: u16) -> Vec<f32> {
    let count = frame.samples() * usize::from(channels);
    frame
        .data(0)
        .chunks_exact(4)
        .take(count)
        .map(|bytes| f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}
