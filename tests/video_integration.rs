// SPDX-License-Identifier: MPL-2.0
//! Integration tests for the FFmpeg decode pipeline.
//!
//! Each test encodes a short clip (MPEG-4 video, optionally mono PCM audio,
//! in a NUT container) into a temporary directory and decodes it through the
//! real worker thread. Tests return early when the local FFmpeg build lacks
//! those encoders.

use ffmpeg_next as ffmpeg;
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use vidstream::config::PlayerConfig;
use vidstream::error::{Error, VideoError};
use vidstream::video_player::{
    AudioFormat, CodecLibrary, CpuTextureBackend, DecodeEngine, EngineFactory,
    FfmpegDecoderFactory, FrameUpdate, MediaSource, VideoPlayer, VideoPull,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const FPS: i32 = 25;
const FRAMES: i64 = 25;
const AUDIO_RATE: i32 = 8_000;
const AUDIO_LEVEL: i16 = 8_000;

const TIMEOUT: Duration = Duration::from_secs(10);

fn factory() -> FfmpegDecoderFactory {
    FfmpegDecoderFactory::new(Arc::new(CodecLibrary::new()), 4, 1024)
}

/// Moves every packet the encoder has ready into the muxer.
fn drain(
    encoder: &mut ffmpeg::encoder::Encoder,
    index: usize,
    from: ffmpeg::Rational,
    to: ffmpeg::Rational,
    output: &mut ffmpeg::format::context::Output,
) -> Result<(), ffmpeg::Error> {
    let mut packet = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(index);
        packet.rescale_ts(from, to);
        packet.write_interleaved(output)?;
    }
    Ok(())
}

/// Encodes `FRAMES` frames of 64x48 video at 25 fps, plus one second of a
/// constant mono tone when `with_audio` is set. Returns `Ok(false)` if an
/// encoder is not available.
fn write_clip(path: &Path, with_audio: bool) -> Result<bool, ffmpeg::Error> {
    let Some(video_codec) = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4) else {
        return Ok(false);
    };
    let audio_codec = match (with_audio, ffmpeg::encoder::find(ffmpeg::codec::Id::PCM_S16LE)) {
        (false, _) => None,
        (true, Some(codec)) => Some(codec),
        (true, None) => return Ok(false),
    };

    let mut output = ffmpeg::format::output(&path)?;
    let global_header = output
        .format()
        .flags()
        .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

    let video_tb = ffmpeg::Rational::new(1, FPS);
    let mut video = ffmpeg::codec::context::Context::new_with_codec(video_codec)
        .encoder()
        .video()?;
    video.set_width(WIDTH);
    video.set_height(HEIGHT);
    video.set_format(ffmpeg::format::Pixel::YUV420P);
    video.set_time_base(video_tb);
    video.set_frame_rate(Some((FPS, 1)));
    if global_header {
        video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
    }
    let mut video = video.open_as(video_codec)?;
    let video_index = {
        let mut stream = output.add_stream(video_codec)?;
        stream.set_parameters(&video);
        stream.set_time_base(video_tb);
        stream.index()
    };

    let audio_tb = ffmpeg::Rational::new(1, AUDIO_RATE);
    let mut audio = match audio_codec {
        Some(codec) => {
            let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
                .encoder()
                .audio()?;
            encoder.set_rate(AUDIO_RATE);
            encoder.set_channel_layout(ffmpeg::ChannelLayout::MONO);
            encoder.set_format(ffmpeg::format::Sample::I16(
                ffmpeg::format::sample::Type::Packed,
            ));
            encoder.set_time_base(audio_tb);
            if global_header {
                encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
            }
            let encoder = encoder.open_as(codec)?;
            let index = {
                let mut stream = output.add_stream(codec)?;
                stream.set_parameters(&encoder);
                stream.set_time_base(audio_tb);
                stream.index()
            };
            Some((encoder, index))
        }
        None => None,
    };

    output.write_header()?;
    let video_out_tb = output
        .stream(video_index)
        .ok_or(ffmpeg::Error::StreamNotFound)?
        .time_base();
    let audio_out_tb = match &audio {
        Some((_, index)) => output
            .stream(*index)
            .ok_or(ffmpeg::Error::StreamNotFound)?
            .time_base(),
        None => audio_tb,
    };

    let samples_per_frame = (AUDIO_RATE / FPS) as usize;
    let mut picture = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::YUV420P, WIDTH, HEIGHT);
    for i in 0..FRAMES {
        // Luma brightens frame by frame, chroma stays neutral.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        picture.data_mut(0).fill((16 + i * 8).min(235) as u8);
        picture.data_mut(1).fill(128);
        picture.data_mut(2).fill(128);
        picture.set_pts(Some(i));
        video.send_frame(&picture)?;
        drain(&mut video, video_index, video_tb, video_out_tb, &mut output)?;

        if let Some((encoder, index)) = audio.as_mut() {
            let mut tone = ffmpeg::frame::Audio::new(
                ffmpeg::format::Sample::I16(ffmpeg::format::sample::Type::Packed),
                samples_per_frame,
                ffmpeg::ChannelLayout::MONO,
            );
            #[allow(clippy::cast_sign_loss)]
            tone.set_rate(AUDIO_RATE as u32);
            for sample in tone.data_mut(0).chunks_exact_mut(2) {
                sample.copy_from_slice(&AUDIO_LEVEL.to_ne_bytes());
            }
            tone.set_pts(Some(i * samples_per_frame as i64));
            encoder.send_frame(&tone)?;
            drain(encoder, *index, audio_tb, audio_out_tb, &mut output)?;
        }
    }

    video.send_eof()?;
    drain(&mut video, video_index, video_tb, video_out_tb, &mut output)?;
    if let Some((encoder, index)) = audio.as_mut() {
        encoder.send_eof()?;
        drain(encoder, *index, audio_tb, audio_out_tb, &mut output)?;
    }
    output.write_trailer()?;
    Ok(true)
}

/// Writes a test clip, or returns `None` if FFmpeg cannot produce one here.
fn generated_clip(with_audio: bool) -> Option<(TempDir, MediaSource)> {
    if CodecLibrary::new().ensure_loaded().is_err() {
        return None;
    }
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("clip.nut");
    match write_clip(&path, with_audio) {
        Ok(true) => Some((dir, MediaSource::file(path))),
        Ok(false) => None,
        Err(err) => panic!("could not encode test clip: {err}"),
    }
}

/// Pulls frames until end of stream, returning each distinct timestamp.
fn collect_frames(engine: &mut dyn DecodeEngine) -> Vec<f64> {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen: Vec<f64> = Vec::new();
    while Instant::now() < deadline {
        let pts = match engine.next_video_frame() {
            VideoPull::Frame(frame) => frame.pts(),
            VideoPull::NotReady => {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            VideoPull::EndOfStream => return seen,
        };
        if seen.last() == Some(&pts) {
            thread::sleep(Duration::from_millis(1));
        } else {
            seen.push(pts);
        }
    }
    panic!("stream did not end within {TIMEOUT:?}");
}

#[test]
fn test_open_reports_geometry_and_audio() {
    let Some((_dir, source)) = generated_clip(true) else {
        return; // Skip if FFmpeg lacks the encoders
    };

    let mut engine = factory().create().expect("codec library");
    let opened = engine
        .open(source.open(64 * 1024).expect("open file"), None)
        .expect("open stream");

    assert_eq!(opened.info.width, WIDTH);
    assert_eq!(opened.info.height, HEIGHT);
    assert!(opened.info.buffer_width >= WIDTH);
    assert_eq!(
        opened.info.audio,
        Some(AudioFormat {
            channels: 1,
            sample_rate: 8_000,
        })
    );
    assert!(opened.audio.is_some());
    engine.dispose();
}

#[test]
fn test_frames_arrive_in_order_until_end_of_stream() {
    let Some((_dir, source)) = generated_clip(true) else {
        return;
    };

    let mut engine = factory().create().expect("codec library");
    let opened = engine
        .open(source.open(64 * 1024).expect("open file"), None)
        .expect("open stream");
    // Nobody plays the audio; the worker must route around it.
    drop(opened.audio);

    let frames = collect_frames(engine.as_mut());

    assert_eq!(frames.len(), FRAMES as usize);
    assert!(
        frames.windows(2).all(|pair| pair[0] < pair[1]),
        "timestamps not increasing: {frames:?}"
    );
    assert!(frames[0].abs() < 1e-6);
    assert!((frames[frames.len() - 1] - 0.96).abs() < 1e-6);
    assert!(!engine.is_buffered());
    assert!(matches!(engine.next_video_frame(), VideoPull::EndOfStream));
}

#[test]
fn test_lookahead_fills_without_a_consumer() {
    let Some((_dir, source)) = generated_clip(false) else {
        return;
    };

    let mut engine = factory().create().expect("codec library");
    engine
        .open(source.open(64 * 1024).expect("open file"), None)
        .expect("open stream");

    let deadline = Instant::now() + TIMEOUT;
    while !engine.is_buffered() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(engine.is_buffered());
    engine.dispose();
}

#[test]
fn test_audio_is_resampled_to_the_requested_output() {
    let Some((_dir, source)) = generated_clip(true) else {
        return;
    };
    let device = AudioFormat {
        channels: 2,
        sample_rate: 48_000,
    };

    let mut engine = factory().create().expect("codec library");
    let opened = engine
        .open(source.open(64 * 1024).expect("open file"), Some(device))
        .expect("open stream");
    assert_eq!(opened.info.audio, Some(device));
    let mut audio = opened.audio.expect("audio stream");
    assert_eq!(audio.format(), device);

    let mut buf = vec![0.0f32; audio.buffer_len()];
    let mut loudest = 0.0f32;
    let mut real = 0;
    let deadline = Instant::now() + TIMEOUT;
    while real < 9_600 && Instant::now() < deadline {
        let n = audio.refill(&mut buf);
        real += n;
        loudest = buf[..n].iter().fold(loudest, |max, s| max.max(s.abs()));
        if n == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    assert!(real >= 9_600, "only {real} samples decoded");
    assert!(loudest > 0.1, "tone missing, peak {loudest}");
    assert!(loudest <= 1.0);
    engine.dispose();
}

#[test]
fn test_dispose_mid_stream_stops_the_worker() {
    let Some((_dir, source)) = generated_clip(true) else {
        return;
    };

    let mut engine = factory().create().expect("codec library");
    let reader = source.open(64 * 1024).expect("open file");
    let stats = reader.stats();
    let _opened = engine.open(reader, None).expect("open stream");

    let mut pulled = 0;
    let deadline = Instant::now() + TIMEOUT;
    while pulled < 3 && Instant::now() < deadline {
        match engine.next_video_frame() {
            VideoPull::Frame(_) => pulled += 1,
            VideoPull::NotReady => thread::sleep(Duration::from_millis(1)),
            VideoPull::EndOfStream => break,
        }
    }
    assert_eq!(pulled, 3);

    let started = Instant::now();
    engine.dispose();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(stats.is_closed());
    assert!(stats.bytes_read() > 0);
    assert!(!engine.is_buffered());
    assert!(matches!(engine.next_video_frame(), VideoPull::EndOfStream));
    engine.dispose();
}

#[test]
fn test_player_plays_generated_clip_to_completion() {
    let Some((_dir, source)) = generated_clip(true) else {
        return;
    };

    let mut player = VideoPlayer::new(
        Box::new(factory()),
        None,
        CpuTextureBackend::new(),
        PlayerConfig::default(),
    );
    let completions = Rc::new(Cell::new(0));
    let seen = Rc::clone(&completions);
    player.set_on_completion(move |_| seen.set(seen.get() + 1));
    player.play_source(source).expect("load");

    let deadline = Instant::now() + TIMEOUT;
    let mut new_frames = 0;
    let mut finished = false;
    while Instant::now() < deadline {
        match player.update() {
            FrameUpdate::NewFrame => new_frames += 1,
            FrameUpdate::Finished => {
                finished = true;
                break;
            }
            _ => {}
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert!(finished, "playback did not finish");
    assert!(new_frames > 0, "no frames presented");
    assert_eq!(completions.get(), 1);
    let texture = player.texture().expect("last frame stays on screen");
    assert_eq!(texture.height, HEIGHT);
    assert!(texture.width >= WIDTH);
    assert_eq!(player.sink().allocations(), 1);
    player.dispose();
}

#[test]
fn test_garbage_bytes_fail_to_open() {
    let source = MediaSource::memory("noise.bin", vec![0x5Au8; 4096]);
    let mut engine = match factory().create() {
        Ok(engine) => engine,
        Err(_) => return, // FFmpeg not usable on this machine
    };

    let result = engine.open(source.open(4096).expect("open memory"), None);
    assert!(result.is_err(), "random bytes should not open");
}

#[test]
fn test_missing_file_is_source_not_found() {
    let mut player = VideoPlayer::new(
        Box::new(factory()),
        None,
        CpuTextureBackend::new(),
        PlayerConfig::default(),
    );
    let result = player.load(MediaSource::file("tests/data/does_not_exist.mp4"));
    assert!(matches!(
        result,
        Err(Error::Video(VideoError::SourceNotFound(_)))
    ));
}
