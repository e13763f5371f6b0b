// SPDX-License-Identifier: MPL-2.0
//! Headless playback demo.
//!
//! Decodes a file in real time into an in-memory texture, plays its audio
//! on the default output device and logs frame statistics once a second.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use vidstream::config::{self, PlayerConfig};
use vidstream::error::{Error, Result};
use vidstream::video_player::{
    create_player, CodecLibrary, CpuTextureBackend, FfmpegDecoderFactory, FrameUpdate,
    MediaSource, VideoPlayer,
};

const USAGE: &str = "usage: vidstream <file> [--loop] [--volume V] [--no-audio] [--tick-ms N] [--debug]";

struct Args {
    file: String,
    looping: bool,
    volume: Option<f32>,
    no_audio: bool,
    tick_ms: u64,
    debug: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = pico_args::Arguments::from_env();
    let arg_error = |e: pico_args::Error| Error::Config(e.to_string());

    let looping = args.contains("--loop");
    let no_audio = args.contains("--no-audio");
    let debug = args.contains("--debug");
    let volume = args.opt_value_from_str("--volume").map_err(arg_error)?;
    let tick_ms = args
        .opt_value_from_str("--tick-ms")
        .map_err(arg_error)?
        .unwrap_or(16);

    let file = args
        .finish()
        .into_iter()
        .next()
        .and_then(|s| s.into_string().ok())
        .ok_or_else(|| Error::Config(USAGE.to_string()))?;

    Ok(Args {
        file,
        looping,
        volume,
        no_audio,
        tick_ms,
        debug,
    })
}

#[derive(Debug, Default)]
struct Stats {
    new_frames: u64,
    repeated: u64,
    idle_ticks: u64,
    restarts: u64,
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut settings: PlayerConfig = config::load()?;
    settings.looping |= args.looping;
    settings.debug_logging |= args.debug;
    if let Some(volume) = args.volume {
        settings.volume = volume;
    }

    let library = Arc::new(CodecLibrary::new());
    library.ensure_loaded()?;

    let mut player = if args.no_audio {
        library.set_debug_logging(settings.debug_logging);
        let engines = FfmpegDecoderFactory::new(
            Arc::clone(&library),
            settings.lookahead_frames,
            settings.audio_buffer_samples,
        );
        VideoPlayer::new(Box::new(engines), None, CpuTextureBackend::new(), settings)
    } else {
        create_player(Arc::clone(&library), CpuTextureBackend::new(), settings)
    };

    player.set_on_video_size(|width, height| log::info!("video size {width}x{height}"));
    player.set_on_completion(|source| log::info!("playback of {source} complete"));
    player.play_source(MediaSource::file(&args.file))?;

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let started = Instant::now();
    let mut last_report = started;
    let mut stats = Stats::default();

    loop {
        match player.update() {
            FrameUpdate::NewFrame => stats.new_frames += 1,
            FrameUpdate::FrameRepeated => stats.repeated += 1,
            FrameUpdate::NoNewFrame => stats.idle_ticks += 1,
            FrameUpdate::Restarted => stats.restarts += 1,
            FrameUpdate::Finished | FrameUpdate::NotPlaying => break,
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            log::info!(
                "t={:.2}s frame={}ms buffered={} {:?}",
                player.position_secs(),
                player.current_timestamp_ms(),
                player.is_buffered(),
                stats
            );
        }
        thread::sleep(tick);
    }

    let elapsed = started.elapsed().as_secs_f64();
    #[allow(clippy::cast_precision_loss)]
    let fps = stats.new_frames as f64 / elapsed.max(f64::EPSILON);
    log::info!(
        "played {} frames in {elapsed:.2}s ({fps:.1} fps), {} repeats, {} texture allocations",
        stats.new_frames,
        stats.repeated,
        player.sink().allocations()
    );

    player.dispose();
    Ok(())
}
