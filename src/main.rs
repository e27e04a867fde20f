//! Host bench for the frame player.
//!
//! Plays a recorded or live frame stream against simulated chips with the
//! effect scheduler running on its own thread, then prints what every chip
//! ended up holding.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ym2149_serial::bus::recording::RecordingLines;
use ym2149_serial::{ChipId, FrameRead, FrameReader, Synth, SynthConfig, TickMode, TickRunner};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TickModeArg {
    /// 4 µs activations, every armed voice written each time
    EveryTick,
    /// 32 µs activations, one round-robin write each time
    Batched,
}

impl From<TickModeArg> for TickMode {
    fn from(arg: TickModeArg) -> Self {
        match arg {
            TickModeArg::EveryTick => TickMode::EveryTick,
            TickModeArg::Batched => TickMode::Batched,
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Play a YM2149 frame stream against simulated chips")]
struct Args {
    /// Frame stream: file, FIFO or serial device, `-` for stdin
    input: PathBuf,

    /// Line rate when the input is a serial device
    #[arg(long, default_value_t = 2_000_000)]
    baud: u32,

    /// Serial read timeout in milliseconds; a frame still short when it
    /// expires is dropped
    #[arg(long, default_value_t = 1000)]
    read_timeout_ms: u64,

    /// Board configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scheduler rate, overriding the configuration
    #[arg(long)]
    tick_mode: Option<TickModeArg>,

    /// Pace frames at this many per second; 0 plays them as fast as they arrive
    #[arg(long, default_value_t = 0.0)]
    frame_rate: f64,
}

/// Device names `serialport` should open rather than the filesystem.
fn is_serial_device(path: &Path) -> bool {
    let Some(name) = path.to_str() else {
        return false;
    };
    if let Some(node) = name.strip_prefix("/dev/") {
        return ["tty", "cu.", "serial", "rfcomm"]
            .iter()
            .any(|prefix| node.starts_with(prefix));
    }
    let name = name.strip_prefix(r"\\.\").unwrap_or(name);
    match (name.get(..3), name.get(3..)) {
        (Some(prefix), Some(number)) => {
            prefix.eq_ignore_ascii_case("COM")
                && !number.is_empty()
                && number.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

fn open_input(args: &Args) -> Result<Box<dyn Read>> {
    let path = args.input.as_path();
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    if is_serial_device(path) {
        let port = serialport::new(path.to_string_lossy(), args.baud)
            .timeout(Duration::from_millis(args.read_timeout_ms))
            .open()
            .with_context(|| format!("opening {} at {} baud", path.display(), args.baud))?;
        log::info!("reading frames from {} at {} baud", path.display(), args.baud);
        return Ok(Box::new(port));
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(Box::new(file))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SynthConfig::load(path)?,
        None => SynthConfig::default(),
    };
    if let Some(mode) = args.tick_mode {
        config.tick_mode = mode.into();
    }
    let base_dir = args
        .config
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));
    let samples = config.load_samples(base_dir)?;

    let mut lines = RecordingLines::new(config.select_wiring);
    // Register images only; a full write log would grow without bound
    lines.set_record_writes(false);
    let mut synth = Synth::new(lines, &config).with_samples(samples);
    synth.begin();
    let shared = synth.into_shared();
    let runner = TickRunner::spawn(Arc::clone(&shared))?;
    log::info!("scheduler running in {:?} mode", config.tick_mode);

    let frame_period =
        (args.frame_rate > 0.0).then(|| Duration::from_secs_f64(1.0 / args.frame_rate));
    let mut reader = FrameReader::new(open_input(&args)?);
    let mut partial = 0u64;
    let started = Instant::now();
    let mut next_frame = started;

    loop {
        match reader.read_frame()? {
            FrameRead::Frame(bytes) => {
                shared.lock().apply_frame(&bytes);
                if let Some(period) = frame_period {
                    next_frame += period;
                    if let Some(wait) = next_frame.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }
                }
            }
            FrameRead::Partial(0) => {}
            FrameRead::Partial(len) => {
                log::debug!("dropped {len}-byte partial frame");
                partial += 1;
            }
            FrameRead::Closed => break,
        }
    }

    let activations = runner.stop();
    let synth = shared.lock();
    let stats = synth.stats();
    log::info!(
        "{} frames applied, {} bad chip, {} bad length, {} partial in {:.2?}",
        stats.applied,
        stats.bad_chip,
        stats.bad_length,
        partial,
        started.elapsed()
    );
    log::info!(
        "{} scheduler activations, {} amplitude writes",
        activations,
        synth.scheduler().writes()
    );

    for chip in ChipId::ALL {
        let registers = synth
            .lines()
            .registers(chip)
            .iter()
            .map(|r| format!("{r:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{chip}: {registers}");
    }
    let faults = synth.lines().faults();
    if !faults.is_empty() {
        log::warn!("{} bus protocol faults, first: {:?}", faults.len(), faults[0]);
    }
    Ok(())
}
