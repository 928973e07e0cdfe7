use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::Receiver;
use segcam::capture::WebcamCapture;
use segcam::output::{ChannelSink, DisplayUpdate};
use segcam::{ControlHandle, Error, Mode, Scheduler, SchedulerConfig};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ModeArg {
    None,
    Edge,
    Background,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::None => Mode::None,
            ModeArg::Edge => Mode::EdgeDetection,
            ModeArg::Background => Mode::BackgroundRemoval,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Segmentation applied to each frame
    #[arg(short, long, value_enum, default_value_t = ModeArg::None)]
    mode: ModeArg,

    /// Edge detector lower threshold (upper is 3x)
    #[arg(short, long, default_value_t = 50.0)]
    threshold: f64,

    /// Treat hues above the average as background
    #[arg(long)]
    inverse: bool,

    /// Run for this many seconds and exit instead of reading commands from stdin
    #[arg(long)]
    duration: Option<u64>,

    /// Frames buffered for the display before new ones are dropped
    #[arg(long, default_value_t = 2)]
    display_queue: usize,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// One line typed on the console.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ConsoleCommand {
    Start,
    Stop,
    Toggle,
    Mode(Mode),
    Threshold(f64),
    Inverse(bool),
    Status,
    Quit,
}

fn parse_line(line: &str) -> Result<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let arg = words.next();

    let command = match (verb, arg) {
        ("start", None) => ConsoleCommand::Start,
        ("stop", None) => ConsoleCommand::Stop,
        ("toggle", None) => ConsoleCommand::Toggle,
        ("status", None) => ConsoleCommand::Status,
        ("quit" | "exit", None) => ConsoleCommand::Quit,
        ("mode", Some(mode)) => {
            let mode = ModeArg::from_str(mode, true).map_err(|e| anyhow::anyhow!(e))?;
            ConsoleCommand::Mode(mode.into())
        }
        ("threshold", Some(value)) => ConsoleCommand::Threshold(
            value
                .parse()
                .with_context(|| format!("invalid threshold {value:?}"))?,
        ),
        ("inverse", Some("on")) => ConsoleCommand::Inverse(true),
        ("inverse", Some("off")) => ConsoleCommand::Inverse(false),
        _ => bail!("unknown command {line:?}"),
    };
    if words.next().is_some() {
        bail!("unexpected trailing input in {line:?}");
    }
    Ok(command)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.fps == 0 {
        bail!("--fps must be at least 1");
    }

    tracing::info!("segcam starting");
    tracing::info!("Device: {}", args.input_device);
    tracing::info!("Target FPS: {}", args.fps);

    let tick_interval = Duration::from_secs_f64(1.0 / args.fps as f64);
    let config = SchedulerConfig {
        device_index: args.input_device,
        tick_interval,
        shutdown_wait: tick_interval,
    };

    let (sink, updates) = ChannelSink::new(args.display_queue);
    let mut scheduler = Scheduler::new(config, Box::new(WebcamCapture::new()), Arc::new(sink));

    let controls = scheduler.control_handle();
    controls.set_threshold(args.threshold);
    controls.set_inverse_polarity(args.inverse);
    controls.set_mode(args.mode.into());

    let display = thread::Builder::new()
        .name("display".into())
        .spawn(move || run_display(updates))
        .context("Failed to spawn display thread")?;

    match args.duration {
        Some(seconds) => {
            scheduler
                .start()
                .context("Failed to start acquisition")?;
            thread::sleep(Duration::from_secs(seconds));
            report_stop(scheduler.stop());
        }
        None => run_console(&mut scheduler, &controls)?,
    }

    let stats = scheduler.stats();
    tracing::info!(
        "Ticks: {}, delivered: {}, empty: {}, faults: {}",
        stats.ticks,
        stats.delivered,
        stats.skipped_empty,
        stats.faults
    );

    // Dropping the scheduler closes the display channel.
    drop(scheduler);
    if display.join().is_err() {
        tracing::error!("Display thread panicked");
    }
    Ok(())
}

fn report_stop(result: segcam::Result<()>) {
    if let Err(err) = result {
        tracing::warn!("{}", err);
    }
}

fn run_console(scheduler: &mut Scheduler, controls: &ControlHandle) -> Result<()> {
    tracing::info!(
        "Commands: start | stop | toggle | mode none|edge|background | threshold <v> | \
         inverse on|off | status | quit"
    );

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!("{:#}", err);
                continue;
            }
        };

        match command {
            ConsoleCommand::Start => start(scheduler),
            ConsoleCommand::Stop => report_stop(scheduler.stop()),
            ConsoleCommand::Toggle => match scheduler.toggle() {
                Ok(state) => tracing::info!("Acquisition {:?}", state),
                Err(err) => tracing::warn!("{}", err),
            },
            ConsoleCommand::Mode(mode) => controls.set_mode(mode),
            ConsoleCommand::Threshold(value) => controls.set_threshold(value),
            ConsoleCommand::Inverse(inverse) => controls.set_inverse_polarity(inverse),
            ConsoleCommand::Status => {
                let stats = scheduler.stats();
                tracing::info!(
                    "{:?}, {:?}, {} delivered, {} faults",
                    scheduler.state(),
                    scheduler.controls().active(),
                    stats.delivered,
                    stats.faults
                );
            }
            ConsoleCommand::Quit => break,
        }
    }

    report_stop(scheduler.stop());
    Ok(())
}

fn start(scheduler: &mut Scheduler) {
    match scheduler.start() {
        Ok(()) => {}
        Err(Error::AlreadyRunning) => tracing::info!("Already running"),
        // Already logged by the scheduler; stay stopped.
        Err(err @ Error::DeviceUnavailable { .. }) => tracing::warn!("{}", err),
        Err(err) => tracing::error!("{}", err),
    }
}

/// Stand-in for a window: consumes images and reports what it would show.
fn run_display(updates: Receiver<DisplayUpdate>) {
    let mut shown = 0u64;
    for update in updates {
        match update {
            DisplayUpdate::Frame(image) => {
                shown += 1;
                tracing::debug!(
                    "Frame {}: {}x{} PNG, {} bytes",
                    shown,
                    image.width,
                    image.height,
                    image.bytes.len()
                );
            }
            DisplayUpdate::Clear => tracing::info!("Display cleared after {} frames", shown),
        }
    }
}
