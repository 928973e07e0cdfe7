//! Periodic acquisition: capture, segment, encode, deliver.
//!
//! A single `acquisition` thread fires one tick per interval and never
//! overlaps ticks. UI inputs arrive as [`Command`]s on a channel and are
//! drained at the start of each tick, so a change made while a tick is in
//! flight shows up on the next one.
//!
//! The acquisition thread releases the device and clears the display itself
//! when its loop exits. A stop that times out returns without waiting for it,
//! and the in-flight frame still reaches the display before the clear.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::capture::CaptureSource;
use crate::error::{Error, Result};
use crate::output::{encode, OutputSink};
use crate::segmentation::{Command, Controls, Mode, Pipeline};

/// ~30 frames per second.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Delivered frames between throughput log lines.
const STATS_EVERY: u64 = 30;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub device_index: u32,
    pub tick_interval: Duration,
    /// How long `stop` waits for an in-flight tick before giving up on it.
    pub shutdown_wait: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            tick_interval: DEFAULT_TICK_INTERVAL,
            shutdown_wait: DEFAULT_TICK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Running,
}

/// Running totals since the scheduler was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    pub ticks: u64,
    pub delivered: u64,
    pub skipped_empty: u64,
    pub faults: u64,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    delivered: AtomicU64,
    skipped_empty: AtomicU64,
    faults: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> TickStats {
        TickStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            skipped_empty: self.skipped_empty.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }
}

/// Sending half of the command channel, handed to the UI collaborator.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<Command>,
}

impl ControlHandle {
    pub fn send(&self, command: Command) {
        // The receiver lives as long as the scheduler.
        if self.tx.send(command).is_err() {
            tracing::debug!("scheduler gone, dropping {:?}", command);
        }
    }

    pub fn set_mode(&self, mode: Mode) {
        self.send(Command::SetMode(mode));
    }

    pub fn set_threshold(&self, threshold: f64) {
        self.send(Command::SetThreshold(threshold));
    }

    pub fn set_inverse_polarity(&self, inverse: bool) {
        self.send(Command::SetInversePolarity(inverse));
    }
}

/// Pipeline plus the inputs it reads, owned by whoever is ticking.
struct Stage {
    pipeline: Pipeline,
    controls: Controls,
    commands: Receiver<Command>,
}

impl Stage {
    fn sync_controls(&mut self) {
        for command in self.commands.try_iter() {
            tracing::debug!("applying {:?}", command);
            self.controls.apply(command);
        }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type SharedSource = Arc<Mutex<Box<dyn CaptureSource>>>;

/// Everything a tick touches.
#[derive(Clone)]
struct TickContext {
    source: SharedSource,
    stage: Arc<Mutex<Stage>>,
    sink: Arc<dyn OutputSink>,
    counters: Arc<Counters>,
    /// Bumped on every successful start; a worker only cleans up its own.
    session: Arc<AtomicU64>,
}

#[derive(Default)]
struct Throughput {
    frames: u64,
    capture: Duration,
    segment: Duration,
    encode: Duration,
}

impl Throughput {
    fn log(&self) {
        let frames = self.frames as f64;
        let avg_capture_ms = self.capture.as_secs_f64() * 1000.0 / frames;
        let avg_segment_ms = self.segment.as_secs_f64() * 1000.0 / frames;
        let avg_encode_ms = self.encode.as_secs_f64() * 1000.0 / frames;
        let total_ms = avg_capture_ms + avg_segment_ms + avg_encode_ms;
        tracing::info!(
            "Frame {}: capture={:.1}ms, segment={:.1}ms, encode={:.1}ms, total={:.1}ms, \
             max fps={:.1}",
            self.frames,
            avg_capture_ms,
            avg_segment_ms,
            avg_encode_ms,
            total_ms,
            1000.0 / total_ms
        );
    }
}

impl TickContext {
    fn tick(&self, throughput: &mut Throughput) {
        let n = Counters::bump(&self.counters.ticks);
        let _span = tracing::debug_span!("tick", n).entered();

        let capture_start = Instant::now();
        let frame = {
            let mut source = lock(&self.source);
            if !source.is_open() {
                return;
            }
            match source.read() {
                Ok(Some(frame)) if !frame.is_empty() => frame,
                Ok(_) => {
                    Counters::bump(&self.counters.skipped_empty);
                    tracing::trace!("no frame this tick");
                    return;
                }
                Err(err) => {
                    Counters::bump(&self.counters.faults);
                    tracing::warn!("Failed to read frame: {:#}", err);
                    return;
                }
            }
        };
        let capture_time = capture_start.elapsed();

        let segment_start = Instant::now();
        let processed = {
            let mut stage = lock(&self.stage);
            stage.sync_controls();
            let segmentation = stage.controls.active();
            stage.pipeline.process(frame, segmentation)
        };
        let processed = match processed {
            Ok(frame) => frame,
            Err(err) => {
                Counters::bump(&self.counters.faults);
                tracing::warn!("Segmentation failed, skipping tick: {}", err);
                return;
            }
        };
        let segment_time = segment_start.elapsed();

        let encode_start = Instant::now();
        let encoded = match encode(&processed) {
            Ok(encoded) => encoded,
            Err(err) => {
                Counters::bump(&self.counters.faults);
                tracing::warn!("Failed to encode frame: {}", err);
                return;
            }
        };
        let encode_time = encode_start.elapsed();

        if let Err(err) = self.sink.write_frame(encoded) {
            Counters::bump(&self.counters.faults);
            tracing::warn!("Failed to deliver frame: {:#}", err);
            return;
        }
        Counters::bump(&self.counters.delivered);

        throughput.frames += 1;
        throughput.capture += capture_time;
        throughput.segment += segment_time;
        throughput.encode += encode_time;
        if throughput.frames % STATS_EVERY == 0 {
            throughput.log();
        }
    }

    fn run(
        self,
        session: u64,
        interval: Duration,
        running: Arc<AtomicBool>,
        stop: Receiver<()>,
        done: Sender<()>,
    ) {
        let ticker = crossbeam_channel::tick(interval);
        let mut throughput = Throughput::default();
        while running.load(Ordering::SeqCst) {
            self.tick(&mut throughput);
            select! {
                recv(stop) -> _ => break,
                recv(ticker) -> _ => {}
            }
        }
        tracing::debug!("acquisition loop finished");
        self.finish(session);
        drop(done);
    }

    /// Release the device and clear the display, unless a later start has
    /// already reopened the device.
    fn finish(&self, session: u64) {
        // Held across the clear so a restarted loop cannot deliver ahead of it.
        let mut source = lock(&self.source);
        if self.session.load(Ordering::SeqCst) != session {
            tracing::debug!("device reopened by a later start, leaving it open");
            return;
        }
        source.release();
        if let Err(err) = self.sink.clear() {
            tracing::warn!("Failed to clear the display: {:#}", err);
        }
        tracing::info!("Acquisition stopped");
    }
}

struct Worker {
    running: Arc<AtomicBool>,
    stop: Sender<()>,
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Owns the capture source and the pipeline and drives them at a fixed rate.
pub struct Scheduler {
    config: SchedulerConfig,
    context: TickContext,
    commands: Sender<Command>,
    worker: Option<Worker>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        source: Box<dyn CaptureSource>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self::with_pipeline(config, source, sink, Pipeline::default())
    }

    pub fn with_pipeline(
        config: SchedulerConfig,
        source: Box<dyn CaptureSource>,
        sink: Arc<dyn OutputSink>,
        pipeline: Pipeline,
    ) -> Self {
        let (commands, command_rx) = unbounded();
        let stage = Stage {
            pipeline,
            controls: Controls::default(),
            commands: command_rx,
        };
        Self {
            config,
            context: TickContext {
                source: Arc::new(Mutex::new(source)),
                stage: Arc::new(Mutex::new(stage)),
                sink,
                counters: Arc::new(Counters::default()),
                session: Arc::new(AtomicU64::new(0)),
            },
            commands,
            worker: None,
        }
    }

    pub fn control_handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.commands.clone(),
        }
    }

    /// Controls after applying every command sent so far.
    pub fn controls(&self) -> Controls {
        let mut stage = lock(&self.context.stage);
        stage.sync_controls();
        stage.controls
    }

    pub fn state(&self) -> State {
        if self.worker.is_some() {
            State::Running
        } else {
            State::Stopped
        }
    }

    pub fn stats(&self) -> TickStats {
        self.context.counters.snapshot()
    }

    /// Waits for a read in flight to finish.
    pub fn is_source_open(&self) -> bool {
        lock(&self.context.source).is_open()
    }

    /// Open the device and begin ticking.
    ///
    /// A device that fails to open leaves the scheduler stopped with no ticks scheduled.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let index = self.config.device_index;
        let session = {
            let mut device = lock(&self.context.source);
            if let Err(source) = device.open(index) {
                tracing::error!("Failed to open the camera connection: {:#}", source);
                return Err(Error::DeviceUnavailable { index, source });
            }
            // Bumped under the lock so a worker still finishing sees it.
            self.context.session.fetch_add(1, Ordering::SeqCst) + 1
        };

        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let context = self.context.clone();
        let interval = self.config.tick_interval;
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || context.run(session, interval, flag, stop_rx, done_tx));
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                lock(&self.context.source).release();
                return Err(Error::Spawn(err));
            }
        };

        self.worker = Some(Worker {
            running,
            stop: stop_tx,
            done: done_rx,
            handle,
        });
        tracing::info!(
            "Acquisition started on device {} every {:?}",
            index,
            interval
        );
        Ok(())
    }

    /// Stop ticking, release the device and clear the display.
    ///
    /// Waits up to `shutdown_wait` for the acquisition thread to finish. On
    /// expiry `ShutdownTimeout` is returned and the thread is left to deliver
    /// its in-flight frame, release the device and clear the display on its
    /// own. The scheduler is stopped either way.
    pub fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.running.store(false, Ordering::SeqCst);
        drop(worker.stop);

        let wait = self.config.shutdown_wait;
        match worker.done.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Acquisition did not stop within {:?}, it will release the camera when \
                     the current frame is done",
                    wait
                );
                Err(Error::ShutdownTimeout(wait))
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::error!("Acquisition thread panicked");
                    // The thread never reached its cleanup.
                    lock(&self.context.source).release();
                }
                Ok(())
            }
        }
    }

    /// Start when stopped, stop when running. Returns the new state.
    pub fn toggle(&mut self) -> Result<State> {
        match self.state() {
            State::Stopped => self.start()?,
            State::Running => self.stop()?,
        }
        Ok(self.state())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
