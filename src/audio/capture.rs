use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use super::fft::{SpectralEngine, WindowFunction};
use super::{decode_frames, Burst, FormatDescriptor, Producer, Pull, Sink, SpectrumStore};
use super::{WindowAccumulator, WindowLength};
use crate::error::{CaptureError, EngineError, ProducerError, StoreError};

/// Lifecycle of a capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Running,
    Paused,
    /// `stop()` is waiting for the capture thread to exit.
    Stopping,
    Stopped,
}

/// Counters for one capture session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub bursts: u64,
    pub silent_bursts: u64,
    pub frames: u64,
    pub windows: u64,
}

struct Shared {
    state: Mutex<ControlState>,
    wake: Condvar,
}

impl Shared {
    /// Block while paused. Returns true if capture should carry on.
    fn wait_while_paused(&self) -> bool {
        let mut state = self.state.lock();
        while *state == ControlState::Paused {
            self.wake.wait(&mut state);
        }
        *state == ControlState::Running
    }
}

/// Everything the capture thread owns while a session runs. Handed back to
/// the controller when the thread is joined.
struct Session {
    format: FormatDescriptor,
    producer: Box<dyn Producer>,
    sink: Option<Box<dyn Sink>>,
    accumulator: WindowAccumulator,
    engine: SpectralEngine,
    stats: CaptureStats,
}

type Worker = JoinHandle<(Session, Result<(), CaptureError>)>;

impl Session {
    fn open(&mut self) -> Result<(), CaptureError> {
        self.accumulator.reset();
        self.stats = CaptureStats::default();

        self.producer.open()?;
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.begin(&self.format) {
                self.producer.close();
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn run(&mut self, shared: &Shared, store: &SpectrumStore) -> Result<(), CaptureError> {
        let result = self.capture_loop(shared, store);
        if let Err(e) = &result {
            error!("Capture session failed: {}", e);
        }

        // Stopped must imply the endpoint and recording are released
        let closed = self.close();
        *shared.state.lock() = ControlState::Stopped;

        match (result, closed) {
            (Err(e), Err(lost)) => {
                warn!("Recording not finalized after failed session: {}", lost);
                Err(e)
            }
            (result, closed) => result.and(closed),
        }
    }

    fn capture_loop(&mut self, shared: &Shared, store: &SpectrumStore) -> Result<(), CaptureError> {
        loop {
            if !shared.wait_while_paused() {
                debug!("Stop requested, ending capture loop");
                return Ok(());
            }

            let pulled = self.producer.pull_next_burst(true)?;
            if self.producer.format() != self.format {
                return Err(ProducerError::FormatChanged.into());
            }
            let burst = match pulled {
                Pull::Burst(burst) => burst,
                Pull::Empty => continue,
                Pull::EndOfStream => {
                    info!("Producer reached end of stream");
                    return Ok(());
                }
            };
            burst.validate(&self.format)?;

            // A pause that landed while we were pulling holds this burst
            // until resume rather than dropping it.
            let carry_on = shared.wait_while_paused();
            self.process(&burst, store)?;
            if !carry_on {
                debug!("Stop requested, ending capture loop");
                return Ok(());
            }
        }
    }

    fn process(&mut self, burst: &Burst, store: &SpectrumStore) -> Result<(), CaptureError> {
        self.stats.bursts += 1;
        self.stats.frames += burst.frames as u64;

        let Session {
            accumulator,
            engine,
            sink,
            format,
            stats,
            ..
        } = self;

        if burst.silent {
            stats.silent_bursts += 1;
            for _ in 0..burst.frames {
                feed(accumulator, engine, store, 0.0)?;
            }
            if let Some(sink) = sink.as_mut() {
                sink.write_raw(&vec![0u8; burst.bytes.len()])?;
            }
        } else {
            for sample in decode_frames(&burst.bytes, format.channels as usize) {
                feed(accumulator, engine, store, sample)?;
            }
            if let Some(sink) = sink.as_mut() {
                sink.write_raw(&burst.bytes)?;
            }
        }

        stats.windows = accumulator.windows_completed();
        Ok(())
    }

    /// Finalize the sink and release the producer. Runs on the capture thread
    /// as its last step.
    fn close(&mut self) -> Result<(), CaptureError> {
        let finalized = match self.sink.as_mut() {
            Some(sink) => sink.finalize(&self.format, self.stats.frames),
            None => Ok(()),
        };
        self.producer.close();
        finalized.map_err(Into::into)
    }
}

fn feed(
    accumulator: &mut WindowAccumulator,
    engine: &mut SpectralEngine,
    store: &SpectrumStore,
    sample: f32,
) -> Result<(), EngineError> {
    let mut outcome = Ok(());
    accumulator.append(sample, |window| {
        outcome = engine.transform(window).map(|spectrum| store.publish(spectrum));
    });
    outcome
}

/// Drives a producer on a dedicated thread and keeps a spectrum snapshot current.
///
/// Lifecycle calls take `&mut self`, so they are serialized by the owner.
/// Readers on other threads use the handle returned by [`store`](Self::store).
///
/// When a session fails on its own (device lost, format change, sink write
/// error), the thread releases the producer and finalizes the sink before the
/// state reads Stopped. The error is held until the next lifecycle call, which
/// returns it. The call after that behaves normally.
pub struct CaptureController {
    format: FormatDescriptor,
    window_len: usize,
    shared: Arc<Shared>,
    store: Arc<SpectrumStore>,
    session: Option<Session>,
    worker: Option<Worker>,
    last_stats: CaptureStats,
}

impl CaptureController {
    pub fn new(
        producer: Box<dyn Producer>,
        sink: Option<Box<dyn Sink>>,
        window: WindowLength,
        window_function: WindowFunction,
    ) -> Result<Self, CaptureError> {
        let format = producer.format();
        format.validate()?;
        let window_len = window.resolve(format.sample_rate)?;
        let engine = SpectralEngine::new(window_len, format.sample_rate, window_function)?;

        info!(
            "Spectrum: {} sample window, {} bins, {:.2} Hz per bin",
            window_len,
            engine.spectrum_len(),
            format.sample_rate as f32 / window_len as f32
        );

        Ok(Self {
            format,
            window_len,
            shared: Arc::new(Shared {
                state: Mutex::new(ControlState::Idle),
                wake: Condvar::new(),
            }),
            store: Arc::new(SpectrumStore::new(window_len, format.sample_rate)),
            session: Some(Session {
                format,
                producer,
                sink,
                accumulator: WindowAccumulator::new(window_len),
                engine,
                stats: CaptureStats::default(),
            }),
            worker: None,
            last_stats: CaptureStats::default(),
        })
    }

    /// Begin capturing. A no-op while already running or paused.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        self.reap()?;

        let state = self.state();
        if matches!(state, ControlState::Running | ControlState::Paused) {
            debug!("Capture already {:?}, ignoring start", state);
            return Ok(());
        }

        let mut session = self.session.take().ok_or(CaptureError::SessionLost)?;
        if let Err(e) = session.open() {
            self.session = Some(session);
            return Err(e);
        }

        info!(
            "Capturing {} channel(s) at {} Hz, {}-bit {}",
            self.format.channels,
            self.format.sample_rate,
            self.format.sample_width_bytes * 8,
            if self.format.is_float { "float" } else { "integer" }
        );

        *self.shared.state.lock() = ControlState::Running;

        let shared = self.shared.clone();
        let store = self.store.clone();
        let spawned = thread::Builder::new()
            .name("loopscope-capture".to_string())
            .spawn(move || {
                let result = session.run(&shared, &store);
                (session, result)
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.shared.state.lock() = ControlState::Stopped;
                Err(CaptureError::Spawn(e.to_string()))
            }
        }
    }

    /// Suspend capture at the next burst boundary. A no-op unless running.
    pub fn pause(&mut self) -> Result<(), CaptureError> {
        self.reap()?;

        let mut state = self.shared.state.lock();
        if *state == ControlState::Running {
            *state = ControlState::Paused;
            info!("Capture paused");
        } else {
            debug!("Capture is {:?}, ignoring pause", *state);
        }
        Ok(())
    }

    /// Continue a paused capture. A no-op unless paused.
    pub fn resume(&mut self) -> Result<(), CaptureError> {
        self.reap()?;

        let mut state = self.shared.state.lock();
        if *state == ControlState::Paused {
            *state = ControlState::Running;
            self.shared.wake.notify_all();
            info!("Capture resumed");
        } else {
            debug!("Capture is {:?}, ignoring resume", *state);
        }
        Ok(())
    }

    /// End the session and wait for the capture thread to exit. Finalizes the
    /// sink and releases the producer. Safe to call repeatedly.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(worker) = self.worker.take() else {
            debug!("Capture not running, ignoring stop");
            return Ok(());
        };

        {
            let mut state = self.shared.state.lock();
            if *state != ControlState::Stopped {
                *state = ControlState::Stopping;
            }
            self.shared.wake.notify_all();
        }

        let result = self.join(worker);
        info!("Capture stopped");
        result
    }

    pub fn state(&self) -> ControlState {
        *self.shared.state.lock()
    }

    /// True while a capture thread exists and has not exited.
    pub fn is_worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Counters from the most recently ended session
    pub fn last_stats(&self) -> CaptureStats {
        self.last_stats
    }

    pub fn format(&self) -> FormatDescriptor {
        self.format
    }

    pub fn channel_count(&self) -> u16 {
        self.format.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// `window_len / 2 + 1`
    pub fn spectrum_len(&self) -> usize {
        self.store.spectrum_len()
    }

    /// Shared read handle for other threads
    pub fn store(&self) -> Arc<SpectrumStore> {
        self.store.clone()
    }

    pub fn frequency_axis(&self, dst: &mut [f32]) -> Result<(), StoreError> {
        self.store.read_frequency_axis(dst)
    }

    pub fn magnitude(&self, dst: &mut [f32]) -> Result<(), StoreError> {
        self.store.read_magnitude(dst)
    }

    pub fn decibel(&self, dst: &mut [f32]) -> Result<(), StoreError> {
        self.store.read_decibel(dst)
    }

    /// Collect a session that ended on its own, returning its error if any.
    fn reap(&mut self) -> Result<(), CaptureError> {
        let exited = match &self.worker {
            Some(worker) => self.state() == ControlState::Stopped || worker.is_finished(),
            None => false,
        };
        match self.worker.take() {
            Some(worker) if exited => self.join(worker),
            worker => {
                self.worker = worker;
                Ok(())
            }
        }
    }

    fn join(&mut self, worker: Worker) -> Result<(), CaptureError> {
        let joined = worker.join();
        *self.shared.state.lock() = ControlState::Stopped;

        match joined {
            Ok((session, result)) => {
                self.last_stats = session.stats;
                info!(
                    "Session ended: {} bursts ({} silent), {} frames, {} windows",
                    session.stats.bursts,
                    session.stats.silent_bursts,
                    session.stats.frames,
                    session.stats.windows
                );
                self.session = Some(session);
                result
            }
            Err(_) => {
                error!("Capture thread panicked; session resources are gone");
                Err(CaptureError::WorkerPanicked)
            }
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Capture ended with error during shutdown: {}", e);
        }
    }
}
