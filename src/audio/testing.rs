//! Scripted producer and in-memory sink for exercising the capture thread.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use super::{Burst, FormatDescriptor, Producer, Pull, Sink};
use crate::error::{ProducerError, SinkError};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

enum Scripted {
    Burst(Burst),
    Fail(ProducerError),
    Reformat(FormatDescriptor),
    End,
}

/// Producer fed from a channel; bursts are delivered in send order.
pub struct ScriptedProducer {
    format: FormatDescriptor,
    rx: Receiver<Scripted>,
    open: Arc<AtomicBool>,
}

/// Test-side handle pushing bursts into a `ScriptedProducer`
#[derive(Clone)]
pub struct ProducerHandle {
    format: FormatDescriptor,
    tx: Sender<Scripted>,
    open: Arc<AtomicBool>,
}

pub fn scripted(format: FormatDescriptor) -> (ScriptedProducer, ProducerHandle) {
    let (tx, rx) = mpsc::channel();
    let open = Arc::new(AtomicBool::new(false));
    (
        ScriptedProducer {
            format,
            rx,
            open: open.clone(),
        },
        ProducerHandle { format, tx, open },
    )
}

impl ProducerHandle {
    /// Queue interleaved samples as one burst.
    pub fn send_samples(&self, samples: &[f32]) {
        let _ = self
            .tx
            .send(Scripted::Burst(Burst::from_samples(samples, self.format.channels)));
    }

    pub fn send_burst(&self, burst: Burst) {
        let _ = self.tx.send(Scripted::Burst(burst));
    }

    pub fn fail(&self, error: ProducerError) {
        let _ = self.tx.send(Scripted::Fail(error));
    }

    /// Switch the stream format the producer reports from its next pull on.
    pub fn reformat(&self, format: FormatDescriptor) {
        let _ = self.tx.send(Scripted::Reformat(format));
    }

    pub fn end(&self) {
        let _ = self.tx.send(Scripted::End);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Producer for ScriptedProducer {
    fn format(&self) -> FormatDescriptor {
        self.format
    }

    fn open(&mut self) -> Result<(), ProducerError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Always waits up to a short poll interval, like a blocking endpoint read.
    fn pull_next_burst(&mut self, _blocking: bool) -> Result<Pull, ProducerError> {
        let next = match self.rx.recv_timeout(POLL_INTERVAL) {
            Ok(next) => next,
            Err(RecvTimeoutError::Timeout) => return Ok(Pull::Empty),
            Err(RecvTimeoutError::Disconnected) => return Ok(Pull::EndOfStream),
        };

        match next {
            Scripted::Burst(burst) => Ok(Pull::Burst(burst)),
            Scripted::Fail(error) => Err(error),
            Scripted::Reformat(format) => {
                self.format = format;
                Ok(Pull::Empty)
            }
            Scripted::End => Ok(Pull::EndOfStream),
        }
    }

    fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

/// Everything a `MemorySink` has seen, shared with the test
#[derive(Debug, Default)]
pub struct SinkLog {
    pub sessions: usize,
    pub bytes: Vec<u8>,
    pub finalized: Vec<(FormatDescriptor, u64)>,
}

pub struct MemorySink {
    log: Arc<Mutex<SinkLog>>,
    fail_writes: bool,
    fail_finalize: bool,
}

impl MemorySink {
    pub fn new() -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (
            Self {
                log: log.clone(),
                fail_writes: false,
                fail_finalize: false,
            },
            log,
        )
    }

    pub fn failing() -> (Self, Arc<Mutex<SinkLog>>) {
        let (mut sink, log) = Self::new();
        sink.fail_writes = true;
        (sink, log)
    }

    /// Accepts writes but cannot finalize the recording
    pub fn unfinishable() -> (Self, Arc<Mutex<SinkLog>>) {
        let (mut sink, log) = Self::new();
        sink.fail_finalize = true;
        (sink, log)
    }
}

impl Sink for MemorySink {
    fn begin(&mut self, _format: &FormatDescriptor) -> Result<(), SinkError> {
        self.log.lock().sessions += 1;
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::Write("disk full".to_string()));
        }
        self.log.lock().bytes.extend_from_slice(bytes);
        Ok(())
    }

    fn finalize(&mut self, format: &FormatDescriptor, total_frames: u64) -> Result<(), SinkError> {
        if self.fail_finalize {
            return Err(SinkError::Finalize("header rewrite failed".to_string()));
        }
        self.log.lock().finalized.push((*format, total_frames));
        Ok(())
    }
}
