use libpulse_binding as pulse;
use libpulse_simple_binding as psimple;
use pulse::sample::{Format, Spec};
use pulse::stream::Direction;
use tracing::{debug, info, warn};

use super::{Burst, FormatDescriptor};
use crate::error::ProducerError;

/// Outcome of one pull from a producer
#[derive(Debug)]
pub enum Pull {
    Burst(Burst),
    /// Nothing available yet; try again.
    Empty,
    /// The stream ended on its own.
    EndOfStream,
}

/// Source of timestamp-ordered bursts of interleaved PCM.
///
/// The capture thread owns the producer for the whole session. `open` is
/// called when a session starts and `close` when it ends, so one producer can
/// serve several start/stop cycles.
pub trait Producer: Send {
    fn format(&self) -> FormatDescriptor;

    fn open(&mut self) -> Result<(), ProducerError>;

    /// Fetch the next burst. With `blocking` set, waits for the endpoint's
    /// next delivery (implementations may still return `Empty` after a
    /// bounded wait).
    fn pull_next_burst(&mut self, blocking: bool) -> Result<Pull, ProducerError>;

    fn close(&mut self);
}

/// List available PulseAudio/PipeWire sources.
///
/// Returns a list of `(name, state)` tuples parsed from `pactl list short sources`.
pub fn list_sources() -> anyhow::Result<Vec<(String, String)>> {
    let output = std::process::Command::new("pactl")
        .args(["list", "short", "sources"])
        .output()
        .map_err(|e| anyhow::anyhow!("Failed to run pactl: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("pactl list short sources failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let mut sources = Vec::new();
    for line in text.lines() {
        // Format: <id>\t<name>\t<module>\t<sample_spec>\t<state>
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() >= 5 {
            sources.push((cols[1].to_string(), cols[4].to_string()));
        }
    }
    Ok(sources)
}

/// Loopback capture from a PulseAudio/PipeWire monitor source.
///
/// Records 32-bit float frames; every pull blocks until one burst of
/// `burst_frames` frames has been read, since the simple API offers no
/// non-blocking read.
pub struct PulseProducer {
    source: Option<String>,
    format: FormatDescriptor,
    burst_frames: usize,
    connection: Option<psimple::Simple>,
}

impl PulseProducer {
    /// Capture the monitor of `sink_name`, or of the default sink when `None`.
    pub fn monitor(
        sink_name: Option<String>,
        channels: u16,
        sample_rate: u32,
        burst_frames: usize,
    ) -> Self {
        let source = match sink_name {
            Some(sink_name) => {
                let monitor = format!("{}.monitor", sink_name);
                info!("Using explicit sink monitor: {}", monitor);
                Some(monitor)
            }
            None => Self::find_monitor_source(),
        };
        Self::with_source(source, channels, sample_rate, burst_frames)
    }

    /// Capture a raw source name as listed by `list_sources()` (no `.monitor` appended).
    pub fn with_source(
        source: Option<String>,
        channels: u16,
        sample_rate: u32,
        burst_frames: usize,
    ) -> Self {
        Self {
            source,
            format: FormatDescriptor::float32(channels, sample_rate),
            burst_frames: burst_frames.max(1),
            connection: None,
        }
    }

    /// Find a monitor source for capturing system audio output.
    ///
    /// Queries PulseAudio/PipeWire for the default sink and uses its monitor
    /// source, so we always capture from whatever output the user is listening to.
    fn find_monitor_source() -> Option<String> {
        if let Ok(output) = std::process::Command::new("pactl")
            .args(["get-default-sink"])
            .output()
        {
            if output.status.success() {
                let sink_name = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !sink_name.is_empty() {
                    let monitor = format!("{}.monitor", sink_name);
                    info!("Using default sink monitor: {}", monitor);
                    return Some(monitor);
                }
            }
        }

        warn!("Could not determine default sink, using PulseAudio default source");
        None
    }
}

impl Producer for PulseProducer {
    fn format(&self) -> FormatDescriptor {
        self.format
    }

    fn open(&mut self) -> Result<(), ProducerError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let spec = Spec {
            format: Format::F32le,
            channels: self.format.channels as u8,
            rate: self.format.sample_rate,
        };

        if self.format.channels > u8::MAX as u16 || !spec.is_valid() {
            return Err(ProducerError::Open(format!(
                "invalid PulseAudio sample spec: {} channel(s) at {} Hz",
                self.format.channels, self.format.sample_rate
            )));
        }

        info!("Using audio device: {}", self.source.as_deref().unwrap_or("default"));

        let simple = psimple::Simple::new(
            None,                     // Use default server
            "loopscope",              // Application name
            Direction::Record,        // Recording stream
            self.source.as_deref(),   // Device name (None = default)
            "spectrum-capture",       // Stream description
            &spec,                    // Sample format
            None,                     // Default channel map
            None,                     // Default buffering attributes
        )
        .map_err(|e| ProducerError::Open(format!("{:?}", e)))?;

        debug!("Connected to PulseAudio");
        self.connection = Some(simple);
        Ok(())
    }

    fn pull_next_burst(&mut self, _blocking: bool) -> Result<Pull, ProducerError> {
        let Some(connection) = self.connection.as_ref() else {
            return Err(ProducerError::DeviceLost("stream is not open".to_string()));
        };

        let mut bytes = vec![0u8; self.burst_frames * self.format.block_align()];
        connection
            .read(&mut bytes)
            .map_err(|e| ProducerError::DeviceLost(format!("{:?}", e)))?;

        Ok(Pull::Burst(Burst::new(bytes, self.burst_frames)))
    }

    fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!("Closed PulseAudio stream");
        }
    }
}
