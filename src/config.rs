use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::{WindowFunction, WindowLength};
use crate::cli::Args;

/// Window length used when neither a length nor a bin spacing is configured
pub const DEFAULT_WINDOW_LENGTH: usize = 2048;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub capture: CaptureConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Sink whose monitor is captured (None = default sink)
    pub device: Option<String>,
    /// Raw source name, used as-is instead of a sink monitor
    #[serde(default)]
    pub source: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames per read from the audio server
    pub burst_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub window_length: Option<usize>,
    pub bin_spacing_hz: Option<f32>,
    #[serde(default)]
    pub window_function: WindowFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SinkConfig {
    pub wav_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub refresh_ms: u64,
    pub top_bins: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 250,
            top_bins: 5,
        }
    }
}

impl AnalysisConfig {
    /// An explicit length wins over a bin spacing.
    pub fn window(&self) -> WindowLength {
        match (self.window_length, self.bin_spacing_hz) {
            (Some(len), _) => WindowLength::Samples(len),
            (None, Some(hz)) => WindowLength::BinSpacing(hz),
            (None, None) => WindowLength::Samples(DEFAULT_WINDOW_LENGTH),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                device: None,
                source: None,
                sample_rate: 48000,
                channels: 2,
                burst_frames: 480,
            },
            analysis: AnalysisConfig {
                window_length: Some(DEFAULT_WINDOW_LENGTH),
                bin_spacing_hz: None,
                window_function: WindowFunction::Rectangular,
            },
            sink: SinkConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/loopscope/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("loopscope").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists
    /// Returns None if file doesn't exist, logs warning on parse errors
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            match Self::load(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config at {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        }
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, Self::generate_config_template())?;

        Ok(path)
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r#"# Loopscope Configuration
# This file is auto-generated. Edit as needed.

[capture]
# Output sink whose monitor is captured (omit = default sink)
# device = "alsa_output.pci-0000_00_1f.3.analog-stereo"
# Raw source name, used instead of a sink monitor (see --list-sources)
# source = "alsa_input.usb-mic.mono-fallback"
# Sample rate in Hz
sample_rate = 48000
# Channels to capture; they are averaged to mono for analysis
channels = 2
# Frames per read from the audio server
burst_frames = 480

[analysis]
# Analysis window length in samples
window_length = 2048
# Or derive it from a target bin spacing in Hz (used when window_length is omitted)
# bin_spacing_hz = 10.0
# Window function: "rectangular" or "hann"
window_function = "rectangular"

[sink]
# Record raw captured frames to a 32-bit float WAV file
# wav_path = "/tmp/loopscope.wav"

[output]
# Print interval in milliseconds
refresh_ms = 250
# Number of strongest bins to print
top_bins = 5
"#
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(ref device) = args.device {
            self.capture.device = Some(device.clone());
            self.capture.source = None;
        }
        if let Some(ref source) = args.source {
            self.capture.source = Some(source.clone());
        }
        if let Some(rate) = args.sample_rate {
            self.capture.sample_rate = rate;
        }
        if let Some(channels) = args.channels {
            self.capture.channels = channels;
        }

        if let Some(len) = args.window {
            self.analysis.window_length = Some(len);
        }
        if let Some(hz) = args.bin_spacing {
            self.analysis.window_length = None;
            self.analysis.bin_spacing_hz = Some(hz);
        }
        if args.hann {
            self.analysis.window_function = WindowFunction::Hann;
        }

        if let Some(ref path) = args.record {
            self.sink.wav_path = Some(path.clone());
        }

        if let Some(ms) = args.refresh_ms {
            self.output.refresh_ms = ms;
        }
        if let Some(top) = args.top {
            self.output.top_bins = top;
        }
    }
}
