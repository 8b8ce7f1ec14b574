use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "loopscope")]
#[command(author, version, about = "Loopback audio capture with a live frequency spectrum")]
pub struct Args {
    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write a commented default config to the XDG config path and exit
    #[arg(long)]
    pub init_config: bool,

    /// List PulseAudio/PipeWire sources and exit
    #[arg(long)]
    pub list_sources: bool,

    /// Output sink whose monitor should be captured (default: system default sink)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Raw source name to capture, as printed by --list-sources
    #[arg(long, conflicts_with = "device")]
    pub source: Option<String>,

    /// Capture sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Capture channel count
    #[arg(long)]
    pub channels: Option<u16>,

    /// Analysis window length in samples
    #[arg(short, long)]
    pub window: Option<usize>,

    /// Target spacing between frequency bins in Hz (overrides the window length)
    #[arg(short, long, conflicts_with = "window")]
    pub bin_spacing: Option<f32>,

    /// Apply a Hann taper before the transform
    #[arg(long)]
    pub hann: bool,

    /// Record raw captured frames to this WAV file
    #[arg(short, long)]
    pub record: Option<PathBuf>,

    /// How often to print the spectrum, in milliseconds
    #[arg(long)]
    pub refresh_ms: Option<u64>,

    /// Number of strongest bins to print each refresh
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long)]
    pub duration: Option<u64>,
}
