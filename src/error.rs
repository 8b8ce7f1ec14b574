use thiserror::Error;

/// Rejected before any capture thread exists
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Window length must be positive")]
    ZeroWindowLength,

    #[error("Bin spacing must be a positive number of Hz, got {0}")]
    InvalidBinSpacing(f32),

    #[error("Stream must have at least one channel")]
    ZeroChannels,

    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("Unsupported sample encoding: {width} byte(s), float={is_float} (only 32-bit float is supported)")]
    UnsupportedEncoding { width: u16, is_float: bool },
}

/// Raised by a Producer; always fatal to the current session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProducerError {
    #[error("Failed to open audio endpoint: {0}")]
    Open(String),

    #[error("Audio endpoint lost: {0}")]
    DeviceLost(String),

    #[error("Stream format changed during capture")]
    FormatChanged,

    #[error("Malformed burst: {frames} frame(s) need {expected} bytes, got {actual}")]
    MalformedBurst {
        frames: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Failed to create recording: {0}")]
    Create(String),

    #[error("Failed to write recording: {0}")]
    Write(String),

    #[error("Failed to finalize recording: {0}")]
    Finalize(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Transform length must be positive")]
    ZeroLength,

    #[error("Cannot plan a transform of {len} samples (maximum {max})")]
    Unplannable { len: usize, max: usize },

    #[error("Window holds {actual} samples, transform expects {expected}")]
    WindowLength { expected: usize, actual: usize },

    #[error("Transform failed: {0}")]
    Transform(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Destination holds {actual} bins, spectrum has {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Everything the capture controller can report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(String),

    #[error("Capture thread panicked")]
    WorkerPanicked,

    #[error("Capture session resources were lost; build a new controller")]
    SessionLost,
}
