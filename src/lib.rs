//! Loopback audio capture with a continuously refreshed frequency spectrum.
//!
//! A [`CaptureController`](audio::CaptureController) pulls bursts from a
//! [`Producer`](audio::Producer) on its own thread, downmixes them to mono,
//! slices the stream into fixed-length windows, and publishes the magnitude
//! and decibel spectrum of each window to a [`SpectrumStore`](audio::SpectrumStore)
//! that any number of threads can read while capture runs.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;

pub use audio::{
    Burst, CaptureController, ControlState, FormatDescriptor, Spectrum, SpectrumStore,
    WindowLength,
};
pub use error::CaptureError;
