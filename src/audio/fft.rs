use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::Spectrum;
use crate::error::EngineError;

/// Magnitudes at or below this are reported at the decibel floor
pub const MAGNITUDE_FLOOR: f32 = 1e-6;

/// `20 * log10(MAGNITUDE_FLOOR)`
pub const DECIBEL_FLOOR: f32 = -120.0;

/// Largest transform the engine will plan
pub const MAX_WINDOW_LENGTH: usize = 1 << 22;

/// Taper applied to each window before the transform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    #[default]
    Rectangular,
    Hann,
}

impl WindowFunction {
    fn coefficients(&self, len: usize) -> Option<Vec<f32>> {
        match self {
            WindowFunction::Rectangular => None,
            WindowFunction::Hann if len < 2 => Some(vec![1.0; len]),
            WindowFunction::Hann => Some(
                (0..len)
                    .map(|i| {
                        0.5 * (1.0
                            - (2.0 * std::f32::consts::PI * i as f32 / (len - 1) as f32).cos())
                    })
                    .collect(),
            ),
        }
    }
}

/// Convert a linear magnitude to decibels, clamped at `DECIBEL_FLOOR`.
pub fn to_decibel(magnitude: f32) -> f32 {
    if magnitude <= MAGNITUDE_FLOOR || magnitude.is_nan() {
        DECIBEL_FLOOR
    } else {
        20.0 * magnitude.log10()
    }
}

/// Real-input transform of one filled window into magnitude and decibel bins
pub struct SpectralEngine {
    window_len: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    taper: Option<Vec<f32>>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    spectrum: Spectrum,
}

impl SpectralEngine {
    pub fn new(
        window_len: usize,
        sample_rate: u32,
        window_function: WindowFunction,
    ) -> Result<Self, EngineError> {
        if window_len == 0 {
            return Err(EngineError::ZeroLength);
        }
        if window_len > MAX_WINDOW_LENGTH {
            return Err(EngineError::Unplannable {
                len: window_len,
                max: MAX_WINDOW_LENGTH,
            });
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_len);

        Ok(Self {
            window_len,
            input: fft.make_input_vec(),
            output: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            taper: window_function.coefficients(window_len),
            spectrum: Spectrum::new(window_len, sample_rate),
        })
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn spectrum_len(&self) -> usize {
        self.spectrum.len()
    }

    /// Most recent result (the silent spectrum before the first transform)
    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    /// Transform a full window. `window` must hold exactly `window_len` samples.
    pub fn transform(&mut self, window: &[f32]) -> Result<&Spectrum, EngineError> {
        if window.len() != self.window_len {
            return Err(EngineError::WindowLength {
                expected: self.window_len,
                actual: window.len(),
            });
        }

        match &self.taper {
            Some(taper) => {
                for ((slot, &sample), &coef) in self.input.iter_mut().zip(window).zip(taper) {
                    *slot = sample * coef;
                }
            }
            None => self.input.copy_from_slice(window),
        }

        self.fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
            .map_err(|e| EngineError::Transform(e.to_string()))?;

        // Every bin except DC and (for even lengths) Nyquist has a mirrored
        // negative-frequency twin, so only those get doubled.
        let len = self.window_len as f32;
        let nyquist = (self.window_len % 2 == 0).then_some(self.window_len / 2);
        for (i, bin) in self.output.iter().enumerate() {
            let scale = if i == 0 || Some(i) == nyquist { 1.0 } else { 2.0 };
            let magnitude = bin.norm() * scale / len;
            self.spectrum.magnitude[i] = magnitude;
            self.spectrum.decibel[i] = to_decibel(magnitude);
        }

        Ok(&self.spectrum)
    }
}
