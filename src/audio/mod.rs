mod capture;
mod downmix;
mod fft;
mod producer;
mod sink;
mod store;
#[cfg(test)]
pub(crate) mod testing;
mod window;

pub use capture::{CaptureController, CaptureStats, ControlState};
pub use downmix::{decode_frames, downmix};
pub use fft::{
    to_decibel, SpectralEngine, WindowFunction, DECIBEL_FLOOR, MAGNITUDE_FLOOR, MAX_WINDOW_LENGTH,
};
pub use producer::{list_sources, Producer, PulseProducer, Pull};
pub use sink::{Sink, WavSink};
pub use store::SpectrumStore;
pub use window::WindowAccumulator;

use crate::error::{ConfigError, ProducerError};

/// Shape of the interleaved stream a producer delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub channels: u16,
    pub sample_rate: u32,
    /// Bytes per sample of one channel
    pub sample_width_bytes: u16,
    pub is_float: bool,
}

impl FormatDescriptor {
    /// 32-bit float, the only encoding the pipeline analyses.
    pub fn float32(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            sample_width_bytes: 4,
            is_float: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.sample_width_bytes != 4 || !self.is_float {
            return Err(ConfigError::UnsupportedEncoding {
                width: self.sample_width_bytes,
                is_float: self.is_float,
            });
        }
        Ok(())
    }

    /// Bytes in one interleaved frame (all channels)
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.sample_width_bytes as usize
    }
}

/// One delivery of interleaved PCM from a producer
#[derive(Debug, Clone, PartialEq)]
pub struct Burst {
    pub bytes: Vec<u8>,
    pub frames: usize,
    /// Endpoint flagged the content as silence; treat every sample as zero.
    pub silent: bool,
}

impl Burst {
    pub fn new(bytes: Vec<u8>, frames: usize) -> Self {
        Self {
            bytes,
            frames,
            silent: false,
        }
    }

    /// Encode interleaved f32 samples as a little-endian burst.
    pub fn from_samples(samples: &[f32], channels: u16) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let frames = samples.len() / channels.max(1) as usize;
        Self::new(bytes, frames)
    }

    pub fn silence(frames: usize, format: &FormatDescriptor) -> Self {
        Self {
            bytes: vec![0; frames * format.block_align()],
            frames,
            silent: true,
        }
    }

    /// frames × channels × width must equal the byte count.
    pub fn validate(&self, format: &FormatDescriptor) -> Result<(), ProducerError> {
        let expected = self.frames * format.block_align();
        if expected != self.bytes.len() {
            return Err(ProducerError::MalformedBurst {
                frames: self.frames,
                expected,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }
}

/// Latest frequency-domain result, `len = window / 2 + 1` bins
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub magnitude: Vec<f32>,
    pub decibel: Vec<f32>,
    /// Bin centre frequencies in Hz
    pub frequency: Vec<f32>,
}

impl Spectrum {
    /// Silent spectrum: zero magnitude, decibels at the floor.
    pub fn new(window_len: usize, sample_rate: u32) -> Self {
        let bins = spectrum_len(window_len);
        Self {
            magnitude: vec![0.0; bins],
            decibel: vec![DECIBEL_FLOOR; bins],
            frequency: frequency_axis(window_len, sample_rate),
        }
    }

    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Index, frequency, and decibel level of the loudest bin.
    pub fn peak(&self) -> Option<(usize, f32, f32)> {
        self.decibel
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, &db)| (i, self.frequency[i], db))
    }
}

/// Number of bins a real transform of `window_len` samples yields.
pub fn spectrum_len(window_len: usize) -> usize {
    window_len / 2 + 1
}

/// `frequency[i] = i * sample_rate / window_len`
pub fn frequency_axis(window_len: usize, sample_rate: u32) -> Vec<f32> {
    let step = sample_rate as f32 / window_len as f32;
    (0..spectrum_len(window_len)).map(|i| i as f32 * step).collect()
}

/// How the analysis window length is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowLength {
    Samples(usize),
    /// Target spacing between bins in Hz; resolved against the sample rate.
    BinSpacing(f32),
}

impl WindowLength {
    /// Resolve to a sample count. Bin spacing gives `sample_rate / hz` rounded
    /// to the nearest even number.
    pub fn resolve(&self, sample_rate: u32) -> Result<usize, ConfigError> {
        let len = match *self {
            WindowLength::Samples(n) => n,
            WindowLength::BinSpacing(hz) => {
                if !hz.is_finite() || hz <= 0.0 {
                    return Err(ConfigError::InvalidBinSpacing(hz));
                }
                let exact = sample_rate as f64 / hz as f64;
                ((exact / 2.0).round() * 2.0) as usize
            }
        };
        if len == 0 {
            return Err(ConfigError::ZeroWindowLength);
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_validation() {
        assert!(FormatDescriptor::float32(2, 48000).validate().is_ok());
        assert_eq!(
            FormatDescriptor::float32(0, 48000).validate(),
            Err(ConfigError::ZeroChannels)
        );
        assert_eq!(
            FormatDescriptor::float32(2, 0).validate(),
            Err(ConfigError::ZeroSampleRate)
        );

        let pcm16 = FormatDescriptor {
            channels: 2,
            sample_rate: 44100,
            sample_width_bytes: 2,
            is_float: false,
        };
        assert!(matches!(
            pcm16.validate(),
            Err(ConfigError::UnsupportedEncoding { width: 2, is_float: false })
        ));
    }

    #[test]
    fn test_burst_validation() {
        let format = FormatDescriptor::float32(2, 48000);
        let burst = Burst::from_samples(&[0.0; 8], 2);
        assert_eq!(burst.frames, 4);
        assert!(burst.validate(&format).is_ok());

        let short = Burst::new(vec![0; 30], 4);
        assert_eq!(
            short.validate(&format),
            Err(ProducerError::MalformedBurst {
                frames: 4,
                expected: 32,
                actual: 30
            })
        );
    }

    #[test]
    fn test_spectrum_shape() {
        for (len, rate) in [(4usize, 8000u32), (5, 44100), (1024, 48000), (480, 48000)] {
            let spectrum = Spectrum::new(len, rate);
            assert_eq!(spectrum.len(), len / 2 + 1);
            for (i, &f) in spectrum.frequency.iter().enumerate() {
                assert_eq!(f, i as f32 * (rate as f32 / len as f32));
            }
            assert!(spectrum.frequency.windows(2).all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn test_initial_spectrum_is_floor() {
        let spectrum = Spectrum::new(16, 16000);
        assert!(spectrum.magnitude.iter().all(|&m| m == 0.0));
        assert!(spectrum.decibel.iter().all(|&db| db == DECIBEL_FLOOR));
    }

    #[test]
    fn test_window_from_bin_spacing() {
        assert_eq!(WindowLength::BinSpacing(100.0).resolve(48000), Ok(480));
        assert_eq!(WindowLength::BinSpacing(10.0).resolve(44100), Ok(4410));
        assert_eq!(WindowLength::BinSpacing(30.0).resolve(44100), Ok(1470));
        // 48000 / 7 = 6857.14 -> nearest even is 6858
        assert_eq!(WindowLength::BinSpacing(7.0).resolve(48000), Ok(6858));
        assert_eq!(WindowLength::Samples(4).resolve(48000), Ok(4));
    }

    #[test]
    fn test_window_length_rejections() {
        assert_eq!(
            WindowLength::Samples(0).resolve(48000),
            Err(ConfigError::ZeroWindowLength)
        );
        assert_eq!(
            WindowLength::BinSpacing(0.0).resolve(48000),
            Err(ConfigError::InvalidBinSpacing(0.0))
        );
        assert_eq!(
            WindowLength::BinSpacing(100000.0).resolve(48000),
            Err(ConfigError::ZeroWindowLength)
        );
    }
}
