use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::FormatDescriptor;
use crate::error::SinkError;

/// Durable destination for the raw captured frames
pub trait Sink: Send {
    /// Called once when a capture session starts.
    fn begin(&mut self, format: &FormatDescriptor) -> Result<(), SinkError>;

    /// Interleaved little-endian frames exactly as the producer delivered them.
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SinkError>;

    /// Called once when the session stops, after the last `write_raw`.
    fn finalize(&mut self, format: &FormatDescriptor, total_frames: u64) -> Result<(), SinkError>;
}

/// Records each capture session to a 32-bit float WAV file.
///
/// The first session writes `path`; later sessions write `<stem>-2.wav`,
/// `<stem>-3.wav`, and so on, so a restart never clobbers an earlier take.
pub struct WavSink {
    path: PathBuf,
    session: u32,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            session: 0,
            writer: None,
        }
    }

    /// File the current (or most recent) session records to.
    pub fn session_path(&self) -> PathBuf {
        session_path(&self.path, self.session.max(1))
    }
}

fn session_path(base: &Path, session: u32) -> PathBuf {
    if session <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_string());
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "wav".to_string());
    base.with_file_name(format!("{}-{}.{}", stem, session, ext))
}

impl Sink for WavSink {
    fn begin(&mut self, format: &FormatDescriptor) -> Result<(), SinkError> {
        if self.writer.is_some() {
            warn!("Recording session was not finalized, starting a new one");
        }

        self.session += 1;
        let path = self.session_path();
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.sample_width_bytes * 8,
            sample_format: hound::SampleFormat::Float,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| SinkError::Create(format!("{}: {}", path.display(), e)))?;
        info!("Recording to {}", path.display());
        self.writer = Some(writer);
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::Write("no recording session".to_string()))?;

        for raw in bytes.chunks_exact(4) {
            let sample = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            writer
                .write_sample(sample)
                .map_err(|e| SinkError::Write(e.to_string()))?;
        }
        Ok(())
    }

    fn finalize(&mut self, format: &FormatDescriptor, total_frames: u64) -> Result<(), SinkError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        let written = writer.len() as u64 / format.channels.max(1) as u64;
        if written != total_frames {
            warn!(
                "Recording holds {} frames but {} were captured",
                written, total_frames
            );
        }

        writer
            .finalize()
            .map_err(|e| SinkError::Finalize(e.to_string()))?;
        debug!("Finalized {} ({} frames)", self.session_path().display(), written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_wav(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("loopscope-{}-{}-{}.wav", name, std::process::id(), nanos))
    }

    fn encode(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_session_paths() {
        let base = Path::new("/tmp/take.wav");
        assert_eq!(session_path(base, 1), PathBuf::from("/tmp/take.wav"));
        assert_eq!(session_path(base, 3), PathBuf::from("/tmp/take-3.wav"));
    }

    #[test]
    fn test_writes_readable_wav() {
        let path = temp_wav("roundtrip");
        let format = FormatDescriptor::float32(2, 48000);
        let samples = [0.5f32, -0.5, 0.25, -0.25, 1.0, -1.0];

        let mut sink = WavSink::new(&path);
        sink.begin(&format).unwrap();
        sink.write_raw(&encode(&samples[..4])).unwrap();
        sink.write_raw(&encode(&samples[4..])).unwrap();
        sink.finalize(&format, 3).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48000);
        assert_eq!(spec.bits_per_sample, 32);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        let read: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_write_without_session_fails() {
        let mut sink = WavSink::new(temp_wav("unopened"));
        assert!(matches!(sink.write_raw(&[0; 8]), Err(SinkError::Write(_))));
    }

    #[test]
    fn test_second_session_gets_new_file() {
        let path = temp_wav("sessions");
        let format = FormatDescriptor::float32(1, 8000);
        let mut sink = WavSink::new(&path);

        sink.begin(&format).unwrap();
        sink.finalize(&format, 0).unwrap();
        sink.begin(&format).unwrap();
        let second = sink.session_path();
        sink.finalize(&format, 0).unwrap();

        assert_ne!(second, path);
        assert!(path.exists());
        assert!(second.exists());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(&second);
    }
}
