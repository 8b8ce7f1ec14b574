use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Spectrum;
use crate::error::StoreError;

/// Latest spectrum snapshot shared between the capture thread and readers.
///
/// A single mutex guards copy-in and copy-out, so a reader sees either the
/// whole previous snapshot or the whole new one.
#[derive(Debug)]
pub struct SpectrumStore {
    snapshot: Mutex<Spectrum>,
    bins: usize,
    generation: AtomicU64,
}

impl SpectrumStore {
    pub fn new(window_len: usize, sample_rate: u32) -> Self {
        let snapshot = Spectrum::new(window_len, sample_rate);
        Self {
            bins: snapshot.len(),
            snapshot: Mutex::new(snapshot),
            generation: AtomicU64::new(0),
        }
    }

    /// `window_len / 2 + 1`
    pub fn spectrum_len(&self) -> usize {
        self.bins
    }

    /// Number of completed publishes. Changes whenever fresh data lands.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the snapshot with `spectrum`.
    pub(crate) fn publish(&self, spectrum: &Spectrum) {
        let mut snapshot = self.snapshot.lock();
        snapshot.magnitude.copy_from_slice(&spectrum.magnitude);
        snapshot.decibel.copy_from_slice(&spectrum.decibel);
        snapshot.frequency.copy_from_slice(&spectrum.frequency);
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn read_magnitude(&self, dst: &mut [f32]) -> Result<(), StoreError> {
        self.check_len(dst)?;
        dst.copy_from_slice(&self.snapshot.lock().magnitude);
        Ok(())
    }

    pub fn read_decibel(&self, dst: &mut [f32]) -> Result<(), StoreError> {
        self.check_len(dst)?;
        dst.copy_from_slice(&self.snapshot.lock().decibel);
        Ok(())
    }

    pub fn read_frequency_axis(&self, dst: &mut [f32]) -> Result<(), StoreError> {
        self.check_len(dst)?;
        dst.copy_from_slice(&self.snapshot.lock().frequency);
        Ok(())
    }

    /// Copy all three arrays from the same publish.
    pub fn read_snapshot(&self, dst: &mut Spectrum) -> Result<(), StoreError> {
        self.check_len(&dst.magnitude)?;
        self.check_len(&dst.decibel)?;
        self.check_len(&dst.frequency)?;

        let snapshot = self.snapshot.lock();
        dst.magnitude.copy_from_slice(&snapshot.magnitude);
        dst.decibel.copy_from_slice(&snapshot.decibel);
        dst.frequency.copy_from_slice(&snapshot.frequency);
        Ok(())
    }

    /// Owned copy of the current snapshot.
    pub fn snapshot(&self) -> Spectrum {
        self.snapshot.lock().clone()
    }

    /// Index, frequency, and level of the loudest bin right now.
    pub fn peak(&self) -> Option<(usize, f32, f32)> {
        self.snapshot.lock().peak()
    }

    fn check_len(&self, dst: &[f32]) -> Result<(), StoreError> {
        if dst.len() != self.bins {
            return Err(StoreError::LengthMismatch {
                expected: self.bins,
                actual: dst.len(),
            });
        }
        Ok(())
    }
}
