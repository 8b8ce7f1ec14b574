/// Fixed-length analysis window fed one mono sample at a time.
///
/// Accumulation runs across burst boundaries, so a single window may hold
/// samples from several producer deliveries. Only the capture thread appends.
#[derive(Debug)]
pub struct WindowAccumulator {
    buffer: Vec<f32>,
    cursor: usize,
    completed: u64,
}

impl WindowAccumulator {
    /// `len` must be positive; the engine rejects zero lengths before this is built.
    pub fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len],
            cursor: 0,
            completed: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of windows handed to `on_full` since the last reset.
    pub fn windows_completed(&self) -> u64 {
        self.completed
    }

    /// Write `sample` at the cursor. When the window fills, `on_full` sees the
    /// whole buffer before the cursor wraps back to zero.
    ///
    /// Returns true if this sample completed a window.
    pub fn append<F>(&mut self, sample: f32, mut on_full: F) -> bool
    where
        F: FnMut(&[f32]),
    {
        self.buffer[self.cursor] = sample;
        self.cursor += 1;

        if self.cursor == self.buffer.len() {
            on_full(&self.buffer);
            self.completed += 1;
            self.cursor = 0;
            return true;
        }
        false
    }

    /// Start a fresh window, dropping any partially accumulated samples.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.completed = 0;
    }
}
