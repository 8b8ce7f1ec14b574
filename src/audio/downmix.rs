/// Average one interleaved frame down to a single mono sample.
///
/// `frame` must hold at least `channels` samples and `channels` must be
/// non-zero; format validation guarantees both before capture starts.
pub fn downmix(frame: &[f32], channels: usize) -> f32 {
    let sum: f32 = frame[..channels].iter().sum();
    sum / channels as f32
}

/// Iterate mono samples out of an interleaved little-endian f32 byte buffer.
///
/// Trailing bytes that do not form a whole frame are ignored.
pub fn decode_frames(bytes: &[u8], channels: usize) -> impl Iterator<Item = f32> + '_ {
    let mut frame = vec![0.0f32; channels];
    bytes.chunks_exact(channels * 4).map(move |raw| {
        for (slot, sample) in frame.iter_mut().zip(raw.chunks_exact(4)) {
            *slot = f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
        }
        downmix(&frame, channels)
    })
}
