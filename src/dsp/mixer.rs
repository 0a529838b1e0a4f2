//! Master bus: gain, soft clipping and 16-bit conversion.

use super::StereoBuffer;

/// Final gain stage applied during mixdown.
#[derive(Debug, Clone, Copy)]
pub struct MasterBus {
    pub gain: f64,
}

impl MasterBus {
    pub fn new(gain: f64) -> Self {
        Self { gain }
    }

    /// Gain + tanh soft clip of frame `i`, as `[left, right]` i16.
    pub fn frame_i16(&self, bus: &StereoBuffer, i: usize) -> [i16; 2] {
        [self.quantize(bus.left[i]), self.quantize(bus.right[i])]
    }

    fn quantize(&self, sample: f32) -> i16 {
        let shaped = soft_clip(sample as f64 * self.gain);
        (shaped * 32767.0).round().clamp(-32768.0, 32767.0) as i16
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
