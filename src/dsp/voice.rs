//! Voice: one oscillator, scaled and panned onto the dry bus.

use std::f64::consts::FRAC_PI_4;

use crate::plan::OscillatorSpec;

use super::StereoBuffer;
use super::oscillator::Oscillator;

/// A single voice of the oscillator bank.
#[derive(Debug, Clone)]
pub struct Voice {
    oscillator: Oscillator,
    gain_l: f64,
    gain_r: f64,
}

impl Voice {
    /// Equal-power pan: `pan` -1 is hard left, +1 hard right.
    pub fn new(spec: &OscillatorSpec, sample_rate: f64) -> Self {
        let angle = (spec.pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
        Voice {
            oscillator: Oscillator::from_spec(spec, sample_rate),
            gain_l: spec.amplitude * angle.cos(),
            gain_r: spec.amplitude * angle.sin(),
        }
    }

    /// Add this voice onto `bus` starting at frame `offset`, one frame per
    /// entry of `envelope`. Successive calls continue the waveform.
    pub fn render_into(&mut self, envelope: &[f32], bus: &mut StereoBuffer, offset: usize) {
        let end = bus.frames().min(offset + envelope.len());
        for (i, &gain) in (offset..end).zip(envelope) {
            let s = self.oscillator.next_sample() * gain as f64;
            bus.left[i] += (s * self.gain_l) as f32;
            bus.right[i] += (s * self.gain_r) as f32;
        }
    }
}
