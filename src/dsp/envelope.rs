//! ADSR envelope evaluated in closed form.
//!
//! The gate is held until `release` seconds before the end of the render,
//! so every voice has fully decayed when the target duration is reached.

use crate::plan::EnvelopeSpec;

/// Linear ADSR over a fixed render length.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
    /// Time at which the gate closes.
    gate_off: f64,
}

impl Envelope {
    pub fn new(spec: &EnvelopeSpec, total_sec: f64) -> Self {
        let release = spec.release.max(0.0).min(total_sec);
        Self {
            attack: spec.attack.max(0.0),
            decay: spec.decay.max(0.0),
            sustain: spec.sustain.clamp(0.0, 1.0),
            release,
            gate_off: total_sec - release,
        }
    }

    /// Level while the gate is open.
    fn held(&self, t: f64) -> f64 {
        if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            let k = (t - self.attack) / self.decay;
            1.0 - (1.0 - self.sustain) * k
        } else {
            self.sustain
        }
    }

    /// Level at time `t` seconds, in [0, 1].
    pub fn level_at(&self, t: f64) -> f64 {
        if t < self.gate_off {
            return self.held(t);
        }
        if self.release <= 0.0 {
            return 0.0;
        }
        let start = self.held(self.gate_off);
        let k = ((t - self.gate_off) / self.release).min(1.0);
        start * (1.0 - k)
    }

    /// Write the gain of frames `first_frame..first_frame + out.len()`.
    pub fn fill(&self, first_frame: usize, sample_rate: f64, out: &mut [f32]) {
        for (n, gain) in (first_frame..).zip(out.iter_mut()) {
            *gain = self.level_at(n as f64 / sample_rate) as f32;
        }
    }
}
