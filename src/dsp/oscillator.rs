//! Anti-aliased oscillators using PolyBLEP.

use std::f64::consts::PI;

use crate::plan::{OscillatorSpec, Waveform};

/// A band-limited oscillator with anti-aliasing (PolyBLEP).
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    /// Phase increment per sample, detune already applied.
    increment: f64,
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64, detune_cents: f64, sample_rate: f64) -> Self {
        let effective = frequency * 2.0_f64.powf(detune_cents / 1200.0);
        Oscillator {
            waveform,
            increment: effective / sample_rate,
            phase: 0.0,
        }
    }

    pub fn from_spec(spec: &OscillatorSpec, sample_rate: f64) -> Self {
        Self::new(spec.waveform, spec.frequency_hz, spec.detune_cents, sample_rate)
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let t = self.phase;
        let dt = self.increment;
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * t).sin(),
            Waveform::Sawtooth => 2.0 * t - 1.0 - poly_blep(t, dt),
            Waveform::Square => {
                let naive = if t < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(t, dt) - poly_blep((t + 0.5) % 1.0, dt)
            }
            // Piecewise linear: -1 -> +1 over the first half, back over the second.
            Waveform::Triangle => {
                if t < 0.5 {
                    4.0 * t - 1.0
                } else {
                    3.0 - 4.0 * t
                }
            }
        };

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

/// PolyBLEP correction for a discontinuity at phase 0.
///
/// `t` is the phase in [0, 1), `dt` the phase increment per sample.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_range(waveform: Waveform, bound: f64) {
        let mut osc = Oscillator::new(waveform, 440.0, 0.0, 44100.0);
        for _ in 0..44100 {
            let s = osc.next_sample();
            assert!(s.abs() <= bound, "{waveform:?} out of range: {s}");
        }
    }

    #[test]
    fn sine_starts_at_zero() {
        let mut osc = Oscillator::new(Waveform::Sine, 440.0, 0.0, 44100.0);
        assert!(osc.next_sample().abs() < 1e-10);
    }

    #[test]
    fn waveforms_stay_bounded() {
        assert_range(Waveform::Sine, 1.0);
        assert_range(Waveform::Triangle, 1.0);
        assert_range(Waveform::Sawtooth, 1.5);
        assert_range(Waveform::Square, 1.5);
    }

    #[test]
    fn octave_detune_doubles_increment() {
        let base = Oscillator::new(Waveform::Sine, 440.0, 0.0, 44100.0);
        let up = Oscillator::new(Waveform::Sine, 440.0, 1200.0, 44100.0);
        assert!((up.increment - 2.0 * base.increment).abs() < 1e-12);
    }

    #[test]
    fn identical_oscillators_agree_sample_for_sample() {
        let mut a = Oscillator::new(Waveform::Square, 311.0, 7.0, 8000.0);
        let mut b = a.clone();
        for _ in 0..1000 {
            assert_eq!(a.next_sample().to_bits(), b.next_sample().to_bits());
        }
    }
}
