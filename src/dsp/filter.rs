//! Biquad filter (Audio EQ Cookbook coefficients), applied per channel.

use std::f64::consts::PI;

use crate::plan::FilterMode;

use super::StereoEffect;

/// A second-order IIR section in Direct Form II Transposed.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// Cutoff is kept below Nyquist so low render rates stay stable.
    pub fn new(mode: FilterMode, cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let cutoff = cutoff_hz.clamp(10.0, 0.45 * sample_rate);
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q.max(0.1));

        let (b0, b1, b2) = match mode {
            FilterMode::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterMode::Highpass => {
                let b1 = -(1.0 + cos_w0);
                (-b1 / 2.0, b1, -b1 / 2.0)
            }
        };
        let a0 = 1.0 + alpha;

        Biquad {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

/// Independent biquads on the left and right channels.
#[derive(Debug, Clone)]
pub struct StereoFilter {
    left: Biquad,
    right: Biquad,
}

impl StereoFilter {
    pub fn new(mode: FilterMode, cutoff_hz: f64, q: f64, sample_rate: f64) -> Self {
        let section = Biquad::new(mode, cutoff_hz, q, sample_rate);
        Self {
            left: section.clone(),
            right: section,
        }
    }
}

impl StereoEffect for StereoFilter {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (
            self.left.process(left as f64) as f32,
            self.right.process(right as f64) as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled_amplitude(mode: FilterMode, cutoff: f64, tone_hz: f64) -> f64 {
        let sr = 8000.0;
        let mut f = Biquad::new(mode, cutoff, 0.707, sr);
        let mut peak: f64 = 0.0;
        for n in 0..8000 {
            let x = (2.0 * PI * tone_hz * n as f64 / sr).sin();
            let y = f.process(x);
            if n > 4000 {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = Biquad::new(FilterMode::Lowpass, 500.0, 0.707, 8000.0);
        let mut y = 0.0;
        for _ in 0..4000 {
            y = f.process(1.0);
        }
        assert!((y - 1.0).abs() < 1e-6, "DC gain {y}");
    }

    #[test]
    fn lowpass_attenuates_high_tones() {
        let amp = settled_amplitude(FilterMode::Lowpass, 200.0, 3000.0);
        assert!(amp < 0.05, "high tone leaked: {amp}");
    }

    #[test]
    fn highpass_blocks_dc_and_passes_high_tones() {
        let mut f = Biquad::new(FilterMode::Highpass, 300.0, 0.707, 8000.0);
        let mut y = 1.0;
        for _ in 0..4000 {
            y = f.process(1.0);
        }
        assert!(y.abs() < 1e-6, "DC leaked: {y}");
        let amp = settled_amplitude(FilterMode::Highpass, 100.0, 2000.0);
        assert!(amp > 0.9, "high tone attenuated: {amp}");
    }

    #[test]
    fn cutoff_above_nyquist_stays_finite() {
        let mut f = StereoFilter::new(FilterMode::Lowpass, 20_000.0, 0.707, 4000.0);
        for n in 0..4000 {
            let x = if n % 2 == 0 { 1.0 } else { -1.0 };
            let (l, r) = f.process(x, x);
            assert!(l.is_finite() && r.is_finite());
        }
    }
}
