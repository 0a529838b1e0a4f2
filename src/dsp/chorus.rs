//! Chorus: LFO-modulated short delay, quadrature LFOs for stereo spread.

use std::f64::consts::PI;

use super::StereoEffect;

const BASE_DELAY_SEC: f64 = 0.015;
const BUFFER_SEC: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct Chorus {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
    phase_l: f64,
    phase_r: f64,
    rate: f64,
    depth: f64,
    mix: f32,
}

impl Chorus {
    pub fn new(sample_rate: f64, rate_hz: f64, depth_sec: f64, mix: f64) -> Self {
        let len = (sample_rate * BUFFER_SEC) as usize + 2;
        Chorus {
            buffer_l: vec![0.0; len],
            buffer_r: vec![0.0; len],
            write_pos: 0,
            sample_rate,
            phase_l: 0.0,
            phase_r: 0.25,
            rate: rate_hz.clamp(0.1, 10.0),
            depth: depth_sec.clamp(0.0, 0.01),
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }

    /// Linear-interpolated read `delay` samples behind the write head.
    fn tap(buffer: &[f32], write_pos: usize, delay: f64) -> f32 {
        let len = buffer.len();
        let whole = delay as usize;
        let frac = (delay - whole as f64) as f32;
        let a = (write_pos + len - whole) % len;
        let b = (a + len - 1) % len;
        buffer[a] + frac * (buffer[b] - buffer[a])
    }
}

impl StereoEffect for Chorus {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let len = self.buffer_l.len();
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;

        let max_delay = (len - 2) as f64;
        let delay_for = |phase: f64| {
            let d = (BASE_DELAY_SEC + self.depth * (2.0 * PI * phase).sin()) * self.sample_rate;
            d.clamp(1.0, max_delay)
        };
        let wet_l = Self::tap(&self.buffer_l, self.write_pos, delay_for(self.phase_l));
        let wet_r = Self::tap(&self.buffer_r, self.write_pos, delay_for(self.phase_r));

        self.write_pos = (self.write_pos + 1) % len;
        let inc = self.rate / self.sample_rate;
        self.phase_l = (self.phase_l + inc) % 1.0;
        self.phase_r = (self.phase_r + inc) % 1.0;

        (
            left * (1.0 - self.mix) + wet_l * self.mix,
            right * (1.0 - self.mix) + wet_r * self.mix,
        )
    }
}
