//! Stereo feedback delay with dry/wet mix.

use super::StereoEffect;

#[derive(Debug, Clone)]
pub struct Delay {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    feedback: f32,
    mix: f32,
}

impl Delay {
    /// The buffer is sized to exactly `time_sec`, so the echo interval is fixed.
    pub fn new(sample_rate: f64, time_sec: f64, feedback: f64, mix: f64) -> Self {
        let len = ((time_sec.clamp(0.0, 2.0) * sample_rate) as usize).max(1);
        Delay {
            buffer_l: vec![0.0; len],
            buffer_r: vec![0.0; len],
            write_pos: 0,
            feedback: feedback.clamp(0.0, 0.95) as f32,
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }
}

impl StereoEffect for Delay {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let pos = self.write_pos;
        let echo_l = self.buffer_l[pos];
        let echo_r = self.buffer_r[pos];

        self.buffer_l[pos] = left + echo_l * self.feedback;
        self.buffer_r[pos] = right + echo_r * self.feedback;
        self.write_pos = (pos + 1) % self.buffer_l.len();

        (
            left * (1.0 - self.mix) + echo_l * self.mix,
            right * (1.0 - self.mix) + echo_r * self.mix,
        )
    }
}
