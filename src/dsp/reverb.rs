//! Schroeder/Freeverb-style reverb: parallel damped combs into series allpasses.

use super::StereoEffect;

// Tunings in samples at 44.1 kHz; rescaled to the render rate.
const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const INPUT_GAIN: f32 = 0.015;

#[derive(Debug, Clone)]
struct Comb {
    buffer: Vec<f32>,
    index: usize,
    feedback: f32,
    damp: f32,
    store: f32,
}

impl Comb {
    fn new(len: usize, feedback: f32, damp: f32) -> Self {
        Comb {
            buffer: vec![0.0; len.max(1)],
            index: 0,
            feedback,
            damp,
            store: 0.0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let out = self.buffer[self.index];
        self.store = out * (1.0 - self.damp) + self.store * self.damp;
        self.buffer[self.index] = input + self.store * self.feedback;
        self.index = (self.index + 1) % self.buffer.len();
        out
    }
}

#[derive(Debug, Clone)]
struct Allpass {
    buffer: Vec<f32>,
    index: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Allpass {
            buffer: vec![0.0; len.max(1)],
            index: 0,
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let held = self.buffer[self.index];
        self.buffer[self.index] = input + held * 0.5;
        self.index = (self.index + 1) % self.buffer.len();
        held - input
    }
}

#[derive(Debug, Clone)]
struct Channel {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Channel {
    fn new(scale: f64, offset: usize, feedback: f32, damp: f32) -> Self {
        let sized = |t: usize| ((t + offset) as f64 * scale) as usize;
        Channel {
            combs: COMB_TUNING
                .iter()
                .map(|&t| Comb::new(sized(t), feedback, damp))
                .collect(),
            allpasses: ALLPASS_TUNING.iter().map(|&t| Allpass::new(sized(t))).collect(),
        }
    }

    fn process(&mut self, input: f32) -> f32 {
        let summed: f32 = self.combs.iter_mut().map(|c| c.process(input)).sum();
        self.allpasses
            .iter_mut()
            .fold(summed, |acc, ap| ap.process(acc))
    }
}

#[derive(Debug, Clone)]
pub struct Reverb {
    left: Channel,
    right: Channel,
    mix: f32,
}

impl Reverb {
    pub fn new(sample_rate: f64, room_size: f64, damping: f64, mix: f64) -> Self {
        let scale = sample_rate / 44_100.0;
        let feedback = (room_size.clamp(0.0, 1.0) * 0.28 + 0.7) as f32;
        let damp = damping.clamp(0.0, 1.0) as f32;
        Reverb {
            left: Channel::new(scale, 0, feedback, damp),
            right: Channel::new(scale, STEREO_SPREAD, feedback, damp),
            mix: mix.clamp(0.0, 1.0) as f32,
        }
    }
}

impl StereoEffect for Reverb {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let input = (left + right) * INPUT_GAIN;
        let wet_l = self.left.process(input);
        let wet_r = self.right.process(input);
        (
            left * (1.0 - self.mix) + wet_l * self.mix,
            right * (1.0 - self.mix) + wet_r * self.mix,
        )
    }
}
