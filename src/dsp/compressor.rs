//! Feed-forward peak compressor with a soft knee and makeup gain.

use super::StereoEffect;

const KNEE_DB: f64 = 6.0;

fn to_db(linear: f64) -> f64 {
    if linear <= 1e-6 {
        -120.0
    } else {
        20.0 * linear.log10()
    }
}

fn from_db(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

#[derive(Debug, Clone)]
pub struct Compressor {
    threshold: f64,
    ratio: f64,
    makeup: f64,
    attack_coef: f64,
    release_coef: f64,
    envelope: f64,
}

impl Compressor {
    pub fn new(
        sample_rate: f64,
        threshold_db: f64,
        ratio: f64,
        attack_sec: f64,
        release_sec: f64,
        makeup_db: f64,
    ) -> Self {
        let coef = |secs: f64| (-1.0 / (secs * sample_rate)).exp();
        Compressor {
            threshold: threshold_db.clamp(-60.0, 0.0),
            ratio: ratio.clamp(1.0, 20.0),
            makeup: makeup_db,
            attack_coef: coef(attack_sec.clamp(0.0001, 1.0)),
            release_coef: coef(release_sec.clamp(0.001, 5.0)),
            envelope: 0.0,
        }
    }

    /// Gain change in dB for a detector level of `level_db`.
    fn gain_db(&self, level_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = level_db - self.threshold;
        if over <= -KNEE_DB / 2.0 {
            0.0
        } else if over >= KNEE_DB / 2.0 {
            -over * slope
        } else {
            let x = over + KNEE_DB / 2.0;
            -slope * x * x / (2.0 * KNEE_DB)
        }
    }
}

impl StereoEffect for Compressor {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let level = left.abs().max(right.abs()) as f64;
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        let gain = from_db(self.gain_db(to_db(self.envelope)) + self.makeup) as f32;
        (left * gain, right * gain)
    }
}
