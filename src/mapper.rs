//! Parameter mapper: affect vector + duration -> synthesis plan.
//!
//! The valence/arousal plane is split at 0.5 into four regions (the high
//! side is inclusive). Each region contributes a root pitch, a voice stack
//! and an effect-chain template; the exact frequencies, envelope and effect
//! parameters are then continuous functions of the vector, and dominance
//! scales gain and compression linearly. There is no randomness: the same
//! inputs always give a bit-identical plan.

use crate::affect::AffectVector;
use crate::directive::check_duration;
use crate::error::Result;
use crate::plan::{
    AffectRegion, EffectSpec, EnvelopeSpec, FilterMode, OscillatorSpec, SynthesisPlan, Waveform,
};

const REGION_SPLIT: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
enum EffectSlot {
    Lowpass,
    Highpass,
    Chorus,
    Delay,
    Reverb,
    Compressor,
}

struct RegionTemplate {
    root_hz: f64,
    /// (waveform, frequency ratio to the root)
    voices: &'static [(Waveform, f64)],
    effects: &'static [EffectSlot],
}

const BRIGHT: RegionTemplate = RegionTemplate {
    root_hz: 261.63,
    voices: &[
        (Waveform::Sawtooth, 1.0),
        (Waveform::Square, 1.25),
        (Waveform::Triangle, 1.5),
        (Waveform::Sine, 2.0),
    ],
    effects: &[EffectSlot::Chorus, EffectSlot::Delay, EffectSlot::Compressor],
};

const SERENE: RegionTemplate = RegionTemplate {
    root_hz: 220.0,
    voices: &[
        (Waveform::Triangle, 1.0),
        (Waveform::Sine, 1.25),
        (Waveform::Sine, 1.5),
    ],
    effects: &[EffectSlot::Lowpass, EffectSlot::Reverb, EffectSlot::Compressor],
};

const TENSE: RegionTemplate = RegionTemplate {
    root_hz: 146.83,
    voices: &[
        (Waveform::Square, 1.0),
        (Waveform::Sawtooth, 1.2),
        (Waveform::Sawtooth, 45.0 / 32.0),
        (Waveform::Triangle, 2.0),
    ],
    effects: &[EffectSlot::Highpass, EffectSlot::Delay, EffectSlot::Compressor],
};

const DARK: RegionTemplate = RegionTemplate {
    root_hz: 110.0,
    voices: &[
        (Waveform::Sine, 1.0),
        (Waveform::Triangle, 1.2),
        (Waveform::Sine, 1.5),
    ],
    effects: &[EffectSlot::Lowpass, EffectSlot::Reverb, EffectSlot::Compressor],
};

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Pure mapping from affect to synthesis parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParameterMapper {
    max_duration_sec: u32,
}

impl ParameterMapper {
    pub fn new(max_duration_sec: u32) -> Self {
        Self { max_duration_sec }
    }

    /// Which region of the plane a vector falls in.
    pub fn region_for(affect: &AffectVector) -> AffectRegion {
        match (affect.valence >= REGION_SPLIT, affect.arousal >= REGION_SPLIT) {
            (true, true) => AffectRegion::Bright,
            (true, false) => AffectRegion::Serene,
            (false, true) => AffectRegion::Tense,
            (false, false) => AffectRegion::Dark,
        }
    }

    fn template(region: AffectRegion) -> &'static RegionTemplate {
        match region {
            AffectRegion::Bright => &BRIGHT,
            AffectRegion::Serene => &SERENE,
            AffectRegion::Tense => &TENSE,
            AffectRegion::Dark => &DARK,
        }
    }

    /// Build the plan for `affect` over `duration_sec` seconds.
    ///
    /// Fails with `InvalidAffectVector` or `InvalidDuration`; nothing is
    /// clamped on the way in.
    pub fn map(&self, affect: &AffectVector, duration_sec: u32) -> Result<SynthesisPlan> {
        affect.validate()?;
        check_duration(duration_sec, self.max_duration_sec)?;

        let AffectVector {
            valence: v,
            arousal: a,
            dominance: d,
        } = *affect;
        let region = Self::region_for(affect);
        let template = Self::template(region);
        let tempo_bpm = 70.0 + 80.0 * a;

        Ok(SynthesisPlan {
            region,
            oscillators: Self::oscillators(template, v, a),
            envelope: EnvelopeSpec {
                attack: lerp(0.6, 0.01, a),
                decay: lerp(0.8, 0.1, a),
                sustain: lerp(0.6, 0.85, v),
                release: lerp(2.5, 0.3, a),
            },
            effect_chain: template
                .effects
                .iter()
                .map(|&slot| Self::effect(slot, v, a, d, tempo_bpm))
                .collect(),
            master_gain: 0.45 + 0.4 * d,
            tempo_bpm,
            target_duration_sec: duration_sec,
        })
    }

    fn oscillators(template: &RegionTemplate, v: f64, a: f64) -> Vec<OscillatorSpec> {
        let shift_semitones = (v - 0.5) * 6.0 + (a - 0.5) * 4.0;
        let pitch = 2.0_f64.powf(shift_semitones / 12.0);
        let count = template.voices.len();
        let weights: Vec<f64> = (0..count).map(|i| 1.0 / (1.0 + 0.35 * i as f64)).collect();
        let total: f64 = weights.iter().sum();
        let spread = 2.0 + 10.0 * a;
        let width = 0.2 + 0.6 * a;

        template
            .voices
            .iter()
            .zip(&weights)
            .enumerate()
            .map(|(i, (&(waveform, ratio), &w))| {
                let detune_cents = match i {
                    0 => 0.0,
                    _ if i % 2 == 1 => spread,
                    _ => -spread,
                };
                let pan = if count > 1 {
                    width * (2.0 * i as f64 / (count - 1) as f64 - 1.0)
                } else {
                    0.0
                };
                OscillatorSpec {
                    waveform,
                    frequency_hz: template.root_hz * ratio * pitch,
                    amplitude: w / total,
                    detune_cents,
                    pan,
                }
            })
            .collect()
    }

    fn effect(slot: EffectSlot, v: f64, a: f64, d: f64, tempo_bpm: f64) -> EffectSpec {
        match slot {
            EffectSlot::Lowpass => EffectSpec::Filter {
                mode: FilterMode::Lowpass,
                cutoff_hz: 600.0 + 3000.0 * v,
                q: 0.707,
            },
            EffectSlot::Highpass => EffectSpec::Filter {
                mode: FilterMode::Highpass,
                cutoff_hz: 80.0 + 220.0 * a,
                q: 0.707,
            },
            EffectSlot::Chorus => EffectSpec::Chorus {
                rate_hz: 0.5 + 2.5 * a,
                depth_sec: 0.001 + 0.003 * v,
                mix: 0.3,
            },
            // eighth-note echo
            EffectSlot::Delay => EffectSpec::Delay {
                time_sec: 30.0 / tempo_bpm,
                feedback: 0.2 + 0.3 * (1.0 - v),
                mix: 0.25 + 0.1 * a,
            },
            EffectSlot::Reverb => EffectSpec::Reverb {
                room_size: 0.4 + 0.5 * (1.0 - a),
                damping: 0.3 + 0.5 * (1.0 - v),
                mix: 0.2 + 0.2 * (1.0 - a),
            },
            EffectSlot::Compressor => EffectSpec::Compressor {
                threshold_db: -12.0 - 18.0 * d,
                ratio: 1.5 + 6.5 * d,
                attack_sec: 0.003 + 0.02 * (1.0 - a),
                release_sec: 0.1 + 0.3 * (1.0 - a),
                makeup_db: 4.0 * d,
            },
        }
    }
}
