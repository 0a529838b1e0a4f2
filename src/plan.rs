//! Synthesis plans: the deterministic description of what to render.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Named region of the valence/arousal plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffectRegion {
    /// High valence, high arousal.
    Bright,
    /// High valence, low arousal.
    Serene,
    /// Low valence, high arousal.
    Tense,
    /// Low valence, low arousal.
    Dark,
}

impl AffectRegion {
    /// Short description of the region's sound.
    pub fn character(self) -> &'static str {
        match self {
            Self::Bright => "bright/fast",
            Self::Serene => "warm/slow",
            Self::Tense => "tense/driving",
            Self::Dark => "dark/slow",
        }
    }
}

impl fmt::Display for AffectRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.character())
    }
}

/// One oscillator voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorSpec {
    pub waveform: Waveform,
    pub frequency_hz: f64,
    /// Linear amplitude; all voices of a plan sum to 1.
    pub amplitude: f64,
    pub detune_cents: f64,
    /// -1 (left) to +1 (right).
    pub pan: f64,
}

/// ADSR envelope shared by every voice. Times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    Lowpass,
    Highpass,
}

/// One entry of the effect chain, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "lowercase")]
pub enum EffectSpec {
    Filter {
        mode: FilterMode,
        cutoff_hz: f64,
        q: f64,
    },
    Chorus {
        rate_hz: f64,
        depth_sec: f64,
        mix: f64,
    },
    Delay {
        time_sec: f64,
        feedback: f64,
        mix: f64,
    },
    Reverb {
        room_size: f64,
        damping: f64,
        mix: f64,
    },
    Compressor {
        threshold_db: f64,
        ratio: f64,
        attack_sec: f64,
        release_sec: f64,
        makeup_db: f64,
    },
}

impl EffectSpec {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Filter { .. } => "filter",
            Self::Chorus { .. } => "chorus",
            Self::Delay { .. } => "delay",
            Self::Reverb { .. } => "reverb",
            Self::Compressor { .. } => "compressor",
        }
    }

    fn parameters(&self) -> Vec<f64> {
        match *self {
            Self::Filter { mode, cutoff_hz, q } => {
                let mode = match mode {
                    FilterMode::Lowpass => 0.0,
                    FilterMode::Highpass => 1.0,
                };
                vec![mode, cutoff_hz, q]
            }
            Self::Chorus {
                rate_hz,
                depth_sec,
                mix,
            } => vec![rate_hz, depth_sec, mix],
            Self::Delay {
                time_sec,
                feedback,
                mix,
            } => vec![time_sec, feedback, mix],
            Self::Reverb {
                room_size,
                damping,
                mix,
            } => vec![room_size, damping, mix],
            Self::Compressor {
                threshold_db,
                ratio,
                attack_sec,
                release_sec,
                makeup_db,
            } => vec![threshold_db, ratio, attack_sec, release_sec, makeup_db],
        }
    }
}

/// Everything the scheduler needs to render one directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisPlan {
    pub region: AffectRegion,
    pub oscillators: Vec<OscillatorSpec>,
    pub envelope: EnvelopeSpec,
    pub effect_chain: Vec<EffectSpec>,
    pub master_gain: f64,
    pub tempo_bpm: f64,
    pub target_duration_sec: u32,
}

impl SynthesisPlan {
    /// SHA-256 over the exact bit patterns of every field, hex encoded.
    ///
    /// Two plans share a fingerprint iff they would render identically.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.region.character().as_bytes());
        hasher.update(self.target_duration_sec.to_le_bytes());
        hasher.update(self.master_gain.to_bits().to_le_bytes());
        hasher.update(self.tempo_bpm.to_bits().to_le_bytes());

        let env = &self.envelope;
        for x in [env.attack, env.decay, env.sustain, env.release] {
            hasher.update(x.to_bits().to_le_bytes());
        }

        hasher.update((self.oscillators.len() as u64).to_le_bytes());
        for osc in &self.oscillators {
            hasher.update([osc.waveform as u8]);
            for x in [osc.frequency_hz, osc.amplitude, osc.detune_cents, osc.pan] {
                hasher.update(x.to_bits().to_le_bytes());
            }
        }

        hasher.update((self.effect_chain.len() as u64).to_le_bytes());
        for fx in &self.effect_chain {
            hasher.update(fx.name().as_bytes());
            for x in fx.parameters() {
                hasher.update(x.to_bits().to_le_bytes());
            }
        }

        format!("{:x}", hasher.finalize())
    }

    /// Names of the effect chain, in order.
    pub fn effect_names(&self) -> Vec<&'static str> {
        self.effect_chain.iter().map(EffectSpec::name).collect()
    }
}
