//! Stage kernels: oscillator bank, effect chain and mixdown.
//!
//! Each kernel reads its inputs by reference and returns a new artifact, so
//! a stage can be re-run on the same input any number of times. Work is done
//! in chunks of [`CHUNK_FRAMES`], with a cancellation checkpoint before each.

use std::io::Cursor;

use sha2::{Digest, Sha256};

use crate::descriptor::RenderStage;
use crate::error::{RenderError, Result};
use crate::plan::SynthesisPlan;

use super::envelope::Envelope;
use super::mixer::MasterBus;
use super::voice::Voice;
use super::{CHUNK_FRAMES, CancellationToken, StereoBuffer, build_effect, chunks};

/// Output of the mixdown stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    /// Encoded 16-bit stereo WAV.
    pub wav: Vec<u8>,
    /// SHA-256 of `wav`, hex encoded.
    pub digest: String,
    pub frames: usize,
    pub sample_rate: u32,
}

/// Number of frames a plan renders to at `sample_rate`.
pub fn frame_count(plan: &SynthesisPlan, sample_rate: u32) -> usize {
    plan.target_duration_sec as usize * sample_rate as usize
}

/// Sum every oscillator voice, shaped by the plan envelope, into a dry bus.
pub fn render_oscillators(
    plan: &SynthesisPlan,
    sample_rate: u32,
    cancel: &CancellationToken,
) -> Result<StereoBuffer> {
    let frames = frame_count(plan, sample_rate);
    let sr = sample_rate as f64;
    let envelope = Envelope::new(&plan.envelope, plan.target_duration_sec as f64);
    let mut voices: Vec<Voice> = plan.oscillators.iter().map(|s| Voice::new(s, sr)).collect();

    let mut bus = StereoBuffer::silent(frames, sample_rate);
    let mut gains = vec![0.0_f32; CHUNK_FRAMES];
    for span in chunks(frames) {
        cancel.checkpoint(RenderStage::Oscillators)?;
        let gains = &mut gains[..span.len()];
        envelope.fill(span.start, sr, gains);
        for voice in &mut voices {
            voice.render_into(gains, &mut bus, span.start);
        }
    }
    Ok(bus)
}

/// Run the effect chain, in order, over a copy of the dry bus.
pub fn apply_effects(
    plan: &SynthesisPlan,
    dry: &StereoBuffer,
    cancel: &CancellationToken,
) -> Result<StereoBuffer> {
    let sr = dry.sample_rate as f64;
    let mut chain: Vec<_> = plan
        .effect_chain
        .iter()
        .map(|spec| build_effect(spec, sr))
        .collect();

    let mut wet = dry.clone();
    for span in chunks(wet.frames()) {
        cancel.checkpoint(RenderStage::Effects)?;
        for effect in &mut chain {
            effect.process_span(&mut wet, span.clone());
        }
    }
    Ok(wet)
}

/// Master gain, 16-bit conversion, WAV encoding and digest.
pub fn mixdown(
    plan: &SynthesisPlan,
    wet: &StereoBuffer,
    cancel: &CancellationToken,
) -> Result<RenderedAudio> {
    let wav = encode_wav(MasterBus::new(plan.master_gain), wet, cancel)?;
    let digest = format!("{:x}", Sha256::digest(&wav));
    Ok(RenderedAudio {
        wav,
        digest,
        frames: wet.frames(),
        sample_rate: wet.sample_rate,
    })
}

fn wav_error(err: hound::Error) -> RenderError {
    RenderError::stage_failed(RenderStage::Mixdown, format!("wav encoding failed: {err}"))
}

/// Encode `bus` through `master` as an in-memory 16-bit stereo WAV file.
fn encode_wav(master: MasterBus, bus: &StereoBuffer, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: bus.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + bus.frames() * 4));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for span in chunks(bus.frames()) {
            cancel.checkpoint(RenderStage::Mixdown)?;
            for i in span {
                for sample in master.frame_i16(bus, i) {
                    writer.write_sample(sample).map_err(wav_error)?;
                }
            }
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affect::AffectVector;
    use crate::error::ErrorKind;
    use crate::mapper::ParameterMapper;

    const SR: u32 = 4000;

    fn plan(v: f64, a: f64, d: f64, secs: u32) -> SynthesisPlan {
        ParameterMapper::new(600)
            .map(&AffectVector::new(v, a, d).unwrap(), secs)
            .unwrap()
    }

    fn render(p: &SynthesisPlan) -> RenderedAudio {
        let cancel = CancellationToken::new();
        let dry = render_oscillators(p, SR, &cancel).unwrap();
        let wet = apply_effects(p, &dry, &cancel).unwrap();
        mixdown(p, &wet, &cancel).unwrap()
    }

    #[test]
    fn wav_header_valid() {
        let p = plan(0.6, 0.6, 0.5, 1);
        let wav = render(&p).wav;
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 2);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), SR);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(
            u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]),
            SR * 4
        );
    }

    #[test]
    fn oscillator_bank_has_full_length_and_audio() {
        let p = plan(0.8, 0.8, 0.5, 2);
        let dry = render_oscillators(&p, SR, &CancellationToken::new()).unwrap();
        assert_eq!(dry.frames(), 2 * SR as usize);
        assert!(dry.peak() > 0.01);
        // the envelope has fully released at the end
        assert!(dry.left.last().unwrap().abs() < 1e-3);
    }

    #[test]
    fn effects_do_not_touch_the_dry_bus() {
        let p = plan(0.2, 0.3, 0.6, 2);
        let cancel = CancellationToken::new();
        let dry = render_oscillators(&p, SR, &cancel).unwrap();
        let snapshot = dry.clone();
        let wet = apply_effects(&p, &dry, &cancel).unwrap();
        assert_eq!(dry, snapshot);
        assert_ne!(wet, dry);
    }

    #[test]
    fn chunked_effects_match_a_single_pass() {
        let p = plan(0.7, 0.7, 0.5, 3);
        let cancel = CancellationToken::new();
        let dry = render_oscillators(&p, SR, &cancel).unwrap();
        let wet = apply_effects(&p, &dry, &cancel).unwrap();

        let mut reference = dry.clone();
        for spec in &p.effect_chain {
            let mut effect = build_effect(spec, SR as f64);
            let frames = reference.frames();
            effect.process_span(&mut reference, 0..frames);
        }
        assert_eq!(wet, reference);
    }

    #[test]
    fn every_stage_is_repeatable() {
        for (v, a) in [(0.9, 0.9), (0.9, 0.1), (0.1, 0.9), (0.1, 0.1)] {
            let p = plan(v, a, 0.5, 1);
            let cancel = CancellationToken::new();
            let dry = render_oscillators(&p, SR, &cancel).unwrap();
            assert_eq!(dry, render_oscillators(&p, SR, &cancel).unwrap());
            let wet = apply_effects(&p, &dry, &cancel).unwrap();
            assert_eq!(wet, apply_effects(&p, &dry, &cancel).unwrap());
            assert_eq!(
                mixdown(&p, &wet, &cancel).unwrap(),
                mixdown(&p, &wet, &cancel).unwrap()
            );
        }
    }

    #[test]
    fn mixdown_encodes_every_frame() {
        let audio = render(&plan(0.6, 0.4, 0.5, 1));
        assert_eq!(audio.frames, SR as usize);
        assert_eq!(audio.wav.len(), 44 + SR as usize * 4);
        assert_eq!(audio.digest.len(), 64);
    }

    #[test]
    fn different_regions_render_differently() {
        let bright = render(&plan(0.9, 0.9, 0.5, 1));
        let dark = render(&plan(0.1, 0.1, 0.5, 1));
        assert_ne!(bright.digest, dark.digest);
    }

    #[test]
    fn cancelled_kernels_stop_with_a_stage_error() {
        let p = plan(0.5, 0.5, 0.5, 1);
        let live = CancellationToken::new();
        let dry = render_oscillators(&p, SR, &live).unwrap();

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        for (stage, result) in [
            (
                RenderStage::Oscillators,
                render_oscillators(&p, SR, &cancelled).map(|_| ()),
            ),
            (
                RenderStage::Effects,
                apply_effects(&p, &dry, &cancelled).map(|_| ()),
            ),
            (RenderStage::Mixdown, mixdown(&p, &dry, &cancelled).map(|_| ())),
        ] {
            let err = result.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::StageFailed);
            assert!(err.to_string().contains(stage.label()), "{err}");
        }
    }
}
