//! DSP kernel behind the render stages.
//!
//! Everything here is a pure function of its inputs: processors start from
//! silence, hold no global state and never read the clock, so running a
//! stage twice on the same input yields the same samples.

pub mod chorus;
pub mod compressor;
pub mod delay;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod renderer;
pub mod reverb;
pub mod voice;

use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::descriptor::RenderStage;
use crate::error::{RenderError, Result};
use crate::plan::EffectSpec;

/// Frames processed between cancellation checkpoints.
pub const CHUNK_FRAMES: usize = 4096;

/// Cheap, `Send + Sync + Clone` flag that stage kernels poll between chunks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with a stage error once the token has been cancelled.
    pub fn checkpoint(&self, stage: RenderStage) -> Result<()> {
        if self.is_cancelled() {
            return Err(RenderError::stage_failed(stage, "attempt cancelled"));
        }
        Ok(())
    }

    /// Guard that cancels the token when dropped.
    pub fn drop_guard(self) -> DropGuard {
        DropGuard { token: self }
    }
}

/// Cancels its token on drop, e.g. when the future holding it is abandoned.
#[derive(Debug)]
pub struct DropGuard {
    token: CancellationToken,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Chunk boundaries covering `0..frames`.
pub fn chunks(frames: usize) -> impl Iterator<Item = Range<usize>> {
    (0..frames)
        .step_by(CHUNK_FRAMES)
        .map(move |start| start..(start + CHUNK_FRAMES).min(frames))
}

/// Two equal-length channels of f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub sample_rate: u32,
}

impl StereoBuffer {
    /// `frames` samples of silence per channel.
    pub fn silent(frames: usize, sample_rate: u32) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
            sample_rate,
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    /// Largest absolute sample across both channels.
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0_f32, |m, &s| m.max(s.abs()))
    }
}

/// A stateful stereo processor.
pub trait StereoEffect: Send {
    /// Process one stereo frame.
    fn process(&mut self, left: f32, right: f32) -> (f32, f32);

    /// Process the frames in `span` in place.
    fn process_span(&mut self, buffer: &mut StereoBuffer, span: Range<usize>) {
        for i in span {
            let (l, r) = self.process(buffer.left[i], buffer.right[i]);
            buffer.left[i] = l;
            buffer.right[i] = r;
        }
    }
}

/// Build a fresh processor for one effect-chain entry.
pub fn build_effect(spec: &EffectSpec, sample_rate: f64) -> Box<dyn StereoEffect> {
    match *spec {
        EffectSpec::Filter { mode, cutoff_hz, q } => {
            Box::new(filter::StereoFilter::new(mode, cutoff_hz, q, sample_rate))
        }
        EffectSpec::Chorus {
            rate_hz,
            depth_sec,
            mix,
        } => Box::new(chorus::Chorus::new(sample_rate, rate_hz, depth_sec, mix)),
        EffectSpec::Delay {
            time_sec,
            feedback,
            mix,
        } => Box::new(delay::Delay::new(sample_rate, time_sec, feedback, mix)),
        EffectSpec::Reverb {
            room_size,
            damping,
            mix,
        } => Box::new(reverb::Reverb::new(sample_rate, room_size, damping, mix)),
        EffectSpec::Compressor {
            threshold_db,
            ratio,
            attack_sec,
            release_sec,
            makeup_db,
        } => Box::new(compressor::Compressor::new(
            sample_rate,
            threshold_db,
            ratio,
            attack_sec,
            release_sec,
            makeup_db,
        )),
    }
}
