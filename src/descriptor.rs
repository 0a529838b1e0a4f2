//! Render descriptors: the only externally observable artifact of a job.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RenderError};
use crate::plan::{AffectRegion, SynthesisPlan};

/// Bytes per second of the delivered format: 44.1 kHz, stereo, 16-bit PCM.
pub const BYTES_PER_SECOND: u64 = 44_100 * 2 * 2;

/// Estimated size of a rendered file of `duration_sec` seconds.
pub fn estimated_size_bytes(duration_sec: u32) -> u64 {
    duration_sec as u64 * BYTES_PER_SECOND
}

/// A stage the scheduler executes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderStage {
    Oscillators,
    Effects,
    Mixdown,
}

impl RenderStage {
    /// All stages in canonical order.
    pub const ALL: [RenderStage; 3] = [Self::Oscillators, Self::Effects, Self::Mixdown];

    /// Label used in traces and logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Oscillators => "OSCILLATORS",
            Self::Effects => "EFFECTS",
            Self::Mixdown => "MIXDOWN",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output container format. Only WAV is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
}

/// Terminal status of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenderStatus {
    Completed,
    Failed,
    Partial,
}

/// Why a descriptor is not COMPLETED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&RenderError> for FailureInfo {
    fn from(err: &RenderError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of processing one directive.
///
/// Nothing in here depends on wall-clock time or on how many attempts a
/// stage needed, so a retried render compares equal to an unobstructed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderDescriptor {
    pub format: AudioFormat,
    pub estimated_size_bytes: u64,
    pub status: RenderStatus,
    /// Stages that completed, in order.
    pub stage_trace: Vec<RenderStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<AffectRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_fingerprint: Option<String>,
    /// SHA-256 of the encoded WAV (COMPLETED only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
}

impl RenderDescriptor {
    /// A directive that never produced a plan: bad input or a failed
    /// affect source. Always FAILED with an empty trace.
    pub fn rejected(err: &RenderError) -> Self {
        Self {
            format: AudioFormat::Wav,
            estimated_size_bytes: 0,
            status: RenderStatus::Failed,
            stage_trace: Vec::new(),
            region: None,
            plan_fingerprint: None,
            render_digest: None,
            failure: Some(err.into()),
        }
    }

    /// A plan that went through every stage.
    pub fn completed(plan: &SynthesisPlan, fingerprint: String, digest: String) -> Self {
        Self {
            format: AudioFormat::Wav,
            estimated_size_bytes: estimated_size_bytes(plan.target_duration_sec),
            status: RenderStatus::Completed,
            stage_trace: RenderStage::ALL.to_vec(),
            region: Some(plan.region),
            plan_fingerprint: Some(fingerprint),
            render_digest: Some(digest),
            failure: None,
        }
    }

    /// A plan whose job stopped early. PARTIAL if any stage completed.
    pub fn interrupted(
        plan: &SynthesisPlan,
        fingerprint: String,
        stage_trace: Vec<RenderStage>,
        err: &RenderError,
    ) -> Self {
        let status = if stage_trace.is_empty() {
            RenderStatus::Failed
        } else {
            RenderStatus::Partial
        };
        Self {
            format: AudioFormat::Wav,
            estimated_size_bytes: estimated_size_bytes(plan.target_duration_sec),
            status,
            stage_trace,
            region: Some(plan.region),
            plan_fingerprint: Some(fingerprint),
            render_digest: None,
            failure: Some(err.into()),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RenderStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_matches_cd_quality_rate() {
        assert_eq!(BYTES_PER_SECOND, 176_400);
        assert_eq!(estimated_size_bytes(180), 31_752_000);
        assert_eq!(estimated_size_bytes(0), 0);
    }

    #[test]
    fn rejected_descriptor_has_empty_trace() {
        let d = RenderDescriptor::rejected(&RenderError::EmptyDirective);
        assert_eq!(d.status, RenderStatus::Failed);
        assert!(d.stage_trace.is_empty());
        assert_eq!(d.failure.unwrap().kind, ErrorKind::EmptyDirective);
    }

    #[test]
    fn trace_serializes_with_stage_names() {
        let d = RenderDescriptor::rejected(&RenderError::EmptyDirective);
        let mut d = d;
        d.stage_trace = RenderStage::ALL.to_vec();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["format"], "wav");
        assert_eq!(json["status"], "FAILED");
        assert_eq!(
            json["stage_trace"],
            serde_json::json!(["OSCILLATORS", "EFFECTS", "MIXDOWN"])
        );
        assert!(json.get("render_digest").is_none());
    }
}
