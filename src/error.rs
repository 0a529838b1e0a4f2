//! Error taxonomy for the render pipeline.
//!
//! Caller-input errors are rejected before any stage runs, collaborator
//! errors are isolated per directive, and stage errors are retried by the
//! scheduler before they escalate into a failed or partial descriptor.

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::RenderStage;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Everything that can go wrong between a directive and its descriptor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// An affect component is outside [0, 1] (or not a number).
    #[error("invalid affect vector: {component} = {value} is outside [0, 1]")]
    InvalidAffectVector { component: &'static str, value: f64 },

    /// Duration is zero or above the configured ceiling.
    #[error("invalid duration: {duration_sec}s (expected 1..={max_sec}s)")]
    InvalidDuration { duration_sec: u32, max_sec: u32 },

    /// Directive text is empty or whitespace only.
    #[error("directive text is empty")]
    EmptyDirective,

    /// The affect model has not been initialized.
    #[error("affect model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The affect source did not answer within its bound.
    #[error("affect analysis timed out after {timeout_ms}ms")]
    AnalysisTimeout { timeout_ms: u64 },

    /// A render stage exceeded its timeout.
    #[error("stage {stage} timed out after {timeout_ms}ms")]
    StageTimeout { stage: RenderStage, timeout_ms: u64 },

    /// A render stage computation failed (including worker panics).
    #[error("stage {stage} failed: {message}")]
    StageFailed { stage: RenderStage, message: String },

    /// Invalid pipeline configuration.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl RenderError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a stage failure.
    pub fn stage_failed(stage: RenderStage, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            message: message.into(),
        }
    }

    /// The serializable category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAffectVector { .. } => ErrorKind::InvalidAffectVector,
            Self::InvalidDuration { .. } => ErrorKind::InvalidDuration,
            Self::EmptyDirective => ErrorKind::EmptyDirective,
            Self::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            Self::AnalysisTimeout { .. } => ErrorKind::AnalysisTimeout,
            Self::StageTimeout { .. } => ErrorKind::StageTimeout,
            Self::StageFailed { .. } => ErrorKind::StageFailed,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Caller-input errors are rejected before the affect source is consulted.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAffectVector { .. } | Self::InvalidDuration { .. } | Self::EmptyDirective
        )
    }

    /// Stage-level errors are the only ones the scheduler retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StageTimeout { .. } | Self::StageFailed { .. })
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Error category as it appears in a [`crate::descriptor::RenderDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAffectVector,
    InvalidDuration,
    EmptyDirective,
    ModelUnavailable,
    AnalysisTimeout,
    StageTimeout,
    StageFailed,
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(RenderError::EmptyDirective.is_input_error());
        assert!(
            RenderError::InvalidDuration {
                duration_sec: 0,
                max_sec: 600
            }
            .is_input_error()
        );
        assert!(
            !RenderError::AnalysisTimeout { timeout_ms: 10 }.is_input_error(),
            "collaborator failures are not caller-input errors"
        );
    }

    #[test]
    fn only_stage_errors_retry() {
        let timeout = RenderError::StageTimeout {
            stage: RenderStage::Effects,
            timeout_ms: 5,
        };
        assert!(timeout.is_retryable());
        assert!(RenderError::stage_failed(RenderStage::Mixdown, "boom").is_retryable());
        assert!(
            !RenderError::ModelUnavailable {
                reason: "not loaded".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn display_names_the_offending_component() {
        let err = RenderError::InvalidAffectVector {
            component: "valence",
            value: 1.5,
        };
        assert_eq!(
            err.to_string(),
            "invalid affect vector: valence = 1.5 is outside [0, 1]"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidAffectVector);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::AnalysisTimeout).unwrap();
        assert_eq!(json, "\"analysis_timeout\"");
    }

    #[test]
    fn panic_payloads_become_text() {
        let caught = std::panic::catch_unwind(|| panic!("plain")).unwrap_err();
        assert_eq!(panic_message(&*caught), "plain");
        let caught = std::panic::catch_unwind(|| panic!("formatted {}", 7)).unwrap_err();
        assert_eq!(panic_message(&*caught), "formatted 7");
    }
}
