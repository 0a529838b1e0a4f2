//! Directives: the unit of work fed into the orchestrator.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, Result};

/// A request to render `duration_sec` seconds of audio for `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    text: String,
    duration_sec: u32,
}

impl Directive {
    /// Create a directive. Validation happens in [`Directive::validate`],
    /// so malformed directives still get a descriptor from the orchestrator.
    pub fn new(text: impl Into<String>, duration_sec: u32) -> Self {
        Self {
            text: text.into(),
            duration_sec,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn duration_sec(&self) -> u32 {
        self.duration_sec
    }

    /// Check text and duration against the configured ceiling.
    pub fn validate(&self, max_duration_sec: u32) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(RenderError::EmptyDirective);
        }
        check_duration(self.duration_sec, max_duration_sec)
    }
}

/// Durations must be in `1..=max_sec`.
pub(crate) fn check_duration(duration_sec: u32, max_sec: u32) -> Result<()> {
    if duration_sec == 0 || duration_sec > max_sec {
        return Err(RenderError::InvalidDuration {
            duration_sec,
            max_sec,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_duration_is_invalid() {
        let err = Directive::new("hello", 0).validate(600).unwrap_err();
        assert_eq!(
            err,
            RenderError::InvalidDuration {
                duration_sec: 0,
                max_sec: 600
            }
        );
    }

    #[test]
    fn duration_ceiling_is_inclusive() {
        assert!(Directive::new("hello", 600).validate(600).is_ok());
        assert!(Directive::new("hello", 601).validate(600).is_err());
    }

    #[test]
    fn blank_text_is_rejected() {
        let err = Directive::new("   \t", 10).validate(600).unwrap_err();
        assert_eq!(err, RenderError::EmptyDirective);
    }
}
