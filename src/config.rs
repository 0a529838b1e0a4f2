//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::descriptor::RenderStage;
use crate::error::{RenderError, Result};

/// Lowest internal render rate accepted.
pub const MIN_SAMPLE_RATE: u32 = 4_000;
/// Highest internal render rate accepted.
pub const MAX_SAMPLE_RATE: u32 = 192_000;
/// Upper bound on `render_sample_rate * max_duration_sec`: ten minutes at 48 kHz.
pub const MAX_RENDER_FRAMES: u64 = 48_000 * 600;

/// Per-stage timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimeouts {
    #[serde(default = "default_oscillators_ms")]
    pub oscillators_ms: u64,
    #[serde(default = "default_effects_ms")]
    pub effects_ms: u64,
    #[serde(default = "default_mixdown_ms")]
    pub mixdown_ms: u64,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            oscillators_ms: default_oscillators_ms(),
            effects_ms: default_effects_ms(),
            mixdown_ms: default_mixdown_ms(),
        }
    }
}

impl StageTimeouts {
    /// Same bound for every stage.
    pub fn uniform(ms: u64) -> Self {
        Self {
            oscillators_ms: ms,
            effects_ms: ms,
            mixdown_ms: ms,
        }
    }

    pub fn millis(&self, stage: RenderStage) -> u64 {
        match stage {
            RenderStage::Oscillators => self.oscillators_ms,
            RenderStage::Effects => self.effects_ms,
            RenderStage::Mixdown => self.mixdown_ms,
        }
    }

    pub fn get(&self, stage: RenderStage) -> Duration {
        Duration::from_millis(self.millis(stage))
    }
}

/// Everything the orchestrator and scheduler can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Longest directive accepted, in seconds.
    #[serde(default = "default_max_duration_sec")]
    pub max_duration_sec: u32,
    /// Directives processed concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Bound on a single AffectSource call.
    #[serde(default = "default_analysis_timeout_ms")]
    pub analysis_timeout_ms: u64,
    /// Internal sample rate of the DSP stages. Does not change the
    /// delivered format or its size estimate.
    #[serde(default = "default_render_sample_rate")]
    pub render_sample_rate: u32,
    #[serde(default)]
    pub stage_timeouts: StageTimeouts,
    /// Retries after a stage's first failed attempt.
    #[serde(default = "default_stage_retries")]
    pub stage_retries: u32,
    /// Replacement lexicon for the built-in affect source.
    #[serde(default)]
    pub lexicon_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_duration_sec: default_max_duration_sec(),
            max_in_flight: default_max_in_flight(),
            analysis_timeout_ms: default_analysis_timeout_ms(),
            render_sample_rate: default_render_sample_rate(),
            stage_timeouts: StageTimeouts::default(),
            stage_retries: default_stage_retries(),
            lexicon_path: None,
        }
    }
}

fn default_max_duration_sec() -> u32 {
    600
}

fn default_max_in_flight() -> usize {
    4
}

fn default_analysis_timeout_ms() -> u64 {
    2_000
}

fn default_render_sample_rate() -> u32 {
    22_050
}

fn default_stage_retries() -> u32 {
    1
}

fn default_oscillators_ms() -> u64 {
    30_000
}

fn default_effects_ms() -> u64 {
    30_000
}

fn default_mixdown_ms() -> u64 {
    15_000
}

impl PipelineConfig {
    /// Parse and validate a JSON document. Missing keys take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RenderError::config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| RenderError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_duration_sec == 0 {
            return Err(RenderError::config("max_duration_sec must be positive"));
        }
        if self.max_in_flight == 0 {
            return Err(RenderError::config("max_in_flight must be at least 1"));
        }
        if self.analysis_timeout_ms == 0 {
            return Err(RenderError::config("analysis_timeout_ms must be positive"));
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.render_sample_rate) {
            return Err(RenderError::config(format!(
                "render_sample_rate {} outside {MIN_SAMPLE_RATE}..={MAX_SAMPLE_RATE}",
                self.render_sample_rate
            )));
        }
        let frames = u64::from(self.render_sample_rate) * u64::from(self.max_duration_sec);
        if frames > MAX_RENDER_FRAMES {
            return Err(RenderError::config(format!(
                "render_sample_rate {} over max_duration_sec {} needs {frames} frames, \
                 limit is {MAX_RENDER_FRAMES}",
                self.render_sample_rate, self.max_duration_sec
            )));
        }
        for stage in RenderStage::ALL {
            if self.stage_timeouts.millis(stage) == 0 {
                return Err(RenderError::config(format!(
                    "timeout for stage {stage} must be positive"
                )));
            }
        }
        Ok(())
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    /// Attempts per stage, first try included.
    pub fn stage_attempts(&self) -> u32 {
        self.stage_retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stage_retries, 1);
        assert_eq!(config.stage_attempts(), 2);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"max_in_flight": 8, "stage_timeouts": {"effects_ms": 500}}"#,
        )
        .unwrap();
        assert_eq!(config.max_in_flight, 8);
        assert_eq!(config.stage_timeouts.effects_ms, 500);
        assert_eq!(config.stage_timeouts.oscillators_ms, 30_000);
        assert_eq!(config.max_duration_sec, 600);
        assert_eq!(
            config.stage_timeouts.get(RenderStage::Effects),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn round_trips_through_json() {
        let mut config = PipelineConfig::default();
        config.render_sample_rate = 8_000;
        config.lexicon_path = Some(PathBuf::from("lexicon.json"));
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for json in [
            r#"{"max_in_flight": 0}"#,
            r#"{"render_sample_rate": 100}"#,
            r#"{"max_duration_sec": 0}"#,
            r#"{"stage_timeouts": {"mixdown_ms": 0}}"#,
            r#"{"max_in_flight": "four"}"#,
        ] {
            let err = PipelineConfig::from_json_str(json).unwrap_err();
            assert!(matches!(err, RenderError::Config { .. }), "{json}: {err}");
        }
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = PipelineConfig::load(Path::new("/nonexistent/moltradio.json")).unwrap_err();
        assert!(matches!(err, RenderError::Config { .. }));
    }

    #[test]
    fn render_length_is_bounded() {
        let hi_res = PipelineConfig {
            render_sample_rate: MAX_SAMPLE_RATE,
            ..PipelineConfig::default()
        };
        let err = hi_res.validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);

        let short_hi_res = PipelineConfig {
            max_duration_sec: 60,
            ..hi_res
        };
        assert!(short_hi_res.validate().is_ok());

        let cd_quality = PipelineConfig {
            render_sample_rate: 44_100,
            ..PipelineConfig::default()
        };
        assert!(cd_quality.validate().is_ok());
    }
}
