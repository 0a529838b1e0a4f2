//! Affect extraction: the vector type, the collaborator seam, and a
//! deterministic lexicon-backed source.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RenderError, Result};

/// Perceived emotional content of a text, each component in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectVector {
    pub valence: f64,
    pub arousal: f64,
    pub dominance: f64,
}

impl AffectVector {
    /// Build a validated vector.
    pub fn new(valence: f64, arousal: f64, dominance: f64) -> Result<Self> {
        let v = Self {
            valence,
            arousal,
            dominance,
        };
        v.validate()?;
        Ok(v)
    }

    /// The midpoint of the cube.
    pub fn neutral() -> Self {
        Self {
            valence: 0.5,
            arousal: 0.5,
            dominance: 0.5,
        }
    }

    /// Reject any component outside [0, 1]. NaN is rejected too.
    pub fn validate(&self) -> Result<()> {
        for (component, value) in [
            ("valence", self.valence),
            ("arousal", self.arousal),
            ("dominance", self.dominance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RenderError::InvalidAffectVector { component, value });
            }
        }
        Ok(())
    }
}

/// The affect-extraction collaborator.
///
/// Implementations own whatever session or model state they need; the
/// orchestrator holds them behind an `Arc` and bounds every call with its
/// analysis timeout.
#[async_trait]
pub trait AffectSource: Send + Sync {
    /// Analyze `text`. Fails with `ModelUnavailable` when not initialized.
    async fn analyze(&self, text: &str) -> Result<AffectVector>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "affect-source"
    }
}

// (word, valence, arousal, dominance)
const BUILTIN_LEXICON: &[(&str, f64, f64, f64)] = &[
    ("melancholic", 0.18, 0.30, 0.32),
    ("melancholy", 0.18, 0.30, 0.32),
    ("sad", 0.12, 0.28, 0.25),
    ("sorrow", 0.10, 0.32, 0.25),
    ("lonely", 0.15, 0.25, 0.22),
    ("grief", 0.08, 0.40, 0.20),
    ("rain", 0.40, 0.32, 0.42),
    ("night", 0.42, 0.30, 0.45),
    ("dark", 0.25, 0.42, 0.45),
    ("cold", 0.30, 0.35, 0.40),
    ("slow", 0.45, 0.15, 0.40),
    ("quiet", 0.55, 0.12, 0.40),
    ("calm", 0.70, 0.10, 0.55),
    ("peaceful", 0.80, 0.12, 0.55),
    ("gentle", 0.75, 0.20, 0.45),
    ("warm", 0.78, 0.35, 0.55),
    ("dream", 0.70, 0.25, 0.45),
    ("ambient", 0.60, 0.20, 0.45),
    ("upbeat", 0.88, 0.80, 0.62),
    ("happy", 0.92, 0.65, 0.65),
    ("joy", 0.95, 0.72, 0.68),
    ("bright", 0.85, 0.62, 0.60),
    ("energetic", 0.80, 0.90, 0.70),
    ("fast", 0.60, 0.85, 0.60),
    ("rhythm", 0.65, 0.70, 0.58),
    ("dance", 0.85, 0.85, 0.62),
    ("triumphant", 0.90, 0.80, 0.90),
    ("powerful", 0.70, 0.75, 0.92),
    ("epic", 0.75, 0.82, 0.85),
    ("angry", 0.10, 0.88, 0.75),
    ("rage", 0.05, 0.95, 0.80),
    ("tense", 0.25, 0.80, 0.45),
    ("anxious", 0.20, 0.78, 0.25),
    ("fear", 0.10, 0.82, 0.15),
    ("chaos", 0.22, 0.92, 0.50),
    ("glitch", 0.38, 0.78, 0.45),
    ("storm", 0.30, 0.85, 0.65),
    ("digital", 0.55, 0.58, 0.55),
    ("data", 0.52, 0.55, 0.55),
    ("transmission", 0.52, 0.60, 0.55),
    ("signal", 0.55, 0.58, 0.58),
    ("machine", 0.45, 0.55, 0.65),
    ("love", 0.95, 0.55, 0.55),
    ("hope", 0.85, 0.50, 0.60),
];

const NEGATORS: &[&str] = &["not", "no", "never", "without", "nothing"];
const INTENSIFIERS: &[&str] = &["very", "extremely", "deeply", "really", "so", "utterly"];
const INTENSIFIER_GAIN: f64 = 1.5;

/// A lexicon-driven affect source.
///
/// Tokens are matched case-insensitively against a word table of
/// valence/arousal/dominance triples; matched triples are averaged. A
/// preceding negator mirrors the next match's valence around 0.5, and a
/// preceding intensifier pushes every component of the next match away from
/// 0.5. Text with no matches is neutral. Must be loaded before use.
#[derive(Debug, Default)]
pub struct LexiconAffectSource {
    lexicon: Option<HashMap<String, AffectVector>>,
}

impl LexiconAffectSource {
    /// An unloaded source; `analyze` fails until one of the `load*` calls.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the built-in word table.
    pub fn load(&mut self) {
        let table = BUILTIN_LEXICON
            .iter()
            .map(|&(word, valence, arousal, dominance)| {
                (
                    word.to_string(),
                    AffectVector {
                        valence,
                        arousal,
                        dominance,
                    },
                )
            })
            .collect::<HashMap<_, _>>();
        info!(entries = table.len(), "Affect lexicon loaded (built-in)");
        self.lexicon = Some(table);
    }

    /// Load a word table from JSON: `{"word": {"valence": .., "arousal": .., "dominance": ..}}`.
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let raw: HashMap<String, AffectVector> = serde_json::from_str(json)
            .map_err(|e| RenderError::config(format!("invalid lexicon JSON: {e}")))?;
        let mut table = HashMap::with_capacity(raw.len());
        for (word, vector) in raw {
            vector.validate()?;
            table.insert(word.to_lowercase(), vector);
        }
        info!(entries = table.len(), "Affect lexicon loaded (custom)");
        self.lexicon = Some(table);
        Ok(())
    }

    /// Load a word table from a JSON file.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RenderError::config(format!("cannot read lexicon {}: {e}", path.display()))
        })?;
        self.load_json(&json)
    }

    pub fn is_loaded(&self) -> bool {
        self.lexicon.is_some()
    }

    fn score(lexicon: &HashMap<String, AffectVector>, text: &str) -> Result<AffectVector> {
        let mut sum = [0.0_f64; 3];
        let mut hits = 0usize;
        let mut negate = false;
        let mut intensify = false;

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            if NEGATORS.contains(&token.as_str()) {
                negate = true;
                continue;
            }
            if INTENSIFIERS.contains(&token.as_str()) {
                intensify = true;
                continue;
            }
            let Some(entry) = lexicon.get(&token) else {
                continue;
            };

            let mut v = [entry.valence, entry.arousal, entry.dominance];
            if negate {
                v[0] = 1.0 - v[0];
            }
            if intensify {
                for c in &mut v {
                    *c = (0.5 + (*c - 0.5) * INTENSIFIER_GAIN).clamp(0.0, 1.0);
                }
            }
            for (acc, c) in sum.iter_mut().zip(v) {
                *acc += c;
            }
            hits += 1;
            negate = false;
            intensify = false;
        }

        if hits == 0 {
            return Ok(AffectVector::neutral());
        }
        let n = hits as f64;
        AffectVector::new(sum[0] / n, sum[1] / n, sum[2] / n)
    }
}

#[async_trait]
impl AffectSource for LexiconAffectSource {
    async fn analyze(&self, text: &str) -> Result<AffectVector> {
        let lexicon = self
            .lexicon
            .as_ref()
            .ok_or_else(|| RenderError::ModelUnavailable {
                reason: "lexicon not loaded".to_string(),
            })?;
        debug!(chars = text.chars().count(), "Scoring directive text");
        Self::score(lexicon, text)
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> LexiconAffectSource {
        let mut source = LexiconAffectSource::new();
        source.load();
        source
    }

    #[test]
    fn rejects_out_of_range_components() {
        let err = AffectVector::new(1.5, 0.2, 0.3).unwrap_err();
        assert_eq!(
            err,
            RenderError::InvalidAffectVector {
                component: "valence",
                value: 1.5
            }
        );
        assert!(AffectVector::new(0.5, -0.01, 0.5).is_err());
        assert!(AffectVector::new(0.5, 0.5, f64::NAN).is_err());
    }

    #[test]
    fn accepts_cube_boundaries() {
        assert!(AffectVector::new(0.0, 1.0, 0.0).is_ok());
        assert!(AffectVector::new(1.0, 0.0, 1.0).is_ok());
    }

    #[tokio::test]
    async fn unloaded_source_is_unavailable() {
        let source = LexiconAffectSource::new();
        let err = source.analyze("anything").await.unwrap_err();
        assert!(matches!(err, RenderError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn melancholic_rain_is_low_valence_low_arousal() {
        let v = loaded()
            .analyze("Generate a melancholic track about digital rain")
            .await
            .unwrap();
        assert!(v.valence < 0.5, "valence {}", v.valence);
        assert!(v.arousal < 0.5, "arousal {}", v.arousal);
    }

    #[tokio::test]
    async fn upbeat_rhythm_is_high_valence_high_arousal() {
        let v = loaded()
            .analyze("Synthesize an upbeat rhythm for data transmission")
            .await
            .unwrap();
        assert!(v.valence >= 0.5, "valence {}", v.valence);
        assert!(v.arousal >= 0.5, "arousal {}", v.arousal);
    }

    #[tokio::test]
    async fn unknown_words_are_neutral() {
        let v = loaded().analyze("zzz qqq").await.unwrap();
        assert_eq!(v, AffectVector::neutral());
    }

    #[tokio::test]
    async fn negation_mirrors_valence() {
        let source = loaded();
        let happy = source.analyze("happy").await.unwrap();
        let not_happy = source.analyze("not happy").await.unwrap();
        assert!((not_happy.valence - (1.0 - happy.valence)).abs() < 1e-12);
        assert_eq!(not_happy.arousal, happy.arousal);
    }

    #[tokio::test]
    async fn intensifier_moves_away_from_center() {
        let source = loaded();
        let sad = source.analyze("sad").await.unwrap();
        let very_sad = source.analyze("very sad").await.unwrap();
        assert!(very_sad.valence < sad.valence);
    }

    #[tokio::test]
    async fn analysis_is_deterministic() {
        let source = loaded();
        let a = source.analyze("Powerful storm over the machine").await.unwrap();
        let b = source.analyze("Powerful storm over the machine").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_lexicon_rejects_invalid_entries() {
        let mut source = LexiconAffectSource::new();
        let err = source
            .load_json(r#"{"loud": {"valence": 0.5, "arousal": 1.2, "dominance": 0.5}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidAffectVector {
                component: "arousal",
                ..
            }
        ));
        assert!(!source.is_loaded());
    }

    #[tokio::test]
    async fn custom_lexicon_is_case_insensitive() {
        let mut source = LexiconAffectSource::new();
        source
            .load_json(r#"{"Neon": {"valence": 0.9, "arousal": 0.9, "dominance": 0.1}}"#)
            .unwrap();
        let v = source.analyze("NEON lights").await.unwrap();
        assert_eq!(v, AffectVector::new(0.9, 0.9, 0.1).unwrap());
    }
}
