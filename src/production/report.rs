/*!
 * Run report: what happened during a production run, for the layers above
 * the engine.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::effects::catalog::{EffectKind, ParameterClamp};

/// A recoverable problem recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunWarning {
    /// An effect parameter was pulled back into its valid range
    ParameterClamped {
        preset: String,
        effect: EffectKind,
        param: String,
        requested: f64,
        applied: f64,
    },
    /// No library sound matched; a procedural bed was used
    FallbackSound {
        scene: String,
        event: usize,
        description: String,
        best_score: f64,
    },
    /// Synthesis or retrieval failed; the event became silence
    LineReplacedWithSilence {
        scene: String,
        event: usize,
        duration: f64,
        reason: String,
    },
    /// A bed had no time left to play in its scene
    EmptyBed { scene: String, event: usize },
}

impl From<&ParameterClamp> for RunWarning {
    fn from(clamp: &ParameterClamp) -> Self {
        Self::ParameterClamped {
            preset: clamp.preset.clone(),
            effect: clamp.effect,
            param: clamp.param.clone(),
            requested: clamp.requested,
            applied: clamp.applied,
        }
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParameterClamped {
                preset,
                effect,
                param,
                requested,
                applied,
            } => write!(
                f,
                "Preset '{}': {}.{} clamped from {} to {}",
                preset, effect, param, requested, applied
            ),
            Self::FallbackSound {
                scene,
                event,
                description,
                best_score,
            } => write!(
                f,
                "Scene '{}' event {}: no library match for '{}' (best {:.2}), generated instead",
                scene, event, description, best_score
            ),
            Self::LineReplacedWithSilence {
                scene,
                event,
                duration,
                reason,
            } => write!(
                f,
                "Scene '{}' event {}: replaced with {:.2}s of silence ({})",
                scene, event, duration, reason
            ),
            Self::EmptyBed { scene, event } => {
                write!(f, "Scene '{}' event {}: bed has no duration, skipped", scene, event)
            }
        }
    }
}

/// Timing of one scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSummary {
    pub id: String,
    /// Absolute start in seconds
    pub start: f64,
    /// Cursor span of the scene, beds excluded
    pub duration: f64,
    /// Number of placed elements
    pub elements: usize,
}

/// Structured record of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Production title
    pub title: String,
    pub started_at: DateTime<Utc>,
    /// Length of the mastered audio in seconds
    pub total_duration: f64,
    pub scenes: Vec<SceneSummary>,
    /// Recovered failures, in the order they happened
    pub warnings: Vec<RunWarning>,
    /// Requests served from the synthesis cache
    pub cache_hits: usize,
    /// Requests that went to a generator
    pub cache_misses: usize,
}

impl RunReport {
    pub fn new(run_id: Uuid, title: &str) -> Self {
        Self {
            run_id,
            title: title.to_string(),
            started_at: Utc::now(),
            total_duration: 0.0,
            scenes: Vec::new(),
            warnings: Vec::new(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Warnings about lines or cues replaced with silence
    pub fn silenced(&self) -> impl Iterator<Item = &RunWarning> {
        self.warnings
            .iter()
            .filter(|w| matches!(w, RunWarning::LineReplacedWithSilence { .. }))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
