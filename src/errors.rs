/*!
 * Error types for the dramamix engine.
 *
 * The taxonomy follows the production pipeline:
 * - `StructureError`: the script or its effect definitions are inconsistent (fatal)
 * - `ResolutionError`: a single synthesis/retrieval call failed (recovered with silence)
 * - `RenderError`: mastering produced an out-of-range result (fatal)
 *
 * `ProductionError` is what a run surfaces to its caller, always with a pointer
 * to the offending scene and event where one exists.
 */

use thiserror::Error;

/// Errors reported by the external voice and sound collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The generator rejected or failed the request
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// The generator has no usable model or voice for the request
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The request itself was malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Script-level inconsistencies. Always fatal to the run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructureError {
    /// An EffectRegionEnd arrived while no region was open
    #[error("Scene '{scene}': effect region end '{tag}' at event {event} has no matching start")]
    UnmatchedRegionEnd {
        scene: String,
        event: usize,
        tag: String,
    },

    /// An EffectRegionEnd closed a different region than the innermost open one
    #[error("Scene '{scene}': event {event} closes region '{found}' but '{expected}' is innermost")]
    MismatchedRegionEnd {
        scene: String,
        event: usize,
        expected: String,
        found: String,
    },

    /// The scene ended with regions still open
    #[error("Scene '{scene}': effect region '{tag}' is never closed")]
    UnclosedRegion { scene: String, tag: String },

    /// A dialogue line names a character with no voice profile
    #[error("Scene '{scene}': unknown speaker '{character}' at event {event}")]
    UnknownSpeaker {
        scene: String,
        event: usize,
        character: String,
    },

    /// An effect tag or effect name is not in the catalog
    #[error("Unknown effect: {name}")]
    UnknownEffect { name: String },

    /// An effect preset names a parameter the effect does not declare
    #[error("Effect '{effect}' has no parameter '{param}'")]
    UnknownParameter { effect: String, param: String },

    /// An element violates start >= 0 / duration > 0
    #[error("Invalid element: {reason}")]
    InvalidElement { reason: String },

    /// Two non-concurrent elements would overlap on one track
    #[error("Element on track '{track}' starting at {start:.3}s overlaps an element ending at {existing_end:.3}s")]
    Overlap {
        track: String,
        start: f64,
        existing_end: f64,
    },
}

/// A single synthesis or retrieval request could not be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolutionError {
    /// The collaborator returned an error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The collaborator did not answer in time
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The run was cancelled before the request was issued
    #[error("Request cancelled")]
    Cancelled,
}

/// Mastering produced something that cannot be emitted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Peak above the configured ceiling after limiting and normalization
    #[error("Persistent clipping: peak {peak:.6} exceeds ceiling {ceiling:.6}")]
    Clipping { peak: f32, ceiling: f32 },

    /// NaN or infinite samples in the mix
    #[error("Mix contains non-finite samples")]
    NonFinite,

    /// Nothing was placed in the session
    #[error("Session has no placed elements")]
    EmptySession,
}

/// Errors surfaced by a production run
#[derive(Error, Debug)]
pub enum ProductionError {
    /// The script is structurally inconsistent
    #[error("Structure error in scene '{scene}'{}: {source}", event_suffix(.event))]
    Structure {
        scene: String,
        event: Option<usize>,
        #[source]
        source: StructureError,
    },

    /// The effect preset table or a track's effect tags are invalid
    #[error("Effect catalog error: {0}")]
    Catalog(#[source] StructureError),

    /// Mastering failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The run was cancelled; scenes built so far stay inspectable
    #[error("Production cancelled after {completed_scenes} scene(s)")]
    Cancelled { completed_scenes: usize },
}

impl ProductionError {
    /// Wrap a structure error with its scene/event position
    pub fn structure(scene: &str, event: Option<usize>, source: StructureError) -> Self {
        Self::Structure {
            scene: scene.to_string(),
            event,
            source,
        }
    }
}

fn event_suffix(event: &Option<usize>) -> String {
    event.map(|e| format!(" at event {}", e)).unwrap_or_default()
}
