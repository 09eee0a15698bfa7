/*!
 * # dramamix - audio drama production engine
 *
 * Turns a parsed drama script into one mastered audio file.
 *
 * ## Features
 *
 * - Absolute-time timeline from ordered script events:
 *   - dialogue and narration timed by their synthesized length
 *   - inline and concurrent sound cues
 *   - ambient and music beds with scene crossfades
 *   - nestable effect regions (flashback, internal thought, ...)
 * - Closed effect catalog with clamped parameters
 * - Concurrent, cached synthesis with timeouts and retries
 * - Per-track EQ and compression, side-chain ducking, master compression,
 *   limiting and loudness normalization
 * - Structured run report with every recovered failure
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `audio`: Sample buffers and WAV files
 * - `script`: The structured script input
 * - `effects`: Effect catalog, processor and dynamics
 * - `providers`: Voice and sound collaborators:
 *   - `providers::voice_profile`: Trait tags to synthesis parameters
 *   - `providers::sound_library`: Scored sound matching with generated fallback
 *   - `providers::mock`: Deterministic generators for tests and previews
 * - `production`: Session model, timeline builder, renderer and run orchestration
 * - `app_controller`: Command line workflow
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod effects;
pub mod errors;
pub mod production;
pub mod providers;
pub mod script;

// Re-export main types for easier usage
pub use app_config::Config;
pub use audio::AudioBuffer;
pub use effects::{EffectCatalog, EffectChain, EffectKind};
pub use errors::{ProductionError, ProviderError, RenderError, ResolutionError, StructureError};
pub use production::{ProductionOutput, ProductionRun, RunReport, RunState, RunWarning, Session, TrackKind};
pub use providers::{SoundManager, VoiceGenerator, VoiceProfile};
pub use script::{Production, Scene, ScriptEvent};
