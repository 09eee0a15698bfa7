/*!
 * The production engine.
 *
 * - `session`: tracks and placed elements
 * - `timeline`: scene cursor, region stack and placement
 * - `resolver`: concurrent synthesis and retrieval
 * - `cache`: reuse of identical resolved requests
 * - `renderer`: per-track processing and the mastering chain
 * - `report`: warnings and timings of a run
 * - `orchestrator`: the run state machine tying it together
 */

pub mod cache;
pub mod orchestrator;
pub mod renderer;
pub mod report;
pub mod resolver;
pub mod session;
pub mod timeline;

pub use cache::SynthesisCache;
pub use orchestrator::{CancelHandle, FailureReason, ProductionOutput, ProductionRun, RunState};
pub use renderer::render;
pub use report::{RunReport, RunWarning, SceneSummary};
pub use session::{AudioElement, CrossfadeWindow, ElementClass, ElementId, Session, Track, TrackKind};
