/*!
 * Effect catalog and processing.
 *
 * - `catalog`: the closed effect set, parameter ranges and named presets
 * - `processor`: pure buffer transforms and chain application
 * - `dynamics`: compressor, limiter and envelope detection
 */

pub mod catalog;
pub mod dynamics;
pub mod processor;

pub use catalog::{EffectCatalog, EffectChain, EffectKind, EffectPreset, EffectSpec, ParameterClamp};
pub use processor::{apply_chain, apply_effect};
