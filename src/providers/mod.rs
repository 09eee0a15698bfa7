/*!
 * External collaborators.
 *
 * Speech synthesis and sound retrieval are delegated to generative models
 * outside the engine. This module defines the interfaces they must satisfy
 * and ships the implementations the engine itself needs:
 * - `voice_profile`: trait tags to synthesis parameters
 * - `sound_library`: scored text-to-sound matching with procedural fallback
 * - `mock`: deterministic generators for tests and previews
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::audio::buffer::AudioBuffer;
use crate::effects::catalog::EffectChain;
use crate::errors::ProviderError;
use crate::script::Character;

pub mod mock;
pub mod sound_library;
pub mod voice_profile;

pub use voice_profile::VoiceProfile;

/// Turns (text, voice profile, emotion) into dry speech audio
///
/// Implementations must be idempotent for identical inputs so that results can
/// be cached. The effect chain is passed for conditioning only; the engine
/// applies it to the returned buffer.
#[async_trait]
pub trait VoiceGenerator: Send + Sync + Debug {
    /// Resolve a character's traits into synthesis parameters
    fn resolve_profile(&self, character: &Character) -> Result<VoiceProfile, ProviderError> {
        Ok(VoiceProfile::from_traits(&character.id, &character.traits))
    }

    /// Synthesize one line. A failure never yields a partial buffer.
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        emotion: Option<&str>,
        chain: &EffectChain,
    ) -> Result<AudioBuffer, ProviderError>;
}

/// Where a resolved sound came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoundSource {
    /// A library entry matched above the similarity threshold
    Library { id: String, score: f64 },
    /// No entry matched; a bed was generated
    Procedural { best_score: f64 },
}

/// A retrieved or generated sound
#[derive(Debug, Clone, PartialEq)]
pub struct SoundResolution {
    pub buffer: AudioBuffer,
    pub source: SoundSource,
}

/// Turns a text description into sound effect or bed audio
#[async_trait]
pub trait SoundManager: Send + Sync + Debug {
    async fn resolve_sound(
        &self,
        description: &str,
        category: Option<&str>,
        target_secs: Option<f64>,
    ) -> Result<SoundResolution, ProviderError>;
}
