/*!
 * Synthesis caching.
 *
 * Resolved buffers are reused verbatim when an identical request recurs. The
 * key covers everything that shapes the final buffer, including the effect
 * chain: the same line under a flashback and outside it must not share an
 * entry.
 */

use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::effects::catalog::EffectChain;
use crate::providers::{SoundSource, VoiceProfile};

/// Digest identifying one synthesis or retrieval request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum KeyMaterial<'a> {
    Voice {
        text: &'a str,
        profile: &'a VoiceProfile,
        emotion: Option<&'a str>,
        chain: &'a EffectChain,
    },
    Sound {
        description: &'a str,
        category: Option<&'a str>,
        target_secs: Option<f64>,
        chain: &'a EffectChain,
    },
}

impl CacheKey {
    fn digest(material: &KeyMaterial<'_>) -> Self {
        let bytes = serde_json::to_vec(material).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn voice(text: &str, profile: &VoiceProfile, emotion: Option<&str>, chain: &EffectChain) -> Self {
        Self::digest(&KeyMaterial::Voice {
            text,
            profile,
            emotion,
            chain,
        })
    }

    pub fn sound(
        description: &str,
        category: Option<&str>,
        target_secs: Option<f64>,
        chain: &EffectChain,
    ) -> Self {
        Self::digest(&KeyMaterial::Sound {
            description,
            category,
            target_secs,
            chain,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A cached, fully processed buffer
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAudio {
    pub buffer: AudioBuffer,
    pub source: Option<SoundSource>,
}

/// Synthesis cache shared by the concurrent resolution workers
#[derive(Debug, Clone)]
pub struct SynthesisCache {
    entries: Arc<RwLock<HashMap<CacheKey, CachedAudio>>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
    enabled: bool,
}

impl SynthesisCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            enabled,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedAudio> {
        if !self.enabled {
            return None;
        }
        match self.entries.read().get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", &key.0[..12]);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", &key.0[..12]);
                None
            }
        }
    }

    pub fn store(&self, key: CacheKey, audio: CachedAudio) {
        if !self.enabled {
            return;
        }
        self.entries.write().insert(key, audio);
    }

    /// (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        (hits, misses, rate)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl Default for SynthesisCache {
    fn default() -> Self {
        Self::new(true)
    }
}
