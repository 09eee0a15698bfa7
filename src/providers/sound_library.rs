/*!
 * Scored text-to-sound matching.
 *
 * Library entries are matched against a cue description by cosine similarity
 * of lowercase word-count vectors. When no entry reaches the configured
 * threshold a pink-noise bed is generated instead, seeded from the
 * description so the same cue always yields the same audio.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

use super::{SoundManager, SoundResolution, SoundSource};
use crate::app_config::SoundConfig;
use crate::audio::buffer::AudioBuffer;
use crate::audio::wav::read_wav;
use crate::errors::ProviderError;

/// Level of generated beds
const PROCEDURAL_AMPLITUDE: f32 = 0.1;

/// One library sound
#[derive(Debug, Clone)]
pub struct SoundEntry {
    pub id: String,
    pub description: String,
    pub category: Option<String>,
    pub buffer: AudioBuffer,
}

/// Lowercase word counts
fn word_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        *counts.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

/// Cosine similarity of two texts' word-count vectors, in [0, 1]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = word_counts(a);
    let b = word_counts(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let dot: usize = a
        .iter()
        .filter_map(|(word, n)| b.get(word).map(|m| n * m))
        .sum();
    let norm = |v: &HashMap<String, usize>| (v.values().map(|n| (n * n) as f64).sum::<f64>()).sqrt();
    dot as f64 / (norm(&a) * norm(&b))
}

/// In-memory sound library
#[derive(Debug, Clone)]
pub struct SoundLibrary {
    entries: Vec<SoundEntry>,
    match_threshold: f64,
    fallback_secs: f64,
    sample_rate: u32,
    channels: u16,
}

impl SoundLibrary {
    pub fn new(config: &SoundConfig, sample_rate: u32, channels: u16) -> Self {
        Self {
            entries: Vec::new(),
            match_threshold: config.match_threshold,
            fallback_secs: config.fallback_secs,
            sample_rate,
            channels,
        }
    }

    /// Load every WAV file under `dir`. The description is the file stem with
    /// separators turned into spaces; the category is the parent directory.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if !entry.file_type().is_file() || !is_wav {
                continue;
            }

            let buffer = match read_wav(path) {
                Ok(buffer) => buffer,
                Err(e) => {
                    warn!("Skipping unreadable sound {:?}: {}", path, e);
                    continue;
                }
            };
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let category = path
                .parent()
                .filter(|p| *p != dir)
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(|s| s.to_lowercase());

            self.add(SoundEntry {
                id: path
                    .strip_prefix(dir)
                    .unwrap_or(path)
                    .to_string_lossy()
                    .to_string(),
                description: stem.replace(['_', '-'], " "),
                category,
                buffer,
            });
            loaded += 1;
        }

        info!("Loaded {} sounds from {:?}", loaded, dir);
        Ok(loaded)
    }

    pub fn add(&mut self, entry: SoundEntry) {
        let buffer = entry.buffer.conformed(self.sample_rate, self.channels);
        self.entries.push(SoundEntry { buffer, ..entry });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best-scoring entry within the category (all entries when none is given)
    pub fn best_match(&self, description: &str, category: Option<&str>) -> Option<(&SoundEntry, f64)> {
        self.entries
            .iter()
            .filter(|e| match category {
                Some(c) => e
                    .category
                    .as_deref()
                    .is_some_and(|ec| ec.eq_ignore_ascii_case(c)),
                None => true,
            })
            .map(|e| (e, similarity(description, &e.description)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Pink noise seeded from the description
    pub fn procedural(&self, description: &str, secs: f64) -> AudioBuffer {
        let digest = Sha256::digest(description.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(u64::from_le_bytes(seed));

        let mut buffer = AudioBuffer::silence(self.sample_rate, 1, secs);
        // Paul Kellet's economy pink filter
        let (mut b0, mut b1, mut b2) = (0.0f32, 0.0f32, 0.0f32);
        for sample in buffer.samples_mut() {
            let white: f32 = rng.random_range(-1.0..1.0);
            b0 = 0.99765 * b0 + white * 0.0990460;
            b1 = 0.96300 * b1 + white * 0.2965164;
            b2 = 0.57000 * b2 + white * 1.0526913;
            let pink = b0 + b1 + b2 + white * 0.1848;
            *sample = (pink * 0.25).clamp(-1.0, 1.0) * PROCEDURAL_AMPLITUDE;
        }
        let frames = buffer.frames();
        let fade = frames / 20;
        buffer.apply_fades(fade, fade);
        buffer.to_channels(self.channels)
    }
}

#[async_trait]
impl SoundManager for SoundLibrary {
    async fn resolve_sound(
        &self,
        description: &str,
        category: Option<&str>,
        target_secs: Option<f64>,
    ) -> Result<SoundResolution, ProviderError> {
        if description.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "Empty sound description".to_string(),
            ));
        }

        let best = self.best_match(description, category);
        let best_score = best.map(|(_, score)| score).unwrap_or(0.0);

        match best {
            Some((entry, score)) if score >= self.match_threshold => {
                debug!(
                    "Matched '{}' to '{}' (score {:.3})",
                    description, entry.id, score
                );
                let buffer = match target_secs {
                    Some(secs) => entry.buffer.looped_to(secs),
                    None => entry.buffer.clone(),
                };
                Ok(SoundResolution {
                    buffer,
                    source: SoundSource::Library {
                        id: entry.id.clone(),
                        score,
                    },
                })
            }
            _ => {
                debug!(
                    "No library match for '{}' (best {:.3}), generating",
                    description, best_score
                );
                let secs = target_secs.unwrap_or(self.fallback_secs);
                Ok(SoundResolution {
                    buffer: self.procedural(description, secs),
                    source: SoundSource::Procedural { best_score },
                })
            }
        }
    }
}
