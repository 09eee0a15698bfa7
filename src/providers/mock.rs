/*!
 * Deterministic generator implementations for testing and previews.
 *
 * These stand in for real speech and sound models:
 * - `MockVoiceGenerator::preview()` - tone sketches timed at a fixed word rate
 * - `MockVoiceGenerator::fixed(secs)` - every line lasts exactly `secs`
 * - `MockVoiceGenerator::failing()` - always fails with an error
 * - `MockVoiceGenerator::intermittent(n)` - every nth request fails
 * - `MockVoiceGenerator::slow(ms)` - delays each request (timeout testing)
 *
 * `MockSoundManager` offers the same behaviors for sound retrieval.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{SoundManager, SoundResolution, SoundSource, VoiceGenerator, VoiceProfile};
use crate::audio::buffer::{db_to_linear, AudioBuffer};
use crate::effects::catalog::EffectChain;
use crate::errors::ProviderError;

/// Speaking rate of the preview voice
pub const PREVIEW_WORDS_PER_MINUTE: f64 = 150.0;

/// Sample rate of generated mock audio
pub const MOCK_SAMPLE_RATE: u32 = 44_100;

/// Behavior mode for the mock generators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Durations follow the text at the preview word rate
    WordRate,
    /// Every request lasts the same number of seconds
    Fixed { secs: f64 },
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Delays each request before answering at the word rate
    Slow { delay_ms: u64 },
}

/// Shared request bookkeeping
#[derive(Debug, Clone, Default)]
struct CallLog {
    count: Arc<AtomicUsize>,
}

impl CallLog {
    fn next(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst)
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

async fn behave(behavior: MockBehavior, count: usize, what: &str) -> Result<Option<f64>, ProviderError> {
    match behavior {
        MockBehavior::WordRate => Ok(None),
        MockBehavior::Fixed { secs } => Ok(Some(secs)),
        MockBehavior::Intermittent { fail_every } => {
            if fail_every > 0 && count % fail_every == fail_every - 1 {
                Err(ProviderError::GenerationFailed(format!(
                    "Simulated intermittent failure for {}",
                    what
                )))
            } else {
                Ok(None)
            }
        }
        MockBehavior::Failing => Err(ProviderError::ModelUnavailable(format!(
            "Simulated failure for {}",
            what
        ))),
        MockBehavior::Slow { delay_ms } => {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(None)
        }
    }
}

/// Seconds needed to speak `text` at the preview rate
pub fn word_rate_secs(text: &str, speed: f64) -> f64 {
    let words = text.split_whitespace().count().max(1) as f64;
    (words * 60.0 / PREVIEW_WORDS_PER_MINUTE / speed.max(0.1)).max(0.3)
}

/// A tone sketch of a line: one short syllable-like burst per word
fn sketch_line(text: &str, secs: f64, base_hz: f64, level: f64) -> AudioBuffer {
    let mut buffer = AudioBuffer::silence(MOCK_SAMPLE_RATE, 1, secs);
    let words: Vec<&str> = text.split_whitespace().collect();
    let slots = words.len().max(1);
    let frames = buffer.frames();
    let slot_len = (frames / slots).max(1);

    for (slot, chunk) in buffer.samples_mut().chunks_mut(slot_len).enumerate() {
        let word_len = words.get(slot).map(|w| w.len()).unwrap_or(3) as f64;
        let freq = base_hz * (1.0 + 0.04 * (word_len % 5.0));
        let voiced = (chunk.len() as f64 * 0.85) as usize;
        for (i, sample) in chunk.iter_mut().enumerate().take(voiced) {
            let t = i as f64 / MOCK_SAMPLE_RATE as f64;
            let env = (PI * i as f64 / voiced as f64).sin();
            *sample = (level * env * (2.0 * PI * freq * t).sin()) as f32;
        }
    }
    buffer
}

/// Mock voice generator
#[derive(Debug, Clone)]
pub struct MockVoiceGenerator {
    behavior: MockBehavior,
    calls: CallLog,
    /// Per-text duration overrides
    durations: HashMap<String, f64>,
}

impl MockVoiceGenerator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: CallLog::default(),
            durations: HashMap::new(),
        }
    }

    /// Word-rate preview voice used by the command line
    pub fn preview() -> Self {
        Self::new(MockBehavior::WordRate)
    }

    pub fn fixed(secs: f64) -> Self {
        Self::new(MockBehavior::Fixed { secs })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Make the line with this exact text last `secs`
    pub fn with_duration(mut self, text: &str, secs: f64) -> Self {
        self.durations.insert(text.to_string(), secs);
        self
    }

    /// Number of synthesis requests received
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait]
impl VoiceGenerator for MockVoiceGenerator {
    async fn synthesize(
        &self,
        text: &str,
        profile: &VoiceProfile,
        emotion: Option<&str>,
        _chain: &EffectChain,
    ) -> Result<AudioBuffer, ProviderError> {
        let count = self.calls.next();
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("Empty line".to_string()));
        }
        let fixed = behave(self.behavior, count, text).await?;

        let secs = self
            .durations
            .get(text)
            .copied()
            .or(fixed)
            .unwrap_or_else(|| word_rate_secs(text, profile.speed));
        let emphasis = match emotion {
            Some("angry") | Some("excited") | Some("shouting") => 3.0,
            Some("sad") | Some("whisper") | Some("quiet") => -4.0,
            _ => 0.0,
        };
        let level = 0.3 * db_to_linear(profile.volume_db + emphasis);
        Ok(sketch_line(text, secs, 160.0 * profile.pitch_ratio(), level))
    }
}

/// Mock sound manager
#[derive(Debug, Clone)]
pub struct MockSoundManager {
    behavior: MockBehavior,
    calls: CallLog,
    procedural: bool,
}

impl MockSoundManager {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: CallLog::default(),
            procedural: false,
        }
    }

    /// Sounds last their target duration, or one second
    pub fn working() -> Self {
        Self::new(MockBehavior::WordRate)
    }

    pub fn fixed(secs: f64) -> Self {
        Self::new(MockBehavior::Fixed { secs })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Report every sound as a procedural fallback
    pub fn as_procedural(mut self) -> Self {
        self.procedural = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait]
impl SoundManager for MockSoundManager {
    async fn resolve_sound(
        &self,
        description: &str,
        _category: Option<&str>,
        target_secs: Option<f64>,
    ) -> Result<SoundResolution, ProviderError> {
        let count = self.calls.next();
        let fixed = behave(self.behavior, count, description).await?;
        let secs = fixed.or(target_secs).unwrap_or(1.0);

        // Pitch derived from the description so distinct cues differ
        let hz = 80.0 + (description.bytes().map(u32::from).sum::<u32>() % 400) as f64;
        let frames = (secs * MOCK_SAMPLE_RATE as f64).round() as usize;
        let samples = (0..frames)
            .map(|i| (0.2 * (2.0 * PI * hz * i as f64 / MOCK_SAMPLE_RATE as f64).sin()) as f32)
            .collect();

        let source = if self.procedural {
            SoundSource::Procedural { best_score: 0.0 }
        } else {
            SoundSource::Library {
                id: description.to_string(),
                score: 1.0,
            }
        };
        Ok(SoundResolution {
            buffer: AudioBuffer::from_samples(MOCK_SAMPLE_RATE, 1, samples),
            source,
        })
    }
}
