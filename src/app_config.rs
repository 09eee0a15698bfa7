use anyhow::{anyhow, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::production::session::TrackKind;

/// Application configuration module
/// This module handles the engine configuration: output format, timing rules,
/// per-track treatment, ducking, mastering and the synthesis worker pool.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Output artifact format
    #[serde(default)]
    pub output: OutputConfig,

    /// Timeline spacing rules
    #[serde(default)]
    pub timing: TimingConfig,

    /// Per-track treatment
    #[serde(default)]
    pub tracks: TracksConfig,

    /// Side-chain ducking
    #[serde(default)]
    pub ducking: DuckingConfig,

    /// Master bus chain
    #[serde(default)]
    pub mastering: MasteringConfig,

    /// External synthesis calls
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// Sound retrieval
    #[serde(default)]
    pub sounds: SoundConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Output artifact format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Sample rate in Hz (44100 by default, 48000 for delivery)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Bits per sample: 16 or 24 (integer) or 32 (float)
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,

    /// Channel count (1 or 2)
    #[serde(default = "default_channels")]
    pub channels: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            bit_depth: default_bit_depth(),
            channels: default_channels(),
        }
    }
}

/// Crossfade curve used at scene transitions
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrossfadeCurve {
    Linear,
    #[default]
    EqualPower,
}

impl CrossfadeCurve {
    /// Gains (outgoing, incoming) at position `x` in [0, 1] of the window
    pub fn gains(&self, x: f64) -> (f64, f64) {
        let x = x.clamp(0.0, 1.0);
        match self {
            Self::Linear => (1.0 - x, x),
            Self::EqualPower => {
                let angle = x * std::f64::consts::FRAC_PI_2;
                (angle.cos(), angle.sin())
            }
        }
    }
}

/// Timeline spacing rules
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimingConfig {
    /// Pause after each dialogue/narration line
    #[serde(default = "default_inter_line_pause_secs")]
    pub inter_line_pause_secs: f64,

    /// Pause after an inline sound cue
    #[serde(default)]
    pub pause_after_cue_secs: f64,

    /// Silence between the end of one scene and the start of the next
    #[serde(default = "default_scene_gap_secs")]
    pub scene_gap_secs: f64,

    /// Crossfade window used when a transition marker has no explicit duration
    #[serde(default = "default_crossfade_secs")]
    pub default_crossfade_secs: f64,

    /// Fade curve for scene crossfades
    #[serde(default)]
    pub crossfade_curve: CrossfadeCurve,

    /// Duration of the silence that replaces a failed line or cue
    #[serde(default = "default_placeholder_secs")]
    pub placeholder_secs: f64,

    /// Declick fade applied to both ends of every element
    #[serde(default = "default_element_fade_secs")]
    pub element_fade_secs: f64,

    /// Inter-line pause overrides keyed by scene mood
    #[serde(default)]
    pub mood_pauses: BTreeMap<String, f64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inter_line_pause_secs: default_inter_line_pause_secs(),
            pause_after_cue_secs: 0.0,
            scene_gap_secs: default_scene_gap_secs(),
            default_crossfade_secs: default_crossfade_secs(),
            crossfade_curve: CrossfadeCurve::default(),
            placeholder_secs: default_placeholder_secs(),
            element_fade_secs: default_element_fade_secs(),
            mood_pauses: BTreeMap::new(),
        }
    }
}

/// Three-band equalizer settings in dB
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct EqConfig {
    #[serde(default)]
    pub low_db: f64,
    #[serde(default)]
    pub mid_db: f64,
    #[serde(default)]
    pub high_db: f64,
}

/// Compressor settings
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CompressorConfig {
    #[serde(default = "default_track_threshold_db")]
    pub threshold_db: f64,
    #[serde(default = "default_track_ratio")]
    pub ratio: f64,
    #[serde(default = "default_attack_secs")]
    pub attack_secs: f64,
    #[serde(default = "default_release_secs")]
    pub release_secs: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_track_threshold_db(),
            ratio: default_track_ratio(),
            attack_secs: default_attack_secs(),
            release_secs: default_release_secs(),
        }
    }
}

/// Treatment shared by every element of one track
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrackConfig {
    /// Track level in dB relative to full scale
    #[serde(default)]
    pub base_gain_db: f64,

    /// Apply the track equalizer before summation
    #[serde(default)]
    pub equalize: bool,

    /// Apply the track compressor before summation
    #[serde(default)]
    pub compress: bool,

    /// Duck this track under the key tracks
    #[serde(default)]
    pub side_chain: bool,

    /// Catalog effect tags applied to the whole track
    #[serde(default)]
    pub effects: Vec<String>,

    /// Equalizer bands
    #[serde(default)]
    pub eq: EqConfig,

    /// Compressor settings
    #[serde(default)]
    pub compressor: CompressorConfig,
}

impl TrackConfig {
    fn with_gain(base_gain_db: f64) -> Self {
        Self {
            base_gain_db,
            equalize: false,
            compress: false,
            side_chain: false,
            effects: Vec::new(),
            eq: EqConfig::default(),
            compressor: CompressorConfig::default(),
        }
    }

    fn vocal() -> Self {
        Self {
            equalize: true,
            compress: true,
            // Cut rumble, lift presence slightly
            eq: EqConfig {
                low_db: -3.0,
                mid_db: 0.0,
                high_db: 2.0,
            },
            ..Self::with_gain(0.0)
        }
    }
}

/// Authored track settings; fields left out keep the track's preset
#[derive(Debug, Deserialize, Default)]
struct TrackOverride {
    base_gain_db: Option<f64>,
    equalize: Option<bool>,
    compress: Option<bool>,
    side_chain: Option<bool>,
    effects: Option<Vec<String>>,
    eq: Option<EqConfig>,
    compressor: Option<CompressorConfig>,
}

impl TrackOverride {
    fn over(self, preset: TrackConfig) -> TrackConfig {
        TrackConfig {
            base_gain_db: self.base_gain_db.unwrap_or(preset.base_gain_db),
            equalize: self.equalize.unwrap_or(preset.equalize),
            compress: self.compress.unwrap_or(preset.compress),
            side_chain: self.side_chain.unwrap_or(preset.side_chain),
            effects: self.effects.unwrap_or(preset.effects),
            eq: self.eq.unwrap_or(preset.eq),
            compressor: self.compressor.unwrap_or(preset.compressor),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TracksOverride {
    dialogue: TrackOverride,
    narrator: TrackOverride,
    sfx: TrackOverride,
    ambient: TrackOverride,
    music: TrackOverride,
}

impl From<TracksOverride> for TracksConfig {
    fn from(authored: TracksOverride) -> Self {
        Self {
            dialogue: authored.dialogue.over(TrackConfig::vocal()),
            narrator: authored.narrator.over(TrackConfig::vocal()),
            sfx: authored.sfx.over(default_sfx_track()),
            ambient: authored.ambient.over(default_ambient_track()),
            music: authored.music.over(default_music_track()),
        }
    }
}

/// Per-track treatment, one entry per track type.
///
/// Each entry is merged field by field over that track's preset, so
/// `"music": { "base_gain_db": -6 }` keeps music side-chained. An authored
/// `eq` or `compressor` object replaces the preset one whole.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(from = "TracksOverride")]
pub struct TracksConfig {
    pub dialogue: TrackConfig,
    pub narrator: TrackConfig,
    pub sfx: TrackConfig,
    pub ambient: TrackConfig,
    pub music: TrackConfig,
}

impl TracksConfig {
    /// Settings for one track type
    pub fn get(&self, kind: TrackKind) -> &TrackConfig {
        match kind {
            TrackKind::Dialogue => &self.dialogue,
            TrackKind::Narrator => &self.narrator,
            TrackKind::Sfx => &self.sfx,
            TrackKind::Ambient => &self.ambient,
            TrackKind::Music => &self.music,
        }
    }

    /// Mutable settings for one track type
    pub fn get_mut(&mut self, kind: TrackKind) -> &mut TrackConfig {
        match kind {
            TrackKind::Dialogue => &mut self.dialogue,
            TrackKind::Narrator => &mut self.narrator,
            TrackKind::Sfx => &mut self.sfx,
            TrackKind::Ambient => &mut self.ambient,
            TrackKind::Music => &mut self.music,
        }
    }
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            dialogue: TrackConfig::vocal(),
            narrator: TrackConfig::vocal(),
            sfx: default_sfx_track(),
            ambient: default_ambient_track(),
            music: default_music_track(),
        }
    }
}

/// Side-chain ducking settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DuckingConfig {
    /// Key energy (RMS dBFS) above which side-chained tracks duck
    #[serde(default = "default_duck_threshold_db")]
    pub threshold_db: f64,

    /// Gain applied to side-chained tracks while ducked
    #[serde(default = "default_duck_db")]
    pub duck_db: f64,

    /// Time to reach the ducked level
    #[serde(default = "default_duck_attack_secs")]
    pub attack_secs: f64,

    /// Time to recover after the key falls below threshold
    #[serde(default = "default_duck_release_secs")]
    pub release_secs: f64,

    /// Tracks whose energy drives the ducking
    #[serde(default = "default_key_tracks")]
    pub key_tracks: Vec<TrackKind>,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            threshold_db: default_duck_threshold_db(),
            duck_db: default_duck_db(),
            attack_secs: default_duck_attack_secs(),
            release_secs: default_duck_release_secs(),
            key_tracks: default_key_tracks(),
        }
    }
}

/// Master bus settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MasteringConfig {
    #[serde(default = "default_master_threshold_db")]
    pub compressor_threshold_db: f64,
    #[serde(default = "default_master_ratio")]
    pub compressor_ratio: f64,
    #[serde(default = "default_master_attack_secs")]
    pub compressor_attack_secs: f64,
    #[serde(default = "default_master_release_secs")]
    pub compressor_release_secs: f64,

    /// Hard ceiling in dBFS; no output sample exceeds it
    #[serde(default = "default_ceiling_db")]
    pub ceiling_db: f64,

    /// Limiter release time
    #[serde(default = "default_limiter_release_secs")]
    pub limiter_release_secs: f64,

    /// Loudness target as RMS dBFS
    #[serde(default = "default_target_loudness_db")]
    pub target_loudness_db: f64,

    /// Lowest accepted track base gain
    #[serde(default = "default_min_base_gain_db")]
    pub min_base_gain_db: f64,

    /// Highest accepted track base gain
    #[serde(default = "default_max_base_gain_db")]
    pub max_base_gain_db: f64,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            compressor_threshold_db: default_master_threshold_db(),
            compressor_ratio: default_master_ratio(),
            compressor_attack_secs: default_master_attack_secs(),
            compressor_release_secs: default_master_release_secs(),
            ceiling_db: default_ceiling_db(),
            limiter_release_secs: default_limiter_release_secs(),
            target_loudness_db: default_target_loudness_db(),
            min_base_gain_db: default_min_base_gain_db(),
            max_base_gain_db: default_max_base_gain_db(),
        }
    }
}

/// External synthesis request settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SynthesisConfig {
    /// Maximum number of concurrent requests
    #[serde(default = "default_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Reuse buffers for identical requests
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_concurrent_requests(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            cache_enabled: true,
        }
    }
}

/// Sound retrieval settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SoundConfig {
    /// Minimum similarity for a library match
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,

    /// Length of a procedural bed when no target duration is known
    #[serde(default = "default_fallback_secs")]
    pub fallback_secs: f64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            fallback_secs: default_fallback_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_bit_depth() -> u16 {
    16
}

fn default_channels() -> u16 {
    2
}

fn default_inter_line_pause_secs() -> f64 {
    0.3
}

fn default_scene_gap_secs() -> f64 {
    1.5
}

fn default_crossfade_secs() -> f64 {
    2.0
}

fn default_placeholder_secs() -> f64 {
    1.0
}

fn default_element_fade_secs() -> f64 {
    0.01
}

fn default_track_threshold_db() -> f64 {
    -20.0
}

fn default_track_ratio() -> f64 {
    3.0
}

fn default_attack_secs() -> f64 {
    0.005
}

fn default_release_secs() -> f64 {
    0.1
}

fn default_sfx_track() -> TrackConfig {
    TrackConfig::with_gain(-3.0)
}

fn default_ambient_track() -> TrackConfig {
    TrackConfig::with_gain(-12.0)
}

fn default_music_track() -> TrackConfig {
    TrackConfig {
        side_chain: true,
        ..TrackConfig::with_gain(-9.0)
    }
}

fn default_duck_threshold_db() -> f64 {
    -40.0
}

fn default_duck_db() -> f64 {
    -12.0
}

fn default_duck_attack_secs() -> f64 {
    0.05
}

fn default_duck_release_secs() -> f64 {
    0.4
}

fn default_key_tracks() -> Vec<TrackKind> {
    vec![TrackKind::Dialogue]
}

fn default_master_threshold_db() -> f64 {
    -18.0
}

fn default_master_ratio() -> f64 {
    3.0
}

fn default_master_attack_secs() -> f64 {
    0.01
}

fn default_master_release_secs() -> f64 {
    0.2
}

fn default_ceiling_db() -> f64 {
    -1.0
}

fn default_limiter_release_secs() -> f64 {
    0.05
}

fn default_target_loudness_db() -> f64 {
    -20.0
}

fn default_min_base_gain_db() -> f64 {
    -60.0
}

fn default_max_base_gain_db() -> f64 {
    12.0
}

fn default_concurrent_requests() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_match_threshold() -> f64 {
    0.35
}

fn default_fallback_secs() -> f64 {
    3.0
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if !(8_000..=192_000).contains(&self.output.sample_rate) {
            return Err(anyhow!("Unsupported sample rate: {}", self.output.sample_rate));
        }

        if !matches!(self.output.bit_depth, 16 | 24 | 32) {
            return Err(anyhow!("Unsupported bit depth: {}", self.output.bit_depth));
        }

        if !matches!(self.output.channels, 1 | 2) {
            return Err(anyhow!("Unsupported channel count: {}", self.output.channels));
        }

        if self.mastering.ceiling_db > 0.0 {
            return Err(anyhow!(
                "Mastering ceiling must be at or below 0 dBFS, got {}",
                self.mastering.ceiling_db
            ));
        }

        if self.mastering.compressor_ratio < 1.0 {
            return Err(anyhow!("Master compressor ratio must be at least 1:1"));
        }

        if self.mastering.min_base_gain_db > self.mastering.max_base_gain_db {
            return Err(anyhow!("Base gain bounds are inverted"));
        }

        for kind in TrackKind::ALL {
            let gain = self.tracks.get(kind).base_gain_db;
            if gain < self.mastering.min_base_gain_db || gain > self.mastering.max_base_gain_db {
                return Err(anyhow!(
                    "Base gain {} dB for track '{}' is outside [{}, {}]",
                    gain,
                    kind,
                    self.mastering.min_base_gain_db,
                    self.mastering.max_base_gain_db
                ));
            }
        }

        if self.synthesis.max_concurrent_requests == 0 {
            return Err(anyhow!("At least one synthesis worker is required"));
        }

        if self.synthesis.timeout_secs == 0 {
            return Err(anyhow!("Synthesis timeout must be at least one second"));
        }

        let timing = &self.timing;
        let spans = [
            ("inter_line_pause_secs", timing.inter_line_pause_secs),
            ("pause_after_cue_secs", timing.pause_after_cue_secs),
            ("scene_gap_secs", timing.scene_gap_secs),
            ("default_crossfade_secs", timing.default_crossfade_secs),
            ("element_fade_secs", timing.element_fade_secs),
        ];
        for (name, value) in spans {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("Timing value '{}' must be a non-negative number", name));
            }
        }

        if timing.placeholder_secs <= 0.0 {
            return Err(anyhow!("Placeholder duration must be positive"));
        }

        if !(0.0..=1.0).contains(&self.sounds.match_threshold) {
            return Err(anyhow!("Sound match threshold must be within [0, 1]"));
        }

        Ok(())
    }
}
