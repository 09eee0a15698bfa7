/*!
 * Common test utilities for the dramamix test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use dramamix::app_config::Config;
use dramamix::production::ProductionRun;
use dramamix::providers::mock::{MockSoundManager, MockVoiceGenerator};
use dramamix::script::{Character, Production, Scene};

/// Sample rate used across tests; low to keep renders fast
pub const TEST_SAMPLE_RATE: u32 = 8_000;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Mono, low-rate configuration with fast failure handling
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.output.sample_rate = TEST_SAMPLE_RATE;
    config.output.channels = 1;
    config.synthesis.max_concurrent_requests = 4;
    config.synthesis.retry_count = 0;
    config.synthesis.retry_backoff_ms = 1;
    config.synthesis.timeout_secs = 5;
    config
}

/// Timing with no pauses or fades, so element times are exact sums
pub fn tight_config() -> Config {
    let mut config = test_config();
    config.timing.inter_line_pause_secs = 0.0;
    config.timing.pause_after_cue_secs = 0.0;
    config.timing.element_fade_secs = 0.0;
    config
}

/// A production with a small cast
pub fn production(scenes: Vec<Scene>) -> Production {
    Production {
        title: "Test Play".to_string(),
        characters: vec![
            Character::new("alice", &["female", "young"]),
            Character::new("bob", &["male", "deep"]),
            Character::new("narrator", &["calm"]),
        ],
        scenes,
        ..Default::default()
    }
}

/// Run over mock collaborators
pub fn run_with(config: Config, voice: MockVoiceGenerator, sounds: MockSoundManager) -> ProductionRun {
    ProductionRun::new(config, Arc::new(voice), Arc::new(sounds))
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
