/*!
 * Tests for sound library loading, matching and procedural fallback
 */

use std::fs;

use dramamix::app_config::SoundConfig;
use dramamix::audio::{write_wav, AudioBuffer};
use dramamix::errors::ProviderError;
use dramamix::providers::sound_library::{similarity, SoundEntry, SoundLibrary};
use dramamix::providers::{SoundManager, SoundSource};

use crate::common;

fn entry(id: &str, description: &str, category: Option<&str>) -> SoundEntry {
    SoundEntry {
        id: id.to_string(),
        description: description.to_string(),
        category: category.map(str::to_string),
        buffer: AudioBuffer::from_samples(8000, 1, vec![0.3; 400]),
    }
}

#[test]
fn test_similarity_should_ignore_case_and_punctuation() {
    assert!((similarity("Door, SLAM!", "door slam") - 1.0).abs() < 1e-9);
    assert_eq!(similarity("", "door"), 0.0);
}

#[test]
fn test_load_dir_should_index_wav_files_by_stem_and_folder() -> anyhow::Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let weather = temp_dir.path().join("Weather");
    fs::create_dir(&weather)?;
    let tone = AudioBuffer::from_samples(16_000, 2, vec![0.25; 3200]);
    write_wav(weather.join("steady_rain-on-roof.wav"), &tone, 16)?;
    write_wav(temp_dir.path().join("door_slam.wav"), &tone, 32)?;
    common::create_test_file(temp_dir.path(), "notes.txt", "not audio")?;
    common::create_test_file(temp_dir.path(), "broken.wav", "not a riff header")?;

    let mut library = SoundLibrary::new(&SoundConfig::default(), 8000, 1);
    let loaded = library.load_dir(temp_dir.path())?;
    assert_eq!(loaded, 2);
    assert_eq!(library.len(), 2);

    let (rain, score) = library.best_match("rain on the roof", Some("weather")).unwrap();
    assert_eq!(rain.description, "steady rain on roof");
    assert_eq!(rain.category.as_deref(), Some("weather"));
    assert!(score > 0.5);
    // Conformed to the library format on load
    assert_eq!(rain.buffer.sample_rate(), 8000);
    assert_eq!(rain.buffer.channels(), 1);

    let (door, _) = library.best_match("door slam", None).unwrap();
    assert!(door.category.is_none());
    Ok(())
}

#[test]
fn test_best_match_on_empty_library_should_be_none() {
    let library = SoundLibrary::new(&SoundConfig::default(), 8000, 1);
    assert!(library.is_empty());
    assert!(library.best_match("anything", None).is_none());
}

#[tokio::test]
async fn test_score_below_threshold_should_fall_back_to_procedural() {
    let config = SoundConfig {
        match_threshold: 0.9,
        ..SoundConfig::default()
    };
    let mut library = SoundLibrary::new(&config, 8000, 2);
    library.add(entry("door", "heavy wooden door slam", None));

    let resolution = library.resolve_sound("door creak", None, Some(1.0)).await.unwrap();
    match resolution.source {
        SoundSource::Procedural { best_score } => assert!(best_score > 0.0 && best_score < 0.9),
        other => panic!("expected procedural source, got {:?}", other),
    }
    assert_eq!(resolution.buffer.channels(), 2);
    assert_eq!(resolution.buffer.frames(), 8000);
}

#[tokio::test]
async fn test_category_match_should_ignore_case() {
    let mut library = SoundLibrary::new(&SoundConfig::default(), 8000, 1);
    library.add(entry("wind", "howling wind", Some("weather")));
    let resolution = library.resolve_sound("howling wind", Some("Weather"), None).await.unwrap();
    assert!(matches!(resolution.source, SoundSource::Library { ref id, .. } if id == "wind"));
    assert_eq!(resolution.buffer.frames(), 400);
}

#[tokio::test]
async fn test_empty_description_should_be_rejected() {
    let library = SoundLibrary::new(&SoundConfig::default(), 8000, 1);
    let err = library.resolve_sound("   ", None, None).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidRequest(_)));
}

#[test]
fn test_procedural_bed_should_stay_quiet_and_finite() {
    let library = SoundLibrary::new(&SoundConfig::default(), 8000, 1);
    let bed = library.procedural("distant traffic", 2.0);
    assert_eq!(bed.frames(), 16_000);
    assert!(bed.is_finite());
    assert!(bed.peak() <= 0.1 + 1e-6);
    assert!(bed.rms() > 0.0);
}
