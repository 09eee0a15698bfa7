/*!
 * Script file to WAV and report through the application controller
 */

use anyhow::Result;

use dramamix::app_controller::{Controller, RenderTargets};
use dramamix::audio::{read_wav, write_wav, AudioBuffer};
use dramamix::production::RunReport;

use crate::common;

const SCRIPT: &str = r#"{
    "title": "The Lighthouse",
    "characters": [
        { "id": "keeper", "traits": ["male", "old", "gravelly"] },
        { "id": "narrator", "traits": ["calm"] }
    ],
    "effects": {
        "radio": [ { "effect": "bandpass", "params": { "cutoff": 0.2 } } ]
    },
    "scenes": [
        {
            "id": "tower",
            "mood": "tense",
            "events": [
                { "type": "ambient_bed", "text": "waves crashing on rocks", "category": "weather" },
                { "type": "narration", "text": "The storm had not let up for three days." },
                { "type": "sound_cue", "text": "foghorn", "duration": 1.0 },
                { "type": "dialogue", "character": "keeper", "text": "Is anyone out there?", "effect": "radio" },
                { "type": "transition_marker", "duration": 1.0 }
            ]
        },
        {
            "id": "shore",
            "events": [
                { "type": "music_cue", "text": "slow piano" },
                { "type": "dialogue", "character": "keeper", "text": "Morning came at last." }
            ]
        }
    ]
}"#;

#[tokio::test]
async fn test_render_should_write_wav_and_report() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let script = common::create_test_file(temp_dir.path(), "lighthouse.json", SCRIPT)?;
    let report_path = temp_dir.path().join("run.json");
    let targets = RenderTargets::for_script(&script, None, Some(report_path.clone()));

    let controller = Controller::with_config(common::test_config())?;
    let output = controller.run(&script, &targets).await?;

    let written = read_wav(temp_dir.path().join("lighthouse.wav"))?;
    assert_eq!(written.sample_rate(), common::TEST_SAMPLE_RATE);
    assert_eq!(written.channels(), 1);
    assert_eq!(written.frames(), output.audio.frames());

    let report: RunReport = serde_json::from_str(&std::fs::read_to_string(&report_path)?)?;
    assert_eq!(report.title, "The Lighthouse");
    assert_eq!(report.scenes.len(), 2);
    // No library was given, so every sound was generated
    assert!(report.warnings.iter().any(|w| w.to_string().contains("foghorn")));
    Ok(())
}

#[tokio::test]
async fn test_render_with_sound_library_should_match_cues() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let sounds = temp_dir.path().join("sounds");
    std::fs::create_dir(&sounds)?;
    write_wav(sounds.join("foghorn.wav"), &AudioBuffer::from_samples(8_000, 1, vec![0.2; 4_000]), 16)?;
    let script = common::create_test_file(temp_dir.path(), "lighthouse.json", SCRIPT)?;
    let audio = temp_dir.path().join("out").with_extension("wav");
    let targets = RenderTargets::for_script(&script, Some(audio.clone()), None);

    let controller = Controller::with_config(common::test_config())?.with_sounds(sounds);
    let output = controller.run(&script, &targets).await?;

    assert!(audio.exists());
    assert!(!output.report.warnings.iter().any(|w| w.to_string().contains("'foghorn'")));
    Ok(())
}

#[test]
fn test_missing_script_should_fail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let script = temp_dir.path().join("missing.json");
    let targets = RenderTargets::for_script(&script, None, None);
    let controller = Controller::with_config(common::test_config())?;

    let result = tokio_test::block_on(async { controller.run(&script, &targets).await });
    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("does not exist"), "{}", message);
    Ok(())
}

#[tokio::test]
async fn test_missing_sound_directory_should_fail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let script = common::create_test_file(temp_dir.path(), "play.json", SCRIPT)?;
    let targets = RenderTargets::for_script(&script, None, None);
    let controller = Controller::with_config(common::test_config())?.with_sounds(temp_dir.path().join("nope"));
    assert!(controller.run(&script, &targets).await.is_err());
    Ok(())
}

#[test]
fn test_invalid_config_should_be_rejected_by_controller() {
    let mut config = common::test_config();
    config.output.bit_depth = 12;
    assert!(Controller::with_config(config).is_err());
}
