/*!
 * Partial failure, timeouts, cancellation and structural errors
 */

use std::collections::BTreeMap;

use dramamix::errors::{ProductionError, StructureError};
use dramamix::production::{FailureReason, RunState, RunWarning, TrackKind};
use dramamix::providers::mock::{MockSoundManager, MockVoiceGenerator};
use dramamix::script::{CueMode, PresetEffect, Scene, ScriptEvent};

use crate::common;

fn three_lines(id: &str) -> Scene {
    Scene::new(id)
        .with_event(ScriptEvent::dialogue("alice", "First."))
        .with_event(ScriptEvent::dialogue("bob", "Second."))
        .with_event(ScriptEvent::dialogue("alice", "Third."))
}

#[tokio::test]
async fn test_failed_line_should_become_silence_and_run_should_finalize() {
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::intermittent(2),
        MockSoundManager::working(),
    );
    let output = run.run(&common::production(vec![three_lines("s1")])).await.unwrap();

    assert_eq!(run.state(), RunState::Finalized);
    assert_eq!(output.report.silenced().count(), 1);
    assert_eq!(run.session().unwrap().track(TrackKind::Dialogue).len(), 3);
    assert!(output.audio.is_finite());
}

#[tokio::test]
async fn test_every_line_failing_should_still_produce_timed_silence() {
    let mut config = common::tight_config();
    config.timing.placeholder_secs = 0.5;
    let mut run = common::run_with(config, MockVoiceGenerator::failing(), MockSoundManager::working());
    let output = run.run(&common::production(vec![three_lines("s1")])).await.unwrap();

    assert_eq!(output.report.silenced().count(), 3);
    assert!(common::approx_eq(output.report.total_duration, 1.5));
    assert_eq!(output.audio.peak(), 0.0);
}

#[tokio::test]
async fn test_slow_generator_should_time_out_into_silence() {
    let mut config = common::test_config();
    config.synthesis.timeout_secs = 1;
    let mut run = common::run_with(config, MockVoiceGenerator::slow(1_500), MockSoundManager::working());
    let scene = Scene::new("s1")
        .with_event(ScriptEvent::dialogue("alice", "Hello?"))
        .with_event(ScriptEvent::sound_cue("clock ticks", CueMode::Inline));
    let output = run.run(&common::production(vec![scene])).await.unwrap();

    let reasons: Vec<&str> = output
        .report
        .silenced()
        .map(|w| match w {
            RunWarning::LineReplacedWithSilence { reason, .. } => reason.as_str(),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(reasons, vec!["Request timed out after 1s"]);
    assert_eq!(run.state(), RunState::Finalized);
}

#[tokio::test]
async fn test_cancel_between_scenes_should_keep_built_scenes() {
    let run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
    );
    let handle = run.cancel_handle();
    let mut run = run.with_progress(move |done, _, _| {
        if done == 1 {
            handle.cancel();
        }
    });

    let production = common::production(vec![three_lines("s1"), three_lines("s2"), three_lines("s3")]);
    let err = run.run(&production).await.unwrap_err();

    assert!(matches!(err, ProductionError::Cancelled { completed_scenes: 1 }));
    assert_eq!(run.state(), RunState::Failed(FailureReason::Cancelled));
    assert_eq!(run.session().unwrap().element_count(), 3);
}

#[tokio::test]
async fn test_unknown_region_effect_should_fail_with_position() {
    let scene = Scene::new("odd")
        .with_event(ScriptEvent::dialogue("alice", "Fine."))
        .with_event(ScriptEvent::region_start("underwater"))
        .with_event(ScriptEvent::dialogue("bob", "Blub."))
        .with_event(ScriptEvent::region_end("underwater"));
    let voice = MockVoiceGenerator::fixed(1.0);
    let mut run = common::run_with(common::test_config(), voice.clone(), MockSoundManager::working());

    let err = run.run(&common::production(vec![three_lines("ok"), scene])).await.unwrap_err();
    match err {
        ProductionError::Structure { scene, event, source } => {
            assert_eq!(scene, "odd");
            assert_eq!(event, Some(1));
            assert!(matches!(source, StructureError::UnknownEffect { ref name } if name == "underwater"));
        }
        other => panic!("expected structure error, got {:?}", other),
    }
    // Validation covers every scene before the first request
    assert_eq!(voice.calls(), 0);
    assert_eq!(run.state(), RunState::Failed(FailureReason::Structure));
}

#[tokio::test]
async fn test_unmatched_region_end_should_fail() {
    let scene = Scene::new("s1")
        .with_event(ScriptEvent::dialogue("alice", "Hi."))
        .with_event(ScriptEvent::region_end("flashback"));
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
    );
    let err = run.run(&common::production(vec![scene])).await.unwrap_err();
    assert!(matches!(
        err,
        ProductionError::Structure {
            event: Some(1),
            source: StructureError::UnmatchedRegionEnd { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_procedural_sound_should_be_reported_as_fallback() {
    let scene = Scene::new("woods")
        .with_event(ScriptEvent::sound_cue("owl hoots", CueMode::Inline))
        .with_event(ScriptEvent::dialogue("alice", "What was that?"));
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working().as_procedural(),
    );
    let output = run.run(&common::production(vec![scene])).await.unwrap();

    assert_eq!(
        output.report.warnings,
        vec![RunWarning::FallbackSound {
            scene: "woods".to_string(),
            event: 0,
            description: "owl hoots".to_string(),
            best_score: 0.0,
        }]
    );
    assert_eq!(run.state(), RunState::Finalized);
}

#[tokio::test]
async fn test_authored_preset_out_of_range_should_clamp_and_warn() {
    let mut production = common::production(vec![Scene::new("s1")
        .with_event(ScriptEvent::dialogue("alice", "Loud!").with_effect("megaphone"))]);
    production.effects.insert(
        "megaphone".to_string(),
        vec![PresetEffect {
            effect: "distortion".to_string(),
            params: BTreeMap::from([("amount".to_string(), 5.0)]),
        }],
    );
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
    );
    let output = run.run(&production).await.unwrap();

    assert!(matches!(
        &output.report.warnings[0],
        RunWarning::ParameterClamped { preset, requested, applied, .. }
            if preset == "megaphone" && *requested == 5.0 && *applied == 0.99
    ));
}

#[tokio::test]
async fn test_invalid_authored_preset_should_fail_as_catalog_error() {
    let mut production = common::production(vec![three_lines("s1")]);
    production.effects.insert(
        "broken".to_string(),
        vec![PresetEffect {
            effect: "reverb".to_string(),
            params: BTreeMap::from([("size".to_string(), 0.5)]),
        }],
    );
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
    );
    let err = run.run(&production).await.unwrap_err();
    assert!(matches!(err, ProductionError::Catalog(StructureError::UnknownParameter { .. })));
    assert_eq!(run.state(), RunState::Failed(FailureReason::Structure));
}

#[tokio::test]
async fn test_unknown_track_effect_should_fail_as_catalog_error() {
    let mut config = common::test_config();
    config.tracks.dialogue.effects = vec!["nonexistent".to_string()];
    let mut run = common::run_with(config, MockVoiceGenerator::fixed(1.0), MockSoundManager::working());
    let err = run.run(&common::production(vec![three_lines("s1")])).await.unwrap_err();
    assert!(matches!(err, ProductionError::Catalog(StructureError::UnknownEffect { .. })));
}

#[tokio::test]
async fn test_empty_production_should_fail_to_render() {
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
    );
    let err = run.run(&common::production(vec![Scene::new("empty")])).await.unwrap_err();
    assert!(matches!(err, ProductionError::Render(_)));
    assert_eq!(run.state(), RunState::Failed(FailureReason::Render));
}
