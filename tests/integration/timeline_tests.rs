/*!
 * Timeline layout scenarios run end to end over mock generators
 */

use dramamix::errors::{ProductionError, StructureError};
use dramamix::production::{AudioElement, ProductionOutput, ProductionRun, RunState, RunWarning, TrackKind};
use dramamix::providers::mock::{MockSoundManager, MockVoiceGenerator};
use dramamix::script::{BedKind, Character, CueMode, Scene, ScriptEvent};
use dramamix::Config;

use crate::common::{self, approx_eq};

async fn run_scenes(
    config: Config,
    voice: MockVoiceGenerator,
    sounds: MockSoundManager,
    scenes: Vec<Scene>,
) -> (ProductionRun, ProductionOutput) {
    let mut run = common::run_with(config, voice, sounds);
    let output = run.run(&common::production(scenes)).await.unwrap();
    (run, output)
}

fn on_track(run: &ProductionRun, kind: TrackKind) -> Vec<AudioElement> {
    run.session().unwrap().track(kind).elements().cloned().collect()
}

#[tokio::test]
async fn test_inline_cue_then_narration_should_play_back_to_back() {
    let scene = Scene::new("opening")
        .with_event(ScriptEvent::sound_cue("door creaks open", CueMode::Inline).with_duration(1.0))
        .with_event(ScriptEvent::narration("The room was dark."));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(2.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    let sfx = on_track(&run, TrackKind::Sfx);
    let narration = on_track(&run, TrackKind::Narrator);
    assert_eq!(sfx.len(), 1);
    assert_eq!(narration.len(), 1);
    assert_eq!(sfx[0].start, 0.0);
    assert!(approx_eq(sfx[0].duration, 1.0));
    assert!(approx_eq(narration[0].start, 1.0));
    assert!(approx_eq(narration[0].duration, 2.0));
    assert!(approx_eq(run.session().unwrap().total_duration(), 3.0));
    assert!(approx_eq(output.report.scenes[0].duration, 3.0));
    assert!(approx_eq(output.audio.duration_secs(), 3.0));
}

#[tokio::test]
async fn test_region_chain_should_stack_outer_to_inner_with_local_tag_last() {
    let scene = Scene::new("memory")
        .with_event(ScriptEvent::region_start("flashback"))
        .with_event(ScriptEvent::dialogue("alice", "It was summer.").with_effect("whisper"))
        .with_event(ScriptEvent::dialogue("bob", "I remember."))
        .with_event(ScriptEvent::region_end("flashback"))
        .with_event(ScriptEvent::dialogue("alice", "Back to now."));
    let (run, _) = run_scenes(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    let lines = on_track(&run, TrackKind::Dialogue);
    let chains: Vec<Vec<&str>> = lines.iter().map(|e| e.chain.tags()).collect();
    assert_eq!(
        chains,
        vec![vec!["flashback", "whisper"], vec!["flashback"], Vec::<&str>::new()]
    );
    assert_eq!(lines[0].event_index, Some(1));
}

#[tokio::test]
async fn test_unclosed_region_should_fail_before_any_request() {
    let scene = Scene::new("dream")
        .with_event(ScriptEvent::region_start("flashback"))
        .with_event(ScriptEvent::dialogue("alice", "Where am I?"));
    let voice = MockVoiceGenerator::fixed(1.0);
    let mut run = common::run_with(common::test_config(), voice.clone(), MockSoundManager::working());

    let err = run.run(&common::production(vec![scene])).await.unwrap_err();
    match err {
        ProductionError::Structure { scene, event, source } => {
            assert_eq!(scene, "dream");
            assert_eq!(event, None);
            assert_eq!(
                source,
                StructureError::UnclosedRegion {
                    scene: "dream".to_string(),
                    tag: "flashback".to_string()
                }
            );
        }
        other => panic!("expected structure error, got {:?}", other),
    }
    assert_eq!(voice.calls(), 0);
    assert!(matches!(run.state(), RunState::Failed(_)));
}

#[tokio::test]
async fn test_same_cue_in_different_regions_should_not_share_cache_entry() {
    let first = Scene::new("s1")
        .with_event(ScriptEvent::sound_cue("door slam", CueMode::Inline).with_duration(0.5))
        .with_event(ScriptEvent::region_start("flashback"))
        .with_event(ScriptEvent::sound_cue("door slam", CueMode::Inline).with_duration(0.5))
        .with_event(ScriptEvent::region_end("flashback"));
    let second = Scene::new("s2").with_event(ScriptEvent::sound_cue("door slam", CueMode::Inline).with_duration(0.5));
    let sounds = MockSoundManager::working();
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        sounds.clone(),
        vec![first, second],
    )
    .await;

    // Two distinct keys; the third cue repeats the first and is served from the cache
    assert_eq!(sounds.calls(), 2);
    assert!(output.report.cache_hits >= 1);

    let cues = on_track(&run, TrackKind::Sfx);
    assert_eq!(cues.len(), 3);
    assert_ne!(cues[0].buffer, cues[1].buffer);
    assert_eq!(cues[0].buffer, cues[2].buffer);
    assert_eq!(cues[1].chain.tags(), vec!["flashback"]);
}

#[tokio::test]
async fn test_concurrent_cue_should_not_move_cursor() {
    let scene = Scene::new("storm")
        .with_event(ScriptEvent::dialogue("alice", "Listen."))
        .with_event(ScriptEvent::sound_cue("thunder", CueMode::Concurrent).with_duration(5.0))
        .with_event(ScriptEvent::dialogue("bob", "I hear it."));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    let cue = &on_track(&run, TrackKind::Sfx)[0];
    let lines = on_track(&run, TrackKind::Dialogue);
    assert!(approx_eq(cue.start, 1.0));
    assert!(cue.concurrent);
    assert!(approx_eq(lines[1].start, 1.0));
    // Scene time is driven by the lines; the tail of the cue rings past it
    assert!(approx_eq(output.report.scenes[0].duration, 2.0));
    assert!(approx_eq(run.session().unwrap().total_duration(), 6.0));
}

#[tokio::test]
async fn test_line_simultaneous_with_concurrent_cue_should_start_with_the_cue() {
    let scene = Scene::new("s")
        .with_event(ScriptEvent::dialogue("alice", "One"))
        .with_event(ScriptEvent::sound_cue("crash", CueMode::Concurrent))
        .with_event(ScriptEvent::dialogue("bob", "Two").simultaneous());
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    assert_eq!(run.state(), RunState::Finalized);
    let cue = &on_track(&run, TrackKind::Sfx)[0];
    let lines = on_track(&run, TrackKind::Dialogue);
    assert!(approx_eq(cue.start, 1.0));
    assert!(approx_eq(lines[0].start, 0.0));
    assert!(approx_eq(lines[1].start, 1.0));

    // Sound goes in before the voice sharing its start
    let order: Vec<TrackKind> = run
        .session()
        .unwrap()
        .elements()
        .into_iter()
        .map(|(_, e)| e.track)
        .collect();
    assert_eq!(order, vec![TrackKind::Dialogue, TrackKind::Sfx, TrackKind::Dialogue]);
    assert!(approx_eq(output.report.scenes[0].duration, 2.0));
}

#[tokio::test]
async fn test_scene_duration_should_sum_lines_and_pauses() {
    let mut config = common::tight_config();
    config.timing.inter_line_pause_secs = 0.25;
    let scene = |id: &str| {
        Scene::new(id)
            .with_event(ScriptEvent::dialogue("alice", "One."))
            .with_event(ScriptEvent::dialogue("bob", "Two."))
            .with_event(ScriptEvent::narration("Three."))
    };
    let (run, output) = run_scenes(
        config,
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene("a"), scene("b")],
    )
    .await;

    let scenes = &output.report.scenes;
    assert!(approx_eq(scenes[0].duration, 3.75));
    assert!(approx_eq(scenes[1].start, 3.75 + 1.5));
    assert_eq!(scenes[1].elements, 3);

    let lines = on_track(&run, TrackKind::Dialogue);
    assert!(approx_eq(lines[1].start, 1.25));
    assert!(approx_eq(lines[2].start, 5.25));
}

#[tokio::test]
async fn test_pause_overrides_should_prefer_character_then_scene_then_mood() {
    let mut config = common::tight_config();
    config.timing.inter_line_pause_secs = 0.3;
    config.timing.mood_pauses.insert("tense".to_string(), 0.1);

    let moody = Scene {
        mood: Some("tense".to_string()),
        ..Scene::new("moody")
    }
    .with_event(ScriptEvent::dialogue("alice", "Quick."))
    .with_event(ScriptEvent::dialogue("alice", "Quicker."));
    let paced = Scene {
        mood: Some("tense".to_string()),
        pause_secs: Some(0.6),
        ..Scene::new("paced")
    }
    .with_event(ScriptEvent::dialogue("alice", "Slow."))
    .with_event(ScriptEvent::dialogue("alice", "Slower."));

    let mut production = common::production(vec![moody, paced]);
    production.characters.push(Character {
        pause_secs: Some(0.9),
        ..Character::new("carol", &["old"])
    });
    production.scenes.push(
        Scene::new("drawl")
            .with_event(ScriptEvent::dialogue("carol", "Well."))
            .with_event(ScriptEvent::dialogue("alice", "Yes?")),
    );

    let mut run = common::run_with(config, MockVoiceGenerator::fixed(1.0), MockSoundManager::working());
    let output = run.run(&production).await.unwrap();
    let scenes = &output.report.scenes;
    assert!(approx_eq(scenes[0].duration, 2.2));
    assert!(approx_eq(scenes[1].duration, 3.2));
    assert!(approx_eq(scenes[2].duration, 1.0 + 0.9 + 1.0 + 0.3));
}

#[tokio::test]
async fn test_start_offset_should_replace_pause() {
    let scene = Scene::new("s1")
        .with_event(ScriptEvent::narration("Later that night."))
        .with_event(ScriptEvent::dialogue("alice", "Hello?").with_offset(0.5))
        .with_event(ScriptEvent::narration("She waited.").with_offset(-0.5));
    let (run, _) = run_scenes(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    let lines = on_track(&run, TrackKind::Dialogue);
    let narration = on_track(&run, TrackKind::Narrator);
    assert!(approx_eq(lines[0].start, 1.5));
    // Negative offsets overlap the previous event, here on another track
    assert!(approx_eq(narration[1].start, 2.0));
}

#[tokio::test]
async fn test_offset_before_scene_start_should_clamp_to_zero() {
    let scene = Scene::new("s1").with_event(ScriptEvent::narration("Already speaking.").with_offset(-2.0));
    let (run, _) = run_scenes(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;
    assert_eq!(on_track(&run, TrackKind::Narrator)[0].start, 0.0);
}

#[tokio::test]
async fn test_bed_should_end_at_explicit_duration_or_stop_marker() {
    let scene = Scene::new("street")
        .with_event(ScriptEvent::ambient_bed("traffic").with_duration(0.5))
        .with_event(ScriptEvent::music_cue("low strings"))
        .with_event(ScriptEvent::dialogue("alice", "Hurry."))
        .with_event(ScriptEvent::bed_stop(Some(BedKind::Music)))
        .with_event(ScriptEvent::dialogue("bob", "Coming."));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    let ambient = on_track(&run, TrackKind::Ambient);
    let music = on_track(&run, TrackKind::Music);
    assert!(approx_eq(ambient[0].duration, 0.5));
    assert!(approx_eq(music[0].duration, 1.0));
    assert!(!output.report.has_warnings());
}

#[tokio::test]
async fn test_explicit_bed_duration_should_outlast_spoken_content() {
    let scene = Scene::new("theme")
        .with_event(ScriptEvent::music_cue("theme").with_duration(4.0))
        .with_event(ScriptEvent::dialogue("alice", "Welcome."));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    let music = on_track(&run, TrackKind::Music);
    assert_eq!(music.len(), 1);
    assert!(approx_eq(music[0].duration, 4.0));
    assert!(approx_eq(output.report.scenes[0].duration, 1.0));
    assert!(approx_eq(output.audio.duration_secs(), 4.0));
    assert!(!output.report.has_warnings());
}

#[tokio::test]
async fn test_scene_of_only_a_timed_bed_should_render() {
    let scene = Scene::new("interlude").with_event(ScriptEvent::ambient_bed("wind").with_duration(3.0));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    assert_eq!(run.state(), RunState::Finalized);
    let ambient = on_track(&run, TrackKind::Ambient);
    assert!(approx_eq(ambient[0].duration, 3.0));
    assert!(approx_eq(output.audio.duration_secs(), 3.0));
    assert!(output.report.warnings.is_empty());
}

#[tokio::test]
async fn test_bed_stopped_immediately_should_warn_and_be_skipped() {
    let scene = Scene::new("hall")
        .with_event(ScriptEvent::ambient_bed("echoing hall"))
        .with_event(ScriptEvent::bed_stop(None))
        .with_event(ScriptEvent::dialogue("alice", "Hello?"));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;

    assert!(run.session().unwrap().track(TrackKind::Ambient).is_empty());
    assert_eq!(
        output.report.warnings,
        vec![RunWarning::EmptyBed {
            scene: "hall".to_string(),
            event: 0
        }]
    );
}

#[tokio::test]
async fn test_transition_should_record_crossfade_and_extend_outgoing_bed() {
    let first = Scene::new("s1")
        .with_event(ScriptEvent::ambient_bed("rain"))
        .with_event(ScriptEvent::dialogue("alice", "Goodbye."))
        .with_event(ScriptEvent::transition().with_duration(2.0));
    let second = Scene::new("s2")
        .with_event(ScriptEvent::ambient_bed("birdsong"))
        .with_event(ScriptEvent::dialogue("bob", "Morning."));
    let (run, output) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![first, second],
    )
    .await;

    let session = run.session().unwrap();
    let window = session.crossfades()[0];
    assert!(approx_eq(window.start, 2.5));
    assert!(approx_eq(window.duration, 2.0));
    assert_eq!(window.from_scene, 0);

    let beds = on_track(&run, TrackKind::Ambient);
    assert!(approx_eq(beds[0].start, 0.0));
    assert!(approx_eq(beds[0].duration, 4.5));
    assert!(approx_eq(beds[1].start, 2.5));
    assert!(approx_eq(beds[1].duration, 1.0));
    assert!(approx_eq(output.report.scenes[1].start, 2.5));
}

#[tokio::test]
async fn test_transition_in_final_scene_should_be_ignored() {
    let scene = Scene::new("end")
        .with_event(ScriptEvent::dialogue("alice", "The end."))
        .with_event(ScriptEvent::transition());
    let (run, _) = run_scenes(
        common::tight_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
        vec![scene],
    )
    .await;
    assert!(run.session().unwrap().crossfades().is_empty());
}
