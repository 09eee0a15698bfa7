/*!
 * Rendering and mastering over hand-built sessions and full runs
 */

use dramamix::app_config::{Config, CrossfadeCurve};
use dramamix::audio::{db_to_linear, linear_to_db, AudioBuffer};
use dramamix::effects::EffectCatalog;
use dramamix::production::renderer::{process_tracks, CEILING_TOLERANCE};
use dramamix::production::{render, AudioElement, CrossfadeWindow, ElementClass, Session, TrackKind};
use dramamix::providers::mock::{MockSoundManager, MockVoiceGenerator};
use dramamix::script::{CueMode, Scene, ScriptEvent};

use crate::common::{self, TEST_SAMPLE_RATE};

fn session_with(config: &Config) -> Session {
    Session::new(config, &EffectCatalog::builtin()).unwrap()
}

fn tone(secs: f64, amplitude: f32, channels: u16) -> AudioBuffer {
    let frames = (secs * TEST_SAMPLE_RATE as f64) as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let value = amplitude * (i as f32 * 2.0 * std::f32::consts::PI * 330.0 / TEST_SAMPLE_RATE as f32).sin();
        samples.extend(std::iter::repeat_n(value, channels as usize));
    }
    AudioBuffer::from_samples(TEST_SAMPLE_RATE, channels, samples)
}

fn constant(secs: f64, value: f32) -> AudioBuffer {
    let frames = (secs * TEST_SAMPLE_RATE as f64) as usize;
    AudioBuffer::from_samples(TEST_SAMPLE_RATE, 1, vec![value; frames])
}

#[test]
fn test_peak_should_stay_under_ceiling_for_any_base_gain_in_bounds() {
    let mut config = common::test_config();
    config.output.channels = 2;
    let (min, max) = (config.mastering.min_base_gain_db, config.mastering.max_base_gain_db);

    for gain in [min, -6.0, 0.0, 6.0, max] {
        config.tracks.dialogue.base_gain_db = gain;
        config.tracks.sfx.base_gain_db = gain;
        let mut session = session_with(&config);
        session
            .place(
                TrackKind::Dialogue,
                AudioElement::new(tone(1.0, 1.0, 2), 0.0, TrackKind::Dialogue, ElementClass::Vocal),
            )
            .unwrap();
        session
            .place(
                TrackKind::Sfx,
                AudioElement::new(tone(0.5, 1.0, 2), 0.25, TrackKind::Sfx, ElementClass::Cue),
            )
            .unwrap();

        let mix = render(&session).unwrap();
        let ceiling = db_to_linear(config.mastering.ceiling_db) as f32;
        assert!(mix.peak() <= ceiling + CEILING_TOLERANCE, "gain {} peak {}", gain, mix.peak());
        assert_eq!(mix.channels(), 2);
        assert!(mix.is_finite());
    }
}

#[test]
fn test_base_gain_beyond_bounds_should_be_clamped() {
    let mut loud = common::test_config();
    loud.tracks.sfx.base_gain_db = 40.0;
    let mut capped = common::test_config();
    capped.tracks.sfx.base_gain_db = capped.mastering.max_base_gain_db;

    let buses = |config: &Config| {
        let mut session = session_with(config);
        session
            .place(
                TrackKind::Sfx,
                AudioElement::new(tone(0.5, 0.01, 1), 0.0, TrackKind::Sfx, ElementClass::Cue),
            )
            .unwrap();
        process_tracks(&session).unwrap()
    };
    assert_eq!(buses(&loud), buses(&capped));
}

#[test]
fn test_quiet_mix_should_be_normalized_to_target_loudness() {
    let config = common::test_config();
    let mut session = session_with(&config);
    session
        .place(
            TrackKind::Sfx,
            AudioElement::new(tone(1.0, 0.01, 1), 0.0, TrackKind::Sfx, ElementClass::Cue),
        )
        .unwrap();

    let mix = render(&session).unwrap();
    assert!((linear_to_db(mix.rms()) - config.mastering.target_loudness_db).abs() < 0.1);
}

#[test]
fn test_crossfade_should_fade_outgoing_bed_out_and_incoming_bed_in() {
    let mut config = common::test_config();
    config.tracks.ambient.equalize = false;
    config.tracks.ambient.compress = false;
    config.tracks.music.equalize = false;
    config.tracks.music.compress = false;
    let mut session = session_with(&config);

    let mut outgoing = AudioElement::new(constant(4.0, 0.5), 0.0, TrackKind::Ambient, ElementClass::Bed);
    outgoing.scene_index = 0;
    let mut incoming = AudioElement::new(constant(4.0, 0.5), 2.0, TrackKind::Music, ElementClass::Bed);
    incoming.scene_index = 1;
    session.place(TrackKind::Ambient, outgoing).unwrap();
    session.place(TrackKind::Music, incoming).unwrap();
    session.add_crossfade(CrossfadeWindow {
        start: 2.0,
        duration: 2.0,
        from_scene: 0,
        curve: CrossfadeCurve::Linear,
    });

    let buses = process_tracks(&session).unwrap();
    let sample_at = |kind: TrackKind, secs: f64| {
        let bus = buses.iter().find(|b| b.kind == kind).unwrap();
        bus.audio.samples()[(secs * TEST_SAMPLE_RATE as f64) as usize] as f64
    };

    let ambient_ratio = sample_at(TrackKind::Ambient, 3.0) / sample_at(TrackKind::Ambient, 1.0);
    let music_ratio = sample_at(TrackKind::Music, 3.0) / sample_at(TrackKind::Music, 5.0);
    assert!((ambient_ratio - 0.5).abs() < 1e-3, "outgoing ratio {}", ambient_ratio);
    assert!((music_ratio - 0.5).abs() < 1e-3, "incoming ratio {}", music_ratio);
}

#[tokio::test]
async fn test_rendering_a_finished_session_again_should_match_run_output() {
    let scene = Scene::new("s1")
        .with_event(ScriptEvent::music_cue("strings"))
        .with_event(ScriptEvent::dialogue("alice", "Once more."))
        .with_event(ScriptEvent::sound_cue("glass breaks", CueMode::Concurrent))
        .with_event(ScriptEvent::narration("And again."));
    let mut run = common::run_with(
        common::test_config(),
        MockVoiceGenerator::fixed(1.0),
        MockSoundManager::working(),
    );
    let output = run.run(&common::production(vec![scene])).await.unwrap();

    let session = run.session().unwrap();
    assert_eq!(render(session).unwrap(), output.audio);
    assert_eq!(render(session).unwrap(), render(session).unwrap());
}
