/*!
 * Renderer and mastering chain.
 *
 * Rendering is a single pass over a fully placed session, in a fixed order:
 *
 * 1. each track is drawn onto its own bus (element gains, fades, crossfades)
 *    and gets its equalizer, compressor and track effect chain
 * 2. side-chained tracks are ducked under the key tracks' energy
 * 3. each track's base gain is applied
 * 4. the buses are summed
 * 5. master compression, limiting, then loudness normalization
 *
 * No external calls are made; the same session always renders to the same
 * samples.
 */

use log::{debug, info};

use super::session::{AudioElement, CrossfadeWindow, ElementClass, Session, Track, TrackKind};
use crate::audio::buffer::{db_to_linear, linear_to_db, secs_to_frames, AudioBuffer};
use crate::effects::dynamics::{rms_envelope, Compressor, GainSmoother, Limiter, RMS_WINDOW_SECS};
use crate::effects::processor::{apply_chain, equalize};
use crate::errors::RenderError;

/// Allowed overshoot of the ceiling, absorbing float rounding
pub const CEILING_TOLERANCE: f32 = 1e-6;

/// One processed track, ready for summation
#[derive(Debug, Clone, PartialEq)]
pub struct TrackBus {
    pub kind: TrackKind,
    pub audio: AudioBuffer,
}

/// Render a session to its final master buffer
pub fn render(session: &Session) -> Result<AudioBuffer, RenderError> {
    let buses = process_tracks(session)?;
    master(session, buses)
}

/// Steps 1 to 3: per-track processing, ducking and base gains
pub fn process_tracks(session: &Session) -> Result<Vec<TrackBus>, RenderError> {
    if session.is_empty() {
        return Err(RenderError::EmptySession);
    }

    let frames = secs_to_frames(session.total_duration(), session.sample_rate());
    let mut buses: Vec<TrackBus> = session
        .tracks()
        .map(|track| TrackBus {
            kind: track.kind,
            audio: process_track(session, track, frames),
        })
        .collect();

    duck(session, &mut buses);

    let mastering = &session.mastering;
    for bus in &mut buses {
        let base = session
            .track(bus.kind)
            .base_gain_db
            .clamp(mastering.min_base_gain_db, mastering.max_base_gain_db);
        bus.audio.apply_gain(db_to_linear(base) as f32);
    }
    Ok(buses)
}

/// Steps 4 and 5: summation and the master chain
pub fn master(session: &Session, buses: Vec<TrackBus>) -> Result<AudioBuffer, RenderError> {
    let sample_rate = session.sample_rate();
    let channels = session.channels();
    let mastering = &session.mastering;

    let mut mix = AudioBuffer::with_frames(sample_rate, channels, 0);
    for bus in &buses {
        mix.mix_at(&bus.audio, 0, 1.0);
    }
    if mix.is_empty() {
        return Err(RenderError::EmptySession);
    }
    if !mix.is_finite() {
        return Err(RenderError::NonFinite);
    }

    Compressor::new(
        mastering.compressor_threshold_db,
        mastering.compressor_ratio,
        mastering.compressor_attack_secs,
        mastering.compressor_release_secs,
    )
    .process(&mut mix);

    let ceiling = db_to_linear(mastering.ceiling_db);
    Limiter::new(ceiling, mastering.limiter_release_secs).process(&mut mix);

    normalize(&mut mix, mastering.target_loudness_db, ceiling);

    if !mix.is_finite() {
        return Err(RenderError::NonFinite);
    }
    let peak = mix.peak();
    let ceiling = ceiling as f32;
    if peak > ceiling + CEILING_TOLERANCE {
        return Err(RenderError::Clipping { peak, ceiling });
    }

    info!(
        "Rendered {:.2}s, peak {:.2} dBFS, loudness {:.2} dBFS",
        mix.duration_secs(),
        linear_to_db(peak as f64),
        linear_to_db(mix.rms())
    );
    Ok(mix)
}

/// Gain toward the RMS target, never pushing the peak past the ceiling
fn normalize(mix: &mut AudioBuffer, target_db: f64, ceiling: f64) {
    let rms = mix.rms();
    let peak = mix.peak() as f64;
    if rms <= 0.0 || peak <= 0.0 {
        return;
    }
    let gain = (db_to_linear(target_db) / rms).min(ceiling / peak);
    debug!("Normalization gain {:.2} dB", linear_to_db(gain));
    mix.apply_gain(gain as f32);
}

fn process_track(session: &Session, track: &Track, frames: usize) -> AudioBuffer {
    let mut bus = AudioBuffer::with_frames(session.sample_rate(), session.channels(), frames);
    for element in track.elements() {
        let audio = element_audio(session, element);
        let offset = secs_to_frames(element.start, session.sample_rate());
        bus.mix_at(&audio, offset, db_to_linear(element.gain_db) as f32);
    }

    if track.equalize {
        bus = equalize(&bus, track.eq.low_db, track.eq.mid_db, track.eq.high_db);
    }
    if track.compress {
        let c = track.compressor;
        Compressor::new(c.threshold_db, c.ratio, c.attack_secs, c.release_secs).process(&mut bus);
    }
    if !track.chain.is_empty() {
        bus = apply_chain(&bus, &track.chain);
    }
    bus
}

/// An element's buffer in output format, with declick fades and, for beds,
/// any crossfade windows it spans
fn element_audio(session: &Session, element: &AudioElement) -> AudioBuffer {
    let sample_rate = session.sample_rate();
    let mut audio = element.buffer.conformed(sample_rate, session.channels());
    audio.fit_to_duration(element.duration);
    audio.apply_fades(
        secs_to_frames(element.fade_in, sample_rate),
        secs_to_frames(element.fade_out, sample_rate),
    );

    if element.class == ElementClass::Bed {
        for window in session.crossfades() {
            apply_crossfade(&mut audio, element, window);
        }
    }
    audio
}

fn apply_crossfade(audio: &mut AudioBuffer, element: &AudioElement, window: &CrossfadeWindow) {
    let outgoing = element.scene_index == window.from_scene;
    let incoming = element.scene_index == window.from_scene + 1;
    if !(outgoing || incoming) || element.end() <= window.start || element.start >= window.end() {
        return;
    }
    if window.duration <= 0.0 {
        return;
    }

    let sample_rate = audio.sample_rate() as f64;
    let channels = audio.channels() as usize;
    for (i, frame) in audio.samples_mut().chunks_exact_mut(channels).enumerate() {
        let t = element.start + i as f64 / sample_rate;
        let x = (t - window.start) / window.duration;
        let (fade_out, fade_in) = window.curve.gains(x);
        let gain = (if outgoing { fade_out } else { fade_in }) as f32;
        for sample in frame {
            *sample *= gain;
        }
    }
}

/// Reduce side-chained tracks while the key tracks carry energy
fn duck(session: &Session, buses: &mut [TrackBus]) {
    let ducking = &session.ducking;
    let ducked: Vec<TrackKind> = session
        .tracks()
        .filter(|t| t.side_chain && !ducking.key_tracks.contains(&t.kind))
        .map(|t| t.kind)
        .collect();
    if ducked.is_empty() {
        return;
    }

    let mut key = AudioBuffer::with_frames(session.sample_rate(), session.channels(), 0);
    for bus in buses.iter().filter(|b| ducking.key_tracks.contains(&b.kind)) {
        key.mix_at(&bus.audio, 0, 1.0);
    }
    let envelope = rms_envelope(&key, RMS_WINDOW_SECS);
    let reduced = db_to_linear(ducking.duck_db);

    for bus in buses.iter_mut().filter(|b| ducked.contains(&b.kind)) {
        let channels = bus.audio.channels() as usize;
        let mut smoother = GainSmoother::new(ducking.attack_secs, ducking.release_secs, session.sample_rate());
        let mut ducked_frames = 0usize;
        for (i, frame) in bus.audio.samples_mut().chunks_exact_mut(channels).enumerate() {
            let level = envelope.get(i).copied().unwrap_or(0.0);
            let target = if linear_to_db(level) > ducking.threshold_db {
                ducked_frames += 1;
                reduced
            } else {
                1.0
            };
            let gain = smoother.next(target) as f32;
            for sample in frame {
                *sample *= gain;
            }
        }
        debug!("Track '{}' ducked over {} frame(s)", bus.kind, ducked_frames);
    }
}
