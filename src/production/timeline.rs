/*!
 * Timeline builder.
 *
 * Turns the ordered events of each scene into placed audio elements with
 * absolute start times. Building happens in two passes:
 *
 * 1. `plan_scene` walks the events without touching any audio. It maintains
 *    the effect-region stack, resolves every effect chain and voice profile,
 *    and fails fast on malformed nesting, unknown effects or unknown speakers.
 * 2. `TimelineBuilder::build_scene` resolves the buffers concurrently, then
 *    walks the events again in document order with the scene cursor, lays out
 *    beds once the scene's end is known, and places everything in the session.
 */

use log::{debug, info, warn};
use std::collections::BTreeMap;

use super::report::{RunWarning, SceneSummary};
use super::resolver::{Request, Resolved, Resolver};
use super::session::{AudioElement, CrossfadeWindow, ElementClass, Session, TrackKind, OVERLAP_EPSILON};
use crate::app_config::TimingConfig;
use crate::audio::buffer::AudioBuffer;
use crate::effects::catalog::{EffectCatalog, EffectChain};
use crate::errors::{ProductionError, ResolutionError, StructureError};
use crate::providers::{SoundSource, VoiceGenerator, VoiceProfile};
use crate::script::{BedKind, CueMode, EventKind, Production, Scene, ScriptEvent};

/// Name of the character whose voice reads narration, when declared
pub const NARRATOR_ID: &str = "narrator";

/// An event with everything resolved that does not need audio
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEvent {
    /// Position of the event in its scene
    pub index: usize,
    /// The authored event
    pub event: ScriptEvent,
    /// Effect regions open at this event, outer to inner
    pub regions: Vec<String>,
    /// Region presets followed by the event's own tag
    pub chain: EffectChain,
    /// Voice for dialogue and narration
    pub profile: Option<VoiceProfile>,
    /// Speaker's own pause override
    pub pause_secs: Option<f64>,
    /// Speaker's own gain
    pub speaker_gain_db: f64,
}

impl PlannedEvent {
    fn bare(index: usize, event: &ScriptEvent, regions: &[String], chain: EffectChain) -> Self {
        Self {
            index,
            event: event.clone(),
            regions: regions.to_vec(),
            chain,
            profile: None,
            pause_secs: None,
            speaker_gain_db: 0.0,
        }
    }

    fn gain_db(&self) -> f64 {
        self.event.gain_db.unwrap_or(0.0) + self.speaker_gain_db
    }

    /// Request for a cursor-timed event; beds are requested once their span is known
    fn timed_request(&self) -> Option<Request> {
        match &self.event.kind {
            EventKind::Dialogue { emotion, .. } | EventKind::Narration { emotion, .. } => {
                Some(Request::Voice {
                    text: self.event.text.clone(),
                    profile: self.profile.clone()?,
                    emotion: emotion.clone(),
                    chain: self.chain.clone(),
                })
            }
            EventKind::SoundCue { category, .. } => Some(Request::Sound {
                description: self.event.text.clone(),
                category: category.clone(),
                target_secs: self.event.duration.filter(|d| *d > 0.0),
                chain: self.chain.clone(),
            }),
            _ => None,
        }
    }

    fn bed_request(&self, span: f64) -> Request {
        let category = match &self.event.kind {
            EventKind::AmbientBed { category } => category.clone(),
            _ => None,
        };
        Request::Sound {
            description: self.event.text.clone(),
            category,
            target_secs: Some(span),
            chain: self.chain.clone(),
        }
    }
}

/// A scene whose structure has been validated
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePlan {
    /// Position of the scene in the production
    pub index: usize,
    /// Scene identifier from the script
    pub id: String,
    /// Mood used to look up a pause override
    pub mood: Option<String>,
    /// Scene-wide pause override
    pub pause_secs: Option<f64>,
    /// Timed events, beds and stop markers in document order
    pub events: Vec<PlannedEvent>,
    /// Crossfade length requested by a transition marker
    pub transition: Option<f64>,
}

/// Validate one scene and resolve its chains and voice profiles
pub fn plan_scene(
    index: usize,
    scene: &Scene,
    production: &Production,
    catalog: &EffectCatalog,
    voice: &dyn VoiceGenerator,
    timing: &TimingConfig,
) -> Result<ScenePlan, ProductionError> {
    let fail = |event: Option<usize>, source: StructureError| ProductionError::structure(&scene.id, event, source);

    let mut stack: Vec<String> = Vec::new();
    let mut events = Vec::new();
    let mut transition = None;

    for (i, event) in scene.events.iter().enumerate() {
        match &event.kind {
            EventKind::EffectRegionStart { tag } => {
                catalog.preset(tag).map_err(|e| fail(Some(i), e))?;
                stack.push(tag.clone());
            }
            EventKind::EffectRegionEnd { tag } => match stack.last() {
                None => {
                    return Err(fail(
                        Some(i),
                        StructureError::UnmatchedRegionEnd {
                            scene: scene.id.clone(),
                            event: i,
                            tag: tag.clone(),
                        },
                    ));
                }
                Some(open) if open != tag => {
                    return Err(fail(
                        Some(i),
                        StructureError::MismatchedRegionEnd {
                            scene: scene.id.clone(),
                            event: i,
                            expected: open.clone(),
                            found: tag.clone(),
                        },
                    ));
                }
                Some(_) => {
                    stack.pop();
                }
            },
            EventKind::TransitionMarker => {
                let window = event
                    .duration
                    .filter(|d| *d > 0.0)
                    .unwrap_or(timing.default_crossfade_secs);
                transition = Some(window);
            }
            EventKind::BedStop { .. } => {
                events.push(PlannedEvent::bare(i, event, &stack, EffectChain::empty()));
            }
            EventKind::Dialogue { character, effect, .. } => {
                let unknown = || StructureError::UnknownSpeaker {
                    scene: scene.id.clone(),
                    event: i,
                    character: character.clone(),
                };
                let speaker = production
                    .character(character)
                    .ok_or_else(|| fail(Some(i), unknown()))?;
                let profile = voice.resolve_profile(speaker).map_err(|e| {
                    warn!("Voice profile for '{}' failed: {}", character, e);
                    fail(Some(i), unknown())
                })?;

                let chain = line_chain(catalog, &stack, effect.as_deref()).map_err(|e| fail(Some(i), e))?;
                let mut planned = PlannedEvent::bare(i, event, &stack, chain);
                planned.profile = Some(profile);
                planned.pause_secs = speaker.pause_secs;
                planned.speaker_gain_db = speaker.gain_db.unwrap_or(0.0);
                events.push(planned);
            }
            EventKind::Narration { effect, .. } => {
                let (profile, pause_secs, gain_db) = match production.character(NARRATOR_ID) {
                    Some(narrator) => (
                        voice.resolve_profile(narrator).unwrap_or_else(|e| {
                            warn!("Voice profile for '{}' failed, using a neutral voice: {}", NARRATOR_ID, e);
                            VoiceProfile::neutral(NARRATOR_ID)
                        }),
                        narrator.pause_secs,
                        narrator.gain_db.unwrap_or(0.0),
                    ),
                    None => (VoiceProfile::neutral(NARRATOR_ID), None, 0.0),
                };

                let chain = line_chain(catalog, &stack, effect.as_deref()).map_err(|e| fail(Some(i), e))?;
                let mut planned = PlannedEvent::bare(i, event, &stack, chain);
                planned.profile = Some(profile);
                planned.pause_secs = pause_secs;
                planned.speaker_gain_db = gain_db;
                events.push(planned);
            }
            EventKind::SoundCue { .. } | EventKind::AmbientBed { .. } | EventKind::MusicCue => {
                let chain = catalog.chain(&stack).map_err(|e| fail(Some(i), e))?;
                events.push(PlannedEvent::bare(i, event, &stack, chain));
            }
        }
    }

    if let Some(tag) = stack.last() {
        return Err(fail(
            None,
            StructureError::UnclosedRegion {
                scene: scene.id.clone(),
                tag: tag.clone(),
            },
        ));
    }

    Ok(ScenePlan {
        index,
        id: scene.id.clone(),
        mood: scene.mood.clone(),
        pause_secs: scene.pause_secs,
        events,
        transition,
    })
}

/// Region presets outer to inner, then the line-local tag
fn line_chain(catalog: &EffectCatalog, regions: &[String], local: Option<&str>) -> Result<EffectChain, StructureError> {
    let mut tags: Vec<&str> = regions.iter().map(String::as_str).collect();
    tags.extend(local);
    catalog.chain(&tags)
}

/// A bed waiting for the scene end to be known
#[derive(Debug)]
struct OpenBed<'a> {
    planned: &'a PlannedEvent,
    kind: BedKind,
    start: f64,
    stop_at: Option<f64>,
}

/// Sequential scene layout over a shared resolver
pub struct TimelineBuilder {
    timing: TimingConfig,
    resolver: Resolver,
    /// Global start of the next scene
    next_start: f64,
}

impl TimelineBuilder {
    pub fn new(timing: TimingConfig, resolver: Resolver) -> Self {
        Self {
            timing,
            resolver,
            next_start: 0.0,
        }
    }

    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    fn line_pause(&self, plan: &ScenePlan, planned: &PlannedEvent) -> f64 {
        planned
            .pause_secs
            .or(plan.pause_secs)
            .or_else(|| plan.mood.as_ref().and_then(|m| self.timing.mood_pauses.get(m).copied()))
            .unwrap_or(self.timing.inter_line_pause_secs)
    }

    fn fade_for(&self, duration: f64) -> f64 {
        self.timing.element_fade_secs.min(duration / 2.0).max(0.0)
    }

    /// Turn a resolution into a buffer, substituting silence on failure
    fn take_buffer(
        &self,
        plan: &ScenePlan,
        planned: &PlannedEvent,
        result: Option<Result<Resolved, ResolutionError>>,
        fallback_secs: f64,
        session: &Session,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<AudioBuffer, ProductionError> {
        let failure = match result {
            Some(Ok(resolved)) if !resolved.buffer.is_empty() => {
                if let Some(SoundSource::Procedural { best_score }) = resolved.source {
                    warn!(
                        "Scene '{}' event {}: no library match for '{}', using generated sound",
                        plan.id, planned.index, planned.event.text
                    );
                    warnings.push(RunWarning::FallbackSound {
                        scene: plan.id.clone(),
                        event: planned.index,
                        description: planned.event.text.clone(),
                        best_score,
                    });
                }
                return Ok(resolved.buffer);
            }
            Some(Ok(_)) => "generator returned no audio".to_string(),
            Some(Err(ResolutionError::Cancelled)) | None => {
                return Err(ProductionError::Cancelled {
                    completed_scenes: plan.index,
                });
            }
            Some(Err(e)) => e.to_string(),
        };

        warn!(
            "Scene '{}' event {}: replaced with {:.2}s of silence ({})",
            plan.id, planned.index, fallback_secs, failure
        );
        warnings.push(RunWarning::LineReplacedWithSilence {
            scene: plan.id.clone(),
            event: planned.index,
            duration: fallback_secs,
            reason: failure,
        });
        Ok(AudioBuffer::silence(session.sample_rate(), session.channels(), fallback_secs))
    }

    fn element(
        &self,
        plan: &ScenePlan,
        planned: &PlannedEvent,
        buffer: AudioBuffer,
        start: f64,
        track: TrackKind,
        class: ElementClass,
    ) -> AudioElement {
        let mut element = AudioElement::new(buffer, start, track, class);
        element.chain = planned.chain.clone();
        element.gain_db = planned.gain_db();
        element.fade_in = self.fade_for(element.duration);
        element.fade_out = element.fade_in;
        element.scene_index = plan.index;
        element.event_index = Some(planned.index);
        element
    }

    /// Resolve, time and place one scene. `has_next` tells whether a
    /// transition marker has a scene to crossfade into.
    pub async fn build_scene(
        &mut self,
        plan: &ScenePlan,
        has_next: bool,
        session: &mut Session,
        warnings: &mut Vec<RunWarning>,
    ) -> Result<SceneSummary, ProductionError> {
        let scene_start = self.next_start;
        let placeholder = |event: &ScriptEvent, default: f64| event.duration.filter(|d| *d > 0.0).unwrap_or(default);

        let requests: Vec<(usize, Request)> = plan
            .events
            .iter()
            .filter_map(|p| p.timed_request().map(|r| (p.index, r)))
            .collect();
        debug!("Scene '{}': resolving {} request(s)", plan.id, requests.len());
        let mut resolved: BTreeMap<usize, Result<Resolved, ResolutionError>> =
            self.resolver.resolve_all(requests).await.into_iter().collect();

        let mut cursor = scene_start;
        let mut previous: Option<(f64, f64)> = None;
        // Start of the last timed element, concurrent cues included
        let mut last_start: Option<f64> = None;
        let mut staged: Vec<AudioElement> = Vec::new();
        let mut beds: Vec<OpenBed<'_>> = Vec::new();

        for planned in &plan.events {
            let event = &planned.event;
            let anchor = if event.simultaneous {
                last_start.unwrap_or(cursor)
            } else if let Some(offset) = event.start_offset {
                (previous.map(|(_, end)| end).unwrap_or(scene_start) + offset).max(0.0)
            } else {
                cursor
            };

            let (track, class, concurrent, pause) = match &event.kind {
                EventKind::Dialogue { .. } => (
                    TrackKind::Dialogue,
                    ElementClass::Vocal,
                    false,
                    self.line_pause(plan, planned),
                ),
                EventKind::Narration { .. } => (
                    TrackKind::Narrator,
                    ElementClass::Vocal,
                    false,
                    self.line_pause(plan, planned),
                ),
                EventKind::SoundCue { mode, .. } => (
                    TrackKind::Sfx,
                    ElementClass::Cue,
                    *mode == CueMode::Concurrent,
                    self.timing.pause_after_cue_secs,
                ),
                EventKind::AmbientBed { .. } | EventKind::MusicCue => {
                    let kind = if matches!(event.kind, EventKind::MusicCue) {
                        BedKind::Music
                    } else {
                        BedKind::Ambient
                    };
                    beds.push(OpenBed {
                        planned,
                        kind,
                        start: anchor,
                        stop_at: None,
                    });
                    continue;
                }
                EventKind::BedStop { bed } => {
                    for open in beds.iter_mut().filter(|b| b.stop_at.is_none()) {
                        if open.planned.event.duration.is_none() && bed.is_none_or(|k| k == open.kind) {
                            open.stop_at = Some(cursor);
                        }
                    }
                    continue;
                }
                _ => continue,
            };

            let fallback = placeholder(event, self.timing.placeholder_secs);
            let buffer = self.take_buffer(plan, planned, resolved.remove(&planned.index), fallback, session, warnings)?;
            let mut element = self.element(plan, planned, buffer, anchor, track, class);
            element.concurrent = concurrent;

            last_start = Some(element.start);
            if !concurrent {
                let end = element.end();
                cursor = cursor.max(end + pause);
                previous = Some((element.start, end));
            }
            debug!(
                "Scene '{}' event {}: {} at {:.3}s for {:.3}s",
                plan.id, planned.index, track, element.start, element.duration
            );
            staged.push(element);
        }

        let scene_end = cursor;
        let following = scene_end + self.timing.scene_gap_secs;

        let horizon = match plan.transition {
            Some(window) if has_next => {
                session.add_crossfade(CrossfadeWindow {
                    start: following,
                    duration: window,
                    from_scene: plan.index,
                    curve: self.timing.crossfade_curve,
                });
                following + window
            }
            Some(_) => {
                debug!("Scene '{}': transition in final scene ignored", plan.id);
                scene_end
            }
            None => scene_end,
        };

        self.stage_beds(plan, &beds, horizon, session, warnings, &mut staged).await?;

        // Sounds go before voices at identical start times
        staged.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(a.class.placement_rank().cmp(&b.class.placement_rank()))
        });
        let placed = staged.len();
        for element in staged {
            let event = element.event_index;
            session
                .place(element.track, element)
                .map_err(|e| ProductionError::structure(&plan.id, event, e))?;
        }

        self.next_start = following;
        info!(
            "Scene '{}' placed: {} element(s), {:.2}s from {:.2}s",
            plan.id,
            placed,
            scene_end - scene_start,
            scene_start
        );

        Ok(SceneSummary {
            id: plan.id.clone(),
            start: scene_start,
            duration: scene_end - scene_start,
            elements: placed,
        })
    }

    async fn stage_beds(
        &self,
        plan: &ScenePlan,
        beds: &[OpenBed<'_>],
        horizon: f64,
        session: &Session,
        warnings: &mut Vec<RunWarning>,
        staged: &mut Vec<AudioElement>,
    ) -> Result<(), ProductionError> {
        let mut spans = Vec::new();
        for bed in beds {
            let end = match bed.planned.event.duration.filter(|d| *d > 0.0) {
                Some(explicit) => bed.start + explicit,
                None => bed.stop_at.unwrap_or(horizon),
            };
            let span = end - bed.start;
            if span <= OVERLAP_EPSILON {
                warn!(
                    "Scene '{}' event {}: bed '{}' has no time to play, skipped",
                    plan.id, bed.planned.index, bed.planned.event.text
                );
                warnings.push(RunWarning::EmptyBed {
                    scene: plan.id.clone(),
                    event: bed.planned.index,
                });
                continue;
            }
            spans.push((bed, span));
        }

        let requests = spans
            .iter()
            .map(|(bed, span)| (bed.planned.index, bed.planned.bed_request(*span)))
            .collect();
        let mut resolved: BTreeMap<usize, Result<Resolved, ResolutionError>> =
            self.resolver.resolve_all(requests).await.into_iter().collect();

        for (bed, span) in spans {
            let buffer = self.take_buffer(
                plan,
                bed.planned,
                resolved.remove(&bed.planned.index),
                span,
                session,
                warnings,
            )?;
            let track = match bed.kind {
                BedKind::Ambient => TrackKind::Ambient,
                BedKind::Music => TrackKind::Music,
            };
            staged.push(self.element(plan, bed.planned, buffer, bed.start, track, ElementClass::Bed));
        }
        Ok(())
    }
}
