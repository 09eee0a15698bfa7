/*!
 * Track/Session model.
 *
 * A `Session` is the aggregate root of one production run: one track per
 * track type, each configured from the run configuration, plus the crossfade
 * windows recorded at scene transitions. Placement is append-only and
 * validated; a placed element's timing is never mutated.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::app_config::{
    CompressorConfig, Config, CrossfadeCurve, DuckingConfig, EqConfig, MasteringConfig,
};
use crate::audio::buffer::AudioBuffer;
use crate::effects::catalog::{EffectCatalog, EffectChain};
use crate::errors::StructureError;

/// Tolerance for overlap checks, in seconds
pub const OVERLAP_EPSILON: f64 = 1e-9;

/// Track types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Dialogue,
    Narrator,
    Sfx,
    Ambient,
    Music,
}

impl TrackKind {
    pub const ALL: [TrackKind; 5] = [
        Self::Dialogue,
        Self::Narrator,
        Self::Sfx,
        Self::Ambient,
        Self::Music,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dialogue => "dialogue",
            Self::Narrator => "narrator",
            Self::Sfx => "sfx",
            Self::Ambient => "ambient",
            Self::Music => "music",
        }
    }

    /// Tracks whose elements are beds
    pub fn is_bed(&self) -> bool {
        matches!(self, Self::Ambient | Self::Music)
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role of an element, used for same-timestamp ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementClass {
    Vocal,
    Cue,
    Bed,
}

impl ElementClass {
    /// Sounds and beds go before voices at identical start times
    pub fn placement_rank(&self) -> u8 {
        match self {
            Self::Cue | Self::Bed => 0,
            Self::Vocal => 1,
        }
    }
}

/// Opaque handle returned by `Session::place`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A placed, time-stamped unit of audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioElement {
    /// Processed source audio (effect chain already applied)
    pub buffer: AudioBuffer,
    /// Absolute start in seconds
    pub start: f64,
    /// Length in seconds; the buffer is trimmed or padded to it on render
    pub duration: f64,
    /// Track the element is placed on
    pub track: TrackKind,
    /// Chain that was applied to `buffer`
    pub chain: EffectChain,
    /// Element gain in dB
    pub gain_db: f64,
    /// Fade-in length in seconds
    pub fade_in: f64,
    /// Fade-out length in seconds
    pub fade_out: f64,
    /// Scene the element belongs to
    pub scene_index: usize,
    /// Originating script event, if any
    pub event_index: Option<usize>,
    /// Vocal, cue or bed
    pub class: ElementClass,
    /// Authored to play under other elements of the same track
    pub concurrent: bool,
}

impl AudioElement {
    /// Element whose duration is taken from its buffer
    pub fn new(buffer: AudioBuffer, start: f64, track: TrackKind, class: ElementClass) -> Self {
        let duration = buffer.duration_secs();
        Self {
            buffer,
            start,
            duration,
            track,
            chain: EffectChain::empty(),
            gain_db: 0.0,
            fade_in: 0.0,
            fade_out: 0.0,
            scene_index: 0,
            event_index: None,
            class,
            concurrent: matches!(class, ElementClass::Bed),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    fn overlaps(&self, other: &AudioElement) -> bool {
        self.start < other.end() - OVERLAP_EPSILON && other.start < self.end() - OVERLAP_EPSILON
    }
}

/// Overlap interval between two adjacent scenes' beds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossfadeWindow {
    /// Start of the incoming scene
    pub start: f64,
    /// Length of the overlap in seconds
    pub duration: f64,
    /// Index of the outgoing scene
    pub from_scene: usize,
    /// Gain law of the fade
    pub curve: CrossfadeCurve,
}

impl CrossfadeWindow {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A bucket of elements sharing one acoustic treatment
#[derive(Debug, Clone)]
pub struct Track {
    pub kind: TrackKind,
    /// Track level in dB, applied after ducking
    pub base_gain_db: f64,
    /// Run the equalizer over the bus
    pub equalize: bool,
    /// Run the compressor over the bus
    pub compress: bool,
    /// Duck under the key tracks
    pub side_chain: bool,
    pub eq: EqConfig,
    pub compressor: CompressorConfig,
    /// Track-wide effects, applied after EQ and compression
    pub chain: EffectChain,
    elements: Vec<(ElementId, AudioElement)>,
}

impl Track {
    pub fn elements(&self) -> impl Iterator<Item = &AudioElement> {
        self.elements.iter().map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn end(&self) -> f64 {
        self.elements().map(AudioElement::end).fold(0.0, f64::max)
    }
}

/// Aggregate root of one production run
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    sample_rate: u32,
    channels: u16,
    tracks: Vec<Track>,
    crossfades: Vec<CrossfadeWindow>,
    /// Master chain settings used by the renderer
    pub mastering: MasteringConfig,
    /// Side-chain settings used by the renderer
    pub ducking: DuckingConfig,
    next_id: u64,
}

impl Session {
    /// Create a session with one track per type, resolving track effect tags
    pub fn new(config: &Config, catalog: &EffectCatalog) -> Result<Self, StructureError> {
        let tracks = TrackKind::ALL
            .iter()
            .map(|kind| {
                let settings = config.tracks.get(*kind);
                Ok(Track {
                    kind: *kind,
                    base_gain_db: settings.base_gain_db,
                    equalize: settings.equalize,
                    compress: settings.compress,
                    side_chain: settings.side_chain,
                    eq: settings.eq,
                    compressor: settings.compressor,
                    chain: catalog.chain(&settings.effects)?,
                    elements: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>, StructureError>>()?;

        Ok(Self {
            id: Uuid::new_v4(),
            sample_rate: config.output.sample_rate,
            channels: config.output.channels,
            tracks,
            crossfades: Vec::new(),
            mastering: config.mastering.clone(),
            ducking: config.ducking.clone(),
            next_id: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn track(&self, kind: TrackKind) -> &Track {
        // Tracks are created in `TrackKind::ALL` order
        &self.tracks[kind as usize]
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Append an element to a track, enforcing start >= 0, duration > 0 and
    /// no overlap between non-concurrent elements of the same track
    pub fn place(&mut self, track: TrackKind, mut element: AudioElement) -> Result<ElementId, StructureError> {
        if !element.start.is_finite() || element.start < 0.0 {
            return Err(StructureError::InvalidElement {
                reason: format!("start {} on track '{}' is negative or not finite", element.start, track),
            });
        }
        if !element.duration.is_finite() || element.duration <= 0.0 {
            return Err(StructureError::InvalidElement {
                reason: format!("duration {} on track '{}' is not positive", element.duration, track),
            });
        }

        let target = &mut self.tracks[track as usize];
        if !element.concurrent {
            if let Some(existing) = target
                .elements()
                .filter(|e| !e.concurrent)
                .find(|e| e.overlaps(&element))
            {
                return Err(StructureError::Overlap {
                    track: track.to_string(),
                    start: element.start,
                    existing_end: existing.end(),
                });
            }
        }

        element.track = track;
        let id = ElementId(self.next_id);
        self.next_id += 1;
        target.elements.push((id, element));
        Ok(id)
    }

    /// Take an element out of the session
    pub fn remove(&mut self, id: ElementId) -> Option<AudioElement> {
        for track in &mut self.tracks {
            if let Some(pos) = track.elements.iter().position(|(eid, _)| *eid == id) {
                return Some(track.elements.remove(pos).1);
            }
        }
        None
    }

    pub fn get(&self, id: ElementId) -> Option<&AudioElement> {
        self.tracks
            .iter()
            .flat_map(|t| t.elements.iter())
            .find(|(eid, _)| *eid == id)
            .map(|(_, e)| e)
    }

    /// All elements in placement order
    pub fn elements(&self) -> Vec<(ElementId, &AudioElement)> {
        let mut all: Vec<(ElementId, &AudioElement)> = self
            .tracks
            .iter()
            .flat_map(|t| t.elements.iter().map(|(id, e)| (*id, e)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn element_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.element_count() == 0
    }

    /// Latest end time over all tracks
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(Track::end).fold(0.0, f64::max)
    }

    pub fn add_crossfade(&mut self, window: CrossfadeWindow) {
        self.crossfades.push(window);
    }

    pub fn crossfades(&self) -> &[CrossfadeWindow] {
        &self.crossfades
    }
}
