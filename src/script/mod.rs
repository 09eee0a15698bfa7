/*!
 * Structured script input.
 *
 * This is the serialized output of the script parser: characters with their
 * voice traits, a table of named effect presets, and scenes made of ordered
 * events. The engine consumes it read-only.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A complete production
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Production {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub characters: Vec<Character>,

    /// Named effect presets; override built-in presets of the same name
    #[serde(default)]
    pub effects: BTreeMap<String, Vec<PresetEffect>>,

    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl Production {
    /// Load a production from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse script file: {:?}", path))
    }

    /// Look up a character by id
    pub fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }
}

/// A speaking character
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Character {
    pub id: String,

    /// Descriptive voice traits such as "deep", "slow", "gravelly"
    #[serde(default)]
    pub traits: Vec<String>,

    /// Pause after each of this character's lines
    #[serde(default)]
    pub pause_secs: Option<f64>,

    /// Extra gain applied to this character's lines
    #[serde(default)]
    pub gain_db: Option<f64>,
}

impl Character {
    pub fn new(id: &str, traits: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            traits: traits.iter().map(|t| t.to_string()).collect(),
            pause_secs: None,
            gain_db: None,
        }
    }
}

/// One effect inside a named preset, as authored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresetEffect {
    pub effect: String,

    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

/// A scene: an ordered list of events sharing one ambient context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Scene {
    pub id: String,

    #[serde(default)]
    pub mood: Option<String>,

    /// Inter-line pause override for the whole scene
    #[serde(default)]
    pub pause_secs: Option<f64>,

    #[serde(default)]
    pub events: Vec<ScriptEvent>,
}

impl Scene {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_event(mut self, event: ScriptEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// How a sound cue interacts with the scene cursor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CueMode {
    /// Interrupts the flow; the cursor advances past it
    #[default]
    Inline,
    /// Plays under ongoing events; the cursor does not move
    Concurrent,
}

/// Kind of bed a stop marker applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BedKind {
    Ambient,
    Music,
}

/// The variant part of a script event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Dialogue {
        character: String,
        #[serde(default)]
        emotion: Option<String>,
        /// Line-local effect tag
        #[serde(default)]
        effect: Option<String>,
    },
    Narration {
        #[serde(default)]
        emotion: Option<String>,
        #[serde(default)]
        effect: Option<String>,
    },
    SoundCue {
        #[serde(default)]
        mode: CueMode,
        #[serde(default)]
        category: Option<String>,
    },
    AmbientBed {
        #[serde(default)]
        category: Option<String>,
    },
    MusicCue,
    TransitionMarker,
    EffectRegionStart {
        tag: String,
    },
    EffectRegionEnd {
        tag: String,
    },
    /// Ends open beds of the given kind (all beds when omitted) at the cursor
    BedStop {
        #[serde(default)]
        bed: Option<BedKind>,
    },
}

/// One authored event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptEvent {
    #[serde(flatten)]
    pub kind: EventKind,

    /// Line text or cue description
    #[serde(default)]
    pub text: String,

    /// Explicit duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    /// Start relative to the end of the previous timed event, replacing the pause
    #[serde(default)]
    pub start_offset: Option<f64>,

    /// Start together with the previous timed event
    #[serde(default)]
    pub simultaneous: bool,

    /// Per-event gain
    #[serde(default)]
    pub gain_db: Option<f64>,
}

impl ScriptEvent {
    fn of(kind: EventKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            duration: None,
            start_offset: None,
            simultaneous: false,
            gain_db: None,
        }
    }

    pub fn dialogue(character: &str, text: &str) -> Self {
        Self::of(
            EventKind::Dialogue {
                character: character.to_string(),
                emotion: None,
                effect: None,
            },
            text,
        )
    }

    pub fn narration(text: &str) -> Self {
        Self::of(
            EventKind::Narration {
                emotion: None,
                effect: None,
            },
            text,
        )
    }

    pub fn sound_cue(description: &str, mode: CueMode) -> Self {
        Self::of(EventKind::SoundCue { mode, category: None }, description)
    }

    pub fn ambient_bed(description: &str) -> Self {
        Self::of(EventKind::AmbientBed { category: None }, description)
    }

    pub fn music_cue(description: &str) -> Self {
        Self::of(EventKind::MusicCue, description)
    }

    pub fn transition() -> Self {
        Self::of(EventKind::TransitionMarker, "")
    }

    pub fn region_start(tag: &str) -> Self {
        Self::of(
            EventKind::EffectRegionStart {
                tag: tag.to_string(),
            },
            "",
        )
    }

    pub fn region_end(tag: &str) -> Self {
        Self::of(
            EventKind::EffectRegionEnd {
                tag: tag.to_string(),
            },
            "",
        )
    }

    pub fn bed_stop(bed: Option<BedKind>) -> Self {
        Self::of(EventKind::BedStop { bed }, "")
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn with_offset(mut self, secs: f64) -> Self {
        self.start_offset = Some(secs);
        self
    }

    pub fn simultaneous(mut self) -> Self {
        self.simultaneous = true;
        self
    }

    /// Set the line-local effect tag on a dialogue or narration event
    pub fn with_effect(mut self, tag: &str) -> Self {
        match &mut self.kind {
            EventKind::Dialogue { effect, .. } | EventKind::Narration { effect, .. } => {
                *effect = Some(tag.to_string());
            }
            _ => {}
        }
        self
    }

    /// Set the emotion on a dialogue or narration event
    pub fn with_emotion(mut self, value: &str) -> Self {
        match &mut self.kind {
            EventKind::Dialogue { emotion, .. } | EventKind::Narration { emotion, .. } => {
                *emotion = Some(value.to_string());
            }
            _ => {}
        }
        self
    }

    /// Set the category on a sound cue or ambient bed
    pub fn with_category(mut self, value: &str) -> Self {
        match &mut self.kind {
            EventKind::SoundCue { category, .. } | EventKind::AmbientBed { category } => {
                *category = Some(value.to_string());
            }
            _ => {}
        }
        self
    }

    /// True for events that need a voice or sound buffer
    pub fn needs_audio(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Dialogue { .. }
                | EventKind::Narration { .. }
                | EventKind::SoundCue { .. }
                | EventKind::AmbientBed { .. }
                | EventKind::MusicCue
        )
    }
}
