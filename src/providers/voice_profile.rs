/*!
 * Voice profile resolution from descriptive traits.
 *
 * Each known trait contributes additively to pitch (semitones) and loudness
 * (dB), and multiplicatively to speed and pitch range. Unknown traits are
 * kept as timbre tags so generators can still condition on them.
 */

use serde::{Deserialize, Serialize};

const PITCH_LIMIT: f64 = 12.0;
const SPEED_RANGE: (f64, f64) = (0.5, 2.0);
const VOLUME_RANGE: (f64, f64) = (-12.0, 6.0);
const PITCH_SPREAD_RANGE: (f64, f64) = (0.5, 1.5);

/// Contribution of one trait
#[derive(Debug, Clone, Copy, Default)]
struct TraitDelta {
    pitch: f64,
    speed: f64,
    volume_db: f64,
    pitch_range: f64,
}

const fn delta(pitch: f64, speed: f64, volume_db: f64, pitch_range: f64) -> TraitDelta {
    TraitDelta {
        pitch,
        speed,
        volume_db,
        pitch_range,
    }
}

// speed and pitch_range are multipliers; 0.0 means "no change"
fn trait_delta(name: &str) -> Option<TraitDelta> {
    let d = match name {
        "deep" => delta(-6.0, 0.0, 0.0, 0.7),
        "low" => delta(-4.0, 0.0, 0.0, 0.8),
        "baritone" => delta(-3.0, 0.0, 0.0, 0.0),
        "bass" => delta(-5.0, 0.0, 0.0, 0.7),
        "medium" | "mid-range" => delta(0.0, 0.0, 0.0, 0.0),
        "high" => delta(3.0, 0.0, 0.0, 1.2),
        "soprano" => delta(6.0, 0.0, 0.0, 1.4),
        "slow" => delta(0.0, 0.85, 0.0, 0.0),
        "deliberate" => delta(0.0, 0.9, 0.0, 0.0),
        "fast" => delta(0.0, 1.15, 0.0, 0.0),
        "rapid" => delta(0.0, 1.25, 0.0, 0.0),
        "confident" => delta(0.0, 1.05, 1.6, 0.0),
        "nervous" => delta(0.0, 1.1, 0.0, 1.2),
        "shy" | "timid" => delta(0.0, 0.95, -1.5, 0.0),
        "authoritative" | "commanding" => delta(-2.0, 0.0, 1.4, 0.0),
        "gentle" => delta(0.0, 0.95, -0.9, 0.0),
        "serious" => delta(-1.0, 0.95, 0.0, 0.8),
        "sad" => delta(-1.0, 0.9, 0.0, 0.8),
        "happy" => delta(1.0, 1.05, 0.0, 1.1),
        "angry" => delta(-1.0, 0.0, 1.6, 0.0),
        "cheerful" => delta(2.0, 1.1, 0.0, 1.2),
        "excited" => delta(2.0, 1.15, 1.2, 1.3),
        "monotone" => delta(0.0, 0.0, 0.0, 0.6),
        "child" => delta(8.0, 0.0, 0.0, 1.3),
        "young" => delta(3.0, 1.05, 0.0, 0.0),
        "old" => delta(-2.0, 0.9, 0.0, 0.0),
        "elderly" => delta(-3.0, 0.85, 0.0, 0.0),
        "whispering" => delta(0.0, 0.0, -3.1, 0.0),
        "shouting" => delta(0.0, 0.0, 2.3, 0.0),
        "distant" => delta(0.0, 0.0, -1.9, 0.0),
        "ominous" => delta(-3.0, 0.9, 0.0, 0.0),
        "wise" => delta(-1.0, 0.9, 0.0, 0.0),
        _ => return None,
    };
    Some(d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Neutral,
}

fn gender_of(name: &str) -> Option<Gender> {
    match name {
        "male" | "man" | "boy" | "masculine" => Some(Gender::Male),
        "female" | "woman" | "girl" | "feminine" => Some(Gender::Female),
        _ => None,
    }
}

/// Resolved synthesis parameters for one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: String,
    /// Base voice the generator should start from
    pub base_voice: String,
    pub gender: Gender,
    /// Pitch offset in semitones
    pub pitch_semitones: f64,
    /// Speaking rate multiplier
    pub speed: f64,
    pub volume_db: f64,
    /// Intonation spread multiplier
    pub pitch_range: f64,
    /// Traits with no parameter mapping
    pub timbre: Vec<String>,
}

impl VoiceProfile {
    /// Profile used for narration when no narrator is declared
    pub fn neutral(id: &str) -> Self {
        Self {
            id: id.to_string(),
            base_voice: "neutral".to_string(),
            gender: Gender::Neutral,
            pitch_semitones: 0.0,
            speed: 1.0,
            volume_db: 0.0,
            pitch_range: 1.0,
            timbre: Vec::new(),
        }
    }

    /// Resolve descriptive traits
    pub fn from_traits<S: AsRef<str>>(id: &str, traits: &[S]) -> Self {
        let mut profile = Self::neutral(id);
        let mut names: Vec<String> = Vec::new();

        for raw in traits {
            let name = raw.as_ref().trim().to_lowercase().replace([' ', '_'], "-");
            if name.is_empty() {
                continue;
            }
            if let Some(gender) = gender_of(&name) {
                profile.gender = gender;
            } else if let Some(d) = trait_delta(&name) {
                profile.pitch_semitones += d.pitch;
                profile.volume_db += d.volume_db;
                if d.speed > 0.0 {
                    profile.speed *= d.speed;
                }
                if d.pitch_range > 0.0 {
                    profile.pitch_range *= d.pitch_range;
                }
            } else {
                profile.timbre.push(name.clone());
            }
            names.push(name);
        }

        profile.pitch_semitones = profile.pitch_semitones.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        profile.speed = profile.speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        profile.volume_db = profile.volume_db.clamp(VOLUME_RANGE.0, VOLUME_RANGE.1);
        profile.pitch_range = profile.pitch_range.clamp(PITCH_SPREAD_RANGE.0, PITCH_SPREAD_RANGE.1);
        profile.base_voice = base_voice(profile.gender, profile.pitch_semitones, &names);
        profile
    }

    /// Pitch offset as a frequency ratio
    pub fn pitch_ratio(&self) -> f64 {
        2f64.powf(self.pitch_semitones / 12.0)
    }
}

fn base_voice(gender: Gender, pitch: f64, names: &[String]) -> String {
    let has = |t: &str| names.iter().any(|n| n == t);
    let voice = if has("child") {
        "child"
    } else if has("elderly") || has("old") {
        "elder"
    } else {
        match gender {
            Gender::Male if pitch <= -3.0 => "male_deep",
            Gender::Male if pitch <= -1.0 => "male_medium",
            Gender::Male => "male_light",
            Gender::Female if pitch <= 1.0 => "female_deep",
            Gender::Female if pitch <= 3.0 => "female_medium",
            Gender::Female => "female_light",
            Gender::Neutral => "neutral",
        }
    };
    voice.to_string()
}
