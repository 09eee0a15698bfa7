/*!
 * Effect catalog.
 *
 * A closed set of effect kinds, each with declared parameters and valid
 * ranges, plus a table of named presets. Tags are resolved against the
 * catalog once, before any audio is processed; unknown names fail here and
 * out-of-range parameters are clamped and recorded.
 */

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::errors::StructureError;
use crate::script::PresetEffect;

/// The closed set of supported effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Gain,
    Reverb,
    Echo,
    PitchShift,
    TimeStretch,
    Distortion,
    Tremolo,
    Lowpass,
    Highpass,
    Bandpass,
    Eq,
    Compressor,
    Noise,
}

/// A declared parameter: name, default and inclusive valid range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
    pub min: f64,
    pub max: f64,
}

const fn param(name: &'static str, default: f64, min: f64, max: f64) -> ParamSpec {
    ParamSpec {
        name,
        default,
        min,
        max,
    }
}

const GAIN_PARAMS: &[ParamSpec] = &[param("db", 0.0, -60.0, 24.0)];
const REVERB_PARAMS: &[ParamSpec] = &[
    param("room_size", 0.5, 0.0, 1.0),
    param("damping", 0.5, 0.0, 1.0),
    param("wet", 0.33, 0.0, 1.0),
    param("dry", 0.7, 0.0, 1.0),
];
const ECHO_PARAMS: &[ParamSpec] = &[param("delay", 0.3, 0.01, 2.0), param("decay", 0.5, 0.0, 0.95)];
const RATIO_PARAMS: &[ParamSpec] = &[param("ratio", 1.0, 0.5, 2.0)];
const DISTORTION_PARAMS: &[ParamSpec] = &[param("amount", 0.1, 0.0, 0.99)];
const TREMOLO_PARAMS: &[ParamSpec] = &[param("depth", 0.5, 0.0, 1.0), param("rate", 5.0, 0.1, 20.0)];
const PASS_PARAMS: &[ParamSpec] = &[param("cutoff", 0.5, 0.01, 0.99), param("q", 0.707, 0.1, 10.0)];
const BANDPASS_PARAMS: &[ParamSpec] = &[param("cutoff", 0.5, 0.01, 0.99), param("q", 1.0, 0.1, 10.0)];
const EQ_PARAMS: &[ParamSpec] = &[
    param("low_db", 0.0, -24.0, 12.0),
    param("mid_db", 0.0, -24.0, 12.0),
    param("high_db", 0.0, -24.0, 12.0),
];
const COMPRESSOR_PARAMS: &[ParamSpec] = &[
    param("threshold_db", -20.0, -60.0, 0.0),
    param("ratio", 4.0, 1.0, 20.0),
    param("attack", 0.005, 0.0001, 0.5),
    param("release", 0.1, 0.005, 2.0),
];
const NOISE_PARAMS: &[ParamSpec] = &[param("amount", 0.01, 0.0, 0.5)];

impl EffectKind {
    pub const ALL: [EffectKind; 13] = [
        Self::Gain,
        Self::Reverb,
        Self::Echo,
        Self::PitchShift,
        Self::TimeStretch,
        Self::Distortion,
        Self::Tremolo,
        Self::Lowpass,
        Self::Highpass,
        Self::Bandpass,
        Self::Eq,
        Self::Compressor,
        Self::Noise,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Gain => "gain",
            Self::Reverb => "reverb",
            Self::Echo => "echo",
            Self::PitchShift => "pitch_shift",
            Self::TimeStretch => "time_stretch",
            Self::Distortion => "distortion",
            Self::Tremolo => "tremolo",
            Self::Lowpass => "lowpass",
            Self::Highpass => "highpass",
            Self::Bandpass => "bandpass",
            Self::Eq => "eq",
            Self::Compressor => "compressor",
            Self::Noise => "noise",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Declared parameters of this effect
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Self::Gain => GAIN_PARAMS,
            Self::Reverb => REVERB_PARAMS,
            Self::Echo => ECHO_PARAMS,
            Self::PitchShift | Self::TimeStretch => RATIO_PARAMS,
            Self::Distortion => DISTORTION_PARAMS,
            Self::Tremolo => TREMOLO_PARAMS,
            Self::Lowpass | Self::Highpass => PASS_PARAMS,
            Self::Bandpass => BANDPASS_PARAMS,
            Self::Eq => EQ_PARAMS,
            Self::Compressor => COMPRESSOR_PARAMS,
            Self::Noise => NOISE_PARAMS,
        }
    }

    pub fn param_spec(&self, name: &str) -> Option<&'static ParamSpec> {
        self.params().iter().find(|p| p.name == name)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully resolved effect: every declared parameter present and within range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub kind: EffectKind,
    pub params: BTreeMap<String, f64>,
}

impl EffectSpec {
    /// An effect with all parameters at their defaults
    pub fn defaults(kind: EffectKind) -> Self {
        let params = kind
            .params()
            .iter()
            .map(|p| (p.name.to_string(), p.default))
            .collect();
        Self { kind, params }
    }

    /// Parameter value, falling back to the declared default
    pub fn param(&self, name: &str) -> f64 {
        self.params
            .get(name)
            .copied()
            .or_else(|| self.kind.param_spec(name).map(|p| p.default))
            .unwrap_or(0.0)
    }
}

/// A parameter that was pulled back into its valid range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterClamp {
    pub preset: String,
    pub effect: EffectKind,
    pub param: String,
    pub requested: f64,
    pub applied: f64,
}

/// One element of an effect chain: a named preset resolved to its effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectPreset {
    pub tag: String,
    pub effects: Vec<EffectSpec>,
}

/// Ordered composition of presets, outer region first and line-local tag last
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectChain {
    presets: Vec<EffectPreset>,
}

impl EffectChain {
    pub fn new(presets: Vec<EffectPreset>) -> Self {
        Self { presets }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of chain elements (presets), not individual effects
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn presets(&self) -> &[EffectPreset] {
        &self.presets
    }

    pub fn tags(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.tag.as_str()).collect()
    }

    /// Effects in processing order
    pub fn effects(&self) -> impl Iterator<Item = &EffectSpec> {
        self.presets.iter().flat_map(|p| p.effects.iter())
    }
}

/// Raw preset definition before validation
type RawPreset = Vec<(EffectKind, Vec<(&'static str, f64)>)>;

fn builtin_presets() -> Vec<(&'static str, RawPreset)> {
    use EffectKind::{
        Bandpass, Compressor, Distortion, Echo, Gain, Highpass, Lowpass, Noise, PitchShift, Reverb,
        Tremolo,
    };
    vec![
        ("internal", vec![
            (Lowpass, vec![("cutoff", 0.35)]),
            (Reverb, vec![("room_size", 0.3), ("wet", 0.25), ("dry", 0.8)]),
            (Gain, vec![("db", -2.0)]),
        ]),
        ("flashback", vec![
            (Reverb, vec![("room_size", 0.8), ("damping", 0.3), ("wet", 0.45), ("dry", 0.6)]),
            (Echo, vec![("delay", 0.25), ("decay", 0.3)]),
        ]),
        ("intensify", vec![
            (Compressor, vec![("threshold_db", -24.0), ("ratio", 6.0)]),
            (Distortion, vec![("amount", 0.2)]),
            (Gain, vec![("db", 2.0)]),
        ]),
        ("letter", vec![
            (Bandpass, vec![("cutoff", 0.15), ("q", 0.8)]),
            (Reverb, vec![("room_size", 0.2), ("wet", 0.15)]),
        ]),
        ("whisper", vec![
            (Highpass, vec![("cutoff", 0.03)]),
            (Gain, vec![("db", -6.0)]),
            (Noise, vec![("amount", 0.005)]),
        ]),
        ("distant", vec![
            (Lowpass, vec![("cutoff", 0.2)]),
            (Reverb, vec![("room_size", 0.7), ("wet", 0.5), ("dry", 0.4)]),
            (Gain, vec![("db", -6.0)]),
        ]),
        ("radio", vec![
            (Bandpass, vec![("cutoff", 0.1), ("q", 1.5)]),
            (Distortion, vec![("amount", 0.3)]),
            (Noise, vec![("amount", 0.01)]),
        ]),
        ("dream", vec![
            (PitchShift, vec![("ratio", 1.05)]),
            (Reverb, vec![("room_size", 0.9), ("damping", 0.3), ("wet", 0.5), ("dry", 0.5)]),
            (Tremolo, vec![("depth", 0.3), ("rate", 2.0)]),
        ]),
    ]
}

/// Resolved preset table
#[derive(Debug, Clone)]
pub struct EffectCatalog {
    presets: HashMap<String, EffectPreset>,
    clamps: Vec<ParameterClamp>,
}

impl EffectCatalog {
    /// Catalog with built-in presets only
    pub fn builtin() -> Self {
        let mut presets = HashMap::new();

        // Every effect name doubles as a single-effect preset with defaults
        for kind in EffectKind::ALL {
            presets.insert(
                kind.name().to_string(),
                EffectPreset {
                    tag: kind.name().to_string(),
                    effects: vec![EffectSpec::defaults(kind)],
                },
            );
        }

        for (tag, raw) in builtin_presets() {
            let effects = raw
                .into_iter()
                .map(|(kind, overrides)| {
                    let mut spec = EffectSpec::defaults(kind);
                    for (name, value) in overrides {
                        spec.params.insert(name.to_string(), value);
                    }
                    spec
                })
                .collect();
            presets.insert(
                tag.to_string(),
                EffectPreset {
                    tag: tag.to_string(),
                    effects,
                },
            );
        }

        Self {
            presets,
            clamps: Vec::new(),
        }
    }

    /// Built-ins extended and overridden by script-authored presets
    pub fn with_presets(
        authored: &BTreeMap<String, Vec<PresetEffect>>,
    ) -> Result<Self, StructureError> {
        let mut catalog = Self::builtin();
        for (tag, effects) in authored {
            let preset = catalog.resolve_preset(tag, effects)?;
            catalog.presets.insert(tag.clone(), preset);
        }
        Ok(catalog)
    }

    fn resolve_preset(
        &mut self,
        tag: &str,
        effects: &[PresetEffect],
    ) -> Result<EffectPreset, StructureError> {
        let mut resolved = Vec::with_capacity(effects.len());
        for authored in effects {
            let kind = EffectKind::from_name(&authored.effect).ok_or_else(|| {
                StructureError::UnknownEffect {
                    name: authored.effect.clone(),
                }
            })?;
            let mut spec = EffectSpec::defaults(kind);

            for (name, requested) in &authored.params {
                let declared = kind.param_spec(name).ok_or_else(|| {
                    StructureError::UnknownParameter {
                        effect: kind.name().to_string(),
                        param: name.clone(),
                    }
                })?;
                let applied = if requested.is_finite() {
                    requested.clamp(declared.min, declared.max)
                } else {
                    declared.default
                };
                if applied != *requested {
                    warn!(
                        "Preset '{}': {}.{} = {} is outside [{}, {}], using {}",
                        tag, kind, name, requested, declared.min, declared.max, applied
                    );
                    self.clamps.push(ParameterClamp {
                        preset: tag.to_string(),
                        effect: kind,
                        param: name.clone(),
                        requested: *requested,
                        applied,
                    });
                }
                spec.params.insert(name.clone(), applied);
            }
            resolved.push(spec);
        }

        Ok(EffectPreset {
            tag: tag.to_string(),
            effects: resolved,
        })
    }

    /// Clamps applied while resolving authored presets
    pub fn clamps(&self) -> &[ParameterClamp] {
        &self.clamps
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.presets.contains_key(tag)
    }

    pub fn preset(&self, tag: &str) -> Result<&EffectPreset, StructureError> {
        self.presets
            .get(tag)
            .ok_or_else(|| StructureError::UnknownEffect {
                name: tag.to_string(),
            })
    }

    /// Resolve tags, in order, into a chain
    pub fn chain<S: AsRef<str>>(&self, tags: &[S]) -> Result<EffectChain, StructureError> {
        let presets = tags
            .iter()
            .map(|tag| self.preset(tag.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EffectChain::new(presets))
    }
}

impl Default for EffectCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
