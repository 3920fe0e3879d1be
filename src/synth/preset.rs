use super::error::{SynthError, SynthResult};
use super::params::ParamChange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A partial parameter set: parameter name to value.
///
/// Serialises as a flat JSON object, e.g. `{"pitch": 220, "f1": 650}`.
/// Names are resolved only when the preset is applied, so a preset may carry
/// names this build does not know; those are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preset {
    values: BTreeMap<String, f32>,
}

/// Result of applying a preset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetReport {
    pub applied: Vec<ParamChange>,
    /// Names that are not parameters.
    pub ignored: Vec<String>,
    /// Known names whose value was refused, such as a non-positive pitch.
    pub rejected: Vec<SynthError>,
}

const BARK: &[(&str, f32)] = &[
    ("pitch", 220.0),
    ("jitter", 0.05),
    ("shimmer", 0.08),
    ("breathiness", 0.1),
    ("noiseColor", 1000.0),
    ("f1", 650.0),
    ("f2", 1100.0),
    ("f3", 2200.0),
    ("amp-attack", 0.01),
    ("amp-decay", 0.05),
    ("amp-sustain", 0.6),
    ("amp-release", 0.2),
];

const WHINE: &[(&str, f32)] = &[
    ("pitch", 450.0),
    ("jitter", 0.03),
    ("shimmer", 0.04),
    ("breathiness", 0.15),
    ("noiseColor", 1200.0),
    ("f1", 800.0),
    ("f2", 1600.0),
    ("f3", 2800.0),
    ("amp-attack", 0.01),
    ("amp-decay", 0.1),
    ("amp-sustain", 0.7),
    ("amp-release", 0.3),
];

const GROWL: &[(&str, f32)] = &[
    ("pitch", 120.0),
    ("jitter", 0.1),
    ("shimmer", 0.12),
    ("breathiness", 0.2),
    ("noiseColor", 800.0),
    ("f1", 500.0),
    ("f2", 900.0),
    ("f3", 1800.0),
    ("amp-attack", 0.05),
    ("amp-decay", 0.2),
    ("amp-sustain", 0.8),
    ("amp-release", 0.4),
];

impl Preset {
    pub fn new() -> Self {
        Self::default()
    }

    pub const BUILTIN: [&'static str; 3] = ["bark", "whine", "growl"];

    /// One of the presets that ship with the crate.
    pub fn builtin(name: &str) -> Option<Self> {
        let entries = match name {
            "bark" => BARK,
            "whine" => WHINE,
            "growl" => GROWL,
            _ => return None,
        };
        Some(Self::from_entries(entries))
    }

    pub fn bark() -> Self {
        Self::from_entries(BARK)
    }

    fn from_entries(entries: &[(&str, f32)]) -> Self {
        entries.iter().fold(Self::new(), |preset, &(k, v)| preset.with(k, v))
    }

    pub fn with(mut self, name: &str, value: f32) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f32) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, f32)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn from_json(json: &str) -> SynthResult<Self> {
        serde_json::from_str(json).map_err(|e| SynthError::InvalidPreset(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve() {
        for name in Preset::BUILTIN {
            let preset = Preset::builtin(name).unwrap();
            assert_eq!(preset.len(), 12);
        }
        assert!(Preset::builtin("meow").is_none());
        assert_eq!(Preset::bark(), Preset::builtin("bark").unwrap());
    }

    #[test]
    fn loads_from_a_flat_json_object() {
        let preset = Preset::from_json(r#"{ "pitch": 300, "f2": 1400.5, "wobble": 1 }"#).unwrap();
        assert_eq!(preset.get("pitch"), Some(300.0));
        assert_eq!(preset.get("f2"), Some(1400.5));
        assert_eq!(preset.len(), 3);
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = Preset::from_json(r#"{ "pitch": "high" }"#).unwrap_err();
        assert!(matches!(err, SynthError::InvalidPreset(_)));
    }
}
