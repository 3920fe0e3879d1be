use super::error::{SynthError, SynthResult};
use std::fmt;

pub const FORMANT_COUNT: usize = 4;

/// Upper bound on the fundamental; higher values are clamped.
pub const MAX_PITCH: f32 = 4000.0;
/// Lowest centre frequency a resonator is tuned to.
pub const MIN_CENTER_FREQUENCY: f32 = 20.0;
/// Centre frequencies stay below this fraction of the sample rate.
pub const NYQUIST_MARGIN: f32 = 0.49;
pub const MIN_NOISE_Q: f32 = 0.1;
pub const MAX_NOISE_Q: f32 = 50.0;
/// Bandwidths near zero blow the bandwidth to Q conversion up.
pub const MIN_BANDWIDTH_OCTAVES: f32 = 0.01;
pub const MAX_BANDWIDTH_OCTAVES: f32 = 4.0;
pub const MAX_ENVELOPE_SECONDS: f32 = 10.0;

const FORMANT_FREQUENCY_NAMES: [&str; FORMANT_COUNT] = [
    "formantFrequency1",
    "formantFrequency2",
    "formantFrequency3",
    "formantFrequency4",
];
const FORMANT_BANDWIDTH_NAMES: [&str; FORMANT_COUNT] = [
    "formantBandwidth1",
    "formantBandwidth2",
    "formantBandwidth3",
    "formantBandwidth4",
];
const FORMANT_GAIN_NAMES: [&str; FORMANT_COUNT] =
    ["formantGain1", "formantGain2", "formantGain3", "formantGain4"];

/// The closed set of parameters the engine understands.
///
/// Names are resolved to a `ParamId` once, when a request arrives; nothing
/// downstream ever matches on strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamId {
    Pitch,
    Jitter,
    Shimmer,
    Breathiness,
    NoiseColor,
    NoiseQ,
    /// Zero based formant index.
    FormantFrequency(usize),
    FormantBandwidth(usize),
    FormantGain(usize),
    FormantMix,
    AmpAttack,
    AmpDecay,
    AmpSustain,
    AmpRelease,
    OutputGain,
}

/// Which part of the engine has to hear about a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTarget {
    Glottal,
    NoiseLevel,
    NoiseFilter,
    FormantFilter,
    FormantMixer,
    Envelope,
    Output,
}

impl ParamId {
    pub const ALL: [ParamId; 24] = [
        ParamId::Pitch,
        ParamId::Jitter,
        ParamId::Shimmer,
        ParamId::Breathiness,
        ParamId::NoiseColor,
        ParamId::NoiseQ,
        ParamId::FormantFrequency(0),
        ParamId::FormantFrequency(1),
        ParamId::FormantFrequency(2),
        ParamId::FormantFrequency(3),
        ParamId::FormantBandwidth(0),
        ParamId::FormantBandwidth(1),
        ParamId::FormantBandwidth(2),
        ParamId::FormantBandwidth(3),
        ParamId::FormantGain(0),
        ParamId::FormantGain(1),
        ParamId::FormantGain(2),
        ParamId::FormantGain(3),
        ParamId::FormantMix,
        ParamId::AmpAttack,
        ParamId::AmpDecay,
        ParamId::AmpSustain,
        ParamId::AmpRelease,
        ParamId::OutputGain,
    ];

    /// Resolves a parameter name, including the short names older presets use
    /// (`f1`..`f4`, `amp-attack`, `filterMix`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let id = match name {
            "pitch" => Self::Pitch,
            "jitter" => Self::Jitter,
            "shimmer" => Self::Shimmer,
            "breathiness" => Self::Breathiness,
            "noiseColor" => Self::NoiseColor,
            "noiseQ" => Self::NoiseQ,
            "formantMix" | "filterMix" => Self::FormantMix,
            "ampAttack" | "amp-attack" => Self::AmpAttack,
            "ampDecay" | "amp-decay" => Self::AmpDecay,
            "ampSustain" | "amp-sustain" => Self::AmpSustain,
            "ampRelease" | "amp-release" => Self::AmpRelease,
            "outputGain" => Self::OutputGain,
            "f1" => Self::FormantFrequency(0),
            "f2" => Self::FormantFrequency(1),
            "f3" => Self::FormantFrequency(2),
            "f4" => Self::FormantFrequency(3),
            other => {
                let position =
                    |names: &[&str; FORMANT_COUNT]| names.iter().position(|n| *n == other);
                if let Some(i) = position(&FORMANT_FREQUENCY_NAMES) {
                    Self::FormantFrequency(i)
                } else if let Some(i) = position(&FORMANT_BANDWIDTH_NAMES) {
                    Self::FormantBandwidth(i)
                } else if let Some(i) = position(&FORMANT_GAIN_NAMES) {
                    Self::FormantGain(i)
                } else {
                    return None;
                }
            }
        };
        Some(id)
    }

    /// Canonical name, the one `from_name` round-trips.
    pub fn name(self) -> &'static str {
        match self {
            Self::Pitch => "pitch",
            Self::Jitter => "jitter",
            Self::Shimmer => "shimmer",
            Self::Breathiness => "breathiness",
            Self::NoiseColor => "noiseColor",
            Self::NoiseQ => "noiseQ",
            Self::FormantFrequency(i) => FORMANT_FREQUENCY_NAMES
                .get(i)
                .copied()
                .unwrap_or("formantFrequency?"),
            Self::FormantBandwidth(i) => FORMANT_BANDWIDTH_NAMES
                .get(i)
                .copied()
                .unwrap_or("formantBandwidth?"),
            Self::FormantGain(i) => FORMANT_GAIN_NAMES.get(i).copied().unwrap_or("formantGain?"),
            Self::FormantMix => "formantMix",
            Self::AmpAttack => "ampAttack",
            Self::AmpDecay => "ampDecay",
            Self::AmpSustain => "ampSustain",
            Self::AmpRelease => "ampRelease",
            Self::OutputGain => "outputGain",
        }
    }

    /// False for formant ids built by hand with an index past the fourth stage.
    pub fn is_valid(self) -> bool {
        match self {
            Self::FormantFrequency(i) | Self::FormantBandwidth(i) | Self::FormantGain(i) => {
                i < FORMANT_COUNT
            }
            _ => true,
        }
    }

    pub fn target(self) -> ParamTarget {
        match self {
            Self::Pitch | Self::Jitter | Self::Shimmer => ParamTarget::Glottal,
            Self::Breathiness => ParamTarget::NoiseLevel,
            Self::NoiseColor | Self::NoiseQ => ParamTarget::NoiseFilter,
            Self::FormantFrequency(_) | Self::FormantBandwidth(_) => ParamTarget::FormantFilter,
            Self::FormantGain(_) | Self::FormantMix => ParamTarget::FormantMixer,
            Self::AmpAttack | Self::AmpDecay | Self::AmpSustain | Self::AmpRelease => {
                ParamTarget::Envelope
            }
            Self::OutputGain => ParamTarget::Output,
        }
    }

    /// Inclusive range a value is clamped into at the given sample rate.
    pub fn range(self, sample_rate: f32) -> (f32, f32) {
        let nyquist_limit = sample_rate * NYQUIST_MARGIN;
        match self {
            Self::Pitch => (f32::MIN_POSITIVE, MAX_PITCH.min(nyquist_limit)),
            Self::NoiseColor | Self::FormantFrequency(_) => {
                (MIN_CENTER_FREQUENCY.min(nyquist_limit), nyquist_limit)
            }
            Self::NoiseQ => (MIN_NOISE_Q, MAX_NOISE_Q),
            Self::FormantBandwidth(_) => (MIN_BANDWIDTH_OCTAVES, MAX_BANDWIDTH_OCTAVES),
            Self::AmpAttack | Self::AmpDecay | Self::AmpRelease => (0.0, MAX_ENVELOPE_SECONDS),
            Self::Jitter
            | Self::Shimmer
            | Self::Breathiness
            | Self::FormantGain(_)
            | Self::FormantMix
            | Self::AmpSustain
            | Self::OutputGain => (0.0, 1.0),
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One complete, self-consistent set of parameter values.
///
/// Cheap to copy: the control side hands whole snapshots to the renderer
/// instead of individual edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParameters {
    pub pitch: f32,
    pub jitter: f32,
    pub shimmer: f32,
    pub breathiness: f32,
    pub noise_color: f32,
    pub noise_q: f32,
    pub formant_frequencies: [f32; FORMANT_COUNT],
    /// Octaves.
    pub formant_bandwidths: [f32; FORMANT_COUNT],
    pub formant_gains: [f32; FORMANT_COUNT],
    pub formant_mix: f32,
    pub amp_attack: f32,
    pub amp_decay: f32,
    pub amp_sustain: f32,
    pub amp_release: f32,
    pub output_gain: f32,
}

impl SynthesisParameters {
    pub fn get(&self, id: ParamId) -> f32 {
        match id {
            ParamId::Pitch => self.pitch,
            ParamId::Jitter => self.jitter,
            ParamId::Shimmer => self.shimmer,
            ParamId::Breathiness => self.breathiness,
            ParamId::NoiseColor => self.noise_color,
            ParamId::NoiseQ => self.noise_q,
            ParamId::FormantFrequency(i) => {
                self.formant_frequencies.get(i).copied().unwrap_or(0.0)
            }
            ParamId::FormantBandwidth(i) => {
                self.formant_bandwidths.get(i).copied().unwrap_or(0.0)
            }
            ParamId::FormantGain(i) => self.formant_gains.get(i).copied().unwrap_or(0.0),
            ParamId::FormantMix => self.formant_mix,
            ParamId::AmpAttack => self.amp_attack,
            ParamId::AmpDecay => self.amp_decay,
            ParamId::AmpSustain => self.amp_sustain,
            ParamId::AmpRelease => self.amp_release,
            ParamId::OutputGain => self.output_gain,
        }
    }

    // Callers validate first; an out of range formant index is ignored.
    fn write(&mut self, id: ParamId, value: f32) {
        let slot = match id {
            ParamId::Pitch => &mut self.pitch,
            ParamId::Jitter => &mut self.jitter,
            ParamId::Shimmer => &mut self.shimmer,
            ParamId::Breathiness => &mut self.breathiness,
            ParamId::NoiseColor => &mut self.noise_color,
            ParamId::NoiseQ => &mut self.noise_q,
            ParamId::FormantFrequency(i) => match self.formant_frequencies.get_mut(i) {
                Some(slot) => slot,
                None => return,
            },
            ParamId::FormantBandwidth(i) => match self.formant_bandwidths.get_mut(i) {
                Some(slot) => slot,
                None => return,
            },
            ParamId::FormantGain(i) => match self.formant_gains.get_mut(i) {
                Some(slot) => slot,
                None => return,
            },
            ParamId::FormantMix => &mut self.formant_mix,
            ParamId::AmpAttack => &mut self.amp_attack,
            ParamId::AmpDecay => &mut self.amp_decay,
            ParamId::AmpSustain => &mut self.amp_sustain,
            ParamId::AmpRelease => &mut self.amp_release,
            ParamId::OutputGain => &mut self.output_gain,
        };
        *slot = value;
    }
}

impl Default for SynthesisParameters {
    fn default() -> Self {
        Self {
            pitch: 220.0,
            jitter: 0.05,
            shimmer: 0.1,
            breathiness: 0.2,
            noise_color: 1000.0,
            noise_q: 1.0,
            formant_frequencies: [800.0, 1200.0, 2500.0, 3500.0],
            // Roughly Q 10, 8, 6 and 4.
            formant_bandwidths: [0.2, 0.25, 0.33, 0.5],
            formant_gains: [0.25; FORMANT_COUNT],
            formant_mix: 0.5,
            amp_attack: 0.01,
            amp_decay: 0.1,
            amp_sustain: 0.5,
            amp_release: 0.2,
            output_gain: 0.5,
        }
    }
}

/// Outcome of a successful set: what was asked for and what was stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub param: ParamId,
    pub requested: f32,
    pub applied: f32,
}

impl ParamChange {
    pub fn was_clamped(&self) -> bool {
        self.requested != self.applied
    }

    /// The advisory `OutOfRangeValue` for a clamped request.
    pub fn warning(&self) -> Option<SynthError> {
        self.was_clamped().then_some(SynthError::OutOfRangeValue {
            param: self.param,
            requested: self.requested,
            applied: self.applied,
        })
    }
}

/// Sole owner of the current parameter values.
#[derive(Debug, Clone)]
pub struct ParameterStore {
    values: SynthesisParameters,
    sample_rate: f32,
}

impl ParameterStore {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            values: SynthesisParameters::default(),
            sample_rate,
        }
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.values.get(id)
    }

    pub fn values(&self) -> &SynthesisParameters {
        &self.values
    }

    pub fn snapshot(&self) -> SynthesisParameters {
        self.values
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Switches the rate used for frequency limits and re-clamps anything that
    /// no longer fits below Nyquist.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for id in ParamId::ALL {
            let (min, max) = id.range(sample_rate);
            let current = self.values.get(id);
            let clamped = current.clamp(min, max);
            if clamped != current {
                self.values.write(id, clamped);
            }
        }
    }

    /// The single entry point for mutating a parameter.
    ///
    /// Out of range values are clamped and reported through the returned
    /// [`ParamChange`]; a non-positive pitch or a non-finite value is refused
    /// and the stored value is left alone.
    pub fn set(&mut self, id: ParamId, value: f32) -> SynthResult<ParamChange> {
        if !id.is_valid() {
            return Err(SynthError::InvalidParameter {
                name: format!("{id:?}"),
            });
        }
        if id == ParamId::Pitch && !(value > 0.0 && value.is_finite()) {
            return Err(SynthError::InvalidPitch { requested: value });
        }
        if !value.is_finite() {
            return Err(SynthError::NonFiniteValue { param: id });
        }

        let (min, max) = id.range(self.sample_rate);
        let applied = value.clamp(min, max);
        self.values.write(id, applied);
        Ok(ParamChange {
            param: id,
            requested: value,
            applied,
        })
    }

    pub fn set_by_name(&mut self, name: &str, value: f32) -> SynthResult<ParamChange> {
        let id = ParamId::from_name(name).ok_or_else(|| SynthError::InvalidParameter {
            name: name.to_string(),
        })?;
        self.set(id, value)
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(44_100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_name_resolves_to_itself() {
        for id in ParamId::ALL {
            assert_eq!(ParamId::from_name(id.name()), Some(id));
        }
    }

    #[test]
    fn legacy_aliases() {
        assert_eq!(ParamId::from_name("f3"), Some(ParamId::FormantFrequency(2)));
        assert_eq!(ParamId::from_name("amp-release"), Some(ParamId::AmpRelease));
        assert_eq!(ParamId::from_name("filterMix"), Some(ParamId::FormantMix));
        assert_eq!(ParamId::from_name("formantBandwidth5"), None);
    }

    #[test]
    fn defaults_are_inside_their_ranges() {
        let params = SynthesisParameters::default();
        for id in ParamId::ALL {
            let (min, max) = id.range(44_100.0);
            let value = params.get(id);
            assert!(value >= min && value <= max, "{id} = {value}");
        }
    }

    #[test]
    fn sample_rate_change_reclamps_frequencies() {
        let mut store = ParameterStore::new(44_100.0);
        store.set(ParamId::FormantFrequency(3), 6000.0).unwrap();
        store.set_sample_rate(8000.0);
        assert!(store.get(ParamId::FormantFrequency(3)) < 4000.0);
    }

    #[test]
    fn hand_built_index_past_the_bank_is_rejected() {
        let mut store = ParameterStore::default();
        let err = store.set(ParamId::FormantGain(7), 0.5).unwrap_err();
        assert!(matches!(err, SynthError::InvalidParameter { .. }));
    }
}
