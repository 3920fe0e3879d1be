use super::error::{SynthError, SynthResult};
use serde::{Deserialize, Serialize};

/// Minimum length of the noise gate ramp; shorter gates click audibly.
pub const MIN_NOISE_RAMP_SECONDS: f32 = 0.01;

/// Engine-wide settings fixed at construction time.
///
/// Every field has a default, so a JSON document only needs the keys it overrides:
///
/// ```
/// use rustvocalsynth::synth::SynthConfig;
/// let config = SynthConfig::from_json(r#"{ "sample_rate": 48000, "seed": 7 }"#).unwrap();
/// assert_eq!(config.sample_rate, 48000);
/// assert_eq!(config.max_notes, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Rate the coefficients are built for until a block asks for another one.
    pub sample_rate: u32,
    /// Seed for jitter, shimmer and the noise table.
    pub seed: u64,
    /// Overlapping notes held at once before the oldest is stolen.
    pub max_notes: usize,
    /// Anti-click fade used when a voice is cut and as the per-note slew limit.
    pub safety_ramp_seconds: f32,
    /// Breath noise gate ramp.
    pub noise_ramp_seconds: f32,
    /// Crossfade between an old and a new set of filter coefficients.
    pub coefficient_fade_seconds: f32,
    /// Length of the looped uniform noise table.
    pub noise_buffer_len: usize,
    /// Per-note gain below which a released voice is retired.
    pub silence_threshold: f32,
    /// Capacity of the render to control report channel.
    pub report_capacity: usize,
    /// Report blocks that take longer than their own playback time.
    pub detect_underruns: bool,
}

impl SynthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> SynthResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SynthError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SynthResult<()> {
        if self.sample_rate == 0 {
            return Err(SynthError::InvalidSampleRate(self.sample_rate));
        }
        if self.max_notes == 0 {
            return Err(SynthError::InvalidConfig("max_notes must be at least 1".into()));
        }
        if self.noise_buffer_len == 0 {
            return Err(SynthError::InvalidConfig(
                "noise_buffer_len must be at least 1".into(),
            ));
        }
        let times = [
            ("safety_ramp_seconds", self.safety_ramp_seconds),
            ("noise_ramp_seconds", self.noise_ramp_seconds),
            ("coefficient_fade_seconds", self.coefficient_fade_seconds),
        ];
        for (name, seconds) in times {
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(SynthError::InvalidConfig(format!(
                    "{name} must be a positive number of seconds"
                )));
            }
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(SynthError::InvalidConfig(
                "silence_threshold must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Gate ramp actually used by the noise source.
    pub fn noise_ramp(&self) -> f32 {
        self.noise_ramp_seconds.max(MIN_NOISE_RAMP_SECONDS)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            seed: 0x5EED,
            max_notes: 8,
            safety_ramp_seconds: 0.01,
            noise_ramp_seconds: 0.01,
            coefficient_fade_seconds: 0.005,
            noise_buffer_len: 4096,
            silence_threshold: 1e-4,
            report_capacity: 64,
            detect_underruns: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SynthConfig::from_json(r#"{ "max_notes": 2 }"#).unwrap();
        assert_eq!(config.max_notes, 2);
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.noise_buffer_len, 4096);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = SynthConfig::from_json(r#"{ "sample_rate": 0 }"#).unwrap_err();
        assert_eq!(err, SynthError::InvalidSampleRate(0));
    }

    #[test]
    fn noise_ramp_has_a_floor() {
        let config = SynthConfig {
            noise_ramp_seconds: 0.001,
            ..SynthConfig::default()
        };
        assert_eq!(config.noise_ramp(), MIN_NOISE_RAMP_SECONDS);
    }
}
