//! Parallel formant resonators.
//!
//! Four band-pass stages see the same input sample. Their weighted sum is the
//! wet signal, blended with the untouched input:
//! `out = input * (1 - mix) + wet * mix`.

use super::filter::{BiquadCoeffs, Filter, SmoothedBiquad};
use super::params::{SynthesisParameters, FORMANT_COUNT};

/// One finished coefficient set per stage, built off the render path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormantCoefficients {
    pub stages: [BiquadCoeffs; FORMANT_COUNT],
}

impl FormantCoefficients {
    /// Bandwidths are in octaves and go through the one bandwidth to Q
    /// conversion in [`bandwidth_to_q`](super::filter::bandwidth_to_q).
    pub fn compute(
        frequencies: &[f32; FORMANT_COUNT],
        bandwidths: &[f32; FORMANT_COUNT],
        sample_rate: f32,
    ) -> Self {
        Self {
            stages: std::array::from_fn(|i| {
                BiquadCoeffs::bandpass_octaves(frequencies[i], bandwidths[i], sample_rate)
            }),
        }
    }

    pub fn from_params(params: &SynthesisParameters, sample_rate: f32) -> Self {
        Self::compute(
            &params.formant_frequencies,
            &params.formant_bandwidths,
            sample_rate,
        )
    }
}

#[derive(Debug, Clone)]
pub struct FormantBank {
    stages: [SmoothedBiquad; FORMANT_COUNT],
    frequencies: [f32; FORMANT_COUNT],
    bandwidths: [f32; FORMANT_COUNT],
    gains: [f32; FORMANT_COUNT],
    mix: f32,
    sample_rate: f32,
}

impl FormantBank {
    /// Starts from the default formants, bandwidths, gains and mix.
    /// `fade_len` is the coefficient crossfade in samples.
    pub fn new(sample_rate: f32, fade_len: u32) -> Self {
        let defaults = SynthesisParameters::default();
        let coeffs = FormantCoefficients::from_params(&defaults, sample_rate);
        Self {
            stages: coeffs.stages.map(|c| SmoothedBiquad::new(c, fade_len)),
            frequencies: defaults.formant_frequencies,
            bandwidths: defaults.formant_bandwidths,
            gains: defaults.formant_gains,
            mix: defaults.formant_mix,
            sample_rate,
        }
    }

    pub fn set_formants(&mut self, frequencies: [f32; FORMANT_COUNT]) {
        self.frequencies = frequencies;
        self.rebuild();
    }

    /// Widths in octaves.
    pub fn set_bandwidths(&mut self, bandwidths: [f32; FORMANT_COUNT]) {
        self.bandwidths = bandwidths;
        self.rebuild();
    }

    pub fn set_gains(&mut self, gains: [f32; FORMANT_COUNT]) {
        self.gains = gains.map(|g| {
            if g.is_finite() {
                g.clamp(0.0, 1.0)
            } else {
                0.0
            }
        });
    }

    /// Wet level; the dry path gets `1 - mix`.
    pub fn set_mix(&mut self, mix: f32) {
        if mix.is_finite() {
            self.mix = mix.clamp(0.0, 1.0);
        }
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    pub fn gains(&self) -> [f32; FORMANT_COUNT] {
        self.gains
    }

    /// Installs precomputed coefficients; each stage crossfades to its new set.
    pub fn set_coefficients(&mut self, coeffs: &FormantCoefficients) {
        for (stage, c) in self.stages.iter_mut().zip(coeffs.stages) {
            stage.set_coeffs(c);
        }
    }

    /// Takes a new tuning along with the coefficients already built for it,
    /// so later edits and rate changes start from that tuning.
    pub fn retune(
        &mut self,
        frequencies: [f32; FORMANT_COUNT],
        bandwidths: [f32; FORMANT_COUNT],
        coeffs: &FormantCoefficients,
    ) {
        self.frequencies = frequencies;
        self.bandwidths = bandwidths;
        self.set_coefficients(coeffs);
    }

    pub fn coefficients(&self) -> FormantCoefficients {
        FormantCoefficients {
            stages: std::array::from_fn(|i| self.stages[i].coeffs()),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.rebuild();
    }

    pub fn set_fade_len(&mut self, fade_len: u32) {
        for stage in self.stages.iter_mut() {
            stage.set_fade_len(fade_len);
        }
    }

    fn rebuild(&mut self) {
        let coeffs =
            FormantCoefficients::compute(&self.frequencies, &self.bandwidths, self.sample_rate);
        self.set_coefficients(&coeffs);
    }
}

impl Filter for FormantBank {
    fn process(&mut self, input: f32) -> f32 {
        let mut wet = 0.0;
        for (stage, gain) in self.stages.iter_mut().zip(self.gains) {
            wet += stage.process(input) * gain;
        }
        input * (1.0 - self.mix) + wet * self.mix
    }
}
