use super::envelope::Ramp;
use super::filter::{BiquadCoeffs, Filter, SmoothedBiquad};
use super::params::{MAX_NOISE_Q, MIN_NOISE_Q};
use super::prelude::{random_range, seeded_rng, NOISE_STREAM};

/// Breath noise: a looped table of uniform white noise through one band-pass.
///
/// The table never stops playing; notes only open and close a gate in front
/// of it, and breathiness sets a sustained level on top. The output is
/// `bandpass(table) * level * gate`.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    table: Vec<f32>,
    index: usize,
    filter: SmoothedBiquad,
    sample_rate: f32,
    color: f32,
    q: f32,
    level: f32,
    gate: Ramp,
}

impl NoiseSource {
    /// `table_len` uniform samples in `[-1, 1]` drawn from the noise stream
    /// of `seed`. The gate ramp and coefficient fade are given in samples.
    pub fn new(
        sample_rate: f32,
        table_len: usize,
        seed: u64,
        gate_len: u32,
        fade_len: u32,
    ) -> Self {
        let mut rng = seeded_rng(seed, NOISE_STREAM);
        let table = (0..table_len.max(1))
            .map(|_| random_range(&mut rng, -1.0, 1.0))
            .collect();
        let color = 1000.0;
        let q = 1.0;
        Self {
            table,
            index: 0,
            filter: SmoothedBiquad::new(BiquadCoeffs::bandpass(color, q, sample_rate), fade_len),
            sample_rate,
            color,
            q,
            level: 0.0,
            gate: Ramp::new(gate_len),
        }
    }

    pub fn table(&self) -> &[f32] {
        &self.table
    }

    /// Moves the band-pass centre. Coefficients are rebuilt here, so the
    /// render path uses [`set_coefficients`](Self::set_coefficients) instead.
    pub fn set_color(&mut self, frequency: f32) {
        if frequency.is_finite() && frequency > 0.0 {
            self.color = frequency;
            self.rebuild();
        }
    }

    /// Resonance of the band-pass, clamped to `[0.1, 50]`.
    pub fn set_q(&mut self, q: f32) {
        if q.is_finite() {
            self.q = q.clamp(MIN_NOISE_Q, MAX_NOISE_Q);
            self.rebuild();
        }
    }

    pub fn set_coefficients(&mut self, coeffs: BiquadCoeffs) {
        self.filter.set_coeffs(coeffs);
    }

    /// Same as [`set_coefficients`](Self::set_coefficients), also recording
    /// the centre and Q the coefficients were built from.
    pub fn retune(&mut self, color: f32, q: f32, coeffs: BiquadCoeffs) {
        self.color = color;
        self.q = q;
        self.filter.set_coeffs(coeffs);
    }

    pub fn coefficients(&self) -> BiquadCoeffs {
        self.filter.coeffs()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.rebuild();
    }

    pub fn set_fade_len(&mut self, fade_len: u32) {
        self.filter.set_fade_len(fade_len);
    }

    pub fn set_gate_len(&mut self, gate_len: u32) {
        self.gate.set_len(gate_len);
    }

    /// Sustained breathiness level, clamped to `[0, 1]`.
    pub fn set_level(&mut self, level: f32) {
        self.level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Opens the gate to `velocity` over the gate ramp.
    pub fn note_on(&mut self, velocity: f32) {
        self.gate.set_target(velocity.clamp(0.0, 1.0));
    }

    /// Closes the gate over the gate ramp.
    pub fn note_off(&mut self) {
        self.gate.set_target(0.0);
    }

    pub fn gate(&self) -> f32 {
        self.gate.value()
    }

    pub fn next_sample(&mut self) -> f32 {
        let raw = self.table[self.index];
        self.index += 1;
        if self.index == self.table.len() {
            self.index = 0;
        }
        // Filter state advances even while the gate is shut.
        let shaped = self.filter.process(raw);
        shaped * self.level * self.gate.next()
    }

    fn rebuild(&mut self) {
        self.filter
            .set_coeffs(BiquadCoeffs::bandpass(self.color, self.q, self.sample_rate));
    }
}
