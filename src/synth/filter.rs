use crate::synth::params::{MIN_BANDWIDTH_OCTAVES, NYQUIST_MARGIN};
use crate::synth::prelude::{PI, SQRT_2};

pub trait Filter {
    fn process(&mut self, input: f32) -> f32;
}

/// Converts a bandwidth in octaves to a resonator Q.
///
/// `Q = sqrt(2) / (2^(bw/2) - 2^(-bw/2))`. This is the only conversion used
/// anywhere in the crate. The denominator vanishes at `bw = 0`, so the
/// bandwidth is floored before converting.
pub fn bandwidth_to_q(octaves: f32) -> f32 {
    let half = 0.5 * octaves.max(MIN_BANDWIDTH_OCTAVES);
    SQRT_2 / (2f32.powf(half) - 2f32.powf(-half))
}

/// Normalised biquad coefficients (a0 already divided out).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Passes the input through unchanged.
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Band-pass with 0 dB peak gain at `center` (RBJ Audio EQ Cookbook).
    pub fn bandpass(center: f32, q: f32, sample_rate: f32) -> Self {
        // Keep the centre strictly below Nyquist and Q positive.
        let sample_rate = sample_rate.max(1.0);
        let center = center.clamp(1.0, sample_rate * NYQUIST_MARGIN);
        let q = if q.is_finite() { q.max(1e-3) } else { 1.0 };

        let omega = 2.0 * PI * center / sample_rate;
        let cos_omega = omega.cos();
        let sin_omega = omega.sin();
        let alpha = sin_omega / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: alpha / a0,
            b1: 0.0,
            b2: -alpha / a0,
            a1: -2.0 * cos_omega / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Same as [`bandpass`](Self::bandpass) with the width given in octaves.
    pub fn bandpass_octaves(center: f32, octaves: f32, sample_rate: f32) -> Self {
        Self::bandpass(center, bandwidth_to_q(octaves), sample_rate)
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Single biquad section, Direct Form I.
#[derive(Clone, Copy, Debug, Default)]
pub struct Biquad {
    coeffs: BiquadCoeffs,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            ..Default::default()
        }
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    /// Swaps coefficients and keeps the delay taps.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }
}

impl Filter for Biquad {
    fn process(&mut self, input: f32) -> f32 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}

/// A biquad whose coefficient changes are crossfaded instead of switched.
///
/// On an update the outgoing section keeps running next to a copy carrying the
/// new coefficients and the same history, and the output fades from one to the
/// other with the same cubic ease the output gain uses. At most one fade is in
/// flight; a newer update restarts it from the section currently in charge.
#[derive(Clone, Copy, Debug)]
pub struct SmoothedBiquad {
    current: Biquad,
    previous: Option<Biquad>,
    fade_pos: u32,
    fade_len: u32,
}

impl SmoothedBiquad {
    pub fn new(coeffs: BiquadCoeffs, fade_len: u32) -> Self {
        Self {
            current: Biquad::new(coeffs),
            previous: None,
            fade_pos: 0,
            fade_len: fade_len.max(1),
        }
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.current.coeffs()
    }

    pub fn is_fading(&self) -> bool {
        self.previous.is_some()
    }

    pub fn set_fade_len(&mut self, fade_len: u32) {
        self.fade_len = fade_len.max(1);
    }

    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        if coeffs == self.current.coeffs() {
            return;
        }
        self.previous = Some(self.current);
        self.current.set_coeffs(coeffs);
        self.fade_pos = 0;
    }
}

impl Filter for SmoothedBiquad {
    fn process(&mut self, input: f32) -> f32 {
        let next = self.current.process(input);
        let Some(previous) = self.previous.as_mut() else {
            return next;
        };

        let outgoing = previous.process(input);
        self.fade_pos += 1;
        let t = self.fade_pos as f32 / self.fade_len as f32;
        if t >= 1.0 {
            self.previous = None;
            return next;
        }
        let smooth_t = t * t * (3.0 - 2.0 * t);
        outgoing.mul_add(1.0 - smooth_t, next * smooth_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_input() {
        let mut biquad = Biquad::new(BiquadCoeffs::IDENTITY);
        for x in [0.5, -0.25, 1.0, 0.0] {
            assert_eq!(biquad.process(x), x);
        }
    }

    #[test]
    fn fade_finishes_on_the_new_coefficients() {
        let old = BiquadCoeffs::bandpass(650.0, 8.0, 44_100.0);
        let new = BiquadCoeffs::bandpass(800.0, 8.0, 44_100.0);
        let mut smoothed = SmoothedBiquad::new(old, 32);
        let mut reference = Biquad::new(old);
        for i in 0..64 {
            let x = (i as f32 * 0.3).sin();
            smoothed.process(x);
            reference.process(x);
        }
        smoothed.set_coeffs(new);
        reference.set_coeffs(new);
        for i in 64..200 {
            let x = (i as f32 * 0.3).sin();
            let a = smoothed.process(x);
            let b = reference.process(x);
            if i >= 64 + 32 {
                assert!(!smoothed.is_fading());
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn unchanged_coefficients_do_not_start_a_fade() {
        let coeffs = BiquadCoeffs::bandpass(1000.0, 1.0, 44_100.0);
        let mut smoothed = SmoothedBiquad::new(coeffs, 16);
        smoothed.set_coeffs(coeffs);
        assert!(!smoothed.is_fading());
    }
}
