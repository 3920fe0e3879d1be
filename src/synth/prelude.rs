// Shared constants and the seeded random source used by the DSP units.

pub use core::f32::consts::{PI, SQRT_2};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Every random draw in the render path comes from one of these, so a fixed
/// seed plus a fixed event history always renders the same samples.
pub type SynthRng = SmallRng;

/// Stream tags used to derive independent generators from the one configured seed.
pub const GLOTTAL_STREAM: u64 = 1;
pub const NOISE_STREAM: u64 = 2;

pub fn seeded_rng(seed: u64, stream: u64) -> SynthRng {
    SmallRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

pub fn random_range(rng: &mut SynthRng, min: f32, max: f32) -> f32 {
    if max <= min {
        return min;
    }
    rng.random_range(min..max)
}

/// Uniform draw in `[-amount, amount]`, zero when `amount` is not positive.
pub fn random_symmetric(rng: &mut SynthRng, amount: f32) -> f32 {
    if amount <= 0.0 {
        0.0
    } else {
        rng.random_range(-amount..=amount)
    }
}

/// Converts a duration to a whole number of frames, never less than one.
pub fn seconds_to_frames(seconds: f32, sample_rate: f32) -> u32 {
    (seconds * sample_rate).round().max(1.0) as u32
}
