use super::envelope::SlewLimiter;
use super::error::{SynthError, SynthResult};
use super::prelude::{random_symmetric, seeded_rng, SynthRng, GLOTTAL_STREAM};

/// Fraction of each cycle spent in the parabolic return phase.
pub const DEFAULT_RETURN_FRACTION: f32 = 0.8;

/// Value of the simplified glottal pulse `t` into a cycle of length `period`.
///
/// The cycle is split at `te = period * (1 - rd)`: before it the flow closes
/// exponentially, `exp(-3 t / te)`, after it a parabolic return phase
/// `1 - ((t - te) / (period - te))^2` takes over. Each phase starts at 1.
/// `t` and `period` may be in any unit as long as they agree.
pub fn pulse_value(t: f32, period: f32, rd: f32) -> f32 {
    let te = period * (1.0 - rd);
    let value = if t < te {
        (-3.0 * t / te).exp()
    } else if period > te {
        let x = (t - te) / (period - te);
        1.0 - x * x
    } else {
        1.0
    };
    value.clamp(0.0, 1.0)
}

/// Per-note voicing: the shimmer-scaled amplitude and the slew-limited gain
/// that actually reaches the output.
///
/// The gain follows `amplitude * envelope` but can never move faster than a
/// full-scale swing per safety window, so no request can make it jump.
#[derive(Debug, Clone, Copy)]
pub struct Voicing {
    amplitude: f32,
    gain: SlewLimiter,
    cut: bool,
}

impl Voicing {
    pub fn new(amplitude: f32, safety_len: u32) -> Self {
        Self {
            amplitude: amplitude.clamp(0.0, 1.0),
            gain: SlewLimiter::new(safety_len),
            cut: false,
        }
    }

    /// Continues from another voicing's current gain, for retriggers.
    pub fn continuing_from(mut self, gain: f32) -> Self {
        self.gain.reset(gain);
        self
    }

    /// `velocity * shimmer factor`, capped at 1.
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn gain(&self) -> f32 {
        self.gain.value()
    }

    pub fn is_cut(&self) -> bool {
        self.cut
    }

    /// Advances the gain one sample towards `amplitude * envelope`, or towards
    /// zero once the voicing has been cut.
    pub fn follow(&mut self, envelope: f32) -> f32 {
        let target = if self.cut {
            0.0
        } else {
            self.amplitude * envelope
        };
        self.gain.follow(target)
    }

    pub fn is_silent(&self, threshold: f32) -> bool {
        self.gain.value() <= threshold
    }
}

/// Voiced excitation: a train of simplified Liljencrants-Fant pulses with
/// cycle-local jitter.
///
/// Pitch changes are latched and only take effect when the next cycle starts,
/// so a cycle is never cut short. The cycle length is kept fractional and the
/// remainder carried over, which keeps the long-term rate exact.
#[derive(Debug, Clone)]
pub struct GlottalSource {
    sample_rate: f32,
    frequency: f32,
    pending_frequency: Option<f32>,
    jitter: f32,
    shimmer: f32,
    safety_len: u32,
    cycle_len: f32,   // samples in the current cycle
    position: f32,    // samples into the current cycle
    cycles: u64,
    rng: SynthRng,
}

impl GlottalSource {
    pub fn new(sample_rate: f32, seed: u64) -> Self {
        let mut source = Self {
            sample_rate: sample_rate.max(1.0),
            frequency: 220.0,
            pending_frequency: None,
            jitter: 0.0,
            shimmer: 0.0,
            safety_len: (0.01 * sample_rate).round().max(1.0) as u32,
            cycle_len: 1.0,
            position: 0.0,
            cycles: 0,
            rng: seeded_rng(seed, GLOTTAL_STREAM),
        };
        source.begin_cycle();
        source
    }

    pub fn frequency(&self) -> f32 {
        self.pending_frequency.unwrap_or(self.frequency)
    }

    /// Latches a new fundamental for the next cycle.
    pub fn set_pitch(&mut self, frequency: f32) -> SynthResult<()> {
        if !(frequency > 0.0 && frequency.is_finite()) {
            return Err(SynthError::InvalidPitch {
                requested: frequency,
            });
        }
        self.pending_frequency = Some(frequency);
        Ok(())
    }

    pub fn set_jitter(&mut self, amount: f32) {
        self.jitter = clamp_unit(amount);
    }

    pub fn set_shimmer(&mut self, amount: f32) {
        self.shimmer = clamp_unit(amount);
    }

    /// Length of the anti-click window used by [`Voicing`].
    pub fn set_safety_len(&mut self, samples: u32) {
        self.safety_len = samples.max(1);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let sample_rate = sample_rate.max(1.0);
        let ratio = sample_rate / self.sample_rate;
        self.cycle_len = (self.cycle_len * ratio).max(1.0);
        self.position *= ratio;
        self.safety_len = ((self.safety_len as f32) * ratio).round().max(1.0) as u32;
        self.sample_rate = sample_rate;
    }

    /// Cycles started since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Length in samples of the cycle currently playing.
    pub fn cycle_len(&self) -> f32 {
        self.cycle_len
    }

    /// Starts voicing a note.
    ///
    /// Draws the note's shimmer factor `1 + U(-shimmer, shimmer)` once, so
    /// shimmer varies loudness from note to note rather than per sample. A
    /// frequency override retunes the source from the next cycle.
    pub fn note_on(&mut self, velocity: f32, frequency: Option<f32>) -> Voicing {
        if let Some(frequency) = frequency {
            // Overrides are validated by the caller; a bad one keeps the current pitch.
            let _ = self.set_pitch(frequency);
        }
        let factor = 1.0 + random_symmetric(&mut self.rng, self.shimmer);
        let amplitude = (clamp_unit(velocity) * factor).min(1.0);
        Voicing::new(amplitude, self.safety_len)
    }

    /// Fades the note's voicing to zero over the safety window, whatever
    /// its envelope is doing.
    pub fn note_off(&self, voicing: &mut Voicing) {
        voicing.cut = true;
    }

    pub fn next_sample(&mut self) -> f32 {
        let value = pulse_value(self.position, self.cycle_len, DEFAULT_RETURN_FRACTION);
        self.position += 1.0;
        if self.position >= self.cycle_len {
            self.position -= self.cycle_len;
            self.begin_cycle();
        }
        value
    }

    fn begin_cycle(&mut self) {
        if let Some(frequency) = self.pending_frequency.take() {
            self.frequency = frequency;
        }
        // Perturb this cycle only; the next one starts from the nominal period again.
        let perturbation = random_symmetric(&mut self.rng, self.jitter);
        self.cycle_len = (self.sample_rate / self.frequency * (1.0 + perturbation)).max(1.0);
        self.cycles += 1;
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
