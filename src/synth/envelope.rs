use super::params::MAX_ENVELOPE_SECONDS;

/// Linear ADSR shape evaluated from a note's own clock.
///
/// The generator holds no per-note state: every note keeps its elapsed time
/// and release point and asks for the value at that time, so overlapping
/// notes cannot disturb each other's release ramps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeGenerator {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times are clamped to `[0, 10]` seconds and sustain to `[0, 1]`;
    /// anything non-finite falls back to zero.
    pub fn set_adsr(&mut self, attack: f32, decay: f32, sustain: f32, release: f32) {
        let time = |t: f32| {
            if t.is_finite() {
                t.clamp(0.0, MAX_ENVELOPE_SECONDS)
            } else {
                0.0
            }
        };
        self.attack = time(attack);
        self.decay = time(decay);
        self.sustain = if sustain.is_finite() { sustain.clamp(0.0, 1.0) } else { 0.0 };
        self.release = time(release);
    }

    /// Attack, decay and sustain only, as if the note were held forever.
    fn held_value(&self, elapsed: f32) -> f32 {
        if elapsed <= 0.0 {
            0.0
        } else if elapsed <= self.attack {
            elapsed / self.attack
        } else if elapsed < self.attack + self.decay {
            let decay_progress = (elapsed - self.attack) / self.decay;
            1.0 - decay_progress * (1.0 - self.sustain)
        } else {
            self.sustain
        }
    }

    /// When the release ramp starts, if it starts at all.
    ///
    /// A duration hint schedules the release at `duration - release` so the
    /// tail ends with the note, but never before the attack has run (capped at
    /// the duration itself). An explicit note-off wins when it comes earlier.
    pub fn release_start(
        &self,
        note_duration: Option<f32>,
        released_at: Option<f32>,
    ) -> Option<f32> {
        let scheduled = note_duration.filter(|d| d.is_finite()).map(|d| {
            let d = d.max(0.0);
            (d - self.release).max(self.attack.min(d))
        });
        match (scheduled, released_at.map(|r| r.max(0.0))) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Envelope value `elapsed` seconds after note-on.
    pub fn value_at(
        &self,
        elapsed: f32,
        note_duration: Option<f32>,
        released_at: Option<f32>,
    ) -> f32 {
        match self.release_start(note_duration, released_at) {
            Some(start) if elapsed >= start => {
                let since_release = elapsed - start;
                if since_release >= self.release {
                    0.0
                } else {
                    let progress = since_release / self.release;
                    self.held_value(start) * (1.0 - progress)
                }
            }
            _ => self.held_value(elapsed),
        }
    }

    /// True once the release ramp has run to completion.
    pub fn is_finished(
        &self,
        elapsed: f32,
        note_duration: Option<f32>,
        released_at: Option<f32>,
    ) -> bool {
        self.release_start(note_duration, released_at)
            .is_some_and(|start| elapsed >= start + self.release)
    }
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.5,
            release: 0.2,
        }
    }
}

/// Linear ramp that reaches each new target in a fixed number of samples.
#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    value: f32,
    target: f32,
    step: f32,
    len: u32,
}

impl Ramp {
    pub fn new(len: u32) -> Self {
        Self {
            value: 0.0,
            target: 0.0,
            step: 0.0,
            len: len.max(1),
        }
    }

    pub fn set_len(&mut self, len: u32) {
        self.len = len.max(1);
    }

    pub fn set_target(&mut self, target: f32) {
        if target != self.target {
            self.target = target;
            self.step = (target - self.value).abs() / self.len as f32;
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn next(&mut self) -> f32 {
        let remaining = self.target - self.value;
        if remaining.abs() <= self.step {
            self.value = self.target;
        } else {
            self.value += self.step.copysign(remaining);
        }
        self.value
    }
}

/// Follows its input but never moves more than `max_step` per sample.
#[derive(Debug, Clone, Copy)]
pub struct SlewLimiter {
    value: f32,
    max_step: f32,
}

impl SlewLimiter {
    /// `full_scale_len` is the number of samples a 0 to 1 swing takes.
    pub fn new(full_scale_len: u32) -> Self {
        Self {
            value: 0.0,
            max_step: 1.0 / full_scale_len.max(1) as f32,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Restarts from `value` without slewing there.
    pub fn reset(&mut self, value: f32) {
        self.value = value;
    }

    pub fn follow(&mut self, target: f32) -> f32 {
        let delta = (target - self.value).clamp(-self.max_step, self.max_step);
        self.value += delta;
        self.value
    }
}
