use super::envelope::EnvelopeGenerator;
use super::glottal::{GlottalSource, Voicing};
use super::note::{Note, NoteId};

/// Render-side state of one sounding note.
///
/// Slots are allocated once and reused; a voice is either idle or carries
/// a note from its first sample until it is retired.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    pub id: NoteId,
    pub active: bool,
    start_frame: u64,
    release_frame: Option<u64>,
    duration: Option<f32>,
    voicing: Voicing,
}

impl Voice {
    /// Creates an idle voice.
    pub fn new() -> Self {
        Self {
            id: NoteId(0),
            active: false,
            start_frame: 0,
            release_frame: None,
            duration: None,
            voicing: Voicing::new(0.0, 1),
        }
    }

    pub fn activate(&mut self, note: &Note, voicing: Voicing) {
        self.id = note.id;
        self.active = true;
        self.start_frame = note.start_frame;
        self.release_frame = note.release_frame;
        self.duration = note.duration;
        self.voicing = voicing;
    }

    /// Starts the note over from `note`, dropping any pending release. The
    /// gain carries on from where it was so the restart does not click.
    pub fn retrigger(&mut self, note: &Note, voicing: Voicing) {
        let gain = self.voicing.gain();
        self.activate(note, voicing.continuing_from(gain));
    }

    /// Schedules the envelope release. An earlier release already on the
    /// voice is kept.
    pub fn release(&mut self, frame: u64) {
        let frame = frame.max(self.start_frame);
        self.release_frame = Some(match self.release_frame {
            Some(existing) => existing.min(frame),
            None => frame,
        });
    }

    /// Hard stop through the anti-click fade.
    pub fn cut(&mut self, glottal: &GlottalSource) {
        glottal.note_off(&mut self.voicing);
    }

    pub fn is_cut(&self) -> bool {
        self.voicing.is_cut()
    }

    /// Sounding and not yet given a note-off.
    pub fn is_held(&self) -> bool {
        self.active && !self.is_cut() && self.release_frame.is_none()
    }

    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    pub fn release_frame(&self) -> Option<u64> {
        self.release_frame
    }

    pub fn gain(&self) -> f32 {
        self.voicing.gain()
    }

    fn clock(&self, frame: u64, sample_rate: f32) -> (f32, Option<f32>) {
        let elapsed = frame.saturating_sub(self.start_frame) as f32 / sample_rate;
        let released_at = self
            .release_frame
            .map(|off| off.saturating_sub(self.start_frame) as f32 / sample_rate);
        (elapsed, released_at)
    }

    /// This voice's gain for `frame`.
    pub fn next_gain(
        &mut self,
        frame: u64,
        envelope: &EnvelopeGenerator,
        sample_rate: f32,
    ) -> f32 {
        let (elapsed, released_at) = self.clock(frame, sample_rate);
        let value = envelope.value_at(elapsed, self.duration, released_at);
        self.voicing.follow(value)
    }

    /// Finished once the envelope has run out (or the voice was cut) and the
    /// gain has settled below `threshold`.
    pub fn is_finished(
        &self,
        frame: u64,
        envelope: &EnvelopeGenerator,
        sample_rate: f32,
        threshold: f32,
    ) -> bool {
        if !self.voicing.is_silent(threshold) {
            return false;
        }
        if self.is_cut() {
            return true;
        }
        let (elapsed, released_at) = self.clock(frame, sample_rate);
        envelope.is_finished(elapsed, self.duration, released_at)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::new()
    }
}
