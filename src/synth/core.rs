use super::config::SynthConfig;
use super::envelope::EnvelopeGenerator;
use super::error::{SynthError, SynthResult};
use super::filter::{BiquadCoeffs, Filter};
use super::formant::{FormantBank, FormantCoefficients};
use super::glottal::GlottalSource;
use super::noise::NoiseSource;
use super::note::{Note, NoteId};
use super::params::{ParamId, SynthesisParameters};
use super::prelude::seconds_to_frames;
use super::voice::Voice;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Instant;

/// Everything the renderer needs to follow a parameter change, with the
/// expensive coefficient math already done.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub params: SynthesisParameters,
    pub formants: FormantCoefficients,
    pub noise: BiquadCoeffs,
    /// Rate the coefficients were built for.
    pub sample_rate: f32,
    /// Bumped on every explicit pitch edit, even one that keeps the value.
    pub pitch_revision: u64,
}

impl Snapshot {
    pub fn build(params: SynthesisParameters, sample_rate: f32) -> Self {
        Self {
            params,
            formants: FormantCoefficients::from_params(&params, sample_rate),
            noise: noise_coefficients(&params, sample_rate),
            sample_rate,
            pitch_revision: 0,
        }
    }
}

pub fn noise_coefficients(params: &SynthesisParameters, sample_rate: f32) -> BiquadCoeffs {
    let (min, max) = ParamId::NoiseColor.range(sample_rate);
    BiquadCoeffs::bandpass(params.noise_color.clamp(min, max), params.noise_q, sample_rate)
}

/// Control to render messages, drained at block boundaries.
#[derive(Debug, Clone, Copy)]
pub enum Command {
    Snapshot(Snapshot),
    NoteOn(Note),
    NoteOff { id: Option<NoteId>, frame: u64 },
    AllNotesOff,
}

/// What the renderer reports back. The render thread never logs; the
/// controller logs these when it drains them.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    NoteStarted(NoteId),
    NoteReleased(NoteId),
    /// Cut to make room for a newer note.
    NoteStolen(NoteId),
    /// The note is silent and its voice has been freed.
    NoteRetired(NoteId),
    /// Too many notes were scheduled ahead; this one never played.
    NoteDropped(NoteId),
    /// Same as `NoteDropped`, but for a restart of a note that keeps sounding.
    RetriggerDropped(NoteId),
    UnknownNoteId(NoteId),
    SampleRateChanged(u32),
    Underrun {
        frames: usize,
        elapsed_us: u64,
        deadline_us: u64,
    },
}

/// Frame counter and sample rate shared by both sides of the engine.
#[derive(Debug)]
pub struct EngineClock {
    frames: AtomicU64,
    sample_rate: AtomicU32,
    dropped_events: AtomicU64,
}

impl EngineClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate: AtomicU32::new(sample_rate),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Frames rendered so far; a note scheduled for "now" starts here.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Acquire)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

/// Smooth limiter: linear up to the knee, then eased towards full scale.
pub fn soft_clip(sample: f32) -> f32 {
    const KNEE: f32 = 0.9;
    if sample.is_nan() {
        return 0.0;
    }
    let magnitude = sample.abs();
    if magnitude <= KNEE {
        sample
    } else {
        let over = (magnitude - KNEE) / (1.0 - KNEE);
        (KNEE + (1.0 - KNEE) * over.tanh()).copysign(sample)
    }
}

/// The render half of the engine.
///
/// Owns every piece of DSP state. All storage is sized at construction, so
/// [`render_block`](Self::render_block) neither allocates nor waits on the
/// control side.
pub struct Renderer {
    config: SynthConfig,
    commands: Receiver<Command>,
    events: SyncSender<RenderEvent>,
    clock: Arc<EngineClock>,
    params: SynthesisParameters,
    pitch_revision: u64,
    sample_rate: f32,
    glottal: GlottalSource,
    noise: NoiseSource,
    formants: FormantBank,
    envelope: EnvelopeGenerator,
    voices: Vec<Voice>,
    pending: Vec<Note>,
    next_start: u64,
    frame: u64,
    current_gain: f32, // output gain reached at the end of the last block
    gain_fade_len: usize,
}

impl Renderer {
    pub(crate) fn new(
        config: SynthConfig,
        commands: Receiver<Command>,
        events: SyncSender<RenderEvent>,
        clock: Arc<EngineClock>,
    ) -> Self {
        let sample_rate = config.sample_rate as f32;
        let params = SynthesisParameters::default();
        let fade_len = seconds_to_frames(config.coefficient_fade_seconds, sample_rate);

        let mut glottal = GlottalSource::new(sample_rate, config.seed);
        glottal.set_safety_len(seconds_to_frames(config.safety_ramp_seconds, sample_rate));
        let noise = NoiseSource::new(
            sample_rate,
            config.noise_buffer_len,
            config.seed,
            seconds_to_frames(config.noise_ramp(), sample_rate),
            fade_len,
        );
        let formants = FormantBank::new(sample_rate, fade_len);

        // Cut voices keep fading while their replacements start, so twice
        // the note limit is enough slots.
        let voice_slots = config.max_notes * 2;
        let pending_slots = config.max_notes * 4;

        let mut renderer = Self {
            gain_fade_len: fade_len as usize,
            voices: vec![Voice::new(); voice_slots],
            pending: Vec::with_capacity(pending_slots),
            config,
            commands,
            events,
            clock,
            params,
            pitch_revision: 0,
            sample_rate,
            glottal,
            noise,
            formants,
            envelope: EnvelopeGenerator::new(),
            next_start: u64::MAX,
            frame: 0,
            current_gain: params.output_gain,
        };
        renderer.apply_snapshot(&Snapshot::build(params, sample_rate), true);
        renderer
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frequency the glottal source is running at, or will take at its next cycle.
    pub fn pitch(&self) -> f32 {
        self.glottal.frequency()
    }

    /// Fills `output` with the next `output.len()` frames.
    ///
    /// Pending commands are applied first, so everything sent before the call
    /// is audible in this block. If the block took longer to compute than it
    /// lasts, the samples are still written and `DeviceUnderrun` is returned.
    pub fn render_block(&mut self, output: &mut [f32], sample_rate: u32) -> SynthResult<()> {
        if sample_rate == 0 {
            output.fill(0.0);
            return Err(SynthError::InvalidSampleRate(sample_rate));
        }
        if output.is_empty() {
            return Ok(());
        }
        let started = self.config.detect_underruns.then(Instant::now);

        self.sync_sample_rate(sample_rate);
        self.process_commands();

        let sample_rate = self.sample_rate;
        for sample in output.iter_mut() {
            let frame = self.frame;
            if frame >= self.next_start {
                self.start_due_notes(frame);
            }

            let excitation = self.glottal.next_sample() + self.noise.next_sample();
            let shaped = self.formants.process(excitation);

            let mut note_gain = 0.0;
            for voice in self.voices.iter_mut().filter(|v| v.active) {
                note_gain += voice.next_gain(frame, &self.envelope, sample_rate);
            }
            *sample = shaped * note_gain;
            self.frame += 1;
        }

        self.apply_output_gain(output, self.params.output_gain);
        self.apply_limiter(output);
        self.retire_finished_voices();
        self.clock.frames.store(self.frame, Ordering::Release);

        match started {
            Some(started) => self.check_deadline(output.len(), started),
            None => Ok(()),
        }
    }

    fn check_deadline(&mut self, frames: usize, started: Instant) -> SynthResult<()> {
        let elapsed_us = started.elapsed().as_micros() as u64;
        let deadline_us = (frames as f64 * 1e6 / self.sample_rate as f64) as u64;
        if elapsed_us <= deadline_us {
            return Ok(());
        }
        self.report(RenderEvent::Underrun {
            frames,
            elapsed_us,
            deadline_us,
        });
        Err(SynthError::DeviceUnderrun {
            frames,
            elapsed_us,
            deadline_us,
        })
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Snapshot(snapshot) => self.apply_snapshot(&snapshot, false),
                Command::NoteOn(note) => self.schedule(note),
                Command::NoteOff { id, frame } => self.note_off(id, frame),
                Command::AllNotesOff => self.all_notes_off(),
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: &Snapshot, initial: bool) {
        let p = &snapshot.params;
        // Only a pitch edit retunes, so a note's frequency override
        // survives unrelated edits.
        if initial || snapshot.pitch_revision != self.pitch_revision {
            let _ = self.glottal.set_pitch(p.pitch);
            self.pitch_revision = snapshot.pitch_revision;
        }
        self.glottal.set_jitter(p.jitter);
        self.glottal.set_shimmer(p.shimmer);
        self.noise.set_level(p.breathiness);
        if snapshot.sample_rate == self.sample_rate {
            self.noise.retune(p.noise_color, p.noise_q, snapshot.noise);
            self.formants
                .retune(p.formant_frequencies, p.formant_bandwidths, &snapshot.formants);
        } else {
            self.rebuild_coefficients(p);
        }
        self.formants.set_gains(p.formant_gains);
        self.formants.set_mix(p.formant_mix);
        self.envelope
            .set_adsr(p.amp_attack, p.amp_decay, p.amp_sustain, p.amp_release);
        self.params = *p;
    }

    // Only reached when a block asks for a rate the controller has not built for yet.
    fn rebuild_coefficients(&mut self, params: &SynthesisParameters) {
        self.noise.retune(
            params.noise_color,
            params.noise_q,
            noise_coefficients(params, self.sample_rate),
        );
        self.formants.retune(
            params.formant_frequencies,
            params.formant_bandwidths,
            &FormantCoefficients::from_params(params, self.sample_rate),
        );
    }

    fn sync_sample_rate(&mut self, sample_rate: u32) {
        let rate = sample_rate as f32;
        if rate == self.sample_rate {
            return;
        }
        self.sample_rate = rate;
        self.glottal.set_sample_rate(rate);
        self.glottal
            .set_safety_len(seconds_to_frames(self.config.safety_ramp_seconds, rate));
        let fade_len = seconds_to_frames(self.config.coefficient_fade_seconds, rate);
        self.noise.set_fade_len(fade_len);
        self.noise
            .set_gate_len(seconds_to_frames(self.config.noise_ramp(), rate));
        self.formants.set_fade_len(fade_len);
        self.gain_fade_len = fade_len as usize;
        // Both filters rebuild from the tuning they last took.
        self.noise.set_sample_rate(rate);
        self.formants.set_sample_rate(rate);
        self.clock.sample_rate.store(sample_rate, Ordering::Release);
        self.report(RenderEvent::SampleRateChanged(sample_rate));
    }

    fn schedule(&mut self, note: Note) {
        if let Some(queued) = self.pending.iter_mut().find(|n| n.id == note.id) {
            *queued = note;
        } else if self.pending.len() < self.pending.capacity() {
            self.pending.push(note);
        } else {
            let sounding = self
                .voices
                .iter()
                .any(|v| v.active && !v.is_cut() && v.id == note.id);
            self.report(if sounding {
                RenderEvent::RetriggerDropped(note.id)
            } else {
                RenderEvent::NoteDropped(note.id)
            });
            return;
        }
        self.next_start = self.next_start.min(note.start_frame);
    }

    fn start_due_notes(&mut self, frame: u64) {
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start_frame <= frame {
                // Keep arrival order so same-frame notes age in the order they were sent.
                let note = self.pending.remove(i);
                self.start_note(&note);
            } else {
                i += 1;
            }
        }
        self.next_start = self
            .pending
            .iter()
            .map(|n| n.start_frame)
            .min()
            .unwrap_or(u64::MAX);
    }

    fn start_note(&mut self, note: &Note) {
        let voicing = self.glottal.note_on(note.velocity, note.frequency);
        self.noise.note_on(1.0);

        // Same id still sounding: restart it in place.
        if let Some(voice) = self
            .voices
            .iter_mut()
            .find(|v| v.active && !v.is_cut() && v.id == note.id)
        {
            voice.retrigger(note, voicing);
            self.report(RenderEvent::NoteStarted(note.id));
            return;
        }

        let sounding = self.voices.iter().filter(|v| v.active && !v.is_cut()).count();
        if sounding >= self.config.max_notes {
            self.steal_oldest_voice();
        }

        let slot = match self.voices.iter().position(|v| !v.active) {
            Some(slot) => slot,
            None => self.reclaim_quietest_voice(),
        };
        self.voices[slot].activate(note, voicing);
        self.report(RenderEvent::NoteStarted(note.id));
    }

    fn steal_oldest_voice(&mut self) {
        let oldest = self
            .voices
            .iter_mut()
            .filter(|v| v.active && !v.is_cut())
            .min_by_key(|v| v.start_frame());
        if let Some(voice) = oldest {
            voice.cut(&self.glottal);
            let id = voice.id;
            self.report(RenderEvent::NoteStolen(id));
        }
    }

    // Every slot is busy with a fading voice; drop the quietest outright.
    fn reclaim_quietest_voice(&mut self) -> usize {
        let mut slot = 0;
        for (i, voice) in self.voices.iter().enumerate() {
            if voice.gain() < self.voices[slot].gain() {
                slot = i;
            }
        }
        let id = self.voices[slot].id;
        self.voices[slot].reset();
        self.report(RenderEvent::NoteRetired(id));
        slot
    }

    fn note_off(&mut self, id: Option<NoteId>, frame: u64) {
        let target = match id {
            Some(id) => self
                .voices
                .iter()
                .position(|v| v.active && !v.is_cut() && v.id == id),
            // No id releases the most recently started note still held.
            None => self
                .voices
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_held())
                .max_by_key(|(_, v)| v.start_frame())
                .map(|(i, _)| i),
        };

        if let Some(slot) = target {
            self.voices[slot].release(frame);
            let id = self.voices[slot].id;
            self.report(RenderEvent::NoteReleased(id));
            return;
        }

        // The note may still be waiting for its start frame.
        let queued = match id {
            Some(id) => self.pending.iter_mut().find(|n| n.id == id),
            None => self
                .pending
                .iter_mut()
                .filter(|n| n.release_frame.is_none())
                .max_by_key(|n| n.start_frame),
        };
        if let Some(note) = queued {
            let frame = frame.max(note.start_frame);
            note.release_frame = Some(note.release_frame.map_or(frame, |f| f.min(frame)));
            let released = note.id;
            self.report(RenderEvent::NoteReleased(released));
        } else if let Some(id) = id {
            self.report(RenderEvent::UnknownNoteId(id));
        }
    }

    fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.active) {
            voice.cut(&self.glottal);
        }
        while let Some(note) = self.pending.pop() {
            self.report(RenderEvent::NoteRetired(note.id));
        }
        self.next_start = u64::MAX;
    }

    fn retire_finished_voices(&mut self) {
        let threshold = self.config.silence_threshold;
        for i in 0..self.voices.len() {
            let voice = &self.voices[i];
            if voice.active
                && voice.is_finished(self.frame, &self.envelope, self.sample_rate, threshold)
            {
                let id = voice.id;
                self.voices[i].reset();
                self.report(RenderEvent::NoteRetired(id));
            }
        }
        if !self.voices.iter().any(|v| v.active) {
            self.noise.note_off();
        }
    }

    /// Applies the output gain, easing from last block's gain to the new one
    /// over the first few milliseconds of the block.
    fn apply_output_gain(&mut self, output: &mut [f32], target_gain: f32) {
        let buffer_len = output.len();
        let crossfade_samples = if (target_gain - self.current_gain).abs() > 1e-6 {
            self.gain_fade_len.min(buffer_len)
        } else {
            0
        };
        let inv_crossfade_len = if crossfade_samples > 0 {
            1.0 / crossfade_samples as f32
        } else {
            0.0
        };

        for (i, sample) in output.iter_mut().enumerate() {
            let gain = if i < crossfade_samples {
                let t = (i + 1) as f32 * inv_crossfade_len;
                let smooth_t = t * t * (3.0 - 2.0 * t); // cubic ease-in-out
                self.current_gain
                    .mul_add(1.0 - smooth_t, target_gain * smooth_t)
            } else {
                target_gain
            };
            *sample *= gain;
        }

        self.current_gain = target_gain;
    }

    pub fn apply_limiter(&mut self, output: &mut [f32]) {
        for sample in output.iter_mut() {
            *sample = soft_clip(*sample);
        }
    }

    fn report(&self, event: RenderEvent) {
        if let Err(TrySendError::Full(_)) = self.events.try_send(event) {
            self.clock.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_clip_is_transparent_below_the_knee() {
        for x in [-0.9, -0.3, 0.0, 0.45, 0.9] {
            assert_eq!(soft_clip(x), x);
        }
    }

    #[test]
    fn soft_clip_stays_in_range() {
        for x in [1.0, 2.5, 100.0, f32::INFINITY, -7.0, f32::NEG_INFINITY] {
            let y = soft_clip(x);
            assert!(y.abs() <= 1.0, "{x} -> {y}");
            assert_eq!(y.signum(), x.signum());
        }
        assert_eq!(soft_clip(f32::NAN), 0.0);
    }
}
