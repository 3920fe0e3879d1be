use super::config::SynthConfig;
use super::core::{noise_coefficients, Command, EngineClock, RenderEvent, Snapshot};
use super::error::{SynthError, SynthResult};
use super::filter::BiquadCoeffs;
use super::formant::FormantCoefficients;
use super::note::{Note, NoteId, NoteRequest};
use super::params::{ParamChange, ParamId, ParamTarget, ParameterStore, SynthesisParameters};
use super::preset::{Preset, PresetReport};
use std::collections::{BTreeSet, VecDeque};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, warn};

/// The control half of the engine.
///
/// Owns the parameter store and turns parameter edits and note triggers into
/// commands for the [`Renderer`](super::core::Renderer). Every edit is sent as
/// a complete snapshot with its filter coefficients already computed, so the
/// render side only has to swap them in.
pub struct VoiceController {
    store: ParameterStore,
    commands: Sender<Command>,
    events: Receiver<RenderEvent>,
    backlog: VecDeque<RenderEvent>,
    backlog_limit: usize,
    clock: Arc<EngineClock>,
    coefficient_rate: f32,
    formants: FormantCoefficients,
    noise: BiquadCoeffs,
    live: BTreeSet<NoteId>,
    pitch_revision: u64,
    next_id: u64,
}

impl VoiceController {
    pub(crate) fn new(
        config: &SynthConfig,
        commands: Sender<Command>,
        events: Receiver<RenderEvent>,
        clock: Arc<EngineClock>,
    ) -> Self {
        let store = ParameterStore::new(config.sample_rate as f32);
        let snapshot = Snapshot::build(store.snapshot(), store.sample_rate());
        Self {
            store,
            commands,
            events,
            backlog: VecDeque::new(),
            backlog_limit: config.report_capacity.max(1) * 4,
            clock,
            coefficient_rate: snapshot.sample_rate,
            formants: snapshot.formants,
            noise: snapshot.noise,
            live: BTreeSet::new(),
            pitch_revision: 0,
            next_id: 1,
        }
    }

    pub fn parameters(&self) -> &SynthesisParameters {
        self.store.values()
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.store.get(id)
    }

    /// Seconds of audio rendered so far.
    pub fn now(&self) -> f64 {
        self.clock.frames() as f64 / self.clock.sample_rate().max(1) as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// Render reports lost because the report channel was full.
    pub fn dropped_events(&self) -> u64 {
        self.clock.dropped_events()
    }

    /// Notes started here that the renderer has not retired yet.
    pub fn live_notes(&mut self) -> Vec<NoteId> {
        self.sync();
        self.live.iter().copied().collect()
    }

    /// Sets a parameter by name.
    ///
    /// Unknown names change nothing and return `InvalidParameter`; a pitch at
    /// or below zero returns `InvalidPitch` and keeps the old pitch. Values
    /// outside their range are clamped and applied; the returned change says
    /// so through [`ParamChange::warning`].
    pub fn set_parameter(&mut self, name: &str, value: f32) -> SynthResult<ParamChange> {
        let Some(id) = ParamId::from_name(name) else {
            let err = SynthError::InvalidParameter {
                name: name.to_string(),
            };
            warn!(%err, "ignoring parameter");
            return Err(err);
        };
        self.set(id, value)
    }

    pub fn set(&mut self, id: ParamId, value: f32) -> SynthResult<ParamChange> {
        self.sync();
        let change = self.store.set(id, value).inspect_err(|err| {
            warn!(%err, "parameter rejected");
        })?;
        if let Some(warning) = change.warning() {
            warn!(%warning, "parameter clamped");
        }
        if id == ParamId::Pitch {
            self.pitch_revision += 1;
        }
        self.refresh_coefficients(Some(id.target()));
        self.publish();
        Ok(change)
    }

    /// Applies every entry of `preset`, then publishes once.
    ///
    /// Unknown names are skipped and listed in the report, matching how a
    /// single unknown `set_parameter` is treated.
    pub fn apply_preset(&mut self, preset: &Preset) -> PresetReport {
        self.sync();
        let mut report = PresetReport::default();
        for (name, value) in preset.entries() {
            match self.store.set_by_name(name, value) {
                Ok(change) => {
                    if let Some(warning) = change.warning() {
                        warn!(%warning, "preset value clamped");
                    }
                    if change.param == ParamId::Pitch {
                        self.pitch_revision += 1;
                    }
                    report.applied.push(change);
                }
                Err(SynthError::InvalidParameter { name }) => {
                    debug!(%name, "preset entry ignored");
                    report.ignored.push(name);
                }
                Err(err) => {
                    warn!(%err, "preset entry rejected");
                    report.rejected.push(err);
                }
            }
        }
        self.refresh_coefficients(None);
        self.publish();
        report
    }

    /// Schedules a note and returns its id.
    ///
    /// Without a time the note starts with the next rendered block. A request
    /// carrying the id of a note that is still sounding restarts that note and
    /// cancels its pending release.
    pub fn note_on(&mut self, request: NoteRequest) -> NoteId {
        self.sync();
        let id = request.id.unwrap_or_else(|| self.allocate_id());

        let velocity = if request.velocity.is_finite() {
            request.velocity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if velocity != request.velocity {
            warn!(note = %id, requested = request.velocity, applied = velocity, "velocity clamped");
        }

        let frequency = request.frequency.filter(|f| {
            let valid = *f > 0.0 && f.is_finite();
            if !valid {
                let err = SynthError::InvalidPitch { requested: *f };
                warn!(note = %id, %err, "frequency override ignored");
            }
            valid
        });

        let start_frame = self.frame_at(request.time);
        let duration = request.duration.filter(|d| d.is_finite() && *d > 0.0);
        let note = Note {
            id,
            start_frame,
            release_frame: None,
            duration,
            velocity,
            frequency,
        };
        debug!(note = %id, start_frame, velocity, ?duration, "note on");
        self.send(Command::NoteOn(note));
        self.live.insert(id);
        id
    }

    /// Releases a note, now or at `time` seconds on the engine clock.
    ///
    /// Without an id the most recently started note that is still held is
    /// released. An id that is not sounding is reported as `UnknownNoteId`
    /// and nothing else happens.
    pub fn note_off(&mut self, id: Option<NoteId>, time: Option<f64>) -> SynthResult<()> {
        self.sync();
        if let Some(id) = id {
            if !self.live.contains(&id) {
                let err = SynthError::UnknownNoteId(id);
                warn!(%err, "note off ignored");
                return Err(err);
            }
        }
        let frame = self.frame_at(time);
        debug!(note = ?id, frame, "note off");
        self.send(Command::NoteOff { id, frame });
        Ok(())
    }

    /// Cuts every note through the anti-click fade.
    pub fn all_notes_off(&mut self) {
        debug!("all notes off");
        self.send(Command::AllNotesOff);
    }

    /// Drains everything the renderer has reported so far.
    pub fn poll_events(&mut self) -> Vec<RenderEvent> {
        self.sync();
        self.backlog.drain(..).collect()
    }

    // Pulls render reports into the backlog, keeps the live set current and
    // follows the rate the renderer is actually running at.
    fn sync(&mut self) {
        let rate = self.clock.sample_rate() as f32;
        if rate != self.store.sample_rate() {
            self.store.set_sample_rate(rate);
        }
        while let Ok(event) = self.events.try_recv() {
            match &event {
                RenderEvent::NoteStarted(id) => debug!(note = %id, "note started"),
                RenderEvent::NoteReleased(id) => debug!(note = %id, "note released"),
                RenderEvent::NoteStolen(id) => debug!(note = %id, "note stolen"),
                RenderEvent::NoteRetired(id) => {
                    debug!(note = %id, "note retired");
                    self.live.remove(id);
                }
                RenderEvent::NoteDropped(id) => {
                    warn!(note = %id, "note dropped, too many scheduled notes");
                    self.live.remove(id);
                }
                // The voice it meant to restart is still sounding.
                RenderEvent::RetriggerDropped(id) => {
                    warn!(note = %id, "retrigger dropped, too many scheduled notes");
                }
                RenderEvent::UnknownNoteId(id) => {
                    warn!(err = %SynthError::UnknownNoteId(*id), "note off ignored");
                    self.live.remove(id);
                }
                RenderEvent::SampleRateChanged(rate) => {
                    debug!(rate, "render sample rate changed");
                }
                RenderEvent::Underrun {
                    frames,
                    elapsed_us,
                    deadline_us,
                } => warn!(frames, elapsed_us, deadline_us, "render underrun"),
            }
            if self.backlog.len() == self.backlog_limit {
                self.backlog.pop_front();
            }
            self.backlog.push_back(event);
        }
    }

    fn allocate_id(&mut self) -> NoteId {
        loop {
            let id = NoteId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.live.contains(&id) {
                return id;
            }
        }
    }

    fn frame_at(&self, time: Option<f64>) -> u64 {
        let now = self.clock.frames();
        match time {
            Some(seconds) if seconds.is_finite() && seconds > 0.0 => {
                let frame = (seconds * self.clock.sample_rate() as f64).round() as u64;
                frame.max(now)
            }
            _ => now,
        }
    }

    // Coefficients are rebuilt only for the stages an edit touches, unless the
    // render rate moved, in which case everything is rebuilt.
    fn refresh_coefficients(&mut self, target: Option<ParamTarget>) {
        let rate = self.store.sample_rate();
        let all = rate != self.coefficient_rate || target.is_none();
        self.coefficient_rate = rate;
        let params = self.store.values();
        if all || target == Some(ParamTarget::FormantFilter) {
            self.formants = FormantCoefficients::from_params(params, rate);
        }
        if all || target == Some(ParamTarget::NoiseFilter) {
            self.noise = noise_coefficients(params, rate);
        }
    }

    fn publish(&mut self) {
        let snapshot = Snapshot {
            params: self.store.snapshot(),
            formants: self.formants,
            noise: self.noise,
            sample_rate: self.store.sample_rate(),
            pitch_revision: self.pitch_revision,
        };
        self.send(Command::Snapshot(snapshot));
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("renderer is gone, command dropped");
        }
    }
}
