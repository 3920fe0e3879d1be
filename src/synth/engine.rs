use super::config::SynthConfig;
use super::control::VoiceController;
use super::core::{EngineClock, RenderEvent, Renderer};
use super::error::{SynthError, SynthResult};
use super::note::{NoteId, NoteRequest};
use super::params::{ParamChange, SynthesisParameters};
use super::preset::{Preset, PresetReport};
use std::sync::mpsc::{channel, sync_channel};
use std::sync::Arc;
use tracing::warn;

/// Builds a connected controller/renderer pair.
///
/// The controller stays with whoever edits parameters and triggers notes; the
/// renderer goes to the audio callback. They only talk through channels and a
/// shared frame clock.
pub fn channel_pair(config: &SynthConfig) -> SynthResult<(VoiceController, Renderer)> {
    config.validate()?;
    Ok(build(config.clone()))
}

fn build(config: SynthConfig) -> (VoiceController, Renderer) {
    let (command_tx, command_rx) = channel();
    let (event_tx, event_rx) = sync_channel(config.report_capacity.max(1));
    let clock = Arc::new(EngineClock::new(config.sample_rate));
    let controller = VoiceController::new(&config, command_tx, event_rx, clock.clone());
    let renderer = Renderer::new(config, command_rx, event_tx, clock);
    (controller, renderer)
}

/// Both halves in one value, for callers that edit and render from the same
/// thread (offline rendering, tests). Use [`split`](Self::split) to hand the
/// renderer to an audio thread.
///
/// ```
/// use rustvocalsynth::synth::{Preset, VoiceEngine};
/// let mut engine = VoiceEngine::default();
/// engine.apply_preset(&Preset::bark());
/// engine.note_on(0.7, Some(0.5));
/// let samples = engine.render(44_100, 44_100);
/// assert!(samples.iter().all(|s| s.abs() <= 1.0));
/// ```
pub struct VoiceEngine {
    controller: VoiceController,
    renderer: Renderer,
}

impl VoiceEngine {
    pub fn new(config: SynthConfig) -> SynthResult<Self> {
        let (controller, renderer) = channel_pair(&config)?;
        Ok(Self {
            controller,
            renderer,
        })
    }

    pub fn split(self) -> (VoiceController, Renderer) {
        (self.controller, self.renderer)
    }

    pub fn controller(&self) -> &VoiceController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut VoiceController {
        &mut self.controller
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn parameters(&self) -> &SynthesisParameters {
        self.controller.parameters()
    }

    pub fn set_parameter(&mut self, name: &str, value: f32) -> SynthResult<ParamChange> {
        self.controller.set_parameter(name, value)
    }

    pub fn apply_preset(&mut self, preset: &Preset) -> PresetReport {
        self.controller.apply_preset(preset)
    }

    /// Starts a note with the next block, optionally bounded to `duration`
    /// seconds including its release.
    pub fn note_on(&mut self, velocity: f32, duration: Option<f32>) -> NoteId {
        let mut request = NoteRequest::new(velocity);
        request.duration = duration;
        self.controller.note_on(request)
    }

    pub fn note_on_with(&mut self, request: NoteRequest) -> NoteId {
        self.controller.note_on(request)
    }

    pub fn note_off(&mut self, id: Option<NoteId>) -> SynthResult<()> {
        self.controller.note_off(id, None)
    }

    /// Releases `id` (or the latest held note) at `seconds` on the engine clock.
    pub fn note_off_at(&mut self, id: Option<NoteId>, seconds: f64) -> SynthResult<()> {
        self.controller.note_off(id, Some(seconds))
    }

    pub fn all_notes_off(&mut self) {
        self.controller.all_notes_off();
    }

    pub fn render_block(&mut self, output: &mut [f32], sample_rate: u32) -> SynthResult<()> {
        self.renderer.render_block(output, sample_rate)
    }

    /// Renders `frames` samples into a new buffer. Underruns are reported
    /// through [`poll_events`](Self::poll_events) rather than returned.
    pub fn render(&mut self, frames: usize, sample_rate: u32) -> Vec<f32> {
        let mut output = vec![0.0; frames];
        match self.renderer.render_block(&mut output, sample_rate) {
            Ok(()) | Err(SynthError::DeviceUnderrun { .. }) => {}
            Err(err) => warn!(%err, "render failed"),
        }
        output
    }

    pub fn poll_events(&mut self) -> Vec<RenderEvent> {
        self.controller.poll_events()
    }

    /// Seconds rendered so far.
    pub fn now(&self) -> f64 {
        self.controller.now()
    }
}

impl Default for VoiceEngine {
    fn default() -> Self {
        let (controller, renderer) = build(SynthConfig::default());
        Self {
            controller,
            renderer,
        }
    }
}
