use crate::audio::{AudioBackend, CpalBackend};
use crate::synth::{channel_pair, NoteRequest, Preset, SynthConfig, VoiceController};
use std::error::Error;
use std::time::Duration;
use tracing::{info, warn};

/// JSON file with a [`SynthConfig`]; defaults are used when unset.
pub const CONFIG_ENV: &str = "RUSTVOCALSYNTH_CONFIG";
/// Substring of the preferred output device name.
pub const DEVICE_ENV: &str = "RUSTVOCALSYNTH_DEVICE";

const NOTE_SECONDS: f32 = 1.0;
const GAP: Duration = Duration::from_millis(1500);

fn load_config() -> Result<SynthConfig, Box<dyn Error>> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)?;
            info!(%path, "loaded config");
            Ok(SynthConfig::from_json(&json)?)
        }
        Err(_) => Ok(SynthConfig::default()),
    }
}

fn load_preset(name: &str) -> Result<Preset, Box<dyn Error>> {
    if let Some(preset) = Preset::builtin(name) {
        return Ok(preset);
    }
    let json = std::fs::read_to_string(name)?;
    Ok(Preset::from_json(&json)?)
}

fn play(controller: &mut VoiceController, name: &str, preset: &Preset) {
    let report = controller.apply_preset(preset);
    if !report.ignored.is_empty() {
        warn!(preset = name, ignored = ?report.ignored, "unknown preset entries");
    }
    let id = controller.note_on(NoteRequest::new(0.7).with_duration(NOTE_SECONDS));
    info!(preset = name, note = %id, "playing");
    std::thread::sleep(GAP);
    controller.poll_events();
}

/// Plays each named preset (builtin name or JSON file) once on the default
/// output device. With no names, plays every builtin preset.
pub fn start(names: &[String]) -> Result<(), Box<dyn Error>> {
    let config = load_config()?;
    let (mut controller, renderer) = channel_pair(&config)?;

    let mut backend = CpalBackend::new(renderer);
    if let Ok(hint) = std::env::var(DEVICE_ENV) {
        backend = backend.with_device_hint(hint);
    }
    backend.start()?;

    let names: Vec<String> = if names.is_empty() {
        Preset::BUILTIN.iter().map(|s| s.to_string()).collect()
    } else {
        names.to_vec()
    };

    for name in &names {
        match load_preset(name) {
            Ok(preset) => play(&mut controller, name, &preset),
            Err(err) => warn!(preset = %name, %err, "skipping preset"),
        }
    }

    controller.all_notes_off();
    std::thread::sleep(Duration::from_millis(50));
    if controller.dropped_events() > 0 {
        warn!(dropped = controller.dropped_events(), "render reports were dropped");
    }
    backend.stop();
    Ok(())
}
