pub mod config;
pub mod control;
pub mod core;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod formant;
pub mod glottal;
pub mod noise;
pub mod note;
pub mod params;
pub mod prelude;
pub mod preset;
pub mod voice;

pub use config::SynthConfig;
pub use control::VoiceController;
pub use self::core::{RenderEvent, Renderer};
pub use engine::{channel_pair, VoiceEngine};
pub use error::{SynthError, SynthResult};
pub use note::{NoteId, NoteRequest};
pub use params::{ParamChange, ParamId, ParameterStore, SynthesisParameters};
pub use preset::{Preset, PresetReport};
