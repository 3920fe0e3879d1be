use super::note::NoteId;
use super::params::ParamId;
use thiserror::Error;

/// Everything the synth can complain about.
///
/// None of these are fatal: the engine keeps its previous valid state and keeps
/// producing audio, the error only tells the caller what happened to the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    #[error("unknown parameter '{name}'")]
    InvalidParameter { name: String },

    #[error("{param} = {requested} is out of range, clamped to {applied}")]
    OutOfRangeValue {
        param: ParamId,
        requested: f32,
        applied: f32,
    },

    #[error("pitch must be a positive frequency, got {requested} Hz")]
    InvalidPitch { requested: f32 },

    #[error("{param} must be a finite number")]
    NonFiniteValue { param: ParamId },

    #[error("no sounding note with id {0}")]
    UnknownNoteId(NoteId),

    #[error("block of {frames} frames took {elapsed_us} us, deadline was {deadline_us} us")]
    DeviceUnderrun {
        frames: usize,
        elapsed_us: u64,
        deadline_us: u64,
    },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid preset: {0}")]
    InvalidPreset(String),
}

pub type SynthResult<T> = Result<T, SynthError>;
