use std::fmt;

/// Identifies one note from note-on until it has been retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(pub u64);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A note-on request as it arrives from the control side.
///
/// ```
/// use rustvocalsynth::synth::NoteRequest;
/// let request = NoteRequest::new(0.7).with_duration(1.0).at(0.25);
/// assert_eq!(request.duration, Some(1.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteRequest {
    /// Reusing the id of a sounding note retriggers it.
    pub id: Option<NoteId>,
    pub velocity: f32,
    /// Retunes the glottal source for this note.
    pub frequency: Option<f32>,
    /// Start time in seconds on the engine clock; `None` starts with the next block.
    pub time: Option<f64>,
    /// Total note length in seconds, release tail included.
    pub duration: Option<f32>,
}

impl NoteRequest {
    pub fn new(velocity: f32) -> Self {
        Self {
            id: None,
            velocity,
            frequency: None,
            time: None,
            duration: None,
        }
    }

    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn at(mut self, seconds: f64) -> Self {
        self.time = Some(seconds);
        self
    }
}

impl Default for NoteRequest {
    fn default() -> Self {
        Self::new(0.7)
    }
}

/// A note scheduled on the render frame clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub start_frame: u64,
    pub release_frame: Option<u64>,
    pub duration: Option<f32>,
    pub velocity: f32,
    pub frequency: Option<f32>,
}
