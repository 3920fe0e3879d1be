mod cpal_backend;
pub use self::cpal_backend::CpalBackend;

use std::error::Error;

/// Something that pulls rendered blocks out to a device.
pub trait AudioBackend {
    fn start(&mut self) -> Result<(), Box<dyn Error>>;
    fn stop(&mut self);
}
