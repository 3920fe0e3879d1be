use crate::audio::AudioBackend;
use crate::synth::{Renderer, SynthError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::error::Error;
use tracing::{info, warn};

/// Largest block rendered in one go; device buffers are cut into chunks of this.
const MAX_BLOCK_FRAMES: usize = 4096;

/// Plays a [`Renderer`] on the default cpal output device.
///
/// The renderer is moved into the device callback when the stream starts;
/// from then on it is only touched from the audio thread.
pub struct CpalBackend {
    stream: Option<Stream>,
    renderer: Option<Renderer>,
    device_hint: Option<String>,
}

impl CpalBackend {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            stream: None,
            renderer: Some(renderer),
            device_hint: None,
        }
    }

    /// Prefer the first output device whose name contains `hint`.
    pub fn with_device_hint(mut self, hint: impl Into<String>) -> Self {
        self.device_hint = Some(hint.into());
        self
    }

    fn select_output_device(&self, host: &cpal::Host) -> Result<cpal::Device, Box<dyn Error>> {
        if let Some(hint) = &self.device_hint {
            let hint = hint.to_lowercase();
            for device in host.output_devices()? {
                let name = device.name().unwrap_or_default();
                if name.to_lowercase().contains(&hint) {
                    return Ok(device);
                }
            }
            warn!(%hint, "no output device matches, using the default");
        }
        host.default_output_device()
            .ok_or_else(|| "No output device available".into())
    }

    fn build_stream(&mut self) -> Result<Stream, Box<dyn Error>> {
        let host = cpal::default_host();
        let device = self.select_output_device(&host)?;
        info!(device = %device.name().unwrap_or_default(), "selected output device");

        let supported_config = device.default_output_config()?;
        if supported_config.sample_format() != SampleFormat::F32 {
            return Err("Unsupported sample format".into());
        }
        let stream_config: cpal::StreamConfig = supported_config.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        let mut renderer = self.renderer.take().ok_or("Stream already started")?;
        let mut block = vec![0.0f32; MAX_BLOCK_FRAMES];

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(MAX_BLOCK_FRAMES * channels) {
                    let frames = chunk.len() / channels;
                    let block = &mut block[..frames];
                    match renderer.render_block(block, sample_rate) {
                        // Underruns are reported to the controller; the block is still usable.
                        Ok(()) | Err(SynthError::DeviceUnderrun { .. }) => {}
                        Err(_) => block.fill(0.0),
                    }
                    for (frame, sample) in chunk.chunks_mut(channels).zip(block.iter()) {
                        frame.fill(*sample);
                    }
                }
            },
            |err| warn!(%err, "stream error"),
            None,
        )?;

        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn start(&mut self) -> Result<(), Box<dyn Error>> {
        let stream = self.build_stream()?;
        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                warn!(%err, "failed to stop stream");
            }
        }
    }
}
