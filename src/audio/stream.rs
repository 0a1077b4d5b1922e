// Output stream setup. The engine is moved into the cpal callback and runs
// there for the life of the stream; everything else talks to it through the
// command and event channels.

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam::channel::Sender;

use super::{AudioEvent, StudioEngine, debug_log};

pub struct AudioStream {
    output_device: Device,
    output_config: StreamConfig,
    sample_format: SampleFormat,
    device_name: String,
}

impl AudioStream {
    pub fn new(debug_mode: bool) -> Result<Self> {
        let host = cpal::default_host();

        let output_device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;
        let output_default = output_device.default_output_config()?;

        let device_name = output_device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string());

        debug_log(
            debug_mode,
            &format!(
                "Output device: {} ({}Hz, {}ch, {:?})",
                device_name,
                output_default.sample_rate().0,
                output_default.channels(),
                output_default.sample_format()
            ),
        );

        let output_config = StreamConfig {
            channels: output_default.channels(),
            sample_rate: output_default.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            output_device,
            output_config,
            sample_format: output_default.sample_format(),
            device_name,
        })
    }

    /// Build and start the output stream, moving the engine into its
    /// callback. The stream must be kept alive by the caller; dropping it
    /// silences playback.
    pub fn start(
        &self,
        mut engine: StudioEngine,
        event_sender: Sender<AudioEvent>,
        debug_mode: bool,
    ) -> Result<Stream> {
        if self.sample_format != SampleFormat::F32 {
            return Err(anyhow!(
                "Unsupported output sample format: {:?}",
                self.sample_format
            ));
        }

        let channels = self.output_config.channels as usize;
        let sample_rate = self.output_config.sample_rate.0;
        // Reused across callbacks so the render path never allocates once
        // it has grown to the device's block size.
        let mut mono = Vec::new();

        let stream = self.output_device.build_output_stream(
            &self.output_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                mono.resize(frames, 0.0);
                engine.process_block(&mut mono);
                for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                    frame.fill(sample);
                }
            },
            move |_err| {
                // Owned string: error callbacks may run on the audio thread.
                let _ = event_sender
                    .try_send(AudioEvent::Error(String::from("Output stream error")));
            },
            None,
        )?;

        stream.play()?;
        debug_log(
            debug_mode,
            &format!("Audio stream started at {}Hz", sample_rate),
        );
        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.output_config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.output_config.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
