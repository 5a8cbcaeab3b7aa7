//! Default device playback through cpal.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};

use crate::mixer::OutputMixer;

pub struct DeviceOutput {
    _stream: cpal::Stream,
    sample_rate: u32,
    channels: usize,
}

impl DeviceOutput {
    /// Sample rate of the default output device, so banks can be loaded at it.
    pub fn default_sample_rate() -> Result<u32, anyhow::Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(anyhow::anyhow!("No output device available"))?;
        Ok(device.default_output_config()?.sample_rate())
    }

    /// Starts pulling mono audio from `mixer`, copied to every device channel.
    /// Playback stops when the returned value is dropped.
    pub fn start(mixer: Arc<OutputMixer>, gain: f32) -> Result<Self, anyhow::Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(anyhow::anyhow!("No output device available"))?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate();
        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();
        info!("Output: {} Hz, {} channels", sample_rate, channels);

        let err_fn = |err: cpal::StreamError| {
            let s = err.to_string();
            if !s.contains("underrun") && !s.contains("overrun") {
                warn!("an error occurred on stream: {}", s);
            }
        };

        let mut mono = vec![0.0f32; 4096];
        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    if mono.len() < frames {
                        mono.resize(frames, 0.0);
                    }
                    let n = mixer.read(&mut mono[..frames]);
                    mono[n..frames].fill(0.0);
                    spread_to_channels(&mono[..frames], data, channels, gain);
                },
                err_fn,
                None,
            )?,
            _ => return Err(anyhow::anyhow!("Unsupported sample format")),
        };

        stream.play()?;

        Ok(Self {
            _stream: stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

fn spread_to_channels(mono: &[f32], data: &mut [f32], channels: usize, gain: f32) {
    for (frame, sample) in data.chunks_mut(channels).zip(mono) {
        frame.fill(sample * gain);
    }
}
