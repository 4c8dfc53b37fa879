use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::device::SourceSelector;
use crate::ring_buffer::{RingConsumer, RingProducer, SampleRing};
use wakevox_foundation::{OpenError, ReadError};

/// Pull side of one live microphone grant.
///
/// Implementations are created and consumed on the capture worker thread;
/// they never cross threads after construction.
pub trait CaptureSource {
    fn sample_rate(&self) -> u32;

    /// Preferred pull size, in samples.
    fn frame_samples(&self) -> usize;

    /// Non-blocking: returns 0 when nothing is buffered yet.
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ReadError>;

    /// Stops capture and releases the device grant. Safe to call twice.
    fn close(&mut self);
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub preferred_device: Option<String>,
    pub frame_samples: usize,
    pub ring_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preferred_device: None,
            frame_samples: 2048,
            ring_capacity: 1 << 16,
        }
    }
}

/// Per-candidate init failures. Logged while walking the preference list
/// and collapsed into [`OpenError`] at the boundary; none of these types
/// escape this crate.
#[derive(Error, Debug)]
enum InitError {
    #[error("device not found")]
    DeviceNotFound,

    #[error("supported stream configs error: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("sample format {0:?} not supported")]
    FormatNotSupported(SampleFormat),

    #[error("build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("no usable input config")]
    NoInputConfig,
}

/// cpal-backed microphone source. The audio callback converts incoming
/// samples to mono i16 and pushes them into the ring; `read` pulls from
/// the other end on the capture worker.
pub struct MicSource {
    stream: Option<Stream>,
    consumer: RingConsumer,
    sample_rate: u32,
    frame_samples: usize,
    disconnected: Arc<AtomicBool>,
}

impl MicSource {
    pub fn open(config: &CaptureConfig) -> Result<Self, OpenError> {
        // Sizing is a device-wide precondition; nothing is tried past it.
        if config.frame_samples == 0 || config.ring_capacity < config.frame_samples {
            return Err(OpenError::SizingFailed);
        }

        let selector = SourceSelector::new();
        for candidate in selector.candidates(config.preferred_device.as_deref()) {
            match Self::try_open(&selector, candidate.as_deref(), config) {
                Ok(source) => {
                    tracing::info!(
                        device = ?candidate,
                        sample_rate = source.sample_rate,
                        "capture source ready"
                    );
                    return Ok(source);
                }
                Err(e) => {
                    tracing::warn!(device = ?candidate, "capture source failed to initialize: {}", e);
                }
            }
        }
        Err(OpenError::AllSourcesFailed)
    }

    fn try_open(
        selector: &SourceSelector,
        name: Option<&str>,
        config: &CaptureConfig,
    ) -> Result<Self, InitError> {
        let device = selector.open(name).ok_or(InitError::DeviceNotFound)?;
        let (stream_config, sample_format) = negotiate(&device)?;
        let channels = stream_config.channels;

        let (producer, consumer) = SampleRing::new(config.ring_capacity).split();
        let disconnected = Arc::new(AtomicBool::new(false));
        let stream = build_stream(
            &device,
            &stream_config,
            sample_format,
            channels,
            producer,
            Arc::clone(&disconnected),
        )?;

        // A handle alone is not "ready"; the stream must actually start.
        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            consumer,
            sample_rate: stream_config.sample_rate.0,
            frame_samples: config.frame_samples,
            disconnected,
        })
    }
}

impl CaptureSource for MicSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ReadError> {
        if self.stream.is_none() {
            return Err(ReadError::Closed);
        }
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(ReadError::Disconnected);
        }
        Ok(self.consumer.read(buf))
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Dropping the stream stops capture and releases the grant.
            drop(stream);
        }
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn negotiate(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), InitError> {
    if let Ok(default_config) = device.default_input_config() {
        return Ok((
            StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }

    if let Some(config) = device.supported_input_configs()?.next() {
        // Recognizer models are trained at 16kHz; request it when the
        // supported range allows.
        let sample_rate =
            if config.min_sample_rate().0 <= 16_000 && config.max_sample_rate().0 >= 16_000 {
                cpal::SampleRate(16_000)
            } else {
                config.max_sample_rate()
            };
        let sample_format = config.sample_format();
        return Ok((
            StreamConfig {
                channels: config.channels(),
                sample_rate,
                buffer_size: cpal::BufferSize::Default,
            },
            sample_format,
        ));
    }

    Err(InitError::NoInputConfig)
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    channels: u16,
    mut producer: RingProducer,
    disconnected: Arc<AtomicBool>,
) -> Result<Stream, InitError> {
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("capture stream error: {}", err);
        disconnected.store(true, Ordering::SeqCst);
    };

    let mut mono: Vec<i16> = Vec::new();
    let mut handle_i16 = move |data: &[i16]| {
        if channels <= 1 {
            producer.write(data);
        } else {
            downmix(data, channels, &mut mono);
            producer.write(&mono);
        }
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &_| handle_i16(data),
            err_fn,
            None,
        )?,
        SampleFormat::F32 => {
            let mut converted: Vec<i16> = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[f32], _: &_| {
                    converted.clear();
                    converted.reserve(data.len());
                    for &s in data {
                        converted.push((s.clamp(-1.0, 1.0) * 32767.0).round() as i16);
                    }
                    handle_i16(&converted);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut converted: Vec<i16> = Vec::new();
            device.build_input_stream(
                config,
                move |data: &[u16], _: &_| {
                    converted.clear();
                    converted.reserve(data.len());
                    for &s in data {
                        // Center unsigned [0,65535] onto [-32768,32767].
                        converted.push((s as i32 - 32768) as i16);
                    }
                    handle_i16(&converted);
                },
                err_fn,
                None,
            )?
        }
        other => return Err(InitError::FormatNotSupported(other)),
    };

    Ok(stream)
}

fn downmix(samples: &[i16], channels: u16, out: &mut Vec<i16>) {
    let ch = usize::from(channels);
    out.clear();
    out.reserve(samples.len() / ch);
    for frame in samples.chunks_exact(ch) {
        let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
        out.push((sum / ch as i32) as i16);
    }
}
