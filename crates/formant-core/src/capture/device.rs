use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use log::warn;

use super::{CaptureBackend, CaptureConfig};
use crate::error::CaptureError;

/// Ring capacity: 60 seconds at 48 kHz mono. Bounds a single un-polled take.
const RING_CAPACITY: usize = 2_880_000;

/// An available input device.
#[derive(Debug, Clone)]
pub struct InputDevice {
    pub id: String,
    pub label: String,
    pub is_default: bool,
}

/// Enumerate microphone input devices.
pub fn list_input_devices() -> Result<Vec<InputDevice>, CaptureError> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|device| device.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Backend(format!("device enumeration failed: {e}")))?;

    let mut found = Vec::new();
    for (index, device) in devices.enumerate() {
        let label = device
            .name()
            .unwrap_or_else(|_| format!("Microphone {}", index + 1));
        let is_default = default_name.as_deref() == Some(label.as_str());
        found.push(InputDevice {
            id: label.clone(),
            label,
            is_default,
        });
    }
    Ok(found)
}

/// cpal-based microphone backend.
///
/// The stream callback folds interleaved input to mono and writes into an
/// SPSC ring; `drain` pops from the consumer side on the controller thread.
/// cpal exposes no noise suppression or echo cancellation controls, so those
/// config flags are not applied here.
pub struct CpalBackend {
    stream: Option<Stream>,
    consumer: Option<rtrb::Consumer<f32>>,
    dropped: Arc<AtomicU64>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            stream: None,
            consumer: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CpalBackend {
    fn open(&mut self, config: &CaptureConfig) -> Result<u32, CaptureError> {
        let host = cpal::default_host();
        let device = match &config.device_id {
            Some(id) => host
                .input_devices()
                .map_err(|e| CaptureError::Backend(format!("device enumeration failed: {e}")))?
                .find(|device| device.name().map(|name| &name == id).unwrap_or(false))
                .ok_or_else(|| {
                    CaptureError::DeviceUnavailable(format!("input device not found: {id}"))
                })?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::ConfigFailed(format!("no default input config: {e}")))?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.config();
        let sample_rate = stream_config.sample_rate.0;
        let channels = usize::from(stream_config.channels.max(1));

        let (producer, consumer) = rtrb::RingBuffer::<f32>::new(RING_CAPACITY);
        let dropped = Arc::clone(&self.dropped);
        let error_callback = |err: cpal::StreamError| {
            warn!("input stream error: {err}");
        };

        let stream = match sample_format {
            SampleFormat::F32 => {
                let mut producer = producer;
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        push_mono(&mut producer, &dropped, data, channels, |s| s);
                    },
                    error_callback,
                    None,
                )
            }
            SampleFormat::I16 => {
                let mut producer = producer;
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        push_mono(&mut producer, &dropped, data, channels, i16_to_f32);
                    },
                    error_callback,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut producer = producer;
                device.build_input_stream(
                    &stream_config,
                    move |data: &[u16], _| {
                        push_mono(&mut producer, &dropped, data, channels, u16_to_f32);
                    },
                    error_callback,
                    None,
                )
            }
            other => {
                return Err(CaptureError::ConfigFailed(format!(
                    "unsupported sample format: {other}"
                )));
            }
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable("device not available".into())
            }
            other => CaptureError::StartFailed(other.to_string()),
        })?;

        stream
            .play()
            .map_err(|e| CaptureError::StartFailed(e.to_string()))?;

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        Ok(sample_rate)
    }

    fn close(&mut self) {
        self.stream = None;
        self.consumer = None;
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("capture ring overflowed; {dropped} callback buffers dropped");
        }
    }

    fn drain(&mut self) -> Vec<f32> {
        let Some(consumer) = self.consumer.as_mut() else {
            return Vec::new();
        };
        let mut samples = Vec::with_capacity(consumer.slots());
        while let Ok(sample) = consumer.pop() {
            samples.push(sample);
        }
        samples
    }
}

fn push_mono<T: Copy>(
    producer: &mut rtrb::Producer<f32>,
    dropped: &AtomicU64,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) {
    let frames = data.len() / channels.max(1);
    if producer.slots() < frames {
        dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }
    for frame in 0..frames {
        let sum: f32 = (0..channels)
            .map(|ch| convert(data[frame * channels + ch]))
            .sum();
        let mono = sum / channels as f32;
        if producer.push(mono).is_err() {
            dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
    }
}

fn i16_to_f32(sample: i16) -> f32 {
    f32::from(sample) / f32::from(i16::MAX)
}

fn u16_to_f32(sample: u16) -> f32 {
    (f32::from(sample) - 32_768.0) / 32_768.0
}
