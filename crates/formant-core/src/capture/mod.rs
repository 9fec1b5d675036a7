mod device;
mod resample;

pub use device::{CpalBackend, InputDevice, list_input_devices};
pub use resample::ResampleConverter;

use log::warn;

use crate::error::CaptureError;
use crate::transcribe::{AudioClip, AudioFormat, encode_wav};
use crate::types::RecordingState;

/// Target format for finalized clips: 16 kHz mono.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Requested capture settings.
///
/// The processing flags are requests; a backend honors them when its platform
/// exposes the controls.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device_id: Option<String>,
    pub noise_suppression: bool,
    pub echo_cancellation: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            noise_suppression: true,
            echo_cancellation: true,
        }
    }
}

/// Microphone capture backend abstraction.
///
/// `open` acquires the device and starts buffering; `drain` hands over mono
/// f32 samples at the backend's native rate; `close` releases the device and
/// must be safe to call in any state.
pub trait CaptureBackend {
    fn open(&mut self, config: &CaptureConfig) -> Result<u32, CaptureError>;
    fn close(&mut self);
    fn drain(&mut self) -> Vec<f32>;
}

/// Recording lifecycle controller: idle -> recording -> recorded -> idle.
///
/// Owns the one exclusively-held resource in the system, the microphone.
/// The device is released on every exit path from recording, including drop.
pub struct Recorder {
    backend: Box<dyn CaptureBackend>,
    config: CaptureConfig,
    state: RecordingState,
    native_rate: u32,
    buffered: Vec<f32>,
    clip: Option<AudioClip>,
}

impl Recorder {
    pub fn new(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        Self {
            backend,
            config,
            state: RecordingState::Idle,
            native_rate: TARGET_SAMPLE_RATE,
            buffered: Vec::new(),
            clip: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    /// Acquire the microphone and begin buffering.
    ///
    /// Valid only from idle; at most one acquisition is open at a time.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        match self.state {
            RecordingState::Idle => {}
            RecordingState::Recording => {
                return Err(CaptureError::StartFailed(
                    "recording already in progress".into(),
                ));
            }
            RecordingState::Recorded => {
                return Err(CaptureError::StartFailed(
                    "previous recording not yet taken or discarded".into(),
                ));
            }
        }
        self.buffered.clear();
        self.native_rate = self.backend.open(&self.config)?;
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Pull buffered samples out of the backend while recording.
    pub fn poll(&mut self) {
        if self.state == RecordingState::Recording {
            self.buffered.extend(self.backend.drain());
        }
    }

    /// Finalize the buffered audio into a single WAV clip and release the
    /// device. No-op outside the recording state.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if self.state != RecordingState::Recording {
            return Ok(());
        }
        self.poll();
        self.backend.close();

        let pcm = match self.resample_buffered() {
            Ok(pcm) => pcm,
            Err(err) => {
                // Device is already released; discard the broken take.
                self.buffered.clear();
                self.state = RecordingState::Idle;
                return Err(err);
            }
        };
        self.buffered.clear();
        self.clip = Some(AudioClip {
            bytes: encode_wav(&pcm, TARGET_SAMPLE_RATE),
            format: AudioFormat::Wav,
            sample_rate: TARGET_SAMPLE_RATE,
        });
        self.state = RecordingState::Recorded;
        Ok(())
    }

    /// Hand over the finalized clip; recorded -> idle.
    pub fn take_clip(&mut self) -> Option<AudioClip> {
        if self.state != RecordingState::Recorded {
            return None;
        }
        self.state = RecordingState::Idle;
        self.clip.take()
    }

    /// Discard any buffered or finalized audio and return to idle,
    /// releasing the device if a recording is active.
    pub fn reset(&mut self) {
        if self.state == RecordingState::Recording {
            self.backend.close();
        }
        self.buffered.clear();
        self.clip = None;
        self.state = RecordingState::Idle;
    }

    fn resample_buffered(&mut self) -> Result<Vec<f32>, CaptureError> {
        if self.native_rate == TARGET_SAMPLE_RATE {
            return Ok(std::mem::take(&mut self.buffered));
        }
        let mut converter = ResampleConverter::new(self.native_rate)?;
        converter.process(&self.buffered)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.state == RecordingState::Recording {
            warn!("recorder dropped while recording; releasing device");
            self.backend.close();
        }
    }
}
