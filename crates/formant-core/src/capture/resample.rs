use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::TARGET_SAMPLE_RATE;
use crate::error::CaptureError;

/// Resamples mono audio from a device's native rate to 16 kHz using a
/// windowed sinc filter.
pub struct ResampleConverter {
    inner: SincFixedIn<f32>,
    chunk_size: usize,
    ratio: f64,
}

impl ResampleConverter {
    pub fn new(input_rate: u32) -> Result<Self, CaptureError> {
        if input_rate == 0 {
            return Err(CaptureError::ConfigFailed("input rate must be nonzero".into()));
        }
        let ratio = f64::from(TARGET_SAMPLE_RATE) / f64::from(input_rate);
        // 10 ms of input per processing chunk.
        let chunk_size = (input_rate / 100).max(1) as usize;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            oversampling_factor: 256,
            interpolation: SincInterpolationType::Linear,
            window: WindowFunction::BlackmanHarris2,
        };

        let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 1)
            .map_err(|e| CaptureError::ConfigFailed(e.to_string()))?;

        Ok(Self {
            inner: resampler,
            chunk_size,
            ratio,
        })
    }

    /// Resample a buffer of native-rate mono f32 samples to 16 kHz.
    /// Trailing samples short of a full chunk (under 10 ms) are dropped.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>, CaptureError> {
        let mut output = Vec::with_capacity((input.len() as f64 * self.ratio) as usize + 64);

        let full_chunks = input.len() / self.chunk_size;
        for i in 0..full_chunks {
            let start = i * self.chunk_size;
            let chunk = &input[start..start + self.chunk_size];

            let result = self
                .inner
                .process(&[chunk], None)
                .map_err(|e| CaptureError::Backend(e.to_string()))?;

            if let Some(channel) = result.first() {
                output.extend_from_slice(channel);
            }
        }

        Ok(output)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_length_tracks_ratio_from_48k() {
        let mut resampler = ResampleConverter::new(48_000).unwrap();
        let input_len = resampler.chunk_size() * 100;
        let input: Vec<f32> = vec![0.0; input_len];
        let output = resampler.process(&input).unwrap();

        let expected = input_len / 3;
        let tolerance = expected / 10; // filter delay
        assert!(
            output.len().abs_diff(expected) < tolerance,
            "output {} not close to expected {}",
            output.len(),
            expected
        );
    }

    #[test]
    fn partial_trailing_chunk_is_dropped() {
        let mut resampler = ResampleConverter::new(48_000).unwrap();
        let chunk = resampler.chunk_size();
        let input: Vec<f32> = vec![0.0; chunk * 5 + 100];
        let output = resampler.process(&input).unwrap();

        let expected = chunk * 5 / 3;
        let tolerance = expected / 5;
        assert!(
            output.len().abs_diff(expected) < tolerance,
            "output {} not close to expected {}",
            output.len(),
            expected
        );
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let mut resampler = ResampleConverter::new(44_100).unwrap();
        let output = resampler.process(&[]).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(ResampleConverter::new(0).is_err());
    }
}
