use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

use crate::error::EngineError;

pub struct RateConverter;

impl RateConverter {
    /// Converts mono `input` from `from_rate` to `to_rate` with sinc interpolation.
    /// The output is aligned with the input (filter delay removed) and has
    /// exactly `round(len * to / from)` samples.
    pub fn convert(input: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, EngineError> {
        if from_rate == 0 || to_rate == 0 {
            return Err(EngineError::Resample("sample rate must be positive".to_string()));
        }
        if from_rate == to_rate || input.is_empty() {
            return Ok(input.to_vec());
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let expected = (input.len() as f64 * ratio).round() as usize;
        let chunk_size = 1024;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 1)
            .map_err(|e| EngineError::Resample(e.to_string()))?;

        let delay = resampler.output_delay();
        let mut output = Vec::with_capacity(expected + delay + chunk_size);
        let mut pos = 0;

        // Keep feeding (zero padded past the end) until the delayed tail is out.
        while output.len() < expected + delay {
            let mut chunk = vec![0.0; chunk_size];
            if pos < input.len() {
                let end = (pos + chunk_size).min(input.len());
                chunk[..end - pos].copy_from_slice(&input[pos..end]);
            }
            pos += chunk_size;

            let frames = vec![chunk];
            let waves = resampler
                .process(&frames, None)
                .map_err(|e| EngineError::Resample(e.to_string()))?;
            if let Some(channel) = waves.first() {
                output.extend_from_slice(channel);
            }
        }

        Ok(output[delay..delay + expected].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(RateConverter::convert(&input, 44_100, 44_100).unwrap(), input);
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let input = vec![0.0; 4410];
        let out = RateConverter::convert(&input, 44_100, 48_000).unwrap();
        assert_eq!(out.len(), 4800);

        let out = RateConverter::convert(&input, 44_100, 22_050).unwrap();
        assert_eq!(out.len(), 2205);
    }

    #[test]
    fn test_dc_level_survives() {
        let input = vec![0.5; 8000];
        let out = RateConverter::convert(&input, 48_000, 44_100).unwrap();
        let mid = out[out.len() / 2];
        assert!((mid - 0.5).abs() < 0.01, "got {mid}");
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            RateConverter::convert(&[0.0], 0, 48_000),
            Err(EngineError::Resample(_))
        ));
    }
}
