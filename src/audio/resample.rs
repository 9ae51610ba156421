use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{Result, SessionError};

/// Mono sample-rate converter with an internal staging buffer.
///
/// The underlying resampler consumes fixed-size chunks; callers push whatever
/// they have and receive whatever full chunks produced.
pub struct MonoResampler {
    inner: FastFixedIn<f32>,
    chunk: usize,
    pending: Vec<f32>,
}

impl MonoResampler {
    pub fn new(in_rate: u32, out_rate: u32, chunk: usize) -> Result<Self> {
        let inner = FastFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            1.0,
            PolynomialDegree::Cubic,
            chunk,
            1,
        )
        .map_err(|e| SessionError::Audio(format!("failed to create resampler: {e}")))?;
        Ok(Self {
            inner,
            chunk,
            pending: Vec::with_capacity(chunk * 2),
        })
    }

    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        while self.pending.len() >= self.chunk {
            let frame: Vec<f32> = self.pending.drain(..self.chunk).collect();
            let processed = self
                .inner
                .process(&[frame], None)
                .map_err(|e| SessionError::Audio(format!("resampling failed: {e}")))?;
            out.extend_from_slice(&processed[0]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsamples_48k_to_8k() {
        let mut rs = MonoResampler::new(48_000, 8_000, 480).unwrap();
        let input = vec![0.5f32; 960];
        let out = rs.push(&input).unwrap();
        // 960 frames at a 1/6 ratio: roughly 160 output frames.
        assert!((140..=180).contains(&out.len()), "got {} frames", out.len());
    }

    #[test]
    fn buffers_partial_chunks() {
        let mut rs = MonoResampler::new(48_000, 8_000, 480).unwrap();
        assert!(rs.push(&vec![0.0f32; 100]).unwrap().is_empty());
        assert!(rs.push(&vec![0.0f32; 100]).unwrap().is_empty());
        let out = rs.push(&vec![0.0f32; 280]).unwrap();
        assert!(!out.is_empty());
    }
}
