//! Per-segment mean and variance normalization.

use segstream_core::{Error, FeatureSource, Position, Positionable, Result, Seek};
use tracing::{debug, info, trace, warn};

use crate::norm::NormVectors;

const STATS_CHUNK: usize = 64;
// Variance floor relative to the column's mean square.
const VAR_FLOOR: f64 = 1e-6;

/// Normalizes each segment to zero mean and unit variance using statistics of
/// that whole segment.
///
/// Entering a segment reads it to the end once to gather statistics, then
/// seeks back, so the upstream must support `set_pos`. A seek that fails at
/// that point is an error.
pub struct NormUtts<S> {
    upstream: S,
    norms: NormVectors,
    segno: Option<usize>,
    buf: Vec<f32>,
}

impl<S: FeatureSource> NormUtts<S> {
    pub fn new(upstream: S) -> Self {
        let width = upstream.num_ftrs();
        info!("per-segment normalization of {} features", width);
        Self {
            upstream,
            norms: NormVectors::identity(width),
            segno: None,
            buf: vec![0.0; STATS_CHUNK * width],
        }
    }

    /// Bias and scale in effect for the current segment.
    pub fn norms(&self) -> &NormVectors {
        &self.norms
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }

    fn seek_upstream(&mut self, segno: usize, frameno: usize) -> Result<()> {
        match self.upstream.set_pos(segno, frameno)? {
            Seek::Done => Ok(()),
            Seek::Unsupported => Err(Error::NotSeekable(
                "per-segment normalization must re-read each segment",
            )),
        }
    }

    // Reads from the upstream cursor to the end of the segment.
    fn compute_norms(&mut self, segno: usize) -> Result<()> {
        let w = self.norms.width();
        let mut sum = vec![0.0f64; w];
        let mut sum2 = vec![0.0f64; w];
        let mut frames = 0usize;
        loop {
            let got = self.upstream.read_ftrs(STATS_CHUNK, Some(&mut self.buf))?;
            for frame in self.buf[..got * w].chunks_exact(w.max(1)) {
                for (i, &x) in frame.iter().enumerate() {
                    let x = x as f64;
                    sum[i] += x;
                    sum2[i] += x * x;
                }
            }
            frames += got;
            if got < STATS_CHUNK {
                break;
            }
        }
        if frames == 0 {
            debug!("segment {} is empty, using identity norms", segno);
            self.norms = NormVectors::identity(w);
            return Ok(());
        }

        let n = frames as f64;
        let unbias = if frames > 1 { n / (n - 1.0) } else { 1.0 };
        let mut zero_column = false;
        let mut floored = false;
        for i in 0..w {
            let mean = sum[i] / n;
            let mut mean_sq = sum2[i] / n;
            if mean_sq == 0.0 {
                zero_column = true;
                mean_sq = 1.0;
            }
            let mut var = (sum2[i] / n - mean * mean) * unbias;
            if var / mean_sq < VAR_FLOOR {
                floored = true;
                var = VAR_FLOOR * mean_sq;
            }
            self.norms.bias[i] = -mean as f32;
            self.norms.scale[i] = (1.0 / var.sqrt()) as f32;
        }
        if zero_column {
            warn!("feature identically zero within segment {}", segno);
        }
        if floored {
            warn!("excessively small variance within segment {}", segno);
        }
        debug!("segment {}: normalized over {} frames", segno, frames);
        trace!("bias {:?} scale {:?}", self.norms.bias, self.norms.scale);
        Ok(())
    }
}

impl<S: FeatureSource> Positionable for NormUtts<S> {
    fn num_segs(&self) -> Result<Option<usize>> {
        self.upstream.num_segs()
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        self.upstream.num_frames(segno)
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let Some(segno) = self.upstream.nextseg()? else {
            self.segno = None;
            return Ok(None);
        };
        self.segno = Some(segno);
        self.compute_norms(segno)?;
        self.seek_upstream(segno, 0)?;
        Ok(Some(segno))
    }

    fn rewind(&mut self) -> Result<Seek> {
        let res = self.upstream.rewind()?;
        if res.is_done() {
            self.segno = None;
        }
        Ok(res)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        self.upstream.get_pos()
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        if self.segno != Some(segno) {
            if !self.upstream.set_pos(segno, 0)?.is_done() {
                return Ok(Seek::Unsupported);
            }
            self.segno = Some(segno);
            self.compute_norms(segno)?;
        }
        self.seek_upstream(segno, frameno)?;
        Ok(Seek::Done)
    }
}

impl<S: FeatureSource> FeatureSource for NormUtts<S> {
    fn num_ftrs(&self) -> usize {
        self.norms.width()
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        match out {
            None => self.upstream.read_ftrs(count, None),
            Some(o) => {
                let got = self.upstream.read_ftrs(count, Some(&mut *o))?;
                self.norms.apply(&mut o[..got * self.norms.width()]);
                Ok(got)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    fn two_segments() -> VecStream {
        let mut s = VecStream::new(2, 0);
        s.push_segment(&[1.0, 10.0, 3.0, 10.0, 5.0, 10.0], &[]).unwrap();
        s.push_segment(&[0.0, -2.0, 0.0, 2.0], &[]).unwrap();
        s
    }

    #[test]
    fn test_segment_normalized_to_zero_mean_unit_variance() {
        let mut n = NormUtts::new(two_segments());
        assert_eq!(n.nextseg().unwrap(), Some(0));
        let mut out = [0.0; 6];
        assert_eq!(n.read_ftrs(3, Some(&mut out)).unwrap(), 3);
        // Column 0: mean 3, unbiased variance 4.
        assert!((out[0] + 1.0).abs() < 1e-6);
        assert!(out[2].abs() < 1e-6);
        assert!((out[4] - 1.0).abs() < 1e-6);
        assert_eq!(n.norms().bias[0], -3.0);
    }

    #[test]
    fn test_constant_column_hits_variance_floor() {
        let mut n = NormUtts::new(two_segments());
        n.nextseg().unwrap();
        // Column 1 is constant 10: variance floored to 1e-6 * 100.
        let expected = (1.0 / (1e-4f64).sqrt()) as f32;
        assert!((n.norms().scale[1] - expected).abs() < 1e-3);
    }

    #[test]
    fn test_zero_column_uses_unit_mean_square() {
        let mut n = NormUtts::new(two_segments());
        n.nextseg().unwrap();
        n.nextseg().unwrap();
        assert_eq!(n.norms().bias[0], 0.0);
        assert!((n.norms().scale[0] - 1000.0).abs() < 1e-2);
        let mut out = [0.0; 4];
        assert_eq!(n.read_ftrs(2, Some(&mut out)).unwrap(), 2);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_set_pos_recomputes_for_new_segment() {
        let mut n = NormUtts::new(two_segments());
        assert_eq!(n.set_pos(0, 2).unwrap(), Seek::Done);
        assert_eq!(n.get_pos().unwrap(), Some(Position::new(0, 2)));
        let mut out = [0.0; 2];
        n.read_ftrs(1, Some(&mut out)).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_requires_seekable_upstream() {
        let mut s = VecStream::sequential(1, 0);
        s.push_segment(&[1.0, 2.0], &[]).unwrap();
        let mut n = NormUtts::new(s);
        assert!(matches!(n.nextseg(), Err(Error::NotSeekable(_))));
    }
}
