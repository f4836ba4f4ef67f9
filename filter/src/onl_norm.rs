//! Online (running) normalization.

use segstream_core::{Error, FeatureSource, Position, Positionable, Result, Seek};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::norm::NormVectors;

const REPLAY_CHUNK: usize = 32;

/// Parameters of [`OnlNorm`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnlNormConfig {
    /// Update rate of the running means.
    pub alpha_m: f64,
    /// Update rate of the running variances.
    pub alpha_v: f64,
    /// Starting bias per column; zeros when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bias: Option<Vec<f32>>,
    /// Starting scale per column; ones when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec<f32>>,
}

impl Default for OnlNormConfig {
    fn default() -> Self {
        Self {
            alpha_m: 1.0 / 200.0,
            alpha_v: 1.0 / 200.0,
            bias: None,
            scale: None,
        }
    }
}

/// Normalizes with exponentially updated per-column mean and variance.
///
/// For each frame and column, before the frame is normalized:
///
/// ```text
/// mean' = (1 - alpha_m) mean + alpha_m x
/// var'  = (1 - alpha_v) var  + alpha_v (x - mean')^2
/// ```
///
/// Statistics restart from the configured defaults at every segment. Skipped
/// frames still update them. Seeking into the middle of a segment replays the
/// frames before the target.
pub struct OnlNorm<S> {
    upstream: S,
    alpha_m: f64,
    alpha_v: f64,
    defaults: NormVectors,
    current: NormVectors,
    buf: Vec<f32>,
}

impl<S: FeatureSource> OnlNorm<S> {
    pub fn new(upstream: S, config: &OnlNormConfig) -> Result<Self> {
        let width = upstream.num_ftrs();
        for alpha in [config.alpha_m, config.alpha_v] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(Error::InvalidConfig(format!(
                    "online norm rate {} outside [0, 1]",
                    alpha
                )));
            }
        }
        let mut defaults = NormVectors::identity(width);
        if let Some(b) = &config.bias {
            defaults.bias = b.clone();
        }
        if let Some(s) = &config.scale {
            defaults.scale = s.clone();
        }
        defaults.check_width(width)?;
        info!(
            "online normalization of {} features, alpha_m={} alpha_v={}",
            width, config.alpha_m, config.alpha_v
        );
        Ok(Self {
            upstream,
            alpha_m: config.alpha_m,
            alpha_v: config.alpha_v,
            current: defaults.clone(),
            defaults,
            buf: Vec::new(),
        })
    }

    /// Current bias and scale.
    pub fn norms(&self) -> &NormVectors {
        &self.current
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }

    fn reset(&mut self) {
        self.current.clone_from(&self.defaults);
    }

    fn update_and_apply(&mut self, frames: &mut [f32]) {
        let w = self.current.width();
        if w == 0 {
            return;
        }
        let (am, av) = (self.alpha_m, self.alpha_v);
        for frame in frames.chunks_exact_mut(w) {
            for (j, x) in frame.iter_mut().enumerate() {
                let scale = self.current.scale[j] as f64;
                let mut mean = -self.current.bias[j] as f64;
                let mut var = 1.0 / (scale * scale);
                let v = *x as f64;
                mean = (1.0 - am) * mean + am * v;
                let d = v - mean;
                var = (1.0 - av) * var + av * d * d;
                self.current.bias[j] = -mean as f32;
                self.current.scale[j] = (1.0 / var.sqrt()) as f32;
            }
            self.current.apply(frame);
        }
    }
}

impl<S: FeatureSource> Positionable for OnlNorm<S> {
    fn num_segs(&self) -> Result<Option<usize>> {
        self.upstream.num_segs()
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        self.upstream.num_frames(segno)
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let next = self.upstream.nextseg()?;
        self.reset();
        Ok(next)
    }

    fn rewind(&mut self) -> Result<Seek> {
        let res = self.upstream.rewind()?;
        self.reset();
        Ok(res)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        self.upstream.get_pos()
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        let res = self.upstream.set_pos(segno, 0)?;
        if !res.is_done() {
            return Ok(res);
        }
        self.reset();
        if frameno > 0 {
            warn!(
                "slow seek to ({}, {}) replays frames through online norm",
                segno, frameno
            );
            let mut left = frameno;
            while left > 0 {
                let got = self.read_ftrs(left.min(REPLAY_CHUNK), None)?;
                if got == 0 {
                    return Err(Error::SeekOutOfRange { segno, frameno });
                }
                left -= got;
            }
        }
        Ok(Seek::Done)
    }
}

impl<S: FeatureSource> FeatureSource for OnlNorm<S> {
    fn num_ftrs(&self) -> usize {
        self.current.width()
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        let w = self.current.width();
        match out {
            Some(o) => {
                let got = self.upstream.read_ftrs(count, Some(&mut *o))?;
                self.update_and_apply(&mut o[..got * w]);
                Ok(got)
            }
            None => {
                // Skipped frames go through a scratch buffer so the statistics
                // still see them.
                let mut buf = std::mem::take(&mut self.buf);
                buf.resize(REPLAY_CHUNK * w, 0.0);
                let mut done = 0;
                let res = loop {
                    let want = (count - done).min(REPLAY_CHUNK);
                    if want == 0 {
                        break Ok(done);
                    }
                    match self.upstream.read_ftrs(want, Some(&mut buf[..want * w])) {
                        Ok(got) => {
                            self.update_and_apply(&mut buf[..got * w]);
                            done += got;
                            if got < want {
                                break Ok(done);
                            }
                        }
                        Err(e) => break Err(e),
                    }
                };
                self.buf = buf;
                if let Ok(n) = &res {
                    trace!("skipped {} frames", n);
                }
                res
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    fn stream() -> VecStream {
        let mut s = VecStream::new(1, 0);
        s.push_segment(&[2.0, 4.0, 6.0, 8.0], &[]).unwrap();
        s.push_segment(&[1.0], &[]).unwrap();
        s
    }

    fn config(alpha: f64) -> OnlNormConfig {
        OnlNormConfig {
            alpha_m: alpha,
            alpha_v: alpha,
            bias: Some(vec![-1.0]),
            scale: Some(vec![0.5]),
        }
    }

    #[test]
    fn test_defaults_after_nextseg() {
        let mut n = OnlNorm::new(stream(), &config(0.5)).unwrap();
        n.nextseg().unwrap();
        n.read_ftrs(2, None).unwrap();
        assert_ne!(n.norms().bias, vec![-1.0]);
        n.nextseg().unwrap();
        assert_eq!(n.norms().bias, vec![-1.0]);
        assert_eq!(n.norms().scale, vec![0.5]);
    }

    #[test]
    fn test_running_update() {
        let mut n = OnlNorm::new(stream(), &config(0.5)).unwrap();
        n.nextseg().unwrap();
        let mut out = [0.0; 1];
        n.read_ftrs(1, Some(&mut out)).unwrap();
        // mean 1 -> 1.5, var 4 -> 0.5 * 4 + 0.5 * 0.25 = 2.125.
        assert_eq!(n.norms().bias, vec![-1.5]);
        let scale = (1.0 / 2.125f64.sqrt()) as f32;
        assert!((n.norms().scale[0] - scale).abs() < 1e-6);
        assert!((out[0] - 0.5 * scale).abs() < 1e-6);
    }

    #[test]
    fn test_zero_rate_is_fixed_norm() {
        let mut n = OnlNorm::new(stream(), &config(0.0)).unwrap();
        n.nextseg().unwrap();
        let mut out = [0.0; 4];
        n.read_ftrs(4, Some(&mut out)).unwrap();
        assert_eq!(out, [0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_mid_segment_seek_replays() {
        let mut a = OnlNorm::new(stream(), &config(0.25)).unwrap();
        a.nextseg().unwrap();
        let mut seq = [0.0; 4];
        a.read_ftrs(4, Some(&mut seq)).unwrap();

        let mut b = OnlNorm::new(stream(), &config(0.25)).unwrap();
        assert_eq!(b.set_pos(0, 3).unwrap(), Seek::Done);
        let mut out = [0.0; 1];
        b.read_ftrs(1, Some(&mut out)).unwrap();
        assert_eq!(out[0], seq[3]);
        assert!(matches!(b.set_pos(1, 2), Err(Error::SeekOutOfRange { .. })));
    }

    #[test]
    fn test_config_from_yaml() {
        let c: OnlNormConfig = serde_yaml::from_str("alpha_m: 0.01\n").unwrap();
        assert_eq!(c.alpha_m, 0.01);
        assert_eq!(c.alpha_v, 1.0 / 200.0);
        assert!(c.bias.is_none());
        assert!(OnlNorm::new(stream(), &OnlNormConfig { alpha_v: 2.0, ..c }).is_err());
    }
}
