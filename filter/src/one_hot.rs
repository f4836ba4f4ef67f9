//! Labels to one-hot feature vectors.

use segstream_core::{Error, FeatureSource, LabelSource, Positionable, Result, check_buffer};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Parameters of [`OneHot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneHotConfig {
    /// Output width; labels must be below it.
    pub size: usize,
    /// Value at the label's column.
    pub high: f32,
    /// Value everywhere else.
    pub low: f32,
    /// Labels read from upstream per chunk.
    pub buf_frames: usize,
}

impl Default for OneHotConfig {
    fn default() -> Self {
        Self {
            size: 0,
            high: 1.0,
            low: 0.0,
            buf_frames: 128,
        }
    }
}

/// Turns a single-column label stream into `size` features per frame.
pub struct OneHot<S> {
    upstream: S,
    size: usize,
    high: f32,
    low: f32,
    buf: Vec<u32>,
}

impl<S: LabelSource> OneHot<S> {
    pub fn new(upstream: S, config: &OneHotConfig) -> Result<Self> {
        if upstream.num_labs() != 1 {
            return Err(Error::WidthMismatch {
                expected: 1,
                got: upstream.num_labs(),
            });
        }
        if config.size == 0 || config.buf_frames == 0 {
            return Err(Error::InvalidConfig(
                "one-hot size and buffer must be positive".into(),
            ));
        }
        info!(
            "one-hot features: size={} high={} low={}",
            config.size, config.high, config.low
        );
        Ok(Self {
            upstream,
            size: config.size,
            high: config.high,
            low: config.low,
            buf: vec![0; config.buf_frames],
        })
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }
}

impl<S: LabelSource> Positionable for OneHot<S> {
    delegate_positionable!(upstream);
}

impl<S: LabelSource> FeatureSource for OneHot<S> {
    fn num_ftrs(&self) -> usize {
        self.size
    }

    fn read_ftrs(&mut self, count: usize, mut out: Option<&mut [f32]>) -> Result<usize> {
        let size = self.size;
        if let Some(o) = out.as_deref() {
            check_buffer(o.len(), count, size)?;
        }
        let mut done = 0;
        while done < count {
            let want = (count - done).min(self.buf.len());
            let got = self.upstream.read_labs(want, Some(&mut self.buf[..want]))?;
            for &lab in &self.buf[..got] {
                if lab as usize >= size {
                    return Err(Error::LabelOutOfRange { label: lab, size });
                }
            }
            if let Some(o) = out.as_deref_mut() {
                let rows = o[done * size..(done + got) * size].chunks_exact_mut(size);
                for (row, &lab) in rows.zip(&self.buf[..got]) {
                    row.fill(self.low);
                    row[lab as usize] = self.high;
                }
            }
            done += got;
            if got < want {
                break;
            }
        }
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    fn labels(labs: &[u32]) -> VecStream {
        let mut s = VecStream::new(0, 1);
        s.push_segment(&[], labs).unwrap();
        s
    }

    #[test]
    fn test_one_hot_rows() {
        let config = OneHotConfig {
            size: 3,
            high: 0.9,
            low: 0.1,
            buf_frames: 2,
        };
        let mut h = OneHot::new(labels(&[2, 0, 1]), &config).unwrap();
        h.nextseg().unwrap();
        let mut out = [0.0; 12];
        assert_eq!(h.read_ftrs(4, Some(&mut out)).unwrap(), 3);
        assert_eq!(
            &out[..9],
            &[0.1, 0.1, 0.9, 0.9, 0.1, 0.1, 0.1, 0.9, 0.1]
        );
    }

    #[test]
    fn test_label_out_of_range() {
        let config = OneHotConfig {
            size: 2,
            ..Default::default()
        };
        let mut h = OneHot::new(labels(&[1, 2]), &config).unwrap();
        h.nextseg().unwrap();
        assert!(matches!(
            h.read_ftrs(2, None),
            Err(Error::LabelOutOfRange { label: 2, size: 2 })
        ));
    }

    #[test]
    fn test_requires_single_label_column() {
        let s = VecStream::new(0, 2);
        let config = OneHotConfig {
            size: 4,
            ..Default::default()
        };
        assert!(matches!(
            OneHot::new(s, &config),
            Err(Error::WidthMismatch { expected: 1, got: 2 })
        ));
        assert!(OneHot::new(labels(&[0]), &OneHotConfig::default()).is_err());
    }
}
