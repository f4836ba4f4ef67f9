//! Column selection.

use segstream_core::{Error, FeatureSource, Positionable, Result, check_buffer};
use tracing::{info, trace};

/// Passes through columns `[first, first + count)` of its upstream.
///
/// Upstream frames are read through an internal buffer of `buf_frames` frames
/// and the selected slice of each row is copied out.
pub struct Narrow<S> {
    upstream: S,
    first: usize,
    width: usize,
    in_width: usize,
    buf_frames: usize,
    buf: Vec<f32>,
}

impl<S: FeatureSource> Narrow<S> {
    /// Selects `count` columns starting at `first`; `None` keeps the rest of
    /// the row.
    pub fn new(upstream: S, first: usize, count: Option<usize>, buf_frames: usize) -> Result<Self> {
        let in_width = upstream.num_ftrs();
        let width = match count {
            Some(n) => n,
            None => in_width.checked_sub(first).ok_or_else(|| {
                Error::InvalidConfig(format!("first column {} past width {}", first, in_width))
            })?,
        };
        if first + width > in_width {
            return Err(Error::InvalidConfig(format!(
                "columns {}..{} exceed input width {}",
                first,
                first + width,
                in_width
            )));
        }
        if buf_frames == 0 {
            return Err(Error::InvalidConfig("narrow buffer must hold a frame".into()));
        }
        info!(
            "narrowing to features {}..{} of {}",
            first,
            first + width,
            in_width
        );
        Ok(Self {
            upstream,
            first,
            width,
            in_width,
            buf_frames,
            buf: vec![0.0; buf_frames * in_width],
        })
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }
}

impl<S: FeatureSource> Positionable for Narrow<S> {
    delegate_positionable!(upstream);
}

impl<S: FeatureSource> FeatureSource for Narrow<S> {
    fn num_ftrs(&self) -> usize {
        self.width
    }

    fn read_ftrs(&mut self, count: usize, mut out: Option<&mut [f32]>) -> Result<usize> {
        if let Some(o) = out.as_deref() {
            check_buffer(o.len(), count, self.width)?;
        }
        let (w, iw, first) = (self.width, self.in_width, self.first);
        let mut done = 0;
        while done < count {
            let want = (count - done).min(self.buf_frames);
            let got = match out.as_deref_mut() {
                None => self.upstream.read_ftrs(want, None)?,
                Some(o) => {
                    let got = self.upstream.read_ftrs(want, Some(&mut self.buf[..want * iw]))?;
                    for (row, dst) in self.buf[..got * iw]
                        .chunks_exact(iw)
                        .zip(o[done * w..(done + got) * w].chunks_exact_mut(w))
                    {
                        dst.copy_from_slice(&row[first..first + w]);
                    }
                    got
                }
            };
            done += got;
            if got < want {
                break;
            }
        }
        trace!("narrow read {} of {} frames", done, count);
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::{Position, Seek, VecStream};

    fn base() -> VecStream {
        let mut s = VecStream::new(4, 0);
        let data: Vec<f32> = (0..20).map(|v| v as f32).collect();
        s.push_segment(&data, &[]).unwrap();
        s.push_segment(&data[..8], &[]).unwrap();
        s
    }

    #[test]
    fn test_columns_equal_base_slice() {
        // A buffer smaller than the request exercises the chunk loop.
        let mut n = Narrow::new(base(), 1, Some(2), 2).unwrap();
        assert_eq!(n.num_ftrs(), 2);
        n.nextseg().unwrap();
        let mut out = [0.0; 10];
        assert_eq!(n.read_ftrs(5, Some(&mut out)).unwrap(), 5);
        assert_eq!(out, [1.0, 2.0, 5.0, 6.0, 9.0, 10.0, 13.0, 14.0, 17.0, 18.0]);
        assert_eq!(n.read_ftrs(1, Some(&mut out)).unwrap(), 0);
    }

    #[test]
    fn test_rest_of_row() {
        let mut n = Narrow::new(base(), 3, None, 8).unwrap();
        assert_eq!(n.num_ftrs(), 1);
        n.nextseg().unwrap();
        n.nextseg().unwrap();
        let mut out = [0.0; 4];
        assert_eq!(n.read_ftrs(4, Some(&mut out)).unwrap(), 2);
        assert_eq!(&out[..2], &[3.0, 7.0]);
    }

    #[test]
    fn test_skip_and_seek_forward() {
        let mut n = Narrow::new(base(), 0, Some(1), 2).unwrap();
        n.nextseg().unwrap();
        assert_eq!(n.read_ftrs(3, None).unwrap(), 3);
        assert_eq!(n.get_pos().unwrap(), Some(Position::new(0, 3)));
        assert_eq!(n.set_pos(1, 1).unwrap(), Seek::Done);
        let mut out = [0.0; 1];
        n.read_ftrs(1, Some(&mut out)).unwrap();
        assert_eq!(out[0], 4.0);
    }

    #[test]
    fn test_invalid_columns() {
        assert!(Narrow::new(base(), 3, Some(2), 4).is_err());
        assert!(Narrow::new(base(), 5, None, 4).is_err());
        assert!(Narrow::new(base(), 0, Some(1), 0).is_err());
    }
}
