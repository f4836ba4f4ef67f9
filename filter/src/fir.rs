//! FIR filtering along time, used to append delta features.

use segstream_buffer::FrameWindow;
use segstream_core::{Error, FeatureSource, Positionable, Result, check_buffer};
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

/// Parameters of [`Fir`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirConfig {
    /// Number of kernel taps.
    pub filter_len: usize,
    /// Tap aligned with the output frame; earlier taps see past frames.
    pub center: usize,
    /// First input column to filter.
    pub ftr_start: usize,
    /// Number of columns to filter; `None` filters to the end of the row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftr_count: Option<usize>,
    /// Window size in frames, including context.
    pub buf_frames: usize,
}

impl Default for FirConfig {
    fn default() -> Self {
        Self::delta(9)
    }
}

impl FirConfig {
    /// A centered kernel of `filter_len` taps over every column.
    pub fn delta(filter_len: usize) -> Self {
        Self {
            filter_len,
            center: filter_len / 2,
            ftr_start: 0,
            ftr_count: None,
            buf_frames: 128,
        }
    }

    /// Restricts filtering to `count` columns from `start`.
    pub fn columns(mut self, start: usize, count: usize) -> Self {
        self.ftr_start = start;
        self.ftr_count = Some(count);
        self
    }
}

/// Delta kernel: a linear ramp from `+m` down to `-m` around the middle tap.
///
/// The kernel is not normalized, matching the scale other tools produce.
///
/// ```
/// assert_eq!(segstream_filter::delta_kernel(5), vec![2.0, 1.0, 0.0, -1.0, -2.0]);
/// ```
pub fn delta_kernel(len: usize) -> Vec<f32> {
    let mut fv = vec![0.0; len];
    if len == 0 {
        return fv;
    }
    let mid = (len - 1) / 2;
    for i in 1..=mid {
        fv[mid + i] = -(i as f32);
        fv[mid - i] = i as f32;
    }
    fv
}

/// Double-delta kernel: a delta kernel of `(len + 1) / 2` taps convolved with
/// itself.
///
/// The result has `len` taps for odd `len`; for even `len` the last tap is
/// zero. The sign is not inverted: the center tap is negative, matching the
/// double deltas existing tools produce.
///
/// ```
/// assert_eq!(segstream_filter::double_delta_kernel(5), vec![1.0, 0.0, -2.0, 0.0, 1.0]);
/// ```
pub fn double_delta_kernel(len: usize) -> Vec<f32> {
    if len == 0 {
        return Vec::new();
    }
    let dlen = (len + 1) / 2;
    let delta = delta_kernel(dlen);
    let mut padded = vec![0.0; 3 * dlen - 2];
    padded[dlen - 1..2 * dlen - 1].copy_from_slice(&delta);
    let mut fv = convolve(&delta, &padded);
    fv.resize(len, 0.0);
    fv
}

/// Convolves `x` with the impulse response `h`, keeping only the
/// `x.len() - h.len() + 1` outputs where `h` overlaps `x` completely.
pub fn convolve(h: &[f32], x: &[f32]) -> Vec<f32> {
    if h.is_empty() || x.len() < h.len() {
        return Vec::new();
    }
    x.windows(h.len())
        .map(|w| {
            w.iter()
                .zip(h.iter().rev())
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum::<f64>() as f32
        })
        .collect()
}

/// Appends filtered copies of selected columns to every frame.
///
/// Output frames are the input frame followed by `ftr_count` filtered
/// columns. Each filtered value is the kernel applied to the frames from
/// `center` before to `filter_len - center - 1` after the output frame.
/// Frames before the segment start repeat the first frame; frames past the
/// end repeat the last one.
pub struct Fir<S> {
    window: FrameWindow<S>,
    filter: Vec<f32>,
    past: usize,
    future: usize,
    ftr_start: usize,
    add_width: usize,
    in_width: usize,
}

impl<S: FeatureSource> Fir<S> {
    pub fn new(upstream: S, kernel: &[f32], config: &FirConfig) -> Result<Self> {
        let len = config.filter_len;
        if len == 0 || kernel.len() != len {
            return Err(Error::InvalidConfig(format!(
                "kernel has {} taps, expected {}",
                kernel.len(),
                len
            )));
        }
        if config.center >= len {
            return Err(Error::InvalidConfig(format!(
                "center tap {} outside kernel of {}",
                config.center, len
            )));
        }
        let in_width = upstream.num_ftrs();
        let add_width = match config.ftr_count {
            Some(n) => n,
            None => in_width.saturating_sub(config.ftr_start),
        };
        if config.ftr_start + add_width > in_width {
            return Err(Error::InvalidConfig(format!(
                "filtered columns {}..{} exceed input width {}",
                config.ftr_start,
                config.ftr_start + add_width,
                in_width
            )));
        }
        let past = config.center;
        let future = len - config.center - 1;
        if config.buf_frames <= past + future {
            return Err(Error::InvalidConfig(format!(
                "window of {} frames cannot hold {} frames of context",
                config.buf_frames,
                past + future
            )));
        }
        info!(
            "fir: {} inputs, filtering {}+{} with {} taps centered at {}",
            in_width, config.ftr_start, add_width, len, config.center
        );
        Ok(Self {
            window: FrameWindow::new(upstream, config.buf_frames, future)?,
            filter: kernel.to_vec(),
            past,
            future,
            ftr_start: config.ftr_start,
            add_width,
            in_width,
        })
    }

    pub fn into_inner(self) -> S {
        self.window.into_inner()
    }
}

impl<S: FeatureSource> Positionable for Fir<S> {
    delegate_positionable!(window);
}

impl<S: FeatureSource> FeatureSource for Fir<S> {
    fn num_ftrs(&self) -> usize {
        self.in_width + self.add_width
    }

    fn read_ftrs(&mut self, count: usize, mut out: Option<&mut [f32]>) -> Result<usize> {
        let segno = self.window.segno().ok_or(Error::NotPositioned)?;
        let (iw, ow) = (self.in_width, self.num_ftrs());
        if let Some(o) = out.as_deref() {
            check_buffer(o.len(), count, ow)?;
        }
        let context = self.past + self.future;
        let step = self.window.capacity() - context;
        let start_pos = self.window.pos();
        let mut done = 0;
        while done < count {
            let req = (count - done).min(step);
            let total = req + context;
            let earliest = self.window.pos() as isize - self.past as isize;
            let got = self.window.fill(earliest, total)?;
            let produced = got.saturating_sub(context);
            if let Some(o) = out.as_deref_mut() {
                let frames = self.window.frames();
                for frm in 0..produced {
                    let dst = &mut o[(done + frm) * ow..(done + frm + 1) * ow];
                    let src = (self.past + frm) * iw;
                    dst[..iw].copy_from_slice(&frames[src..src + iw]);
                    for ftr in 0..self.add_width {
                        let col = self.ftr_start + ftr;
                        let mut acc = 0.0f64;
                        for (j, &tap) in self.filter.iter().rev().enumerate() {
                            acc += tap as f64 * frames[(frm + j) * iw + col] as f64;
                        }
                        dst[iw + ftr] = acc as f32;
                    }
                }
            }
            done += produced;
            self.window.advance(produced);
            if got < total {
                break;
            }
        }
        trace!(
            "fir read {} of {} frames at ({}, {})",
            done, count, segno, start_pos
        );
        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::{Position, Seek, VecStream};

    fn stream(segs: &[&[f32]], width: usize) -> VecStream {
        let mut s = VecStream::new(width, 0);
        for seg in segs {
            s.push_segment(seg, &[]).unwrap();
        }
        s
    }

    #[test]
    fn test_kernels() {
        assert_eq!(delta_kernel(3), vec![1.0, 0.0, -1.0]);
        assert_eq!(delta_kernel(1), vec![0.0]);
        assert_eq!(
            double_delta_kernel(9),
            vec![4.0, 4.0, 1.0, -4.0, -10.0, -4.0, 1.0, 4.0, 4.0]
        );
        assert_eq!(double_delta_kernel(4), vec![0.0; 4]);
        assert!(double_delta_kernel(0).is_empty());
    }

    #[test]
    fn test_convolve_valid_part() {
        assert_eq!(convolve(&[1.0, 2.0], &[1.0, 0.0, 0.0, 3.0]), vec![2.0, 0.0, 3.0]);
        assert!(convolve(&[1.0, 2.0, 3.0], &[1.0]).is_empty());
    }

    #[test]
    fn test_delta_of_constant_is_zero() {
        let seg = [2.5f32; 20];
        let mut fir = Fir::new(stream(&[&seg], 1), &delta_kernel(9), &FirConfig::delta(9)).unwrap();
        fir.nextseg().unwrap();
        let mut out = [1.0f32; 40];
        assert_eq!(fir.read_ftrs(20, Some(&mut out)).unwrap(), 20);
        for frame in out.chunks(2) {
            assert_eq!(frame, &[2.5, 0.0]);
        }
    }

    #[test]
    fn test_delta_of_ramp_with_edge_padding() {
        let seg: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let mut fir = Fir::new(stream(&[&seg], 1), &delta_kernel(3), &FirConfig::delta(3)).unwrap();
        assert_eq!(fir.num_ftrs(), 2);
        fir.nextseg().unwrap();
        let mut out = [0.0; 20];
        assert_eq!(fir.read_ftrs(10, Some(&mut out)).unwrap(), 6);
        let deltas: Vec<f32> = out[..12].chunks(2).map(|f| f[1]).collect();
        assert_eq!(deltas, vec![1.0, 2.0, 2.0, 2.0, 2.0, 1.0]);
        assert_eq!(fir.read_ftrs(1, Some(&mut out)).unwrap(), 0);
    }

    #[test]
    fn test_small_window_reads_in_steps() {
        // A window of 4 frames with 2 of context yields 2 frames per fill; the
        // sequential stream proves no backward seek is needed.
        let mut s = VecStream::sequential(1, 0);
        let seg: Vec<f32> = (0..7).map(|v| (v * v) as f32).collect();
        s.push_segment(&seg, &[]).unwrap();
        let config = FirConfig {
            buf_frames: 4,
            ..FirConfig::delta(3)
        };
        let mut fir = Fir::new(s, &delta_kernel(3), &config).unwrap();
        fir.nextseg().unwrap();
        let mut out = [0.0; 14];
        assert_eq!(fir.read_ftrs(7, Some(&mut out)).unwrap(), 7);
        let deltas: Vec<f32> = out.chunks(2).map(|f| f[1]).collect();
        assert_eq!(deltas, vec![1.0, 4.0, 8.0, 12.0, 16.0, 20.0, 11.0]);
    }

    #[test]
    fn test_column_selection() {
        let seg = [0.0, 10.0, 100.0, 1.0, 20.0, 100.0, 2.0, 30.0, 100.0];
        let config = FirConfig::delta(3).columns(1, 1);
        let mut fir = Fir::new(stream(&[&seg], 3), &delta_kernel(3), &config).unwrap();
        assert_eq!(fir.num_ftrs(), 4);
        fir.nextseg().unwrap();
        let mut out = [0.0; 12];
        fir.read_ftrs(3, Some(&mut out)).unwrap();
        assert_eq!(&out[4..8], &[1.0, 20.0, 100.0, 20.0]);
    }

    #[test]
    fn test_positioning() {
        let seg: Vec<f32> = (0..10).map(|v| v as f32).collect();
        let mut fir =
            Fir::new(stream(&[&seg, &seg], 1), &delta_kernel(5), &FirConfig::delta(5)).unwrap();
        assert!(matches!(fir.read_ftrs(1, None), Err(Error::NotPositioned)));
        assert_eq!(fir.set_pos(1, 5).unwrap(), Seek::Done);
        let mut out = [0.0; 2];
        fir.read_ftrs(1, Some(&mut out)).unwrap();
        // 2 * (7 - 3) + (6 - 4) = 10
        assert_eq!(out, [5.0, 10.0]);
        assert_eq!(fir.get_pos().unwrap(), Some(Position::new(1, 6)));
        assert_eq!(fir.rewind().unwrap(), Seek::Done);
        assert_eq!(fir.nextseg().unwrap(), Some(0));
    }

    #[test]
    fn test_invalid_configs() {
        let s = || stream(&[&[0.0]], 1);
        assert!(Fir::new(s(), &delta_kernel(3), &FirConfig::delta(5)).is_err());
        let narrow_window = FirConfig {
            buf_frames: 4,
            ..FirConfig::delta(5)
        };
        assert!(Fir::new(s(), &delta_kernel(5), &narrow_window).is_err());
        let bad_center = FirConfig {
            center: 3,
            ..FirConfig::delta(3)
        };
        assert!(Fir::new(s(), &delta_kernel(3), &bad_center).is_err());
        assert!(Fir::new(s(), &delta_kernel(3), &FirConfig::delta(3).columns(0, 2)).is_err());
    }
}
