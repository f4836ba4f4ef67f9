//! Stream contracts shared by every codec, filter and combinator.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A `(segno, frameno)` address inside a segmented stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub segno: usize,
    pub frameno: usize,
}

impl Position {
    pub fn new(segno: usize, frameno: usize) -> Self {
        Self { segno, frameno }
    }
}

/// Outcome of `rewind()` and `set_pos()`.
///
/// `Unsupported` is the recoverable failure: the stream cannot seek (a pipe,
/// or no segment index) and its cursor is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Seek {
    Done,
    Unsupported,
}

impl Seek {
    /// Returns true if the seek happened.
    pub fn is_done(self) -> bool {
        self == Seek::Done
    }
}

/// Segment and frame addressing common to every input stream.
///
/// Only [`nextseg`](Positionable::nextseg) is required. The provided methods
/// describe a sequential stream with no index: counts are unknown, position is
/// unknown and seeking is unsupported.
pub trait Positionable {
    /// Number of segments, if known.
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(None)
    }

    /// Number of frames in `segno`, or in the whole stream for `None`.
    fn num_frames(&self, _segno: Option<usize>) -> Result<Option<usize>> {
        Ok(None)
    }

    /// Advances to the next segment.
    ///
    /// Returns the new segment number, or `None` once the stream is exhausted.
    fn nextseg(&mut self) -> Result<Option<usize>>;

    /// Moves back to before the first segment.
    fn rewind(&mut self) -> Result<Seek> {
        Ok(Seek::Unsupported)
    }

    /// Current position; `None` before the first segment or when unknown.
    fn get_pos(&self) -> Result<Option<Position>> {
        Ok(None)
    }

    /// Jumps to frame `frameno` of segment `segno`.
    fn set_pos(&mut self, _segno: usize, _frameno: usize) -> Result<Seek> {
        Ok(Seek::Unsupported)
    }
}

/// A stream producing fixed-width float feature frames.
pub trait FeatureSource: Positionable {
    /// Number of features per frame.
    fn num_ftrs(&self) -> usize;

    /// Reads up to `count` frames into `out`, or skips them when `out` is
    /// `None`. A short count means the current segment has ended.
    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize>;

    /// Reads frames into rows `stride` values apart.
    ///
    /// The provided version reads one frame at a time unless `stride` equals
    /// the frame width.
    fn read_ftrs_strided(&mut self, count: usize, out: &mut [f32], stride: usize) -> Result<usize> {
        let width = self.num_ftrs();
        if stride == width {
            return self.read_ftrs(count, Some(out));
        }
        check_strided(out.len(), count, width, stride)?;
        debug!("strided read of {} feature frames falls back to single frames", count);
        let mut done = 0;
        while done < count {
            let row = &mut out[done * stride..done * stride + width];
            if self.read_ftrs(1, Some(row))? == 0 {
                break;
            }
            done += 1;
        }
        Ok(done)
    }
}

/// A stream producing fixed-width integer label frames.
pub trait LabelSource: Positionable {
    /// Number of labels per frame.
    fn num_labs(&self) -> usize;

    /// Reads up to `count` frames of labels; see [`FeatureSource::read_ftrs`].
    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize>;

    /// Reads label frames into rows `stride` values apart.
    fn read_labs_strided(&mut self, count: usize, out: &mut [u32], stride: usize) -> Result<usize> {
        let width = self.num_labs();
        if stride == width {
            return self.read_labs(count, Some(out));
        }
        check_strided(out.len(), count, width, stride)?;
        debug!("strided read of {} label frames falls back to single frames", count);
        let mut done = 0;
        while done < count {
            let row = &mut out[done * stride..done * stride + width];
            if self.read_labs(1, Some(row))? == 0 {
                break;
            }
            done += 1;
        }
        Ok(done)
    }
}

/// A stream carrying features and labels in the same frames.
pub trait FeatureLabelSource: FeatureSource + LabelSource {
    /// Reads features and labels of up to `count` frames together.
    fn read_ftrslabs(
        &mut self,
        count: usize,
        ftrs: Option<&mut [f32]>,
        labs: Option<&mut [u32]>,
    ) -> Result<usize>;
}

/// Segment bookkeeping of an output stream.
pub trait SegmentSink {
    /// Terminates the current segment; the next write starts a new one.
    fn doneseg(&mut self) -> Result<()>;
}

/// An output stream of feature frames.
pub trait FeatureSink: SegmentSink {
    fn num_ftrs(&self) -> usize;

    /// Appends `count` frames to the current segment.
    fn write_ftrs(&mut self, count: usize, ftrs: &[f32]) -> Result<()>;
}

/// An output stream of label frames.
pub trait LabelSink: SegmentSink {
    fn num_labs(&self) -> usize;

    /// Appends `count` label frames to the current segment.
    fn write_labs(&mut self, count: usize, labs: &[u32]) -> Result<()>;
}

/// An output stream taking features and labels together.
pub trait FeatureLabelSink: FeatureSink + LabelSink {
    fn write_ftrslabs(&mut self, count: usize, ftrs: &[f32], labs: &[u32]) -> Result<()>;
}

/// Checks that a caller buffer holds `count` frames of `width` values.
pub fn check_buffer(len: usize, count: usize, width: usize) -> Result<()> {
    let need = count * width;
    if len < need {
        return Err(Error::BufferTooSmall { need, got: len });
    }
    Ok(())
}

fn check_strided(len: usize, count: usize, width: usize, stride: usize) -> Result<()> {
    if stride < width {
        return Err(Error::InvalidConfig(format!(
            "stride {} is narrower than frame width {}",
            stride, width
        )));
    }
    let need = if count == 0 { 0 } else { (count - 1) * stride + width };
    if len < need {
        return Err(Error::BufferTooSmall { need, got: len });
    }
    Ok(())
}

macro_rules! forward_streams {
    ($($wrapper:ty),*) => {$(
        impl<T: Positionable + ?Sized> Positionable for $wrapper {
            fn num_segs(&self) -> Result<Option<usize>> {
                (**self).num_segs()
            }
            fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
                (**self).num_frames(segno)
            }
            fn nextseg(&mut self) -> Result<Option<usize>> {
                (**self).nextseg()
            }
            fn rewind(&mut self) -> Result<Seek> {
                (**self).rewind()
            }
            fn get_pos(&self) -> Result<Option<Position>> {
                (**self).get_pos()
            }
            fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
                (**self).set_pos(segno, frameno)
            }
        }

        impl<T: FeatureSource + ?Sized> FeatureSource for $wrapper {
            fn num_ftrs(&self) -> usize {
                (**self).num_ftrs()
            }
            fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
                (**self).read_ftrs(count, out)
            }
            fn read_ftrs_strided(&mut self, count: usize, out: &mut [f32], stride: usize) -> Result<usize> {
                (**self).read_ftrs_strided(count, out, stride)
            }
        }

        impl<T: LabelSource + ?Sized> LabelSource for $wrapper {
            fn num_labs(&self) -> usize {
                (**self).num_labs()
            }
            fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
                (**self).read_labs(count, out)
            }
            fn read_labs_strided(&mut self, count: usize, out: &mut [u32], stride: usize) -> Result<usize> {
                (**self).read_labs_strided(count, out, stride)
            }
        }

        impl<T: FeatureLabelSource + ?Sized> FeatureLabelSource for $wrapper {
            fn read_ftrslabs(
                &mut self,
                count: usize,
                ftrs: Option<&mut [f32]>,
                labs: Option<&mut [u32]>,
            ) -> Result<usize> {
                (**self).read_ftrslabs(count, ftrs, labs)
            }
        }

        impl<T: SegmentSink + ?Sized> SegmentSink for $wrapper {
            fn doneseg(&mut self) -> Result<()> {
                (**self).doneseg()
            }
        }

        impl<T: FeatureSink + ?Sized> FeatureSink for $wrapper {
            fn num_ftrs(&self) -> usize {
                (**self).num_ftrs()
            }
            fn write_ftrs(&mut self, count: usize, ftrs: &[f32]) -> Result<()> {
                (**self).write_ftrs(count, ftrs)
            }
        }

        impl<T: LabelSink + ?Sized> LabelSink for $wrapper {
            fn num_labs(&self) -> usize {
                (**self).num_labs()
            }
            fn write_labs(&mut self, count: usize, labs: &[u32]) -> Result<()> {
                (**self).write_labs(count, labs)
            }
        }

        impl<T: FeatureLabelSink + ?Sized> FeatureLabelSink for $wrapper {
            fn write_ftrslabs(&mut self, count: usize, ftrs: &[f32], labs: &[u32]) -> Result<()> {
                (**self).write_ftrslabs(count, ftrs, labs)
            }
        }
    )*};
}

forward_streams!(&mut T, Box<T>);
