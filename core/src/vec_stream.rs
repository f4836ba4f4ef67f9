//! In-memory segmented stream.

use tracing::trace;

use crate::error::{Error, Result};
use crate::stream::{
    FeatureLabelSource, FeatureSource, LabelSource, Position, Positionable, Seek, check_buffer,
};

struct Segment {
    ftrs: Vec<f32>,
    labs: Vec<u32>,
    frames: usize,
}

/// A feature/label stream held entirely in memory.
///
/// The stream is indexed, so it supports every positioning call, unless it was
/// built with [`VecStream::sequential`], which behaves like a pipe: counts and
/// position are unknown and seeking is unsupported.
///
/// ```
/// use segstream_core::{FeatureSource, Positionable, VecStream};
///
/// let mut s = VecStream::new(1, 0);
/// s.push_segment(&[0.5, 1.5], &[]).unwrap();
/// assert_eq!(s.nextseg().unwrap(), Some(0));
/// let mut out = [0.0; 2];
/// assert_eq!(s.read_ftrs(2, Some(&mut out)).unwrap(), 2);
/// assert_eq!(out, [0.5, 1.5]);
/// ```
pub struct VecStream {
    n_ftrs: usize,
    n_labs: usize,
    indexed: bool,
    segs: Vec<Segment>,
    // None before the first segment.
    segno: Option<usize>,
    frameno: usize,
}

impl VecStream {
    /// Creates an empty indexed stream.
    pub fn new(n_ftrs: usize, n_labs: usize) -> Self {
        Self {
            n_ftrs,
            n_labs,
            indexed: true,
            segs: Vec::new(),
            segno: None,
            frameno: 0,
        }
    }

    /// Creates an empty stream without an index.
    pub fn sequential(n_ftrs: usize, n_labs: usize) -> Self {
        Self {
            indexed: false,
            ..Self::new(n_ftrs, n_labs)
        }
    }

    /// Appends a segment.
    ///
    /// `ftrs` and `labs` must describe the same number of frames. Feature-only
    /// streams pass an empty label slice and vice versa.
    pub fn push_segment(&mut self, ftrs: &[f32], labs: &[u32]) -> Result<()> {
        let frames = match (self.n_ftrs, self.n_labs) {
            (0, 0) => return Err(Error::InvalidConfig("stream has no columns".into())),
            (0, l) => labs.len() / l,
            (f, _) => ftrs.len() / f,
        };
        if ftrs.len() != frames * self.n_ftrs {
            return Err(Error::WidthMismatch {
                expected: frames * self.n_ftrs,
                got: ftrs.len(),
            });
        }
        if labs.len() != frames * self.n_labs {
            return Err(Error::WidthMismatch {
                expected: frames * self.n_labs,
                got: labs.len(),
            });
        }
        self.segs.push(Segment {
            ftrs: ftrs.to_vec(),
            labs: labs.to_vec(),
            frames,
        });
        Ok(())
    }
}

impl Positionable for VecStream {
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(self.indexed.then_some(self.segs.len()))
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        if !self.indexed {
            return Ok(None);
        }
        match segno {
            None => Ok(Some(self.segs.iter().map(|s| s.frames).sum())),
            Some(n) => match self.segs.get(n) {
                Some(seg) => Ok(Some(seg.frames)),
                None => Err(Error::SeekOutOfRange { segno: n, frameno: 0 }),
            },
        }
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let next = self.segno.map_or(0, |s| s + 1);
        if next >= self.segs.len() {
            self.segno = Some(self.segs.len());
            self.frameno = 0;
            return Ok(None);
        }
        self.segno = Some(next);
        self.frameno = 0;
        Ok(Some(next))
    }

    fn rewind(&mut self) -> Result<Seek> {
        if !self.indexed {
            return Ok(Seek::Unsupported);
        }
        self.segno = None;
        self.frameno = 0;
        Ok(Seek::Done)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        if !self.indexed {
            return Ok(None);
        }
        Ok(self
            .segno
            .filter(|&s| s < self.segs.len())
            .map(|s| Position::new(s, self.frameno)))
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        if !self.indexed {
            return Ok(Seek::Unsupported);
        }
        match self.segs.get(segno) {
            Some(seg) if frameno <= seg.frames => {
                self.segno = Some(segno);
                self.frameno = frameno;
                Ok(Seek::Done)
            }
            _ => Err(Error::SeekOutOfRange { segno, frameno }),
        }
    }
}

impl FeatureSource for VecStream {
    fn num_ftrs(&self) -> usize {
        self.n_ftrs
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        self.read_ftrslabs(count, out, None)
    }
}

impl LabelSource for VecStream {
    fn num_labs(&self) -> usize {
        self.n_labs
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        self.read_ftrslabs(count, None, out)
    }
}

impl FeatureLabelSource for VecStream {
    fn read_ftrslabs(
        &mut self,
        count: usize,
        ftrs: Option<&mut [f32]>,
        labs: Option<&mut [u32]>,
    ) -> Result<usize> {
        let segno = self.segno.ok_or(Error::NotPositioned)?;
        // Past the last segment reads behave like an empty segment.
        let Some(seg) = self.segs.get(segno) else {
            return Ok(0);
        };
        let n = count.min(seg.frames.saturating_sub(self.frameno));
        let (nf, nl) = (self.n_ftrs, self.n_labs);
        if let Some(out) = ftrs {
            check_buffer(out.len(), n, nf)?;
            let start = self.frameno * nf;
            out[..n * nf].copy_from_slice(&seg.ftrs[start..start + n * nf]);
        }
        if let Some(out) = labs {
            check_buffer(out.len(), n, nl)?;
            let start = self.frameno * nl;
            out[..n * nl].copy_from_slice(&seg.labs[start..start + n * nl]);
        }
        trace!("read {} frames at frame {}", n, self.frameno);
        self.frameno += n;
        Ok(n)
    }
}
