//! End-to-end concatenation of two streams.

use segstream_core::{
    Error, FeatureLabelSource, FeatureSource, LabelSource, Position, Positionable, Result, Seek,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    First,
    Second,
}

/// The segments of `first` followed by the segments of `second`.
///
/// Segment `s` maps to `first` while `s < N1` and to segment `s - N1` of
/// `second` after that. `N1` comes from `first.num_segs()` when known;
/// otherwise it is learned when `first` runs out, and random access stays
/// unavailable until then.
pub struct Paste<A, B> {
    first: A,
    second: B,
    first_segs: Option<usize>,
    part: Part,
    segno: Option<usize>,
}

impl<A: Positionable, B: Positionable> Paste<A, B> {
    fn new(first: A, second: B) -> Result<Self> {
        let first_segs = first.num_segs()?;
        info!(
            "pasting streams of {:?} and {:?} segments",
            first_segs,
            second.num_segs()?
        );
        Ok(Self {
            first,
            second,
            first_segs,
            part: Part::First,
            segno: None,
        })
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }

    fn boundary(&self) -> Result<usize> {
        self.first_segs
            .ok_or(Error::NotSeekable("paste needs the first stream's segment count"))
    }
}

impl<A: FeatureSource, B: FeatureSource> Paste<A, B> {
    /// Pastes two feature streams of equal width.
    pub fn features(first: A, second: B) -> Result<Self> {
        if first.num_ftrs() != second.num_ftrs() {
            return Err(Error::WidthMismatch {
                expected: first.num_ftrs(),
                got: second.num_ftrs(),
            });
        }
        Self::new(first, second)
    }
}

impl<A: LabelSource, B: LabelSource> Paste<A, B> {
    /// Pastes two label streams of equal width.
    pub fn labels(first: A, second: B) -> Result<Self> {
        if first.num_labs() != second.num_labs() {
            return Err(Error::WidthMismatch {
                expected: first.num_labs(),
                got: second.num_labs(),
            });
        }
        Self::new(first, second)
    }
}

impl<A: FeatureLabelSource, B: FeatureLabelSource> Paste<A, B> {
    /// Pastes two streams carrying both features and labels.
    pub fn frames(first: A, second: B) -> Result<Self> {
        if first.num_labs() != second.num_labs() {
            return Err(Error::WidthMismatch {
                expected: first.num_labs(),
                got: second.num_labs(),
            });
        }
        Self::features(first, second)
    }
}

impl<A: Positionable, B: Positionable> Positionable for Paste<A, B> {
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(match (self.first_segs, self.second.num_segs()?) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        })
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        match segno {
            None => Ok(match (self.first.num_frames(None)?, self.second.num_frames(None)?) {
                (Some(a), Some(b)) => Some(a + b),
                _ => None,
            }),
            Some(s) => {
                let n1 = self.boundary()?;
                if s < n1 {
                    self.first.num_frames(Some(s))
                } else {
                    self.second.num_frames(Some(s - n1))
                }
            }
        }
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let next = self.segno.map_or(0, |s| s + 1);
        if self.part == Part::First {
            if self.first.nextseg()?.is_some() {
                self.segno = Some(next);
                return Ok(Some(next));
            }
            match self.first_segs {
                Some(n) if n != next => {
                    return Err(Error::inconsistent(format!(
                        "first pasted stream ended after {} of {} segments",
                        next, n
                    )));
                }
                _ => self.first_segs = Some(next),
            }
            debug!("paste moved to second stream at segment {}", next);
            self.part = Part::Second;
        }
        let got = self.second.nextseg()?;
        self.segno = Some(next);
        Ok(got.map(|_| next))
    }

    fn rewind(&mut self) -> Result<Seek> {
        if !self.first.rewind()?.is_done() {
            return Ok(Seek::Unsupported);
        }
        if self.part == Part::Second && !self.second.rewind()?.is_done() {
            return Err(Error::NotSeekable("second pasted stream cannot rewind"));
        }
        self.part = Part::First;
        self.segno = None;
        Ok(Seek::Done)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        Ok(match self.part {
            Part::First => self.first.get_pos()?,
            Part::Second => {
                let base = self.boundary()?;
                self.second
                    .get_pos()?
                    .map(|p| Position::new(p.segno + base, p.frameno))
            }
        })
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        let Some(n1) = self.first_segs else {
            return Ok(Seek::Unsupported);
        };
        let seek = if segno < n1 {
            let seek = self.first.set_pos(segno, frameno)?;
            if seek.is_done() && self.part == Part::Second {
                // Later nextseg() calls walk into the second stream afresh.
                if !self.second.rewind()?.is_done() {
                    warn!("second pasted stream cannot rewind after seek back");
                }
                self.part = Part::First;
            }
            seek
        } else {
            let seek = self.second.set_pos(segno - n1, frameno)?;
            if seek.is_done() {
                self.part = Part::Second;
            }
            seek
        };
        if seek.is_done() {
            self.segno = Some(segno);
        }
        Ok(seek)
    }
}

impl<A: FeatureSource, B: FeatureSource> FeatureSource for Paste<A, B> {
    fn num_ftrs(&self) -> usize {
        self.first.num_ftrs()
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        match self.part {
            Part::First => self.first.read_ftrs(count, out),
            Part::Second => self.second.read_ftrs(count, out),
        }
    }

    fn read_ftrs_strided(&mut self, count: usize, out: &mut [f32], stride: usize) -> Result<usize> {
        match self.part {
            Part::First => self.first.read_ftrs_strided(count, out, stride),
            Part::Second => self.second.read_ftrs_strided(count, out, stride),
        }
    }
}

impl<A: LabelSource, B: LabelSource> LabelSource for Paste<A, B> {
    fn num_labs(&self) -> usize {
        self.first.num_labs()
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        match self.part {
            Part::First => self.first.read_labs(count, out),
            Part::Second => self.second.read_labs(count, out),
        }
    }

    fn read_labs_strided(&mut self, count: usize, out: &mut [u32], stride: usize) -> Result<usize> {
        match self.part {
            Part::First => self.first.read_labs_strided(count, out, stride),
            Part::Second => self.second.read_labs_strided(count, out, stride),
        }
    }
}

impl<A: FeatureLabelSource, B: FeatureLabelSource> FeatureLabelSource for Paste<A, B> {
    fn read_ftrslabs(
        &mut self,
        count: usize,
        ftrs: Option<&mut [f32]>,
        labs: Option<&mut [u32]>,
    ) -> Result<usize> {
        match self.part {
            Part::First => self.first.read_ftrslabs(count, ftrs, labs),
            Part::Second => self.second.read_ftrslabs(count, ftrs, labs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    fn ftrs(segs: &[&[f32]]) -> VecStream {
        let mut s = VecStream::new(1, 0);
        for seg in segs {
            s.push_segment(seg, &[]).unwrap();
        }
        s
    }

    fn read_all(p: &mut impl FeatureSource) -> Vec<Vec<f32>> {
        let mut segs = Vec::new();
        while p.nextseg().unwrap().is_some() {
            let mut buf = [0.0; 16];
            let n = p.read_ftrs(16, Some(&mut buf)).unwrap();
            segs.push(buf[..n].to_vec());
        }
        segs
    }

    #[test]
    fn test_paste_traversal() {
        let mut p = Paste::features(ftrs(&[&[1.0], &[2.0, 2.5]]), ftrs(&[&[3.0]])).unwrap();
        assert_eq!(p.num_segs().unwrap(), Some(3));
        assert_eq!(p.num_frames(None).unwrap(), Some(4));
        assert_eq!(p.num_frames(Some(2)).unwrap(), Some(1));
        assert_eq!(read_all(&mut p), vec![vec![1.0], vec![2.0, 2.5], vec![3.0]]);
        assert_eq!(p.nextseg().unwrap(), None);
        assert_eq!(p.rewind().unwrap(), Seek::Done);
        assert_eq!(read_all(&mut p).len(), 3);
    }

    #[test]
    fn test_seek_across_boundary() {
        let mut p = Paste::features(ftrs(&[&[1.0], &[2.0]]), ftrs(&[&[3.0], &[4.0]])).unwrap();
        assert_eq!(p.set_pos(3, 0).unwrap(), Seek::Done);
        assert_eq!(p.get_pos().unwrap(), Some(Position::new(3, 0)));
        let mut v = [0.0];
        p.read_ftrs(1, Some(&mut v)).unwrap();
        assert_eq!(v, [4.0]);
        // Jumping back into the first stream restarts the second one.
        assert_eq!(p.set_pos(1, 0).unwrap(), Seek::Done);
        assert_eq!(p.nextseg().unwrap(), Some(2));
        p.read_ftrs(1, Some(&mut v)).unwrap();
        assert_eq!(v, [3.0]);
        assert_eq!(p.get_pos().unwrap(), Some(Position::new(2, 1)));
    }

    #[test]
    fn test_sequential_first_stream() {
        let mut a = VecStream::sequential(1, 0);
        a.push_segment(&[1.0], &[]).unwrap();
        let mut p = Paste::features(a, ftrs(&[&[2.0]])).unwrap();
        assert_eq!(p.num_segs().unwrap(), None);
        assert_eq!(p.set_pos(0, 0).unwrap(), Seek::Unsupported);
        assert_eq!(read_all(&mut p), vec![vec![1.0], vec![2.0]]);
        assert_eq!(p.num_segs().unwrap(), Some(2));
    }

    #[test]
    fn test_label_paste() {
        let mut a = VecStream::new(0, 2);
        a.push_segment(&[], &[1, 2]).unwrap();
        let mut b = VecStream::new(0, 2);
        b.push_segment(&[], &[3, 4, 5, 6]).unwrap();
        let mut p = Paste::labels(a, b).unwrap();
        assert_eq!(p.num_labs(), 2);
        p.set_pos(1, 1).unwrap();
        let mut out = [0u32; 2];
        assert_eq!(p.read_labs(2, Some(&mut out)).unwrap(), 1);
        assert_eq!(out, [5, 6]);
    }

    #[test]
    fn test_frames_paste() {
        let mut a = VecStream::new(1, 1);
        a.push_segment(&[1.0, 2.0], &[7, 8]).unwrap();
        let mut b = VecStream::new(1, 1);
        b.push_segment(&[3.0], &[9]).unwrap();
        let mut p = Paste::frames(a, b).unwrap();
        p.set_pos(1, 0).unwrap();
        let (mut f, mut l) = ([0.0; 2], [0u32; 2]);
        assert_eq!(p.read_ftrslabs(2, Some(&mut f), Some(&mut l)).unwrap(), 1);
        assert_eq!((f[0], l[0]), (3.0, 9));
        assert!(matches!(
            Paste::frames(VecStream::new(1, 1), VecStream::new(1, 2)),
            Err(Error::WidthMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_width_mismatch() {
        let a = VecStream::new(2, 0);
        let b = VecStream::new(3, 0);
        assert!(matches!(
            Paste::features(a, b),
            Err(Error::WidthMismatch { expected: 2, got: 3 })
        ));
    }
}
