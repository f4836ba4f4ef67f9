//! Side-by-side concatenation of two feature streams.

use segstream_core::{Error, FeatureSource, Position, Positionable, Result, Seek, check_buffer};
use tracing::{info, trace};

/// Frames whose columns are those of `first` followed by those of `second`.
///
/// Both upstreams are moved in lockstep. Every positioning call goes to both
/// and the answers must agree; any disagreement is
/// [`Error::Inconsistent`].
pub struct JoinFtrs<A, B> {
    first: A,
    second: B,
    width1: usize,
    width2: usize,
}

impl<A: FeatureSource, B: FeatureSource> JoinFtrs<A, B> {
    pub fn new(first: A, second: B) -> Result<Self> {
        let (segs1, segs2) = (first.num_segs()?, second.num_segs()?);
        if segs1 != segs2 {
            return Err(Error::inconsistent(format!(
                "joined streams have {:?} and {:?} segments",
                segs1, segs2
            )));
        }
        let (width1, width2) = (first.num_ftrs(), second.num_ftrs());
        info!("joining streams of {} and {} features", width1, width2);
        Ok(Self {
            first,
            second,
            width1,
            width2,
        })
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

fn agree<T: PartialEq + std::fmt::Debug>(what: &str, a: T, b: T) -> Result<T> {
    if a != b {
        return Err(Error::inconsistent(format!(
            "joined streams differ in {}: {:?} vs {:?}",
            what, a, b
        )));
    }
    Ok(a)
}

impl<A: FeatureSource, B: FeatureSource> Positionable for JoinFtrs<A, B> {
    fn num_segs(&self) -> Result<Option<usize>> {
        agree("segment count", self.first.num_segs()?, self.second.num_segs()?)
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        agree(
            "frame count",
            self.first.num_frames(segno)?,
            self.second.num_frames(segno)?,
        )
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let a = self.first.nextseg()?;
        agree("next segment", a, self.second.nextseg()?)
    }

    fn rewind(&mut self) -> Result<Seek> {
        let a = self.first.rewind()?;
        agree("rewind", a, self.second.rewind()?)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        agree("position", self.first.get_pos()?, self.second.get_pos()?)
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        let a = self.first.set_pos(segno, frameno)?;
        agree("seek", a, self.second.set_pos(segno, frameno)?)
    }
}

impl<A: FeatureSource, B: FeatureSource> FeatureSource for JoinFtrs<A, B> {
    fn num_ftrs(&self) -> usize {
        self.width1 + self.width2
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        let stride = self.width1 + self.width2;
        self.read_joined(count, out, stride)
    }

    fn read_ftrs_strided(&mut self, count: usize, out: &mut [f32], stride: usize) -> Result<usize> {
        self.read_joined(count, Some(out), stride)
    }
}

impl<A: FeatureSource, B: FeatureSource> JoinFtrs<A, B> {
    fn read_joined(&mut self, count: usize, out: Option<&mut [f32]>, stride: usize) -> Result<usize> {
        let (w1, w2) = (self.width1, self.width2);
        let (got1, got2) = match out {
            Some(o) => {
                if stride < w1 + w2 {
                    return Err(Error::InvalidConfig(format!(
                        "stride {} is narrower than joined width {}",
                        stride,
                        w1 + w2
                    )));
                }
                if count > 0 {
                    check_buffer(o.len() + stride - w1 - w2, count, stride)?;
                }
                let got1 = if count == 1 {
                    self.first.read_ftrs(1, Some(&mut o[..w1]))?
                } else {
                    self.first.read_ftrs_strided(count, o, stride)?
                };
                let rest = &mut o[w1..];
                let got2 = if count == 1 {
                    self.second.read_ftrs(1, Some(&mut rest[..w2]))?
                } else {
                    self.second.read_ftrs_strided(count, rest, stride)?
                };
                (got1, got2)
            }
            None => (
                self.first.read_ftrs(count, None)?,
                self.second.read_ftrs(count, None)?,
            ),
        };
        trace!("joined read of {} frames", got1);
        agree("frames read", got1, got2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    fn stream(width: usize, segs: &[&[f32]]) -> VecStream {
        let mut s = VecStream::new(width, 0);
        for seg in segs {
            s.push_segment(seg, &[]).unwrap();
        }
        s
    }

    #[test]
    fn test_join_columns() {
        let a = stream(2, &[&[1.0, 2.0, 3.0, 4.0]]);
        let b = stream(1, &[&[10.0, 20.0]]);
        let mut j = JoinFtrs::new(a, b).unwrap();
        assert_eq!(j.num_ftrs(), 3);
        assert_eq!(j.nextseg().unwrap(), Some(0));
        let mut out = [0.0; 6];
        assert_eq!(j.read_ftrs(2, Some(&mut out)).unwrap(), 2);
        assert_eq!(out, [1.0, 2.0, 10.0, 3.0, 4.0, 20.0]);
        assert_eq!(j.read_ftrs(1, Some(&mut out)).unwrap(), 0);
        assert_eq!(j.nextseg().unwrap(), None);
    }

    #[test]
    fn test_single_frame_and_strided_reads() {
        let a = stream(1, &[&[1.0, 2.0, 3.0]]);
        let b = stream(1, &[&[4.0, 5.0, 6.0]]);
        let mut j = JoinFtrs::new(a, b).unwrap();
        j.nextseg().unwrap();
        let mut one = [0.0; 2];
        assert_eq!(j.read_ftrs(1, Some(&mut one)).unwrap(), 1);
        assert_eq!(one, [1.0, 4.0]);
        let mut wide = [-1.0; 7];
        assert_eq!(j.read_ftrs_strided(2, &mut wide, 4).unwrap(), 2);
        assert_eq!(wide, [2.0, 5.0, -1.0, -1.0, 3.0, 6.0, -1.0]);
    }

    #[test]
    fn test_positioning_agrees() {
        let a = stream(1, &[&[1.0, 2.0], &[3.0, 4.0, 5.0]]);
        let b = stream(1, &[&[6.0, 7.0], &[8.0, 9.0, 0.5]]);
        let mut j = JoinFtrs::new(a, b).unwrap();
        assert_eq!(j.num_segs().unwrap(), Some(2));
        assert_eq!(j.num_frames(Some(1)).unwrap(), Some(3));
        assert_eq!(j.set_pos(1, 2).unwrap(), Seek::Done);
        assert_eq!(j.get_pos().unwrap(), Some(Position::new(1, 2)));
        let mut out = [0.0; 2];
        j.read_ftrs(1, Some(&mut out)).unwrap();
        assert_eq!(out, [5.0, 0.5]);
        assert_eq!(j.rewind().unwrap(), Seek::Done);
        assert_eq!(j.get_pos().unwrap(), None);
    }

    #[test]
    fn test_unequal_segment_counts_fail() {
        let a = stream(1, &[&[1.0], &[2.0]]);
        let b = stream(1, &[&[1.0]]);
        assert!(matches!(JoinFtrs::new(a, b), Err(Error::Inconsistent(_))));
    }

    #[test]
    fn test_diverging_lengths_fail() {
        let a = stream(1, &[&[1.0, 2.0]]);
        let b = stream(1, &[&[1.0]]);
        let mut j = JoinFtrs::new(a, b).unwrap();
        assert!(j.num_frames(Some(0)).is_err());
        j.nextseg().unwrap();
        assert!(matches!(j.read_ftrs(2, None), Err(Error::Inconsistent(_))));
    }
}
