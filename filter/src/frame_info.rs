//! Synthetic label stream describing frame positions.

use segstream_core::{Error, LabelSource, Position, Positionable, Result, Seek, check_buffer};
use tracing::{debug, info, trace};

/// Labels per [`FrameInfo`] frame: epoch, segment number, frame number.
pub const FRAME_INFO_LABELS: usize = 3;

/// The 48-bit linear congruential generator of the `rand48` family.
struct Rand48 {
    state: u64,
}

impl Rand48 {
    const A: u64 = 0x5_DEEC_E66D;
    const C: u64 = 0xB;
    const MASK: u64 = (1 << 48) - 1;

    fn new(seed: u32) -> Self {
        let lo = (seed & 0xffff) as u64;
        let hi = ((seed >> 16) & 0xffff) as u64;
        Self {
            state: (hi << 32) | (0x337f << 16) | lo,
        }
    }

    /// Next value in `[0, 2^31)`.
    fn next(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(Self::A).wrapping_add(Self::C) & Self::MASK;
        (self.state >> 17) as u32
    }

    /// Value in `[min, max)`, or `max` when the range is empty.
    fn ranged(&mut self, min: usize, max: usize) -> usize {
        if max == min {
            max
        } else {
            self.next() as usize % (max - min) + min
        }
    }
}

/// A label stream whose three labels per frame are `[epoch, segno, frameno]`.
///
/// Segment lengths either copy an indexed stream or are drawn from a seeded
/// generator. The epoch starts at 0 and counts calls to `rewind()`, so a
/// training loop can tell passes over the data apart.
pub struct FrameInfo {
    seglens: Vec<usize>,
    total: usize,
    epoch: u32,
    segno: Option<usize>,
    frameno: usize,
}

impl FrameInfo {
    /// Segment lengths taken from an indexed stream.
    pub fn mirror<S: Positionable + ?Sized>(stream: &S) -> Result<Self> {
        let n = stream
            .num_segs()?
            .ok_or(Error::NotSeekable("frame info needs segment counts"))?;
        let mut seglens = Vec::with_capacity(n);
        for i in 0..n {
            let frames = stream
                .num_frames(Some(i))?
                .ok_or(Error::NotSeekable("frame info needs frame counts"))?;
            seglens.push(frames);
        }
        Self::with_lengths(seglens)
    }

    /// Pseudo-random segment lengths: between `min_segs` and `max_segs`
    /// segments of `min_frames` to `max_frames` frames, upper bounds exclusive
    /// unless equal to the lower ones.
    pub fn random(
        segs: (usize, usize),
        frames: (usize, usize),
        seed: u32,
    ) -> Result<Self> {
        let ((min_segs, max_segs), (min_frames, max_frames)) = (segs, frames);
        if min_segs == 0 || max_segs < min_segs || min_frames == 0 || max_frames < min_frames {
            return Err(Error::InvalidConfig(format!(
                "bad frame info ranges: segments {}..{}, frames {}..{}",
                min_segs, max_segs, min_frames, max_frames
            )));
        }
        let mut rng = Rand48::new(seed);
        let n = rng.ranged(min_segs, max_segs);
        let seglens = (0..n).map(|_| rng.ranged(min_frames, max_frames)).collect();
        Self::with_lengths(seglens)
    }

    /// Explicit segment lengths; each must be positive.
    pub fn with_lengths(seglens: Vec<usize>) -> Result<Self> {
        if seglens.is_empty() || seglens.contains(&0) {
            return Err(Error::InvalidConfig(
                "frame info needs non-empty segments".into(),
            ));
        }
        let total: usize = seglens.iter().sum();
        info!(
            "frame info stream: {} segments, {} frames",
            seglens.len(),
            total
        );
        Ok(Self {
            seglens,
            total,
            epoch: 0,
            segno: None,
            frameno: 0,
        })
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl Positionable for FrameInfo {
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(Some(self.seglens.len()))
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        match segno {
            None => Ok(Some(self.total)),
            Some(s) => self
                .seglens
                .get(s)
                .map(|&n| Some(n))
                .ok_or(Error::SeekOutOfRange { segno: s, frameno: 0 }),
        }
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let next = self.segno.map_or(0, |s| s + 1).min(self.seglens.len());
        self.segno = Some(next);
        self.frameno = 0;
        if next == self.seglens.len() {
            return Ok(None);
        }
        debug!("segment {} has {} frames", next, self.seglens[next]);
        Ok(Some(next))
    }

    fn rewind(&mut self) -> Result<Seek> {
        self.epoch += 1;
        self.segno = None;
        self.frameno = 0;
        debug!("rewound to epoch {}", self.epoch);
        Ok(Seek::Done)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        Ok(self
            .segno
            .filter(|&s| s < self.seglens.len())
            .map(|s| Position::new(s, self.frameno)))
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        match self.seglens.get(segno) {
            Some(&len) if frameno <= len => {
                self.segno = Some(segno);
                self.frameno = frameno;
                Ok(Seek::Done)
            }
            _ => Err(Error::SeekOutOfRange { segno, frameno }),
        }
    }
}

impl LabelSource for FrameInfo {
    fn num_labs(&self) -> usize {
        FRAME_INFO_LABELS
    }

    fn read_labs(&mut self, count: usize, mut out: Option<&mut [u32]>) -> Result<usize> {
        let segno = self.segno.ok_or(Error::NotPositioned)?;
        let Some(&len) = self.seglens.get(segno) else {
            return Ok(0);
        };
        let n = count.min(len - self.frameno);
        if let Some(o) = out.as_deref_mut() {
            check_buffer(o.len(), n, FRAME_INFO_LABELS)?;
            for (i, labs) in o.chunks_exact_mut(FRAME_INFO_LABELS).take(n).enumerate() {
                labs.copy_from_slice(&[self.epoch, segno as u32, (self.frameno + i) as u32]);
            }
        }
        trace!("frame info read {} frames at ({}, {})", n, segno, self.frameno);
        self.frameno += n;
        Ok(n)
    }
}
