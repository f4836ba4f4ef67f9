//! Two segment subsets of one seekable stream.

use std::cell::RefCell;
use std::rc::Rc;

use segstream_core::{
    Error, FeatureLabelSource, FeatureSource, LabelSource, Position, Positionable, Result, Seek,
};
use segstream_range::Range;
use tracing::{debug, info, trace};

/// A contiguous run of base segments for [`Cut::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutSpan {
    pub first: usize,
    /// Number of segments; `None` takes the rest of the stream.
    pub count: Option<usize>,
}

impl CutSpan {
    pub fn new(first: usize, count: Option<usize>) -> Self {
        Self { first, count }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Which {
    One,
    Two,
}

/// Cursor of one cut, in cut-relative numbering.
#[derive(Debug)]
struct CutState {
    /// Base segment of each cut segment.
    segs: Vec<usize>,
    total_frames: usize,
    /// `None` before the first segment; `segs.len()` once exhausted.
    segno: Option<usize>,
    frameno: usize,
}

impl CutState {
    fn new<S: Positionable>(base: &S, segs: Vec<usize>) -> Result<Self> {
        let mut total_frames = 0;
        for &s in &segs {
            total_frames += base
                .num_frames(Some(s))?
                .ok_or(Error::NotSeekable("cut needs frame counts"))?;
        }
        Ok(Self {
            segs,
            total_frames,
            segno: None,
            frameno: 0,
        })
    }

    /// Base position matching this cursor, `None` before the first segment
    /// or once exhausted.
    fn base_pos(&self) -> Option<Position> {
        let s = self.segno?;
        self.segs
            .get(s)
            .map(|&base| Position::new(base, self.frameno))
    }

    fn exhausted(&self) -> bool {
        self.segno.is_some_and(|s| s >= self.segs.len())
    }
}

/// The base stream and which cut currently owns its cursor.
struct Shared<S> {
    base: S,
    active: Which,
    one: CutState,
    two: CutState,
}

impl<S: Positionable> Shared<S> {
    fn state(&self, which: Which) -> &CutState {
        match which {
            Which::One => &self.one,
            Which::Two => &self.two,
        }
    }

    fn state_mut(&mut self, which: Which) -> &mut CutState {
        match which {
            Which::One => &mut self.one,
            Which::Two => &mut self.two,
        }
    }

    /// Hands the base cursor to `which`, moving it to where that cut left
    /// off.
    fn select(&mut self, which: Which) -> Result<()> {
        if self.active == which {
            return Ok(());
        }
        self.active = which;
        let state = self.state(which);
        let (started, resume) = (state.segno.is_some(), state.base_pos());
        let seek = match (started, resume) {
            (false, _) => self.base.rewind()?,
            (true, Some(p)) => self.base.set_pos(p.segno, p.frameno)?,
            // An exhausted cut never touches the base again.
            (true, None) => Seek::Done,
        };
        if !seek.is_done() {
            return Err(Error::NotSeekable("cut base refused to seek"));
        }
        trace!("cut base handed to {:?}", which);
        Ok(())
    }

    fn nextseg(&mut self, which: Which) -> Result<Option<usize>> {
        self.select(which)?;
        let state = self.state(which);
        let next = state.segno.map_or(0, |s| s + 1);
        let Some(&target) = state.segs.get(next) else {
            let len = state.segs.len();
            let state = self.state_mut(which);
            state.segno = Some(len);
            state.frameno = 0;
            return Ok(None);
        };
        // Consecutive base segments need no seek.
        let follows = match state.segno {
            None => target == 0,
            Some(s) => state.segs.get(s).is_some_and(|&prev| prev + 1 == target),
        };
        if follows {
            let got = self.base.nextseg()?;
            if got != Some(target) {
                return Err(Error::inconsistent(format!(
                    "cut expected base segment {}, got {:?}",
                    target, got
                )));
            }
        } else if !self.base.set_pos(target, 0)?.is_done() {
            return Err(Error::NotSeekable("cut base refused to seek"));
        }
        let state = self.state_mut(which);
        state.segno = Some(next);
        state.frameno = 0;
        debug!("cut {:?} at segment {} (base {})", which, next, target);
        Ok(Some(next))
    }

    fn rewind(&mut self, which: Which) -> Result<Seek> {
        self.select(which)?;
        let seek = self.base.rewind()?;
        if seek.is_done() {
            let state = self.state_mut(which);
            state.segno = None;
            state.frameno = 0;
        }
        Ok(seek)
    }

    fn set_pos(&mut self, which: Which, segno: usize, frameno: usize) -> Result<Seek> {
        let Some(&target) = self.state(which).segs.get(segno) else {
            return Err(Error::SeekOutOfRange { segno, frameno });
        };
        self.select(which)?;
        let seek = self.base.set_pos(target, frameno)?;
        if seek.is_done() {
            let state = self.state_mut(which);
            state.segno = Some(segno);
            state.frameno = frameno;
        }
        Ok(seek)
    }

    /// Runs a read against the base on behalf of `which`, keeping its frame
    /// count current.
    fn read(&mut self, which: Which, read: impl FnOnce(&mut S) -> Result<usize>) -> Result<usize> {
        let state = self.state(which);
        if state.segno.is_none() {
            return Err(Error::NotPositioned);
        }
        if state.exhausted() {
            return Ok(0);
        }
        self.select(which)?;
        let n = read(&mut self.base)?;
        self.state_mut(which).frameno += n;
        Ok(n)
    }
}

/// One of the two views returned by [`Cut::new`] or [`Cut::from_ranges`].
///
/// Each view numbers its segments from 0 and keeps its own position. The
/// views share the base stream: whichever was used last owns its cursor, and
/// using the other one first seeks the base to where that view left off.
pub struct Cut<S> {
    shared: Rc<RefCell<Shared<S>>>,
    which: Which,
}

impl<S: Positionable> Cut<S> {
    /// Splits `base` into two runs of consecutive segments. The runs may
    /// overlap.
    pub fn new(mut base: S, one: CutSpan, two: CutSpan) -> Result<(Self, Self)> {
        let total = seekable_segs(&mut base)?;
        let span = |c: CutSpan| -> Result<Vec<usize>> {
            let count = match c.count {
                Some(0) => {
                    return Err(Error::InvalidConfig("cut of zero segments".into()));
                }
                Some(n) => n,
                None => total.saturating_sub(c.first),
            };
            if c.first + count > total {
                return Err(Error::InvalidConfig(format!(
                    "cut {}+{} is bigger than the {} segment stream",
                    c.first, count, total
                )));
            }
            Ok((c.first..c.first + count).collect())
        };
        let (segs1, segs2) = (span(one)?, span(two)?);
        Self::pair(base, segs1, segs2)
    }

    /// Splits `base` into the segments listed by two range expressions;
    /// `None` selects every segment. Listed segments may repeat and come in
    /// any order.
    pub fn from_ranges(mut base: S, one: Option<&str>, two: Option<&str>) -> Result<(Self, Self)> {
        let total = seekable_segs(&mut base)?;
        let list = |spec: Option<&str>| -> Result<Vec<usize>> {
            let range = Range::parse(spec.unwrap_or("all"), 0, Some(total as i64)).map_err(
                |e| Error::Parse {
                    line: 1,
                    msg: e.to_string(),
                },
            )?;
            range
                .iter()
                .map(|s| {
                    usize::try_from(s)
                        .ok()
                        .filter(|&s| s < total)
                        .ok_or_else(|| {
                            Error::InvalidConfig(format!(
                                "segment {} of range {:?} is outside the {} segment stream",
                                s,
                                range.spec(),
                                total
                            ))
                        })
                })
                .collect()
        };
        let (segs1, segs2) = (list(one)?, list(two)?);
        Self::pair(base, segs1, segs2)
    }

    fn pair(base: S, segs1: Vec<usize>, segs2: Vec<usize>) -> Result<(Self, Self)> {
        let one = CutState::new(&base, segs1)?;
        let two = CutState::new(&base, segs2)?;
        info!(
            "cut stream into {} segments ({} frames) and {} segments ({} frames)",
            one.segs.len(),
            one.total_frames,
            two.segs.len(),
            two.total_frames
        );
        let shared = Rc::new(RefCell::new(Shared {
            base,
            active: Which::One,
            one,
            two,
        }));
        Ok((
            Self {
                shared: Rc::clone(&shared),
                which: Which::One,
            },
            Self {
                shared,
                which: Which::Two,
            },
        ))
    }

    /// Base segment behind segment `segno` of this cut.
    pub fn base_segment(&self, segno: usize) -> Option<usize> {
        self.shared.borrow().state(self.which).segs.get(segno).copied()
    }
}

/// Segment count of a base that must survive `set_pos(0, 0)` and `rewind()`.
/// Leaves the base rewound.
fn seekable_segs<S: Positionable>(base: &mut S) -> Result<usize> {
    let total = base
        .num_segs()?
        .ok_or(Error::NotSeekable("cannot cut a stream without a segment index"))?;
    let seek = base.set_pos(0, 0)?;
    if !seek.is_done() || !base.rewind()?.is_done() {
        return Err(Error::NotSeekable("cannot cut a non-indexed stream"));
    }
    Ok(total)
}

impl<S: Positionable> Positionable for Cut<S> {
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(Some(self.shared.borrow().state(self.which).segs.len()))
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        let shared = self.shared.borrow();
        let state = shared.state(self.which);
        match segno {
            None => Ok(Some(state.total_frames)),
            Some(s) => match state.segs.get(s) {
                Some(&base) => shared.base.num_frames(Some(base)),
                None => Err(Error::SeekOutOfRange { segno: s, frameno: 0 }),
            },
        }
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        self.shared.borrow_mut().nextseg(self.which)
    }

    fn rewind(&mut self) -> Result<Seek> {
        self.shared.borrow_mut().rewind(self.which)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        let shared = self.shared.borrow();
        let state = shared.state(self.which);
        Ok(state
            .segno
            .filter(|&s| s < state.segs.len())
            .map(|s| Position::new(s, state.frameno)))
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        self.shared.borrow_mut().set_pos(self.which, segno, frameno)
    }
}

impl<S: FeatureSource> FeatureSource for Cut<S> {
    fn num_ftrs(&self) -> usize {
        self.shared.borrow().base.num_ftrs()
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        self.shared
            .borrow_mut()
            .read(self.which, |base| base.read_ftrs(count, out))
    }

    fn read_ftrs_strided(&mut self, count: usize, out: &mut [f32], stride: usize) -> Result<usize> {
        self.shared
            .borrow_mut()
            .read(self.which, |base| base.read_ftrs_strided(count, out, stride))
    }
}

impl<S: LabelSource> LabelSource for Cut<S> {
    fn num_labs(&self) -> usize {
        self.shared.borrow().base.num_labs()
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        self.shared
            .borrow_mut()
            .read(self.which, |base| base.read_labs(count, out))
    }

    fn read_labs_strided(&mut self, count: usize, out: &mut [u32], stride: usize) -> Result<usize> {
        self.shared
            .borrow_mut()
            .read(self.which, |base| base.read_labs_strided(count, out, stride))
    }
}

impl<S: FeatureLabelSource> FeatureLabelSource for Cut<S> {
    fn read_ftrslabs(
        &mut self,
        count: usize,
        ftrs: Option<&mut [f32]>,
        labs: Option<&mut [u32]>,
    ) -> Result<usize> {
        self.shared
            .borrow_mut()
            .read(self.which, |base| base.read_ftrslabs(count, ftrs, labs))
    }
}
