//! Independent feature and label views of one combined stream.

use std::cell::RefCell;
use std::rc::Rc;

use segstream_buffer::FrameCache;
use segstream_core::{
    Error, FeatureLabelSource, FeatureSource, LabelSource, Position, Positionable, Result, Seek,
    check_buffer,
};
use tracing::{debug, info, trace};

/// Where a cursor stands relative to the segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Before,
    At(Position),
    End,
}

impl Cursor {
    fn position(self) -> Option<Position> {
        match self {
            Cursor::At(p) => Some(p),
            _ => None,
        }
    }
}

struct Shared<S> {
    base: S,
    /// Where the base cursor really is.
    base_at: Cursor,
    ftr_at: Cursor,
    lab_at: Cursor,
    /// Features read ahead on behalf of the feature view by label reads.
    ftr_cache: FrameCache<f32>,
    /// Labels read ahead on behalf of the label view by feature reads.
    lab_cache: FrameCache<u32>,
    n_ftrs: usize,
    n_labs: usize,
}

/// Moves the base to `target` unless it is already there.
fn seek_base<S: Positionable>(base: &mut S, base_at: &mut Cursor, target: Cursor) -> Result<()> {
    if *base_at == target {
        return Ok(());
    }
    let seek = match target {
        Cursor::Before => base.rewind()?,
        Cursor::At(p) => base.set_pos(p.segno, p.frameno)?,
        Cursor::End => return Ok(()),
    };
    if !seek.is_done() {
        return Err(Error::NotSeekable(
            "split views read out of step need a seekable stream",
        ));
    }
    trace!("split base moved to {:?}", target);
    *base_at = target;
    Ok(())
}

/// Moves the base to the segment after `from`, reusing its position when it
/// is already there.
fn next_base_seg<S: Positionable>(
    base: &mut S,
    base_at: &mut Cursor,
    from: Cursor,
) -> Result<Cursor> {
    let want = match from {
        Cursor::Before => 0,
        Cursor::At(p) => p.segno + 1,
        Cursor::End => return Ok(Cursor::End),
    };
    if *base_at == Cursor::At(Position::new(want, 0)) {
        return Ok(*base_at);
    }
    seek_base(base, base_at, from)?;
    *base_at = match base.nextseg()? {
        Some(s) => Cursor::At(Position::new(s, 0)),
        None => Cursor::End,
    };
    Ok(*base_at)
}

/// Serves `count` frames of one side: first from that side's cache, then
/// from the base, saving the other side's share into its cache when it can.
fn read_side<A: Copy + Default, B: Copy + Default>(
    at: &mut Cursor,
    count: usize,
    mut out: Option<&mut [A]>,
    width: usize,
    own: &mut FrameCache<A>,
    other: &mut FrameCache<B>,
    read: impl FnOnce(Position, usize, Option<&mut [A]>, Option<&mut [B]>) -> Result<usize>,
) -> Result<usize> {
    let mut pos = match *at {
        Cursor::Before => return Err(Error::NotPositioned),
        Cursor::End => return Ok(0),
        Cursor::At(p) => p,
    };
    if let Some(o) = out.as_deref() {
        check_buffer(o.len(), count, width)?;
    }
    let mut done = 0;
    if own.holds(pos) {
        done = own.pop_into(count, out.as_deref_mut());
        pos.frameno += done;
        trace!("split served {} cached frames at {:?}", done, pos);
    }
    let remaining = count - done;
    if remaining > 0 {
        let keep = if other.follows(pos) && other.room() >= remaining {
            true
        } else if other.is_empty() && other.room() >= remaining {
            other.restart(pos);
            true
        } else {
            false
        };
        let dest = out.map(|o| &mut o[done * width..]);
        let got = if keep {
            let got = read(pos, remaining, dest, Some(other.spare_mut(remaining)))?;
            other.commit(got);
            got
        } else {
            read(pos, remaining, dest, None)?
        };
        pos.frameno += got;
        done += got;
        own.restart(pos);
    }
    *at = Cursor::At(pos);
    Ok(done)
}

impl<S: FeatureLabelSource> Shared<S> {
    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        let Self {
            base,
            base_at,
            ftr_at,
            ftr_cache,
            lab_cache,
            n_ftrs,
            ..
        } = self;
        read_side(ftr_at, count, out, *n_ftrs, ftr_cache, lab_cache, |pos, n, ftrs, labs| {
            seek_base(base, base_at, Cursor::At(pos))?;
            let got = base.read_ftrslabs(n, ftrs, labs)?;
            *base_at = Cursor::At(Position::new(pos.segno, pos.frameno + got));
            Ok(got)
        })
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        let Self {
            base,
            base_at,
            lab_at,
            ftr_cache,
            lab_cache,
            n_labs,
            ..
        } = self;
        read_side(lab_at, count, out, *n_labs, lab_cache, ftr_cache, |pos, n, labs, ftrs| {
            seek_base(base, base_at, Cursor::At(pos))?;
            let got = base.read_ftrslabs(n, ftrs, labs)?;
            *base_at = Cursor::At(Position::new(pos.segno, pos.frameno + got));
            Ok(got)
        })
    }
}

/// Which view an operation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Ftrs,
    Labs,
}

impl<S: Positionable> Shared<S> {
    fn cursor(&self, side: Side) -> Cursor {
        match side {
            Side::Ftrs => self.ftr_at,
            Side::Labs => self.lab_at,
        }
    }

    fn nextseg(&mut self, side: Side) -> Result<Option<usize>> {
        let from = self.cursor(side);
        let now = next_base_seg(&mut self.base, &mut self.base_at, from)?;
        // Leftovers from an earlier segment are useless now.
        let seg = now.position().map(|p| p.segno);
        match side {
            Side::Ftrs => {
                self.ftr_at = now;
                if self.ftr_cache.start().map(|p| p.segno) != seg {
                    self.ftr_cache.clear();
                }
            }
            Side::Labs => {
                self.lab_at = now;
                if self.lab_cache.start().map(|p| p.segno) != seg {
                    self.lab_cache.clear();
                }
            }
        }
        debug!("split {:?} view moved to {:?}", side, now);
        Ok(seg)
    }

    fn rewind(&mut self, side: Side) -> Result<Seek> {
        let seek = self.base.rewind()?;
        if seek.is_done() {
            self.base_at = Cursor::Before;
            match side {
                Side::Ftrs => {
                    self.ftr_at = Cursor::Before;
                    self.ftr_cache.clear();
                }
                Side::Labs => {
                    self.lab_at = Cursor::Before;
                    self.lab_cache.clear();
                }
            }
        }
        Ok(seek)
    }

    fn set_pos(&mut self, side: Side, segno: usize, frameno: usize) -> Result<Seek> {
        let target = Cursor::At(Position::new(segno, frameno));
        if self.base_at != target {
            let seek = self.base.set_pos(segno, frameno)?;
            if !seek.is_done() {
                return Ok(seek);
            }
            self.base_at = target;
        }
        match side {
            Side::Ftrs => {
                self.ftr_at = target;
                self.ftr_cache.clear();
            }
            Side::Labs => {
                self.lab_at = target;
                self.lab_cache.clear();
            }
        }
        Ok(Seek::Done)
    }
}

/// The feature view of a split stream; see [`SplitFtrs::new`].
pub struct SplitFtrs<S> {
    shared: Rc<RefCell<Shared<S>>>,
}

/// The label view of a split stream; see [`SplitFtrs::new`].
pub struct SplitLabs<S> {
    shared: Rc<RefCell<Shared<S>>>,
}

impl<S: FeatureLabelSource> SplitFtrs<S> {
    /// Splits `base` into a feature view and a label view that can be read
    /// out of step with each other.
    ///
    /// Reading one view pulls whole frames from the base and keeps up to
    /// `buf_frames` frames of the other view's data, so views that stay close
    /// are served without seeking. Views further apart than that make the
    /// base seek, which it must support.
    pub fn new(mut base: S, buf_frames: usize) -> Result<(Self, SplitLabs<S>)> {
        if buf_frames == 0 {
            return Err(Error::InvalidConfig("split buffer must hold frames".into()));
        }
        let seek = base.set_pos(0, 0)?;
        if !seek.is_done() || !base.rewind()?.is_done() {
            return Err(Error::NotSeekable("cannot split a non-indexed stream"));
        }
        let (n_ftrs, n_labs) = (base.num_ftrs(), base.num_labs());
        info!(
            "split stream of {} features and {} labels, {} frames buffered",
            n_ftrs, n_labs, buf_frames
        );
        let shared = Rc::new(RefCell::new(Shared {
            base,
            base_at: Cursor::Before,
            ftr_at: Cursor::Before,
            lab_at: Cursor::Before,
            ftr_cache: FrameCache::new(n_ftrs, buf_frames),
            lab_cache: FrameCache::new(n_labs, buf_frames),
            n_ftrs,
            n_labs,
        }));
        Ok((
            Self {
                shared: Rc::clone(&shared),
            },
            SplitLabs { shared },
        ))
    }
}

macro_rules! split_positionable {
    ($view:ident, $side:expr) => {
        impl<S: FeatureLabelSource> Positionable for $view<S> {
            fn num_segs(&self) -> Result<Option<usize>> {
                self.shared.borrow().base.num_segs()
            }

            fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
                self.shared.borrow().base.num_frames(segno)
            }

            fn nextseg(&mut self) -> Result<Option<usize>> {
                self.shared.borrow_mut().nextseg($side)
            }

            fn rewind(&mut self) -> Result<Seek> {
                self.shared.borrow_mut().rewind($side)
            }

            fn get_pos(&self) -> Result<Option<Position>> {
                Ok(self.shared.borrow().cursor($side).position())
            }

            fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
                self.shared.borrow_mut().set_pos($side, segno, frameno)
            }
        }
    };
}

split_positionable!(SplitFtrs, Side::Ftrs);
split_positionable!(SplitLabs, Side::Labs);

impl<S: FeatureLabelSource> FeatureSource for SplitFtrs<S> {
    fn num_ftrs(&self) -> usize {
        self.shared.borrow().n_ftrs
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        self.shared.borrow_mut().read_ftrs(count, out)
    }
}

impl<S: FeatureLabelSource> LabelSource for SplitLabs<S> {
    fn num_labs(&self) -> usize {
        self.shared.borrow().n_labs
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        self.shared.borrow_mut().read_labs(count, out)
    }
}
