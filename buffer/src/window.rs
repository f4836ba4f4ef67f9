//! Lookahead/lookbehind window over a feature stream.

use segstream_core::{Error, FeatureSource, Position, Positionable, Result, Seek};
use tracing::{debug, trace};

/// A window of contiguous frames from the current segment of an upstream
/// feature stream.
///
/// Filters that need context around each output frame ask for a frame range
/// with [`fill`](FrameWindow::fill). The window keeps whatever part of the
/// previous range overlaps the new one, seeks upstream only when the first
/// frame it must load is not where the upstream cursor already is, and pads
/// both ends of the segment by repeating the edge frames: frames before the
/// start copy frame 0, frames past the end copy the last frame for at most
/// `max_pad` frames.
///
/// The window also implements [`Positionable`], tracking the logical cursor of
/// the filter built on top of it.
///
/// ```
/// use segstream_buffer::FrameWindow;
/// use segstream_core::{Positionable, VecStream};
///
/// let mut s = VecStream::new(1, 0);
/// s.push_segment(&[1.0, 2.0, 3.0], &[]).unwrap();
///
/// let mut w = FrameWindow::new(s, 8, 1).unwrap();
/// w.nextseg().unwrap();
/// // Two frames of lookbehind and one past the end.
/// assert_eq!(w.fill(-2, 6).unwrap(), 6);
/// assert_eq!(&w.frames()[..6], &[1.0, 1.0, 1.0, 2.0, 3.0, 3.0]);
/// ```
pub struct FrameWindow<S> {
    upstream: S,
    width: usize,
    capacity: usize,
    max_pad: usize,
    buf: Vec<f32>,
    // Segment frame index of buf[0]; negative inside the start padding.
    base: isize,
    // Valid frames from `base`.
    valid: usize,
    segno: Option<usize>,
    pos: usize,
    seg_len: Option<usize>,
    // Upstream cursor within the current segment, to skip redundant seeks.
    upstream_pos: usize,
}

impl<S: FeatureSource> FrameWindow<S> {
    /// Creates a window of `capacity` frames over `upstream`.
    pub fn new(upstream: S, capacity: usize, max_pad: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidConfig("window capacity must be positive".into()));
        }
        let width = upstream.num_ftrs();
        debug!("frame window: width={} capacity={} max_pad={}", width, capacity, max_pad);
        Ok(Self {
            upstream,
            width,
            capacity,
            max_pad,
            buf: vec![0.0; width * capacity],
            base: 0,
            valid: 0,
            segno: None,
            pos: 0,
            seg_len: None,
            upstream_pos: 0,
        })
    }

    /// Number of features per frame.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Maximum number of frames one [`fill`](FrameWindow::fill) returns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Logical frame position within the current segment.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Current segment, if positioned.
    pub fn segno(&self) -> Option<usize> {
        self.segno
    }

    /// Length of the current segment once its end has been seen.
    pub fn seg_len(&self) -> Option<usize> {
        self.seg_len
    }

    /// Moves the logical position forward after frames were consumed.
    pub fn advance(&mut self, frames: usize) {
        self.pos += frames;
    }

    /// The buffered frames, starting with the first frame of the last fill.
    pub fn frames(&self) -> &[f32] {
        &self.buf
    }

    pub fn upstream(&self) -> &S {
        &self.upstream
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }

    /// Makes frames `[start, start + len)` of the current segment available at
    /// the front of [`frames`](FrameWindow::frames).
    ///
    /// Requests longer than the capacity are truncated. Returns how many of the
    /// requested frames are available, which is short only when the segment
    /// ends more than `max_pad` frames before `start + len`.
    pub fn fill(&mut self, start: isize, len: usize) -> Result<usize> {
        let segno = self.segno.ok_or(Error::NotPositioned)?;
        let len = len.min(self.capacity) as isize;
        let w = self.width;

        let base = self.base;
        let cont = self.valid as isize;
        let mut overlap_min = start.max(base);
        let mut overlap_max = (start + len).min(base + cont);
        let (mut load_base, mut load_len);
        // Kept frames must sit at one end of the new range.
        let usable = overlap_min == start || overlap_max == start + len;
        if overlap_min < overlap_max && usable {
            let from = ((overlap_min - base) as usize) * w;
            let to = ((overlap_min - start) as usize) * w;
            let n = ((overlap_max - overlap_min) as usize) * w;
            self.buf.copy_within(from..from + n, to);
            if overlap_min == start {
                load_base = overlap_max;
                load_len = len - (overlap_max - start);
            } else {
                load_base = start;
                load_len = overlap_min - start;
            }
        } else {
            load_base = start;
            load_len = len;
            overlap_min = start;
            overlap_max = start;
        }

        let mut prepad = 0isize;
        if load_base < 0 {
            prepad = -load_base;
            load_len -= prepad;
            load_base = 0;
        }

        let mut got = 0isize;
        let before_end = self.seg_len.is_none_or(|n| load_base < n as isize);
        if load_len > 0 && before_end {
            if load_base as usize != self.upstream_pos {
                trace!(
                    "window seeks upstream to ({}, {}) from {}",
                    segno, load_base, self.upstream_pos
                );
                if self.upstream.set_pos(segno, load_base as usize)? != Seek::Done {
                    return Err(Error::NotSeekable("frame window needs to seek upstream"));
                }
                self.upstream_pos = load_base as usize;
            }
            let at = ((load_base - start) as usize) * w;
            let n = load_len as usize;
            got = self.upstream.read_ftrs(n, Some(&mut self.buf[at..at + n * w]))? as isize;
            self.upstream_pos += got as usize;
        }
        trace!(
            "fill({}:{}+{}) overlap {}..{} load {}+{} got {}",
            segno, start, len, overlap_min, overlap_max, load_base, load_len, got
        );

        if got < load_len && self.seg_len.is_none() {
            self.seg_len = Some((load_base + got) as usize);
        }
        if load_base < overlap_min && load_base + got != overlap_min {
            return Err(Error::corrupt(format!(
                "upstream segment {} shrank while filling frames {}..{}",
                segno, load_base, overlap_min
            )));
        }

        let real_end = overlap_max.max(load_base + got);
        if real_end <= 0 {
            // The segment has no frames at all.
            self.base = start;
            self.valid = 0;
            return Ok(0);
        }

        if prepad > 0 {
            let first = (prepad as usize) * w;
            for f in 0..prepad as usize {
                self.buf.copy_within(first..first + w, f * w);
            }
        }

        self.base = start;
        let mut cont = real_end - start;
        if cont < len {
            let seg_len = self.seg_len.map_or(real_end, |n| n as isize);
            let howfar = (start + len).min(seg_len + self.max_pad as isize);
            let last = ((cont - 1) as usize) * w;
            for f in cont..(howfar - start) {
                self.buf.copy_within(last..last + w, (f as usize) * w);
            }
            cont = cont.max(howfar - start);
        }
        self.valid = cont as usize;
        Ok(len.min(cont) as usize)
    }

    fn invalidate(&mut self) {
        self.base = 0;
        self.valid = 0;
    }
}

impl<S: FeatureSource> Positionable for FrameWindow<S> {
    fn num_segs(&self) -> Result<Option<usize>> {
        self.upstream.num_segs()
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        self.upstream.num_frames(segno)
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let next = self.upstream.nextseg()?;
        self.invalidate();
        self.segno = next;
        self.pos = 0;
        self.upstream_pos = 0;
        self.seg_len = None;
        debug!("frame window at segment {:?}", next);
        Ok(next)
    }

    fn rewind(&mut self) -> Result<Seek> {
        let res = self.upstream.rewind()?;
        if res.is_done() {
            self.invalidate();
            self.segno = None;
            self.pos = 0;
            self.upstream_pos = 0;
            self.seg_len = None;
        }
        Ok(res)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        if self.upstream.get_pos()?.is_none() {
            return Ok(None);
        }
        Ok(self.segno.map(|s| Position::new(s, self.pos)))
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<Seek> {
        let res = self.upstream.set_pos(segno, frameno)?;
        if res.is_done() {
            if self.segno != Some(segno) {
                self.segno = Some(segno);
                self.seg_len = None;
                self.invalidate();
            }
            self.pos = frameno;
            self.upstream_pos = frameno;
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    fn ramp(frames: usize, width: usize) -> VecStream {
        let mut s = VecStream::new(width, 0);
        let data: Vec<f32> = (0..frames * width).map(|v| v as f32).collect();
        s.push_segment(&data, &[]).unwrap();
        s
    }

    #[test]
    fn test_fill_inside_segment() {
        let mut w = FrameWindow::new(ramp(10, 2), 4, 0).unwrap();
        w.nextseg().unwrap();
        assert_eq!(w.fill(0, 3).unwrap(), 3);
        assert_eq!(&w.frames()[..6], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fill_reuses_overlap_sequentially() {
        // A sequential upstream cannot seek: reuse must avoid it.
        let mut s = VecStream::sequential(1, 0);
        s.push_segment(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], &[]).unwrap();
        let mut w = FrameWindow::new(s, 4, 0).unwrap();
        w.nextseg().unwrap();
        assert_eq!(w.fill(0, 4).unwrap(), 4);
        assert_eq!(w.fill(2, 4).unwrap(), 4);
        assert_eq!(&w.frames()[..4], &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fill_prepads_with_first_frame() {
        let mut w = FrameWindow::new(ramp(3, 1), 8, 0).unwrap();
        w.nextseg().unwrap();
        assert_eq!(w.fill(-3, 5).unwrap(), 5);
        assert_eq!(&w.frames()[..5], &[0.0, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_fill_postpad_limited() {
        let mut w = FrameWindow::new(ramp(3, 1), 8, 2).unwrap();
        w.nextseg().unwrap();
        // Frames 1..8 requested; 1,2 are real, 3,4 are padding.
        assert_eq!(w.fill(1, 7).unwrap(), 4);
        assert_eq!(&w.frames()[..4], &[1.0, 2.0, 2.0, 2.0]);
        assert_eq!(w.seg_len(), Some(3));
    }

    #[test]
    fn test_fill_backwards_seeks_upstream() {
        let mut w = FrameWindow::new(ramp(10, 1), 4, 0).unwrap();
        w.nextseg().unwrap();
        assert_eq!(w.fill(6, 4).unwrap(), 4);
        assert_eq!(w.fill(4, 4).unwrap(), 4);
        assert_eq!(&w.frames()[..4], &[4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_fill_truncates_to_capacity() {
        let mut w = FrameWindow::new(ramp(10, 1), 4, 0).unwrap();
        w.nextseg().unwrap();
        assert_eq!(w.fill(0, 9).unwrap(), 4);
    }

    #[test]
    fn test_fill_before_nextseg() {
        let mut w = FrameWindow::new(ramp(3, 1), 4, 0).unwrap();
        assert!(matches!(w.fill(0, 1), Err(Error::NotPositioned)));
    }

    #[test]
    fn test_positioning_tracks_logical_cursor() {
        let mut w = FrameWindow::new(ramp(5, 1), 4, 0).unwrap();
        assert_eq!(w.get_pos().unwrap(), None);
        w.nextseg().unwrap();
        w.advance(2);
        assert_eq!(w.get_pos().unwrap(), Some(Position::new(0, 2)));
        assert_eq!(w.set_pos(0, 4).unwrap(), Seek::Done);
        assert_eq!(w.fill(4, 1).unwrap(), 1);
        assert_eq!(w.frames()[0], 4.0);
    }

    #[test]
    fn test_empty_segment() {
        let mut s = VecStream::new(1, 0);
        s.push_segment(&[], &[]).unwrap();
        let mut w = FrameWindow::new(s, 4, 2).unwrap();
        w.nextseg().unwrap();
        assert_eq!(w.fill(-1, 3).unwrap(), 0);
    }
}
