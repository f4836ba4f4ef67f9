//! Bounded cache of frames read ahead on behalf of another consumer.

use segstream_core::Position;

/// A bounded FIFO of frames tagged with the stream position of its head.
///
/// When one reader pulls a combined record from a stream and only needs part
/// of it, the other part goes into a `FrameCache` so that the second reader
/// can later be served without seeking. The cache only ever holds a
/// contiguous run of frames from a single segment.
///
/// ```
/// use segstream_buffer::FrameCache;
/// use segstream_core::Position;
///
/// let mut c = FrameCache::<u32>::new(1, 4);
/// c.restart(Position::new(0, 0));
/// c.spare_mut(2)[..2].copy_from_slice(&[7, 8]);
/// c.commit(2);
/// assert!(c.holds(Position::new(0, 0)));
/// assert!(c.follows(Position::new(0, 2)));
///
/// let mut out = [0u32; 1];
/// assert_eq!(c.pop_into(1, Some(&mut out)), 1);
/// assert_eq!(out, [7]);
/// assert!(c.holds(Position::new(0, 1)));
/// ```
#[derive(Debug, Clone)]
pub struct FrameCache<T> {
    width: usize,
    max_frames: usize,
    data: Vec<T>,
    // Frame offsets of the live run inside `data`.
    head: usize,
    tail: usize,
    start: Option<Position>,
}

impl<T: Copy + Default> FrameCache<T> {
    /// Creates an empty cache of up to `max_frames` frames of `width` values.
    pub fn new(width: usize, max_frames: usize) -> Self {
        Self {
            width,
            max_frames,
            data: vec![T::default(); width * max_frames],
            head: 0,
            tail: 0,
            start: None,
        }
    }

    /// Number of cached frames.
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Frames that can still be added.
    pub fn room(&self) -> usize {
        self.max_frames - self.len()
    }

    /// Position of the first cached frame.
    pub fn start(&self) -> Option<Position> {
        self.start
    }

    /// Position just past the last cached frame.
    pub fn end(&self) -> Option<Position> {
        self.start
            .map(|p| Position::new(p.segno, p.frameno + self.len()))
    }

    /// Drops every frame and forgets the position.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.start = None;
    }

    /// Drops every frame and anchors the cache at `pos`.
    pub fn restart(&mut self, pos: Position) {
        self.head = 0;
        self.tail = 0;
        self.start = Some(pos);
    }

    /// True if the next frame a reader at `pos` needs is cached.
    pub fn holds(&self, pos: Position) -> bool {
        !self.is_empty() && self.start == Some(pos)
    }

    /// True if frames read at `pos` would extend the cached run.
    pub fn follows(&self, pos: Position) -> bool {
        self.end() == Some(pos)
    }

    /// Returns a writable area for `count` new frames after the cached ones.
    ///
    /// `count` is clamped to [`room`](FrameCache::room); the slice may be
    /// shorter than `count * width` when the cache is nearly full.
    pub fn spare_mut(&mut self, count: usize) -> &mut [T] {
        if self.head > 0 {
            let w = self.width;
            self.data.copy_within(self.head * w..self.tail * w, 0);
            self.tail -= self.head;
            self.head = 0;
        }
        let n = count.min(self.room());
        let w = self.width;
        &mut self.data[self.tail * w..(self.tail + n) * w]
    }

    /// Appends `count` frames previously written through
    /// [`spare_mut`](FrameCache::spare_mut).
    pub fn commit(&mut self, count: usize) {
        self.tail = (self.tail + count).min(self.max_frames);
    }

    /// Moves up to `count` frames from the head into `out`, or discards them
    /// when `out` is `None`. Returns the number of frames served.
    pub fn pop_into(&mut self, count: usize, out: Option<&mut [T]>) -> usize {
        let n = count.min(self.len());
        let w = self.width;
        if let Some(out) = out {
            out[..n * w].copy_from_slice(&self.data[self.head * w..(self.head + n) * w]);
        }
        self.head += n;
        if let Some(p) = self.start.as_mut() {
            p.frameno += n;
        }
        if self.is_empty() {
            self.head = 0;
            self.tail = 0;
        }
        n
    }
}
