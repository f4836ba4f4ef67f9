//! Arithmetic sequences and their set operations.

/// The sequence `start, start + step, ..., end`.
///
/// `step` is never zero. A node whose `end` lies on the wrong side of `start`
/// holds no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Node {
    pub start: i64,
    pub step: i64,
    pub end: i64,
}

impl Node {
    /// Builds a node, snapping `end` onto the sequence.
    pub fn new(start: i64, step: i64, end: i64) -> Self {
        let mut n = Self { start, step, end };
        n.fixup_end();
        n
    }

    pub fn len(&self) -> usize {
        if self.step * (self.end - self.start) >= 0 {
            (1 + (self.end - self.start) / self.step) as usize
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fixup_end(&mut self) {
        self.end = self.start + (self.len() as i64 - 1) * self.step;
    }

    fn bounds(&self) -> (i64, i64) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// Whether `val` is one of the values.
    pub fn holds(&self, val: i64) -> bool {
        if self.is_empty() {
            return false;
        }
        let (lo, hi) = self.bounds();
        lo <= val && val <= hi && (val - self.start) % self.step == 0
    }

    /// Nth value, if within the node.
    pub fn get(&self, ix: usize) -> Option<i64> {
        (ix < self.len()).then(|| self.start + ix as i64 * self.step)
    }

    /// Removes one value, splitting the node if it lies inside.
    fn subtract_val(self, val: i64) -> Vec<Node> {
        if !self.holds(val) {
            return vec![self];
        }
        let step = self.step;
        let pieces = if val == self.start {
            vec![Node::new(self.start + step, step, self.end)]
        } else if val == self.end {
            vec![Node::new(self.start, step, self.end - step)]
        } else {
            vec![
                Node::new(self.start, step, val - step),
                Node::new(val + step, step, self.end),
            ]
        };
        pieces.into_iter().filter(|n| !n.is_empty()).collect()
    }

    /// Removes every value of `sub`. Returns the non-empty remainder, in
    /// order.
    pub fn subtract(self, sub: &Node) -> Vec<Node> {
        if self.is_empty() {
            return Vec::new();
        }
        if sub.is_empty() {
            return vec![self];
        }
        if sub.len() == 1 {
            return self.subtract_val(sub.start);
        }
        let (lo, hi) = self.bounds();
        let (sub_lo, sub_hi) = sub.bounds();
        if sub_hi < lo || sub_lo > hi {
            return vec![self];
        }
        let step = self.step;
        if step.abs() == sub.step.abs() {
            // Aligned sequences: only a matching phase removes anything.
            if (self.start - sub.start).rem_euclid(step.abs()) != 0 {
                return vec![self];
            }
            let mut first = (sub.start - self.start) / step;
            let mut last = (sub.end - self.start) / step;
            if last < first {
                std::mem::swap(&mut first, &mut last);
            }
            let n = self.len() as i64;
            let mut pieces = Vec::with_capacity(2);
            if first > 0 {
                pieces.push(Node::new(self.start, step, self.start + step * (first - 1)));
            }
            if last < n - 1 {
                pieces.push(Node::new(self.start + step * (last + 1), step, self.end));
            }
            return pieces;
        }
        let mut pieces = vec![self];
        for i in 0..sub.len() {
            let val = sub.start + i as i64 * sub.step;
            pieces = pieces.into_iter().flat_map(|p| p.subtract_val(val)).collect();
        }
        pieces
    }
}

/// Removes the values of every node in `neg` from `pos`.
pub(crate) fn subtract_all(mut pos: Vec<Node>, neg: &[Node]) -> Vec<Node> {
    for sub in neg {
        pos = pos.into_iter().flat_map(|p| p.subtract(sub)).collect();
    }
    pos
}

/// Drops empty nodes and merges neighbours that continue one sequence.
///
/// Two single values become a two-value sequence with their difference as
/// step, so `4,5,6` collapses to `4:1:6`.
pub(crate) fn canonicalize(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    for next in nodes.into_iter().filter(|n| !n.is_empty()) {
        let Some(cur) = out.last_mut() else {
            out.push(next);
            continue;
        };
        if cur.len() == 1 && next.len() == 1 {
            cur.step = next.start - cur.start;
            if cur.step == 0 {
                cur.step = 1;
            }
        }
        if cur.end + cur.step == next.start && (next.len() == 1 || next.step == cur.step) {
            cur.end = next.end;
            cur.fixup_end();
        } else {
            out.push(next);
        }
    }
    out
}
