//! Compiled ranges and cursors over them.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{RangeError, Result};
use crate::node::{Node, canonicalize};
use crate::parser::Parser;

/// An ordered list of integers compiled from a range expression.
///
/// Values keep the order they were written in and may repeat. `min` and
/// `max` are the limits that open-ended forms (`all`, `:3`, `^0`) resolve
/// against; `max` is exclusive and optional, and forms that need it fail
/// without it.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    spec: String,
    min: i64,
    max: Option<i64>,
    nodes: Vec<Node>,
}

impl Range {
    /// Compiles `spec`. A leading `@` reads the expression from a file, one
    /// expression per line, `#` starting a comment line.
    pub fn parse(spec: &str, min: i64, max: Option<i64>) -> Result<Self> {
        let nodes = match spec.strip_prefix('@') {
            Some(path) => Self::parse_file(Path::new(path.trim()), min, max)?,
            None => Parser::new(spec, 1, min, max).parse()?,
        };
        let nodes = canonicalize(nodes);
        debug!("range {:?} compiled to {} pieces", spec, nodes.len());
        Ok(Self {
            spec: spec.to_owned(),
            min,
            max,
            nodes,
        })
    }

    /// Every value from `min` up to `max - 1`.
    pub fn all(min: i64, max: i64) -> Self {
        Self {
            spec: "all".to_owned(),
            min,
            max: Some(max),
            nodes: canonicalize(vec![Node::new(min, 1, max - 1)]),
        }
    }

    fn parse_file(path: &Path, min: i64, max: Option<i64>) -> Result<Vec<Node>> {
        let text = fs::read_to_string(path).map_err(|source| RangeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut nodes = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            nodes.extend(Parser::new(line, i + 1, min, max).parse()?);
        }
        Ok(nodes)
    }

    /// The expression this range was compiled from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    /// Number of values, counting repeats.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(Node::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The `ix`-th value.
    pub fn index(&self, mut ix: usize) -> Option<i64> {
        for node in &self.nodes {
            let n = node.len();
            if ix < n {
                return node.get(ix);
            }
            ix -= n;
        }
        None
    }

    pub fn first(&self) -> Option<i64> {
        self.nodes.first().map(|n| n.start)
    }

    pub fn last(&self) -> Option<i64> {
        self.nodes.last().map(|n| n.end)
    }

    /// How many times `val` occurs.
    pub fn contains(&self, val: i64) -> usize {
        self.nodes.iter().filter(|n| n.holds(val)).count()
    }

    /// Whether the range is exactly every value between the limits, in
    /// either direction.
    pub fn is_full(&self) -> bool {
        let Some(max) = self.max else {
            return false;
        };
        match self.nodes.as_slice() {
            [n] => {
                let step = if self.min < max { 1 } else { -1 };
                n.start == self.min && n.end == max - 1 && n.step == step
            }
            _ => false,
        }
    }

    /// A restartable cursor at the first value.
    pub fn cursor(&self) -> RangeCursor<'_> {
        RangeCursor::new(self)
    }

    /// The values in order.
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.nodes
            .iter()
            .flat_map(|n| (0..n.len()).filter_map(move |i| n.get(i)))
    }
}

/// A position within a [`Range`] that can skip ahead and restart.
#[derive(Debug, Clone)]
pub struct RangeCursor<'a> {
    nodes: &'a [Node],
    node: usize,
    val: i64,
}

impl<'a> RangeCursor<'a> {
    fn new(range: &'a Range) -> Self {
        let mut c = Self {
            nodes: &range.nodes,
            node: 0,
            val: 0,
        };
        c.reset();
        c
    }

    /// Back to the first value.
    pub fn reset(&mut self) {
        self.enter(0);
    }

    fn enter(&mut self, node: usize) {
        self.node = node;
        self.val = self.nodes.get(node).map_or(0, |n| n.start);
    }

    pub fn at_end(&self) -> bool {
        self.node >= self.nodes.len()
    }

    /// Current value, `None` past the end.
    pub fn val(&self) -> Option<i64> {
        (!self.at_end()).then_some(self.val)
    }

    /// Moves to the next value and returns it.
    pub fn advance(&mut self) -> Option<i64> {
        self.forward(1)
    }

    /// Moves `n` values forward and returns the new current value.
    pub fn forward(&mut self, mut n: usize) -> Option<i64> {
        while n > 0 && !self.at_end() {
            let node = self.nodes[self.node];
            let left = ((node.end - self.val) / node.step) as usize;
            if n <= left {
                self.val += n as i64 * node.step;
                break;
            }
            n -= left + 1;
            self.enter(self.node + 1);
        }
        self.val()
    }
}

impl Iterator for RangeCursor<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let v = self.val()?;
        self.advance();
        Some(v)
    }
}
