//! Recursive-descent parser for range expressions.
//!
//! ```text
//! spec     := term ((';' | '\n') term)*
//! term     := sequence ('/' sequence)?
//! sequence := range ((',' | ' ') range)*
//! range    := 'all' | 'nil' | 'none' | matlab
//! matlab   := number? (':' number?)? (':' number?)?
//! number   := '^'? '-'? digit+
//! ```

use crate::error::{RangeError, Result};
use crate::node::{Node, subtract_all};

/// Separators between the parts of a `start:step:end` range.
const COLONS: &[u8] = b":-";
const COMMAS: &[u8] = b", \t";
const SLASHES: &[u8] = b"/";
const SEMIS: &[u8] = b";\n";
const SPACES: &[u8] = b" \t";

pub(crate) struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    min: i64,
    max: Option<i64>,
}

/// Outcome of one sequence separator scan.
#[derive(PartialEq)]
enum Sep {
    None,
    Space,
    Comma,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str, line: usize, min: i64, max: Option<i64>) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            line,
            min,
            max,
        }
    }

    /// Parses the whole text, failing on anything left over.
    pub fn parse(mut self) -> Result<Vec<Node>> {
        let nodes = self.spec()?;
        self.skip(SPACES);
        if self.pos < self.bytes.len() {
            return Err(self.error("unparseable residue"));
        }
        Ok(nodes)
    }

    fn error(&self, msg: &'static str) -> RangeError {
        RangeError::Parse {
            msg,
            line: self.line,
            offset: self.pos,
            text: self.text.to_owned(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn at(&self, set: &[u8]) -> bool {
        self.peek().is_some_and(|c| set.contains(&c))
    }

    fn skip(&mut self, set: &[u8]) {
        while self.at(set) {
            self.pos += 1;
        }
    }

    fn upper(&self, what: &'static str) -> Result<i64> {
        self.max.ok_or_else(|| self.error(what))
    }

    /// An integer, possibly counted back from the upper limit with `^`.
    fn number(&mut self) -> Result<Option<i64>> {
        self.skip(SPACES);
        let save = self.pos;
        let from_end = self.peek() == Some(b'^');
        if from_end {
            self.pos += 1;
        }
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        let digits = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits {
            self.pos = save;
            return Ok(None);
        }
        let mut val: i64 = self.text[digits..self.pos]
            .parse()
            .map_err(|_| self.error("number too large"))?;
        if negative {
            val = -val;
        }
        if from_end {
            val = self.upper("no upper limit for '^'")? - 1 - val;
        }
        Ok(Some(val))
    }

    /// `start:step:end` with every part optional but the first colon.
    fn matlab(&mut self) -> Result<Option<Node>> {
        self.skip(SPACES);
        let start = match self.number()? {
            Some(v) => v,
            None if self.at(COLONS) => self.min,
            None => return Ok(None),
        };
        let mut end = start;
        let mut step = 0;
        let mut read_end = false;
        for pass in 0..2 {
            self.skip(SPACES);
            if !self.at(COLONS) {
                break;
            }
            // A value before a second colon was the step.
            if pass > 0 && read_end {
                step = end;
            }
            self.pos += 1;
            match self.number()? {
                Some(v) => {
                    end = v;
                    read_end = true;
                }
                None => end = self.upper("no upper limit for open range")? - 1,
            }
        }
        if step == 0 {
            step = if end < start { -1 } else { 1 };
        }
        Ok(Some(Node::new(start, step, end)))
    }

    fn range(&mut self) -> Result<Option<Node>> {
        self.skip(SPACES);
        let rest = &self.text[self.pos..];
        let word_len = rest
            .bytes()
            .take_while(|c| c.is_ascii_alphabetic())
            .count();
        match &rest[..word_len] {
            "all" => {
                self.pos += word_len;
                let max = self.upper("no upper limit for 'all'")?;
                Ok(Some(Node::new(self.min, 1, max - 1)))
            }
            "nil" | "none" => {
                self.pos += word_len;
                Ok(Some(Node::new(0, 1, -1)))
            }
            _ => self.matlab(),
        }
    }

    fn sequence(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut sep = Sep::Space;
        self.skip(SPACES);
        loop {
            match self.range()? {
                Some(node) => {
                    nodes.push(node);
                    sep = Sep::Space;
                }
                None if sep == Sep::Comma => {
                    return Err(self.error("separator not followed by a range"));
                }
                None => sep = Sep::None,
            }
            if self.at(SPACES) {
                sep = Sep::Space;
                self.skip(SPACES);
            }
            if self.at(COMMAS) {
                sep = Sep::Comma;
                self.pos += 1;
            }
            if sep == Sep::None {
                break;
            }
        }
        Ok(nodes)
    }

    fn term(&mut self) -> Result<Vec<Node>> {
        self.skip(SPACES);
        let nodes = self.sequence()?;
        self.skip(SPACES);
        if !self.at(SLASHES) {
            return Ok(nodes);
        }
        self.pos += 1;
        let neg = self.sequence()?;
        Ok(subtract_all(nodes, &neg))
    }

    fn spec(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            nodes.extend(self.term()?);
            self.skip(SPACES);
            if !self.at(SEMIS) {
                return Ok(nodes);
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, max: Option<i64>) -> Result<Vec<Node>> {
        Parser::new(text, 1, 0, max).parse()
    }

    fn values(text: &str, max: Option<i64>) -> Vec<i64> {
        parse(text, max)
            .unwrap()
            .iter()
            .flat_map(|n| (0..n.len()).filter_map(|i| n.get(i)))
            .collect()
    }

    #[test]
    fn test_single_and_lists() {
        assert_eq!(values("7", None), vec![7]);
        assert_eq!(values("0-2,4", Some(6)), vec![0, 1, 2, 4]);
        assert_eq!(values("1 3\t5", None), vec![1, 3, 5]);
        assert_eq!(values("", None), Vec::<i64>::new());
    }

    #[test]
    fn test_matlab_forms() {
        assert_eq!(values("1:2:7", None), vec![1, 3, 5, 7]);
        assert_eq!(values("5:1", None), vec![5, 4, 3, 2, 1]);
        assert_eq!(values("3:-1:0", None), vec![3, 2, 1, 0]);
        assert_eq!(values(":3", Some(10)), vec![0, 1, 2, 3]);
        assert_eq!(values("7:", Some(10)), vec![7, 8, 9]);
        assert_eq!(values(":", Some(3)), vec![0, 1, 2]);
        assert_eq!(values("0:3:", Some(10)), vec![0, 3, 6, 9]);
        assert_eq!(values("2::5", Some(10)), vec![2, 3, 4, 5]);
        assert_eq!(values("-3:-1", None), vec![-3, -2, -1]);
    }

    #[test]
    fn test_from_end_and_keywords() {
        assert_eq!(values("^0", Some(10)), vec![9]);
        assert_eq!(values("^2:^0", Some(10)), vec![7, 8, 9]);
        assert_eq!(values("all", Some(4)), vec![0, 1, 2, 3]);
        assert_eq!(values("nil", Some(4)), Vec::<i64>::new());
        assert_eq!(values("none;2", None), vec![2]);
        assert!(parse("^1", None).is_err());
        assert!(parse("all", None).is_err());
        assert!(parse("4:", None).is_err());
    }

    #[test]
    fn test_subtraction_and_terms() {
        assert_eq!(values("all/3:5", Some(8)), vec![0, 1, 2, 6, 7]);
        assert_eq!(values("0:9/1:3:7", None), vec![0, 2, 3, 5, 6, 8, 9]);
        assert_eq!(values("0:2;8;4", None), vec![0, 1, 2, 8, 4]);
        assert_eq!(values("1,2\n3", None), vec![1, 2, 3]);
    }

    #[test]
    fn test_errors_report_offset() {
        match parse("1,2,", None) {
            Err(RangeError::Parse { msg, offset, .. }) => {
                assert_eq!(msg, "separator not followed by a range");
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse("1,2 x", None) {
            Err(RangeError::Parse { msg, offset, .. }) => {
                assert_eq!(msg, "unparseable residue");
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("12345678901234567890123", None).is_err());
    }
}
