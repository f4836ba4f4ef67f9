//! Symbolic label names.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use segstream_core::{Error, Result};
use tracing::debug;

/// A bidirectional map between label indices and token names.
///
/// Read from a phoneset file: the first line holds the token count, each
/// following line a token optionally followed by its index.
///
/// ```text
/// 3
/// h# 0
/// aa 1
/// ae 2
/// ```
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    tokens: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl TokenMap {
    /// Builds a map from tokens in index order.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = Self::default();
        for t in tokens {
            map.push(t.into());
        }
        map
    }

    /// Loads a phoneset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::read(BufReader::new(file))
    }

    /// Parses a phoneset from a reader.
    pub fn read<R: BufRead>(r: R) -> Result<Self> {
        let mut lines = r.lines();
        let first = lines.next().transpose()?.unwrap_or_default();
        let declared: usize = first.trim().parse().map_err(|_| Error::Parse {
            line: 1,
            msg: format!("first line {:?} is not a token count", first),
        })?;
        let mut map = Self::default();
        for (i, line) in lines.enumerate() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let Some(tok) = fields.next() else {
                continue;
            };
            if map.len() == declared {
                return Err(Error::Parse {
                    line: i + 2,
                    msg: format!("more than {} tokens", declared),
                });
            }
            if let Some(rest) = fields.next() {
                if rest.parse::<usize>().ok() != Some(map.len()) {
                    debug!("token {:?} listed with index {:?}, using {}", tok, rest, map.len());
                }
            }
            map.push(tok.to_string());
        }
        if map.len() < declared {
            return Err(Error::Parse {
                line: map.len() + 2,
                msg: format!("only {} of {} tokens", map.len(), declared),
            });
        }
        Ok(map)
    }

    /// Writes the map in phoneset format.
    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "{}", self.tokens.len())?;
        for (i, t) in self.tokens.iter().enumerate() {
            writeln!(w, "{} {}", t, i)?;
        }
        Ok(())
    }

    /// Index of a token name.
    pub fn index(&self, token: &str) -> Option<u32> {
        self.lookup.get(token).copied()
    }

    /// Token name of an index.
    pub fn token(&self, index: u32) -> Option<&str> {
        self.tokens.get(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn push(&mut self, tok: String) {
        let idx = self.tokens.len() as u32;
        // The first occurrence wins lookups.
        self.lookup.entry(tok.clone()).or_insert(idx);
        self.tokens.push(tok);
    }
}
