//! Fixed per-column normalization and norm side files.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use segstream_core::{Error, FeatureSource, Positionable, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

/// Per-column `bias` and `scale`, applied as `(x + bias) * scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormVectors {
    pub bias: Vec<f32>,
    pub scale: Vec<f32>,
}

impl NormVectors {
    /// The identity transform over `width` columns.
    pub fn identity(width: usize) -> Self {
        Self {
            bias: vec![0.0; width],
            scale: vec![1.0; width],
        }
    }

    /// Builds the vectors that subtract `means` and divide by `sdevs`.
    pub fn from_stats(means: &[f32], sdevs: &[f32]) -> Self {
        Self {
            bias: means.iter().map(|m| -m).collect(),
            scale: sdevs.iter().map(|s| 1.0 / s).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.bias.len()
    }

    pub(crate) fn check_width(&self, width: usize) -> Result<()> {
        for len in [self.bias.len(), self.scale.len()] {
            if len != width {
                return Err(Error::WidthMismatch {
                    expected: width,
                    got: len,
                });
            }
        }
        Ok(())
    }

    /// Normalizes whole frames in place.
    pub(crate) fn apply(&self, frames: &mut [f32]) {
        let w = self.bias.len();
        if w == 0 {
            return;
        }
        for frame in frames.chunks_exact_mut(w) {
            for ((x, b), s) in frame.iter_mut().zip(&self.bias).zip(&self.scale) {
                *x = (*x + b) * s;
            }
        }
    }
}

/// Loads norms for `width` columns from a side file.
///
/// The file holds two `vec N` blocks: the column means, then the scales.
///
/// ```text
/// vec 2
/// 0.5
/// -1.25
/// vec 2
/// 2
/// 0.8
/// ```
pub fn load_norms(path: impl AsRef<Path>, width: usize) -> Result<NormVectors> {
    let file = File::open(path.as_ref())?;
    read_norms(BufReader::new(file), width)
}

/// Parses a norm side file. Vectors longer than `width` are truncated with a
/// warning.
pub fn read_norms<R: BufRead>(mut r: R, width: usize) -> Result<NormVectors> {
    let mut text = String::new();
    r.read_to_string(&mut text)?;
    let mut tokens = Tokens::new(&text);
    let means = tokens.vector(width)?;
    let scale = tokens.vector(width)?;
    info!("loaded norms for {} features", width);
    Ok(NormVectors {
        bias: means.iter().map(|m| -m).collect(),
        scale,
    })
}

/// Writes norms in the side-file format read by [`read_norms`].
pub fn write_norms<W: Write>(mut w: W, norms: &NormVectors) -> Result<()> {
    writeln!(w, "vec {}", norms.bias.len())?;
    for b in &norms.bias {
        writeln!(w, "{}", -b)?;
    }
    writeln!(w, "vec {}", norms.scale.len())?;
    for s in &norms.scale {
        writeln!(w, "{}", s)?;
    }
    Ok(())
}

struct Tokens<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: std::str::SplitWhitespace<'a>,
    line: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            current: "".split_whitespace(),
            line: 0,
        }
    }

    fn next(&mut self) -> Result<&'a str> {
        loop {
            if let Some(tok) = self.current.next() {
                return Ok(tok);
            }
            let Some((i, line)) = self.lines.next() else {
                return Err(self.error("unexpected end of norms file".into()));
            };
            self.line = i + 1;
            self.current = line.split_whitespace();
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::Parse { line: self.line, msg }
    }

    fn vector(&mut self, width: usize) -> Result<Vec<f32>> {
        let tag = self.next()?;
        if tag != "vec" {
            return Err(self.error(format!("expected \"vec\", found {:?}", tag)));
        }
        let len_tok = self.next()?;
        let len: usize = len_tok
            .parse()
            .map_err(|_| self.error(format!("bad vector length {:?}", len_tok)))?;
        if len < width {
            return Err(self.error(format!("vector of {} values, need {}", len, width)));
        }
        if len > width {
            warn!("using {} of {} norm values", width, len);
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..len {
            let tok = self.next()?;
            let v: f32 = tok
                .parse()
                .map_err(|_| self.error(format!("bad value {:?}", tok)))?;
            if i < width {
                values.push(v);
            }
        }
        Ok(values)
    }
}

/// Normalizes every frame with constant per-column vectors.
pub struct Norm<S> {
    upstream: S,
    norms: NormVectors,
}

impl<S: FeatureSource> Norm<S> {
    pub fn new(upstream: S, norms: NormVectors) -> Result<Self> {
        norms.check_width(upstream.num_ftrs())?;
        info!("normalizing {} features", norms.width());
        trace!("bias {:?} scale {:?}", norms.bias, norms.scale);
        Ok(Self { upstream, norms })
    }

    pub fn norms(&self) -> &NormVectors {
        &self.norms
    }

    pub fn into_inner(self) -> S {
        self.upstream
    }
}

impl<S: FeatureSource> Positionable for Norm<S> {
    delegate_positionable!(upstream);
}

impl<S: FeatureSource> FeatureSource for Norm<S> {
    fn num_ftrs(&self) -> usize {
        self.norms.width()
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        match out {
            None => self.upstream.read_ftrs(count, None),
            Some(o) => {
                let got = self.upstream.read_ftrs(count, Some(&mut *o))?;
                self.norms.apply(&mut o[..got * self.norms.width()]);
                Ok(got)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segstream_core::VecStream;

    #[test]
    fn test_applies_bias_then_scale() {
        let mut s = VecStream::new(2, 0);
        s.push_segment(&[1.0, 2.0, 3.0, 4.0], &[]).unwrap();
        let norms = NormVectors::from_stats(&[2.0, 3.0], &[0.5, 2.0]);
        let mut n = Norm::new(s, norms).unwrap();
        n.nextseg().unwrap();
        let mut out = [0.0; 4];
        assert_eq!(n.read_ftrs(2, Some(&mut out)).unwrap(), 2);
        assert_eq!(out, [-2.0, -0.5, 2.0, 0.5]);
    }

    #[test]
    fn test_width_must_match() {
        let s = VecStream::new(3, 0);
        assert!(matches!(
            Norm::new(s, NormVectors::identity(2)),
            Err(Error::WidthMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn test_read_norms_file() {
        let text = "vec 3\n1 2\n3\nvec 3 0.5 0.25 4\n";
        let norms = read_norms(text.as_bytes(), 2).unwrap();
        assert_eq!(norms.bias, vec![-1.0, -2.0]);
        assert_eq!(norms.scale, vec![0.5, 0.25]);
    }

    #[test]
    fn test_read_norms_errors() {
        assert!(read_norms("vec 1\n1\nvec 1\n1\n".as_bytes(), 2).is_err());
        assert!(read_norms("vec 2\n1\n".as_bytes(), 2).is_err());
        assert!(matches!(
            read_norms("vec 1\nx\nvec 1\n1\n".as_bytes(), 1),
            Err(Error::Parse { line: 2, .. })
        ));
        assert!(read_norms("mat 1\n1\n".as_bytes(), 1).is_err());
    }

    #[test]
    fn test_write_then_load() {
        let norms = NormVectors {
            bias: vec![-0.5, 1.5],
            scale: vec![2.0, 0.125],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("norms");
        write_norms(File::create(&path).unwrap(), &norms).unwrap();
        assert_eq!(load_norms(&path, 2).unwrap(), norms);
    }
}
