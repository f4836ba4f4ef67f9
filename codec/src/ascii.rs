//! Line-oriented ASCII streams.
//!
//! One frame per line: segment number, frame number, the features, then the
//! labels, separated by whitespace. Blank lines and lines starting with `#`
//! are ignored. Labels may be written as token names when a [`TokenMap`] is
//! given.
//!
//! ```text
//! # segno frameno ftr... lab...
//! 0 0 0.5 -1.25 3
//! 0 1 0.75 -1 3
//! 1 0 2 0 sil
//! ```

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};

use segstream_core::{
    Error, FeatureLabelSink, FeatureLabelSource, FeatureSink, FeatureSource, LabelSink,
    LabelSource, Position, Positionable, Result, Seek as SeekResult, SegmentSink, check_buffer,
};
use tracing::{debug, info, trace};

use crate::tokmap::TokenMap;

/// Reader for ASCII streams.
///
/// Every line's segment and frame numbers are checked against the cursor. The
/// stream has no index; `rewind` works when the handle can seek.
pub struct AsciiReader<R> {
    inner: BufReader<R>,
    n_ftrs: usize,
    n_labs: usize,
    tokmap: Option<TokenMap>,
    segno: Option<usize>,
    frameno: usize,
    line_no: usize,
    // Next data line, read but not yet consumed.
    pending: Option<String>,
    buf: String,
    exhausted: bool,
}

impl<R: Read + Seek> AsciiReader<R> {
    pub fn new(inner: R, n_ftrs: usize, n_labs: usize) -> Self {
        info!("opening ascii stream: {} features, {} labels", n_ftrs, n_labs);
        Self {
            inner: BufReader::new(inner),
            n_ftrs,
            n_labs,
            tokmap: None,
            segno: None,
            frameno: 0,
            line_no: 0,
            pending: None,
            buf: String::new(),
            exhausted: false,
        }
    }

    /// Resolves symbolic labels through `tokmap`.
    pub fn with_tokmap(mut self, tokmap: TokenMap) -> Self {
        self.tokmap = Some(tokmap);
        self
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    // Loads the next data line into `pending`; false at end of file.
    fn fill_pending(&mut self) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        loop {
            self.buf.clear();
            if self.inner.read_line(&mut self.buf)? == 0 {
                return Ok(false);
            }
            self.line_no += 1;
            let line = self.buf.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.pending = Some(line.to_string());
            return Ok(true);
        }
    }

    fn parse_err(&self, msg: String) -> Error {
        Error::Parse { line: self.line_no, msg }
    }

    // Reads frames of segment `cur`; `None` means before the first segment.
    fn scan(
        &mut self,
        cur: Option<usize>,
        count: usize,
        mut ftrs: Option<&mut [f32]>,
        mut labs: Option<&mut [u32]>,
    ) -> Result<usize> {
        let (nf, nl) = (self.n_ftrs, self.n_labs);
        let next = cur.map_or(0, |s| s + 1);
        let mut done = 0;
        while done < count && self.fill_pending()? {
            let Some(line) = self.pending.take() else {
                break;
            };
            let mut fields = line.split_whitespace();
            let segno: usize = self.field(fields.next(), "segment number")?;
            if segno == next {
                self.pending = Some(line);
                break;
            }
            if Some(segno) != cur {
                return Err(Error::SegmentMismatch {
                    expected: cur.unwrap_or(0),
                    found: segno,
                });
            }
            let frameno: usize = self.field(fields.next(), "frame number")?;
            if frameno != self.frameno {
                return Err(self.parse_err(format!(
                    "frame number {}, expected {} in segment {}",
                    frameno, self.frameno, segno
                )));
            }
            for i in 0..nf {
                let v: f32 = self.field(fields.next(), "feature")?;
                if let Some(out) = ftrs.as_deref_mut() {
                    out[done * nf + i] = v;
                }
            }
            for i in 0..nl {
                let tok = fields
                    .next()
                    .ok_or_else(|| self.parse_err("missing label".to_string()))?;
                let v = match self.tokmap.as_ref().and_then(|m| m.index(tok)) {
                    Some(v) => v,
                    None => tok
                        .parse()
                        .map_err(|_| self.parse_err(format!("bad label {:?}", tok)))?,
                };
                if let Some(out) = labs.as_deref_mut() {
                    out[done * nl + i] = v;
                }
            }
            if let Some(extra) = fields.next() {
                return Err(self.parse_err(format!("extra field {:?} at end of frame", extra)));
            }
            self.frameno += 1;
            done += 1;
        }
        Ok(done)
    }

    fn field<T: std::str::FromStr>(&self, tok: Option<&str>, what: &str) -> Result<T> {
        let tok = tok.ok_or_else(|| self.parse_err(format!("missing {}", what)))?;
        tok.parse()
            .map_err(|_| self.parse_err(format!("bad {} {:?}", what, tok)))
    }
}

impl<R: Read + Seek> Positionable for AsciiReader<R> {
    fn nextseg(&mut self) -> Result<Option<usize>> {
        if self.exhausted {
            return Ok(None);
        }
        // Stops at the first line of the next segment or at end of file.
        let skipped = self.scan(self.segno, usize::MAX, None, None)?;
        if skipped > 0 {
            trace!("skipped {} frames", skipped);
        }
        if !self.fill_pending()? {
            self.exhausted = true;
            debug!("ascii stream exhausted");
            return Ok(None);
        }
        let next = self.segno.map_or(0, |s| s + 1);
        self.segno = Some(next);
        self.frameno = 0;
        debug!("at segment {}", next);
        Ok(Some(next))
    }

    fn rewind(&mut self) -> Result<SeekResult> {
        if let Err(e) = self.inner.seek(SeekFrom::Start(0)) {
            debug!("rewind failed: {}", e);
            return Ok(SeekResult::Unsupported);
        }
        self.segno = None;
        self.frameno = 0;
        self.line_no = 0;
        self.pending = None;
        self.exhausted = false;
        debug!("rewound");
        Ok(SeekResult::Done)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        if self.exhausted {
            return Ok(None);
        }
        Ok(self.segno.map(|s| Position::new(s, self.frameno)))
    }
}

impl<R: Read + Seek> FeatureSource for AsciiReader<R> {
    fn num_ftrs(&self) -> usize {
        self.n_ftrs
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        self.read_ftrslabs(count, out, None)
    }
}

impl<R: Read + Seek> LabelSource for AsciiReader<R> {
    fn num_labs(&self) -> usize {
        self.n_labs
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        self.read_ftrslabs(count, None, out)
    }
}

impl<R: Read + Seek> FeatureLabelSource for AsciiReader<R> {
    fn read_ftrslabs(
        &mut self,
        count: usize,
        ftrs: Option<&mut [f32]>,
        labs: Option<&mut [u32]>,
    ) -> Result<usize> {
        let segno = self.segno.ok_or(Error::NotPositioned)?;
        if self.exhausted {
            return Ok(0);
        }
        if let Some(out) = ftrs.as_deref() {
            check_buffer(out.len(), count, self.n_ftrs)?;
        }
        if let Some(out) = labs.as_deref() {
            check_buffer(out.len(), count, self.n_labs)?;
        }
        self.scan(Some(segno), count, ftrs, labs)
    }
}

/// Writer for ASCII streams.
///
/// Features are printed in the shortest form that reads back to the same
/// `f32`.
pub struct AsciiWriter<W: Write> {
    inner: W,
    n_ftrs: usize,
    n_labs: usize,
    tokmap: Option<TokenMap>,
    segno: usize,
    frameno: usize,
}

impl<W: Write> AsciiWriter<W> {
    pub fn new(inner: W, n_ftrs: usize, n_labs: usize) -> Self {
        info!("creating ascii stream: {} features, {} labels", n_ftrs, n_labs);
        Self {
            inner,
            n_ftrs,
            n_labs,
            tokmap: None,
            segno: 0,
            frameno: 0,
        }
    }

    /// Writes labels as token names where `tokmap` has one.
    pub fn with_tokmap(mut self, tokmap: TokenMap) -> Self {
        self.tokmap = Some(tokmap);
        self
    }

    /// Flushes and returns the handle.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    // Missing features or labels are written as zeros.
    fn write_frames(&mut self, count: usize, ftrs: Option<&[f32]>, labs: Option<&[u32]>) -> Result<()> {
        let (nf, nl) = (self.n_ftrs, self.n_labs);
        if let Some(f) = ftrs {
            check_buffer(f.len(), count, nf)?;
        }
        if let Some(l) = labs {
            check_buffer(l.len(), count, nl)?;
        }
        for i in 0..count {
            write!(self.inner, "{} {}", self.segno, self.frameno)?;
            for j in 0..nf {
                let v = ftrs.map_or(0.0, |f| f[i * nf + j]);
                write!(self.inner, " {}", v)?;
            }
            for j in 0..nl {
                let v = labs.map_or(0, |l| l[i * nl + j]);
                match self.tokmap.as_ref().and_then(|m| m.token(v)) {
                    Some(tok) => write!(self.inner, " {}", tok)?,
                    None => write!(self.inner, " {}", v)?,
                }
            }
            writeln!(self.inner)?;
            self.frameno += 1;
        }
        Ok(())
    }
}

impl<W: Write> SegmentSink for AsciiWriter<W> {
    fn doneseg(&mut self) -> Result<()> {
        if self.frameno == 0 {
            return Err(Error::ZeroLengthSegment(self.segno));
        }
        debug!("finished segment {}", self.segno);
        self.segno += 1;
        self.frameno = 0;
        Ok(())
    }
}

impl<W: Write> FeatureSink for AsciiWriter<W> {
    fn num_ftrs(&self) -> usize {
        self.n_ftrs
    }

    fn write_ftrs(&mut self, count: usize, ftrs: &[f32]) -> Result<()> {
        self.write_frames(count, Some(ftrs), None)
    }
}

impl<W: Write> LabelSink for AsciiWriter<W> {
    fn num_labs(&self) -> usize {
        self.n_labs
    }

    fn write_labs(&mut self, count: usize, labs: &[u32]) -> Result<()> {
        self.write_frames(count, None, Some(labs))
    }
}

impl<W: Write> FeatureLabelSink for AsciiWriter<W> {
    fn write_ftrslabs(&mut self, count: usize, ftrs: &[f32], labs: &[u32]) -> Result<()> {
        self.write_frames(count, Some(ftrs), Some(labs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str, nf: usize, nl: usize) -> AsciiReader<Cursor<Vec<u8>>> {
        AsciiReader::new(Cursor::new(text.as_bytes().to_vec()), nf, nl)
    }

    #[test]
    fn test_round_trip() {
        let mut w = AsciiWriter::new(Vec::new(), 2, 1);
        w.write_ftrslabs(2, &[0.1, -2.5, 1e-7, 3.0], &[4, 5]).unwrap();
        w.doneseg().unwrap();
        w.write_ftrslabs(1, &[f32::MAX, 0.0], &[6]).unwrap();
        w.doneseg().unwrap();
        let bytes = w.finish().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("0 0 0.1 -2.5 4\n0 1 "));

        let mut r = AsciiReader::new(Cursor::new(bytes), 2, 1);
        let mut f = [0.0f32; 4];
        let mut l = [0u32; 2];
        assert_eq!(r.nextseg().unwrap(), Some(0));
        assert_eq!(r.read_ftrslabs(2, Some(&mut f), Some(&mut l)).unwrap(), 2);
        assert_eq!(f, [0.1, -2.5, 1e-7, 3.0]);
        assert_eq!(l, [4, 5]);
        assert_eq!(r.nextseg().unwrap(), Some(1));
        assert_eq!(r.read_ftrslabs(2, Some(&mut f), Some(&mut l)).unwrap(), 1);
        assert_eq!(f[0], f32::MAX);
        assert_eq!(r.nextseg().unwrap(), None);
    }

    #[test]
    fn test_comments_and_short_reads() {
        let mut r = reader("# header\n0 0 1\n\n0 1 2\n# mid\n1 0 3\n", 1, 0);
        assert_eq!(r.nextseg().unwrap(), Some(0));
        let mut f = [0.0f32; 4];
        assert_eq!(r.read_ftrs(4, Some(&mut f)).unwrap(), 2);
        assert_eq!(&f[..2], &[1.0, 2.0]);
        assert_eq!(r.get_pos().unwrap(), Some(Position::new(0, 2)));
        assert_eq!(r.nextseg().unwrap(), Some(1));
        assert_eq!(r.read_ftrs(4, Some(&mut f)).unwrap(), 1);
        assert_eq!(r.nextseg().unwrap(), None);
    }

    #[test]
    fn test_skip_unread_segment() {
        let mut r = reader("0 0 1\n0 1 2\n1 0 3\n", 1, 0);
        r.nextseg().unwrap();
        assert_eq!(r.nextseg().unwrap(), Some(1));
        let mut f = [0.0f32; 1];
        r.read_ftrs(1, Some(&mut f)).unwrap();
        assert_eq!(f[0], 3.0);
    }

    #[test]
    fn test_frame_number_mismatch() {
        let mut r = reader("0 0 1\n0 2 2\n", 1, 0);
        r.nextseg().unwrap();
        assert!(matches!(r.read_ftrs(2, None), Err(Error::Parse { line: 2, .. })));
    }

    #[test]
    fn test_segment_number_mismatch() {
        let mut r = reader("0 0 1\n5 0 2\n", 1, 0);
        r.nextseg().unwrap();
        assert!(matches!(
            r.read_ftrs(2, None),
            Err(Error::SegmentMismatch { expected: 0, found: 5 })
        ));
    }

    #[test]
    fn test_extra_and_missing_fields() {
        let mut r = reader("0 0 1 2\n", 1, 0);
        r.nextseg().unwrap();
        assert!(r.read_ftrs(1, None).is_err());
        let mut r = reader("0 0\n", 1, 0);
        r.nextseg().unwrap();
        assert!(r.read_ftrs(1, None).is_err());
    }

    #[test]
    fn test_symbolic_labels() {
        let map = TokenMap::from_tokens(["sil", "a", "b"]);
        let mut r = reader("0 0 b\n0 1 7\n", 0, 1).with_tokmap(map.clone());
        r.nextseg().unwrap();
        let mut l = [0u32; 2];
        assert_eq!(r.read_labs(2, Some(&mut l)).unwrap(), 2);
        assert_eq!(l, [2, 7]);

        let mut w = AsciiWriter::new(Vec::new(), 0, 1).with_tokmap(map);
        w.write_labs(2, &[1, 9]).unwrap();
        w.doneseg().unwrap();
        assert_eq!(w.finish().unwrap(), b"0 0 a\n0 1 9\n");
    }

    #[test]
    fn test_empty_segment_rejected() {
        let mut w = AsciiWriter::new(Vec::new(), 1, 0);
        w.write_ftrs(1, &[1.0]).unwrap();
        w.doneseg().unwrap();
        assert!(matches!(w.doneseg(), Err(Error::ZeroLengthSegment(1))));
        w.write_ftrs(1, &[2.0]).unwrap();
        w.doneseg().unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, b"0 0 1\n1 0 2\n");

        let mut r = AsciiReader::new(Cursor::new(bytes), 1, 0);
        let mut f = [0.0f32; 1];
        assert_eq!(r.nextseg().unwrap(), Some(0));
        assert_eq!(r.read_ftrs(1, Some(&mut f)).unwrap(), 1);
        assert_eq!(r.nextseg().unwrap(), Some(1));
        assert_eq!(r.read_ftrs(1, Some(&mut f)).unwrap(), 1);
        assert_eq!(f[0], 2.0);
        assert_eq!(r.nextseg().unwrap(), None);
    }

    #[test]
    fn test_rewind() {
        let mut r = reader("0 0 1\n1 0 2\n", 1, 0);
        r.nextseg().unwrap();
        r.nextseg().unwrap();
        assert_eq!(r.nextseg().unwrap(), None);
        assert_eq!(r.rewind().unwrap(), SeekResult::Done);
        assert_eq!(r.nextseg().unwrap(), Some(0));
        assert_eq!(r.set_pos(0, 0).unwrap(), SeekResult::Unsupported);
    }
}
