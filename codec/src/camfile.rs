//! Cambridge-style fixed-frame binary files: pre, LNA8 and online features.
//!
//! Every frame starts with a flag byte whose top bit marks the last frame of a
//! segment. The body differs per format:
//!
//! | Format | Body | Frame width (bytes) | Labels |
//! |---|---|---|---|
//! | [`CamFormat::Pre`] | one [`to_pre8`] byte per feature, padded | `(1 + n + 3) / 4 * 4` | low 7 flag bits |
//! | [`CamFormat::Lna8`] | one [`to_lna8`] byte per feature | `1 + n` | none |
//! | [`CamFormat::OnlFtr`] | big-endian `f32` per feature | `1 + 4n` | none |
//!
//! The files carry no header, so the feature count comes from the caller.
//! An index of segment start rows can be built by one forward scan when the
//! reader is opened.

use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ByteOrder};
use segstream_core::{
    Error, FeatureLabelSink, FeatureLabelSource, FeatureSink, FeatureSource, LabelSink,
    LabelSource, Position, Positionable, Result, Seek as SeekResult, SegmentSink, check_buffer,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::convert::{from_lna8, from_pre8, to_lna8, to_pre8};

const EOS_MASK: u8 = 0x80;
const LABEL_MASK: u8 = 0x7f;

/// The frame body encoding of a Cambridge-style file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CamFormat {
    /// Gaussian-compressed bytes with a 7-bit label in the flag.
    Pre,
    /// Log-compressed probability bytes.
    Lna8,
    /// Big-endian IEEE floats.
    OnlFtr,
}

impl CamFormat {
    /// Bytes per frame, flag included.
    pub fn frame_width(self, n_ftrs: usize) -> usize {
        match self {
            CamFormat::Pre => (1 + n_ftrs + 3) / 4 * 4,
            CamFormat::Lna8 => 1 + n_ftrs,
            CamFormat::OnlFtr => 1 + 4 * n_ftrs,
        }
    }

    /// Label columns carried by the flag byte.
    pub fn num_labs(self) -> usize {
        match self {
            CamFormat::Pre => 1,
            CamFormat::Lna8 | CamFormat::OnlFtr => 0,
        }
    }

    fn decode(self, body: &[u8], out: &mut [f32]) {
        match self {
            CamFormat::Pre => {
                for (o, &b) in out.iter_mut().zip(body) {
                    *o = from_pre8(b);
                }
            }
            CamFormat::Lna8 => {
                for (o, &b) in out.iter_mut().zip(body) {
                    *o = from_lna8(b);
                }
            }
            CamFormat::OnlFtr => BigEndian::read_f32_into(&body[..out.len() * 4], out),
        }
    }

    fn encode(self, ftrs: &[f32], body: &mut [u8]) {
        match self {
            CamFormat::Pre => {
                for (b, &v) in body.iter_mut().zip(ftrs) {
                    *b = to_pre8(v);
                }
            }
            CamFormat::Lna8 => {
                for (b, &v) in body.iter_mut().zip(ftrs) {
                    *b = to_lna8(v);
                }
            }
            CamFormat::OnlFtr => BigEndian::write_f32_into(ftrs, &mut body[..ftrs.len() * 4]),
        }
    }
}

impl std::fmt::Display for CamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CamFormat::Pre => "pre",
            CamFormat::Lna8 => "lna8",
            CamFormat::OnlFtr => "onlftr",
        };
        f.write_str(name)
    }
}

// Row numbers of segment starts; `rows[s + 1] - rows[s]` frames in segment s.
#[derive(Debug)]
struct RowIndex {
    rows: Vec<usize>,
    total: usize,
}

impl RowIndex {
    fn num_segs(&self) -> usize {
        self.rows.len() - 1
    }
}

/// Reader for [`CamFormat`] files.
pub struct CamFileReader<R> {
    inner: BufReader<R>,
    format: CamFormat,
    n_ftrs: usize,
    width: usize,
    frame: Vec<u8>,
    segno: Option<usize>,
    frameno: usize,
    eos: bool,
    index: Option<RowIndex>,
}

impl<R: Read + Seek> CamFileReader<R> {
    /// Opens a stream of `n_ftrs`-wide frames.
    ///
    /// With `indexed`, the whole file is scanned once to find segment
    /// boundaries, which enables counts and positioning; the handle must then
    /// be seekable.
    pub fn new(inner: R, format: CamFormat, n_ftrs: usize, indexed: bool) -> Result<Self> {
        let width = format.frame_width(n_ftrs);
        let mut reader = Self {
            inner: BufReader::new(inner),
            format,
            n_ftrs,
            width,
            frame: vec![0; width],
            segno: None,
            frameno: 0,
            eos: true,
            index: None,
        };
        info!("opening {} stream: {} features, {} bytes per frame", format, n_ftrs, width);
        if indexed {
            let index = reader.build_index()?;
            reader.inner.seek(SeekFrom::Start(0))?;
            info!(
                "indexed {} stream: {} segments, {} frames",
                format,
                index.num_segs(),
                index.total
            );
            reader.index = Some(index);
        }
        Ok(reader)
    }

    /// Opens a pre file.
    pub fn pre(inner: R, n_ftrs: usize, indexed: bool) -> Result<Self> {
        Self::new(inner, CamFormat::Pre, n_ftrs, indexed)
    }

    /// Opens an LNA8 file.
    pub fn lna8(inner: R, n_ftrs: usize, indexed: bool) -> Result<Self> {
        Self::new(inner, CamFormat::Lna8, n_ftrs, indexed)
    }

    /// Opens an online feature file.
    pub fn onlftr(inner: R, n_ftrs: usize, indexed: bool) -> Result<Self> {
        Self::new(inner, CamFormat::OnlFtr, n_ftrs, indexed)
    }

    pub fn format(&self) -> CamFormat {
        self.format
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    fn build_index(&mut self) -> Result<RowIndex> {
        let mut rows = vec![0];
        let mut row = 0;
        let mut in_seg = 0;
        while self.fetch_frame()? {
            row += 1;
            if self.frame[0] & EOS_MASK != 0 {
                rows.push(row);
                in_seg = 0;
            } else {
                in_seg += 1;
            }
        }
        if in_seg != 0 {
            warn!("{} stream ended in the middle of a segment while indexing", self.format);
        }
        Ok(RowIndex { rows, total: row })
    }

    // Reads one raw frame; false at a clean end of file.
    fn fetch_frame(&mut self) -> Result<bool> {
        let mut got = 0;
        while got < self.width {
            match self.inner.read(&mut self.frame[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match got {
            0 => Ok(false),
            n if n == self.width => Ok(true),
            _ => Err(Error::Truncated("frame")),
        }
    }

    fn next_frame(&mut self) -> Result<bool> {
        if self.fetch_frame()? {
            self.eos = self.frame[0] & EOS_MASK != 0;
            self.frameno += 1;
            Ok(true)
        } else {
            if !self.eos {
                warn!("{} stream ended in the middle of a segment", self.format);
                self.eos = true;
            }
            Ok(false)
        }
    }
}

impl<R: Read + Seek> Positionable for CamFileReader<R> {
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(self.index.as_ref().map(RowIndex::num_segs))
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        let Some(index) = &self.index else {
            return Ok(None);
        };
        match segno {
            None => Ok(Some(index.total)),
            Some(s) if s < index.num_segs() => Ok(Some(index.rows[s + 1] - index.rows[s])),
            Some(s) => Err(Error::SeekOutOfRange { segno: s, frameno: 0 }),
        }
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let mut skipped = 0;
        while !self.eos {
            if !self.next_frame()? {
                break;
            }
            skipped += 1;
        }
        if skipped > 0 {
            trace!("skipped {} frames to end of segment", skipped);
        }
        if self.inner.fill_buf()?.is_empty() {
            debug!("{} stream exhausted", self.format);
            return Ok(None);
        }
        let next = self.segno.map_or(0, |s| s + 1);
        self.segno = Some(next);
        self.frameno = 0;
        self.eos = false;
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
        self.eos = true;
        debug!("rewound");
        Ok(SeekResult::Done)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        if self.index.is_none() {
            return Ok(None);
        }
        Ok(self.segno.map(|s| Position::new(s, self.frameno)))
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<SeekResult> {
        let Some(index) = &self.index else {
            return Ok(SeekResult::Unsupported);
        };
        if segno >= index.num_segs() {
            return Err(Error::SeekOutOfRange { segno, frameno });
        }
        let row = index.rows[segno] + frameno;
        let next_seg_row = index.rows[segno + 1];
        if row > next_seg_row {
            return Err(Error::SeekOutOfRange { segno, frameno });
        }
        self.inner.seek(SeekFrom::Start((self.width * row) as u64))?;
        self.segno = Some(segno);
        self.frameno = frameno;
        self.eos = row == next_seg_row;
        debug!("seek to segment {}, frame {}", segno, frameno);
        Ok(SeekResult::Done)
    }
}

impl<R: Read + Seek> FeatureSource for CamFileReader<R> {
    fn num_ftrs(&self) -> usize {
        self.n_ftrs
    }

    fn read_ftrs(&mut self, count: usize, out: Option<&mut [f32]>) -> Result<usize> {
        self.read_ftrslabs(count, out, None)
    }
}

impl<R: Read + Seek> LabelSource for CamFileReader<R> {
    fn num_labs(&self) -> usize {
        self.format.num_labs()
    }

    fn read_labs(&mut self, count: usize, out: Option<&mut [u32]>) -> Result<usize> {
        self.read_ftrslabs(count, None, out)
    }
}

impl<R: Read + Seek> FeatureLabelSource for CamFileReader<R> {
    fn read_ftrslabs(
        &mut self,
        count: usize,
        mut ftrs: Option<&mut [f32]>,
        mut labs: Option<&mut [u32]>,
    ) -> Result<usize> {
        let segno = self.segno.ok_or(Error::NotPositioned)?;
        let (nf, nl) = (self.n_ftrs, self.format.num_labs());
        if let Some(out) = ftrs.as_deref() {
            check_buffer(out.len(), count, nf)?;
        }
        if let Some(out) = labs.as_deref() {
            check_buffer(out.len(), count, nl)?;
        }
        let first = self.frameno;
        let mut done = 0;
        while done < count && !self.eos {
            if !self.next_frame()? {
                break;
            }
            if let Some(out) = ftrs.as_deref_mut() {
                let row = &mut out[done * nf..(done + 1) * nf];
                self.format.decode(&self.frame[1..], row);
            }
            if nl > 0 {
                if let Some(out) = labs.as_deref_mut() {
                    out[done] = (self.frame[0] & LABEL_MASK) as u32;
                }
            }
            done += 1;
        }
        trace!(
            "read {} of {} frames from segment {} at frame {}",
            done, count, segno, first
        );
        Ok(done)
    }
}

/// Writer for [`CamFormat`] files.
///
/// The last frame written is held back until the next write or
/// [`doneseg`](SegmentSink::doneseg), so its end-of-segment flag can be set.
pub struct CamFileWriter<W: Write> {
    inner: W,
    format: CamFormat,
    n_ftrs: usize,
    frame: Vec<u8>,
    pending: bool,
    online: bool,
    segno: usize,
}

impl<W: Write> CamFileWriter<W> {
    /// Creates a writer of `n_ftrs`-wide frames.
    pub fn new(inner: W, format: CamFormat, n_ftrs: usize) -> Self {
        let width = format.frame_width(n_ftrs);
        info!("creating {} stream: {} features", format, n_ftrs);
        Self {
            inner,
            format,
            n_ftrs,
            frame: vec![0; width],
            pending: false,
            online: false,
            segno: 0,
        }
    }

    pub fn pre(inner: W, n_ftrs: usize) -> Self {
        Self::new(inner, CamFormat::Pre, n_ftrs)
    }

    pub fn lna8(inner: W, n_ftrs: usize) -> Self {
        Self::new(inner, CamFormat::Lna8, n_ftrs)
    }

    pub fn onlftr(inner: W, n_ftrs: usize) -> Self {
        Self::new(inner, CamFormat::OnlFtr, n_ftrs)
    }

    /// Flushes the handle after every write and segment, for consumers
    /// reading the output as it is produced.
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    /// Checks that the last segment was finished and returns the handle.
    pub fn finish(mut self) -> Result<W> {
        if self.pending {
            return Err(Error::UnfinishedSegment(self.segno));
        }
        self.inner.flush()?;
        info!("finished {} stream: {} segments", self.format, self.segno);
        Ok(self.inner)
    }

    fn emit_pending(&mut self) -> Result<()> {
        if self.pending {
            self.frame[0] &= !EOS_MASK;
            self.inner.write_all(&self.frame)?;
            self.pending = false;
        }
        Ok(())
    }

    fn write_frames(&mut self, count: usize, ftrs: Option<&[f32]>, labs: Option<&[u32]>) -> Result<()> {
        let nf = self.n_ftrs;
        if let Some(f) = ftrs {
            check_buffer(f.len(), count, nf)?;
        }
        if let Some(l) = labs {
            check_buffer(l.len(), count, 1)?;
        }
        // Label-only writes carry zero features.
        let zeros = if ftrs.is_none() { vec![0.0; nf] } else { Vec::new() };
        for i in 0..count {
            self.emit_pending()?;
            let lab = labs.map_or(0, |l| l[i]);
            if lab > LABEL_MASK as u32 {
                return Err(Error::LabelOutOfRange { label: lab, size: LABEL_MASK as usize + 1 });
            }
            self.frame[0] = lab as u8;
            let row = ftrs.map_or(&zeros[..], |f| &f[i * nf..(i + 1) * nf]);
            self.format.encode(row, &mut self.frame[1..]);
            self.pending = true;
        }
        if self.online && count > 0 {
            self.inner.flush()?;
        }
        Ok(())
    }
}

impl<W: Write> SegmentSink for CamFileWriter<W> {
    fn doneseg(&mut self) -> Result<()> {
        if !self.pending {
            return Err(Error::ZeroLengthSegment(self.segno));
        }
        self.frame[0] |= EOS_MASK;
        self.inner.write_all(&self.frame)?;
        self.pending = false;
        if self.online {
            self.inner.flush()?;
        }
        debug!("finished segment {}", self.segno);
        self.segno += 1;
        Ok(())
    }
}

impl<W: Write> FeatureSink for CamFileWriter<W> {
    fn num_ftrs(&self) -> usize {
        self.n_ftrs
    }

    fn write_ftrs(&mut self, count: usize, ftrs: &[f32]) -> Result<()> {
        self.write_frames(count, Some(ftrs), None)
    }
}

impl<W: Write> LabelSink for CamFileWriter<W> {
    fn num_labs(&self) -> usize {
        self.format.num_labs()
    }

    fn write_labs(&mut self, count: usize, labs: &[u32]) -> Result<()> {
        let labs = (self.format.num_labs() > 0).then_some(labs);
        self.write_frames(count, None, labs)
    }
}

impl<W: Write> FeatureLabelSink for CamFileWriter<W> {
    fn write_ftrslabs(&mut self, count: usize, ftrs: &[f32], labs: &[u32]) -> Result<()> {
        let labs = (self.format.num_labs() > 0).then_some(labs);
        self.write_frames(count, Some(ftrs), labs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use segstream_core::Unseekable;

    fn write_pre(segs: &[(&[f32], &[u32])], n_ftrs: usize) -> Vec<u8> {
        let mut w = CamFileWriter::pre(Vec::new(), n_ftrs);
        for (ftrs, labs) in segs {
            w.write_ftrslabs(labs.len(), ftrs, labs).unwrap();
            w.doneseg().unwrap();
        }
        w.finish().unwrap()
    }

    #[test]
    fn test_frame_widths() {
        assert_eq!(CamFormat::Pre.frame_width(3), 4);
        assert_eq!(CamFormat::Pre.frame_width(4), 8);
        assert_eq!(CamFormat::Lna8.frame_width(4), 5);
        assert_eq!(CamFormat::OnlFtr.frame_width(2), 9);
    }

    #[test]
    fn test_pre_round_trip_with_labels() {
        let seg0 = [0.0f32, 1.0, -1.0, 0.5];
        let seg1 = [2.0f32, -2.0];
        let bytes = write_pre(&[(&seg0, &[3, 4]), (&seg1, &[127])], 2);
        // Two 4-byte frames, then one.
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes[4], 4 | EOS_MASK);

        let mut r = CamFileReader::pre(Cursor::new(bytes), 2, false).unwrap();
        assert_eq!(r.nextseg().unwrap(), Some(0));
        let mut f = [0.0f32; 6];
        let mut l = [0u32; 3];
        assert_eq!(r.read_ftrslabs(3, Some(&mut f), Some(&mut l)).unwrap(), 2);
        assert_eq!(&l[..2], &[3, 4]);
        for (got, want) in f[..4].iter().zip(&seg0) {
            assert!((got - want).abs() < 0.05, "{} vs {}", got, want);
        }
        assert_eq!(r.nextseg().unwrap(), Some(1));
        assert_eq!(r.read_labs(3, Some(&mut l)).unwrap(), 1);
        assert_eq!(l[0], 127);
        assert_eq!(r.nextseg().unwrap(), None);
    }

    #[test]
    fn test_onlftr_exact_round_trip() {
        let mut w = CamFileWriter::onlftr(Vec::new(), 3);
        w.write_ftrs(1, &[1.5, -2.25, 1e-7]).unwrap();
        w.write_ftrs(1, &[0.0, 3.0, 4.0]).unwrap();
        w.doneseg().unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes.len(), 26);
        assert_eq!(bytes[13], EOS_MASK);

        let mut r = CamFileReader::onlftr(Cursor::new(bytes), 3, true).unwrap();
        assert_eq!(r.num_labs(), 0);
        assert_eq!(r.num_frames(None).unwrap(), Some(2));
        r.nextseg().unwrap();
        let mut f = [0.0f32; 6];
        assert_eq!(r.read_ftrs(2, Some(&mut f)).unwrap(), 2);
        assert_eq!(f, [1.5, -2.25, 1e-7, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_lna8_online_writer() {
        let mut w = CamFileWriter::lna8(Vec::new(), 2).online(true);
        w.write_ftrs(2, &[1.0, 0.5, 0.25, 0.125]).unwrap();
        w.doneseg().unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(bytes, vec![0, 0, 16, EOS_MASK, 33, 49]);

        let mut r = CamFileReader::lna8(Cursor::new(bytes), 2, false).unwrap();
        r.nextseg().unwrap();
        let mut f = [0.0f32; 8];
        assert_eq!(r.read_ftrs(4, Some(&mut f)).unwrap(), 2);
        assert!((f[1] - 0.5).abs() < 0.03);
    }

    #[test]
    fn test_indexed_counts_and_seek() {
        let bytes = write_pre(
            &[(&[0.0; 6], &[1, 2, 3]), (&[0.0; 4], &[4, 5]), (&[0.0; 2], &[6])],
            2,
        );
        let mut r = CamFileReader::pre(Cursor::new(bytes), 2, true).unwrap();
        assert_eq!(r.num_segs().unwrap(), Some(3));
        let per_seg: usize = (0..3).map(|s| r.num_frames(Some(s)).unwrap().unwrap()).sum();
        assert_eq!(Some(per_seg), r.num_frames(None).unwrap());

        assert_eq!(r.set_pos(1, 1).unwrap(), SeekResult::Done);
        assert_eq!(r.get_pos().unwrap(), Some(Position::new(1, 1)));
        let mut l = [0u32; 2];
        assert_eq!(r.read_labs(2, Some(&mut l)).unwrap(), 1);
        assert_eq!(l[0], 5);
        assert_eq!(r.nextseg().unwrap(), Some(2));

        // Seeking to the very end of a segment is allowed.
        assert_eq!(r.set_pos(0, 3).unwrap(), SeekResult::Done);
        assert_eq!(r.read_labs(1, Some(&mut l)).unwrap(), 0);
        assert_eq!(r.nextseg().unwrap(), Some(1));

        assert!(r.set_pos(0, 4).is_err());
        assert!(r.set_pos(3, 0).is_err());
    }

    #[test]
    fn test_rewind_reaches_first_segment_again() {
        let bytes = write_pre(&[(&[0.0; 2], &[9]), (&[0.0; 2], &[8])], 2);
        let mut r = CamFileReader::pre(Cursor::new(bytes), 2, false).unwrap();
        r.nextseg().unwrap();
        r.nextseg().unwrap();
        assert_eq!(r.rewind().unwrap(), SeekResult::Done);
        assert_eq!(r.nextseg().unwrap(), Some(0));
        let mut l = [0u32; 1];
        r.read_labs(1, Some(&mut l)).unwrap();
        assert_eq!(l[0], 9);
    }

    #[test]
    fn test_unindexed_pipe() {
        let bytes = write_pre(&[(&[0.0; 2], &[1])], 2);
        let mut r = CamFileReader::pre(Unseekable::new(Cursor::new(bytes)), 2, false).unwrap();
        assert_eq!(r.num_segs().unwrap(), None);
        assert_eq!(r.num_frames(None).unwrap(), None);
        assert_eq!(r.set_pos(0, 0).unwrap(), SeekResult::Unsupported);
        assert_eq!(r.nextseg().unwrap(), Some(0));
        assert_eq!(r.get_pos().unwrap(), None);
        assert_eq!(r.rewind().unwrap(), SeekResult::Unsupported);
    }

    #[test]
    fn test_file_ending_mid_segment_is_tolerated() {
        // Two frames, neither flagged as end of segment.
        let bytes = vec![1, 0, 0, 0, 2, 0, 0, 0];
        let mut r = CamFileReader::pre(Cursor::new(bytes), 2, true).unwrap();
        assert_eq!(r.num_segs().unwrap(), Some(0));
        assert_eq!(r.nextseg().unwrap(), Some(0));
        assert_eq!(r.read_labs(5, None).unwrap(), 2);
        assert_eq!(r.nextseg().unwrap(), None);
    }

    #[test]
    fn test_truncated_frame() {
        let bytes = vec![0x80, 0, 0];
        let mut r = CamFileReader::pre(Cursor::new(bytes), 2, false).unwrap();
        r.nextseg().unwrap();
        assert!(matches!(r.read_ftrs(1, None), Err(Error::Truncated(_))));
    }

    #[test]
    fn test_writer_errors() {
        let mut w = CamFileWriter::pre(Vec::new(), 1);
        assert!(matches!(w.doneseg(), Err(Error::ZeroLengthSegment(0))));
        assert!(matches!(
            w.write_ftrslabs(1, &[0.0], &[128]),
            Err(Error::LabelOutOfRange { label: 128, .. })
        ));
        w.write_ftrs(1, &[0.0]).unwrap();
        assert!(matches!(w.finish(), Err(Error::UnfinishedSegment(0))));
    }

    #[test]
    fn test_read_before_nextseg() {
        let bytes = write_pre(&[(&[0.0; 2], &[1])], 2);
        let mut r = CamFileReader::pre(Cursor::new(bytes), 2, false).unwrap();
        assert!(matches!(r.read_ftrs(1, None), Err(Error::NotPositioned)));
    }
}
