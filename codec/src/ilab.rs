//! ILab run-length label files.
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! header   "ILAB" version dataOffset indexOffset bitsPerLabel numSegments numFrames
//! segment  u32 segno, blocks..., end block
//! block    count (1, 2 or 4 bytes), label (bitsPerLabel / 8 bytes)
//! end      a single zero count byte, no label
//! index    u32 offsets[numSegments], u32 frames[numSegments]   (optional)
//! ```
//!
//! The first count byte selects the count width: `0xxxxxxx` is a 7-bit count,
//! `10xxxxxx` starts a 14-bit count and `11xxxxxx` a 30-bit count, remaining
//! bytes most significant first.

use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use segstream_core::{
    Error, LabelSink, LabelSource, Position, Positionable, Result, Seek as SeekResult,
    SegmentSink, check_buffer,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// File magic.
pub const ILAB_MAGIC: [u8; 4] = *b"ILAB";
/// The only known format version.
pub const ILAB_VERSION: i32 = 19990304;
const HEADER_LEN: u64 = 28;

/// Options for opening or creating ILab files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IlabConfig {
    /// Load or build the segment index on open, or write one on close.
    pub indexed: bool,
    /// Largest label the writer must represent.
    pub max_label: u32,
}

impl Default for IlabConfig {
    fn default() -> Self {
        Self {
            indexed: true,
            max_label: 255,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    data_offset: u32,
    index_offset: u32,
    bytes_per_label: usize,
    num_segs: usize,
    num_frames: usize,
}

impl Header {
    fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_or_truncated(r.read_exact(&mut magic), "header")?;
        if magic != ILAB_MAGIC {
            return Err(Error::BadMagic { expected: ILAB_MAGIC, got: magic });
        }
        let mut words = [0i32; 6];
        read_or_truncated(r.read_i32_into::<BigEndian>(&mut words), "header")?;
        let [version, data_offset, index_offset, bits, num_segs, num_frames] = words;
        if version != ILAB_VERSION {
            return Err(Error::BadVersion { expected: ILAB_VERSION, got: version });
        }
        if bits <= 0 || bits % 8 != 0 || bits > 32 || data_offset < HEADER_LEN as i32 {
            return Err(Error::corrupt(format!(
                "bad ilab header: {} bits per label, data at {}",
                bits, data_offset
            )));
        }
        if num_segs < 0 || num_frames < 0 || index_offset < 0 {
            return Err(Error::corrupt("negative count in ilab header"));
        }
        Ok(Self {
            data_offset: data_offset as u32,
            index_offset: index_offset as u32,
            bytes_per_label: bits as usize / 8,
            num_segs: num_segs as usize,
            num_frames: num_frames as usize,
        })
    }

    fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&ILAB_MAGIC)?;
        for v in [
            ILAB_VERSION,
            self.data_offset as i32,
            self.index_offset as i32,
            (self.bytes_per_label * 8) as i32,
            self.num_segs as i32,
            self.num_frames as i32,
        ] {
            w.write_i32::<BigEndian>(v)?;
        }
        Ok(())
    }
}

fn read_or_truncated(res: std::io::Result<()>, what: &'static str) -> Result<()> {
    match res {
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Truncated(what)),
        other => Ok(other?),
    }
}

/// Reads one block, returning `(count, label)`; a zero count ends a segment.
fn read_block<R: Read>(r: &mut R, bytes_per_label: usize) -> Result<(usize, u32)> {
    let c = r.read_u8().map_err(truncated("block"))?;
    let mut count = c as usize;
    if c >= 0x80 {
        let extra = if c < 0xC0 { 1 } else { 3 };
        count = (c & 0x3F) as usize;
        for _ in 0..extra {
            count = (count << 8) | r.read_u8().map_err(truncated("block"))? as usize;
        }
    }
    let mut label = 0u32;
    if count > 0 {
        for _ in 0..bytes_per_label {
            label = (label << 8) | r.read_u8().map_err(truncated("label"))? as u32;
        }
    }
    Ok((count, label))
}

fn truncated(what: &'static str) -> impl Fn(std::io::Error) -> Error {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            Error::Truncated(what)
        } else {
            Error::Io(e)
        }
    }
}

/// Writes one block and returns its length in bytes.
fn write_block<W: Write>(w: &mut W, count: usize, label: u32, bytes_per_label: usize) -> Result<u64> {
    let mut len = match count {
        0..128 => {
            w.write_u8(count as u8)?;
            1
        }
        128..16384 => {
            w.write_u16::<BigEndian>(0x8000 | count as u16)?;
            2
        }
        _ if count < 1 << 30 => {
            w.write_u32::<BigEndian>(0xC000_0000 | count as u32)?;
            4
        }
        _ => return Err(Error::InvalidConfig(format!("label run of {} frames is too long", count))),
    };
    if count > 0 {
        let bytes = label.to_be_bytes();
        w.write_all(&bytes[4 - bytes_per_label..])?;
        len += bytes_per_label as u64;
    }
    Ok(len)
}

// Position within the current segment.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    segno: usize,
    frameno: usize,
    // Frame just past the current block.
    block_end: usize,
    label: u32,
    at_eos: bool,
}

#[derive(Debug)]
enum State {
    BeforeFirst,
    InSegment(Cursor),
    AtEnd,
}

#[derive(Debug)]
struct SegIndex {
    offsets: Vec<u64>,
    lens: Vec<usize>,
}

/// Reader for ILab files.
///
/// Needs a seekable handle: the header must be read before the data.
pub struct IlabReader<R> {
    inner: BufReader<R>,
    header: Header,
    index: Option<SegIndex>,
    state: State,
}

impl<R: Read + Seek> IlabReader<R> {
    /// Opens an ILab stream, loading the segment index if `indexed`.
    ///
    /// The index comes from the index section when the header points to
    /// one, else from a scan of the whole data section. Either way it is
    /// checked against the header counts.
    pub fn new(inner: R, indexed: bool) -> Result<Self> {
        let mut inner = BufReader::new(inner);
        inner.seek(SeekFrom::Start(0))?;
        let header = Header::read(&mut inner)?;
        info!(
            "opening ilab stream: {} segments, {} frames, {} bytes per label",
            header.num_segs, header.num_frames, header.bytes_per_label
        );
        let mut reader = Self {
            inner,
            header,
            index: None,
            state: State::BeforeFirst,
        };
        if indexed {
            let index = if header.index_offset != 0 {
                reader.load_index()?
            } else {
                reader.scan_index()?
            };
            let sum: usize = index.lens.iter().sum();
            if sum != header.num_frames {
                return Err(Error::IndexMismatch(format!(
                    "segment lengths sum to {} but header declares {} frames",
                    sum, header.num_frames
                )));
            }
            reader.index = Some(index);
        }
        reader.inner.seek(SeekFrom::Start(header.data_offset as u64))?;
        Ok(reader)
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    /// Bytes used by each label on disk.
    pub fn bytes_per_label(&self) -> usize {
        self.header.bytes_per_label
    }

    fn load_index(&mut self) -> Result<SegIndex> {
        let n = self.header.num_segs;
        self.inner.seek(SeekFrom::Start(self.header.index_offset as u64))?;
        let mut offsets = vec![0u32; n];
        let mut lens = vec![0u32; n];
        read_or_truncated(self.inner.read_u32_into::<BigEndian>(&mut offsets), "index")?;
        read_or_truncated(self.inner.read_u32_into::<BigEndian>(&mut lens), "index")?;
        debug!("loaded ilab index for {} segments", n);
        Ok(SegIndex {
            offsets: offsets.into_iter().map(u64::from).collect(),
            lens: lens.into_iter().map(|l| l as usize).collect(),
        })
    }

    fn scan_index(&mut self) -> Result<SegIndex> {
        let n = self.header.num_segs;
        let bpl = self.header.bytes_per_label;
        self.inner.seek(SeekFrom::Start(self.header.data_offset as u64))?;
        let mut offsets = Vec::with_capacity(n);
        let mut lens = Vec::with_capacity(n);
        for segno in 0..n {
            offsets.push(self.inner.stream_position()?);
            self.read_segno(segno)?;
            let mut frames = 0;
            loop {
                let (count, _) = read_block(&mut self.inner, bpl)?;
                if count == 0 {
                    break;
                }
                frames += count;
            }
            lens.push(frames);
        }
        debug!("indexed {} ilab segments by scanning", n);
        Ok(SegIndex { offsets, lens })
    }

    fn read_segno(&mut self, expected: usize) -> Result<()> {
        let found = self.inner.read_u32::<BigEndian>().map_err(truncated("segment header"))?;
        if found as usize != expected {
            return Err(Error::SegmentMismatch { expected, found: found as usize });
        }
        Ok(())
    }

    fn next_block(&mut self, cur: &mut Cursor) -> Result<()> {
        let (count, label) = read_block(&mut self.inner, self.header.bytes_per_label)?;
        if count == 0 {
            cur.at_eos = true;
        } else {
            cur.block_end += count;
            cur.label = label;
        }
        Ok(())
    }

    // Consumes what is left of the segment and returns its length.
    fn skip_rest(&mut self, mut cur: Cursor) -> Result<usize> {
        while !cur.at_eos {
            self.next_block(&mut cur)?;
        }
        let skipped = cur.block_end - cur.frameno;
        if skipped > 0 {
            trace!("skipped {} frames in segment {}", skipped, cur.segno);
        }
        Ok(cur.block_end)
    }
}

impl<R: Read + Seek> Positionable for IlabReader<R> {
    fn num_segs(&self) -> Result<Option<usize>> {
        Ok(Some(self.header.num_segs))
    }

    fn num_frames(&self, segno: Option<usize>) -> Result<Option<usize>> {
        match segno {
            None => Ok(Some(self.header.num_frames)),
            Some(s) if s >= self.header.num_segs => Err(Error::SeekOutOfRange { segno: s, frameno: 0 }),
            Some(s) => Ok(self.index.as_ref().map(|i| i.lens[s])),
        }
    }

    fn nextseg(&mut self) -> Result<Option<usize>> {
        let next = match self.state {
            State::BeforeFirst => 0,
            State::AtEnd => return Ok(None),
            State::InSegment(cur) => {
                let len = self.skip_rest(cur)?;
                if let Some(index) = &self.index {
                    if len != index.lens[cur.segno] {
                        return Err(Error::IndexMismatch(format!(
                            "segment {} has {} frames but the index says {}",
                            cur.segno, len, index.lens[cur.segno]
                        )));
                    }
                }
                cur.segno + 1
            }
        };
        if next >= self.header.num_segs {
            self.state = State::AtEnd;
            debug!("ilab stream exhausted");
            return Ok(None);
        }
        self.read_segno(next)?;
        self.state = State::InSegment(Cursor {
            segno: next,
            frameno: 0,
            block_end: 0,
            label: 0,
            at_eos: false,
        });
        debug!("at segment {}", next);
        Ok(Some(next))
    }

    fn rewind(&mut self) -> Result<SeekResult> {
        if let Err(e) = self.inner.seek(SeekFrom::Start(self.header.data_offset as u64)) {
            debug!("rewind failed: {}", e);
            return Ok(SeekResult::Unsupported);
        }
        self.state = State::BeforeFirst;
        debug!("rewound");
        Ok(SeekResult::Done)
    }

    fn get_pos(&self) -> Result<Option<Position>> {
        match self.state {
            State::InSegment(cur) => Ok(Some(Position::new(cur.segno, cur.frameno))),
            State::BeforeFirst | State::AtEnd => Ok(None),
        }
    }

    fn set_pos(&mut self, segno: usize, frameno: usize) -> Result<SeekResult> {
        let Some(index) = &self.index else {
            return Ok(SeekResult::Unsupported);
        };
        if segno >= self.header.num_segs || frameno > index.lens[segno] {
            return Err(Error::SeekOutOfRange { segno, frameno });
        }
        let offset = index.offsets[segno];
        self.inner.seek(SeekFrom::Start(offset))?;
        self.read_segno(segno)?;
        let mut cur = Cursor {
            segno,
            frameno: 0,
            block_end: 0,
            label: 0,
            at_eos: false,
        };
        while cur.block_end <= frameno {
            self.next_block(&mut cur)?;
            if cur.at_eos {
                // Landing exactly on the end of the segment is allowed.
                if cur.block_end == frameno {
                    break;
                }
                return Err(Error::IndexMismatch(format!(
                    "segment {} ends at frame {} before seek target {}",
                    segno, cur.block_end, frameno
                )));
            }
        }
        cur.frameno = frameno;
        self.state = State::InSegment(cur);
        debug!("seek to segment {}, frame {}", segno, frameno);
        Ok(SeekResult::Done)
    }
}

impl<R: Read + Seek> LabelSource for IlabReader<R> {
    fn num_labs(&self) -> usize {
        1
    }

    fn read_labs(&mut self, count: usize, mut out: Option<&mut [u32]>) -> Result<usize> {
        let mut cur = match self.state {
            State::InSegment(cur) => cur,
            State::AtEnd => return Ok(0),
            State::BeforeFirst => return Err(Error::NotPositioned),
        };
        if let Some(o) = out.as_deref() {
            check_buffer(o.len(), count, 1)?;
        }
        let first = cur.frameno;
        let mut done = 0;
        while done < count {
            if cur.frameno == cur.block_end {
                if cur.at_eos {
                    break;
                }
                self.next_block(&mut cur)?;
                continue;
            }
            let n = (cur.block_end - cur.frameno).min(count - done);
            if let Some(o) = out.as_deref_mut() {
                o[done..done + n].fill(cur.label);
            }
            cur.frameno += n;
            done += n;
        }
        self.state = State::InSegment(cur);
        trace!("read segment {}, first frame {}, {} frames", cur.segno, first, done);
        Ok(done)
    }
}

/// Writer for ILab files.
///
/// The handle must be seekable: the header is rewritten with the final
/// counts when the writer is finished.
pub struct IlabWriter<W: Write + Seek> {
    inner: W,
    header: Header,
    indexed: bool,
    offsets: Vec<u64>,
    lens: Vec<usize>,
    // Byte offset of the next write.
    pos: u64,
    frameno: usize,
    // Run waiting to be written: (label, count).
    run: Option<(u32, usize)>,
}

impl<W: Write + Seek> IlabWriter<W> {
    /// Creates a writer whose labels go up to `max_label`.
    pub fn new(mut inner: W, max_label: u32, indexed: bool) -> Result<Self> {
        let mut bytes_per_label = 1;
        while bytes_per_label < 4 && (max_label as u64) >= 1u64 << (8 * bytes_per_label) {
            bytes_per_label += 1;
        }
        let header = Header {
            data_offset: HEADER_LEN as u32,
            index_offset: 0,
            bytes_per_label,
            num_segs: 0,
            num_frames: 0,
        };
        inner.seek(SeekFrom::Start(0))?;
        header.write(&mut inner)?;
        info!("creating ilab stream: {} bytes per label", bytes_per_label);
        Ok(Self {
            inner,
            header,
            indexed,
            offsets: Vec::new(),
            lens: Vec::new(),
            pos: HEADER_LEN,
            frameno: 0,
            run: None,
        })
    }

    /// Creates a writer from an [`IlabConfig`].
    pub fn with_config(inner: W, config: &IlabConfig) -> Result<Self> {
        Self::new(inner, config.max_label, config.indexed)
    }

    pub fn bytes_per_label(&self) -> usize {
        self.header.bytes_per_label
    }

    /// Writes the index and the final header and returns the handle.
    pub fn finish(mut self) -> Result<W> {
        if self.frameno != 0 {
            return Err(Error::UnfinishedSegment(self.header.num_segs));
        }
        if self.indexed {
            self.header.index_offset = self.pos as u32;
            for &o in &self.offsets {
                self.inner.write_u32::<BigEndian>(o as u32)?;
            }
            for &l in &self.lens {
                self.inner.write_u32::<BigEndian>(l as u32)?;
            }
            debug!("wrote ilab index for {} segments", self.offsets.len());
        }
        self.inner.seek(SeekFrom::Start(0))?;
        self.header.write(&mut self.inner)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        info!(
            "finished ilab stream: {} segments, {} frames",
            self.header.num_segs, self.header.num_frames
        );
        Ok(self.inner)
    }

    fn flush_run(&mut self) -> Result<()> {
        if let Some((label, count)) = self.run.take() {
            self.pos += write_block(&mut self.inner, count, label, self.header.bytes_per_label)?;
        }
        Ok(())
    }
}

impl<W: Write + Seek> SegmentSink for IlabWriter<W> {
    fn doneseg(&mut self) -> Result<()> {
        let segno = self.header.num_segs;
        if self.frameno == 0 {
            return Err(Error::ZeroLengthSegment(segno));
        }
        self.flush_run()?;
        self.pos += write_block(&mut self.inner, 0, 0, self.header.bytes_per_label)?;
        self.lens.push(self.frameno);
        self.header.num_segs += 1;
        self.frameno = 0;
        debug!("finished segment {}", segno);
        Ok(())
    }
}

impl<W: Write + Seek> LabelSink for IlabWriter<W> {
    fn num_labs(&self) -> usize {
        1
    }

    fn write_labs(&mut self, count: usize, labs: &[u32]) -> Result<()> {
        check_buffer(labs.len(), count, 1)?;
        let limit = 1u64 << (8 * self.header.bytes_per_label);
        if count > 0 && self.frameno == 0 {
            self.offsets.push(self.pos);
            self.inner.write_u32::<BigEndian>(self.header.num_segs as u32)?;
            self.pos += 4;
        }
        for &lab in &labs[..count] {
            if lab as u64 >= limit {
                return Err(Error::LabelOutOfRange { label: lab, size: limit as usize });
            }
            match &mut self.run {
                Some((l, n)) if *l == lab => *n += 1,
                _ => {
                    self.flush_run()?;
                    self.run = Some((lab, 1));
                }
            }
        }
        self.frameno += count;
        self.header.num_frames += count;
        Ok(())
    }
}
