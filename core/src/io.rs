//! Handle adapters.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Wraps a pipe-like handle so it can be given to a codec that wants
/// `Read + Seek`. Every seek fails, which codecs report as
/// [`Seek::Unsupported`](crate::Seek::Unsupported).
///
/// ```
/// use std::io::{Seek, SeekFrom};
/// use segstream_core::Unseekable;
///
/// let mut pipe = Unseekable::new(&b"abc"[..]);
/// assert!(pipe.seek(SeekFrom::Start(0)).is_err());
/// ```
#[derive(Debug)]
pub struct Unseekable<T> {
    inner: T,
}

impl<T> Unseekable<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<R: Read> Read for Unseekable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<W: Write> Write for Unseekable<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T> Seek for Unseekable<T> {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "handle is not seekable"))
    }
}

/// Grows `buf` so it holds at least `len` elements.
///
/// Filters keep one scratch buffer per instance and call this before each
/// read instead of reallocating.
pub fn ensure_capacity<T: Default + Clone>(buf: &mut Vec<T>, len: usize) {
    if buf.len() < len {
        buf.resize(len, T::default());
    }
}
