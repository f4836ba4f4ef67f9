//! Readers and writers for segmented feature/label files.
//!
//! | Format | Reader | Writer | Seekable |
//! |---|---|---|---|
//! | pre, LNA8, online features | [`CamFileReader`] | [`CamFileWriter`] | when indexed |
//! | ILab labels | [`IlabReader`] | [`IlabWriter`] | when indexed |
//! | ASCII | [`AsciiReader`] | [`AsciiWriter`] | rewind only |
//!
//! Readers take any `Read + Seek` handle. Wrap a pipe in
//! [`segstream_core::Unseekable`] to read it sequentially; indexing must then
//! be turned off.
//!
//! ```
//! use std::io::Cursor;
//! use segstream_codec::{CamFileReader, CamFileWriter};
//! use segstream_core::{FeatureSink, FeatureSource, Positionable, SegmentSink};
//!
//! let mut w = CamFileWriter::onlftr(Vec::new(), 2);
//! w.write_ftrs(2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
//! w.doneseg().unwrap();
//! let bytes = w.finish().unwrap();
//!
//! let mut r = CamFileReader::onlftr(Cursor::new(bytes), 2, true).unwrap();
//! assert_eq!(r.num_segs().unwrap(), Some(1));
//! r.nextseg().unwrap();
//! let mut frames = [0.0; 4];
//! assert_eq!(r.read_ftrs(2, Some(&mut frames)).unwrap(), 2);
//! assert_eq!(frames, [1.0, 2.0, 3.0, 4.0]);
//! ```

mod ascii;
mod camfile;
mod convert;
mod ilab;
mod tokmap;

pub use ascii::{AsciiReader, AsciiWriter};
pub use camfile::{CamFileReader, CamFileWriter, CamFormat};
pub use convert::{erf, from_lna8, from_pre8, ierf, to_lna8, to_pre8};
pub use ilab::{ILAB_MAGIC, ILAB_VERSION, IlabConfig, IlabReader, IlabWriter};
pub use tokmap::TokenMap;
