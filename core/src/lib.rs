//! Segmented feature/label stream contracts.
//!
//! A stream is a sequence of segments (utterances), each an ordered run of
//! fixed-width frames. A frame carries `num_ftrs` floats and/or `num_labs`
//! integer labels. Every codec, filter and combinator in the workspace speaks
//! the traits defined here:
//!
//! - [`Positionable`]: segment counts, `nextseg`, `rewind`, `get_pos`, `set_pos`
//! - [`FeatureSource`] / [`LabelSource`] / [`FeatureLabelSource`]: reading
//! - [`FeatureSink`] / [`LabelSink`] / [`FeatureLabelSink`]: writing
//!
//! # Cursor protocol
//!
//! A fresh stream is positioned before its first segment. `nextseg()` must be
//! called before reading each segment; a read that returns fewer frames than
//! requested has hit the end of the segment. `nextseg()` returning `None` means
//! the stream is exhausted. `rewind()` and `set_pos()` return
//! [`Seek::Unsupported`] on streams that cannot seek, leaving the cursor as it
//! was.
//!
//! ```
//! use segstream_core::{FeatureSource, Positionable, VecStream};
//!
//! let mut s = VecStream::new(2, 0);
//! s.push_segment(&[1.0, 2.0, 3.0, 4.0], &[]).unwrap();
//!
//! let mut frame = [0.0; 2];
//! while let Some(segno) = s.nextseg().unwrap() {
//!     while s.read_ftrs(1, Some(&mut frame)).unwrap() == 1 {
//!         println!("segment {}: {:?}", segno, frame);
//!     }
//! }
//! ```
//!
//! # Borrowing upstreams
//!
//! All traits are implemented for `&mut T` and `Box<T>`, so a filter that is
//! generic over its upstream can either own it or borrow it for its lifetime.

mod error;
mod io;
mod stream;
mod vec_stream;

pub use error::{Error, Result};
pub use io::{Unseekable, ensure_capacity};
pub use stream::{
    FeatureLabelSink, FeatureLabelSource, FeatureSink, FeatureSource, LabelSink, LabelSource,
    Position, Positionable, Seek, SegmentSink, check_buffer,
};
pub use vec_stream::VecStream;
