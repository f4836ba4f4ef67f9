//! Frame buffers for segmented feature streams.
//!
//! - [`FrameWindow`]: a lookahead/lookbehind window over the current segment
//!   of a feature stream, padding segment edges by frame replication. Filters
//!   that need temporal context (delta filters, two-pass normalization) read
//!   through it.
//! - [`FrameCache`]: a bounded run of frames tagged with its stream position,
//!   used to hand one half of a combined read to a second consumer.
//!
//! Both are single-threaded: streams are pulled by one consumer at a time.

mod cache;
mod window;

pub use cache::FrameCache;
pub use window::FrameWindow;
