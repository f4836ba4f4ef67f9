//! Structural combinators over segmented streams.
//!
//! | Combinator | Result |
//! |---|---|
//! | [`JoinFtrs`] | columns of two feature streams side by side |
//! | [`Paste`] | segments of one stream followed by those of another |
//! | [`Cut`] | two views over chosen segments of one seekable stream |
//! | [`SplitFtrs`] / [`SplitLabs`] | features and labels of one stream, read independently |
//!
//! [`Cut::from_ranges`] picks segments with range expressions such as
//! `"0-2,4"`; the chosen segments are renumbered from 0:
//!
//! ```
//! use segstream_combine::Cut;
//! use segstream_core::{FeatureSource, Positionable, VecStream};
//!
//! let mut base = VecStream::new(1, 0);
//! for s in 0..6 {
//!     base.push_segment(&[s as f32], &[]).unwrap();
//! }
//! let (mut train, mut held_out) = Cut::from_ranges(base, Some("0-2,4"), Some("3,5")).unwrap();
//! assert_eq!(train.num_segs().unwrap(), Some(4));
//!
//! let mut v = [0.0];
//! assert!(train.set_pos(3, 0).unwrap().is_done());
//! train.read_ftrs(1, Some(&mut v)).unwrap();
//! assert_eq!(v, [4.0]);
//!
//! held_out.nextseg().unwrap();
//! held_out.read_ftrs(1, Some(&mut v)).unwrap();
//! assert_eq!(v, [3.0]);
//! ```
//!
//! Views that share a base ([`Cut`], [`SplitFtrs`]) hold it behind
//! `Rc<RefCell<_>>` and are not `Send`.

mod cut;
mod join;
mod paste;
mod split;

pub use cut::{Cut, CutSpan};
pub use join::JoinFtrs;
pub use paste::Paste;
pub use split::{SplitFtrs, SplitLabs};
