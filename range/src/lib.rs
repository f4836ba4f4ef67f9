//! Integer range expressions for picking segments, frames or columns.
//!
//! An expression lists values in order, with Matlab-style `start:step:end`
//! pieces, subtraction after `/`, and terms joined by `;`:
//!
//! | Expression      | Values (max 10)           |
//! |-----------------|---------------------------|
//! | `0-2,4`         | 0 1 2 4                   |
//! | `1:3:^0`        | 1 4 7                     |
//! | `all/3:5`       | 0 1 2 6 7 8 9             |
//! | `5:2;nil;8`     | 5 4 3 2 8                 |
//! | `@held_out.txt` | one expression per line   |
//!
//! `^n` counts back from the upper limit, so `^0` is the last value.
//!
//! ```
//! use segstream_range::Range;
//!
//! let r = Range::parse("0-2,4", 0, Some(6)).unwrap();
//! assert_eq!(r.iter().collect::<Vec<_>>(), vec![0, 1, 2, 4]);
//! assert_eq!(r.contains(3), 0);
//!
//! let mut c = r.cursor();
//! assert_eq!(c.forward(3), Some(4));
//! ```

mod error;
mod node;
mod parser;
mod range;

pub use error::{RangeError, Result};
pub use range::{Range, RangeCursor};
