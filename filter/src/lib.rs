//! Filters over segmented feature streams.
//!
//! Each filter owns (or mutably borrows) one upstream stream and is itself a
//! stream, so filters stack:
//!
//! ```
//! use segstream_core::{FeatureSource, Positionable, VecStream};
//! use segstream_filter::{Fir, FirConfig, Narrow, delta_kernel};
//!
//! let mut s = VecStream::new(3, 0);
//! s.push_segment(&[0.0, 1.0, 9.0, 1.0, 2.0, 9.0, 2.0, 3.0, 9.0], &[]).unwrap();
//!
//! // Keep the first two columns, then append their deltas.
//! let narrow = Narrow::new(s, 0, Some(2), 16).unwrap();
//! let mut fir = Fir::new(narrow, &delta_kernel(3), &FirConfig::delta(3)).unwrap();
//! assert_eq!(fir.num_ftrs(), 4);
//!
//! fir.nextseg().unwrap();
//! let mut out = [0.0; 12];
//! assert_eq!(fir.read_ftrs(3, Some(&mut out)).unwrap(), 3);
//! assert_eq!(&out[4..8], &[1.0, 2.0, 2.0, 2.0]);
//! ```
//!
//! | Filter | Output width | Seeks upstream |
//! |---|---|---|
//! | [`Narrow`] | selected columns | forwards |
//! | [`Norm`] | same | forwards |
//! | [`NormUtts`] | same | required, twice per segment |
//! | [`OnlNorm`] | same | forwards; mid-segment seeks replay frames |
//! | [`Fir`] | input + filtered columns | when the window cannot reuse frames |
//! | [`OneHot`] | `size` features from one label | forwards |
//!
//! [`FrameInfo`] is a label source describing frame positions, used to trace
//! which frames reach the end of a pipeline.

/// Implements the [`Positionable`](segstream_core::Positionable) methods by
/// forwarding to a field.
macro_rules! delegate_positionable {
    ($field:ident) => {
        fn num_segs(&self) -> segstream_core::Result<Option<usize>> {
            self.$field.num_segs()
        }

        fn num_frames(&self, segno: Option<usize>) -> segstream_core::Result<Option<usize>> {
            self.$field.num_frames(segno)
        }

        fn nextseg(&mut self) -> segstream_core::Result<Option<usize>> {
            self.$field.nextseg()
        }

        fn rewind(&mut self) -> segstream_core::Result<segstream_core::Seek> {
            self.$field.rewind()
        }

        fn get_pos(&self) -> segstream_core::Result<Option<segstream_core::Position>> {
            self.$field.get_pos()
        }

        fn set_pos(
            &mut self,
            segno: usize,
            frameno: usize,
        ) -> segstream_core::Result<segstream_core::Seek> {
            self.$field.set_pos(segno, frameno)
        }
    };
}

mod fir;
mod frame_info;
mod narrow;
mod norm;
mod norm_utts;
mod one_hot;
mod onl_norm;

pub use fir::{Fir, FirConfig, convolve, delta_kernel, double_delta_kernel};
pub use frame_info::{FRAME_INFO_LABELS, FrameInfo};
pub use narrow::Narrow;
pub use norm::{Norm, NormVectors, load_norms, read_norms, write_norms};
pub use norm_utts::NormUtts;
pub use one_hot::{OneHot, OneHotConfig};
pub use onl_norm::{OnlNorm, OnlNormConfig};
