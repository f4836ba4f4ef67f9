//! CLI commands module.

mod convert;
mod info;
mod util;

pub use convert::ConvertCommand;
pub use info::InfoCommand;

pub(crate) use util::*;
