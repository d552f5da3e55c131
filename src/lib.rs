pub mod buffer;
pub mod constant;
pub mod error;
mod opts;
pub mod protocol;
pub mod sync;

pub use opts::{DEFAULT_CAPABILITIES, Opts};
