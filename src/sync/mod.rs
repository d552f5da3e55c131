//! Blocking driver running the protocol steps over any `Read + Write` stream.

mod conn;

pub use conn::{BinlogEventRef, Conn};
