use std::collections::TryReserveError;

use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::protocol::packet::{ErrPayload, ErrPayloadBytes};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Memory allocation failed: {0}")]
    MemoryAllocation(#[from] TryReserveError),

    /// A length-encoded NULL where a value is required
    #[error("Unexpected NULL length")]
    NullSize,

    /// The stream disagrees with a declared packet or event size
    #[error("Unexpected data: {0}")]
    UnexpectedData(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("No scramble buffer")]
    NoScramble,

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes<'a>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
