//! Wire-level decode/encode errors shared by every layer above this crate.

use thiserror::Error;

/// Errors raised while reading or writing raw wire primitives.
///
/// Every numeric/string/GUID parse in this crate fails with
/// [`WireError::MalformedFrame`] on a short buffer; every write fails with
/// [`WireError::BufferOverflow`] when the remaining capacity is insufficient.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("buffer overflow: {0}")]
    BufferOverflow(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
