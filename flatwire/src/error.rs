//! Error types and helpers.
//!
//! Every failure carries the byte offset (or the size) at which it was detected so callers
//! can tell a truncated buffer from a schema mismatch or genuine corruption.
use {core::str::Utf8Error, thiserror::Error};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Range [{offset}, {offset} + {len}) is outside of a buffer of {buffer_len} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },
    #[error("Corrupted data at offset {offset}: {reason}")]
    CorruptedData { offset: usize, reason: &'static str },
    #[error("Invalid UTF-8 string payload at offset {offset}: {source}")]
    InvalidEncoding {
        offset: usize,
        #[source]
        source: Utf8Error,
    },
    #[error("Destination buffer too small: needed {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("Unsupported in-place mutation at offset {offset}: {reason}")]
    UnsupportedMutation { offset: usize, reason: &'static str },
    #[error("Object used after its buffer was recycled (object generation {generation}, buffer generation {current})")]
    UseAfterRecycle { generation: u64, current: u64 },
    #[error("Type mismatch for field `{field}` at offset {offset}: expected {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        offset: usize,
    },
    #[error("Layout overflow: {what} exceeds the 32-bit wire format limits")]
    LayoutOverflow { what: &'static str },
}

pub type Result<T> = core::result::Result<T, Error>;

#[cold]
pub const fn out_of_bounds(offset: usize, len: usize, buffer_len: usize) -> Error {
    Error::OutOfBounds {
        offset,
        len,
        buffer_len,
    }
}

#[cold]
pub const fn corrupted(offset: usize, reason: &'static str) -> Error {
    Error::CorruptedData { offset, reason }
}

#[cold]
pub const fn invalid_encoding(offset: usize, source: Utf8Error) -> Error {
    Error::InvalidEncoding { offset, source }
}

#[cold]
pub const fn buffer_too_small(needed: usize, available: usize) -> Error {
    Error::BufferTooSmall { needed, available }
}

#[cold]
pub const fn unsupported_mutation(offset: usize, reason: &'static str) -> Error {
    Error::UnsupportedMutation { offset, reason }
}

#[cold]
pub const fn use_after_recycle(generation: u64, current: u64) -> Error {
    Error::UseAfterRecycle {
        generation,
        current,
    }
}

#[cold]
pub const fn type_mismatch(field: &'static str, expected: &'static str, offset: usize) -> Error {
    Error::TypeMismatch {
        field,
        expected,
        offset,
    }
}

#[cold]
pub const fn layout_overflow(what: &'static str) -> Error {
    Error::LayoutOverflow { what }
}

impl Error {
    /// The byte offset the error refers to, if it refers to one.
    pub const fn offset(&self) -> Option<usize> {
        match self {
            Error::OutOfBounds { offset, .. }
            | Error::CorruptedData { offset, .. }
            | Error::InvalidEncoding { offset, .. }
            | Error::UnsupportedMutation { offset, .. }
            | Error::TypeMismatch { offset, .. } => Some(*offset),
            Error::BufferTooSmall { .. }
            | Error::UseAfterRecycle { .. }
            | Error::LayoutOverflow { .. } => None,
        }
    }
}
