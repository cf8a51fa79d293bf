use std::io;
use thiserror::Error;

/// The primary error type for the `monsoon-lib` library.
#[derive(Error, Debug)]
pub enum MonsoonError {
    #[error("Invalid length: expected exactly {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Partial record: {remainder} trailing bytes do not form a {record_size}-byte measurement")]
    PartialRecord { record_size: usize, remainder: usize },

    #[error("Index {index} out of bounds for {len} values")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Value {value:#x} does not fit the byte-wide field at index {index}")]
    ValueOutOfRange { index: usize, value: u16 },

    #[error("Invalid channel index: {0}")]
    InvalidChannel(u8),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<num_enum::TryFromPrimitiveError<crate::channel::Channel>> for MonsoonError {
    fn from(err: num_enum::TryFromPrimitiveError<crate::channel::Channel>) -> Self {
        MonsoonError::InvalidChannel(err.number)
    }
}
