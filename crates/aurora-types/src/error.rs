use thiserror::Error;

/// Errors produced while constructing model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("a change must have a pre or a post entry")]
    EmptyChange,

    #[error("pre and post entries of a change must share a ledger key")]
    KeyMismatch,
}

/// Errors produced by the frame codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Clean end of stream before the first byte of a header.
    #[error("end of stream")]
    Eof,

    #[error("frame header missing continuation bit: {header:#010x}")]
    MissingContinuationBit { header: u32 },

    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: u64, max: u32 },

    #[error("truncated frame: expected {expected} bytes, got {got}")]
    TruncatedFrame { expected: usize, got: usize },

    #[error("frame payload does not decode: {0}")]
    Decode(String),

    #[error("record does not encode: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
