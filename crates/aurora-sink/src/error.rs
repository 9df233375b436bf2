use thiserror::Error;

/// Errors produced by sink operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("a sink transaction is already open")]
    TransactionAlreadyOpen,

    #[error("no sink transaction is open")]
    NoTransaction,

    #[error("duplicate key on insert into {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },

    #[error("cursor `{key}` does not parse: {value:?}")]
    MalformedCursor { key: &'static str, value: String },

    #[error("sink I/O error: {0}")]
    Io(String),
}

pub type SinkResult<T> = Result<T, SinkError>;
