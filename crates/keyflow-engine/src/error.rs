use std::{io, result::Result as StdResult};

use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Unified error type for the keyflow engine and its command runners.
#[derive(Debug, Error)]
pub enum Error {
    /// A runner was handed a command kind it does not handle.
    #[error("Unsupported command kind: {0}")]
    UnsupportedKind(config::CommandKind),

    /// A command ran but reported failure (e.g. non-zero exit status).
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// I/O failure while performing a system operation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic error with context.
    #[error("Engine error: {0}")]
    Msg(String),
}
