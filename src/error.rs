use thiserror::Error;

/// Errors surfaced by the shell.
///
/// Only `Connection` is fatal; every other variant is carried inside an
/// [`ExecutionResult`](crate::cli::executor::ExecutionResult) and printed.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not connect to {address}: {reason}")]
    Connection { address: String, reason: String },

    #[error("{0}")]
    Argument(String),

    #[error(transparent)]
    Transport(#[from] redis::RedisError),

    #[error("invalid config file {path}: {reason}")]
    Config { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("line editor: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

impl CliError {
    pub fn argument(message: impl Into<String>) -> Self {
        CliError::Argument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
