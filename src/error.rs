use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The config file could not be read or parsed, or a required field is empty.
    #[error("config error ({}): {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("You must supply the name of a queue (-q QUEUE)")]
    MissingQueueName,

    #[error("queue `{0}` does not exist")]
    NotFound(String),

    /// Startup could not turn the queue name into an endpoint.
    #[error("failed to resolve queue `{name}`")]
    Resolution {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("`{0}` is not a valid IP address")]
    Parse(String),

    #[error("queue request failed: {0}")]
    Queue(String),

    /// The receipt handle expired or its message was already deleted.
    #[error("receipt handle is no longer valid: {0}")]
    InvalidReceipt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
