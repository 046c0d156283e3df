use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Sink Unavailable - {0}")]
    SinkUnavailable(String),

    #[error("Cancelled while waiting for the event queue")]
    Cancelled,

    #[error("Event queue is closed")]
    Closed,

    #[error("Invalid State - {0}")]
    InvalidState(String),

    #[error("Sink Error - {0}")]
    Sink(String),

    #[error("Send timed out")]
    Timeout,

    #[error("Config Error - {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Sink(err.to_string())
    }
}
