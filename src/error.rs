use thiserror::Error;

/// Everything that can stop a provider run. None of these are retried.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("missing key `{0}` in response")]
    MissingField(String),

    #[error("key `{path}` is not {expected}")]
    UnexpectedType { path: String, expected: &'static str },

    #[error("page did not contain {0}")]
    Pattern(String),

    #[error("could not parse `{value}` as {format}")]
    Timestamp { value: String, format: &'static str },

    #[error("bad endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
