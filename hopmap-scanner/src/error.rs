use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unexpected status {status} fetching {url}")]
    Status { url: String, status: u16 },
}

pub type Result<T> = std::result::Result<T, ScanError>;
