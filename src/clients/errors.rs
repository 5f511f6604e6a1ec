use rspotify::ClientError;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // Caller input, never retried
    #[error("Not a recognized Spotify URL: {0}")]
    UnrecognizedUrl(String),

    #[error("Spotify error: {0}")]
    SpotifyError(#[from] ClientError),

    #[error("Spotify API unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// URL of a failed download, if this error is one.
    pub fn failed_url(&self) -> Option<&str> {
        match self {
            Error::DownloadFailed { url, .. } => Some(url),
            _ => None,
        }
    }
}
