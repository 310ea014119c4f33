use thiserror::Error;

/// Errors raised by the embedded database.
#[derive(Error, Debug)]
pub enum Error {
    #[error("SurrealDB error: {0}")]
    DbError(#[from] surrealdb::Error),
    #[error("Item not found.")]
    NotFound,
}

/// Errors that can occur while fetching audio bytes from the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request for {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("Request failed: {0}")]
    Request(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

/// Errors that can occur with the offline audio cache.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("Storage error: {0}")]
    Storage(#[from] Error),
    #[error("Download was cancelled.")]
    Cancelled,
    #[error("Song id {0} is out of range for the offline cache.")]
    SongIdOutOfRange(u64),
}

impl From<surrealdb::Error> for CacheError {
    fn from(e: surrealdb::Error) -> Self {
        Self::Storage(Error::from(e))
    }
}

impl CacheError {
    /// The message shown to the listener when a download could not be completed.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::Fetch(_) | Self::Storage(_) | Self::SongIdOutOfRange(_) => {
                "Could not save for offline listening."
            }
            Self::Cancelled => "Download cancelled.",
        }
    }
}
