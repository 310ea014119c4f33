//! Fetching audio bytes for the offline cache.

use async_trait::async_trait;

use crate::errors::FetchError;

pub const DEFAULT_AUDIO_MIME: &str = "audio/mpeg";

/// The body of a successful audio download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Something that can download the audio behind a URL.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is not successful.
    async fn fetch(&self, url: &str) -> Result<FetchedAudio, FetchError>;
}

/// Reduce a `Content-Type` header to an audio mime type, falling back to [`DEFAULT_AUDIO_MIME`].
#[must_use]
pub fn normalize_audio_mime(content_type: Option<&str>) -> String {
    let normalized = content_type
        .and_then(|content_type| content_type.split(';').next())
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match normalized.as_str() {
        "audio/x-wav" | "audio/wave" => "audio/wav".to_string(),
        "audio/mp3" => DEFAULT_AUDIO_MIME.to_string(),
        audio if audio.starts_with("audio/") => audio.to_string(),
        _ => DEFAULT_AUDIO_MIME.to_string(),
    }
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use async_trait::async_trait;
    use log::debug;
    use reqwest::header::CONTENT_TYPE;

    use super::{AudioFetcher, FetchedAudio, normalize_audio_mime};
    use crate::errors::FetchError;

    /// Downloads audio over HTTP(S).
    #[derive(Clone, Debug, Default)]
    pub struct HttpFetcher {
        client: reqwest::Client,
    }

    impl HttpFetcher {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub const fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl AudioFetcher for HttpFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedAudio, FetchError> {
            let response = self.client.get(url).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let mime = normalize_audio_mime(
                response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok()),
            );
            let bytes = response.bytes().await?.to_vec();
            debug!("Fetched {} bytes of {mime} from {url}", bytes.len());

            Ok(FetchedAudio { bytes, mime })
        }
    }
}
