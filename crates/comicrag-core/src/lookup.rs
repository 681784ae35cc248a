//! Comic page and image lookup for a selected id.

use std::time::Duration;

use serde::Deserialize;

pub const XKCD_BASE_URL: &str = "https://xkcd.com";

/// Page URL for a comic id, e.g. `https://xkcd.com/844/`.
pub fn reference_url(id: &str) -> String {
    format!("{XKCD_BASE_URL}/{}/", id.trim())
}

/// Fetches image URLs from the xkcd JSON API.
#[derive(Debug, Clone)]
pub struct XkcdLookup {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ComicInfo {
    #[serde(default)]
    img: Option<String>,
}

impl XkcdLookup {
    pub fn new() -> Result<Self, LookupError> {
        Self::with_base_url(XKCD_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(LookupError::Client)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn info_url(&self, id: &str) -> String {
        format!("{}/{}/info.0.json", self.base_url, id.trim())
    }

    /// Image URL for comic `id`.
    pub async fn image_url(&self, id: &str) -> Result<String, LookupError> {
        let url = self.info_url(id);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(LookupError::Request)?;
        let info: ComicInfo = resp.json().await.map_err(LookupError::Request)?;
        info.img
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LookupError::NoImage(id.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("comic lookup failed: {0}")]
    Request(reqwest::Error),
    #[error("comic {0} has no image")]
    NoImage(String),
}
