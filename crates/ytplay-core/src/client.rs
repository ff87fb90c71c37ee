//! File-info client
//!
//! The only server call the controller makes itself. Any failure here is
//! fatal to the session.

use crate::{endpoints::Endpoints, Error, FileInfo, MediaItem, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[async_trait]
pub trait FileInfoClient: Send + Sync {
    async fn file_info(&self, item: &MediaItem) -> Result<FileInfo>;
}

/// File-info client over HTTP
pub struct HttpFileInfoClient {
    client: Client,
    endpoints: Endpoints,
}

impl HttpFileInfoClient {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self {
            client,
            endpoints: Endpoints::new(base_url),
        }
    }
}

#[async_trait]
impl FileInfoClient for HttpFileInfoClient {
    #[instrument(skip(self, item), fields(file = %item.filename))]
    async fn file_info(&self, item: &MediaItem) -> Result<FileInfo> {
        let url = self.endpoints.file_info(item)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        debug!(status = status.as_u16(), bytes = body.len(), "File info received");
        parse_file_info(status.as_u16(), &body)
    }
}

/// Decode a file-info response, turning error payloads into [`Error::FileInfo`]
pub fn parse_file_info(status: u16, body: &str) -> Result<FileInfo> {
    let parsed: std::result::Result<FileInfo, _> = serde_json::from_str(body);

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .and_then(|info| info.error)
            .unwrap_or_else(|| format!("Failed to load file info (HTTP {})", status));
        return Err(Error::FileInfo { status, message });
    }

    let info = parsed.map_err(|e| Error::FileInfoDecode(e.to_string()))?;
    if let Some(message) = info.error.clone() {
        return Err(Error::FileInfo { status, message });
    }
    Ok(info)
}
