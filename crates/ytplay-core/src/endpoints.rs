//! URL builders for the download manager's HTTP API

use crate::{Error, MediaItem, Result};
use url::Url;

/// Builds API URLs relative to a base URL
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// File metadata: mimetype, sidecars and probed streams
    pub fn file_info(&self, item: &MediaItem) -> Result<Url> {
        self.file_url(&["api", "file", "info"], &item.relative_path(), "")
    }

    /// The raw file
    pub fn download(&self, item: &MediaItem) -> Result<Url> {
        self.file_url(&["api", "download"], &item.relative_path(), "")
    }

    /// Server-generated HLS manifest for the file
    pub fn playlist(&self, item: &MediaItem) -> Result<Url> {
        self.file_url(&["api", "player", "playlist"], &item.relative_path(), ".m3u8")
    }

    /// A subtitle sidecar converted to WebVTT by the server
    pub fn subtitle(&self, item: &MediaItem, sidecar_file: &str) -> Result<Url> {
        let path = match item.folder.as_deref().map(|f| f.trim_matches('/')) {
            Some(folder) if !folder.is_empty() && !sidecar_file.starts_with(&format!("{}/", folder)) => {
                format!("{}/{}", folder, sidecar_file)
            }
            _ => sidecar_file.to_string(),
        };
        self.file_url(&["api", "player", "subtitle"], &path, ".vtt")
    }

    /// Remote thumbnail proxied through the server
    pub fn thumbnail(&self, remote: &str) -> Result<Url> {
        let mut url = self.prefixed(&["api", "thumbnail"])?;
        url.query_pairs_mut().append_pair("url", remote);
        Ok(url)
    }

    fn prefixed(&self, prefix: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(prefix);
        Ok(url)
    }

    fn file_url(&self, prefix: &[&str], path: &str, suffix: &str) -> Result<Url> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((last, dirs)) = parts.split_last() else {
            return Err(Error::InvalidConfig(format!("empty file path: {:?}", path)));
        };

        let mut url = self.prefixed(prefix)?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig(format!("{} cannot be a base URL", self.base)))?
            .extend(dirs)
            .push(&format!("{}{}", last, suffix));
        Ok(url)
    }
}
