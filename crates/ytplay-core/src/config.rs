//! Controller configuration
//!
//! Every timing constant here is a tunable. The settle delays were picked
//! empirically against desktop browsers and may need adjusting per runtime.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Playback controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Base URL of the download manager API
    pub base_url: Url,
    /// Delay before inspecting text tracks after a reload trigger (ms)
    pub subtitle_settle_ms: u64,
    /// Gap between successive track re-insertions on the reload path (ms)
    pub subtitle_reload_stagger_ms: u64,
    /// Upper bound on waiting for a re-inserted track to load its cues (ms)
    pub track_load_timeout_ms: u64,
    /// JPEG quality for captured posters (1-100)
    pub poster_quality: u8,
    /// Containers Apple-family engines can play without HLS
    pub broadly_compatible_mime_types: Vec<String>,
    /// Volume applied when nothing was persisted yet
    pub default_volume: f64,
    /// Whether the keyboard layer should react to keys
    pub shortcuts_enabled: bool,
    /// Adaptive streaming engine parameters
    pub engine: AdaptiveEngineConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8081/").expect("static URL is valid"),
            subtitle_settle_ms: 150,
            subtitle_reload_stagger_ms: 250,
            track_load_timeout_ms: 5_000,
            poster_quality: 86,
            broadly_compatible_mime_types: vec!["video/mp4".to_string()],
            default_volume: 1.0,
            shortcuts_enabled: true,
            engine: AdaptiveEngineConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Create a config pointing at the given API base URL
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Default::default()
        }
    }

    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Reject values the controller cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.base_url.cannot_be_a_base() {
            return Err(Error::InvalidConfig(format!(
                "base_url {} cannot be used as a base",
                self.base_url
            )));
        }
        if !(1..=100).contains(&self.poster_quality) {
            return Err(Error::InvalidConfig(format!(
                "poster_quality must be within 1..=100, got {}",
                self.poster_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::InvalidConfig(format!(
                "default_volume must be within 0.0..=1.0, got {}",
                self.default_volume
            )));
        }
        Ok(())
    }

    pub fn subtitle_settle(&self) -> Duration {
        Duration::from_millis(self.subtitle_settle_ms)
    }

    pub fn subtitle_reload_stagger(&self) -> Duration {
        Duration::from_millis(self.subtitle_reload_stagger_ms)
    }

    pub fn track_load_timeout(&self) -> Duration {
        Duration::from_millis(self.track_load_timeout_ms)
    }

    /// Whether `mime_type` is playable without HLS on Apple-family engines
    pub fn is_broadly_compatible(&self, mime_type: &str) -> bool {
        self.broadly_compatible_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
    }
}

/// Parameters handed to the adaptive streaming engine on construction.
///
/// Defaults favour a slow local server over fast startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveEngineConfig {
    /// Seconds of already-played media the engine keeps buffered
    pub back_buffer_length: f64,
    /// Fragment load timeout (ms)
    pub frag_loading_timeout_ms: u64,
    /// Let the engine demux in a background worker
    pub enable_worker: bool,
    pub low_latency_mode: bool,
    pub debug: bool,
}

impl Default for AdaptiveEngineConfig {
    fn default() -> Self {
        Self {
            back_buffer_length: 98.0,
            frag_loading_timeout_ms: 200_000,
            enable_worker: true,
            low_latency_mode: true,
            debug: false,
        }
    }
}
