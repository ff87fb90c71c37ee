//! Platform capabilities consumed by the controller
//!
//! The controller never touches the host directly. The media element, the
//! adaptive streaming engine, the OS media session, the document title, the
//! toast area and the volume storage are all reached through these traits.

use crate::{
    types::*,
    AdaptiveEngineConfig, Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use url::Url;

/// The native media element
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Subscribe to element events
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;

    /// Replace the `<source>` children
    fn set_sources(&self, sources: &[PlaybackSource]);

    /// Replace the `<track>` children
    fn set_tracks(&self, tracks: &[TrackSpec]);

    /// Drop native sources so another loader can take over the element
    fn detach_sources(&self);

    fn set_poster(&self, url: &str);

    fn is_paused(&self) -> bool;

    /// `readyState >= HAVE_METADATA`
    fn has_metadata(&self) -> bool;

    /// Decoded frame size, `(0, 0)` until a frame is available
    fn video_dimensions(&self) -> (u32, u32);

    /// Duration in seconds; NaN or infinite while unknown
    fn duration(&self) -> f64;
    fn current_time(&self) -> f64;
    fn playback_rate(&self) -> f64;
    fn volume(&self) -> f64;
    fn set_volume(&self, volume: f64);

    fn text_track_count(&self) -> usize;
    fn text_track_mode(&self, index: usize) -> Option<TextTrackMode>;
    fn set_text_track_mode(&self, index: usize, mode: TextTrackMode);

    /// Loaded cue count, `None` when the track does not expose its cues
    fn text_track_cue_count(&self, index: usize) -> Option<usize>;

    /// Remove and re-insert the `<track>` at `index`, resolving once it
    /// reports its cues loaded
    async fn reload_text_track(&self, index: usize) -> Result<()>;

    /// Grab the current decoded frame
    async fn capture_frame(&self) -> Option<VideoFrame>;
}

/// One adaptive streaming engine instance
pub trait AdaptiveEngine: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;
    fn load_source(&self, manifest: &Url) -> Result<()>;
    fn attach_media(&self, element: Arc<dyn MediaElement>) -> Result<()>;
    /// Stop fetching and release the element
    fn destroy(&self);
}

/// Builds adaptive streaming engines
pub trait AdaptiveEngineFactory: Send + Sync {
    fn create(&self, config: &AdaptiveEngineConfig) -> Result<Box<dyn AdaptiveEngine>>;
}

/// OS-level media session surface
pub trait MediaSession: Send + Sync {
    fn set_metadata(&self, metadata: &MediaMetadata) -> Result<()>;
    fn set_position_state(&self, state: &PositionState) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Now-playing indicator of the host (the document title in a browser)
pub trait NowPlaying: Send + Sync {
    fn set_now_playing(&self, title: &str);
    fn clear(&self);
}

/// User-visible messages
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Storage for the last used volume, shared across sessions
pub trait VolumeStore: Send + Sync {
    fn load(&self) -> Option<f64>;
    fn store(&self, volume: f64) -> Result<()>;
}

/// Volume kept in memory only
#[derive(Debug, Default)]
pub struct MemoryVolumeStore {
    volume: Mutex<Option<f64>>,
}

impl MemoryVolumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VolumeStore for MemoryVolumeStore {
    fn load(&self) -> Option<f64> {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn store(&self, volume: f64) -> Result<()> {
        *self.volume.lock().unwrap_or_else(|e| e.into_inner()) = Some(volume);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedVolume {
    volume: f64,
}

/// Volume persisted as a small JSON document
#[derive(Debug, Clone)]
pub struct JsonFileVolumeStore {
    path: PathBuf,
}

impl JsonFileVolumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl VolumeStore for JsonFileVolumeStore {
    fn load(&self) -> Option<f64> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        let persisted: PersistedVolume = serde_json::from_str(&raw).ok()?;
        Some(persisted.volume.clamp(0.0, 1.0))
    }

    fn store(&self, volume: f64) -> Result<()> {
        let raw = serde_json::to_string(&PersistedVolume { volume })?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

/// Every platform capability a session needs
#[derive(Clone)]
pub struct Platform {
    pub element: Arc<dyn MediaElement>,
    pub engines: Arc<dyn AdaptiveEngineFactory>,
    pub media_session: Arc<dyn MediaSession>,
    pub now_playing: Arc<dyn NowPlaying>,
    pub notifier: Arc<dyn Notifier>,
    pub volume: Arc<dyn VolumeStore>,
    pub shortcuts: Arc<dyn crate::shortcuts::ShortcutController>,
    pub file_info: Arc<dyn crate::client::FileInfoClient>,
}
