//! Core types for ytplay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::{Error, Result};

/// MIME type announced for server-generated HLS manifests
pub const HLS_MIME_TYPE: &str = "application/x-mpegURL";

/// MIME type assumed when file info does not report one
pub const DEFAULT_MIME_TYPE: &str = "video/mp4";

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Item and file info
// =============================================================================

/// A downloaded (or downloading) item, as handed over by the queue/history store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaItem {
    #[serde(default)]
    pub id: Option<String>,
    /// Path of the file relative to the download root
    pub filename: String,
    /// Sub-folder the file was saved into
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extras: ItemExtras,
    #[serde(default)]
    pub datetime: Option<DateTime<Utc>>,
}

/// Extractor metadata attached to an item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemExtras {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    /// Remote thumbnail URL reported by the extractor
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_audio: bool,
    /// Duration hint in seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

impl MediaItem {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Title shown to the user, falling back to the file name
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.filename)
    }

    /// Artist derived from channel, then uploader
    pub fn artist(&self) -> Option<&str> {
        [self.extras.channel.as_deref(), self.extras.uploader.as_deref()]
            .into_iter()
            .flatten()
            .find(|a| !a.trim().is_empty())
    }

    /// Path of the file on the server, including the folder
    pub fn relative_path(&self) -> String {
        match self.folder.as_deref().map(|f| f.trim_matches('/')) {
            Some(folder) if !folder.is_empty() => format!("{}/{}", folder, self.filename),
            _ => self.filename.clone(),
        }
    }
}

/// Response of the file-info endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub sidecar: Sidecars,
    #[serde(default)]
    pub ffprobe: Option<ProbeResult>,
    /// Server-side error message
    #[serde(default)]
    pub error: Option<String>,
}

/// Auxiliary files stored next to the media file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sidecars {
    #[serde(default)]
    pub subtitle: Vec<SubtitleSidecar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleSidecar {
    pub file: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub codec_type: String,
    #[serde(default)]
    pub codec_name: Option<String>,
}

impl FileInfo {
    /// True if any probed stream is a video stream
    pub fn has_video_stream(&self) -> bool {
        self.ffprobe
            .as_ref()
            .map(|p| p.streams.iter().any(|s| s.codec_type == "video"))
            .unwrap_or(false)
    }
}

// =============================================================================
// Sources and tracks
// =============================================================================

/// What the controller does when a source fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorAction {
    /// Switch to the adaptive streaming engine
    FallbackToAdaptive,
    /// Manifest source with nothing to fall back to, report to the user
    Report,
}

/// A candidate source handed to the media element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSource {
    pub url: Url,
    pub mime_type: String,
    pub on_error: SourceErrorAction,
}

impl PlaybackSource {
    pub fn is_hls(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case(HLS_MIME_TYPE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTrackKind {
    Captions,
    Subtitles,
}

impl std::fmt::Display for TextTrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextTrackKind::Captions => write!(f, "captions"),
            TextTrackKind::Subtitles => write!(f, "subtitles"),
        }
    }
}

/// A declared text track element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    pub kind: TextTrackKind,
    pub label: String,
    pub lang: String,
    pub file_url: Url,
}

/// Mode of a live text track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTrackMode {
    Disabled,
    Hidden,
    Showing,
}

// =============================================================================
// Session states
// =============================================================================

/// How the adaptive stream came to be playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveOrigin {
    /// The element plays the manifest itself (Apple-family engines)
    NativeManifest,
    /// An adaptive engine instance was attached after a failure
    Engine,
}

/// Playback mode of a session. `AdaptiveStreaming` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    Direct,
    AdaptiveStreaming(AdaptiveOrigin),
}

impl PlaybackMode {
    pub fn is_adaptive(&self) -> bool {
        matches!(self, PlaybackMode::AdaptiveStreaming(_))
    }

    /// Move to adaptive streaming; only legal from `Direct`
    pub fn into_adaptive(self, origin: AdaptiveOrigin) -> Result<PlaybackMode> {
        match self {
            PlaybackMode::Direct => Ok(PlaybackMode::AdaptiveStreaming(origin)),
            PlaybackMode::AdaptiveStreaming(_) => Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: PlaybackMode::AdaptiveStreaming(origin).to_string(),
            }),
        }
    }
}

impl std::fmt::Display for PlaybackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackMode::Direct => write!(f, "direct"),
            PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::NativeManifest) => {
                write!(f, "hls (native)")
            }
            PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::Engine) => write!(f, "hls (engine)"),
        }
    }
}

/// Poster capture state. `Captured` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PosterState {
    #[default]
    Missing,
    /// A capture is in flight
    Pending,
    Captured { data_url: String },
}

impl PosterState {
    pub fn is_captured(&self) -> bool {
        matches!(self, PosterState::Captured { .. })
    }

    /// Reserve the capture slot
    pub fn begin(&mut self) -> Result<()> {
        match self {
            PosterState::Missing => {
                *self = PosterState::Pending;
                Ok(())
            }
            _ => Err(self.transition_error("pending")),
        }
    }

    /// Commit a capture started with [`PosterState::begin`]
    pub fn complete(&mut self, data_url: String) -> Result<()> {
        match self {
            PosterState::Pending => {
                *self = PosterState::Captured { data_url };
                Ok(())
            }
            _ => Err(self.transition_error("captured")),
        }
    }

    /// Release a failed capture so a later trigger can retry
    pub fn abandon(&mut self) {
        if matches!(self, PosterState::Pending) {
            *self = PosterState::Missing;
        }
    }

    fn transition_error(&self, to: &str) -> Error {
        Error::InvalidStateTransition {
            from: self.to_string(),
            to: to.to_string(),
        }
    }
}

impl std::fmt::Display for PosterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PosterState::Missing => write!(f, "missing"),
            PosterState::Pending => write!(f, "pending"),
            PosterState::Captured { .. } => write!(f, "captured"),
        }
    }
}

/// Session lifecycle. Moves only from `Active` to `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Destroyed,
}

impl Lifecycle {
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Lifecycle::Destroyed)
    }

    /// Returns true if this call performed the transition
    pub fn destroy(&mut self) -> bool {
        let was_active = !self.is_destroyed();
        *self = Lifecycle::Destroyed;
        was_active
    }
}

// =============================================================================
// Events
// =============================================================================

/// Events emitted by the native media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The `<source>` at `index` failed to load
    SourceError { index: usize, message: String },
    LoadedMetadata,
    /// First frame decoded after a load
    LoadedData,
    Play,
    Pause,
    DurationChange,
    RateChange,
    Seeked,
    VolumeChange,
}

/// Events emitted by an adaptive streaming engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ManifestParsed,
    MediaAttached,
    Error { fatal: bool, details: String },
}

/// Why the player asked to be closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Requested through the keyboard layer or the UI
    User,
    /// The session could not start
    Fatal(String),
}

// =============================================================================
// Frames and media session payloads
// =============================================================================

/// A decoded RGBA video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artwork {
    pub src: String,
    pub mime_type: String,
}

/// Now-playing metadata for the OS media session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub artist: Option<String>,
    pub artwork: Vec<Artwork>,
}

/// Transport position for the OS media session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub duration: f64,
    pub playback_rate: f64,
    pub position: f64,
}
