//! ytplay Core - Playback controller for the download manager's web player
//!
//! This crate drives one playback session for a downloaded media file:
//! - Source resolution from the file-info response and engine capabilities
//! - One-way fallback from direct playback to HLS streaming
//! - Subtitle track synchronization with a staggered reload path
//! - One-shot poster capture from a decoded frame
//! - OS media session mirroring and volume persistence
//! - Keyboard binding lifecycle and session teardown
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       PlaybackController                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  File Info   │  │  Capability  │  │    Source    │           │
//! │  │    Client    │─▶│    Probe     │─▶│   Resolver   │           │
//! │  └──────────────┘  └──────────────┘  └──────┬───────┘           │
//! │                                             │                   │
//! │                    ┌────────────────────────┴──┐                │
//! │                    │  Playback Session (cell)  │                │
//! │                    └──────┬──────────────┬─────┘                │
//! │                           │              │                      │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌────┴─────────┐            │
//! │  │   Fallback   │  │  Subtitle   │  │    Poster    │            │
//! │  │   Machine    │  │    Sync     │  │   Capture    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │Media Session │  │  Shortcuts   │  │  Task Scope  │           │
//! │  │    Sync      │  │   Binding    │  │              │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//!                 │ platform traits (element, engine, host)
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod capability;
pub mod endpoints;
pub mod resolver;
pub mod platform;
pub mod client;
pub mod shortcuts;
pub mod scope;
pub mod session;
pub mod fallback;
pub mod subtitles;
pub mod poster;
pub mod media_session;
pub mod controller;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result, Severity};
pub use types::*;
pub use config::{AdaptiveEngineConfig, PlayerConfig};
pub use capability::{Capabilities, CapabilityProbe, MediaProfile};
pub use endpoints::Endpoints;
pub use resolver::{ResolvedSources, SourceResolver};
pub use platform::{
    AdaptiveEngine, AdaptiveEngineFactory, JsonFileVolumeStore, MediaElement, MediaSession,
    MemoryVolumeStore, Notifier, NowPlaying, Platform, VolumeStore,
};
pub use client::{FileInfoClient, HttpFileInfoClient};
pub use shortcuts::{CloseHandle, NoShortcuts, ShortcutBinding, ShortcutController, ShortcutTarget};
pub use session::{PlaybackSession, SessionCell, SessionSnapshot};
pub use fallback::{FallbackMachine, FallbackOutcome, SkipReason};
pub use subtitles::{SubtitleSync, SyncOutcome};
pub use poster::{CaptureOutcome, PosterCapture};
pub use media_session::MediaSessionSync;
pub use controller::PlaybackController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version once at host startup
pub fn init() {
    tracing::info!(version = VERSION, "ytplay core initialized");
}
