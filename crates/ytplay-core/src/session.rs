//! Playback session - the state one playback attempt owns
//!
//! Holds the resolved sources and tracks, the reified playback, poster and
//! lifecycle states, and the slot for the single adaptive engine instance.
//! Only the controller and its components mutate it, always through
//! [`SessionCell`], whose lock is never held across an await.

use crate::{
    capability::MediaProfile,
    platform::AdaptiveEngine,
    resolver::ResolvedSources,
    types::*,
    Error, Result,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Owner of the adaptive engine instance.
///
/// At most one engine is ever constructed per session: the slot refuses a
/// second construction even after the first engine was taken for teardown.
#[derive(Default)]
pub struct EngineSlot {
    engine: Option<Box<dyn AdaptiveEngine>>,
    constructed: u32,
}

impl EngineSlot {
    pub fn is_installed(&self) -> bool {
        self.engine.is_some()
    }

    /// Number of engines this slot has constructed
    pub fn constructed(&self) -> u32 {
        self.constructed
    }

    /// Construct and install the engine. Fails if one was ever constructed.
    pub fn construct_with<F>(&mut self, build: F) -> Result<&dyn AdaptiveEngine>
    where
        F: FnOnce() -> Result<Box<dyn AdaptiveEngine>>,
    {
        if self.constructed > 0 {
            return Err(Error::InvalidStateTransition {
                from: "engine constructed".to_string(),
                to: "engine constructed".to_string(),
            });
        }
        let engine = build()?;
        self.constructed += 1;
        Ok(&**self.engine.insert(engine))
    }

    pub fn get(&self) -> Option<&dyn AdaptiveEngine> {
        self.engine.as_deref()
    }

    /// Empty the slot for teardown
    pub fn take(&mut self) -> Option<Box<dyn AdaptiveEngine>> {
        self.engine.take()
    }
}

impl std::fmt::Debug for EngineSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSlot")
            .field("installed", &self.is_installed())
            .field("constructed", &self.constructed)
            .finish()
    }
}

/// State of one playback attempt
#[derive(Debug)]
pub struct PlaybackSession {
    id: SessionId,
    item: MediaItem,
    sources: Vec<PlaybackSource>,
    tracks: Vec<TrackSpec>,
    manifest_url: Url,
    thumbnail_url: Option<String>,
    poster: PosterState,
    profile: MediaProfile,
    mode: PlaybackMode,
    lifecycle: Lifecycle,
    engine: EngineSlot,
    engine_failure: Option<String>,
    started_at: DateTime<Utc>,
}

impl PlaybackSession {
    pub fn new(item: MediaItem, resolved: ResolvedSources, manifest_url: Url) -> Self {
        Self {
            id: SessionId::new(),
            item,
            sources: resolved.sources,
            tracks: resolved.tracks,
            manifest_url,
            thumbnail_url: None,
            poster: PosterState::Missing,
            profile: resolved.profile,
            mode: resolved.initial_mode,
            lifecycle: Lifecycle::Active,
            engine: EngineSlot::default(),
            engine_failure: None,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn item(&self) -> &MediaItem {
        &self.item
    }

    pub fn sources(&self) -> &[PlaybackSource] {
        &self.sources
    }

    pub fn tracks(&self) -> &[TrackSpec] {
        &self.tracks
    }

    pub fn manifest_url(&self) -> &Url {
        &self.manifest_url
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    pub fn set_thumbnail_url(&mut self, url: impl Into<String>) {
        self.thumbnail_url = Some(url.into());
    }

    pub fn poster(&self) -> &PosterState {
        &self.poster
    }

    pub fn poster_mut(&mut self) -> &mut PosterState {
        &mut self.poster
    }

    pub fn profile(&self) -> MediaProfile {
        self.profile
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Switch to adaptive streaming; rejected when already adaptive
    pub fn enter_adaptive(&mut self, origin: AdaptiveOrigin) -> Result<()> {
        self.mode = self.mode.into_adaptive(origin)?;
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_destroyed(&self) -> bool {
        self.lifecycle.is_destroyed()
    }

    /// Returns true if this call destroyed the session
    pub fn destroy(&mut self) -> bool {
        self.lifecycle.destroy()
    }

    pub fn engine(&self) -> &EngineSlot {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EngineSlot {
        &mut self.engine
    }

    /// Record the first fatal engine failure. Returns false if one was already recorded.
    pub fn record_engine_failure(&mut self, details: impl Into<String>) -> bool {
        if self.engine_failure.is_some() {
            return false;
        }
        self.engine_failure = Some(details.into());
        true
    }

    pub fn engine_failure(&self) -> Option<&str> {
        self.engine_failure.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            title: self.item.display_title().to_string(),
            sources: self.sources.clone(),
            tracks: self.tracks.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            have_poster: self.poster.is_captured(),
            has_video_stream: self.profile.has_video_stream,
            is_audio_only: self.profile.is_audio_only,
            mode: self.mode,
            using_adaptive_streaming: self.mode.is_adaptive(),
            destroyed: self.is_destroyed(),
            engines_constructed: self.engine.constructed(),
            engine_failure: self.engine_failure.clone(),
            started_at: self.started_at,
        }
    }
}

/// Read-only view of a session for hosts, logs and tests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub title: String,
    pub sources: Vec<PlaybackSource>,
    pub tracks: Vec<TrackSpec>,
    pub thumbnail_url: Option<String>,
    pub have_poster: bool,
    pub has_video_stream: bool,
    pub is_audio_only: bool,
    pub mode: PlaybackMode,
    pub using_adaptive_streaming: bool,
    pub destroyed: bool,
    pub engines_constructed: u32,
    pub engine_failure: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Shared handle to a session
#[derive(Clone)]
pub struct SessionCell(Arc<Mutex<PlaybackSession>>);

impl SessionCell {
    pub fn new(session: PlaybackSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut PlaybackSession) -> R) -> R {
        f(&mut self.lock())
    }

    /// Run `f` only while the session is active
    pub fn with_active<R>(&self, f: impl FnOnce(&mut PlaybackSession) -> R) -> Result<R> {
        let mut session = self.lock();
        if session.is_destroyed() {
            return Err(Error::SessionDestroyed);
        }
        Ok(f(&mut session))
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().is_destroyed()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }
}
