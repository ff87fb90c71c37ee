//! Media session synchronizer
//!
//! Mirrors now-playing metadata and transport position into the OS media
//! session, and persists the element's volume. Every platform call here is
//! an enhancement: failures are logged at debug level and dropped.

use crate::{
    platform::{MediaElement, MediaSession, NowPlaying, VolumeStore},
    poster::POSTER_MIME_TYPE,
    session::{PlaybackSession, SessionCell},
    Artwork, MediaMetadata, PositionState, PosterState, Result,
};
use std::sync::Arc;
use tracing::debug;

pub struct MediaSessionSync {
    session: Arc<dyn MediaSession>,
    now_playing: Arc<dyn NowPlaying>,
    volume: Arc<dyn VolumeStore>,
}

impl MediaSessionSync {
    pub fn new(
        session: Arc<dyn MediaSession>,
        now_playing: Arc<dyn NowPlaying>,
        volume: Arc<dyn VolumeStore>,
    ) -> Self {
        Self {
            session,
            now_playing,
            volume,
        }
    }

    /// Metadata for the current session state
    pub fn metadata_for(session: &PlaybackSession) -> MediaMetadata {
        let artwork = match session.poster() {
            PosterState::Captured { data_url } => vec![Artwork {
                src: data_url.clone(),
                mime_type: POSTER_MIME_TYPE.to_string(),
            }],
            _ => Vec::new(),
        };
        MediaMetadata {
            title: session.item().display_title().to_string(),
            artist: session.item().artist().map(str::to_string),
            artwork,
        }
    }

    /// Rebuild and push metadata. Returns true if the platform accepted it.
    pub fn push_metadata(&self, cell: &SessionCell) -> bool {
        let Ok(metadata) = cell.with_active(|s| Self::metadata_for(s)) else {
            return false;
        };
        best_effort("set_metadata", self.session.set_metadata(&metadata))
    }

    /// Push the transport position once the duration is known
    pub fn push_position(&self, cell: &SessionCell, element: &dyn MediaElement) -> bool {
        if cell.is_destroyed() {
            return false;
        }
        let duration = element.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return false;
        }
        let state = PositionState {
            duration,
            playback_rate: element.playback_rate(),
            position: element.current_time().clamp(0.0, duration),
        };
        best_effort("set_position_state", self.session.set_position_state(&state))
    }

    pub fn announce(&self, title: &str) {
        self.now_playing.set_now_playing(title);
    }

    /// Apply the persisted volume, or `default` when nothing was stored
    pub fn restore_volume(&self, element: &dyn MediaElement, default: f64) {
        let volume = self.volume.load().unwrap_or(default).clamp(0.0, 1.0);
        element.set_volume(volume);
    }

    pub fn persist_volume(&self, element: &dyn MediaElement) {
        if let Err(e) = self.volume.store(element.volume()) {
            debug!(error = %e, "Failed to persist volume");
        }
    }

    pub fn clear(&self) {
        self.now_playing.clear();
        best_effort("clear", self.session.clear());
    }
}

fn best_effort(call: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(call, error = %e, "Media session call failed");
            false
        }
    }
}
