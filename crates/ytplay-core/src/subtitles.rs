//! Subtitle track synchronizer
//!
//! Keeps the first declared track showing and every other track disabled
//! after anything that can rebuild the element's track list. When the first
//! track comes back without cues, the track elements are reloaded one by one
//! and the policy is re-applied as each reports its cues. All of this is
//! best effort: failures are logged and swallowed.

use crate::{platform::MediaElement, session::SessionCell, PlayerConfig, TextTrackMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    NoTracks,
    /// Mode toggles were enough
    Applied { changed: usize },
    /// The reload path ran
    Reloaded { reloaded: usize, failed: usize },
    /// Another reload was already running
    ReloadInProgress,
    /// The session went away mid-sync
    Cancelled,
}

/// Mode the track at `index` should be in
pub fn desired_mode(index: usize) -> TextTrackMode {
    if index == 0 {
        TextTrackMode::Showing
    } else {
        TextTrackMode::Disabled
    }
}

/// Apply the policy, writing only modes that differ. Returns the number of writes.
pub fn apply_policy(element: &dyn MediaElement) -> usize {
    let mut changed = 0;
    for index in 0..element.text_track_count() {
        let desired = desired_mode(index);
        if element.text_track_mode(index) != Some(desired) {
            element.set_text_track_mode(index, desired);
            changed += 1;
        }
    }
    changed
}

pub fn policy_holds(element: &dyn MediaElement) -> bool {
    (0..element.text_track_count()).all(|i| element.text_track_mode(i) == Some(desired_mode(i)))
}

/// The mode toggles did not take: the first track is not showing or has no cues
fn toggles_ineffective(element: &dyn MediaElement) -> bool {
    element.text_track_count() > 0
        && (element.text_track_mode(0) != Some(TextTrackMode::Showing)
            || element.text_track_cue_count(0) == Some(0))
}

pub struct SubtitleSync {
    settle: Duration,
    stagger: Duration,
    load_timeout: Duration,
    reloading: AtomicBool,
}

impl SubtitleSync {
    pub fn new(settle: Duration, stagger: Duration, load_timeout: Duration) -> Self {
        Self {
            settle,
            stagger,
            load_timeout,
            reloading: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        Self::new(
            config.subtitle_settle(),
            config.subtitle_reload_stagger(),
            config.track_load_timeout(),
        )
    }

    /// Settle, apply the policy, and fall back to reloading tracks if needed
    pub async fn sync(&self, cell: &SessionCell, element: &Arc<dyn MediaElement>) -> SyncOutcome {
        tokio::time::sleep(self.settle).await;
        if cell.is_destroyed() {
            return SyncOutcome::Cancelled;
        }
        if element.text_track_count() == 0 {
            return SyncOutcome::NoTracks;
        }

        let changed = apply_policy(element.as_ref());
        if !toggles_ineffective(element.as_ref()) {
            return SyncOutcome::Applied { changed };
        }

        if self.reloading.swap(true, Ordering::SeqCst) {
            return SyncOutcome::ReloadInProgress;
        }
        debug!(tracks = element.text_track_count(), "First track has no cues, reloading tracks");
        let outcome = self.reload(cell, element).await;
        self.reloading.store(false, Ordering::SeqCst);
        outcome
    }

    async fn reload(&self, cell: &SessionCell, element: &Arc<dyn MediaElement>) -> SyncOutcome {
        let mut reloaded = 0;
        let mut failed = 0;

        for index in 0..element.text_track_count() {
            if index > 0 {
                tokio::time::sleep(self.stagger).await;
            }
            if cell.is_destroyed() {
                return SyncOutcome::Cancelled;
            }

            match tokio::time::timeout(self.load_timeout, element.reload_text_track(index)).await {
                Ok(Ok(())) => reloaded += 1,
                Ok(Err(e)) => {
                    warn!(track = index, error = %e, "Failed to reload subtitle track");
                    failed += 1;
                }
                Err(_) => {
                    warn!(track = index, timeout_ms = self.load_timeout.as_millis() as u64, "Subtitle track did not load");
                    failed += 1;
                }
            }

            if cell.is_destroyed() {
                return SyncOutcome::Cancelled;
            }
            apply_policy(element.as_ref());
        }

        if !policy_holds(element.as_ref()) {
            warn!("Subtitle track modes still off after reload");
        }
        SyncOutcome::Reloaded { reloaded, failed }
    }
}
