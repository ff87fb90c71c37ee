//! Playback fallback state machine
//!
//! `Direct` playback of the raw file switches to the adaptive streaming
//! engine on the first qualifying source error. The switch happens at most
//! once per session and is never undone.
//!
//! ```text
//!   Direct ──source error──▶ AdaptiveStreaming(Engine)
//!     │                              ▲
//!     └──force_adaptive_streaming────┘
//!
//!   AdaptiveStreaming(NativeManifest)   (Apple-family start, terminal)
//! ```

use crate::{
    capability::Capabilities,
    platform::{AdaptiveEngineFactory, MediaElement},
    session::SessionCell,
    types::*,
    AdaptiveEngineConfig, Error, Result,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Why a source error did not lead to a fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Destroyed,
    /// No source at the reported index
    UnknownSource,
    /// Apple-family engine paused for buffering on its own HLS pipeline
    NativeHlsPause,
    /// The adaptive path already failed for this session
    EngineFailed,
}

#[derive(Debug)]
pub enum FallbackOutcome {
    /// An engine was attached; its events should be pumped
    Engaged { events: broadcast::Receiver<EngineEvent> },
    AlreadyAdaptive,
    Skipped(SkipReason),
}

pub struct FallbackMachine {
    engines: Arc<dyn AdaptiveEngineFactory>,
    config: AdaptiveEngineConfig,
    caps: Capabilities,
}

impl FallbackMachine {
    pub fn new(
        engines: Arc<dyn AdaptiveEngineFactory>,
        config: AdaptiveEngineConfig,
        caps: Capabilities,
    ) -> Self {
        Self {
            engines,
            config,
            caps,
        }
    }

    /// Handle a source error event for the source at `index`
    ///
    /// A failing manifest source has nothing left to fall back to and comes
    /// back as `Error::SourceError`, to be reported like a terminal engine
    /// failure.
    pub async fn on_source_error(
        &self,
        cell: &SessionCell,
        element: &Arc<dyn MediaElement>,
        index: usize,
    ) -> Result<FallbackOutcome> {
        let (source, adaptive, failed) = match cell.with_active(|s| {
            let source = s.sources().get(index).map(|src| (src.on_error, src.url.clone()));
            let adaptive = s.mode().is_adaptive() || s.engine().is_installed();
            (source, adaptive, s.engine_failure().is_some())
        }) {
            Ok(state) => state,
            Err(_) => return Ok(FallbackOutcome::Skipped(SkipReason::Destroyed)),
        };

        match source {
            Some((SourceErrorAction::Report, url)) => {
                if failed {
                    return Ok(FallbackOutcome::Skipped(SkipReason::EngineFailed));
                }
                if self.is_native_hls_pause(element).await {
                    return Ok(FallbackOutcome::Skipped(SkipReason::NativeHlsPause));
                }
                if cell.is_destroyed() {
                    return Ok(FallbackOutcome::Skipped(SkipReason::Destroyed));
                }
                Err(Error::SourceError(url.to_string()))
            }
            _ if adaptive => Ok(FallbackOutcome::AlreadyAdaptive),
            _ if failed => Ok(FallbackOutcome::Skipped(SkipReason::EngineFailed)),
            Some((SourceErrorAction::FallbackToAdaptive, _)) => {
                if self.is_native_hls_pause(element).await {
                    return Ok(FallbackOutcome::Skipped(SkipReason::NativeHlsPause));
                }
                self.engage(cell, element)
            }
            None => Ok(FallbackOutcome::Skipped(SkipReason::UnknownSource)),
        }
    }

    /// Apple-family engines raise errors while paused for buffering on their own HLS pipeline
    async fn is_native_hls_pause(&self, element: &Arc<dyn MediaElement>) -> bool {
        // error and pause events race; let the element settle first
        tokio::task::yield_now().await;

        if self.caps.prefer_native_hls && element.is_paused() && element.has_metadata() {
            debug!("Source error while paused on native HLS, ignoring");
            return true;
        }
        false
    }

    /// User-requested switch to adaptive streaming
    pub fn force(
        &self,
        cell: &SessionCell,
        element: &Arc<dyn MediaElement>,
    ) -> Result<broadcast::Receiver<EngineEvent>> {
        let (mode, has_video, failure) = cell.with_active(|s| {
            (
                s.mode(),
                s.profile().has_video_stream,
                s.engine_failure().map(str::to_string),
            )
        })?;
        if mode.is_adaptive() {
            return Err(Error::AlreadyAdaptive);
        }
        if !has_video {
            return Err(Error::AudioOnlyFallback);
        }
        if let Some(details) = failure {
            return Err(Error::EngineFatal(details));
        }

        match self.engage(cell, element)? {
            FallbackOutcome::Engaged { events } => Ok(events),
            FallbackOutcome::AlreadyAdaptive => Err(Error::AlreadyAdaptive),
            FallbackOutcome::Skipped(_) => Err(Error::SessionDestroyed),
        }
    }

    /// Check, construct, attach and flip the mode under one lock acquisition
    fn engage(&self, cell: &SessionCell, element: &Arc<dyn MediaElement>) -> Result<FallbackOutcome> {
        cell.with(|s| {
            if s.is_destroyed() {
                return Ok(FallbackOutcome::Skipped(SkipReason::Destroyed));
            }
            if s.mode().is_adaptive() || s.engine().is_installed() {
                return Ok(FallbackOutcome::AlreadyAdaptive);
            }

            let manifest = s.manifest_url().clone();
            let engines = &self.engines;
            let config = &self.config;
            let engine = s.engine_mut().construct_with(|| {
                engines.create(config).map_err(|e| match e {
                    Error::EngineConstruction(_) => e,
                    other => Error::EngineConstruction(other.to_string()),
                })
            })?;

            let events = engine.subscribe();
            element.detach_sources();
            let attached = engine
                .load_source(&manifest)
                .and_then(|_| engine.attach_media(element.clone()));
            s.enter_adaptive(AdaptiveOrigin::Engine)?;

            if let Err(e) = attached {
                return Err(Error::EngineFatal(e.to_string()));
            }

            info!(manifest = %manifest, "Switched to HLS streaming");
            Ok(FallbackOutcome::Engaged { events })
        })
    }

    /// Destroy the engine, if any. Returns true if one was destroyed.
    pub fn teardown(&self, cell: &SessionCell) -> bool {
        let engine = cell.with(|s| s.engine_mut().take());
        match engine {
            Some(engine) => {
                engine.destroy();
                true
            }
            None => false,
        }
    }
}
