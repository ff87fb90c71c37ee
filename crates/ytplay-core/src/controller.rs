//! Playback controller - composes the session components
//!
//! Coordinates:
//! - File info loading, capability probing and source resolution
//! - Element and engine event dispatch
//! - The fallback state machine
//! - Subtitle sync, poster capture and media session mirroring
//! - Keyboard binding lifecycle and the close action
//!
//! Every continuation runs inside the session's [`TaskScope`]; destroying the
//! session aborts them all after the adaptive engine has been torn down.

use crate::{
    capability::{Capabilities, CapabilityProbe},
    endpoints::Endpoints,
    fallback::{FallbackMachine, FallbackOutcome},
    media_session::MediaSessionSync,
    platform::{MediaElement, Notifier, Platform},
    poster::{CaptureOutcome, PosterCapture},
    resolver::SourceResolver,
    scope::TaskScope,
    session::{PlaybackSession, SessionCell, SessionSnapshot},
    shortcuts::{CloseHandle, ShortcutBinding, ShortcutController, ShortcutTarget},
    subtitles::{SubtitleSync, SyncOutcome},
    types::*,
    Error, PlayerConfig, Result,
};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{broadcast, broadcast::error::RecvError, watch};
use tracing::{debug, error, info, instrument, warn};

/// Handle to the active playback session. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

struct Inner {
    config: PlayerConfig,
    caps: Capabilities,
    element: Arc<dyn MediaElement>,
    notifier: Arc<dyn Notifier>,
    shortcuts: Arc<dyn ShortcutController>,
    cell: SessionCell,
    fallback: FallbackMachine,
    subtitles: SubtitleSync,
    poster: PosterCapture,
    media_session: MediaSessionSync,
    scope: TaskScope,
    close: CloseHandle,
    help_overlay: Arc<watch::Sender<bool>>,
    binding: Mutex<Option<ShortcutBinding>>,
}

impl PlaybackController {
    /// Start a session for `item`.
    ///
    /// Fails when file info cannot be loaded; the message is shown through
    /// the notifier and a close is requested on `close`.
    #[instrument(skip_all, fields(file = %item.filename))]
    pub async fn mount(
        config: PlayerConfig,
        user_agent: &str,
        item: MediaItem,
        platform: Platform,
        close: CloseHandle,
    ) -> Result<Self> {
        config.validate()?;
        let caps = CapabilityProbe::from_user_agent(user_agent);

        let prepared = match platform.file_info.file_info(&item).await {
            Ok(info) => Self::prepare(&config, &caps, item, &info),
            Err(e) => Err(e),
        };
        let session = match prepared {
            Ok(session) => session,
            Err(e) => {
                error!(code = e.error_code(), error = %e, "Cannot start playback");
                platform.notifier.error(&e.to_string());
                close.request_close(CloseReason::Fatal(e.to_string()));
                return Err(e);
            }
        };

        let controller = Self::from_session(config, caps, session, platform, close);
        controller.start();
        Ok(controller)
    }

    fn prepare(
        config: &PlayerConfig,
        caps: &Capabilities,
        item: MediaItem,
        info: &FileInfo,
    ) -> Result<PlaybackSession> {
        let endpoints = Endpoints::new(config.base_url.clone());
        let resolved = SourceResolver::new(config).resolve(&item, info, caps)?;
        let manifest_url = endpoints.playlist(&item)?;
        let remote_thumbnail = item.extras.thumbnail.clone();

        let mut session = PlaybackSession::new(item, resolved, manifest_url);
        if let Some(remote) = remote_thumbnail.filter(|t| !t.is_empty()) {
            session.set_thumbnail_url(endpoints.thumbnail(&remote)?.to_string());
        }
        Ok(session)
    }

    fn from_session(
        config: PlayerConfig,
        caps: Capabilities,
        session: PlaybackSession,
        platform: Platform,
        close: CloseHandle,
    ) -> Self {
        let (help_tx, _) = watch::channel(false);
        let inner = Inner {
            fallback: FallbackMachine::new(platform.engines.clone(), config.engine.clone(), caps),
            subtitles: SubtitleSync::from_config(&config),
            poster: PosterCapture::new(config.poster_quality),
            media_session: MediaSessionSync::new(
                platform.media_session.clone(),
                platform.now_playing.clone(),
                platform.volume.clone(),
            ),
            config,
            caps,
            element: platform.element,
            notifier: platform.notifier,
            shortcuts: platform.shortcuts,
            cell: SessionCell::new(session),
            scope: TaskScope::new(),
            close,
            help_overlay: Arc::new(help_tx),
            binding: Mutex::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    fn start(&self) {
        let inner = &self.inner;
        let element = inner.element.as_ref();
        let (sources, tracks, thumbnail, title, id, mode) = inner.cell.with(|s| {
            (
                s.sources().to_vec(),
                s.tracks().to_vec(),
                s.thumbnail_url().map(str::to_string),
                s.item().display_title().to_string(),
                s.id(),
                s.mode(),
            )
        });

        inner.media_session.restore_volume(element, inner.config.default_volume);
        if let Some(thumbnail) = &thumbnail {
            element.set_poster(thumbnail);
        }
        // subscribe before the element can start emitting for the new sources
        self.spawn_media_pump();
        element.set_sources(&sources);
        element.set_tracks(&tracks);

        inner.media_session.announce(&title);
        inner.media_session.push_metadata(&inner.cell);

        self.spawn_subtitle_sync("mount");
        self.attach_shortcuts();

        info!(session_id = %id, mode = %mode, tracks = tracks.len(), "Playback session started");
    }

    // =========================================================================
    // Event handling
    // =========================================================================

    /// Handle an element event in the session scope without waiting for it
    pub fn dispatch_media_event(&self, event: MediaEvent) {
        let this = self.clone();
        self.inner.scope.spawn(async move {
            this.handle_media_event(event).await;
        });
    }

    /// Handle an engine event in the session scope without waiting for it
    pub fn dispatch_engine_event(&self, event: EngineEvent) {
        let this = self.clone();
        self.inner.scope.spawn(async move {
            this.handle_engine_event(event).await;
        });
    }

    pub async fn handle_media_event(&self, event: MediaEvent) {
        if self.inner.cell.is_destroyed() {
            return;
        }
        let inner = &self.inner;
        match event {
            MediaEvent::SourceError { index, message } => self.on_source_error(index, &message).await,
            MediaEvent::LoadedMetadata => {
                inner.media_session.push_position(&inner.cell, inner.element.as_ref());
                self.sync_subtitles("loadedmetadata").await;
            }
            MediaEvent::LoadedData | MediaEvent::Pause => self.capture_poster().await,
            MediaEvent::DurationChange | MediaEvent::RateChange | MediaEvent::Seeked => {
                inner.media_session.push_position(&inner.cell, inner.element.as_ref());
            }
            MediaEvent::VolumeChange => inner.media_session.persist_volume(inner.element.as_ref()),
            MediaEvent::Play => {}
        }
    }

    pub async fn handle_engine_event(&self, event: EngineEvent) {
        if self.inner.cell.is_destroyed() {
            return;
        }
        match event {
            EngineEvent::ManifestParsed => self.sync_subtitles("manifest_parsed").await,
            EngineEvent::MediaAttached => self.sync_subtitles("media_attached").await,
            EngineEvent::Error { fatal: true, details } => {
                self.report_engine_failure(&Error::EngineFatal(details));
            }
            EngineEvent::Error { fatal: false, details } => {
                debug!(details = %details, "Recoverable HLS error");
            }
        }
    }

    async fn on_source_error(&self, index: usize, message: &str) {
        let inner = &self.inner;
        debug!(index, message, "Media source error");
        match inner.fallback.on_source_error(&inner.cell, &inner.element, index).await {
            Ok(FallbackOutcome::Engaged { events }) => {
                warn!(index, message, "Direct playback failed, falling back to HLS");
                self.spawn_engine_pump(events);
            }
            Ok(outcome) => debug!(?outcome, "Source error did not trigger fallback"),
            Err(e) => self.report_engine_failure(&e),
        }
    }

    /// Report the first terminal streaming failure; later ones are only logged
    fn report_engine_failure(&self, err: &Error) {
        let first = self
            .inner
            .cell
            .with(|s| !s.is_destroyed() && s.record_engine_failure(err.to_string()));
        if first {
            error!(code = err.error_code(), error = %err, "Streaming playback failed");
            self.inner.notifier.error(&err.to_string());
        } else {
            debug!(error = %err, "Further streaming failure ignored");
        }
    }

    async fn sync_subtitles(&self, trigger: &'static str) {
        let inner = &self.inner;
        let outcome = inner.subtitles.sync(&inner.cell, &inner.element).await;
        match outcome {
            SyncOutcome::Reloaded { failed, .. } if failed > 0 => {
                warn!(trigger, ?outcome, "Subtitle tracks partially reloaded");
            }
            _ => debug!(trigger, ?outcome, "Subtitle sync"),
        }
    }

    async fn capture_poster(&self) {
        let inner = &self.inner;
        if let CaptureOutcome::Captured(data_url) = inner.poster.capture_once(&inner.cell, &inner.element).await {
            inner.element.set_poster(&data_url);
            inner.media_session.push_metadata(&inner.cell);
        }
    }

    // =========================================================================
    // Pumps
    // =========================================================================

    fn spawn_media_pump(&self) {
        let events = self.inner.element.subscribe();
        let weak = Arc::downgrade(&self.inner);
        self.inner.scope.spawn(pump(events, weak, "media", |controller, event| {
            controller.dispatch_media_event(event)
        }));
    }

    fn spawn_engine_pump(&self, events: broadcast::Receiver<EngineEvent>) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scope.spawn(pump(events, weak, "engine", |controller, event| {
            controller.dispatch_engine_event(event)
        }));
    }

    fn spawn_subtitle_sync(&self, trigger: &'static str) {
        let this = self.clone();
        self.inner.scope.spawn(async move {
            this.sync_subtitles(trigger).await;
        });
    }

    fn attach_shortcuts(&self) {
        let inner = &self.inner;
        let binding = inner.shortcuts.attach(ShortcutTarget {
            element: inner.element.clone(),
            enabled: inner.config.shortcuts_enabled,
            close: inner.close.clone(),
        });

        let mut help = binding.help_visible();
        let overlay = inner.help_overlay.clone();
        overlay.send_replace(*help.borrow_and_update());
        inner.scope.spawn(async move {
            while help.changed().await.is_ok() {
                let visible = *help.borrow_and_update();
                overlay.send_replace(visible);
            }
        });

        *inner.binding.lock().unwrap_or_else(|e| e.into_inner()) = Some(binding);
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Switch to HLS on user request
    pub fn force_adaptive_streaming(&self) -> Result<()> {
        let inner = &self.inner;
        match inner.fallback.force(&inner.cell, &inner.element) {
            Ok(events) => {
                info!("HLS streaming forced by user");
                self.spawn_engine_pump(events);
                Ok(())
            }
            Err(e @ (Error::EngineConstruction(_) | Error::EngineFatal(_))) => {
                self.report_engine_failure(&e);
                Err(e)
            }
            Err(e) => {
                if e.is_user_visible() {
                    inner.notifier.error(&e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Close the player (the action handed to the keyboard layer)
    pub fn request_close(&self) {
        self.inner.close.request_close(CloseReason::User);
    }

    /// Tear the session down. Idempotent.
    pub fn destroy(&self) {
        self.inner.teardown();
    }

    // =========================================================================
    // Observers
    // =========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.cell.snapshot()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.caps
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.cell.is_destroyed()
    }

    /// Help overlay visibility, mirrored from the keyboard layer
    pub fn help_overlay(&self) -> watch::Receiver<bool> {
        self.inner.help_overlay.subscribe()
    }

    pub fn close_requests(&self) -> watch::Receiver<Option<CloseReason>> {
        self.inner.close.subscribe()
    }
}

impl Inner {
    fn teardown(&self) {
        if !self.cell.with(|s| s.destroy()) {
            return;
        }
        // the engine goes first so segment fetches stop right away
        let had_engine = self.fallback.teardown(&self.cell);
        self.scope.close();
        if let Some(mut binding) = self.binding.lock().unwrap_or_else(|e| e.into_inner()).take() {
            binding.detach();
        }
        self.help_overlay.send_replace(false);
        self.media_session.clear();

        let snapshot = self.cell.snapshot();
        info!(
            session_id = %snapshot.id,
            had_engine,
            mode = %snapshot.mode,
            "Playback session destroyed"
        );
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn pump<E, F>(mut events: broadcast::Receiver<E>, weak: Weak<Inner>, source: &'static str, dispatch: F)
where
    E: Clone + Send + 'static,
    F: Fn(&PlaybackController, E) + Send + 'static,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                dispatch(&PlaybackController { inner }, event);
            }
            Err(RecvError::Lagged(skipped)) => warn!(source, skipped, "Event pump lagged"),
            Err(RecvError::Closed) => break,
        }
    }
    debug!(source, "Event pump stopped");
}
