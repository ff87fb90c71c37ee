//! In-memory platform doubles
//!
//! Used by the crate's own tests and by hosts that want to drive a session
//! without a browser. Every double records what the controller did to it.

use crate::{
    client::FileInfoClient,
    platform::{
        AdaptiveEngine, AdaptiveEngineFactory, MediaElement, MediaSession, MemoryVolumeStore,
        Notifier, NowPlaying, Platform,
    },
    shortcuts::{CloseHandle, ShortcutBinding, ShortcutController, ShortcutTarget},
    types::*,
    AdaptiveEngineConfig, Error, Result,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch, Notify};
use url::Url;

const EVENT_CAPACITY: usize = 64;

/// Cue count tracks report once loaded
pub const LOADED_CUES: usize = 10;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Media element
// =============================================================================

#[derive(Debug, Clone)]
struct FakeTrack {
    mode: TextTrackMode,
    cues: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReloadBehavior {
    Load,
    Fail,
    Hang,
}

#[derive(Debug)]
struct ElementState {
    sources: Vec<PlaybackSource>,
    declared_tracks: Vec<TrackSpec>,
    tracks: Vec<FakeTrack>,
    initial_cues: Option<usize>,
    poster: Option<String>,
    paused: bool,
    has_metadata: bool,
    dimensions: (u32, u32),
    duration: f64,
    current_time: f64,
    playback_rate: f64,
    volume: f64,
    mode_writes: usize,
    detaches: usize,
    reloads: Vec<usize>,
    reload_behavior: ReloadBehavior,
    captures: usize,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            declared_tracks: Vec::new(),
            tracks: Vec::new(),
            initial_cues: Some(LOADED_CUES),
            poster: None,
            paused: true,
            has_metadata: false,
            dimensions: (0, 0),
            duration: f64::NAN,
            current_time: 0.0,
            playback_rate: 1.0,
            volume: 1.0,
            mode_writes: 0,
            detaches: 0,
            reloads: Vec::new(),
            reload_behavior: ReloadBehavior::Load,
            captures: 0,
        }
    }
}

/// Scriptable media element
pub struct FakeElement {
    events: broadcast::Sender<MediaEvent>,
    state: Mutex<ElementState>,
    capture_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeElement {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            events,
            state: Mutex::new(ElementState::default()),
            capture_gate: Mutex::new(None),
        }
    }

    /// Hold every frame grab until [`FakeElement::release_capture`]
    pub fn with_capture_gate(self) -> Self {
        *lock(&self.capture_gate) = Some(Arc::new(Notify::new()));
        self
    }

    pub fn release_capture(&self) {
        if let Some(gate) = lock(&self.capture_gate).as_ref() {
            gate.notify_one();
        }
    }

    /// Fire an element event at the subscribers
    pub fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }

    fn state(&self) -> MutexGuard<'_, ElementState> {
        lock(&self.state)
    }

    // Scripting

    pub fn add_tracks(&self, count: usize) {
        let mut state = self.state();
        let cues = state.initial_cues;
        state.tracks.extend((0..count).map(|_| FakeTrack {
            mode: TextTrackMode::Disabled,
            cues,
        }));
    }

    /// Cue count new tracks report before any reload
    pub fn set_initial_cues(&self, cues: Option<usize>) {
        self.state().initial_cues = cues;
    }

    pub fn set_track_cues(&self, index: usize, cues: Option<usize>) {
        if let Some(track) = self.state().tracks.get_mut(index) {
            track.cues = cues;
        }
    }

    /// Change a mode the way the engine would, without counting a write
    pub fn force_track_mode(&self, index: usize, mode: TextTrackMode) {
        if let Some(track) = self.state().tracks.get_mut(index) {
            track.mode = mode;
        }
    }

    pub fn fail_reloads(&self) {
        self.state().reload_behavior = ReloadBehavior::Fail;
    }

    /// Re-inserted tracks never report their cues
    pub fn hang_reloads(&self) {
        self.state().reload_behavior = ReloadBehavior::Hang;
    }

    pub fn set_paused(&self, paused: bool) {
        self.state().paused = paused;
    }

    pub fn set_has_metadata(&self, has_metadata: bool) {
        self.state().has_metadata = has_metadata;
    }

    pub fn set_video_dimensions(&self, width: u32, height: u32) {
        self.state().dimensions = (width, height);
    }

    pub fn set_duration(&self, duration: f64) {
        self.state().duration = duration;
    }

    pub fn set_current_time(&self, time: f64) {
        self.state().current_time = time;
    }

    pub fn set_playback_rate(&self, rate: f64) {
        self.state().playback_rate = rate;
    }

    // Inspection

    pub fn sources(&self) -> Vec<PlaybackSource> {
        self.state().sources.clone()
    }

    pub fn declared_tracks(&self) -> Vec<TrackSpec> {
        self.state().declared_tracks.clone()
    }

    pub fn track_modes(&self) -> Vec<TextTrackMode> {
        self.state().tracks.iter().map(|t| t.mode).collect()
    }

    pub fn mode_writes(&self) -> usize {
        self.state().mode_writes
    }

    pub fn poster(&self) -> Option<String> {
        self.state().poster.clone()
    }

    pub fn detach_count(&self) -> usize {
        self.state().detaches
    }

    /// Track indices in the order they were reloaded
    pub fn reloads(&self) -> Vec<usize> {
        self.state().reloads.clone()
    }

    pub fn capture_count(&self) -> usize {
        self.state().captures
    }
}

impl Default for FakeElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for FakeElement {
    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }

    fn set_sources(&self, sources: &[PlaybackSource]) {
        self.state().sources = sources.to_vec();
    }

    fn set_tracks(&self, tracks: &[TrackSpec]) {
        let mut state = self.state();
        let cues = state.initial_cues;
        state.declared_tracks = tracks.to_vec();
        state.tracks = tracks
            .iter()
            .map(|_| FakeTrack {
                mode: TextTrackMode::Disabled,
                cues,
            })
            .collect();
    }

    fn detach_sources(&self) {
        let mut state = self.state();
        state.sources.clear();
        state.detaches += 1;
    }

    fn set_poster(&self, url: &str) {
        self.state().poster = Some(url.to_string());
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }

    fn has_metadata(&self) -> bool {
        self.state().has_metadata
    }

    fn video_dimensions(&self) -> (u32, u32) {
        self.state().dimensions
    }

    fn duration(&self) -> f64 {
        self.state().duration
    }

    fn current_time(&self) -> f64 {
        self.state().current_time
    }

    fn playback_rate(&self) -> f64 {
        self.state().playback_rate
    }

    fn volume(&self) -> f64 {
        self.state().volume
    }

    fn set_volume(&self, volume: f64) {
        self.state().volume = volume;
    }

    fn text_track_count(&self) -> usize {
        self.state().tracks.len()
    }

    fn text_track_mode(&self, index: usize) -> Option<TextTrackMode> {
        self.state().tracks.get(index).map(|t| t.mode)
    }

    fn set_text_track_mode(&self, index: usize, mode: TextTrackMode) {
        let mut state = self.state();
        if let Some(track) = state.tracks.get_mut(index) {
            track.mode = mode;
            state.mode_writes += 1;
        }
    }

    fn text_track_cue_count(&self, index: usize) -> Option<usize> {
        self.state().tracks.get(index).and_then(|t| t.cues)
    }

    async fn reload_text_track(&self, index: usize) -> Result<()> {
        let behavior = {
            let mut state = self.state();
            if index >= state.tracks.len() {
                return Err(Error::Subtitle(format!("no track at index {}", index)));
            }
            state.reloads.push(index);
            state.reload_behavior
        };

        match behavior {
            ReloadBehavior::Load => {
                // a re-inserted track comes back disabled with its cues
                let mut state = self.state();
                if let Some(track) = state.tracks.get_mut(index) {
                    track.mode = TextTrackMode::Disabled;
                    track.cues = Some(LOADED_CUES);
                }
                Ok(())
            }
            ReloadBehavior::Fail => Err(Error::Subtitle(format!("track {} failed to load", index))),
            ReloadBehavior::Hang => std::future::pending().await,
        }
    }

    async fn capture_frame(&self) -> Option<VideoFrame> {
        self.state().captures += 1;
        let gate = lock(&self.capture_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let (width, height) = self.state().dimensions;
        if width == 0 || height == 0 {
            return None;
        }
        Some(VideoFrame {
            width,
            height,
            rgba: [16u8, 64, 128, 255].repeat(width as usize * height as usize),
        })
    }
}

// =============================================================================
// Adaptive engine
// =============================================================================

#[derive(Debug, Default)]
struct EngineState {
    loaded: Vec<Url>,
    attach_count: usize,
    destroyed: bool,
    fail_attach: bool,
}

struct EngineInner {
    events: broadcast::Sender<EngineEvent>,
    state: Mutex<EngineState>,
}

/// Engine double; clones share state so tests can keep a handle
#[derive(Clone)]
pub struct FakeEngine {
    inner: Arc<EngineInner>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(EngineInner {
                events,
                state: Mutex::new(EngineState::default()),
            }),
        }
    }
}

impl FakeEngine {
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.inner.events.send(event);
    }

    pub fn loaded(&self) -> Vec<Url> {
        lock(&self.inner.state).loaded.clone()
    }

    pub fn attach_count(&self) -> usize {
        lock(&self.inner.state).attach_count
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.inner.state).destroyed
    }
}

impl AdaptiveEngine for FakeEngine {
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    fn load_source(&self, manifest: &Url) -> Result<()> {
        lock(&self.inner.state).loaded.push(manifest.clone());
        Ok(())
    }

    fn attach_media(&self, _element: Arc<dyn MediaElement>) -> Result<()> {
        let mut state = lock(&self.inner.state);
        if state.fail_attach {
            return Err(Error::EngineFatal("media source attach failed".to_string()));
        }
        state.attach_count += 1;
        Ok(())
    }

    fn destroy(&self) {
        lock(&self.inner.state).destroyed = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactoryBehavior {
    Build,
    FailConstruction,
    FailAttach,
}

/// Records every engine it builds
pub struct FakeEngineFactory {
    behavior: FactoryBehavior,
    engines: Mutex<Vec<FakeEngine>>,
    configs: Mutex<Vec<AdaptiveEngineConfig>>,
}

impl FakeEngineFactory {
    fn with_behavior(behavior: FactoryBehavior) -> Self {
        Self {
            behavior,
            engines: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_behavior(FactoryBehavior::Build)
    }

    /// Every construction fails, as without Media Source Extensions
    pub fn failing() -> Self {
        Self::with_behavior(FactoryBehavior::FailConstruction)
    }

    /// Engines build but refuse to attach
    pub fn failing_attach() -> Self {
        Self::with_behavior(FactoryBehavior::FailAttach)
    }

    pub fn created(&self) -> usize {
        lock(&self.engines).len()
    }

    pub fn engine(&self, index: usize) -> Option<FakeEngine> {
        lock(&self.engines).get(index).cloned()
    }

    /// Configs passed to construction, failed attempts included
    pub fn configs(&self) -> Vec<AdaptiveEngineConfig> {
        lock(&self.configs).clone()
    }
}

impl Default for FakeEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveEngineFactory for FakeEngineFactory {
    fn create(&self, config: &AdaptiveEngineConfig) -> Result<Box<dyn AdaptiveEngine>> {
        lock(&self.configs).push(config.clone());
        if self.behavior == FactoryBehavior::FailConstruction {
            return Err(Error::EngineConstruction("HLS is not supported here".to_string()));
        }
        let engine = FakeEngine::default();
        lock(&engine.inner.state).fail_attach = self.behavior == FactoryBehavior::FailAttach;
        lock(&self.engines).push(engine.clone());
        Ok(Box::new(engine))
    }
}

// =============================================================================
// Host surfaces
// =============================================================================

#[derive(Default)]
pub struct FakeMediaSession {
    failing: Mutex<bool>,
    metadata: Mutex<Vec<MediaMetadata>>,
    positions: Mutex<Vec<PositionState>>,
    clears: AtomicUsize,
}

impl FakeMediaSession {
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn metadata(&self) -> Vec<MediaMetadata> {
        lock(&self.metadata).clone()
    }

    pub fn positions(&self) -> Vec<PositionState> {
        lock(&self.positions).clone()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if *lock(&self.failing) {
            return Err(Error::Platform("media session unavailable".to_string()));
        }
        Ok(())
    }
}

impl MediaSession for FakeMediaSession {
    fn set_metadata(&self, metadata: &MediaMetadata) -> Result<()> {
        self.check()?;
        lock(&self.metadata).push(metadata.clone());
        Ok(())
    }

    fn set_position_state(&self, state: &PositionState) -> Result<()> {
        self.check()?;
        lock(&self.positions).push(*state);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check()?;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNowPlaying {
    title: Mutex<Option<String>>,
}

impl FakeNowPlaying {
    pub fn title(&self) -> Option<String> {
        lock(&self.title).clone()
    }
}

impl NowPlaying for FakeNowPlaying {
    fn set_now_playing(&self, title: &str) {
        *lock(&self.title) = Some(title.to_string());
    }

    fn clear(&self) {
        *lock(&self.title) = None;
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        lock(&self.warnings).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        lock(&self.errors).push(message.to_string());
    }

    fn warning(&self, message: &str) {
        lock(&self.warnings).push(message.to_string());
    }
}

/// Keyboard layer double
pub struct FakeShortcuts {
    help: watch::Sender<bool>,
    attaches: AtomicUsize,
    detaches: Arc<AtomicUsize>,
    target: Mutex<Option<ShortcutTarget>>,
}

impl Default for FakeShortcuts {
    fn default() -> Self {
        let (help, _) = watch::channel(false);
        Self {
            help,
            attaches: AtomicUsize::new(0),
            detaches: Arc::new(AtomicUsize::new(0)),
            target: Mutex::new(None),
        }
    }
}

impl FakeShortcuts {
    /// Toggle the help overlay as the `?` key would
    pub fn set_help(&self, visible: bool) {
        self.help.send_replace(visible);
    }

    /// Press Escape: close through the handed-over action
    pub fn press_escape(&self) {
        if let Some(target) = lock(&self.target).as_ref() {
            target.close.request_close(CloseReason::User);
        }
    }

    pub fn attaches(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn detaches(&self) -> usize {
        self.detaches.load(Ordering::SeqCst)
    }

    pub fn last_enabled(&self) -> Option<bool> {
        lock(&self.target).as_ref().map(|t| t.enabled)
    }
}

impl ShortcutController for FakeShortcuts {
    fn attach(&self, target: ShortcutTarget) -> ShortcutBinding {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        *lock(&self.target) = Some(target);
        let detaches = self.detaches.clone();
        ShortcutBinding::new(self.help.subscribe(), move || {
            detaches.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// File-info client with a canned answer
pub struct StaticFileInfo {
    response: std::result::Result<FileInfo, (u16, String)>,
    calls: AtomicUsize,
}

impl StaticFileInfo {
    pub fn ok(info: FileInfo) -> Self {
        Self {
            response: Ok(info),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            response: Err((status, message.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileInfoClient for StaticFileInfo {
    async fn file_info(&self, _item: &MediaItem) -> Result<FileInfo> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(info) => Ok(info.clone()),
            Err((status, message)) => Err(Error::FileInfo {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

// =============================================================================
// Bundle
// =============================================================================

/// Every double wired together, with typed handles kept for assertions
pub struct TestPlatform {
    pub element: Arc<FakeElement>,
    pub engines: Arc<FakeEngineFactory>,
    pub media_session: Arc<FakeMediaSession>,
    pub now_playing: Arc<FakeNowPlaying>,
    pub notifier: Arc<RecordingNotifier>,
    pub volume: Arc<MemoryVolumeStore>,
    pub shortcuts: Arc<FakeShortcuts>,
    pub file_info: Arc<StaticFileInfo>,
    pub close: CloseHandle,
}

impl TestPlatform {
    pub fn new(file_info: StaticFileInfo) -> Self {
        Self {
            element: Arc::new(FakeElement::new()),
            engines: Arc::new(FakeEngineFactory::new()),
            media_session: Arc::new(FakeMediaSession::default()),
            now_playing: Arc::new(FakeNowPlaying::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            volume: Arc::new(MemoryVolumeStore::new()),
            shortcuts: Arc::new(FakeShortcuts::default()),
            file_info: Arc::new(file_info),
            close: CloseHandle::new(),
        }
    }

    pub fn with_info(info: FileInfo) -> Self {
        Self::new(StaticFileInfo::ok(info))
    }

    pub fn with_element(mut self, element: FakeElement) -> Self {
        self.element = Arc::new(element);
        self
    }

    pub fn with_engines(mut self, engines: FakeEngineFactory) -> Self {
        self.engines = Arc::new(engines);
        self
    }

    pub fn platform(&self) -> Platform {
        Platform {
            element: self.element.clone(),
            engines: self.engines.clone(),
            media_session: self.media_session.clone(),
            now_playing: self.now_playing.clone(),
            notifier: self.notifier.clone(),
            volume: self.volume.clone(),
            shortcuts: self.shortcuts.clone(),
            file_info: self.file_info.clone(),
        }
    }
}

/// File info for a file with one probed video stream
pub fn video_file_info(mimetype: &str) -> FileInfo {
    FileInfo {
        mimetype: Some(mimetype.to_string()),
        ffprobe: Some(ProbeResult {
            streams: vec![
                ProbeStream {
                    codec_type: "video".to_string(),
                    codec_name: Some("h264".to_string()),
                },
                ProbeStream {
                    codec_type: "audio".to_string(),
                    codec_name: Some("aac".to_string()),
                },
            ],
        }),
        ..Default::default()
    }
}

/// File info for an audio-only file
pub fn audio_file_info(mimetype: &str) -> FileInfo {
    FileInfo {
        mimetype: Some(mimetype.to_string()),
        ffprobe: Some(ProbeResult {
            streams: vec![ProbeStream {
                codec_type: "audio".to_string(),
                codec_name: Some("opus".to_string()),
            }],
        }),
        ..Default::default()
    }
}

/// Attach subtitle sidecars to a file-info response
pub fn with_subtitles(mut info: FileInfo, langs: &[&str]) -> FileInfo {
    info.sidecar.subtitle = langs
        .iter()
        .map(|lang| SubtitleSidecar {
            file: format!("subs.{}.vtt", lang),
            lang: lang.to_string(),
            name: String::new(),
        })
        .collect();
    info
}
