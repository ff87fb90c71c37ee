//! Integration tests for ytplay Core

use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use ytplay_core::{
    poster::{CaptureOutcome, PosterCapture},
    testing::*,
    AdaptiveOrigin, CloseReason, EngineEvent, Error, MediaElement, MediaEvent, MediaItem,
    PlaybackController, PlaybackMode, PlaybackSession, PlayerConfig, SessionCell,
    SourceResolver, CapabilityProbe, SubtitleSync, SyncOutcome, TextTrackMode, VolumeStore,
    HLS_MIME_TYPE,
};

const CHROME_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
const SAFARI_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

async fn mount(tp: &TestPlatform, user_agent: &str, item: MediaItem) -> PlaybackController {
    PlaybackController::mount(
        PlayerConfig::default(),
        user_agent,
        item,
        tp.platform(),
        tp.close.clone(),
    )
    .await
    .expect("mount failed")
}

/// Let spawned handlers run; time is paused so this costs nothing
async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Poll on the real clock, for paths that cross the blocking pool
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// =============================================================================
// Source resolution
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_direct_source_off_apple() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.sources.len(), 1);
    assert_eq!(snapshot.sources[0].mime_type, "video/mp4");
    assert!(snapshot.sources[0].url.path().starts_with("/api/download/"));
    assert!(!snapshot.using_adaptive_streaming);
    assert_eq!(tp.element.sources(), snapshot.sources);
    assert_eq!(tp.file_info.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manifest_source_on_apple() {
    let tp = TestPlatform::with_info(video_file_info("video/x-matroska"));
    let controller = mount(&tp, SAFARI_UA, MediaItem::new("talk.mkv")).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.sources.len(), 1);
    assert_eq!(snapshot.sources[0].mime_type, HLS_MIME_TYPE);
    assert!(snapshot.using_adaptive_streaming);
    assert_eq!(
        snapshot.mode,
        PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::NativeManifest)
    );

    // a failing manifest source never brings up a second pipeline
    tp.element.emit(MediaEvent::SourceError {
        index: 0,
        message: "MEDIA_ERR_NETWORK".into(),
    });
    settle(10).await;
    assert_eq!(tp.engines.created(), 0);
    assert!(matches!(
        controller.force_adaptive_streaming(),
        Err(Error::AlreadyAdaptive)
    ));
    assert_eq!(tp.engines.created(), 0);
    assert!(controller.snapshot().using_adaptive_streaming);
}

#[tokio::test(start_paused = true)]
async fn test_manifest_source_error_reported_once() {
    let tp = TestPlatform::with_info(video_file_info("video/x-matroska"));
    let controller = mount(&tp, SAFARI_UA, MediaItem::new("talk.mkv")).await;

    for _ in 0..2 {
        tp.element.emit(MediaEvent::SourceError {
            index: 0,
            message: "MEDIA_ERR_NETWORK".into(),
        });
    }
    settle(50).await;

    let errors = tp.notifier.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains(".m3u8"));
    let snapshot = controller.snapshot();
    assert!(snapshot.engine_failure.is_some());
    assert_eq!(
        snapshot.mode,
        PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::NativeManifest)
    );
    assert_eq!(tp.engines.created(), 0);
    assert!(!controller.is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn test_manifest_source_error_while_buffering_is_silent() {
    let tp = TestPlatform::with_info(video_file_info("video/x-matroska"));
    let controller = mount(&tp, SAFARI_UA, MediaItem::new("talk.mkv")).await;
    tp.element.set_paused(true);
    tp.element.set_has_metadata(true);

    tp.element.emit(MediaEvent::SourceError {
        index: 0,
        message: "MEDIA_ERR_NETWORK".into(),
    });
    settle(50).await;

    assert!(tp.notifier.errors().is_empty());
    assert!(controller.snapshot().engine_failure.is_none());
}

#[test]
fn test_resolver_keeps_sidecar_order() {
    let config = PlayerConfig::default();
    let info = with_subtitles(video_file_info("video/mp4"), &["en", "de", "fr"]);
    let item = MediaItem::new("talk.mp4").with_folder("talks");
    let caps = CapabilityProbe::from_user_agent(CHROME_UA);

    let resolved = assert_ok!(SourceResolver::new(&config).resolve(&item, &info, &caps));
    let langs: Vec<_> = resolved.tracks.iter().map(|t| t.lang.as_str()).collect();
    assert_eq!(langs, ["en", "de", "fr"]);
    assert!(resolved.tracks[0]
        .file_url
        .path()
        .starts_with("/api/player/subtitle/talks/"));
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_source_error_falls_back_once() {
    let tp = TestPlatform::with_info(video_file_info("video/x-matroska"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mkv")).await;
    assert!(!controller.snapshot().using_adaptive_streaming);

    tp.element.emit(MediaEvent::SourceError {
        index: 0,
        message: "MEDIA_ERR_SRC_NOT_SUPPORTED".into(),
    });
    settle(1).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.mode, PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::Engine));
    assert_eq!(tp.engines.created(), 1);
    assert_eq!(tp.element.detach_count(), 1);
    let engine = tp.engines.engine(0).unwrap();
    assert_eq!(engine.attach_count(), 1);
    assert!(engine.loaded()[0].path().ends_with("talk.mkv.m3u8"));

    for _ in 0..3 {
        tp.element.emit(MediaEvent::SourceError {
            index: 0,
            message: "again".into(),
        });
    }
    settle(10).await;
    assert_eq!(tp.engines.created(), 1);
    assert_eq!(controller.snapshot().engines_constructed, 1);
    assert!(tp.notifier.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_native_hls_pause_does_not_fall_back() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, SAFARI_UA, MediaItem::new("talk.mp4")).await;
    assert_eq!(controller.snapshot().mode, PlaybackMode::Direct);

    tp.element.set_paused(true);
    tp.element.set_has_metadata(true);
    tp.element.emit(MediaEvent::SourceError {
        index: 0,
        message: "stalled".into(),
    });
    settle(10).await;

    assert_eq!(tp.engines.created(), 0);
    assert!(!controller.snapshot().using_adaptive_streaming);
}

#[tokio::test(start_paused = true)]
async fn test_force_rejects_audio_only() {
    let tp = TestPlatform::with_info(audio_file_info("audio/mpeg"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("song.mp3")).await;
    let before = controller.snapshot();
    assert!(before.is_audio_only);

    let err = assert_err!(controller.force_adaptive_streaming());
    assert!(matches!(err, Error::AudioOnlyFallback));
    assert_eq!(tp.notifier.errors(), vec![err.to_string()]);
    assert_eq!(controller.snapshot(), before);
    assert_eq!(tp.engines.created(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_force_switches_to_engine() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    assert_ok!(controller.force_adaptive_streaming());
    assert_eq!(
        controller.snapshot().mode,
        PlaybackMode::AdaptiveStreaming(AdaptiveOrigin::Engine)
    );
    let configs = tp.engines.configs();
    let config = &configs[0];
    assert_eq!(config.back_buffer_length, 98.0);
    assert_eq!(config.frag_loading_timeout_ms, 200_000);
    assert!(config.enable_worker);
    assert!(config.low_latency_mode);

    assert!(matches!(
        controller.force_adaptive_streaming(),
        Err(Error::AlreadyAdaptive)
    ));
    assert_eq!(tp.engines.created(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_engine_construction_failure_is_reported_once() {
    let tp = TestPlatform::with_info(video_file_info("video/x-matroska"))
        .with_engines(FakeEngineFactory::failing());
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mkv")).await;

    tp.element.emit(MediaEvent::SourceError {
        index: 0,
        message: "unsupported".into(),
    });
    settle(10).await;
    tp.element.emit(MediaEvent::SourceError {
        index: 0,
        message: "unsupported".into(),
    });
    settle(10).await;

    assert_eq!(tp.notifier.errors().len(), 1);
    let snapshot = controller.snapshot();
    assert!(snapshot.engine_failure.is_some());
    assert!(!snapshot.using_adaptive_streaming);
    assert_eq!(snapshot.engines_constructed, 0);
    assert_eq!(tp.engines.configs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forced_fallback_keeps_construction_error() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"))
        .with_engines(FakeEngineFactory::failing());
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    let err = controller.force_adaptive_streaming().unwrap_err();
    assert!(matches!(err, Error::EngineConstruction(_)));
    assert_eq!(err.error_code(), "ENGINE_CONSTRUCT");

    // the recorded failure blocks a retry without a second message
    assert!(matches!(
        controller.force_adaptive_streaming(),
        Err(Error::EngineFatal(_))
    ));
    assert_eq!(tp.notifier.errors().len(), 1);
    assert_eq!(tp.engines.configs().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forced_fallback_attach_failure() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"))
        .with_engines(FakeEngineFactory::failing_attach());
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    let err = controller.force_adaptive_streaming().unwrap_err();
    assert!(matches!(err, Error::EngineFatal(ref details) if details.contains("attach")));
    assert_eq!(tp.notifier.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_engine_error_is_reported_once() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    assert_ok!(controller.force_adaptive_streaming());
    let engine = tp.engines.engine(0).unwrap();

    engine.emit(EngineEvent::Error {
        fatal: false,
        details: "fragLoadTimeOut".into(),
    });
    engine.emit(EngineEvent::Error {
        fatal: true,
        details: "manifestLoadError".into(),
    });
    engine.emit(EngineEvent::Error {
        fatal: true,
        details: "levelLoadError".into(),
    });
    settle(10).await;

    assert_eq!(tp.notifier.errors().len(), 1);
    assert!(controller.snapshot().engine_failure.is_some());
    assert_eq!(tp.engines.created(), 1);
}

// =============================================================================
// Subtitles
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_subtitle_reload_when_first_track_is_empty() {
    let tp = TestPlatform::with_info(with_subtitles(video_file_info("video/mp4"), &["en", "de", "fr"]));
    tp.element.set_initial_cues(Some(0));
    let _controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    assert_eq!(tp.element.declared_tracks().len(), 3);

    settle(2_000).await;

    assert_eq!(tp.element.reloads(), vec![0, 1, 2]);
    assert_eq!(
        tp.element.track_modes(),
        vec![TextTrackMode::Showing, TextTrackMode::Disabled, TextTrackMode::Disabled]
    );
}

#[tokio::test(start_paused = true)]
async fn test_subtitle_resync_is_idempotent() {
    let tp = TestPlatform::with_info(with_subtitles(video_file_info("video/mp4"), &["en", "de"]));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    settle(500).await;

    let modes = tp.element.track_modes();
    assert_eq!(modes, vec![TextTrackMode::Showing, TextTrackMode::Disabled]);
    let writes = tp.element.mode_writes();

    controller.handle_engine_event(EngineEvent::ManifestParsed).await;
    controller.handle_engine_event(EngineEvent::MediaAttached).await;

    assert_eq!(tp.element.track_modes(), modes);
    assert_eq!(tp.element.mode_writes(), writes);
    assert!(tp.element.reloads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_subtitle_sync_after_fallback() {
    let tp = TestPlatform::with_info(with_subtitles(video_file_info("video/x-matroska"), &["en", "de"]));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mkv")).await;
    settle(500).await;
    assert_ok!(controller.force_adaptive_streaming());

    // the engine rebuilt the track list with everything showing
    tp.element.force_track_mode(0, TextTrackMode::Disabled);
    tp.element.force_track_mode(1, TextTrackMode::Showing);
    tp.engines.engine(0).unwrap().emit(EngineEvent::ManifestParsed);
    settle(500).await;

    assert_eq!(
        tp.element.track_modes(),
        vec![TextTrackMode::Showing, TextTrackMode::Disabled]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hanging_track_reload_times_out() {
    let tp = TestPlatform::with_info(with_subtitles(video_file_info("video/mp4"), &["en", "de"]));
    tp.element.set_initial_cues(Some(0));
    tp.element.hang_reloads();
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    settle(20_000).await;

    assert_eq!(tp.element.reloads(), vec![0, 1]);
    assert!(!controller.is_destroyed());
    assert!(tp.notifier.errors().is_empty());
}

fn subtitle_cell(langs: &[&str]) -> SessionCell {
    let config = PlayerConfig::default();
    let item = MediaItem::new("talk.mp4");
    let caps = CapabilityProbe::from_user_agent(CHROME_UA);
    let info = with_subtitles(video_file_info("video/mp4"), langs);
    let resolved = SourceResolver::new(&config).resolve(&item, &info, &caps).unwrap();
    let manifest = url::Url::parse("http://localhost:8081/api/player/playlist/talk.mp4.m3u8").unwrap();
    SessionCell::new(PlaybackSession::new(item, resolved, manifest))
}

fn empty_tracks(count: usize) -> Arc<FakeElement> {
    let element = Arc::new(FakeElement::new());
    element.set_initial_cues(Some(0));
    element.add_tracks(count);
    element
}

#[tokio::test(start_paused = true)]
async fn test_failed_track_reloads_are_swallowed() {
    let cell = subtitle_cell(&["en", "de", "fr"]);
    let fake = empty_tracks(3);
    fake.fail_reloads();
    let element: Arc<dyn MediaElement> = fake.clone();
    let sync = SubtitleSync::from_config(&PlayerConfig::default());

    let outcome = sync.sync(&cell, &element).await;

    assert_eq!(outcome, SyncOutcome::Reloaded { reloaded: 0, failed: 3 });
    assert_eq!(fake.reloads(), vec![0, 1, 2]);
    assert_eq!(fake.track_modes()[0], TextTrackMode::Showing);
    assert!(!cell.is_destroyed());

    // a later trigger may try again
    fake.set_track_cues(0, Some(12));
    assert_eq!(sync.sync(&cell, &element).await, SyncOutcome::Applied { changed: 0 });
}

#[tokio::test(start_paused = true)]
async fn test_failed_track_reloads_do_not_reach_user() {
    let tp = TestPlatform::with_info(with_subtitles(video_file_info("video/mp4"), &["en", "de"]));
    tp.element.set_initial_cues(Some(0));
    tp.element.fail_reloads();
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    settle(2_000).await;

    assert_eq!(tp.element.reloads(), vec![0, 1]);
    assert!(tp.notifier.errors().is_empty());
    assert!(tp.notifier.warnings().is_empty());
    assert!(!controller.is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_settle_cancels_sync() {
    let cell = subtitle_cell(&["en", "de"]);
    let fake = empty_tracks(2);
    let element: Arc<dyn MediaElement> = fake.clone();

    let task = {
        let cell = cell.clone();
        tokio::spawn(async move {
            SubtitleSync::from_config(&PlayerConfig::default())
                .sync(&cell, &element)
                .await
        })
    };
    settle(50).await;
    cell.with(|s| s.destroy());

    assert_eq!(task.await.unwrap(), SyncOutcome::Cancelled);
    assert_eq!(fake.mode_writes(), 0);
    assert!(fake.reloads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_between_reloads_cancels_sync() {
    let cell = subtitle_cell(&["en", "de", "fr"]);
    let fake = empty_tracks(3);
    let element: Arc<dyn MediaElement> = fake.clone();

    let task = {
        let cell = cell.clone();
        tokio::spawn(async move {
            SubtitleSync::from_config(&PlayerConfig::default())
                .sync(&cell, &element)
                .await
        })
    };
    // settle is 150 ms, the next reload is staggered by 250 ms
    settle(250).await;
    assert_eq!(fake.reloads(), vec![0]);
    cell.with(|s| s.destroy());

    assert_eq!(task.await.unwrap(), SyncOutcome::Cancelled);
    assert_eq!(fake.reloads(), vec![0]);
}

// =============================================================================
// Poster capture
// =============================================================================

#[tokio::test]
async fn test_poster_captured_at_most_once() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    tp.element.set_video_dimensions(32, 18);
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4").with_title("Talk")).await;

    tp.element.emit(MediaEvent::LoadedData);
    assert!(eventually(|| controller.snapshot().have_poster).await);

    let poster = tp.element.poster().unwrap();
    assert!(poster.starts_with("data:image/jpeg;base64,"));
    assert_eq!(controller.snapshot().thumbnail_url.as_deref(), Some(poster.as_str()));

    for _ in 0..3 {
        tp.element.emit(MediaEvent::Pause);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tp.element.capture_count(), 1);

    let metadata = tp.media_session.metadata();
    let last = metadata.last().unwrap();
    assert_eq!(last.title, "Talk");
    assert_eq!(last.artwork.len(), 1);
    assert_eq!(last.artwork[0].mime_type, "image/jpeg");
}

#[tokio::test]
async fn test_poster_retried_on_pause_until_frame_available() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    // no decoded frame yet
    tp.element.emit(MediaEvent::LoadedData);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!controller.snapshot().have_poster);
    assert_eq!(tp.element.capture_count(), 0);

    tp.element.set_video_dimensions(16, 9);
    tp.element.emit(MediaEvent::Pause);
    assert!(eventually(|| controller.snapshot().have_poster).await);
}

#[tokio::test]
async fn test_no_poster_for_audio_only() {
    let tp = TestPlatform::with_info(audio_file_info("audio/ogg"));
    tp.element.set_video_dimensions(16, 9);
    let controller = mount(&tp, CHROME_UA, MediaItem::new("song.ogg")).await;

    tp.element.emit(MediaEvent::LoadedData);
    tp.element.emit(MediaEvent::Pause);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(tp.element.capture_count(), 0);
    assert!(!controller.snapshot().have_poster);
}

#[tokio::test]
async fn test_destroy_during_capture_keeps_thumbnail() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"))
        .with_element(FakeElement::new().with_capture_gate());
    tp.element.set_video_dimensions(16, 9);
    let mut item = MediaItem::new("talk.mp4");
    item.extras.thumbnail = Some("https://img.example.com/talk.jpg".into());
    let controller = mount(&tp, CHROME_UA, item).await;

    let before = controller.snapshot().thumbnail_url;
    assert!(before.as_deref().unwrap().contains("/api/thumbnail?url="));

    tp.element.emit(MediaEvent::LoadedData);
    assert!(eventually(|| tp.element.capture_count() == 1).await);

    controller.destroy();
    tp.element.release_capture();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = controller.snapshot();
    assert!(snapshot.destroyed);
    assert!(!snapshot.have_poster);
    assert_eq!(snapshot.thumbnail_url, before);
    assert_eq!(tp.element.poster(), before);
}

#[tokio::test]
async fn test_capture_continuation_discards_after_destroy() {
    let element = Arc::new(FakeElement::new().with_capture_gate());
    element.set_video_dimensions(16, 9);
    let config = PlayerConfig::default();
    let item = MediaItem::new("talk.mp4");
    let caps = CapabilityProbe::from_user_agent(CHROME_UA);
    let resolved = SourceResolver::new(&config)
        .resolve(&item, &video_file_info("video/mp4"), &caps)
        .unwrap();
    let manifest = url::Url::parse("http://localhost:8081/api/player/playlist/talk.mp4.m3u8").unwrap();
    let mut session = PlaybackSession::new(item, resolved, manifest);
    session.set_thumbnail_url("http://localhost:8081/api/thumbnail?url=x");
    let cell = SessionCell::new(session);

    let task = {
        let cell = cell.clone();
        let element: Arc<dyn MediaElement> = element.clone();
        tokio::spawn(async move { PosterCapture::new(86).capture_once(&cell, &element).await })
    };
    assert!(eventually(|| element.capture_count() == 1).await);

    cell.with(|s| s.destroy());
    element.release_capture();

    assert_eq!(task.await.unwrap(), CaptureOutcome::Discarded);
    let snapshot = cell.snapshot();
    assert!(!snapshot.have_poster);
    assert_eq!(
        snapshot.thumbnail_url.as_deref(),
        Some("http://localhost:8081/api/thumbnail?url=x")
    );
}

// =============================================================================
// Media session, volume, shortcuts
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_mount_announces_title_and_metadata() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let mut item = MediaItem::new("talk.mp4").with_title("A Talk");
    item.extras.channel = Some("Conference".into());
    let _controller = mount(&tp, CHROME_UA, item).await;

    assert_eq!(tp.now_playing.title().as_deref(), Some("A Talk"));
    let metadata = tp.media_session.metadata();
    assert_eq!(metadata[0].title, "A Talk");
    assert_eq!(metadata[0].artist.as_deref(), Some("Conference"));
    assert!(metadata[0].artwork.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_position_pushed_once_duration_known() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let _controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    tp.element.emit(MediaEvent::DurationChange);
    settle(1).await;
    assert!(tp.media_session.positions().is_empty());

    tp.element.set_duration(300.0);
    tp.element.set_current_time(12.5);
    tp.element.emit(MediaEvent::DurationChange);
    tp.element.set_playback_rate(2.0);
    tp.element.emit(MediaEvent::RateChange);
    settle(1).await;

    let positions = tp.media_session.positions();
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[1].playback_rate, 2.0);
    assert_eq!(positions[1].position, 12.5);
}

#[tokio::test(start_paused = true)]
async fn test_media_session_failures_are_contained() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    tp.media_session.set_failing(true);
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;

    tp.element.set_duration(10.0);
    tp.element.emit(MediaEvent::Seeked);
    settle(1).await;

    assert!(!controller.is_destroyed());
    assert!(tp.notifier.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_volume_restored_and_persisted() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    assert_ok!(tp.volume.store(0.4));
    let _controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    assert_eq!(tp.element.volume(), 0.4);

    tp.element.set_volume(0.7);
    tp.element.emit(MediaEvent::VolumeChange);
    settle(1).await;
    assert_eq!(tp.volume.load(), Some(0.7));
}

#[tokio::test(start_paused = true)]
async fn test_help_overlay_and_close_action() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    assert_eq!(tp.shortcuts.attaches(), 1);
    assert_eq!(tp.shortcuts.last_enabled(), Some(true));

    let overlay = controller.help_overlay();
    assert!(!*overlay.borrow());
    tp.shortcuts.set_help(true);
    settle(1).await;
    assert!(*overlay.borrow());

    tp.shortcuts.press_escape();
    assert_eq!(*controller.close_requests().borrow(), Some(CloseReason::User));
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_fatal_file_info_closes_player() {
    let tp = TestPlatform::new(StaticFileInfo::failing(404, "File not found"));
    let result = PlaybackController::mount(
        PlayerConfig::default(),
        CHROME_UA,
        MediaItem::new("gone.mp4"),
        tp.platform(),
        tp.close.clone(),
    )
    .await;

    assert!(matches!(result, Err(Error::FileInfo { status: 404, .. })));
    assert_eq!(tp.notifier.errors(), vec!["File not found".to_string()]);
    assert_eq!(tp.close.requested(), Some(CloseReason::Fatal("File not found".into())));
    assert!(tp.element.sources().is_empty());
    assert_eq!(tp.shortcuts.attaches(), 0);
    assert!(tp.now_playing.title().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_destroy_tears_everything_down() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    assert_ok!(controller.force_adaptive_streaming());
    tp.shortcuts.set_help(true);
    settle(1).await;

    controller.destroy();

    assert!(tp.engines.engine(0).unwrap().is_destroyed());
    assert_eq!(tp.shortcuts.detaches(), 1);
    assert!(!*controller.help_overlay().borrow());
    assert!(tp.now_playing.title().is_none());
    assert_eq!(tp.media_session.clear_count(), 1);
    assert!(controller.snapshot().destroyed);

    controller.destroy();
    assert_eq!(tp.shortcuts.detaches(), 1);
    assert_eq!(tp.media_session.clear_count(), 1);

    // events after teardown do nothing
    tp.element.set_duration(10.0);
    tp.element.emit(MediaEvent::DurationChange);
    controller.handle_engine_event(EngineEvent::Error {
        fatal: true,
        details: "late".into(),
    }).await;
    settle(10).await;
    assert!(tp.media_session.positions().is_empty());
    assert!(tp.notifier.errors().is_empty());
    assert!(matches!(
        controller.force_adaptive_streaming(),
        Err(Error::AlreadyAdaptive) | Err(Error::SessionDestroyed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_controller_tears_down() {
    let tp = TestPlatform::with_info(video_file_info("video/mp4"));
    let controller = mount(&tp, CHROME_UA, MediaItem::new("talk.mp4")).await;
    assert_ok!(controller.force_adaptive_streaming());
    settle(1).await;

    drop(controller);
    // the mount-time subtitle sync holds the last handle until it settles
    settle(500).await;

    assert_eq!(tp.shortcuts.detaches(), 1);
    assert!(tp.engines.engine(0).unwrap().is_destroyed());
}
