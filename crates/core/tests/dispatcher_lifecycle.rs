//! Dispatcher lifecycle integration tests.
//!
//! These tests drive conversions end to end with the mock media engine:
//! - State transitions (idle -> file selected -> ready -> converting -> done)
//! - Rejection of calls made while busy or in the wrong state
//! - Engine loading, load failures and retries
//! - Progress reporting
//! - Text and passthrough conversions

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use uniconv_core::{
    converter::{ConverterError, EngineLoadState},
    testing::{fixtures, MockEngine},
    AcceptMatcher, CatalogEntry, ConversionCategory, ConversionDispatcher, ConversionSession,
    DispatchError, DispatchState, FormatCatalog, MemoryFile,
};

/// Test helper holding a session over a mock engine.
struct TestHarness {
    session: ConversionSession<MockEngine>,
    engine: MockEngine,
}

impl TestHarness {
    fn new() -> Self {
        let engine = MockEngine::new();
        let session = ConversionSession::new(FormatCatalog::builtin(), engine.clone());
        Self { session, engine }
    }

    fn dispatcher(&self, category: ConversionCategory) -> ConversionDispatcher<MockEngine> {
        self.session
            .dispatcher(category)
            .expect("category should be in the builtin catalog")
    }

    /// Slows every exec down to roughly `steps * 50ms`.
    async fn slow_exec(&self, steps: usize) {
        let ratios = (1..=steps).map(|i| i as f64 / steps as f64).collect();
        self.engine.set_progress_steps(ratios).await;
        self.engine.set_step_delay(Duration::from_millis(50)).await;
    }
}

fn generic_entry() -> CatalogEntry {
    CatalogEntry {
        category: ConversionCategory::Generic,
        name: "Files".to_string(),
        icon: String::new(),
        description: String::new(),
        formats: vec!["bin".to_string(), "dat".to_string()],
        accept: AcceptMatcher::default(),
    }
}

// =============================================================================
// State transitions
// =============================================================================

#[tokio::test]
async fn test_dispatcher_starts_idle() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);

    assert_eq!(dispatcher.state().await, DispatchState::Idle);
    assert_eq!(dispatcher.progress(), 0);
    assert!(dispatcher.result().await.is_none());
    assert_eq!(dispatcher.available_targets().await, vec!["srt", "vtt", "ass", "txt"]);
}

#[tokio::test]
async fn test_select_format_requires_file() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);

    let err = dispatcher.select_format("vtt").await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::InvalidState {
            actual: DispatchState::Idle,
            ..
        }
    ));
}

#[tokio::test]
async fn test_convert_requires_format() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);

    let err = dispatcher.convert().await.unwrap_err();
    assert!(err.is_rejection());
    assert_eq!(dispatcher.state().await, DispatchState::FileSelected);
}

#[tokio::test]
async fn test_available_targets_exclude_source_format() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);

    assert_eq!(dispatcher.available_targets().await, vec!["vtt", "ass", "txt"]);
}

#[tokio::test]
async fn test_select_format_rejects_unknown_and_same_format() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);

    let err = dispatcher.select_format("mp4").await.unwrap_err();
    assert!(matches!(err, DispatchError::UnsupportedFormat { .. }));

    let err = dispatcher.select_format("SRT").await.unwrap_err();
    assert!(matches!(err, DispatchError::SameFormat { ref format } if format == "srt"));

    assert_eq!(dispatcher.state().await, DispatchState::FileSelected);
}

#[tokio::test]
async fn test_new_file_discards_previous_result() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);
    assert_ok!(dispatcher.select_format("vtt").await);
    assert_ok!(dispatcher.convert().await);
    assert_eq!(dispatcher.state().await, DispatchState::Done);

    assert_ok!(dispatcher.select_file(fixtures::vtt_file()).await);

    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.state, DispatchState::FileSelected);
    assert_eq!(snapshot.file_name.as_deref(), Some("episode.vtt"));
    assert!(snapshot.target_format.is_none());
    assert!(snapshot.result_file_name.is_none());
    assert!(dispatcher.result().await.is_none());
}

#[tokio::test]
async fn test_clear_file_returns_to_idle() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);
    assert_ok!(dispatcher.select_format("txt").await);

    assert_ok!(dispatcher.clear_file().await);
    let snapshot = dispatcher.snapshot().await;
    assert_eq!(snapshot.state, DispatchState::Idle);
    assert!(snapshot.file_name.is_none());
    assert!(snapshot.target_format.is_none());
}

// =============================================================================
// Busy rejection
// =============================================================================

#[tokio::test]
async fn test_calls_while_converting_are_rejected() {
    let harness = TestHarness::new();
    harness.slow_exec(4).await;

    let dispatcher = Arc::new(harness.dispatcher(ConversionCategory::Image));
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(fixtures::png_file()).await);
    assert_ok!(dispatcher.select_format("webp").await);

    let running = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.convert().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dispatcher.state().await, DispatchState::Converting);

    assert!(matches!(dispatcher.convert().await, Err(DispatchError::Busy)));
    assert!(matches!(
        dispatcher.select_file(fixtures::png_file()).await,
        Err(DispatchError::Busy)
    ));
    assert!(matches!(
        dispatcher.select_format("gif").await,
        Err(DispatchError::Busy)
    ));
    assert!(matches!(dispatcher.clear_file().await, Err(DispatchError::Busy)));

    assert_ok!(running.await.unwrap());
    assert_eq!(dispatcher.state().await, DispatchState::Done);
    assert_eq!(harness.engine.executions().await.len(), 1);
}

// =============================================================================
// Media engine
// =============================================================================

#[tokio::test]
async fn test_media_conversion_before_load_is_rejected() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Audio);
    assert_ok!(dispatcher.select_file(fixtures::flac_file()).await);
    assert_ok!(dispatcher.select_format("mp3").await);

    let err = dispatcher.convert().await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::EngineNotReady {
            state: EngineLoadState::NotRequested
        }
    ));
    assert_eq!(dispatcher.state().await, DispatchState::Ready);
    assert!(harness.engine.executions().await.is_empty());
}

#[tokio::test]
async fn test_media_conversion_produces_result() {
    let harness = TestHarness::new();
    harness.engine.set_output(b"ID3 fake mp3".to_vec()).await;

    let dispatcher = harness.dispatcher(ConversionCategory::Audio);
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(fixtures::flac_file()).await);
    assert_ok!(dispatcher.select_format("mp3").await);
    assert_ok!(dispatcher.convert().await);

    let result = dispatcher.take_result().await.unwrap();
    assert_eq!(result.data, b"ID3 fake mp3");
    assert_eq!(result.mime_type, "audio/mpeg");
    assert_eq!(result.file_name, "converted.mp3");
    assert!(dispatcher.take_result().await.is_none());

    let executions = harness.engine.executions().await;
    assert_eq!(
        executions[0],
        vec!["-i", "track.flac", "-q:a", "0", "output.mp3"]
    );
    // Input and output buffers are released after each transcode
    assert!(harness.engine.buffer_names().await.is_empty());
}

#[tokio::test]
async fn test_video_uses_fixed_encoder_settings() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Video);
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(MemoryFile::new("clip.mov", b"moov".to_vec())).await);
    assert_ok!(dispatcher.select_format("mp4").await);
    assert_ok!(dispatcher.convert().await);

    let args = &harness.engine.executions().await[0];
    assert_eq!(
        args,
        &vec![
            "-i", "clip.mov", "-c:v", "libx264", "-preset", "fast", "-crf", "22", "-c:a", "aac",
            "output.mp4"
        ]
    );
}

#[tokio::test]
async fn test_concurrent_prepare_loads_engine_once() {
    let harness = TestHarness::new();
    harness
        .engine
        .set_load_delay(Duration::from_millis(50))
        .await;

    let image = harness.dispatcher(ConversionCategory::Image);
    let audio = harness.dispatcher(ConversionCategory::Audio);
    let video = harness.dispatcher(ConversionCategory::Video);

    let (a, b, c) = tokio::join!(image.prepare(), audio.prepare(), video.prepare());
    assert_ok!(a);
    assert_ok!(b);
    assert_ok!(c);

    assert_eq!(harness.engine.load_count().await, 1);
    assert_eq!(
        harness.session.media().load_state().await,
        EngineLoadState::Ready
    );

    // Ready is sticky
    assert_ok!(image.prepare().await);
    assert_eq!(harness.engine.load_count().await, 1);
}

#[tokio::test]
async fn test_prepare_is_noop_for_text_categories() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);

    assert_ok!(dispatcher.prepare().await);
    assert_eq!(harness.engine.load_count().await, 0);
    assert!(dispatcher.snapshot().await.engine.is_none());
}

#[tokio::test]
async fn test_load_failure_then_retry() {
    let harness = TestHarness::new();
    harness.engine.fail_next_load("wasm unavailable").await;

    let dispatcher = harness.dispatcher(ConversionCategory::Image);
    let err = dispatcher.prepare().await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Conversion(ConverterError::EngineLoadFailed { .. })
    ));
    assert_eq!(
        dispatcher.snapshot().await.engine,
        Some(EngineLoadState::Failed)
    );
    assert!(harness
        .session
        .media()
        .load_error()
        .await
        .unwrap()
        .contains("wasm unavailable"));

    assert_ok!(dispatcher.select_file(fixtures::png_file()).await);
    assert_ok!(dispatcher.select_format("jpg").await);
    let err = dispatcher.convert().await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::EngineNotReady {
            state: EngineLoadState::Failed
        }
    ));

    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.convert().await);
    assert_eq!(harness.engine.load_count().await, 2);
}

#[tokio::test]
async fn test_transcode_failure_then_retry() {
    let harness = TestHarness::new();
    harness
        .engine
        .set_next_exec_error(ConverterError::transcode_failed("Unknown encoder", None))
        .await;

    let dispatcher = harness.dispatcher(ConversionCategory::Image);
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(fixtures::png_file()).await);
    assert_ok!(dispatcher.select_format("avif").await);

    let err = dispatcher.convert().await.unwrap_err();
    assert!(!err.is_rejection());
    assert_eq!(dispatcher.state().await, DispatchState::Error);
    assert!(dispatcher
        .error_message()
        .await
        .unwrap()
        .contains("Unknown encoder"));
    assert!(harness.engine.buffer_names().await.is_empty());

    // Error is terminal until the format is chosen again
    assert_err!(dispatcher.convert().await);
    assert_ok!(dispatcher.select_format("avif").await);
    assert!(dispatcher.error_message().await.is_none());
    assert_ok!(dispatcher.convert().await);
    assert_eq!(dispatcher.state().await, DispatchState::Done);
}

#[tokio::test]
async fn test_conversion_during_engine_load_is_rejected() {
    let harness = TestHarness::new();
    harness
        .engine
        .set_load_delay(Duration::from_millis(100))
        .await;

    let dispatcher = Arc::new(harness.dispatcher(ConversionCategory::Image));
    assert_ok!(dispatcher.select_file(fixtures::png_file()).await);
    assert_ok!(dispatcher.select_format("jpg").await);

    let loading = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.prepare().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        harness.session.media().load_state().await,
        EngineLoadState::Loading
    );

    let err = dispatcher.convert().await.unwrap_err();
    assert!(matches!(
        err,
        DispatchError::EngineNotReady {
            state: EngineLoadState::Loading
        }
    ));
    assert!(err.is_rejection());
    assert_eq!(dispatcher.state().await, DispatchState::Ready);
    assert!(harness.engine.executions().await.is_empty());

    // Once the load lands the same selection converts
    assert_ok!(loading.await.unwrap());
    assert_ok!(dispatcher.convert().await);
    assert_eq!(dispatcher.state().await, DispatchState::Done);
}

#[tokio::test]
async fn test_dropped_conversion_can_be_retried() {
    let harness = TestHarness::new();
    harness.slow_exec(4).await;

    let dispatcher = harness.dispatcher(ConversionCategory::Image);
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(fixtures::png_file()).await);
    assert_ok!(dispatcher.select_format("webp").await);

    let abandoned =
        tokio::time::timeout(Duration::from_millis(30), dispatcher.convert()).await;
    assert!(abandoned.is_err(), "conversion should still be running");

    // Buffer release runs on a spawned task
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dispatcher.state().await, DispatchState::Error);
    assert!(dispatcher
        .error_message()
        .await
        .unwrap()
        .contains("cancelled"));
    assert!(harness.engine.buffer_names().await.is_empty());

    harness.engine.set_step_delay(Duration::from_millis(1)).await;
    assert_ok!(dispatcher.select_format("webp").await);
    assert_ok!(dispatcher.convert().await);
    assert_eq!(dispatcher.state().await, DispatchState::Done);
    assert_eq!(harness.engine.executions().await.len(), 2);
    assert!(harness.engine.buffer_names().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_releases_engine() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Image);
    assert_ok!(dispatcher.prepare().await);

    harness.session.shutdown().await;
    assert_eq!(harness.engine.terminate_count().await, 1);
    assert_eq!(
        harness.session.media().load_state().await,
        EngineLoadState::NotRequested
    );
}

// =============================================================================
// Progress
// =============================================================================

#[tokio::test]
async fn test_progress_is_monotonic_and_ends_at_100() {
    let harness = TestHarness::new();
    harness
        .engine
        .set_progress_steps(vec![0.1, 0.4, 0.3, 0.75, 1.0])
        .await;

    let dispatcher = harness.dispatcher(ConversionCategory::Audio);
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(fixtures::flac_file()).await);
    assert_ok!(dispatcher.select_format("ogg").await);

    let mut rx = dispatcher.subscribe_progress();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value == 100 {
                break;
            }
        }
        seen
    });

    assert_ok!(dispatcher.convert().await);
    let seen = collector.await.unwrap();

    assert_eq!(seen.last(), Some(&100));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {:?}", seen);
    assert_eq!(dispatcher.progress(), 100);
}

#[tokio::test]
async fn test_progress_resets_for_next_conversion() {
    let harness = TestHarness::new();
    let dispatcher = Arc::new(harness.dispatcher(ConversionCategory::Audio));
    assert_ok!(dispatcher.prepare().await);
    assert_ok!(dispatcher.select_file(fixtures::flac_file()).await);
    assert_ok!(dispatcher.select_format("wav").await);
    assert_ok!(dispatcher.convert().await);
    assert_eq!(dispatcher.progress(), 100);

    harness.slow_exec(4).await;
    assert_ok!(dispatcher.select_format("wav").await);
    let running = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.convert().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.progress() < 100);

    assert_ok!(running.await.unwrap());
    assert_eq!(dispatcher.progress(), 100);
}

#[tokio::test]
async fn test_text_conversion_reports_staged_progress() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);
    assert_ok!(dispatcher.select_format("vtt").await);

    assert_ok!(dispatcher.convert().await);
    assert_eq!(dispatcher.progress(), 100);
    assert_eq!(dispatcher.snapshot().await.progress, 100);
}

// =============================================================================
// Text and passthrough conversions
// =============================================================================

#[tokio::test]
async fn test_subtitle_srt_to_vtt() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::srt_file()).await);
    assert_ok!(dispatcher.select_format("vtt").await);
    assert_ok!(dispatcher.convert().await);

    let result = dispatcher.result().await.unwrap();
    assert_eq!(String::from_utf8(result.data).unwrap(), fixtures::SAMPLE_VTT);
    assert_eq!(result.mime_type, "text/vtt");
    assert_eq!(result.file_name, "converted.vtt");
    assert_eq!(harness.engine.load_count().await, 0);
}

#[tokio::test]
async fn test_subtitle_ass_to_srt() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::ass_file()).await);
    assert_ok!(dispatcher.select_format("srt").await);
    assert_ok!(dispatcher.convert().await);

    let text = String::from_utf8(dispatcher.result().await.unwrap().data).unwrap();
    assert_eq!(
        text,
        "1\n0:00:01,00 --> 0:00:04,00\nHello there\n\n2\n0:00:05,50 --> 0:00:07,25\nGeneral Kenobi\n\n"
    );
}

#[tokio::test]
async fn test_subtitle_vtt_to_txt() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Subtitle);
    assert_ok!(dispatcher.select_file(fixtures::vtt_file()).await);
    assert_ok!(dispatcher.select_format("txt").await);
    assert_ok!(dispatcher.convert().await);

    let result = dispatcher.result().await.unwrap();
    assert_eq!(result.data, b"Hello there\n\nGeneral Kenobi");
    assert_eq!(result.mime_type, "text/plain");
}

#[tokio::test]
async fn test_model_stl_to_obj() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Model3D);
    assert_ok!(dispatcher.select_file(fixtures::stl_file()).await);
    assert_ok!(dispatcher.select_format("obj").await);
    assert_ok!(dispatcher.convert().await);

    let text = String::from_utf8(dispatcher.result().await.unwrap().data).unwrap();
    assert_eq!(
        text,
        "# Converted from STL\n# uniconv\n\no Model\nv 0 0 0\nv 1 0 0\nv 0 1 0"
    );
}

#[tokio::test]
async fn test_model_obj_to_gltf() {
    let harness = TestHarness::new();
    let dispatcher = harness.dispatcher(ConversionCategory::Model3D);
    assert_ok!(dispatcher.select_file(fixtures::obj_file()).await);
    assert_ok!(dispatcher.select_format("gltf").await);
    assert_ok!(dispatcher.convert().await);

    let result = dispatcher.result().await.unwrap();
    assert_eq!(result.mime_type, "model/gltf+json");
    let gltf: serde_json::Value = serde_json::from_slice(&result.data).unwrap();
    assert_eq!(gltf["asset"]["version"], "2.0");
}

#[tokio::test]
async fn test_generic_passthrough_copies_bytes() {
    let harness = TestHarness::new();
    let dispatcher = harness.session.dispatcher_for(generic_entry());
    let payload: Vec<u8> = (0u8..=255).collect();
    assert_ok!(dispatcher.select_file(MemoryFile::new("blob.bin", payload.clone())).await);
    assert_ok!(dispatcher.select_format("dat").await);
    assert_ok!(dispatcher.convert().await);

    let result = dispatcher.result().await.unwrap();
    assert_eq!(result.data, payload);
    assert_eq!(result.mime_type, "application/octet-stream");
    assert_eq!(result.file_name, "converted.dat");
}

#[tokio::test]
async fn test_unknown_category_is_rejected_by_session() {
    let engine = MockEngine::new();
    let catalog = FormatCatalog::new(vec![generic_entry()]).unwrap();
    let session = ConversionSession::new(catalog, engine);

    let err = session.dispatcher(ConversionCategory::Video).err().unwrap();
    assert!(matches!(
        err,
        DispatchError::UnknownCategory {
            category: ConversionCategory::Video
        }
    ));
}
