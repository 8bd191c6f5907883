use super::testing::MemoryEncoderFactory;
use super::*;
use crate::config::{EncoderBackend, RecordingConfig};
use crate::frame::FrameData;
use image::RgbImage;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn recording_config(enabled: bool) -> RecordingConfig {
    RecordingConfig {
        enabled,
        duration_seconds: 10,
        fps: 20,
        backend: EncoderBackend::Mjpeg,
        save_metadata: false,
    }
}

fn controller(
    config: RecordingConfig,
    videos_dir: &Path,
    factory: &MemoryEncoderFactory,
) -> RecordingController {
    RecordingController::new(
        config,
        videos_dir.to_path_buf(),
        Some(chrono_tz::UTC),
        (8, 6),
        Box::new(factory.clone()),
    )
}

fn base_time() -> SystemTime {
    // 2024-03-05 07:08:09 UTC
    UNIX_EPOCH + Duration::from_secs(1_709_622_489)
}

fn frame_at(id: u64, offset: Duration) -> FrameData {
    FrameData::from_rgb_image(id, base_time() + offset, RgbImage::new(8, 6))
}

fn count_started(transitions: &[RecordingTransition]) -> usize {
    transitions
        .iter()
        .filter(|t| matches!(t, RecordingTransition::Started { .. }))
        .count()
}

#[test]
fn test_disabled_recorder_never_opens() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(false), dir.path(), &factory);

    for i in 0..5 {
        assert!(recorder
            .update(true, &frame_at(i, Duration::from_secs(i)))
            .is_empty());
    }
    assert_eq!(recorder.state(), RecordingState::Idle);
    assert!(factory.clips().is_empty());
}

#[test]
fn test_idle_without_detection_stays_idle() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    for i in 0..30 {
        recorder.update(false, &frame_at(i, Duration::from_secs(i)));
    }
    assert!(!recorder.is_recording());
    assert_eq!(recorder.sessions_opened(), 0);
}

#[test]
fn test_continuous_detections_close_one_timeout_after_last() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    let mut stopped_at = None;
    let mut started = 0;
    for t in 0..=30u64 {
        let detected = t <= 12;
        let transitions = recorder.update(detected, &frame_at(t, Duration::from_secs(t)));
        started += count_started(&transitions);

        for transition in &transitions {
            if let RecordingTransition::Stopped {
                frames_written,
                duration,
                ..
            } = transition
            {
                assert!(stopped_at.is_none(), "session closed twice");
                stopped_at = Some(t);
                assert_eq!(*frames_written, 23);
                assert_eq!(*duration, Duration::from_secs(22));
            }
        }

        let expect_recording = t < 22;
        assert_eq!(recorder.is_recording(), expect_recording, "t={}", t);
    }

    assert_eq!(started, 1);
    assert_eq!(stopped_at, Some(22));

    let clips = factory.clips();
    assert_eq!(clips.len(), 1);
    // Opening and closing frames are both written
    assert_eq!(clips[0].frame_ids, (0..=22).collect::<Vec<u64>>());
    assert_eq!(clips[0].finish_calls, 1);
    assert_eq!(
        clips[0].path,
        dir.path().join("20240305_070809.avi")
    );
}

#[test]
fn test_close_lands_within_one_period_of_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);
    let period = Duration::from_millis(300);

    recorder.update(true, &frame_at(0, Duration::ZERO));
    let mut close_offset = None;
    for i in 1..100u64 {
        let offset = period * i as u32;
        let transitions = recorder.update(false, &frame_at(i, offset));
        if transitions
            .iter()
            .any(|t| matches!(t, RecordingTransition::Stopped { .. }))
        {
            close_offset = Some(offset);
            break;
        }
    }

    let close_offset = close_offset.unwrap();
    assert!(close_offset >= Duration::from_secs(10));
    assert!(close_offset < Duration::from_secs(10) + period);
}

#[test]
fn test_detection_while_recording_extends_session() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    assert!(recorder.current_path().is_none());
    let opened = recorder.update(true, &frame_at(0, Duration::ZERO));
    assert_eq!(count_started(&opened), 1);
    let Some(RecordingTransition::Started { path, .. }) = opened.first() else {
        panic!("expected a started session");
    };
    assert_eq!(recorder.current_path(), Some(path.as_path()));

    let extended = recorder.update(true, &frame_at(1, Duration::from_secs(9)));
    assert!(matches!(extended[..], [RecordingTransition::Extended { .. }]));

    // 10s after the start but only 6s after the extension
    assert!(recorder
        .update(false, &frame_at(2, Duration::from_secs(15)))
        .is_empty());
    assert!(recorder.is_recording());

    let closed = recorder.update(false, &frame_at(3, Duration::from_secs(19)));
    assert!(matches!(closed[..], [RecordingTransition::Stopped { .. }]));
    assert!(recorder.current_path().is_none());
}

#[test]
fn test_at_most_one_session_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    // Bursts of detections separated by quiet gaps
    for t in 0..120u64 {
        let detected = (t % 40) < 5;
        recorder.update(detected, &frame_at(t, Duration::from_secs(t)));
        let open = recorder.sessions_opened() - recorder.sessions_closed();
        assert!(open <= 1);
        assert_eq!(open == 1, recorder.is_recording());
    }

    assert_eq!(recorder.sessions_opened(), 3);
    let clips = factory.clips();
    assert_eq!(clips.len(), 3);
    assert!(clips.iter().all(|clip| clip.finish_calls == 1));
}

#[test]
fn test_forced_stop_closes_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    recorder.update(true, &frame_at(0, Duration::ZERO));
    recorder.update(false, &frame_at(1, Duration::from_secs(1)));

    match recorder.stop() {
        Some(RecordingTransition::Stopped {
            frames_written,
            duration,
            ..
        }) => {
            assert_eq!(frames_written, 2);
            assert_eq!(duration, Duration::from_secs(1));
        }
        other => panic!("unexpected stop result: {:?}", other),
    }
    assert!(recorder.stop().is_none());
    drop(recorder);

    let clips = factory.clips();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0].finish_calls, 1);
}

#[test]
fn test_drop_releases_open_session() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    {
        let mut recorder = controller(recording_config(true), dir.path(), &factory);
        recorder.update(true, &frame_at(0, Duration::ZERO));
        assert!(recorder.is_recording());
    }
    assert_eq!(factory.clips()[0].finish_calls, 1);
}

#[test]
fn test_open_failure_suppresses_until_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    factory.set_fail_create(true);
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    let first = recorder.update(true, &frame_at(0, Duration::ZERO));
    assert!(matches!(first[..], [RecordingTransition::Failed { .. }]));
    assert!(!recorder.is_recording());

    factory.set_fail_create(false);
    // Still inside the suppression window
    for t in 1..10u64 {
        assert!(recorder
            .update(true, &frame_at(t, Duration::from_secs(t)))
            .is_empty());
    }
    assert!(!recorder.is_recording());

    let reopened = recorder.update(true, &frame_at(10, Duration::from_secs(10)));
    assert_eq!(count_started(&reopened), 1);
    assert_eq!(factory.clips().len(), 1);
}

#[test]
fn test_write_failure_releases_session() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    recorder.update(true, &frame_at(0, Duration::ZERO));
    factory.set_fail_writes(true);

    let transitions = recorder.update(true, &frame_at(1, Duration::from_secs(1)));
    assert!(matches!(
        transitions.last(),
        Some(RecordingTransition::Failed { .. })
    ));
    assert!(!recorder.is_recording());
    assert_eq!(recorder.sessions_closed(), 1);
    assert_eq!(factory.clips()[0].finish_calls, 1);
    assert!(recorder.stop().is_none());
}

#[test]
fn test_same_second_sessions_get_distinct_paths() {
    let dir = tempfile::tempdir().unwrap();
    let factory = MemoryEncoderFactory::default();
    let mut recorder = controller(recording_config(true), dir.path(), &factory);

    recorder.update(true, &frame_at(0, Duration::ZERO));
    recorder.stop();
    recorder.update(true, &frame_at(1, Duration::from_millis(500)));
    recorder.stop();

    let clips = factory.clips();
    assert_eq!(clips[0].path, dir.path().join("20240305_070809.avi"));
    assert_eq!(clips[1].path, dir.path().join("20240305_070809_1.avi"));
}

#[test]
fn test_metadata_sidecar_written_on_close() {
    let dir = tempfile::tempdir().unwrap();
    let config = RecordingConfig {
        save_metadata: true,
        ..recording_config(true)
    };
    let mut recorder = RecordingController::new(
        config,
        dir.path().to_path_buf(),
        Some(chrono_tz::UTC),
        (8, 6),
        Box::new(MjpegEncoderFactory),
    );

    recorder.update(true, &frame_at(0, Duration::ZERO));
    recorder.update(false, &frame_at(1, Duration::from_millis(50)));
    let Some(RecordingTransition::Stopped { session_id, path, .. }) = recorder.stop() else {
        panic!("expected a stopped session");
    };

    assert_eq!(path, dir.path().join("20240305_070809.mjpeg"));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    let metadata = load_metadata(&path.with_extension("json")).unwrap();
    assert_eq!(metadata.session_id, session_id);
    assert_eq!(metadata.frame_count, 2);
    assert_eq!((metadata.width, metadata.height, metadata.fps), (8, 6, 20));
    assert_eq!(metadata.started_at, base_time());
}
