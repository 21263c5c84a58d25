//! End-to-end pipeline scenarios: synthetic camera, stub decoder, simulated
//! clock driven through the engine's tick.

use anyhow::Result;

use attendance_kernel::{
    AudioTone, CameraConfig, CameraSource, FeedbackSink, InMemoryDirectory, Member, QueueEntry,
    ScanStatus, ScannerEngine, ScannerSettings, StubDecoder, SyncEndpoint,
};

struct NullSink;

impl FeedbackSink for NullSink {
    fn play_tone(&mut self, _tone: AudioTone) -> Result<()> {
        Ok(())
    }
    fn vibrate(&mut self, _pattern: &[u64]) -> Result<()> {
        Ok(())
    }
}

struct AckEndpoint;

impl SyncEndpoint for AckEndpoint {
    fn push_batch(&mut self, _batch: &[QueueEntry]) -> Result<()> {
        Ok(())
    }
}

fn member(id: &str, name: &str) -> Member {
    Member {
        id: id.to_string(),
        name: name.to_string(),
        group: "Ushers".to_string(),
        synod: "Central".to_string(),
        church: "First Parish".to_string(),
        photo_ref: None,
        last_scan_at: None,
    }
}

/// Engine wired to a synthetic camera that presents exactly one badge.
fn demo_engine(badge: &str, directory: InMemoryDirectory) -> ScannerEngine {
    let camera = CameraSource::new(CameraConfig {
        device: "stub://integration".to_string(),
        width: 64,
        height: 48,
        demo_codes: vec![badge.to_string()],
    });
    ScannerEngine::new(
        ScannerSettings::default(),
        camera,
        Box::new(directory),
        Box::new(StubDecoder),
        Box::new(AckEndpoint),
        Box::new(NullSink),
    )
    .expect("engine")
}

fn run(engine: &mut ScannerEngine, from_ms: u64, ticks: u64) -> Result<u64> {
    let mut now = from_ms;
    for _ in 0..ticks {
        now += 200;
        engine.tick(now)?;
    }
    Ok(now)
}

#[test]
fn motion_scan_resolve_then_duplicate() -> Result<()> {
    let directory = InMemoryDirectory::new(vec![member("member-001", "Jean Rakoto")]);
    let mut engine = demo_engine("member-001", directory);
    engine.start()?;

    // First synthetic scene shift arms a session; the stamped badge
    // decodes on the following frame.
    let now = run(&mut engine, 0, 60)?;
    let history: Vec<_> = engine.history().cloned().collect();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ScanStatus::Entry);
    assert_eq!(history[0].member.as_ref().unwrap().name, "Jean Rakoto");

    // Second scene shift, well inside the dedup window: duplicate, with
    // the next eligible time pinned to the first scan.
    run(&mut engine, now, 60)?;
    let history: Vec<_> = engine.history().cloned().collect();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, ScanStatus::Duplicate);
    let first_at = history[1].timestamp;
    assert_eq!(
        history[0].next_eligible_at,
        Some(first_at + 60 * 60 * 1_000)
    );

    engine.shutdown();
    Ok(())
}

#[test]
fn offline_scans_accumulate_and_flush_on_reconnect() -> Result<()> {
    let directory = InMemoryDirectory::new(vec![member("member-002", "Marie Razafy")]);
    let mut engine = demo_engine("member-002", directory);
    engine.set_connectivity(false);
    engine.start()?;

    // Two sessions: one entry, one duplicate. Both are classified
    // attendance, both queue while offline.
    let now = run(&mut engine, 0, 60)?;
    run(&mut engine, now, 60)?;
    assert_eq!(engine.history().count(), 2);
    assert_eq!(engine.pending_sync(), 2);

    engine.set_connectivity(true);
    assert_eq!(engine.pending_sync(), 0);

    engine.shutdown();
    Ok(())
}

#[test]
fn unknown_badge_never_queues() -> Result<()> {
    // The presented badge is not in the directory.
    let directory = InMemoryDirectory::new(vec![member("member-001", "Jean Rakoto")]);
    let mut engine = demo_engine("visitor-999", directory);
    engine.set_connectivity(false);
    engine.start()?;

    run(&mut engine, 0, 60)?;
    let history: Vec<_> = engine.history().cloned().collect();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ScanStatus::Unknown);
    assert!(history[0].member.is_none());
    assert_eq!(engine.pending_sync(), 0);

    engine.shutdown();
    Ok(())
}

#[test]
fn denied_camera_surfaces_retryable_error() {
    let directory = InMemoryDirectory::new(vec![member("member-001", "Jean Rakoto")]);
    let camera = CameraSource::new(CameraConfig {
        device: "denied://front".to_string(),
        ..CameraConfig::default()
    });
    let mut engine = ScannerEngine::new(
        ScannerSettings::default(),
        camera,
        Box::new(directory),
        Box::new(StubDecoder),
        Box::new(AckEndpoint),
        Box::new(NullSink),
    )
    .expect("engine");

    let err = engine.start().unwrap_err();
    assert!(err
        .downcast_ref::<attendance_kernel::CameraUnavailable>()
        .is_some());
    assert!(!engine.is_running());
    engine.shutdown();
}
