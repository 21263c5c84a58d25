//! scannerd - attendance scanning daemon
//!
//! This daemon:
//! 1. Opens a camera source and watches it for motion
//! 2. Arms bounded scan sessions on motion and decodes badge codes
//! 3. Resolves codes against the member directory under the dedup window
//! 4. Dispatches feedback and presents the outcome
//! 5. Buffers outcomes while offline and flushes them opportunistically
//!
//! Runs against the synthetic camera and stub decoder out of the box;
//! real capture and decode backends plug in behind the same traits.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

use attendance_kernel::{
    now_ms, CameraConfig, CameraSource, InMemoryDirectory, Member, ScannerEngine,
    ScannerSettings, StubDecoder,
};
use attendance_kernel::feedback::LogFeedbackSink;
use attendance_kernel::queue::LogSyncEndpoint;

#[derive(Parser, Debug)]
#[command(name = "scannerd", about = "attendance scanning daemon")]
struct Args {
    /// Camera device selector (stub://<name> runs the synthetic camera).
    #[arg(long, env = "SCANNER_DEVICE", default_value = "stub://badge_station")]
    device: String,

    /// Stop after this many ticks (runs forever when omitted).
    #[arg(long)]
    ticks: Option<u64>,

    /// Start in offline mode regardless of connectivity.
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut settings = ScannerSettings::load()?;
    if args.offline {
        settings.offline_mode = true;
    }

    let directory = InMemoryDirectory::new(demo_members());
    let camera = CameraSource::new(CameraConfig {
        device: args.device.clone(),
        demo_codes: demo_members().into_iter().map(|m| m.id).collect(),
        ..CameraConfig::default()
    });

    let mut engine = ScannerEngine::new(
        settings.clone(),
        camera,
        Box::new(directory),
        Box::new(StubDecoder),
        Box::new(LogSyncEndpoint),
        Box::new(LogFeedbackSink),
    )?;
    engine.start()?;

    log::info!("scannerd running against {}", args.device);
    log::info!(
        "motion tick {}ms, scan timeout {}ms, dedup window {}ms",
        settings.motion_tick_ms,
        settings.scan_timeout_ms,
        settings.dedup_window_ms
    );

    let tick_sleep = Duration::from_millis(settings.motion_tick_ms / 2);
    let mut ticks = 0u64;
    let mut last_pending_logged = 0usize;

    loop {
        engine.tick(now_ms()?)?;

        let pending = engine.pending_sync();
        if pending != last_pending_logged {
            log::info!("{} scans pending sync", pending);
            last_pending_logged = pending;
        }

        ticks += 1;
        if let Some(budget) = args.ticks {
            if ticks >= budget {
                break;
            }
        }
        std::thread::sleep(tick_sleep);
    }

    engine.shutdown();
    log::info!(
        "scannerd stopped after {} ticks, {} outcomes in history",
        ticks,
        engine.history().count()
    );
    Ok(())
}

fn demo_members() -> Vec<Member> {
    let seed = [
        ("member-001", "Jean Rakoto", "Ushers", "Central", "First Parish"),
        ("member-002", "Marie Razafy", "Teachers", "South", "Hillside Chapel"),
        ("member-003", "Paul Andry", "Choir", "East", "Harbor Church"),
        ("member-004", "Sophie Rabe", "Youth", "North", "North Gate"),
        ("member-005", "Michel Hery", "Ushers", "West", "West Parish"),
    ];
    seed.into_iter()
        .map(|(id, name, group, synod, church)| Member {
            id: id.to_string(),
            name: name.to_string(),
            group: group.to_string(),
            synod: synod.to_string(),
            church: church.to_string(),
            photo_ref: None,
            last_scan_at: None,
        })
        .collect()
}
