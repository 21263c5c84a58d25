//! Attendance resolution.
//!
//! Maps a decoded code plus "now" to a classified `ScanOutcome` against the
//! member directory. Unknown and duplicate classifications are data, not
//! errors; they flow to the presenter like any other outcome. The resolver
//! is the only writer of `last_scan_at` in the system, and because the
//! whole pipeline runs on one logical event loop the read-modify-write here
//! is atomic with respect to successive scans. A multi-threaded host would
//! need a per-member lock or compare-and-swap around `resolve`.

use anyhow::Result;

use crate::directory::MemberDirectory;
use crate::session::ScanEvent;
use crate::{ScanOutcome, ScanStatus};

/// Classifies decoded codes under the dedup window.
pub struct AttendanceResolver {
    dedup_window_ms: u64,
}

impl AttendanceResolver {
    pub fn new(dedup_window_ms: u64) -> Self {
        Self { dedup_window_ms }
    }

    pub fn resolve_event(
        &self,
        directory: &mut dyn MemberDirectory,
        event: &ScanEvent,
    ) -> Result<ScanOutcome> {
        self.resolve(directory, &event.code, event.at)
    }

    /// Classify one decoded code at time `now` (epoch milliseconds).
    ///
    /// - unmatched code: `Unknown`, no member state touched
    /// - prior scan inside the window: `Duplicate` with `next_eligible_at`,
    ///   no member state touched
    /// - otherwise admissible: stamp `last_scan_at = now` and classify
    ///
    /// Admissibility is decided by the same predicate that rules out
    /// duplicates, so every admissible scan is classified `Entry`; see
    /// `ScanStatus::Exit`.
    pub fn resolve(
        &self,
        directory: &mut dyn MemberDirectory,
        code: &str,
        now: u64,
    ) -> Result<ScanOutcome> {
        let Some(member) = directory.find(code) else {
            return Ok(ScanOutcome {
                code: code.to_string(),
                timestamp: now,
                member: None,
                status: ScanStatus::Unknown,
                message: "QR code not recognized".to_string(),
                next_eligible_at: None,
            });
        };

        if let Some(last) = member.last_scan_at {
            if now.saturating_sub(last) < self.dedup_window_ms {
                let next_eligible_at = last + self.dedup_window_ms;
                return Ok(ScanOutcome {
                    code: code.to_string(),
                    timestamp: now,
                    member: Some(member),
                    status: ScanStatus::Duplicate,
                    message: wait_message(next_eligible_at, now),
                    next_eligible_at: Some(next_eligible_at),
                });
            }
        }

        directory.record_scan(code, now)?;
        let member = directory.find(code).unwrap_or(member);
        Ok(ScanOutcome {
            code: code.to_string(),
            timestamp: now,
            member: Some(member),
            status: ScanStatus::Entry,
            message: "Entry recorded successfully".to_string(),
            next_eligible_at: None,
        })
    }
}

fn wait_message(next_eligible_at: u64, now: u64) -> String {
    let remaining_ms = next_eligible_at.saturating_sub(now);
    let minutes = remaining_ms.div_ceil(60_000).max(1);
    format!("Please wait {} more minute(s) between scans", minutes)
}
