//! Scan sessions.
//!
//! A session is the bounded window of decode attempts opened by a motion
//! signal: `Idle -> Scanning -> (success | timeout) -> Idle`. While
//! scanning, every newly available frame is handed to the decode primitive;
//! the first hit ends the session and emits exactly one `ScanEvent`
//! downstream. If nothing decodes within the timeout the session ends
//! silently. Attempts are never pipelined: one decode at a time, and each
//! captured frame is attempted at most once.

use crate::frame::Frame;
use crate::ingest::camera::BADGE_MARKER;

/// Decode primitive seam. Assumed pure with respect to the pipeline: a
/// frame either yields a code or nothing. Real implementations wrap a QR
/// decoding library.
pub trait Decoder {
    fn decode(&mut self, frame: &Frame) -> Option<String>;
}

/// Decoder for synthetic frames: reads the badge marker the synthetic
/// camera stamps into pixel data. Used by tests and the demo daemon.
pub struct StubDecoder;

impl Decoder for StubDecoder {
    fn decode(&mut self, frame: &Frame) -> Option<String> {
        let data = frame.bytes();
        let payload = data.strip_prefix(BADGE_MARKER)?;
        let end = payload.iter().position(|&b| b == 0)?;
        let code = std::str::from_utf8(&payload[..end]).ok()?;
        if code.is_empty() {
            return None;
        }
        Some(code.to_string())
    }
}

/// Emitted at most once per session activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanEvent {
    pub code: String,
    /// Decode time, epoch milliseconds.
    pub at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Idle,
    Scanning { deadline: u64 },
}

/// The scan state machine.
pub struct ScanSession {
    timeout_ms: u64,
    state: SessionState,
    /// Sequence number of the last frame offered for decoding, so a
    /// re-pull of the same capture is not attempted twice.
    last_attempted_seq: Option<u64>,
}

impl ScanSession {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            state: SessionState::Idle,
            last_attempted_seq: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Scanning { .. })
    }

    /// Enter `Scanning` on a motion signal. Returns false (and does
    /// nothing) if a session is already active.
    pub fn activate(&mut self, now: u64) -> bool {
        if self.is_active() {
            return false;
        }
        self.state = SessionState::Scanning {
            deadline: now + self.timeout_ms,
        };
        self.last_attempted_seq = None;
        log::debug!("scan session armed, deadline in {}ms", self.timeout_ms);
        true
    }

    /// Offer a frame for decoding. Returns the terminal `ScanEvent` when
    /// the decode succeeds; the session is back to `Idle` afterwards.
    pub fn on_frame(
        &mut self,
        now: u64,
        frame: &Frame,
        decoder: &mut dyn Decoder,
    ) -> Option<ScanEvent> {
        let SessionState::Scanning { deadline } = self.state else {
            return None;
        };
        if now >= deadline {
            // The timeout fires on the next tick; never decode past it.
            return None;
        }
        if self.last_attempted_seq == Some(frame.seq()) {
            return None;
        }
        self.last_attempted_seq = Some(frame.seq());

        let code = decoder.decode(frame)?;
        self.state = SessionState::Idle;
        log::info!("scan session decoded code {}", code);
        Some(ScanEvent { code, at: now })
    }

    /// Advance timers. Returns true when the session just timed out (a
    /// normal transition, not an error); nothing is emitted in that case.
    pub fn tick(&mut self, now: u64) -> bool {
        if let SessionState::Scanning { deadline } = self.state {
            if now >= deadline {
                self.state = SessionState::Idle;
                log::debug!("scan session timed out without a decode");
                return true;
            }
        }
        false
    }

    /// Abandon any in-flight session without emitting. Idempotent.
    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
        self.last_attempted_seq = None;
    }
}
