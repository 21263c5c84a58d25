//! Feedback and result presentation.
//!
//! Feedback is fire-and-forget: a sink that cannot play audio or vibrate
//! (unsupported device) must not block or fail the scan pipeline, so sink
//! errors are swallowed and logged at most. The presenter holds the current
//! outcome and auto-dismisses it on a cancellable deadline.

use anyhow::Result;

use crate::{ScanOutcome, ScanStatus};

/// Single pulse for admissible scans.
pub const PULSE_ADMISSIBLE_MS: &[u64] = &[200];
/// Triple pulse for duplicate/unknown scans.
pub const PULSE_REJECTED_MS: &[u64] = &[100, 100, 100];

/// Audio tier for an outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioTone {
    Success,
    Failure,
}

impl AudioTone {
    pub fn frequency_hz(self) -> u32 {
        match self {
            AudioTone::Success => 800,
            AudioTone::Failure => 400,
        }
    }

    pub fn duration_ms(self) -> u64 {
        200
    }

    fn for_status(status: ScanStatus) -> Self {
        if status.is_admissible() {
            AudioTone::Success
        } else {
            AudioTone::Failure
        }
    }
}

/// Device seam for audio and haptic output.
pub trait FeedbackSink {
    fn play_tone(&mut self, tone: AudioTone) -> Result<()>;
    fn vibrate(&mut self, pattern: &[u64]) -> Result<()>;
}

/// Sink that logs instead of driving hardware. Used by the demo daemon.
pub struct LogFeedbackSink;

impl FeedbackSink for LogFeedbackSink {
    fn play_tone(&mut self, tone: AudioTone) -> Result<()> {
        log::info!(
            "feedback: {}Hz tone for {}ms",
            tone.frequency_hz(),
            tone.duration_ms()
        );
        Ok(())
    }

    fn vibrate(&mut self, pattern: &[u64]) -> Result<()> {
        log::info!("feedback: vibration pattern {:?}", pattern);
        Ok(())
    }
}

/// Routes an outcome to audio and vibration, honoring the settings
/// toggles.
pub struct FeedbackDispatcher {
    pub audio_enabled: bool,
    pub vibration_enabled: bool,
}

impl FeedbackDispatcher {
    pub fn new(audio_enabled: bool, vibration_enabled: bool) -> Self {
        Self {
            audio_enabled,
            vibration_enabled,
        }
    }

    pub fn dispatch(&self, sink: &mut dyn FeedbackSink, outcome: &ScanOutcome) {
        let admissible = outcome.status.is_admissible();
        if self.audio_enabled {
            if let Err(e) = sink.play_tone(AudioTone::for_status(outcome.status)) {
                log::debug!("audio feedback unsupported: {}", e);
            }
        }
        if self.vibration_enabled {
            let pattern = if admissible {
                PULSE_ADMISSIBLE_MS
            } else {
                PULSE_REJECTED_MS
            };
            if let Err(e) = sink.vibrate(pattern) {
                log::debug!("vibration feedback unsupported: {}", e);
            }
        }
    }
}

/// Holds the outcome being shown and its auto-dismiss deadline.
///
/// A delay of `0` disables auto-dismiss; the overlay then stays up until
/// `dismiss` is called. Dismissing early cancels the pending deadline.
pub struct ResultPresenter {
    auto_close_delay_ms: u64,
    current: Option<ScanOutcome>,
    close_at: Option<u64>,
}

impl ResultPresenter {
    pub fn new(auto_close_delay_ms: u64) -> Self {
        Self {
            auto_close_delay_ms,
            current: None,
            close_at: None,
        }
    }

    pub fn set_auto_close_delay(&mut self, delay_ms: u64) {
        self.auto_close_delay_ms = delay_ms;
    }

    /// Show an outcome, replacing whatever was up.
    pub fn present(&mut self, outcome: ScanOutcome, now: u64) {
        self.close_at = match self.auto_close_delay_ms {
            0 => None,
            delay => Some(now + delay),
        };
        self.current = Some(outcome);
    }

    /// Advance the auto-dismiss timer. Returns true when the overlay just
    /// closed.
    pub fn tick(&mut self, now: u64) -> bool {
        match self.close_at {
            Some(deadline) if now >= deadline => {
                self.dismiss();
                true
            }
            _ => false,
        }
    }

    /// Explicit dismissal; cancels the auto-close deadline. Idempotent.
    pub fn dismiss(&mut self) {
        self.current = None;
        self.close_at = None;
    }

    pub fn current(&self) -> Option<&ScanOutcome> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::test_member;
    use anyhow::anyhow;

    #[derive(Default)]
    struct RecordingSink {
        tones: Vec<AudioTone>,
        patterns: Vec<Vec<u64>>,
        broken: bool,
    }

    impl FeedbackSink for RecordingSink {
        fn play_tone(&mut self, tone: AudioTone) -> Result<()> {
            if self.broken {
                return Err(anyhow!("no audio device"));
            }
            self.tones.push(tone);
            Ok(())
        }

        fn vibrate(&mut self, pattern: &[u64]) -> Result<()> {
            if self.broken {
                return Err(anyhow!("no vibration motor"));
            }
            self.patterns.push(pattern.to_vec());
            Ok(())
        }
    }

    fn outcome(status: ScanStatus) -> ScanOutcome {
        ScanOutcome {
            code: "member-001".to_string(),
            timestamp: 0,
            member: Some(test_member("member-001")),
            status,
            message: String::new(),
            next_eligible_at: None,
        }
    }

    #[test]
    fn admissible_scans_get_success_tier() {
        let dispatcher = FeedbackDispatcher::new(true, true);
        let mut sink = RecordingSink::default();
        dispatcher.dispatch(&mut sink, &outcome(ScanStatus::Entry));
        assert_eq!(sink.tones, vec![AudioTone::Success]);
        assert_eq!(sink.patterns, vec![vec![200]]);
    }

    #[test]
    fn rejected_scans_get_failure_tier() {
        let dispatcher = FeedbackDispatcher::new(true, true);
        let mut sink = RecordingSink::default();
        dispatcher.dispatch(&mut sink, &outcome(ScanStatus::Duplicate));
        dispatcher.dispatch(&mut sink, &outcome(ScanStatus::Unknown));
        assert_eq!(sink.tones, vec![AudioTone::Failure, AudioTone::Failure]);
        assert_eq!(sink.patterns, vec![vec![100, 100, 100]; 2]);
    }

    #[test]
    fn disabled_toggles_mute_feedback() {
        let dispatcher = FeedbackDispatcher::new(false, false);
        let mut sink = RecordingSink::default();
        dispatcher.dispatch(&mut sink, &outcome(ScanStatus::Entry));
        assert!(sink.tones.is_empty());
        assert!(sink.patterns.is_empty());
    }

    #[test]
    fn sink_failures_are_swallowed() {
        let dispatcher = FeedbackDispatcher::new(true, true);
        let mut sink = RecordingSink {
            broken: true,
            ..Default::default()
        };
        // Must not panic or propagate.
        dispatcher.dispatch(&mut sink, &outcome(ScanStatus::Entry));
    }

    #[test]
    fn presenter_auto_dismisses_after_delay() {
        let mut presenter = ResultPresenter::new(3_000);
        presenter.present(outcome(ScanStatus::Entry), 1_000);
        assert!(presenter.current().is_some());
        assert!(!presenter.tick(3_999));
        assert!(presenter.tick(4_000));
        assert!(presenter.current().is_none());
        // No re-fire.
        assert!(!presenter.tick(10_000));
    }

    #[test]
    fn zero_delay_requires_explicit_dismissal() {
        let mut presenter = ResultPresenter::new(0);
        presenter.present(outcome(ScanStatus::Entry), 1_000);
        assert!(!presenter.tick(1_000_000));
        assert!(presenter.current().is_some());
        presenter.dismiss();
        assert!(presenter.current().is_none());
    }

    #[test]
    fn early_dismissal_cancels_the_deadline() {
        let mut presenter = ResultPresenter::new(3_000);
        presenter.present(outcome(ScanStatus::Entry), 1_000);
        presenter.dismiss();
        assert!(!presenter.tick(4_000));
    }
}
