//! Motion gating.
//!
//! The gate decides, on a fixed wall-clock tick, whether enough of the
//! frame changed to justify arming a scan session. The comparison itself is
//! a pluggable strategy so it can be tuned or swapped without touching the
//! state machine around it.
//!
//! Two rules bound the gate's behavior:
//! - it never runs its comparison while a scan session is active, and
//! - after a session ends it discards its stored previous frame and waits
//!   a settle interval before resuming, so residual motion (including the
//!   result overlay's own visual changes) cannot immediately re-arm it.

use crate::frame::{Frame, CHANNELS};

/// Per-channel absolute difference above which a sampled pixel counts as
/// changed.
pub const DEFAULT_CHANNEL_THRESHOLD: u8 = 30;

/// Frame comparison seam: fraction of sampled pixels that changed between
/// two frames, in `0.0..=1.0`.
pub trait MotionStrategy {
    fn changed_ratio(&self, prev: &Frame, curr: &Frame) -> f32;
}

/// Default strategy: sample every Nth pixel and compare RGB channels
/// against a per-channel threshold.
///
/// Sampling keeps the per-tick cost proportional to `1/stride` of the
/// frame instead of the whole frame.
pub struct SampledDiffStrategy {
    /// Compare every Nth pixel.
    pub pixel_stride: usize,
    /// Per-channel absolute difference threshold (of 255).
    pub channel_threshold: u8,
}

impl SampledDiffStrategy {
    pub fn new(pixel_stride: usize) -> Self {
        Self {
            pixel_stride: pixel_stride.max(1),
            channel_threshold: DEFAULT_CHANNEL_THRESHOLD,
        }
    }
}

impl MotionStrategy for SampledDiffStrategy {
    fn changed_ratio(&self, prev: &Frame, curr: &Frame) -> f32 {
        let prev_data = prev.bytes();
        let curr_data = curr.bytes();
        if prev_data.len() != curr_data.len() || prev_data.is_empty() {
            return 0.0;
        }

        let threshold = self.channel_threshold;
        let step = self.pixel_stride * CHANNELS;
        let mut sampled = 0u32;
        let mut changed = 0u32;

        let mut i = 0;
        while i + CHANNELS <= prev_data.len() {
            sampled += 1;
            let r = prev_data[i].abs_diff(curr_data[i]);
            let g = prev_data[i + 1].abs_diff(curr_data[i + 1]);
            let b = prev_data[i + 2].abs_diff(curr_data[i + 2]);
            if r > threshold || g > threshold || b > threshold {
                changed += 1;
            }
            i += step;
        }

        if sampled == 0 {
            return 0.0;
        }
        changed as f32 / sampled as f32
    }
}

/// Fixed-tick motion gate.
///
/// Driven by the engine's event loop: `observe` is called with the latest
/// frame and the current time, and returns true when a scan session should
/// be armed.
pub struct MotionGate {
    strategy: Box<dyn MotionStrategy>,
    motion_threshold: f32,
    tick_interval_ms: u64,
    settle_ms: u64,
    prev: Option<Frame>,
    next_tick_at: u64,
    resume_at: u64,
}

impl MotionGate {
    pub fn new(
        strategy: Box<dyn MotionStrategy>,
        motion_threshold: f32,
        tick_interval_ms: u64,
        settle_ms: u64,
    ) -> Self {
        Self {
            strategy,
            motion_threshold,
            tick_interval_ms,
            settle_ms,
            prev: None,
            next_tick_at: 0,
            resume_at: 0,
        }
    }

    /// Swap the comparison strategy and timing parameters in place. The
    /// stored frame and any pending deadlines survive the swap, so a
    /// settle interval already in progress stays in force.
    pub fn reconfigure(
        &mut self,
        strategy: Box<dyn MotionStrategy>,
        motion_threshold: f32,
        tick_interval_ms: u64,
        settle_ms: u64,
    ) {
        self.strategy = strategy;
        self.motion_threshold = motion_threshold;
        self.tick_interval_ms = tick_interval_ms;
        self.settle_ms = settle_ms;
    }

    /// Offer the gate the current frame. Returns true when enough of the
    /// frame changed since the last sampled one to warrant a scan.
    ///
    /// The caller must not invoke this while a scan session is active;
    /// `suspend` covers that case and keeps the tick skipped.
    pub fn observe(&mut self, now: u64, frame: &Frame) -> bool {
        if now < self.resume_at || now < self.next_tick_at {
            return false;
        }
        self.next_tick_at = now + self.tick_interval_ms;

        let detected = match &self.prev {
            Some(prev) => {
                let ratio = self.strategy.changed_ratio(prev, frame);
                ratio > self.motion_threshold
            }
            None => false,
        };
        self.prev = Some(frame.clone());
        detected
    }

    /// Skip the current tick without comparing or storing anything.
    /// Called instead of `observe` while a scan session is active.
    pub fn suspend(&mut self, now: u64) {
        if now >= self.next_tick_at {
            self.next_tick_at = now + self.tick_interval_ms;
        }
    }

    /// A scan session just ended (success or timeout): drop the stored
    /// frame and hold off comparisons for the settle interval.
    pub fn on_session_end(&mut self, now: u64) {
        self.prev = None;
        self.resume_at = now + self.settle_ms;
    }

    /// Cancel all gate state and deadlines. Used by teardown.
    pub fn reset(&mut self) {
        self.prev = None;
        self.next_tick_at = 0;
        self.resume_at = 0;
    }
}
