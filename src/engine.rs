//! Scanner engine event loop.
//!
//! `ScannerEngine` owns every component of the pipeline and drives it from
//! a single cooperative `tick`. Nothing here spawns a worker: suspension
//! points are the caller's tick cadence, and every timer (motion tick,
//! scan timeout, settle delay, result auto-close) is an explicit deadline
//! with a cancel path exercised by `shutdown`.
//!
//! Per tick the engine:
//! 1. advances the presenter's auto-close deadline
//! 2. advances the scan session's timeout
//! 3. pulls the current frame and routes it to the active session (decode
//!    attempt) or to the motion gate (arm decision) - never both
//!
//! Settings replacement is staged and applied on the next idle transition
//! so an in-flight session is never reconfigured.

use anyhow::Result;
use std::collections::VecDeque;

use crate::config::ScannerSettings;
use crate::directory::MemberDirectory;
use crate::feedback::{FeedbackDispatcher, FeedbackSink, ResultPresenter};
use crate::ingest::CameraSource;
use crate::motion::{MotionGate, SampledDiffStrategy};
use crate::queue::{OfflineQueue, SyncEndpoint};
use crate::resolver::AttendanceResolver;
use crate::session::{Decoder, ScanEvent, ScanSession};
use crate::ScanOutcome;

/// Outcomes kept in the recent-scans history, newest first.
const RECENT_SCANS_CAP: usize = 10;

pub struct ScannerEngine {
    settings: ScannerSettings,
    pending_settings: Option<ScannerSettings>,
    camera: CameraSource,
    gate: MotionGate,
    session: ScanSession,
    resolver: AttendanceResolver,
    directory: Box<dyn MemberDirectory>,
    decoder: Box<dyn Decoder>,
    queue: OfflineQueue,
    endpoint: Box<dyn SyncEndpoint>,
    dispatcher: FeedbackDispatcher,
    sink: Box<dyn FeedbackSink>,
    presenter: ResultPresenter,
    history: VecDeque<ScanOutcome>,
    connectivity_online: bool,
    running: bool,
}

impl ScannerEngine {
    pub fn new(
        settings: ScannerSettings,
        camera: CameraSource,
        directory: Box<dyn MemberDirectory>,
        decoder: Box<dyn Decoder>,
        endpoint: Box<dyn SyncEndpoint>,
        sink: Box<dyn FeedbackSink>,
    ) -> Result<Self> {
        settings.validate()?;
        let online = !settings.offline_mode;
        Ok(Self {
            gate: gate_from(&settings),
            session: ScanSession::new(settings.scan_timeout_ms),
            resolver: AttendanceResolver::new(settings.dedup_window_ms),
            dispatcher: FeedbackDispatcher::new(
                settings.audio_feedback,
                settings.vibration_feedback,
            ),
            presenter: ResultPresenter::new(settings.auto_close_delay_ms),
            queue: OfflineQueue::new(online),
            settings,
            pending_settings: None,
            camera,
            directory,
            decoder,
            endpoint,
            sink,
            history: VecDeque::with_capacity(RECENT_SCANS_CAP),
            connectivity_online: true,
            running: false,
        })
    }

    /// Open the camera and start ticking. Fails with `CameraUnavailable`
    /// when the device cannot be opened; retrying is just calling `start`
    /// again.
    pub fn start(&mut self) -> Result<()> {
        self.camera.open(self.settings.camera_facing)?;
        self.running = true;
        log::info!("scanner engine running");
        Ok(())
    }

    /// Advance the pipeline to `now` (epoch milliseconds).
    pub fn tick(&mut self, now: u64) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        if self.presenter.tick(now) {
            log::debug!("result overlay auto-dismissed");
        }

        if self.session.tick(now) {
            // Normal timeout, nothing emitted.
            self.gate.on_session_end(now);
            self.apply_pending_settings()?;
        }

        let Some(frame) = self.camera.current_frame() else {
            return Ok(());
        };

        if self.session.is_active() {
            // The gate never compares while a session is running.
            self.gate.suspend(now);
            if let Some(event) = self.session.on_frame(now, &frame, self.decoder.as_mut()) {
                self.handle_event(event)?;
                self.gate.on_session_end(now);
                self.apply_pending_settings()?;
            }
        } else if self.gate.observe(now, &frame) {
            log::debug!("motion detected, arming scan session");
            self.session.activate(now);
        }

        Ok(())
    }

    fn handle_event(&mut self, event: ScanEvent) -> Result<()> {
        let outcome = self
            .resolver
            .resolve_event(self.directory.as_mut(), &event)?;
        log::info!(
            "scan {}: {:?} ({})",
            outcome.code,
            outcome.status,
            outcome.message
        );

        self.dispatcher.dispatch(self.sink.as_mut(), &outcome);

        self.history.push_front(outcome.clone());
        self.history.truncate(RECENT_SCANS_CAP);

        self.queue.enqueue(&outcome);
        self.presenter.present(outcome, event.at);
        Ok(())
    }

    /// Connectivity signal from the platform. Coming back online triggers
    /// the queue's one-shot auto-flush.
    pub fn set_connectivity(&mut self, online: bool) {
        self.connectivity_online = online;
        let effective = online && !self.settings.offline_mode;
        self.queue.set_online(effective, self.endpoint.as_mut());
    }

    /// Manual sync trigger (the "Sync Now" affordance).
    pub fn flush_now(&mut self) {
        self.queue.flush(self.endpoint.as_mut());
    }

    /// Stage a new settings snapshot. Applied immediately when idle,
    /// otherwise on the next idle transition.
    pub fn update_settings(&mut self, settings: ScannerSettings) -> Result<()> {
        settings.validate()?;
        self.pending_settings = Some(settings);
        if !self.session.is_active() {
            self.apply_pending_settings()?;
        }
        Ok(())
    }

    fn apply_pending_settings(&mut self) -> Result<()> {
        let Some(settings) = self.pending_settings.take() else {
            return Ok(());
        };
        if settings.camera_facing != self.settings.camera_facing && self.camera.is_open() {
            self.camera.switch_facing(settings.camera_facing)?;
        }
        // Reconfigure the gate in place: a settle interval started by the
        // session that just ended must survive the settings swap.
        self.gate.reconfigure(
            Box::new(SampledDiffStrategy::new(settings.sensitivity.pixel_stride())),
            settings.sensitivity.motion_threshold(),
            settings.motion_tick_ms,
            settings.settle_ms,
        );
        self.session = ScanSession::new(settings.scan_timeout_ms);
        self.resolver = AttendanceResolver::new(settings.dedup_window_ms);
        self.dispatcher =
            FeedbackDispatcher::new(settings.audio_feedback, settings.vibration_feedback);
        self.presenter
            .set_auto_close_delay(settings.auto_close_delay_ms);
        self.settings = settings;

        let effective = self.connectivity_online && !self.settings.offline_mode;
        self.queue.set_online(effective, self.endpoint.as_mut());
        log::info!("scanner settings applied");
        Ok(())
    }

    /// Dismiss the current result overlay, cancelling its auto-close.
    pub fn dismiss_result(&mut self) {
        self.presenter.dismiss();
    }

    pub fn current_result(&self) -> Option<&ScanOutcome> {
        self.presenter.current()
    }

    /// Recent outcomes, newest first.
    pub fn history(&self) -> impl Iterator<Item = &ScanOutcome> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Entries waiting for a successful flush.
    pub fn pending_sync(&self) -> usize {
        self.queue.pending()
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Tear the engine down: close the camera, abandon any in-flight
    /// session, cancel every deadline. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.camera.close();
        self.session.cancel();
        self.gate.reset();
        self.presenter.dismiss();
        if self.running {
            self.running = false;
            log::info!("scanner engine stopped");
        }
    }
}

fn gate_from(settings: &ScannerSettings) -> MotionGate {
    MotionGate::new(
        Box::new(SampledDiffStrategy::new(settings.sensitivity.pixel_stride())),
        settings.sensitivity.motion_threshold(),
        settings.motion_tick_ms,
        settings.settle_ms,
    )
}
