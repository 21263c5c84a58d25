//! Camera frame source.
//!
//! `CameraSource` owns the device handle. Opening can fail with
//! `CameraUnavailable` (permission denied, no matching device); the caller
//! surfaces that and may retry, and a failed open never leaks a previous
//! handle. Switching facing direction is close-then-reopen, never a live
//! reconfiguration.
//!
//! Frames are pulled, not pushed: `current_frame` returns the latest
//! capture or `None` when the device is closed or has not produced a frame
//! yet.

use anyhow::Result;
use rand::Rng;

use crate::config::CameraFacing;
use crate::frame::{Frame, CHANNELS};

/// Marker prefix the synthetic camera stamps into frames that carry a
/// decodable badge. The stub decoder looks for this.
pub(crate) const BADGE_MARKER: &[u8] = b"BADGE:";

/// The camera could not be opened: permission denied or no matching device.
///
/// Fatal to the source until a later `open` succeeds.
#[derive(Clone, Debug)]
pub struct CameraUnavailable {
    pub reason: String,
}

impl std::fmt::Display for CameraUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "camera unavailable: {}", self.reason)
    }
}

impl std::error::Error for CameraUnavailable {}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device selector. `stub://<name>` opens the synthetic camera;
    /// `denied://<name>` simulates a permission rejection.
    pub device: String,
    /// Resolution hint. The device may deliver something else.
    pub width: u32,
    pub height: u32,
    /// Badge codes the synthetic camera occasionally presents, for demos.
    pub demo_codes: Vec<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://badge_station".to_string(),
            width: 640,
            height: 480,
            demo_codes: Vec::new(),
        }
    }
}

/// Camera source with an explicit open/close lifecycle.
pub struct CameraSource {
    config: CameraConfig,
    facing: CameraFacing,
    backend: Option<CameraBackend>,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            facing: CameraFacing::default(),
            backend: None,
        }
    }

    /// Open the device for the given facing direction.
    ///
    /// Any previously held handle is released first, so a failed open (and
    /// a later retry) never leaks the old device.
    pub fn open(&mut self, facing: CameraFacing) -> Result<()> {
        self.close();
        self.facing = facing;
        if let Some(name) = self.config.device.strip_prefix("stub://") {
            log::info!("CameraSource: opened {} facing {:?} (synthetic)", name, facing);
            self.backend = Some(CameraBackend::Synthetic(SyntheticCamera::new(
                self.config.clone(),
            )));
            return Ok(());
        }
        if self.config.device.starts_with("denied://") {
            return Err(CameraUnavailable {
                reason: format!("permission denied for {}", self.config.device),
            }
            .into());
        }
        Err(CameraUnavailable {
            reason: format!("no capture backend for {}", self.config.device),
        }
        .into())
    }

    /// Latest frame, or `None` when closed or before the first capture.
    pub fn current_frame(&mut self) -> Option<Frame> {
        match self.backend.as_mut()? {
            CameraBackend::Synthetic(camera) => camera.pull(),
        }
    }

    /// Release the device. Safe to call on an already-closed source.
    pub fn close(&mut self) {
        if self.backend.take().is_some() {
            log::info!("CameraSource: closed {}", self.config.device);
        }
    }

    /// Switch facing direction: close, then reopen with the new facing.
    pub fn switch_facing(&mut self, facing: CameraFacing) -> Result<()> {
        self.close();
        self.open(facing)
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub:// devices)
// ----------------------------------------------------------------------------

/// Synthetic capture backend.
///
/// Produces a mostly static scene whose state shifts every 50 frames
/// (enough to trip the motion gate), and occasionally stamps a demo badge
/// code into the pixel data for the stub decoder to find.
struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
        }
    }

    fn pull(&mut self) -> Option<Frame> {
        self.frame_count += 1;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = self.generate_pixels();
        self.maybe_stamp_badge(&mut pixels);

        match Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        ) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("synthetic camera produced a bad buffer: {}", e);
                None
            }
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * CHANNELS;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.scene_state as u64 * 64) % 256) as u8;
        }
        pixels
    }

    /// Stamp a random demo badge marker shortly after each scene change,
    /// so the motion-then-decode path stays exercisable without hardware.
    fn maybe_stamp_badge(&self, pixels: &mut [u8]) {
        if self.config.demo_codes.is_empty() || self.frame_count % 50 > 10 {
            return;
        }
        let idx = rand::thread_rng().gen_range(0..self.config.demo_codes.len());
        let code = &self.config.demo_codes[idx];
        stamp_badge(pixels, code);
    }
}

/// Write `BADGE:<code>\0` at the start of a pixel buffer.
pub(crate) fn stamp_badge(pixels: &mut [u8], code: &str) {
    let needed = BADGE_MARKER.len() + code.len() + 1;
    if pixels.len() < needed {
        return;
    }
    pixels[..BADGE_MARKER.len()].copy_from_slice(BADGE_MARKER);
    pixels[BADGE_MARKER.len()..BADGE_MARKER.len() + code.len()].copy_from_slice(code.as_bytes());
    pixels[BADGE_MARKER.len() + code.len()] = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            width: 64,
            height: 48,
            demo_codes: Vec::new(),
        }
    }

    #[test]
    fn open_produces_frames_with_increasing_seq() -> Result<()> {
        let mut source = CameraSource::new(stub_config());
        source.open(CameraFacing::Environment)?;

        let first = source.current_frame().expect("first frame");
        let second = source.current_frame().expect("second frame");
        assert!(second.seq() > first.seq());
        assert_eq!(first.width(), 64);
        assert_eq!(first.height(), 48);
        Ok(())
    }

    #[test]
    fn denied_device_fails_open_and_frames_stay_absent() {
        let mut source = CameraSource::new(CameraConfig {
            device: "denied://front".to_string(),
            ..stub_config()
        });

        let err = source.open(CameraFacing::Environment).unwrap_err();
        assert!(err.downcast_ref::<CameraUnavailable>().is_some());
        assert!(!source.is_open());
        assert!(source.current_frame().is_none());
    }

    #[test]
    fn unknown_backend_fails_open() {
        let mut source = CameraSource::new(CameraConfig {
            device: "v4l2:///dev/video9".to_string(),
            ..stub_config()
        });
        let err = source.open(CameraFacing::Environment).unwrap_err();
        assert!(err.downcast_ref::<CameraUnavailable>().is_some());
    }

    #[test]
    fn close_is_idempotent_and_stops_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config());
        source.open(CameraFacing::Environment)?;
        assert!(source.current_frame().is_some());

        source.close();
        source.close();
        assert!(!source.is_open());
        assert!(source.current_frame().is_none());
        Ok(())
    }

    #[test]
    fn retry_after_denied_open_succeeds_with_working_device() -> Result<()> {
        let mut source = CameraSource::new(CameraConfig {
            device: "denied://front".to_string(),
            ..stub_config()
        });
        assert!(source.open(CameraFacing::Environment).is_err());

        // Operator fixes permissions; retry against a good device.
        source.config.device = "stub://front".to_string();
        source.open(CameraFacing::Environment)?;
        assert!(source.current_frame().is_some());
        Ok(())
    }

    #[test]
    fn switch_facing_reopens_device() -> Result<()> {
        let mut source = CameraSource::new(stub_config());
        source.open(CameraFacing::Environment)?;
        source.switch_facing(CameraFacing::User)?;
        assert_eq!(source.facing(), CameraFacing::User);
        assert!(source.is_open());
        Ok(())
    }

    #[test]
    fn stamped_badge_survives_in_pixels() {
        let mut pixels = vec![9u8; 64];
        stamp_badge(&mut pixels, "member-001");
        assert!(pixels.starts_with(b"BADGE:member-001\0"));
    }
}
