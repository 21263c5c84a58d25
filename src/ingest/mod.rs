//! Frame ingestion sources.
//!
//! This module owns the camera device lifecycle. A `CameraSource` is opened
//! for a facing direction, exposes a pull-based "current frame" accessor,
//! and releases the device deterministically on close.
//!
//! The only backend built in is the synthetic camera (`stub://` devices),
//! used by tests and the kiosk demo daemon. Real capture backends plug in
//! behind the same surface.

pub mod camera;

pub use camera::{CameraConfig, CameraSource, CameraUnavailable};
