//! Scanner settings.
//!
//! Settings are an immutable snapshot consumed per session. The engine
//! stages a replacement snapshot and applies it on the next idle
//! transition, so an in-flight scan session is never reconfigured under
//! its feet.
//!
//! Loading follows the usual layering: optional JSON config file selected
//! by `SCANNER_CONFIG`, then environment overrides, then validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_AUTO_CLOSE_MS: u64 = 3_000;
const DEFAULT_MOTION_TICK_MS: u64 = 200;
const DEFAULT_SCAN_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_SETTLE_MS: u64 = 1_000;
const DEFAULT_DEDUP_WINDOW_MS: u64 = 60 * 60 * 1_000;

/// Which camera the source should open.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Rear camera, pointed at the badge.
    #[default]
    Environment,
    /// Front camera.
    User,
}

impl CameraFacing {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "environment" | "rear" => Ok(CameraFacing::Environment),
            "user" | "front" => Ok(CameraFacing::User),
            other => Err(anyhow!("unknown camera facing {:?}", other)),
        }
    }
}

/// Motion/scan sensitivity tier.
///
/// Tiers map to the motion gate's sampling stride and trigger threshold.
/// Medium is the tuned default; low trades latency for fewer false arms,
/// high the other way around.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl SensitivityTier {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" => Ok(SensitivityTier::Low),
            "medium" => Ok(SensitivityTier::Medium),
            "high" => Ok(SensitivityTier::High),
            other => Err(anyhow!("unknown sensitivity tier {:?}", other)),
        }
    }

    /// Fraction of sampled pixels that must change to arm a scan.
    pub fn motion_threshold(self) -> f32 {
        match self {
            SensitivityTier::Low => 0.04,
            SensitivityTier::Medium => 0.02,
            SensitivityTier::High => 0.01,
        }
    }

    /// Sample every Nth pixel when comparing frames.
    pub fn pixel_stride(self) -> usize {
        match self {
            SensitivityTier::Low => 8,
            SensitivityTier::Medium => 4,
            SensitivityTier::High => 2,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ScannerSettingsFile {
    camera_facing: Option<String>,
    audio_feedback: Option<bool>,
    vibration_feedback: Option<bool>,
    auto_close_delay_ms: Option<u64>,
    sensitivity: Option<String>,
    show_recent_scans: Option<bool>,
    offline_mode: Option<bool>,
    timing: Option<TimingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct TimingConfigFile {
    motion_tick_ms: Option<u64>,
    scan_timeout_ms: Option<u64>,
    settle_ms: Option<u64>,
    dedup_window_ms: Option<u64>,
}

/// Validated scanner settings snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannerSettings {
    pub camera_facing: CameraFacing,
    pub audio_feedback: bool,
    pub vibration_feedback: bool,
    /// Result overlay auto-dismiss delay. `0` means the overlay stays up
    /// until explicitly dismissed.
    pub auto_close_delay_ms: u64,
    pub sensitivity: SensitivityTier,
    pub show_recent_scans: bool,
    /// Force offline behavior regardless of the connectivity signal.
    pub offline_mode: bool,
    pub motion_tick_ms: u64,
    pub scan_timeout_ms: u64,
    pub settle_ms: u64,
    pub dedup_window_ms: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            camera_facing: CameraFacing::Environment,
            audio_feedback: true,
            vibration_feedback: true,
            auto_close_delay_ms: DEFAULT_AUTO_CLOSE_MS,
            sensitivity: SensitivityTier::Medium,
            show_recent_scans: true,
            offline_mode: false,
            motion_tick_ms: DEFAULT_MOTION_TICK_MS,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
        }
    }
}

impl ScannerSettings {
    /// Load settings from the `SCANNER_CONFIG` file (if set) and the
    /// environment.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SCANNER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_settings_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScannerSettingsFile) -> Result<Self> {
        let defaults = Self::default();
        let camera_facing = match file.camera_facing.as_deref() {
            Some(value) => CameraFacing::parse(value)?,
            None => defaults.camera_facing,
        };
        let sensitivity = match file.sensitivity.as_deref() {
            Some(value) => SensitivityTier::parse(value)?,
            None => defaults.sensitivity,
        };
        let timing = file.timing.unwrap_or_default();
        Ok(Self {
            camera_facing,
            audio_feedback: file.audio_feedback.unwrap_or(defaults.audio_feedback),
            vibration_feedback: file
                .vibration_feedback
                .unwrap_or(defaults.vibration_feedback),
            auto_close_delay_ms: file
                .auto_close_delay_ms
                .unwrap_or(defaults.auto_close_delay_ms),
            sensitivity,
            show_recent_scans: file.show_recent_scans.unwrap_or(defaults.show_recent_scans),
            offline_mode: file.offline_mode.unwrap_or(defaults.offline_mode),
            motion_tick_ms: timing.motion_tick_ms.unwrap_or(defaults.motion_tick_ms),
            scan_timeout_ms: timing.scan_timeout_ms.unwrap_or(defaults.scan_timeout_ms),
            settle_ms: timing.settle_ms.unwrap_or(defaults.settle_ms),
            dedup_window_ms: timing.dedup_window_ms.unwrap_or(defaults.dedup_window_ms),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(facing) = std::env::var("SCANNER_CAMERA_FACING") {
            if !facing.trim().is_empty() {
                self.camera_facing = CameraFacing::parse(&facing)?;
            }
        }
        if let Ok(tier) = std::env::var("SCANNER_SENSITIVITY") {
            if !tier.trim().is_empty() {
                self.sensitivity = SensitivityTier::parse(&tier)?;
            }
        }
        if let Ok(delay) = std::env::var("SCANNER_AUTO_CLOSE_MS") {
            self.auto_close_delay_ms = delay.parse().map_err(|_| {
                anyhow!("SCANNER_AUTO_CLOSE_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(window) = std::env::var("SCANNER_DEDUP_WINDOW_MS") {
            self.dedup_window_ms = window.parse().map_err(|_| {
                anyhow!("SCANNER_DEDUP_WINDOW_MS must be an integer number of milliseconds")
            })?;
        }
        if let Ok(offline) = std::env::var("SCANNER_OFFLINE_MODE") {
            self.offline_mode = matches!(offline.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }

    /// Reject snapshots the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.motion_tick_ms == 0 {
            return Err(anyhow!("motion_tick_ms must be greater than zero"));
        }
        if self.scan_timeout_ms == 0 {
            return Err(anyhow!("scan_timeout_ms must be greater than zero"));
        }
        if self.dedup_window_ms == 0 {
            return Err(anyhow!("dedup_window_ms must be greater than zero"));
        }
        Ok(())
    }
}

fn read_settings_file(path: &Path) -> Result<ScannerSettingsFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_values() {
        let cfg = ScannerSettings::default();
        assert_eq!(cfg.motion_tick_ms, 200);
        assert_eq!(cfg.scan_timeout_ms, 3_000);
        assert_eq!(cfg.settle_ms, 1_000);
        assert_eq!(cfg.dedup_window_ms, 3_600_000);
        assert_eq!(cfg.sensitivity.motion_threshold(), 0.02);
        assert_eq!(cfg.sensitivity.pixel_stride(), 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn facing_and_tier_parse_aliases() {
        assert_eq!(
            CameraFacing::parse("rear").unwrap(),
            CameraFacing::Environment
        );
        assert_eq!(CameraFacing::parse("USER").unwrap(), CameraFacing::User);
        assert!(CameraFacing::parse("sideways").is_err());
        assert_eq!(
            SensitivityTier::parse("high").unwrap(),
            SensitivityTier::High
        );
        assert!(SensitivityTier::parse("max").is_err());
    }

    #[test]
    fn zero_timers_are_rejected() {
        let mut cfg = ScannerSettings::default();
        cfg.motion_tick_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ScannerSettings::default();
        cfg.dedup_window_ms = 0;
        assert!(cfg.validate().is_err());

        // Zero auto-close is legal: it means "dismiss explicitly".
        let mut cfg = ScannerSettings::default();
        cfg.auto_close_delay_ms = 0;
        assert!(cfg.validate().is_ok());
    }
}
