//! # Persistence Module
//!
//! ## Why This Module Exists
//! movepoint keeps a handful of tuning values (thresholds, filter weights,
//! the calibrated control region) across sessions. This module owns the
//! [`Settings`] model, its compiled-in defaults, and the [`SettingsStore`]
//! boundary the engine talks to.
//!
//! ## Error Handling Strategy
//! Fail-safe throughout: a missing settings file, a parse error, or a failed
//! write never stops the engine. A failed read is indistinguishable from "no
//! settings saved yet" and falls back to defaults; a failed write on
//! calibration commit is logged and the new region still takes effect in
//! memory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::controller::pose_filter::ControlRegion;

/// Default fraction of a wheel tick per plain-scroll fire.
pub const SCROLL_PERCENT_DEFAULT: f32 = 0.5;
/// Default movement threshold (device units) before a scroll fire.
pub const SCROLL_THRESHOLD_DEFAULT: f32 = 1.0;
/// Default threshold for app-switching; snap/zoom/desktop use 1.5x this.
pub const APP_SCROLL_THRESHOLD_DEFAULT: f32 = 5.0;
/// Default jitter threshold (device units) for the soft cursor deadzone.
pub const MOUSE_THRESHOLD_DEFAULT: f32 = 0.2;
/// Default weight of the current sample in the position average.
pub const CUR_POS_WEIGHT_DEFAULT: f32 = 0.4;
/// Default delay (ms) between a button press and movement taking effect.
pub const MOVE_DELAY_MS_DEFAULT: i64 = 200;
/// Base interval (ms) of the edge-hold rate limiter.
pub const AUTO_REPEAT_MS_DEFAULT: i64 = 25;

/// All persisted tuning values for one controller session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fraction of a wheel tick emitted per scroll fire; also scales the
    /// plain-scroll threshold.
    pub scroll_percent: f32,
    /// Movement (device units) needed for a plain scroll fire.
    pub scroll_threshold: f32,
    /// Movement needed while app-switching; snap/zoom/desktop gestures use
    /// 1.5x this value since they trigger bigger UI changes.
    pub app_scroll_threshold: f32,
    /// Deviation from the position average at which the cursor tracks 1:1.
    pub mouse_threshold: f32,
    /// Weight of the current sample in the position moving average, (0, 1].
    pub cur_pos_weight: f32,
    /// Hold-off between a button press and movement processing, for
    /// suppressing cursor shake while clicking.
    pub move_delay_ms: i64,
    /// Base interval of the logistic rate limiter for held-at-edge fires.
    pub auto_repeat_ms: i64,
    /// Extra depth-weighted stabilization per axis.
    pub extra_stable_x: bool,
    pub extra_stable_y: bool,
    /// Calibrated working volume.
    pub region: ControlRegion,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scroll_percent: SCROLL_PERCENT_DEFAULT,
            scroll_threshold: SCROLL_THRESHOLD_DEFAULT,
            app_scroll_threshold: APP_SCROLL_THRESHOLD_DEFAULT,
            mouse_threshold: MOUSE_THRESHOLD_DEFAULT,
            cur_pos_weight: CUR_POS_WEIGHT_DEFAULT,
            move_delay_ms: MOVE_DELAY_MS_DEFAULT,
            auto_repeat_ms: AUTO_REPEAT_MS_DEFAULT,
            extra_stable_x: false,
            extra_stable_y: false,
            region: ControlRegion::default(),
        }
    }
}

impl Settings {
    /// Scroll/long-press delay derived from the move delay. Larger than the
    /// movement-detection delay so scroll and drag gestures never classify
    /// as quick clicks.
    pub fn scroll_delay_ms(&self) -> i64 {
        (self.move_delay_ms + 100).max(300)
    }

    /// Clamps values a hand-edited settings file could have broken.
    pub fn sanitized(mut self) -> Self {
        if self.mouse_threshold <= 0.0 {
            self.mouse_threshold = 1e-6;
        }
        if self.scroll_percent < 0.01 {
            self.scroll_percent = SCROLL_PERCENT_DEFAULT;
        }
        if !(self.cur_pos_weight > 0.0 && self.cur_pos_weight <= 1.0) {
            self.cur_pos_weight = CUR_POS_WEIGHT_DEFAULT;
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("settings serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Storage boundary for [`Settings`]. The engine only loads at startup and
/// saves from the calibration sequencer.
pub trait SettingsStore: Send {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Settings>, StoreError>;
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
}

/// TOML file store under the user's config directory.
#[derive(Debug, Clone)]
pub struct TomlSettingsStore {
    path: PathBuf,
}

impl TomlSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `$XDG_CONFIG_HOME/movepoint/settings.toml` (or the platform
    /// equivalent), falling back to the working directory when no config dir
    /// is available.
    pub fn at_default_location() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join("movepoint").join("settings.toml"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SettingsStore for TomlSettingsStore {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {:?}, using defaults", self.path);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let settings: Settings = toml::from_str(&raw)?;
        info!("Loaded settings from {:?}", self.path);
        Ok(Some(settings.sanitized()))
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(settings)?;
        fs::write(&self.path, raw)?;
        info!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

/// In-memory store for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    slot: Mutex<Option<Settings>>,
    pub fail_saves: bool,
}

impl MemorySettingsStore {
    pub fn saved(&self) -> Option<Settings> {
        self.slot.lock().expect("settings slot poisoned").clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        Ok(self.slot.lock().expect("settings slot poisoned").clone())
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if self.fail_saves {
            warn!("MemorySettingsStore configured to fail saves");
            return Err(StoreError::Io(std::io::Error::other("save disabled")));
        }
        *self.slot.lock().expect("settings slot poisoned") = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_delay_floors_at_300ms() {
        let mut settings = Settings::default();
        assert_eq!(settings.scroll_delay_ms(), 300);

        settings.move_delay_ms = 400;
        assert_eq!(settings.scroll_delay_ms(), 500);

        settings.move_delay_ms = 0;
        assert_eq!(settings.scroll_delay_ms(), 300);
    }

    #[test]
    fn sanitize_restores_broken_values() {
        let settings = Settings {
            mouse_threshold: -1.0,
            scroll_percent: 0.0,
            cur_pos_weight: 3.0,
            ..Settings::default()
        }
        .sanitized();

        assert!(settings.mouse_threshold > 0.0);
        assert_eq!(settings.scroll_percent, SCROLL_PERCENT_DEFAULT);
        assert_eq!(settings.cur_pos_weight, CUR_POS_WEIGHT_DEFAULT);
    }

    #[test]
    fn toml_store_roundtrip_and_missing_file() {
        let dir = std::env::temp_dir().join("movepoint-store-test");
        let _ = fs::remove_dir_all(&dir);
        let store = TomlSettingsStore::new(dir.join("settings.toml"));

        assert!(store.load().expect("load").is_none());

        let mut settings = Settings::default();
        settings.scroll_threshold = 2.5;
        settings.region.top = 17.5;
        store.save(&settings).expect("save");

        let loaded = store.load().expect("load").expect("saved settings");
        assert_eq!(loaded, settings);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn memory_store_failed_save_is_an_error_not_a_panic() {
        let store = MemorySettingsStore {
            fail_saves: true,
            ..Default::default()
        };
        assert!(store.save(&Settings::default()).is_err());
        assert!(store.saved().is_none());
    }
}
