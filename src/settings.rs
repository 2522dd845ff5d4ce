// User configuration: per-direction gesture actions plus the wake-me
// watchdog, serialized as one JSON blob.
//
// The settings table is owned behind an RwLock; every mutation goes through
// the command layer, which commits the updated table to disk immediately
// (read-after-write consistency is the contract, not the mutation mechanism).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::action::PresetAction;
use crate::analysis::recognizer::{DirectionSensitivities, GestureDirection};
use crate::input::RecordedShortcut;

pub const DEFAULT_SENSITIVITY: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    Preset,
    Shortcut,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DirectionSettings {
    pub enabled: bool,
    pub mode: ActionMode,
    pub preset: PresetAction,
    pub sensitivity: f64,
    pub shortcut: Option<RecordedShortcut>,
}

impl DirectionSettings {
    fn with_preset(preset: PresetAction) -> Self {
        Self {
            enabled: true,
            mode: ActionMode::Preset,
            preset,
            sensitivity: DEFAULT_SENSITIVITY,
            shortcut: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WakeMeConfig {
    pub enabled: bool,
    pub sensitivity: f64,
    pub timeout_secs: u64,
    pub sound: String,
}

impl Default for WakeMeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sensitivity: 0.5,
            timeout_secs: 300,
            sound: "Submarine".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    #[serde(default = "default_directions")]
    pub directions: HashMap<GestureDirection, DirectionSettings>,
    #[serde(default)]
    pub wake_me: WakeMeConfig,
}

fn default_directions() -> HashMap<GestureDirection, DirectionSettings> {
    HashMap::from([
        (
            GestureDirection::Up,
            DirectionSettings::with_preset(PresetAction::VolumeUp),
        ),
        (
            GestureDirection::Down,
            DirectionSettings::with_preset(PresetAction::VolumeDown),
        ),
        (
            GestureDirection::Left,
            DirectionSettings::with_preset(PresetAction::PreviousTrack),
        ),
        (
            GestureDirection::Right,
            DirectionSettings::with_preset(PresetAction::NextTrack),
        ),
    ])
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            directions: default_directions(),
            wake_me: WakeMeConfig::default(),
        }
    }
}

impl Settings {
    /// Settings for one direction, falling back to that direction's default
    /// if an older blob is missing the entry.
    pub fn direction(&self, direction: GestureDirection) -> DirectionSettings {
        self.directions.get(&direction).cloned().unwrap_or_else(|| {
            default_directions()
                .remove(&direction)
                .expect("defaults cover all directions")
        })
    }

    pub fn direction_mut(&mut self, direction: GestureDirection) -> &mut DirectionSettings {
        self.directions.entry(direction).or_insert_with(|| {
            default_directions()
                .remove(&direction)
                .expect("defaults cover all directions")
        })
    }

    /// Live per-direction sensitivities for the recognizer.
    pub fn sensitivities(&self) -> DirectionSensitivities {
        DirectionSensitivities {
            up: self.direction(GestureDirection::Up).sensitivity,
            down: self.direction(GestureDirection::Down).sensitivity,
            left: self.direction(GestureDirection::Left).sensitivity,
            right: self.direction(GestureDirection::Right).sensitivity,
        }
    }
}

pub type SharedSettings = Arc<RwLock<Settings>>;

pub fn shared(settings: Settings) -> SharedSettings {
    Arc::new(RwLock::new(settings))
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Opaque blob persistence. Loaded once at startup, saved after every
/// mutation. IO failures degrade to defaults / an error log, never a panic.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// ~/.headwave/settings.json (USERPROFILE on Windows-style homes).
    pub fn default_path() -> PathBuf {
        let base = std::env::var("USERPROFILE")
            .or_else(|_| std::env::var("HOME"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(base).join(".headwave").join("settings.json")
    }

    pub fn load(&self) -> Settings {
        match fs::read_to_string(&self.path) {
            Ok(blob) => match serde_json::from_str(&blob) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::error!("settings blob unreadable ({}); using defaults", e);
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn save(&self, settings: &Settings) {
        if let Some(parent) = self.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let blob = match serde_json::to_string_pretty(settings) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("settings serialization failed: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(&self.path, blob) {
            tracing::error!("settings write to {:?} failed: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MOD_COMMAND, MOD_SHIFT};

    #[test]
    fn defaults_cover_all_directions() {
        let settings = Settings::default();
        for direction in GestureDirection::ALL {
            let d = settings.direction(direction);
            assert!(d.enabled);
            assert_eq!(d.mode, ActionMode::Preset);
            assert!((d.sensitivity - DEFAULT_SENSITIVITY).abs() < 1e-12);
            assert!(d.shortcut.is_none());
        }
    }

    #[test]
    fn mixed_mode_table_round_trips_identically() {
        let mut settings = Settings::default();
        {
            let up = settings.direction_mut(GestureDirection::Up);
            up.mode = ActionMode::Shortcut;
            up.shortcut = Some(RecordedShortcut::new(0, MOD_SHIFT | MOD_COMMAND));
            up.sensitivity = 1.0;
        }
        {
            let down = settings.direction_mut(GestureDirection::Down);
            down.enabled = false;
            down.sensitivity = 0.0;
        }
        {
            let left = settings.direction_mut(GestureDirection::Left);
            left.preset = PresetAction::Desktop(3);
        }
        settings.wake_me = WakeMeConfig {
            enabled: true,
            sensitivity: 0.25,
            timeout_secs: 45,
            sound: "Glass".to_string(),
        };

        let blob = serde_json::to_string(&settings).unwrap();
        let restored: Settings = serde_json::from_str(&blob).unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn empty_blob_falls_back_to_full_defaults() {
        let restored: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(restored, Settings::default());
    }

    #[test]
    fn store_round_trip_on_disk() {
        let dir = std::env::temp_dir().join(format!("headwave-test-{}", std::process::id()));
        let store = SettingsStore::new(dir.join("settings.json"));

        let mut settings = Settings::default();
        settings.direction_mut(GestureDirection::Right).sensitivity = 0.33;
        store.save(&settings);
        assert_eq!(store.load(), settings);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn sensitivities_reflect_live_table() {
        let mut settings = Settings::default();
        settings.direction_mut(GestureDirection::Left).sensitivity = 0.1;
        let s = settings.sensitivities();
        assert!((s.left - 0.1).abs() < 1e-12);
        assert!((s.up - DEFAULT_SENSITIVITY).abs() < 1e-12);
    }
}
