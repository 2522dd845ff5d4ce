// Action dispatch engine: gesture (or watchdog alarm) → external side effect.
//
// The engine itself holds no mutable state beyond a cached permission flag;
// side effects are strictly external (synthetic input events, audio) and go
// through the `EventPoster` / `SoundPlayer` traits so the pipeline is
// testable without touching the OS.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analysis::recognizer::GestureDirection;
use crate::input::{MOD_COMMAND, MOD_CONTROL};
use crate::settings::{ActionMode, DirectionSettings, WakeMeConfig};

pub mod poster;
pub mod sound;

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Fixed system-control codes understood by the event poster. Values are the
/// NX_KEYTYPE_* constants consumed by system-defined media key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemControl {
    VolumeUp,
    VolumeDown,
    Mute,
    BrightnessUp,
    BrightnessDown,
    PlayPause,
    NextTrack,
    PreviousTrack,
}

impl SystemControl {
    pub fn nx_code(self) -> u32 {
        match self {
            SystemControl::VolumeUp => 0,
            SystemControl::VolumeDown => 1,
            SystemControl::BrightnessUp => 2,
            SystemControl::BrightnessDown => 3,
            SystemControl::Mute => 7,
            SystemControl::PlayPause => 16,
            SystemControl::NextTrack => 17,
            SystemControl::PreviousTrack => 18,
        }
    }
}

/// A fixed, named action dispatched without user-recorded key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetAction {
    VolumeUp,
    VolumeDown,
    Mute,
    BrightnessUp,
    BrightnessDown,
    PlayPause,
    NextTrack,
    PreviousTrack,
    /// ⌘Q to the frontmost application.
    QuitFrontApp,
    /// ⌃1..⌃8 desktop switching.
    Desktop(u8),
}

/// What a preset resolves to at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetBinding {
    System(SystemControl),
    Keys { key_code: u16, modifier_mask: u32 },
}

impl PresetAction {
    pub fn binding(self) -> PresetBinding {
        match self {
            PresetAction::VolumeUp => PresetBinding::System(SystemControl::VolumeUp),
            PresetAction::VolumeDown => PresetBinding::System(SystemControl::VolumeDown),
            PresetAction::Mute => PresetBinding::System(SystemControl::Mute),
            PresetAction::BrightnessUp => PresetBinding::System(SystemControl::BrightnessUp),
            PresetAction::BrightnessDown => PresetBinding::System(SystemControl::BrightnessDown),
            PresetAction::PlayPause => PresetBinding::System(SystemControl::PlayPause),
            PresetAction::NextTrack => PresetBinding::System(SystemControl::NextTrack),
            PresetAction::PreviousTrack => PresetBinding::System(SystemControl::PreviousTrack),
            PresetAction::QuitFrontApp => PresetBinding::Keys {
                key_code: 12, // kVK_ANSI_Q
                modifier_mask: MOD_COMMAND,
            },
            PresetAction::Desktop(n) => PresetBinding::Keys {
                key_code: digit_key_code(n),
                modifier_mask: MOD_CONTROL,
            },
        }
    }
}

/// kVK_ANSI_1..kVK_ANSI_8. Out-of-range desktops clamp to 1.
fn digit_key_code(n: u8) -> u16 {
    match n {
        2 => 19,
        3 => 20,
        4 => 21,
        5 => 23,
        6 => 22,
        7 => 26,
        8 => 28,
        _ => 18,
    }
}

// ---------------------------------------------------------------------------
// External service traits
// ---------------------------------------------------------------------------

/// OS-level synthetic input. `post_key` synthesizes one key transition with
/// the canonical modifier mask applied; `post_system_control` synthesizes the
/// down+up pair for one media/brightness control internally (the pair is a
/// single opaque unit at the OS layer).
pub trait EventPoster: Send + Sync {
    fn post_key(&self, key_code: u16, modifier_mask: u32, is_press: bool) -> Result<(), String>;
    fn post_system_control(&self, control: SystemControl) -> Result<(), String>;
}

/// Fire-and-forget audio. `play` reports whether the named sound resolved;
/// the caller decides on the beep fallback.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, name: &str) -> bool;
    fn beep(&self);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Why a dispatch produced no visible effect (all non-fatal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Posted,
    DirectionDisabled,
    /// Shortcut mode with nothing recorded yet.
    NothingRecorded,
    /// Input-synthesis permission denied; attempt skipped, never queued.
    PermissionDenied,
}

/// Event synthesis failed. Logged, never retried — a missed replay is
/// recoverable by repeating the gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    Post(String),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Post(msg) => write!(f, "event synthesis failed: {}", msg),
        }
    }
}

pub struct ActionDispatcher {
    poster: Box<dyn EventPoster>,
    sound: Box<dyn SoundPlayer>,
    permission_probe: Box<dyn Fn() -> bool + Send + Sync>,
    /// Last probed permission state, polled by the presentation layer.
    permission_granted: Arc<AtomicBool>,
}

impl ActionDispatcher {
    pub fn new(
        poster: Box<dyn EventPoster>,
        sound: Box<dyn SoundPlayer>,
        permission_probe: Box<dyn Fn() -> bool + Send + Sync>,
    ) -> Self {
        let granted = permission_probe();
        Self {
            poster,
            sound,
            permission_probe,
            permission_granted: Arc::new(AtomicBool::new(granted)),
        }
    }

    /// Platform-default dispatcher.
    pub fn system() -> Self {
        Self::new(
            poster::system_poster(),
            sound::system_player(),
            Box::new(poster::accessibility_trusted),
        )
    }

    /// Shared flag the status snapshot reads.
    pub fn permission_flag(&self) -> Arc<AtomicBool> {
        self.permission_granted.clone()
    }

    /// Re-probe the OS permission and cache the result.
    pub fn refresh_permission(&self) -> bool {
        let granted = (self.permission_probe)();
        self.permission_granted.store(granted, Ordering::Release);
        granted
    }

    /// Replay the action configured for `direction`.
    pub fn dispatch(
        &self,
        direction: GestureDirection,
        settings: &DirectionSettings,
    ) -> Result<DispatchOutcome, DispatchError> {
        if !settings.enabled {
            return Ok(DispatchOutcome::DirectionDisabled);
        }

        // Permission is consulted once per trigger, mirroring the polled flag.
        if !self.refresh_permission() {
            tracing::warn!(?direction, "dispatch skipped: input synthesis permission denied");
            return Ok(DispatchOutcome::PermissionDenied);
        }

        match settings.mode {
            ActionMode::Preset => self.dispatch_preset(direction, settings.preset),
            ActionMode::Shortcut => match &settings.shortcut {
                Some(shortcut) => {
                    tracing::info!(?direction, shortcut = %shortcut.display, "replaying shortcut");
                    self.post_pair(shortcut.key_code, shortcut.modifier_mask)
                }
                None => {
                    tracing::info!(?direction, "no shortcut recorded; nothing dispatched");
                    Ok(DispatchOutcome::NothingRecorded)
                }
            },
        }
    }

    fn dispatch_preset(
        &self,
        direction: GestureDirection,
        preset: PresetAction,
    ) -> Result<DispatchOutcome, DispatchError> {
        tracing::info!(?direction, ?preset, "dispatching preset");
        match preset.binding() {
            PresetBinding::System(control) => self
                .poster
                .post_system_control(control)
                .map(|_| DispatchOutcome::Posted)
                .map_err(DispatchError::Post),
            PresetBinding::Keys {
                key_code,
                modifier_mask,
            } => self.post_pair(key_code, modifier_mask),
        }
    }

    fn post_pair(&self, key_code: u16, modifier_mask: u32) -> Result<DispatchOutcome, DispatchError> {
        self.poster
            .post_key(key_code, modifier_mask, true)
            .map_err(DispatchError::Post)?;
        self.poster
            .post_key(key_code, modifier_mask, false)
            .map_err(DispatchError::Post)?;
        Ok(DispatchOutcome::Posted)
    }

    /// Watchdog alarm: sound only, no key replay. Sound failure is cosmetic —
    /// an unresolvable name degrades to the system beep, never to an error.
    pub fn dispatch_alarm(&self, config: &WakeMeConfig) {
        if !self.sound.play(&config.sound) {
            tracing::warn!(sound = %config.sound, "alert sound unresolved; falling back to beep");
            self.sound.beep();
        }
    }
}
