// Keyboard input domain: key codes, modifier masks, shortcut recording.
//
// Key codes throughout are macOS virtual key codes (CGKeyCode / kVK_* from
// HIToolbox/Events.h). The recorder captures them from a CGEventTap and the
// dispatch engine replays them verbatim, so no cross-platform translation
// table is needed.

use std::sync::Mutex;

use lazy_static::lazy_static;

pub mod recorder;

#[cfg(target_os = "macos")]
#[path = "capture_macos.rs"]
pub mod capture;

pub use recorder::{CapturedShortcut, KeyDecision, RecorderError, ShortcutRecorder};

// ---------------------------------------------------------------------------
// Canonical modifier mask
//
// Fixed bit order (Control, Option, Shift, Command) used for persistence,
// matching and display. Platform flag words (CGEventFlags) are converted to
// this mask at the capture boundary and back at the posting boundary.
// ---------------------------------------------------------------------------

pub const MOD_CONTROL: u32 = 1 << 0;
pub const MOD_OPTION: u32 = 1 << 1;
pub const MOD_SHIFT: u32 = 1 << 2;
pub const MOD_COMMAND: u32 = 1 << 3;

/// A user-recorded key combination, replayed verbatim on trigger.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RecordedShortcut {
    pub key_code: u16,
    pub modifier_mask: u32,
    pub display: String,
}

impl RecordedShortcut {
    pub fn new(key_code: u16, modifier_mask: u32) -> Self {
        let display = display_string(key_code, modifier_mask);
        Self {
            key_code,
            modifier_mask,
            display,
        }
    }
}

/// Bare modifier keys (both sides), Caps Lock and Fn.
///
/// While a recording is in progress these must not complete the capture:
/// the user is still holding modifiers waiting to press the actual key.
pub fn is_modifier_key(key_code: u16) -> bool {
    // kVK_Command(55), kVK_Shift(56), kVK_CapsLock(57), kVK_Option(58),
    // kVK_Control(59), kVK_RightCommand(54), kVK_RightShift(60),
    // kVK_RightOption(61), kVK_RightControl(62), kVK_Function(63)
    (54..=63).contains(&key_code)
}

/// Canonical display string: ⌃⌥⇧⌘ prefix in fixed order, then the key name.
pub fn display_string(key_code: u16, modifier_mask: u32) -> String {
    let mut s = String::new();
    if modifier_mask & MOD_CONTROL != 0 {
        s.push('⌃');
    }
    if modifier_mask & MOD_OPTION != 0 {
        s.push('⌥');
    }
    if modifier_mask & MOD_SHIFT != 0 {
        s.push('⇧');
    }
    if modifier_mask & MOD_COMMAND != 0 {
        s.push('⌘');
    }
    match key_name(key_code) {
        Some(name) => s.push_str(name),
        None => s.push_str(&format!("Key {}", key_code)),
    }
    s
}

/// Human-readable names for the common macOS virtual key codes.
/// Unmapped codes fall back to a numeric display; replay is unaffected.
pub fn key_name(key_code: u16) -> Option<&'static str> {
    let name = match key_code {
        0 => "A",
        1 => "S",
        2 => "D",
        3 => "F",
        4 => "H",
        5 => "G",
        6 => "Z",
        7 => "X",
        8 => "C",
        9 => "V",
        11 => "B",
        12 => "Q",
        13 => "W",
        14 => "E",
        15 => "R",
        16 => "Y",
        17 => "T",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "O",
        32 => "U",
        33 => "[",
        34 => "I",
        35 => "P",
        36 => "Return",
        37 => "L",
        38 => "J",
        39 => "'",
        40 => "K",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "N",
        46 => "M",
        47 => ".",
        48 => "Tab",
        49 => "Space",
        50 => "`",
        51 => "Delete",
        53 => "Escape",
        123 => "Left",
        124 => "Right",
        125 => "Down",
        126 => "Up",
        _ => return None,
    };
    Some(name)
}

lazy_static! {
    /// Recorder handle consulted by the capture-tap callback. The callback
    /// must decide consume vs. pass-through synchronously, so the handle is
    /// installed here once at startup rather than threaded through the tap.
    pub(crate) static ref ACTIVE_RECORDER: Mutex<Option<ShortcutRecorder>> = Mutex::new(None);
}

/// Install the recorder consulted by the platform capture hook.
pub fn install_recorder(recorder: ShortcutRecorder) {
    let mut guard = match ACTIVE_RECORDER.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Some(recorder);
}
