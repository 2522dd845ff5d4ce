// Platform selection for the event poster.
//
// macOS gets the real CGEvent-based implementation; every other target gets a
// documented stub so the pipeline still builds and runs (gestures are
// recognized and logged, nothing is synthesized).

use crate::action::{EventPoster, SystemControl};

#[cfg(target_os = "macos")]
#[path = "poster_macos.rs"]
pub mod macos;

#[cfg(target_os = "macos")]
pub fn system_poster() -> Box<dyn EventPoster> {
    Box::new(macos::CgEventPoster::new())
}

#[cfg(target_os = "macos")]
pub fn accessibility_trusted() -> bool {
    macos::accessibility_trusted()
}

/// Non-macOS stub. Input synthesis for other desktops can be added later;
/// the dispatch engine, settings and recognizer are unaffected.
#[cfg(not(target_os = "macos"))]
pub struct NullPoster;

#[cfg(not(target_os = "macos"))]
impl EventPoster for NullPoster {
    fn post_key(&self, key_code: u16, modifier_mask: u32, is_press: bool) -> Result<(), String> {
        tracing::warn!(
            key_code,
            modifier_mask,
            is_press,
            "event posting not implemented on this platform"
        );
        Ok(())
    }

    fn post_system_control(&self, control: SystemControl) -> Result<(), String> {
        tracing::warn!(?control, "system-control posting not implemented on this platform");
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
pub fn system_poster() -> Box<dyn EventPoster> {
    Box::new(NullPoster)
}

/// No synthesis permission concept outside macOS; never block dispatch there.
#[cfg(not(target_os = "macos"))]
pub fn accessibility_trusted() -> bool {
    true
}
