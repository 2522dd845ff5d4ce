// Alert sound playback, fire-and-forget.
//
// macOS system sounds live as aiff files under /System/Library/Sounds; the
// player resolves the configured name there and hands the file to `afplay`
// without waiting for it. Nothing is reported back — sound is cosmetic.

use crate::action::SoundPlayer;

#[cfg(target_os = "macos")]
mod macos {
    use std::path::PathBuf;
    use std::process::Command;

    use crate::action::SoundPlayer;

    pub struct SystemSoundPlayer;

    fn sound_path(name: &str) -> Option<PathBuf> {
        // Reject anything that is not a bare sound name.
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        let path = PathBuf::from("/System/Library/Sounds").join(format!("{}.aiff", name));
        path.exists().then_some(path)
    }

    impl SoundPlayer for SystemSoundPlayer {
        fn play(&self, name: &str) -> bool {
            let Some(path) = sound_path(name) else {
                return false;
            };
            if let Err(e) = Command::new("afplay").arg(&path).spawn() {
                tracing::error!("afplay spawn failed for {:?}: {}", path, e);
            }
            true
        }

        fn beep(&self) {
            if let Err(e) = Command::new("osascript").args(["-e", "beep"]).spawn() {
                tracing::error!("system beep failed: {}", e);
            }
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod stub {
    use crate::action::SoundPlayer;

    /// Non-macOS stub: alarms are logged instead of audible.
    pub struct SystemSoundPlayer;

    impl SoundPlayer for SystemSoundPlayer {
        fn play(&self, name: &str) -> bool {
            tracing::info!(sound = name, "alarm (audio not implemented on this platform)");
            true
        }

        fn beep(&self) {
            tracing::info!("alarm beep (audio not implemented on this platform)");
        }
    }
}

#[cfg(target_os = "macos")]
pub fn system_player() -> Box<dyn SoundPlayer> {
    Box::new(macos::SystemSoundPlayer)
}

#[cfg(not(target_os = "macos"))]
pub fn system_player() -> Box<dyn SoundPlayer> {
    Box::new(stub::SystemSoundPlayer)
}
