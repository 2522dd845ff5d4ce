// Shortcut recorder state machine.
//
// The machine itself is platform-free and synchronous; the platform capture
// hook (capture_macos.rs) calls `on_key_down` from its tap callback and must
// get a consume/pass-through decision before returning. Captured shortcuts are
// handed off over a crossbeam channel because the callback runs on the tap's
// CFRunLoop thread, not the configuration thread.

use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use crate::analysis::recognizer::GestureDirection;
use crate::input::{is_modifier_key, RecordedShortcut};

/// A completed capture, tagged with the direction it was recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedShortcut {
    pub direction: GestureDirection,
    pub shortcut: RecordedShortcut,
}

/// Decision the capture hook must apply to the intercepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDecision {
    /// Not capturing: the event belongs to whoever is focused.
    PassThrough,
    /// Capturing: swallow the event (bare modifier, still waiting).
    Consumed,
    /// Capturing: swallow the event and finish with this shortcut.
    Captured(CapturedShortcut),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderError {
    /// A capture session is already in progress (single-writer invariant).
    AlreadyCapturing,
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::AlreadyCapturing => write!(f, "a shortcut recording is already in progress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Capturing(GestureDirection),
}

struct RecorderInner {
    phase: Phase,
}

/// Thread-safe recorder handle. Clones share one state machine; the capture
/// callback and the command layer may hold clones on different threads.
#[derive(Clone)]
pub struct ShortcutRecorder {
    inner: Arc<Mutex<RecorderInner>>,
    capture_tx: Sender<CapturedShortcut>,
}

impl ShortcutRecorder {
    pub fn new(capture_tx: Sender<CapturedShortcut>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecorderInner { phase: Phase::Idle })),
            capture_tx,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecorderInner> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Begin capturing the next non-modifier key press for `direction`.
    /// Rejected while another capture is in progress — never two sessions.
    pub fn start_recording(&self, direction: GestureDirection) -> Result<(), RecorderError> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Idle => {
                inner.phase = Phase::Capturing(direction);
                tracing::info!(?direction, "shortcut recording started");
                Ok(())
            }
            Phase::Capturing(_) => Err(RecorderError::AlreadyCapturing),
        }
    }

    /// Abort a capture in progress. The previously saved shortcut (if any)
    /// stays in effect. Returns whether a session was actually cancelled.
    pub fn stop_recording(&self) -> bool {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Capturing(_) => {
                inner.phase = Phase::Idle;
                tracing::info!("shortcut recording cancelled");
                true
            }
            Phase::Idle => false,
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self.lock().phase, Phase::Capturing(_))
    }

    /// Feed one key-down event. `modifier_mask` is the canonical mask of the
    /// modifiers held at that instant. The decision must be honored by the
    /// caller: while capturing, every event is consumed and must not reach
    /// any other handler.
    pub fn on_key_down(&self, key_code: u16, modifier_mask: u32) -> KeyDecision {
        let mut inner = self.lock();
        let direction = match inner.phase {
            Phase::Idle => return KeyDecision::PassThrough,
            Phase::Capturing(d) => d,
        };

        if is_modifier_key(key_code) {
            // Still waiting for the actual key; the held modifiers are
            // attached when it arrives.
            return KeyDecision::Consumed;
        }

        inner.phase = Phase::Idle;
        let captured = CapturedShortcut {
            direction,
            shortcut: RecordedShortcut::new(key_code, modifier_mask),
        };
        tracing::info!(
            ?direction,
            shortcut = %captured.shortcut.display,
            "shortcut captured"
        );

        // Hand off to the configuration thread. The decision is returned
        // synchronously regardless of whether the receiver has caught up.
        if self.capture_tx.try_send(captured.clone()).is_err() {
            tracing::error!("captured shortcut dropped: handoff channel full or closed");
        }

        KeyDecision::Captured(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MOD_COMMAND, MOD_SHIFT};

    fn recorder() -> (ShortcutRecorder, crossbeam_channel::Receiver<CapturedShortcut>) {
        let (tx, rx) = crossbeam_channel::bounded(4);
        (ShortcutRecorder::new(tx), rx)
    }

    #[test]
    fn idle_recorder_passes_everything_through() {
        let (rec, _rx) = recorder();
        assert_eq!(rec.on_key_down(0, 0), KeyDecision::PassThrough);
        assert_eq!(rec.on_key_down(56, MOD_SHIFT), KeyDecision::PassThrough);
    }

    #[test]
    fn bare_modifiers_never_complete_a_capture() {
        let (rec, rx) = recorder();
        rec.start_recording(GestureDirection::Up).unwrap();

        // Shift down (held), then released: both are bare-modifier events.
        assert_eq!(rec.on_key_down(56, MOD_SHIFT), KeyDecision::Consumed);
        assert_eq!(rec.on_key_down(60, MOD_SHIFT), KeyDecision::Consumed);
        assert!(rec.is_capturing());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn shift_a_sequence_captures_shift_a() {
        let (rec, rx) = recorder();
        rec.start_recording(GestureDirection::Left).unwrap();

        assert_eq!(rec.on_key_down(56, MOD_SHIFT), KeyDecision::Consumed);
        let decision = rec.on_key_down(0, MOD_SHIFT); // "A" with Shift held
        match decision {
            KeyDecision::Captured(c) => {
                assert_eq!(c.direction, GestureDirection::Left);
                assert_eq!(c.shortcut.key_code, 0);
                assert_eq!(c.shortcut.modifier_mask, MOD_SHIFT);
                assert_eq!(c.shortcut.display, "⇧A");
            }
            other => panic!("expected capture, got {:?}", other),
        }
        assert!(!rec.is_capturing());

        let handed_off = rx.try_recv().unwrap();
        assert_eq!(handed_off.shortcut.display, "⇧A");
    }

    #[test]
    fn second_start_is_rejected_while_capturing() {
        let (rec, _rx) = recorder();
        rec.start_recording(GestureDirection::Up).unwrap();
        assert_eq!(
            rec.start_recording(GestureDirection::Down),
            Err(RecorderError::AlreadyCapturing)
        );
        // The original session is still the active one.
        assert!(rec.is_capturing());
    }

    #[test]
    fn stop_reverts_without_capturing() {
        let (rec, rx) = recorder();
        rec.start_recording(GestureDirection::Right).unwrap();
        assert!(rec.stop_recording());
        assert!(!rec.is_capturing());
        assert!(rx.try_recv().is_err());

        // Events after cancellation pass through again.
        assert_eq!(rec.on_key_down(12, MOD_COMMAND), KeyDecision::PassThrough);
    }
}
