// macOS shortcut-capture hook via CGEventTap.
//
// Unlike a listen-only monitor, this tap is created with
// CGEventTapOptions::Default (an *active* tap): returning None from the
// callback deletes the event, which is how the recorder gets first-refusal on
// keyboard input while a capture is in progress. While the recorder is idle
// every event is returned unmodified and the tap is invisible to the user.
//
// Runs on a dedicated thread with its own CFRunLoop for the process lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CGEventFlags, EventField,
};

use crate::action::poster::accessibility_trusted;
use crate::input::{KeyDecision, ACTIVE_RECORDER, MOD_COMMAND, MOD_CONTROL, MOD_OPTION, MOD_SHIFT};

/// true while the CGEventTap is installed and its CFRunLoop is alive.
pub static CAPTURE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// CGEventFlags → canonical (Control, Option, Shift, Command) mask.
fn canonical_mask(flags: CGEventFlags) -> u32 {
    let mut mask = 0;
    if flags.contains(CGEventFlags::CGEventFlagControl) {
        mask |= MOD_CONTROL;
    }
    if flags.contains(CGEventFlags::CGEventFlagAlternate) {
        mask |= MOD_OPTION;
    }
    if flags.contains(CGEventFlags::CGEventFlagShift) {
        mask |= MOD_SHIFT;
    }
    if flags.contains(CGEventFlags::CGEventFlagCommand) {
        mask |= MOD_COMMAND;
    }
    mask
}

fn handle_key_down(event: &CGEvent) -> Option<CGEvent> {
    let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    let mask = canonical_mask(event.get_flags());

    let decision = {
        let guard = match ACTIVE_RECORDER.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(recorder) => recorder.on_key_down(key_code, mask),
            None => KeyDecision::PassThrough,
        }
    };

    match decision {
        KeyDecision::PassThrough => Some(event.clone()),
        // Consumed / Captured: swallow the event so it never reaches the
        // focused application — the exclusivity contract of a capture session.
        KeyDecision::Consumed | KeyDecision::Captured(_) => None,
    }
}

/// Install the capture tap and start its CFRunLoop on a dedicated thread.
///
/// Permission flow mirrors the dispatch engine: an active tap needs
/// Accessibility access. If it is missing we leave `CAPTURE_ACTIVE` false and
/// let the frontend show the permission banner — recording attempts will
/// simply never observe a key.
pub fn start() {
    thread::spawn(|| {
        if !accessibility_trusted() {
            tracing::warn!(
                "Accessibility permission not granted; shortcut capture tap not installed. \
                 Grant access in System Settings > Privacy & Security > Accessibility \
                 and restart the app."
            );
            return;
        }

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::Default,
            vec![CGEventType::KeyDown],
            |_proxy, event_type, event| {
                if matches!(event_type, CGEventType::KeyDown) {
                    handle_key_down(event)
                } else {
                    Some(event.clone())
                }
            },
        );

        match tap {
            Ok(tap) => {
                CAPTURE_ACTIVE.store(true, Ordering::Relaxed);
                tracing::info!("shortcut capture tap installed");

                let loop_source = tap
                    .mach_port
                    .create_runloop_source(0)
                    .expect("Failed to create CFRunLoop source from CGEventTap");

                let run_loop = CFRunLoop::get_current();
                run_loop.add_source(&loop_source, unsafe { kCFRunLoopDefaultMode });
                tap.enable();
                CFRunLoop::run_current();

                CAPTURE_ACTIVE.store(false, Ordering::Relaxed);
                tracing::warn!("capture tap CFRunLoop exited unexpectedly");
            }
            Err(_) => {
                tracing::error!(
                    "CGEventTap creation failed even though the process is trusted. \
                     This may indicate a sandboxing or TCC database issue."
                );
            }
        }
    });
}
