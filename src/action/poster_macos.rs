// macOS event synthesis.
//
// Ordinary shortcuts are posted as CGEvents through the HID event tap with
// the recorded modifier flags applied. Media/brightness controls have no
// CGKeyCode: they travel as NSEvent system-defined events (subtype 8) whose
// data1 word encodes the NX control code and the down/up phase, posted as the
// underlying CGEvent. Both paths require Accessibility trust.

use std::os::raw::c_void;

use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use objc::runtime::Object;
use objc::{class, msg_send, sel, sel_impl};

use crate::action::{EventPoster, SystemControl};
use crate::input::{MOD_COMMAND, MOD_CONTROL, MOD_OPTION, MOD_SHIFT};

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn CGEventPost(tap: u32, event: *mut c_void);
}

// kCGHIDEventTap
const HID_EVENT_TAP: u32 = 0;

// NSEventTypeSystemDefined / NSEventSubtypeScreenChanged(8) carries NX key
// events; phase nibble 0xa = down, 0xb = up.
const NS_EVENT_TYPE_SYSTEM_DEFINED: u64 = 14;
const NX_SUBTYPE_AUX_CONTROL: i16 = 8;
const NX_PHASE_DOWN: i64 = 0xa;
const NX_PHASE_UP: i64 = 0xb;

#[repr(C)]
struct NSPoint {
    x: f64,
    y: f64,
}

// NSPoint is CGPoint; msg_send! needs the ObjC type encoding.
unsafe impl objc::Encode for NSPoint {
    fn encode() -> objc::Encoding {
        unsafe { objc::Encoding::from_str("{CGPoint=dd}") }
    }
}

/// Accessibility trust probe; consulted once per explicit dispatch trigger.
pub fn accessibility_trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Canonical (Control, Option, Shift, Command) mask → CGEventFlags.
fn cg_flags(modifier_mask: u32) -> CGEventFlags {
    let mut flags = CGEventFlags::empty();
    if modifier_mask & MOD_CONTROL != 0 {
        flags |= CGEventFlags::CGEventFlagControl;
    }
    if modifier_mask & MOD_OPTION != 0 {
        flags |= CGEventFlags::CGEventFlagAlternate;
    }
    if modifier_mask & MOD_SHIFT != 0 {
        flags |= CGEventFlags::CGEventFlagShift;
    }
    if modifier_mask & MOD_COMMAND != 0 {
        flags |= CGEventFlags::CGEventFlagCommand;
    }
    flags
}

pub struct CgEventPoster;

impl CgEventPoster {
    pub fn new() -> Self {
        Self
    }

    fn post_nx_event(&self, control: SystemControl, down: bool) -> Result<(), String> {
        let phase = if down { NX_PHASE_DOWN } else { NX_PHASE_UP };
        let data1 = ((control.nx_code() as i64) << 16) | (phase << 8);

        objc::rc::autoreleasepool(|| unsafe {
            let ns_event: *mut Object = msg_send![
                class!(NSEvent),
                otherEventWithType: NS_EVENT_TYPE_SYSTEM_DEFINED
                location: NSPoint { x: 0.0, y: 0.0 }
                modifierFlags: 0u64
                timestamp: 0.0f64
                windowNumber: 0i64
                context: std::ptr::null_mut::<Object>()
                subtype: NX_SUBTYPE_AUX_CONTROL
                data1: data1
                data2: -1i64
            ];
            if ns_event.is_null() {
                return Err(format!("NSEvent construction failed for {:?}", control));
            }
            let cg_event: *mut c_void = msg_send![ns_event, CGEvent];
            if cg_event.is_null() {
                return Err(format!("no CGEvent behind NSEvent for {:?}", control));
            }
            CGEventPost(HID_EVENT_TAP, cg_event);
            Ok(())
        })
    }
}

impl EventPoster for CgEventPoster {
    fn post_key(&self, key_code: u16, modifier_mask: u32, is_press: bool) -> Result<(), String> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| "CGEventSource creation failed".to_string())?;
        let event = CGEvent::new_keyboard_event(source, key_code, is_press)
            .map_err(|_| format!("CGEvent construction failed for key {}", key_code))?;
        event.set_flags(cg_flags(modifier_mask));
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_system_control(&self, control: SystemControl) -> Result<(), String> {
        self.post_nx_event(control, true)?;
        self.post_nx_event(control, false)
    }
}
