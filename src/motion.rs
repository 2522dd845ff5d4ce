// Orientation sampling layer.
//
// The hardware sampler is an external collaborator: while listening is active
// it pushes `OrientationSample`s into a crossbeam channel at its own fixed
// rate, and the listener thread consumes them. Everything downstream is
// driven purely by what arrives on that channel, which is also how the tests
// inject synthetic motion.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

/// One attitude reading: pitch/yaw in radians plus the arrival instant.
/// Roll is unused for head gestures. Immutable, consumed once.
#[derive(Debug, Clone, Copy)]
pub struct OrientationSample {
    pub pitch: f64,
    pub yaw: f64,
    pub timestamp: Instant,
}

impl OrientationSample {
    pub fn new(pitch: f64, yaw: f64, timestamp: Instant) -> Self {
        Self {
            pitch,
            yaw,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionError {
    /// No motion-capable device is reachable. Listening start is refused up
    /// front; the collaborator is consulted once per explicit start call.
    Unavailable,
}

impl std::fmt::Display for MotionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionError::Unavailable => write!(f, "headphone motion data is not available"),
        }
    }
}

/// Contract of the external sampler service.
pub trait MotionSource: Send {
    fn is_available(&self) -> bool;
    /// Begin delivery into `tx` at the device-determined rate.
    fn start(&mut self, tx: Sender<OrientationSample>) -> Result<(), MotionError>;
    /// Synchronously halt delivery. The sample channel is dropped afterwards.
    fn stop(&mut self);
}

// ---------------------------------------------------------------------------
// Headphone motion source (macOS CoreMotion) — stub.
//
// CMHeadphoneMotionManager integration requires implementing objc2::Encode
// for CMAttitude and CoreMotion framework linking, which adds significant
// complexity for the hardware adapter of an otherwise pure pipeline.
//
// Current status: `is_available` reports false, so `start_listening` is
// refused with a "sensor unavailable" status. The whole recognizer/watchdog/
// dispatch pipeline is exercised through `ScriptedMotionSource` instead.
// ---------------------------------------------------------------------------

pub struct HeadphoneMotionSource;

impl HeadphoneMotionSource {
    pub fn new() -> Self {
        Self
    }
}

impl MotionSource for HeadphoneMotionSource {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&mut self, _tx: Sender<OrientationSample>) -> Result<(), MotionError> {
        tracing::warn!(
            "HeadphoneMotionSource: CoreMotion headphone integration not implemented; \
             refusing to start"
        );
        Err(MotionError::Unavailable)
    }

    fn stop(&mut self) {}
}

// ---------------------------------------------------------------------------
// Scripted source: replays a fixed pitch/yaw sequence at a fixed interval on
// its own thread. Used by integration tests and for demoing the pipeline
// without hardware.
// ---------------------------------------------------------------------------

pub struct ScriptedMotionSource {
    script: Vec<(f64, f64)>,
    interval: Duration,
    handle: Option<thread::JoinHandle<()>>,
}

impl ScriptedMotionSource {
    pub fn new(script: Vec<(f64, f64)>, interval: Duration) -> Self {
        Self {
            script,
            interval,
            handle: None,
        }
    }
}

impl MotionSource for ScriptedMotionSource {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self, tx: Sender<OrientationSample>) -> Result<(), MotionError> {
        let script = self.script.clone();
        let interval = self.interval;
        self.handle = Some(thread::spawn(move || {
            for (pitch, yaw) in script {
                if tx
                    .send(OrientationSample::new(pitch, yaw, Instant::now()))
                    .is_err()
                {
                    // Listener went away; nothing left to deliver to.
                    return;
                }
                thread::sleep(interval);
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        // Delivery stops when the receiver side is dropped; just detach.
        self.handle.take();
    }
}
