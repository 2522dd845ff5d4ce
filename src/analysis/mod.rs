pub mod recognizer;
pub mod watchdog;

pub use recognizer::{DirectionSensitivities, GestureDirection, GestureRecognizer};
pub use watchdog::InactivityWatchdog;
