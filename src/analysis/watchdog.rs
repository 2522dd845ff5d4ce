// Inactivity watchdog ("wake me"): raises an audible alarm after a
// configurable period of stillness.
//
// Consumes the same raw sample stream as the gesture recognizer but shares
// nothing else with it — activity detection has its own sensitivity-derived
// threshold and ignores the recognizer's cooldown entirely. Alarm evaluation
// runs on a fixed 1-second tick independent of the sample arrival rate.

use std::time::{Duration, Instant};

use crate::motion::OrientationSample;
use crate::settings::WakeMeConfig;

/// Per-tick delta (either axis) above which the wearer counts as active.
/// Range 0.01–0.10 rad; higher sensitivity means smaller motions re-arm.
pub fn activity_threshold(sensitivity: f64) -> f64 {
    0.10 - sensitivity * 0.09
}

pub struct InactivityWatchdog {
    previous: Option<(f64, f64)>,
    last_activity: Option<Instant>,
    /// Sticky until `reset_alarm`; the countdown itself re-arms automatically.
    alarm_active: bool,
    /// Tracks the enabled edge so re-enabling starts from a fresh countdown.
    enabled_latch: bool,
}

impl InactivityWatchdog {
    pub fn new() -> Self {
        Self {
            previous: None,
            last_activity: None,
            alarm_active: false,
            enabled_latch: false,
        }
    }

    /// Cold start at `now`: fresh countdown, no alarm, no sample history.
    pub fn start(&mut self, now: Instant) {
        self.previous = None;
        self.last_activity = Some(now);
        self.alarm_active = false;
        self.enabled_latch = true;
    }

    /// Feed one sample; refreshes the activity timestamp when either axis
    /// moved more than the threshold since the previous sample.
    pub fn on_sample(&mut self, sample: &OrientationSample, sensitivity: f64) {
        if let Some((prev_pitch, prev_yaw)) = self.previous {
            let thr = activity_threshold(sensitivity);
            if (sample.pitch - prev_pitch).abs() > thr || (sample.yaw - prev_yaw).abs() > thr {
                self.last_activity = Some(sample.timestamp);
            }
        }
        self.previous = Some((sample.pitch, sample.yaw));
    }

    /// 1 Hz evaluation. Returns true when the alarm fires on this tick.
    ///
    /// Firing immediately re-arms the countdown: continued stillness raises
    /// the alarm again one full timeout later, never continuously. The
    /// alarm-active flag stays set until `reset_alarm`.
    pub fn on_tick(&mut self, now: Instant, config: &WakeMeConfig) -> bool {
        if !config.enabled {
            // Disabled cancels evaluation; the latch makes the next enabled
            // tick start a fresh countdown.
            self.enabled_latch = false;
            return false;
        }
        if !self.enabled_latch {
            self.enabled_latch = true;
            self.last_activity = Some(now);
            return false;
        }

        let last = *self.last_activity.get_or_insert(now);
        if now.duration_since(last) >= Duration::from_secs(config.timeout_secs) {
            self.last_activity = Some(now);
            self.alarm_active = true;
            return true;
        }
        false
    }

    pub fn alarm_active(&self) -> bool {
        self.alarm_active
    }

    /// External acknowledgment: clears the sticky flag and restarts the
    /// countdown from `now`.
    pub fn reset_alarm(&mut self, now: Instant) {
        self.alarm_active = false;
        self.last_activity = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(timeout_secs: u64) -> WakeMeConfig {
        WakeMeConfig {
            enabled: true,
            sensitivity: 0.5, // activity threshold 0.055
            timeout_secs,
            sound: "Submarine".to_string(),
        }
    }

    fn sample(base: Instant, secs: u64, pitch: f64, yaw: f64) -> OrientationSample {
        OrientationSample::new(pitch, yaw, base + Duration::from_secs(secs))
    }

    #[test]
    fn silence_fires_at_timeout_and_again_one_timeout_later() {
        let base = Instant::now();
        let cfg = config(5);
        let mut wd = InactivityWatchdog::new();
        wd.start(base);

        let mut fired_at = Vec::new();
        for t in 1..=12u64 {
            // Sub-threshold jitter only.
            wd.on_sample(&sample(base, t, 0.001 * t as f64, 0.0), cfg.sensitivity);
            if wd.on_tick(base + Duration::from_secs(t), &cfg) {
                fired_at.push(t);
            }
        }
        assert_eq!(fired_at, vec![5, 10]);
    }

    #[test]
    fn activity_defers_the_alarm() {
        let base = Instant::now();
        let cfg = config(5);
        let mut wd = InactivityWatchdog::new();
        wd.start(base);

        let mut fired_at = Vec::new();
        let mut pitch = 0.0;
        for t in 1..=8u64 {
            if t == 3 {
                pitch += 0.2; // well above the 0.055 threshold
            }
            wd.on_sample(&sample(base, t, pitch, 0.0), cfg.sensitivity);
            if wd.on_tick(base + Duration::from_secs(t), &cfg) {
                fired_at.push(t);
            }
        }
        // Countdown restarted at t=3, so the first fire is t=8, not t=5.
        assert_eq!(fired_at, vec![8]);
    }

    #[test]
    fn alarm_flag_is_sticky_until_reset() {
        let base = Instant::now();
        let cfg = config(2);
        let mut wd = InactivityWatchdog::new();
        wd.start(base);

        assert!(!wd.on_tick(base + Duration::from_secs(1), &cfg));
        assert!(wd.on_tick(base + Duration::from_secs(2), &cfg));
        assert!(wd.alarm_active());
        // Firing re-armed the countdown but the flag stays up.
        assert!(!wd.on_tick(base + Duration::from_secs(3), &cfg));
        assert!(wd.alarm_active());

        wd.reset_alarm(base + Duration::from_secs(3));
        assert!(!wd.alarm_active());
        // Reset also restarted the countdown.
        assert!(!wd.on_tick(base + Duration::from_secs(4), &cfg));
        assert!(wd.on_tick(base + Duration::from_secs(5), &cfg));
    }

    #[test]
    fn disabled_watchdog_never_fires_and_reenabling_is_fresh() {
        let base = Instant::now();
        let mut cfg = config(2);
        let mut wd = InactivityWatchdog::new();
        wd.start(base);

        cfg.enabled = false;
        for t in 1..=10u64 {
            assert!(!wd.on_tick(base + Duration::from_secs(t), &cfg));
        }

        // Re-enable at t=11: first tick only re-arms; fires a full timeout
        // after that, not instantly despite 11 s of stillness.
        cfg.enabled = true;
        assert!(!wd.on_tick(base + Duration::from_secs(11), &cfg));
        assert!(!wd.on_tick(base + Duration::from_secs(12), &cfg));
        assert!(wd.on_tick(base + Duration::from_secs(13), &cfg));
    }

    #[test]
    fn activity_threshold_range() {
        assert!((activity_threshold(0.0) - 0.10).abs() < 1e-12);
        assert!((activity_threshold(1.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn first_sample_establishes_watchdog_baseline() {
        let base = Instant::now();
        let cfg = config(5);
        let mut wd = InactivityWatchdog::new();
        wd.start(base);

        // A wild first sample has no previous to delta against, so it must
        // not count as activity.
        wd.on_sample(&sample(base, 4, 3.0, 3.0), cfg.sensitivity);
        assert!(wd.on_tick(base + Duration::from_secs(5), &cfg));
    }
}
