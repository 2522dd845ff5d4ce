// Gesture recognizer: successive orientation samples → zero or one discrete
// gesture per tick.
//
// Detection works on single-tick deltas against the previous sample, not on
// absolute attitude, so a slow drift of the baseline never accumulates into a
// false trigger. Yaw wrap-around at ±π is not handled: a genuine discontinuity
// there is mis-detected as an extreme delta. Accepted limitation — head-scale
// rotations stay far away from the wrap point in practice.

use std::time::{Duration, Instant};

use crate::motion::OrientationSample;

/// One of four independent recognition channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureDirection {
    Up,
    Down,
    Left,
    Right,
}

impl GestureDirection {
    pub const ALL: [GestureDirection; 4] = [
        GestureDirection::Up,
        GestureDirection::Down,
        GestureDirection::Left,
        GestureDirection::Right,
    ];
}

/// Per-direction trigger threshold in radians of single-tick delta.
///
/// sensitivity 0.0 → 0.40 rad (near-unreachable by normal head motion),
/// sensitivity 1.0 → 0.02 rad (hair-trigger). Monotonically decreasing.
pub fn threshold(sensitivity: f64) -> f64 {
    0.40 - sensitivity * 0.38
}

/// Live per-direction sensitivities, re-read from configuration on every
/// sample so the user can retune while listening.
#[derive(Debug, Clone, Copy)]
pub struct DirectionSensitivities {
    pub up: f64,
    pub down: f64,
    pub left: f64,
    pub right: f64,
}

impl DirectionSensitivities {
    pub fn uniform(s: f64) -> Self {
        Self {
            up: s,
            down: s,
            left: s,
            right: s,
        }
    }
}

/// Minimum window during which a repeat gesture is suppressed after one fires.
/// Global across all four directions: a single head motion can never register
/// as two directions.
pub const GESTURE_COOLDOWN: Duration = Duration::from_secs(1);

pub struct GestureRecognizer {
    previous: Option<(f64, f64)>,
    cooldown_until: Option<Instant>,
}

impl GestureRecognizer {
    pub fn new() -> Self {
        Self {
            previous: None,
            cooldown_until: None,
        }
    }

    /// Forget the baseline and any active cooldown. Called whenever listening
    /// starts or stops so a new session behaves as a cold start.
    pub fn reset(&mut self) {
        self.previous = None;
        self.cooldown_until = None;
    }

    /// Consume one sample; emit at most one gesture.
    ///
    /// Scan order is fixed: Up, Down (pitch) before Left, Right (yaw). Only
    /// the first matching condition fires, so a diagonal motion registers as
    /// its pitch component. Mutual exclusion is by construction of this scan
    /// order, not an explicit tie-break.
    pub fn on_sample(
        &mut self,
        sample: &OrientationSample,
        sens: &DirectionSensitivities,
    ) -> Option<GestureDirection> {
        let (prev_pitch, prev_yaw) = match self.previous {
            Some(prev) => prev,
            None => {
                // First sample since (re)start is the baseline only.
                self.previous = Some((sample.pitch, sample.yaw));
                return None;
            }
        };

        let pitch_delta = sample.pitch - prev_pitch;
        let yaw_delta = sample.yaw - prev_yaw;

        let candidate = if pitch_delta > threshold(sens.up) {
            Some(GestureDirection::Up)
        } else if pitch_delta < -threshold(sens.down) {
            Some(GestureDirection::Down)
        } else if yaw_delta > threshold(sens.left) {
            Some(GestureDirection::Left)
        } else if yaw_delta < -threshold(sens.right) {
            Some(GestureDirection::Right)
        } else {
            None
        };

        // Previous is updated unconditionally, fire or not.
        self.previous = Some((sample.pitch, sample.yaw));

        let candidate = candidate?;

        if let Some(until) = self.cooldown_until {
            if sample.timestamp < until {
                // Another gesture fired less than a cooldown ago; suppress.
                return None;
            }
        }

        self.cooldown_until = Some(sample.timestamp + GESTURE_COOLDOWN);
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(base: Instant, ms: u64, pitch: f64, yaw: f64) -> OrientationSample {
        OrientationSample::new(pitch, yaw, base + Duration::from_millis(ms))
    }

    #[test]
    fn threshold_is_monotone_with_fixed_endpoints() {
        assert!((threshold(0.0) - 0.40).abs() < 1e-12);
        assert!((threshold(1.0) - 0.02).abs() < 1e-12);
        assert!((threshold(0.7) - (0.40 - 0.7 * 0.38)).abs() < 1e-12);

        let mut prev = f64::INFINITY;
        for i in 0..=100 {
            let t = threshold(i as f64 / 100.0);
            assert!(t < prev, "threshold must strictly decrease");
            prev = t;
        }
    }

    #[test]
    fn first_sample_is_baseline_only() {
        let base = Instant::now();
        let mut rec = GestureRecognizer::new();
        let sens = DirectionSensitivities::uniform(1.0);
        // A huge pitch on the very first sample must not fire.
        assert_eq!(rec.on_sample(&sample(base, 0, 2.0, 0.0), &sens), None);
    }

    #[test]
    fn pitch_step_fires_once_then_cooldown_suppresses() {
        let base = Instant::now();
        let mut rec = GestureRecognizer::new();
        // Up threshold 0.15 rad ⇔ sensitivity (0.40 - 0.15) / 0.38
        let sens = DirectionSensitivities::uniform((0.40 - 0.15) / 0.38);

        // pitch deltas: [–, 0.5, 0.5] at 100ms spacing
        assert_eq!(rec.on_sample(&sample(base, 0, 0.0, 0.0), &sens), None);
        assert_eq!(
            rec.on_sample(&sample(base, 100, 0.5, 0.0), &sens),
            Some(GestureDirection::Up)
        );
        // Third sample crosses the threshold again but cooldown is active.
        assert_eq!(rec.on_sample(&sample(base, 200, 1.0, 0.0), &sens), None);
    }

    #[test]
    fn no_two_fires_within_one_second_across_directions() {
        let base = Instant::now();
        let mut rec = GestureRecognizer::new();
        let sens = DirectionSensitivities::uniform(0.7); // threshold 0.134

        let mut fired = Vec::new();
        // Alternating violent pitch and yaw swings every 100 ms for 2.5 s.
        let mut pitch = 0.0;
        let mut yaw = 0.0;
        for i in 0..25u64 {
            if i % 2 == 0 {
                pitch += if i % 4 == 0 { 0.5 } else { -0.5 };
            } else {
                yaw += if i % 4 == 1 { 0.5 } else { -0.5 };
            }
            let s = sample(base, i * 100, pitch, yaw);
            if let Some(dir) = rec.on_sample(&s, &sens) {
                fired.push((s.timestamp, dir));
            }
        }

        assert!(!fired.is_empty());
        for pair in fired.windows(2) {
            let gap = pair[1].0 - pair[0].0;
            assert!(
                gap >= GESTURE_COOLDOWN,
                "two gestures fired {:?} apart",
                gap
            );
        }
    }

    #[test]
    fn scan_order_prefers_pitch_over_yaw() {
        let base = Instant::now();
        let mut rec = GestureRecognizer::new();
        let sens = DirectionSensitivities::uniform(0.7);

        rec.on_sample(&sample(base, 0, 0.0, 0.0), &sens);
        // A diagonal motion crossing both pitch-up and yaw-left thresholds
        // registers as Up only.
        assert_eq!(
            rec.on_sample(&sample(base, 100, 0.5, 0.5), &sens),
            Some(GestureDirection::Up)
        );
    }

    #[test]
    fn negative_deltas_map_to_down_and_right() {
        let base = Instant::now();
        let sens = DirectionSensitivities::uniform(0.7);

        let mut rec = GestureRecognizer::new();
        rec.on_sample(&sample(base, 0, 0.0, 0.0), &sens);
        assert_eq!(
            rec.on_sample(&sample(base, 100, -0.5, 0.0), &sens),
            Some(GestureDirection::Down)
        );

        let mut rec = GestureRecognizer::new();
        rec.on_sample(&sample(base, 0, 0.0, 0.0), &sens);
        assert_eq!(
            rec.on_sample(&sample(base, 100, 0.0, -0.5), &sens),
            Some(GestureDirection::Right)
        );
    }

    #[test]
    fn boundary_sensitivities_are_usable() {
        let base = Instant::now();

        // sensitivity 1.0 → threshold 0.02: tiny motion triggers
        let mut rec = GestureRecognizer::new();
        let hair = DirectionSensitivities::uniform(1.0);
        rec.on_sample(&sample(base, 0, 0.0, 0.0), &hair);
        assert_eq!(
            rec.on_sample(&sample(base, 100, 0.03, 0.0), &hair),
            Some(GestureDirection::Up)
        );

        // sensitivity 0.0 → threshold 0.40: the same motion does nothing
        let mut rec = GestureRecognizer::new();
        let stiff = DirectionSensitivities::uniform(0.0);
        rec.on_sample(&sample(base, 0, 0.0, 0.0), &stiff);
        assert_eq!(rec.on_sample(&sample(base, 100, 0.39, 0.0), &stiff), None);
        assert_eq!(
            rec.on_sample(&sample(base, 200, 0.80, 0.0), &stiff),
            Some(GestureDirection::Up)
        );
    }

    #[test]
    fn reset_forgets_baseline_and_cooldown() {
        let base = Instant::now();
        let mut rec = GestureRecognizer::new();
        let sens = DirectionSensitivities::uniform(0.7);

        rec.on_sample(&sample(base, 0, 0.0, 0.0), &sens);
        assert_eq!(
            rec.on_sample(&sample(base, 100, 0.5, 0.0), &sens),
            Some(GestureDirection::Up)
        );

        rec.reset();
        // After reset the next sample is a baseline again, even mid-cooldown.
        assert_eq!(rec.on_sample(&sample(base, 200, 1.0, 0.0), &sens), None);
        assert_eq!(
            rec.on_sample(&sample(base, 300, 1.5, 0.0), &sens),
            Some(GestureDirection::Up)
        );
    }
}
