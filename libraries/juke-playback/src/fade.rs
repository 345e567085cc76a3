//! Volume ramps for fade-in and fade-out
//!
//! The engine only asks a backend to fade over a duration; backends that
//! ramp volume in software use a [`FadeRamp`] to compute the volume per step.
//! [`FadeCurve::EqualPower`] is the default since a crossfade built from two
//! equal-power ramps keeps the overall loudness steady.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::Duration;

/// Shape of a volume ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Gain proportional to progress
    ///
    /// Two overlapping linear fades keep the amplitude sum constant but not the
    /// power, so the midpoint dips by 3dB. Prefer `EqualPower` for music.
    Linear,

    /// Square root fade: rises quickly at first then slows down
    SquareRoot,

    /// Raised cosine: gentle at both ends
    SCurve,

    /// Quarter sine, constant power across a crossfade
    #[default]
    EqualPower,
}

impl FadeCurve {
    /// Gain at a normalized position in the fade (0.0 to 1.0)
    ///
    /// Returns a multiplier between 0.0 and 1.0.
    #[inline]
    pub fn calculate_gain(&self, position: f32, fade_out: bool) -> f32 {
        let position = position.clamp(0.0, 1.0);
        let t = if fade_out { 1.0 - position } else { position };

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SquareRoot => {
                if t <= 0.0 {
                    0.0
                } else {
                    t.sqrt()
                }
            }
            FadeCurve::SCurve => (1.0 - (PI * t).cos()) * 0.5,
            // sin²(x) + cos²(x) = 1
            FadeCurve::EqualPower => (t * PI * 0.5).sin(),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::SquareRoot => "Square Root",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }
}

/// Direction of a ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// One volume ramp in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRamp {
    curve: FadeCurve,
    direction: FadeDirection,
    duration: Duration,
}

impl FadeRamp {
    pub fn new(curve: FadeCurve, direction: FadeDirection, duration: Duration) -> Self {
        Self {
            curve,
            direction,
            duration,
        }
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Progress from 0.0 (just started) to 1.0 (complete)
    pub fn progress(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    /// Gain multiplier after `elapsed`
    pub fn gain(&self, elapsed: Duration) -> f32 {
        self.curve.calculate_gain(
            self.progress(elapsed),
            self.direction == FadeDirection::Out,
        )
    }

    /// Scale a target volume (0-255) by the ramp's gain
    pub fn volume(&self, elapsed: Duration, target: u8) -> u8 {
        (f32::from(target) * self.gain(elapsed)).round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.001;

    #[test]
    fn test_curve_endpoints() {
        for curve in [
            FadeCurve::Linear,
            FadeCurve::SquareRoot,
            FadeCurve::SCurve,
            FadeCurve::EqualPower,
        ] {
            assert!(curve.calculate_gain(0.0, false).abs() < EPSILON);
            assert!((curve.calculate_gain(1.0, false) - 1.0).abs() < EPSILON);
            assert!((curve.calculate_gain(0.0, true) - 1.0).abs() < EPSILON);
            assert!(curve.calculate_gain(1.0, true).abs() < EPSILON);
        }
    }

    #[test]
    fn test_equal_power_constant_power() {
        let curve = FadeCurve::EqualPower;
        for i in 0..=10 {
            let pos = i as f32 / 10.0;
            let out = curve.calculate_gain(pos, true);
            let inc = curve.calculate_gain(pos, false);
            assert!((out * out + inc * inc - 1.0).abs() < 0.01);
        }
    }

    #[test]
    fn test_ramp_volume() {
        let ramp = FadeRamp::new(
            FadeCurve::Linear,
            FadeDirection::Out,
            Duration::from_millis(1000),
        );

        assert_eq!(ramp.volume(Duration::ZERO, 200), 200);
        assert_eq!(ramp.volume(Duration::from_millis(500), 200), 100);
        assert_eq!(ramp.volume(Duration::from_millis(2000), 200), 0);
        assert!(ramp.is_complete(Duration::from_millis(1000)));
    }

    #[test]
    fn test_zero_length_ramp_is_complete() {
        let ramp = FadeRamp::new(FadeCurve::EqualPower, FadeDirection::In, Duration::ZERO);
        assert!((ramp.progress(Duration::ZERO) - 1.0).abs() < EPSILON);
        assert_eq!(ramp.volume(Duration::ZERO, 255), 255);
    }
}
