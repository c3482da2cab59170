//! Motion quality analytics
//!
//! Pure functions over a recorded sample slice, computed on demand. Velocities and accelerations
//! are derived from the recorded positions, so they describe what the eye actually did rather
//! than what the planner intended.
//!
//! Quantities combining both axes use the magnitude of the gaze vector, `hypot(pan, tilt)`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

use super::TelemetrySample;
use eye_if::eqpt::AxisId;
use util::maths::{gradient, mean, moving_average, percentile};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of samples in the position smoothing window.
pub const SMOOTHING_WINDOW: usize = 5;

/// Percentile of the acceleration magnitude reported as the peak acceleration.
pub const PEAK_ACCEL_PERCENTILE: f64 = 90.0;

/// Default fraction of samples ignored at each end when averaging acceleration.
pub const DEFAULT_TRIM_FRACTION: f64 = 0.1;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Summary of a recorded move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct MotionStats {
    /// Units: seconds
    pub duration_s: f64,

    pub num_samples: usize,

    /// Units: degrees/second
    pub peak_vel_degs: f64,

    /// Units: degrees/second^2
    pub peak_accel_degss: f64,

    /// Units: degrees/second^2
    pub avg_accel_degss: f64,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Duration of the recording, the timestamp of the last sample.
pub fn duration_s(samples: &[TelemetrySample]) -> f64 {
    samples.last().map(|s| s.time_s).unwrap_or(0.0)
}

/// Velocity of an axis at every sample, from the smoothed absolute position.
pub fn smoothed_velocity(samples: &[TelemetrySample], axis: AxisId) -> Vec<f64> {
    let positions: Vec<f64> = samples
        .iter()
        .map(|s| match axis {
            AxisId::Pan => s.pan_abs,
            AxisId::Tilt => s.tilt_abs,
        })
        .collect();

    gradient(
        &moving_average(&positions, SMOOTHING_WINDOW),
        &timestamps(samples),
    )
}

/// Acceleration of an axis at every sample, the derivative of [`smoothed_velocity`].
pub fn acceleration(samples: &[TelemetrySample], axis: AxisId) -> Vec<f64> {
    gradient(&smoothed_velocity(samples, axis), &timestamps(samples))
}

/// Magnitude of the gaze velocity at every sample.
pub fn speed(samples: &[TelemetrySample]) -> Vec<f64> {
    magnitude(
        &smoothed_velocity(samples, AxisId::Pan),
        &smoothed_velocity(samples, AxisId::Tilt),
    )
}

/// Magnitude of the gaze acceleration at every sample.
pub fn accel_magnitude(samples: &[TelemetrySample]) -> Vec<f64> {
    magnitude(
        &acceleration(samples, AxisId::Pan),
        &acceleration(samples, AxisId::Tilt),
    )
}

/// Peak acceleration, taken as a high percentile rather than the maximum so a single noisy sample
/// doesn't dominate.
pub fn peak_accel(samples: &[TelemetrySample]) -> f64 {
    percentile(&accel_magnitude(samples), PEAK_ACCEL_PERCENTILE).unwrap_or(0.0)
}

/// Mean acceleration magnitude, ignoring `trim_fraction` of the samples at each end.
///
/// If trimming would leave nothing all samples are used.
pub fn avg_accel(samples: &[TelemetrySample], trim_fraction: f64) -> f64 {
    let accel = accel_magnitude(samples);
    let trim = (accel.len() as f64 * trim_fraction.max(0.0)).floor() as usize;

    let trimmed = if 2 * trim < accel.len() {
        &accel[trim..accel.len() - trim]
    } else {
        &accel[..]
    };

    mean(trimmed).unwrap_or(0.0)
}

/// Compute all analytics of a recording.
pub fn stats(samples: &[TelemetrySample], trim_fraction: f64) -> MotionStats {
    MotionStats {
        duration_s: duration_s(samples),
        num_samples: samples.len(),
        peak_vel_degs: speed(samples).into_iter().fold(0.0, f64::max),
        peak_accel_degss: peak_accel(samples),
        avg_accel_degss: avg_accel(samples, trim_fraction),
    }
}

fn timestamps(samples: &[TelemetrySample]) -> Vec<f64> {
    samples.iter().map(|s| s.time_s).collect()
}

fn magnitude(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b.iter()).map(|(a, b)| a.hypot(*b)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::motion::profile::AxisProfile;

    /// Samples of a pan-only profile at 100 Hz, with a final sample on the target.
    fn recording(profile: &AxisProfile) -> Vec<TelemetrySample> {
        let mut times: Vec<f64> = (0..)
            .map(|k| k as f64 * 0.01)
            .take_while(|t| *t < profile.total_duration_s)
            .collect();
        times.push(profile.total_duration_s);

        times
            .into_iter()
            .map(|t| {
                let pan = profile.position_at(t);
                TelemetrySample {
                    time_s: t,
                    pan_abs: pan,
                    tilt_abs: 90.0,
                    pan_rel: pan - 90.0,
                    tilt_rel: 0.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_empty() {
        assert_eq!(stats(&[], 0.1), MotionStats::default());
    }

    #[test]
    fn test_trapezoidal_stats() {
        let profile = AxisProfile::new(90.0, 180.0, 2000.0, 400.0).unwrap();
        let samples = recording(&profile);
        let s = stats(&samples, DEFAULT_TRIM_FRACTION);

        assert_eq!(s.num_samples, 44);
        assert!((s.duration_s - 0.425).abs() < 1e-9);

        // Smoothing can only lower the peak velocity
        assert!(s.peak_vel_degs <= 400.0 + 1e-6);
        assert!(s.peak_vel_degs > 300.0);

        // Acceleration is bounded by the profile's, give or take the edges of the smoothing
        assert!(s.peak_accel_degss > 1000.0);
        assert!(s.peak_accel_degss < 2500.0);
        assert!(s.avg_accel_degss > 0.0);
        assert!(s.avg_accel_degss < s.peak_accel_degss);
    }

    #[test]
    fn test_stationary_has_no_motion() {
        let profile = AxisProfile::new(90.0, 90.0, 2000.0, 400.0).unwrap();
        let samples = recording(&profile);
        let s = stats(&samples, DEFAULT_TRIM_FRACTION);

        assert_eq!(s.num_samples, 1);
        assert_eq!(s.peak_vel_degs, 0.0);
        assert_eq!(s.peak_accel_degss, 0.0);
    }
}
