//! Trapezoidal velocity profiles
//!
//! A profile accelerates at a constant rate up to the maximum velocity, cruises, then decelerates
//! at the same rate onto the target. If the move is too short to reach the maximum velocity the
//! cruise phase disappears and the profile becomes triangular.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Longest profile which can be executed.
///
/// Units: seconds
pub const MAX_DURATION_S: f64 = 60.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The velocity profile of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisProfile {
    /// Units: degrees (absolute)
    pub start_deg: f64,

    /// Post-clamp target.
    ///
    /// Units: degrees (absolute)
    pub target_deg: f64,

    /// Units: degrees/second^2
    pub accel_degss: f64,

    /// Units: degrees/second
    pub max_vel_degs: f64,

    /// Distance needed to reach the maximum velocity from rest, `max_vel^2 / (2 accel)`.
    ///
    /// Units: degrees
    pub ramp_distance_deg: f64,

    /// Highest velocity reached during the move.
    ///
    /// Units: degrees/second
    pub peak_vel_degs: f64,

    /// Units: seconds
    pub accel_duration_s: f64,

    /// Units: seconds
    pub cruise_duration_s: f64,

    /// Units: seconds
    pub total_duration_s: f64,

    pub shape: ProfileShape,

    /// +1 or -1
    direction: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileShape {
    /// Start and target are the same
    Stationary,

    /// No cruise phase
    Triangular,

    Trapezoidal,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("Acceleration must be positive and finite, found {0}")]
    InvalidAccel(f64),

    #[error("Maximum velocity must be positive and finite, found {0}")]
    InvalidVelocity(f64),

    #[error("Start and target must be finite, found {0} and {1}")]
    InvalidEndpoints(f64, f64),

    #[error("Move would last {0} s, longer than the {} s limit", MAX_DURATION_S)]
    TooLong(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AxisProfile {
    /// Compute the profile of a move from `start_deg` to `target_deg`.
    pub fn new(
        start_deg: f64,
        target_deg: f64,
        accel_degss: f64,
        max_vel_degs: f64,
    ) -> Result<Self, ProfileError> {
        if !accel_degss.is_finite() || accel_degss <= 0.0 {
            return Err(ProfileError::InvalidAccel(accel_degss));
        }
        if !max_vel_degs.is_finite() || max_vel_degs <= 0.0 {
            return Err(ProfileError::InvalidVelocity(max_vel_degs));
        }
        if !start_deg.is_finite() || !target_deg.is_finite() {
            return Err(ProfileError::InvalidEndpoints(start_deg, target_deg));
        }

        let displacement = target_deg - start_deg;
        let distance = displacement.abs();
        let direction = if displacement < 0.0 { -1.0 } else { 1.0 };

        let ramp_distance_deg = max_vel_degs.powi(2) / (2.0 * accel_degss);

        let (shape, peak_vel_degs, cruise_duration_s) = if distance == 0.0 {
            (ProfileShape::Stationary, 0.0, 0.0)
        } else if 2.0 * ramp_distance_deg >= distance {
            (
                ProfileShape::Triangular,
                (accel_degss * distance).sqrt(),
                0.0,
            )
        } else {
            (
                ProfileShape::Trapezoidal,
                max_vel_degs,
                (distance - 2.0 * ramp_distance_deg) / max_vel_degs,
            )
        };

        let accel_duration_s = peak_vel_degs / accel_degss;
        let total_duration_s = 2.0 * accel_duration_s + cruise_duration_s;

        if !total_duration_s.is_finite() || total_duration_s > MAX_DURATION_S {
            return Err(ProfileError::TooLong(total_duration_s));
        }

        Ok(Self {
            start_deg,
            target_deg,
            accel_degss,
            max_vel_degs,
            ramp_distance_deg,
            peak_vel_degs,
            accel_duration_s,
            cruise_duration_s,
            total_duration_s,
            shape,
            direction,
        })
    }

    /// Position along the profile at `t_s` seconds after the start of the move.
    ///
    /// Before the start this is the start position, after the end the target.
    pub fn position_at(&self, t_s: f64) -> f64 {
        if t_s <= 0.0 {
            return self.start_deg;
        }
        if t_s >= self.total_duration_s {
            return self.target_deg;
        }

        self.start_deg + self.direction * self.distance_at(t_s)
    }

    /// Signed velocity along the profile at `t_s` seconds after the start of the move.
    ///
    /// Units: degrees/second
    pub fn velocity_at(&self, t_s: f64) -> f64 {
        if t_s <= 0.0 || t_s >= self.total_duration_s {
            return 0.0;
        }

        let t_acc = self.accel_duration_s;
        let t_dec = t_acc + self.cruise_duration_s;

        let speed = if t_s < t_acc {
            self.accel_degss * t_s
        } else if t_s < t_dec {
            self.peak_vel_degs
        } else {
            self.peak_vel_degs - self.accel_degss * (t_s - t_dec)
        };

        self.direction * speed
    }

    /// Unsigned distance travelled at `t_s`, for `0 < t_s < total`.
    fn distance_at(&self, t_s: f64) -> f64 {
        let t_acc = self.accel_duration_s;
        let t_dec = t_acc + self.cruise_duration_s;
        let d_acc = 0.5 * self.accel_degss * t_acc.powi(2);

        if t_s < t_acc {
            0.5 * self.accel_degss * t_s.powi(2)
        } else if t_s < t_dec {
            d_acc + self.peak_vel_degs * (t_s - t_acc)
        } else {
            let td = t_s - t_dec;
            d_acc + self.peak_vel_degs * self.cruise_duration_s + self.peak_vel_degs * td
                - 0.5 * self.accel_degss * td.powi(2)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_triangular() {
        // 20 deg at 2000 deg/s^2 never reaches 400 deg/s (ramp is 40 deg)
        let p = AxisProfile::new(97.0, 117.0, 2000.0, 400.0).unwrap();

        assert_eq!(p.shape, ProfileShape::Triangular);
        assert_eq!(p.ramp_distance_deg, 40.0);
        assert!((p.peak_vel_degs - 200.0).abs() < EPS);
        assert!((p.total_duration_s - 0.2).abs() < EPS);
        assert_eq!(p.cruise_duration_s, 0.0);

        // Halfway point in time and distance
        assert!((p.position_at(0.1) - 107.0).abs() < EPS);
        assert!((p.velocity_at(0.1) - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_trapezoidal() {
        let p = AxisProfile::new(10.0, 110.0, 2000.0, 400.0).unwrap();

        assert_eq!(p.shape, ProfileShape::Trapezoidal);
        assert_eq!(p.peak_vel_degs, 400.0);
        assert!((p.accel_duration_s - 0.2).abs() < EPS);
        assert!((p.cruise_duration_s - 0.05).abs() < EPS);
        assert!((p.total_duration_s - 0.45).abs() < EPS);

        // End of the acceleration phase covers the ramp distance
        assert!((p.position_at(0.2) - 50.0).abs() < EPS);
        assert!((p.velocity_at(0.22) - 400.0).abs() < EPS);
        assert!((p.position_at(0.25) - 70.0).abs() < EPS);
    }

    #[test]
    fn test_direction_and_ends() {
        let p = AxisProfile::new(100.0, 80.0, 2000.0, 400.0).unwrap();

        assert_eq!(p.position_at(-1.0), 100.0);
        assert_eq!(p.position_at(10.0), 80.0);
        assert!(p.velocity_at(0.05) < 0.0);
        assert!(p.position_at(0.05) < 100.0);

        // Positions are monotonic towards the target
        let mut last = p.position_at(0.0);
        for k in 1..=30 {
            let pos = p.position_at(k as f64 * 0.01);
            assert!(pos <= last + EPS);
            last = pos;
        }
    }

    #[test]
    fn test_stationary() {
        let p = AxisProfile::new(90.0, 90.0, 2000.0, 400.0).unwrap();
        assert_eq!(p.shape, ProfileShape::Stationary);
        assert_eq!(p.total_duration_s, 0.0);
        assert_eq!(p.position_at(0.0), 90.0);
    }

    #[test]
    fn test_invalid() {
        assert_eq!(
            AxisProfile::new(0.0, 1.0, 0.0, 400.0),
            Err(ProfileError::InvalidAccel(0.0))
        );
        assert_eq!(
            AxisProfile::new(0.0, 1.0, 2000.0, -1.0),
            Err(ProfileError::InvalidVelocity(-1.0))
        );
        assert!(AxisProfile::new(std::f64::NAN, 1.0, 2000.0, 400.0).is_err());
    }

    #[test]
    fn test_too_long() {
        // The ramp distance underflows to zero, leaving an astronomically long cruise
        assert!(matches!(
            AxisProfile::new(90.0, 130.0, 2000.0, 1e-300),
            Err(ProfileError::TooLong(_))
        ));
        assert!(matches!(
            AxisProfile::new(0.0, 180.0, 1e-300, 400.0),
            Err(ProfileError::TooLong(_))
        ));

        // A full sweep at 4 deg/s still fits
        let p = AxisProfile::new(0.0, 180.0, 1e6, 4.0).unwrap();
        assert!((p.total_duration_s - 45.0).abs() < 1e-3);
    }
}
