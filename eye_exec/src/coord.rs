//! # Coordinate Model
//!
//! Tracks the position of every axis of both eyes in two frames:
//!
//! - absolute: the servo angle, limited to the hardware range of the axis,
//! - relative: the offset from the eye's zero reference, which is what commands use.
//!
//! Positions are only changed by the motion planner once a move has actually been applied.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use eye_if::eqpt::{AxisId, EyeId, NUM_AXES, NUM_EYES};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Absolute limits of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisLimits {
    /// Units: degrees
    pub min_deg: f64,

    /// Units: degrees
    pub max_deg: f64,
}

/// Position of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisPosition {
    /// Current absolute angle.
    ///
    /// Units: degrees
    pub abs_deg: f64,

    /// Absolute angle which the relative frame is measured from.
    ///
    /// Units: degrees
    pub zero_deg: f64,
}

/// Position of both axes of an eye, indexed by [`AxisId::index`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyePosition {
    pub axes: [AxisPosition; NUM_AXES],
}

/// The coordinate model of both eyes.
#[derive(Debug, Clone)]
pub struct CoordModel {
    limits: [AxisLimits; NUM_AXES],

    eyes: [EyePosition; NUM_EYES],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Invalid configuration of the coordinate model.
#[derive(Debug, Error, PartialEq)]
pub enum CoordError {
    #[error("The {0} limits are invalid, min ({1}) must be less than max ({2})")]
    InvalidLimits(AxisId, f64, f64),

    #[error("The {0} eye's {1} zero point ({2}) is outside the absolute limits [{3}, {4}]")]
    ZeroOutOfLimits(EyeId, AxisId, f64, f64, f64),

    #[error("The {0} eye's {1} zero point is not a finite number")]
    NonFiniteZero(EyeId, AxisId),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AxisLimits {
    pub fn contains(&self, abs_deg: f64) -> bool {
        abs_deg >= self.min_deg && abs_deg <= self.max_deg
    }
}

impl AxisPosition {
    /// Offset of the axis from its zero reference.
    ///
    /// Units: degrees
    pub fn rel_deg(&self) -> f64 {
        self.abs_deg - self.zero_deg
    }
}

impl EyePosition {
    pub fn axis(&self, axis: AxisId) -> &AxisPosition {
        &self.axes[axis.index()]
    }

    /// Relative position as `(pan, tilt)`.
    pub fn rel_deg(&self) -> (f64, f64) {
        (
            self.axis(AxisId::Pan).rel_deg(),
            self.axis(AxisId::Tilt).rel_deg(),
        )
    }

    /// Absolute position as `(pan, tilt)`.
    pub fn abs_deg(&self) -> (f64, f64) {
        (
            self.axis(AxisId::Pan).abs_deg,
            self.axis(AxisId::Tilt).abs_deg,
        )
    }
}

impl CoordModel {
    /// Create a new model from the axis limits (`[min, max]` per axis) and the zero reference of
    /// each eye (`[pan, tilt]` per eye).
    ///
    /// Every eye starts at its zero reference.
    pub fn new(
        limits_deg: [[f64; 2]; NUM_AXES],
        zeros_deg: [[f64; NUM_AXES]; NUM_EYES],
    ) -> Result<Self, CoordError> {
        let mut limits = [AxisLimits {
            min_deg: 0.0,
            max_deg: 0.0,
        }; NUM_AXES];

        for axis in AxisId::ALL.iter() {
            let [min_deg, max_deg] = limits_deg[axis.index()];

            if !min_deg.is_finite() || !max_deg.is_finite() || min_deg >= max_deg {
                return Err(CoordError::InvalidLimits(*axis, min_deg, max_deg));
            }

            limits[axis.index()] = AxisLimits { min_deg, max_deg };
        }

        let centre = AxisPosition {
            abs_deg: 0.0,
            zero_deg: 0.0,
        };
        let mut model = Self {
            limits,
            eyes: [EyePosition {
                axes: [centre; NUM_AXES],
            }; NUM_EYES],
        };

        for eye in EyeId::ALL.iter() {
            let [pan, tilt] = zeros_deg[eye.index()];
            model.set_zero(*eye, pan, tilt)?;

            for axis in AxisId::ALL.iter() {
                let pos = &mut model.eyes[eye.index()].axes[axis.index()];
                pos.abs_deg = pos.zero_deg;
            }
        }

        Ok(model)
    }

    /// Set the zero reference of an eye.
    ///
    /// The absolute position of the eye is not changed, so its relative position shifts.
    pub fn set_zero(&mut self, eye: EyeId, pan_deg: f64, tilt_deg: f64) -> Result<(), CoordError> {
        let zeros = [pan_deg, tilt_deg];

        // Validate both axes before changing anything
        for axis in AxisId::ALL.iter() {
            let zero = zeros[axis.index()];
            let lim = self.limits[axis.index()];

            if !zero.is_finite() {
                return Err(CoordError::NonFiniteZero(eye, *axis));
            }
            if !lim.contains(zero) {
                return Err(CoordError::ZeroOutOfLimits(
                    eye,
                    *axis,
                    zero,
                    lim.min_deg,
                    lim.max_deg,
                ));
            }
        }

        for axis in AxisId::ALL.iter() {
            self.eyes[eye.index()].axes[axis.index()].zero_deg = zeros[axis.index()];
        }

        Ok(())
    }

    /// Convert a relative angle of the given eye and axis into an absolute one.
    pub fn to_absolute(&self, eye: EyeId, axis: AxisId, rel_deg: f64) -> f64 {
        self.eyes[eye.index()].axes[axis.index()].zero_deg + rel_deg
    }

    /// Convert an absolute angle of the given eye and axis into a relative one.
    pub fn to_relative(&self, eye: EyeId, axis: AxisId, abs_deg: f64) -> f64 {
        abs_deg - self.eyes[eye.index()].axes[axis.index()].zero_deg
    }

    /// Clamp an absolute angle into the limits of the axis.
    ///
    /// Returns the clamped value and whether clamping changed it.
    pub fn clamp(&self, axis: AxisId, abs_deg: f64) -> (f64, bool) {
        let lim = &self.limits[axis.index()];
        let clamped = clamp(&abs_deg, &lim.min_deg, &lim.max_deg);

        (clamped, clamped != abs_deg)
    }

    /// Absolute limits of the axis as `(min, max)`.
    pub fn limits(&self, axis: AxisId) -> (f64, f64) {
        let lim = &self.limits[axis.index()];
        (lim.min_deg, lim.max_deg)
    }

    /// Limits of the axis in the relative frame of the given eye, as `(min, max)`.
    pub fn limits_relative(&self, eye: EyeId, axis: AxisId) -> (f64, f64) {
        let (min, max) = self.limits(axis);
        (
            self.to_relative(eye, axis, min),
            self.to_relative(eye, axis, max),
        )
    }

    /// Current position of an eye.
    pub fn position(&self, eye: EyeId) -> &EyePosition {
        &self.eyes[eye.index()]
    }

    /// Record that an axis has reached the given absolute angle.
    ///
    /// The angle is clamped into the axis limits, so the model can never hold an out of range
    /// position.
    pub(crate) fn commit(&mut self, eye: EyeId, axis: AxisId, abs_deg: f64) {
        let (abs_deg, _) = self.clamp(axis, abs_deg);
        self.eyes[eye.index()].axes[axis.index()].abs_deg = abs_deg;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn model() -> CoordModel {
        CoordModel::new([[0.0, 180.0], [0.0, 180.0]], [[97.0, 93.0], [90.0, 90.0]]).unwrap()
    }

    #[test]
    fn test_startup_at_zero() {
        let m = model();

        assert_eq!(m.position(EyeId::Left).abs_deg(), (97.0, 93.0));
        assert_eq!(m.position(EyeId::Left).rel_deg(), (0.0, 0.0));
        assert_eq!(m.position(EyeId::Right).rel_deg(), (0.0, 0.0));
    }

    #[test]
    fn test_frames() {
        let m = model();

        assert_eq!(m.to_absolute(EyeId::Left, AxisId::Pan, 20.0), 117.0);
        assert_eq!(m.to_absolute(EyeId::Left, AxisId::Tilt, 10.0), 103.0);
        assert_eq!(m.to_relative(EyeId::Left, AxisId::Tilt, 103.0), 10.0);

        assert_eq!(m.limits(AxisId::Pan), (0.0, 180.0));
        assert_eq!(m.limits_relative(EyeId::Left, AxisId::Pan), (-97.0, 83.0));
        assert_eq!(m.limits_relative(EyeId::Right, AxisId::Tilt), (-90.0, 90.0));
    }

    #[test]
    fn test_clamp() {
        let m = model();

        assert_eq!(m.clamp(AxisId::Pan, 190.0), (180.0, true));
        assert_eq!(m.clamp(AxisId::Tilt, -5.0), (0.0, true));
        assert_eq!(m.clamp(AxisId::Tilt, 45.5), (45.5, false));
        assert_eq!(m.clamp(AxisId::Pan, 180.0), (180.0, false));
    }

    #[test]
    fn test_set_zero() {
        let mut m = model();

        assert!(m.set_zero(EyeId::Right, 100.0, 80.0).is_ok());
        assert_eq!(m.position(EyeId::Right).rel_deg(), (-10.0, 10.0));

        assert_eq!(
            m.set_zero(EyeId::Right, 181.0, 80.0),
            Err(CoordError::ZeroOutOfLimits(
                EyeId::Right,
                AxisId::Pan,
                181.0,
                0.0,
                180.0
            ))
        );
        assert_eq!(
            m.set_zero(EyeId::Left, 90.0, std::f64::NAN),
            Err(CoordError::NonFiniteZero(EyeId::Left, AxisId::Tilt))
        );

        // Failed calls leave the zero untouched
        assert_eq!(m.position(EyeId::Right).axis(AxisId::Pan).zero_deg, 100.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            CoordModel::new([[10.0, 10.0], [0.0, 180.0]], [[10.0, 90.0], [10.0, 90.0]]),
            Err(CoordError::InvalidLimits(AxisId::Pan, _, _))
        ));
        assert!(matches!(
            CoordModel::new([[0.0, 180.0], [0.0, 180.0]], [[90.0, 200.0], [90.0, 90.0]]),
            Err(CoordError::ZeroOutOfLimits(EyeId::Left, AxisId::Tilt, ..))
        ));
    }

    #[test]
    fn test_commit_clamps() {
        let mut m = model();
        m.commit(EyeId::Left, AxisId::Pan, 250.0);
        assert_eq!(m.position(EyeId::Left).axis(AxisId::Pan).abs_deg, 180.0);
    }
}
