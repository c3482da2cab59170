//! # Motion Planner
//!
//! The planner owns the servo driver and the coordinate model, and is the only place either is
//! changed. Moves are executed in one of two modes:
//!
//! - immediate: targets are clamped and written to every channel at once, positions are updated
//!   once all writes succeeded,
//! - profiled: every axis follows its own trapezoidal velocity profile, advanced by one sample per
//!   call to [`MotionPlanner::step`], and the reference eye is recorded by the telemetry recorder.
//!
//! While a profiled move executes the planner is busy and rejects new moves.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod profile;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info, trace, warn};
use thiserror::Error;

use crate::coord::CoordModel;
use crate::params::EyeExecParams;
use crate::servo_ctrl::{ServoDriver, ServoError};
use crate::telemetry::Recorder;
use eye_if::{
    cmd::{AxisField, Preset},
    eqpt::{AxisId, EyeId, EyeScope, NUM_AXES, NUM_EYES},
};
use profile::{AxisProfile, ProfileError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A request to move the eyes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest {
    /// Eyes the request applies to. Telemetry and two-value responses use its reference eye.
    pub scope: EyeScope,

    /// Relative targets indexed by `[eye][axis]`
    pub targets: [[AxisField; NUM_AXES]; NUM_EYES],

    /// Units: degrees/second^2
    pub accel_degss: Option<f64>,

    /// Units: degrees/second
    pub max_vel_degs: Option<f64>,

    pub mode: ExecMode,
}

/// Motion parameters used when a request doesn't override them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionDefaults {
    /// Units: degrees/second^2
    pub accel_degss: f64,

    /// Units: degrees/second
    pub max_vel_degs: f64,

    /// Units: seconds
    pub sample_period_s: f64,
}

/// The result of an applied immediate move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedMove {
    /// Relative targets as requested, `[eye][axis]`
    pub requested_rel_deg: [[f64; NUM_AXES]; NUM_EYES],

    /// Relative positions after the move, `[eye][axis]`
    pub applied_rel_deg: [[f64; NUM_AXES]; NUM_EYES],

    /// Absolute positions after the move, `[eye][axis]`
    pub applied_abs_deg: [[f64; NUM_AXES]; NUM_EYES],

    /// True if any target was clamped into the axis limits
    pub clamped: bool,
}

/// Information on a profiled move which has just been started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileStart {
    /// Duration of the longest axis profile.
    ///
    /// Units: seconds
    pub duration_s: f64,

    /// Number of telemetry samples the move will produce
    pub expected_samples: usize,

    pub clamped: bool,
}

/// Summary of a profiled move which has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSummary {
    pub reference_eye: EyeId,

    /// Requested relative target of the reference eye as `(pan, tilt)`
    pub requested_rel_deg: (f64, f64),

    /// Relative position of the reference eye at the end of the move
    pub final_rel_deg: (f64, f64),

    /// Absolute position of the reference eye at the end of the move
    pub final_abs_deg: (f64, f64),

    /// Time of the last executed sample.
    ///
    /// Units: seconds
    pub duration_s: f64,

    pub num_samples: usize,

    pub clamped: bool,
}

/// The motion planner/executor.
pub struct MotionPlanner<D: ServoDriver> {
    driver: D,

    coords: CoordModel,

    /// Servo channel of every axis, `[eye][axis]`
    channels: [[u8; NUM_AXES]; NUM_EYES],

    engaged: bool,

    defaults: MotionDefaults,

    active: Option<ActiveProfile>,

    recorder: Recorder,
}

/// A profiled move in progress.
struct ActiveProfile {
    reference_eye: EyeId,

    /// Profiles of every axis, `[eye][axis]`
    axes: [[AxisProfile; NUM_AXES]; NUM_EYES],

    requested_rel_deg: [[f64; NUM_AXES]; NUM_EYES],

    clamped: bool,

    /// Index of the next sample to execute
    next_sample: usize,

    period_s: f64,

    total_s: f64,
}

/// Targets resolved into the absolute frame.
struct Resolved {
    requested_rel_deg: [[f64; NUM_AXES]; NUM_EYES],
    target_abs_deg: [[f64; NUM_AXES]; NUM_EYES],
    clamped: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Execution mode of a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Immediate,
    Profiled,
}

/// Outcome of a single [`MotionPlanner::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A sample was executed and the move continues
    Sampled { time_s: f64 },

    /// The final sample was executed
    Completed(ProfileSummary),

    /// The move was aborted by a driver failure, positions hold the last achieved sample
    Failed(MotionError, ProfileSummary),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MotionError {
    #[error("BUSY profiled move in progress")]
    Busy,

    #[error("DRIVER {0} {1} channel {2}: {3}")]
    Driver(EyeId, AxisId, u8, ServoError),

    #[error("PROFILE {0}")]
    Profile(ProfileError),

    #[error("No servo channel is configured for the {0} eye's {1} axis")]
    UnconfiguredAxis(EyeId, AxisId),

    #[error("Sample period must be positive and finite, found {0}")]
    InvalidSamplePeriod(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MotionRequest {
    /// Move the eyes in scope to a gaze preset at the given distance.
    pub fn preset(preset: Preset, distance_deg: f64, scope: EyeScope) -> Self {
        let (pan, tilt) = preset.direction();
        Self::in_scope(scope, pan * distance_deg, tilt * distance_deg)
    }

    /// Move both eyes to the given fields, ordered left pan, left tilt, right pan, right tilt.
    pub fn sac(fields: [AxisField; 4]) -> Self {
        Self {
            scope: EyeScope::Both,
            targets: [[fields[0], fields[1]], [fields[2], fields[3]]],
            accel_degss: None,
            max_vel_degs: None,
            mode: ExecMode::Immediate,
        }
    }

    /// Move the eyes in scope to the given relative target.
    pub fn target(
        scope: EyeScope,
        pan_deg: f64,
        tilt_deg: f64,
        accel_degss: Option<f64>,
        max_vel_degs: Option<f64>,
        mode: ExecMode,
    ) -> Self {
        Self {
            accel_degss,
            max_vel_degs,
            mode,
            ..Self::in_scope(scope, pan_deg, tilt_deg)
        }
    }

    /// Move both eyes to their zero reference, regardless of scope.
    pub fn zero() -> Self {
        Self::in_scope(EyeScope::Both, 0.0, 0.0)
    }

    fn in_scope(scope: EyeScope, pan_deg: f64, tilt_deg: f64) -> Self {
        let mut targets = [[AxisField::Unchanged; NUM_AXES]; NUM_EYES];

        for eye in scope.eyes() {
            targets[eye.index()] = [AxisField::Value(pan_deg), AxisField::Value(tilt_deg)];
        }

        Self {
            scope,
            targets,
            accel_degss: None,
            max_vel_degs: None,
            mode: ExecMode::Immediate,
        }
    }
}

impl MotionDefaults {
    pub fn from_params(params: &EyeExecParams) -> Self {
        Self {
            accel_degss: params.default_accel_degss,
            max_vel_degs: params.default_max_vel_degs,
            sample_period_s: params.sample_period_s,
        }
    }
}

impl AppliedMove {
    /// Relative position of an eye after the move as `(pan, tilt)`.
    pub fn rel(&self, eye: EyeId) -> (f64, f64) {
        let [pan, tilt] = self.applied_rel_deg[eye.index()];
        (pan, tilt)
    }

    /// Absolute position of an eye after the move as `(pan, tilt)`.
    pub fn abs(&self, eye: EyeId) -> (f64, f64) {
        let [pan, tilt] = self.applied_abs_deg[eye.index()];
        (pan, tilt)
    }

    /// Requested minus applied relative position of an eye, as `(pan, tilt)`.
    pub fn error(&self, eye: EyeId) -> (f64, f64) {
        let [req_pan, req_tilt] = self.requested_rel_deg[eye.index()];
        let (pan, tilt) = self.rel(eye);
        (req_pan - pan, req_tilt - tilt)
    }
}

impl<D: ServoDriver> MotionPlanner<D> {
    /// Create a new planner from its driver, the coordinate model and the channel table.
    ///
    /// The planner starts disengaged, nothing is sent to the driver until [`Self::engage`].
    pub fn new(
        driver: D,
        coords: CoordModel,
        params: &EyeExecParams,
    ) -> Result<Self, MotionError> {
        let mut channels = [[0u8; NUM_AXES]; NUM_EYES];

        for eye in EyeId::ALL.iter() {
            for axis in AxisId::ALL.iter() {
                channels[eye.index()][axis.index()] = params
                    .channel(*eye, *axis)
                    .ok_or(MotionError::UnconfiguredAxis(*eye, *axis))?
                    .channel;
            }
        }

        let defaults = MotionDefaults::from_params(params);
        if !defaults.sample_period_s.is_finite() || defaults.sample_period_s <= 0.0 {
            return Err(MotionError::InvalidSamplePeriod(defaults.sample_period_s));
        }

        Ok(Self {
            driver,
            coords,
            channels,
            engaged: false,
            defaults,
            active: None,
            recorder: Recorder::new(),
        })
    }

    pub fn coords(&self) -> &CoordModel {
        &self.coords
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// True while a profiled move is executing.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Execute a move immediately, ignoring its mode and any acceleration or velocity override.
    pub fn apply_immediate(&mut self, req: &MotionRequest) -> Result<AppliedMove, MotionError> {
        if self.is_busy() {
            return Err(MotionError::Busy);
        }

        let resolved = self.resolve(req);

        // Write everything before touching the model, so a failed write leaves the last good
        // position in place
        if self.engaged {
            for eye in EyeId::ALL.iter() {
                for axis in AxisId::ALL.iter() {
                    self.write(*eye, *axis, resolved.target_abs_deg[eye.index()][axis.index()])?;
                }
            }
        }

        for eye in EyeId::ALL.iter() {
            for axis in AxisId::ALL.iter() {
                self.coords.commit(
                    *eye,
                    *axis,
                    resolved.target_abs_deg[eye.index()][axis.index()],
                );
            }
        }

        debug!(
            "Immediate move applied: L {:?} R {:?}{}",
            self.coords.position(EyeId::Left).rel_deg(),
            self.coords.position(EyeId::Right).rel_deg(),
            if resolved.clamped { " (clamped)" } else { "" }
        );

        Ok(self.applied(&resolved))
    }

    /// Start a profiled move. Samples are executed by calling [`Self::step`] once per period.
    ///
    /// Starting a move discards the previous telemetry recording.
    pub fn start_profile(&mut self, req: &MotionRequest) -> Result<ProfileStart, MotionError> {
        if self.is_busy() {
            return Err(MotionError::Busy);
        }

        let accel = req.accel_degss.unwrap_or(self.defaults.accel_degss);
        let max_vel = req.max_vel_degs.unwrap_or(self.defaults.max_vel_degs);

        let resolved = self.resolve(req);

        let mut axes = [[AxisProfile::new(0.0, 0.0, accel, max_vel).map_err(MotionError::Profile)?;
            NUM_AXES]; NUM_EYES];
        let mut total_s: f64 = 0.0;

        for eye in EyeId::ALL.iter() {
            for axis in AxisId::ALL.iter() {
                let start = self.coords.position(*eye).axis(*axis).abs_deg;
                let target = resolved.target_abs_deg[eye.index()][axis.index()];

                let p = AxisProfile::new(start, target, accel, max_vel)
                    .map_err(MotionError::Profile)?;

                total_s = total_s.max(p.total_duration_s);
                axes[eye.index()][axis.index()] = p;
            }
        }

        let period_s = self.defaults.sample_period_s;
        let expected_samples = expected_samples(total_s, period_s);

        info!(
            "Starting profiled move: {:.3} s, {} samples, accel {} deg/s^2, max vel {} deg/s",
            total_s, expected_samples, accel, max_vel
        );

        self.recorder.start();
        self.active = Some(ActiveProfile {
            reference_eye: req.scope.reference_eye(),
            axes,
            requested_rel_deg: resolved.requested_rel_deg,
            clamped: resolved.clamped,
            next_sample: 0,
            period_s,
            total_s,
        });

        Ok(ProfileStart {
            duration_s: total_s,
            expected_samples,
            clamped: resolved.clamped,
        })
    }

    /// Execute the next sample of the active profiled move.
    ///
    /// Returns `None` if there is no active move.
    pub fn step(&mut self) -> Option<StepOutcome> {
        let (time_s, is_final, targets) = {
            let active = self.active.as_ref()?;

            let t = active.next_sample as f64 * active.period_s;

            if t < active.total_s {
                let mut targets = [[0.0; NUM_AXES]; NUM_EYES];
                for eye in EyeId::ALL.iter() {
                    for axis in AxisId::ALL.iter() {
                        targets[eye.index()][axis.index()] =
                            active.axes[eye.index()][axis.index()].position_at(t);
                    }
                }
                (t, false, targets)
            } else {
                // The final sample is pinned exactly on the target
                let mut targets = [[0.0; NUM_AXES]; NUM_EYES];
                for eye in EyeId::ALL.iter() {
                    for axis in AxisId::ALL.iter() {
                        targets[eye.index()][axis.index()] =
                            active.axes[eye.index()][axis.index()].target_deg;
                    }
                }
                (active.total_s, true, targets)
            }
        };

        // Each axis is committed as soon as it has been written, so a failure leaves every axis at
        // its last achieved position
        for eye in EyeId::ALL.iter() {
            for axis in AxisId::ALL.iter() {
                let abs_deg = targets[eye.index()][axis.index()];

                if self.engaged {
                    if let Err(e) = self.write(*eye, *axis, abs_deg) {
                        warn!("Profiled move aborted at {:.3} s: {}", time_s, e);
                        let summary = self.finish_active(false)?;
                        return Some(StepOutcome::Failed(e, summary));
                    }
                }

                self.coords.commit(*eye, *axis, abs_deg);
            }
        }

        self.record_sample(time_s);

        if is_final {
            let summary = self.finish_active(true)?;
            info!(
                "Profiled move complete: {:.3} s, {} samples",
                summary.duration_s, summary.num_samples
            );
            Some(StepOutcome::Completed(summary))
        } else {
            if let Some(active) = self.active.as_mut() {
                active.next_sample += 1;
            }
            Some(StepOutcome::Sampled { time_s })
        }
    }

    /// Abort the active profiled move, if there is one.
    ///
    /// Positions stay at the last executed sample and the partial telemetry is kept.
    pub fn cancel(&mut self) -> Option<ProfileSummary> {
        let summary = self.finish_active(false)?;

        info!(
            "Profiled move cancelled after {} samples ({:.3} s)",
            summary.num_samples, summary.duration_s
        );

        Some(summary)
    }

    /// Cancel any active move and return both eyes to their zero reference.
    ///
    /// The summary of the cancelled move is returned whether or not the move to zero succeeded.
    pub fn zero(
        &mut self,
    ) -> (
        Option<ProfileSummary>,
        Result<AppliedMove, MotionError>,
    ) {
        let cancelled = self.cancel();
        let applied = self.apply_immediate(&MotionRequest::zero());

        (cancelled, applied)
    }

    /// Power the servos on and send them the tracked positions.
    pub fn engage(&mut self) -> Result<(), MotionError> {
        for eye in EyeId::ALL.iter() {
            for axis in AxisId::ALL.iter() {
                let channel = self.channels[eye.index()][axis.index()];
                self.driver
                    .set_channel_power(channel, true)
                    .map_err(|e| MotionError::Driver(*eye, *axis, channel, e))?;

                let abs_deg = self.coords.position(*eye).axis(*axis).abs_deg;
                self.write(*eye, *axis, abs_deg)?;
            }
        }

        if !self.engaged {
            info!("Servos engaged");
        }
        self.engaged = true;

        Ok(())
    }

    /// Cancel any active move and power the servos off.
    ///
    /// The planner is disengaged even if powering a channel off fails, the first failure is
    /// returned alongside the summary of the cancelled move.
    pub fn disengage(&mut self) -> (Option<ProfileSummary>, Result<(), MotionError>) {
        let cancelled = self.cancel();
        let mut result = Ok(());

        for eye in EyeId::ALL.iter() {
            for axis in AxisId::ALL.iter() {
                let channel = self.channels[eye.index()][axis.index()];
                if let Err(e) = self.driver.set_channel_power(channel, false) {
                    warn!("Could not power off channel {}: {}", channel, e);
                    if result.is_ok() {
                        result = Err(MotionError::Driver(*eye, *axis, channel, e));
                    }
                }
            }
        }

        if self.engaged {
            info!("Servos disengaged");
        }
        self.engaged = false;

        (cancelled, result)
    }

    // ---- PRIVATE ----

    fn write(&mut self, eye: EyeId, axis: AxisId, abs_deg: f64) -> Result<(), MotionError> {
        let channel = self.channels[eye.index()][axis.index()];

        self.driver
            .set_channel_position(channel, abs_deg)
            .map_err(|e| MotionError::Driver(eye, axis, channel, e))
    }

    /// Resolve the targets of a request into clamped absolute angles.
    fn resolve(&self, req: &MotionRequest) -> Resolved {
        let mut requested_rel_deg = [[0.0; NUM_AXES]; NUM_EYES];
        let mut target_abs_deg = [[0.0; NUM_AXES]; NUM_EYES];
        let mut clamped = false;

        for eye in EyeId::ALL.iter() {
            let pos = self.coords.position(*eye);

            for axis in AxisId::ALL.iter() {
                let rel = match req.targets[eye.index()][axis.index()] {
                    AxisField::Value(v) => v,
                    AxisField::Unchanged => pos.axis(*axis).rel_deg(),
                };

                let (abs, was_clamped) = self
                    .coords
                    .clamp(*axis, self.coords.to_absolute(*eye, *axis, rel));

                if was_clamped {
                    debug!(
                        "{} {} target {:.2} clamped to {:.2} (relative)",
                        eye,
                        axis,
                        rel,
                        self.coords.to_relative(*eye, *axis, abs)
                    );
                }

                requested_rel_deg[eye.index()][axis.index()] = rel;
                target_abs_deg[eye.index()][axis.index()] = abs;
                clamped |= was_clamped;
            }
        }

        Resolved {
            requested_rel_deg,
            target_abs_deg,
            clamped,
        }
    }

    fn applied(&self, resolved: &Resolved) -> AppliedMove {
        let mut applied_rel_deg = [[0.0; NUM_AXES]; NUM_EYES];
        let mut applied_abs_deg = [[0.0; NUM_AXES]; NUM_EYES];

        for eye in EyeId::ALL.iter() {
            let pos = self.coords.position(*eye);
            for axis in AxisId::ALL.iter() {
                applied_rel_deg[eye.index()][axis.index()] = pos.axis(*axis).rel_deg();
                applied_abs_deg[eye.index()][axis.index()] = pos.axis(*axis).abs_deg;
            }
        }

        AppliedMove {
            requested_rel_deg: resolved.requested_rel_deg,
            applied_rel_deg,
            applied_abs_deg,
            clamped: resolved.clamped,
        }
    }

    fn record_sample(&mut self, time_s: f64) {
        let (eye, planned_vel) = match self.active.as_ref() {
            Some(a) => {
                let axes = &a.axes[a.reference_eye.index()];
                (
                    a.reference_eye,
                    (
                        axes[AxisId::Pan.index()].velocity_at(time_s),
                        axes[AxisId::Tilt.index()].velocity_at(time_s),
                    ),
                )
            }
            None => return,
        };
        let pos = self.coords.position(eye);

        trace!(
            "Sample {:.3} s: {} eye abs {:?}, planned vel {:?} deg/s",
            time_s,
            eye,
            pos.abs_deg(),
            planned_vel
        );

        self.recorder.record(time_s, pos.abs_deg(), pos.rel_deg());
    }

    /// Take the active move and summarise it.
    fn finish_active(&mut self, complete: bool) -> Option<ProfileSummary> {
        let active = self.active.take()?;

        if complete {
            self.recorder.finish();
        }

        let eye = active.reference_eye;
        let pos = self.coords.position(eye);
        let [req_pan, req_tilt] = active.requested_rel_deg[eye.index()];

        Some(ProfileSummary {
            reference_eye: eye,
            requested_rel_deg: (req_pan, req_tilt),
            final_rel_deg: pos.rel_deg(),
            final_abs_deg: pos.abs_deg(),
            duration_s: self
                .recorder
                .samples()
                .last()
                .map(|s| s.time_s)
                .unwrap_or(0.0),
            num_samples: self.recorder.samples().len(),
            clamped: active.clamped,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Number of samples a move of the given duration produces: one every period while the move is
/// running, plus the final sample on the target.
///
/// Saturates at `usize::MAX` for durations no profile can have.
pub fn expected_samples(total_s: f64, period_s: f64) -> usize {
    if !total_s.is_finite() || !period_s.is_finite() || total_s <= 0.0 || period_s <= 0.0 {
        return 1;
    }

    // Correct the rounding of the ratio so the count matches the `k * period < total` test of
    // the sampler exactly
    let ratio = (total_s / period_s).ceil();
    if ratio >= u32::MAX as f64 {
        return usize::MAX;
    }

    let mut n = ratio as usize;
    while n > 0 && ((n - 1) as f64) * period_s >= total_s {
        n -= 1;
    }
    while (n as f64) * period_s < total_s {
        n += 1;
    }

    n + 1
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::servo_ctrl::SimServos;

    fn planner(zero: [[f64; 2]; 2]) -> MotionPlanner<SimServos> {
        let params = EyeExecParams {
            zero_deg: zero,
            ..Default::default()
        };
        let coords = CoordModel::new(params.axis_limits_deg, params.zero_deg).unwrap();
        let mut p = MotionPlanner::new(SimServos::new(), coords, &params).unwrap();
        p.engage().unwrap();
        p
    }

    fn run_to_end(p: &mut MotionPlanner<SimServos>) -> StepOutcome {
        loop {
            match p.step() {
                Some(StepOutcome::Sampled { .. }) => continue,
                Some(o) => return o,
                None => panic!("No active move"),
            }
        }
    }

    #[test]
    fn test_presets_for_all_distances() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);

        for distance in [1.0, 5.0, 10.0, 20.0, 40.0].iter() {
            for preset in Preset::ALL.iter() {
                // Start from somewhere else each time
                p.apply_immediate(&MotionRequest::sac([AxisField::Value(3.0); 4]))
                    .unwrap();

                let m = p
                    .apply_immediate(&MotionRequest::preset(*preset, *distance, EyeScope::Both))
                    .unwrap();
                let (dp, dt) = preset.direction();

                for eye in EyeId::ALL.iter() {
                    assert_eq!(m.rel(*eye), (dp * distance, dt * distance));
                }
            }
        }
    }

    #[test]
    fn test_preset_scope() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);

        let m = p
            .apply_immediate(&MotionRequest::preset(Preset::UpperRight, 10.0, EyeScope::Right))
            .unwrap();

        assert_eq!(m.rel(EyeId::Left), (0.0, 0.0));
        assert_eq!(m.rel(EyeId::Right), (10.0, 10.0));
    }

    #[test]
    fn test_sac_unchanged_is_noop() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        p.apply_immediate(&MotionRequest::sac([
            AxisField::Value(12.5),
            AxisField::Value(-3.25),
            AxisField::Value(7.0),
            AxisField::Value(1.0),
        ]))
        .unwrap();

        let m = p
            .apply_immediate(&MotionRequest::sac([AxisField::Unchanged; 4]))
            .unwrap();

        assert_eq!(m.rel(EyeId::Left), (12.5, -3.25));
        assert_eq!(m.rel(EyeId::Right), (7.0, 1.0));
        assert!(!m.clamped);
    }

    #[test]
    fn test_clamping() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);

        let m = p
            .apply_immediate(&MotionRequest::target(
                EyeScope::Left,
                120.0,
                -100.0,
                None,
                None,
                ExecMode::Immediate,
            ))
            .unwrap();

        assert!(m.clamped);
        assert_eq!(m.abs(EyeId::Left), (180.0, 0.0));
        assert_eq!(m.rel(EyeId::Left), (90.0, -90.0));
        assert_eq!(m.error(EyeId::Left), (30.0, -10.0));
        assert_eq!(p.driver().position(4), Some(180.0));
    }

    #[test]
    fn test_driver_failure_keeps_last_good() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        p.driver_mut().set_failing_channel(Some(7));

        let e = p
            .apply_immediate(&MotionRequest::sac([AxisField::Value(5.0); 4]))
            .unwrap_err();

        assert!(matches!(e, MotionError::Driver(EyeId::Right, AxisId::Tilt, 7, _)));
        assert_eq!(p.coords().position(EyeId::Left).rel_deg(), (0.0, 0.0));
        assert_eq!(p.coords().position(EyeId::Right).rel_deg(), (0.0, 0.0));
    }

    #[test]
    fn test_disengaged_tracks_without_sending() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        let (cancelled, result) = p.disengage();
        assert_eq!(cancelled, None);
        result.unwrap();
        let writes = p.driver().num_writes();

        p.apply_immediate(&MotionRequest::sac([AxisField::Value(5.0); 4]))
            .unwrap();

        assert_eq!(p.driver().num_writes(), writes);
        assert_eq!(p.driver().powered(4), Some(false));
        assert_eq!(p.coords().position(EyeId::Left).rel_deg(), (5.0, 5.0));

        // Engaging sends the tracked position
        p.engage().unwrap();
        assert_eq!(p.driver().position(4), Some(95.0));
        assert_eq!(p.driver().powered(4), Some(true));
    }

    #[test]
    fn test_profile_scenario() {
        let mut p = planner([[97.0, 93.0], [90.0, 90.0]]);

        let req = MotionRequest::target(
            EyeScope::Both,
            20.0,
            10.0,
            Some(2000.0),
            Some(400.0),
            ExecMode::Profiled,
        );
        let start = p.start_profile(&req).unwrap();

        // Pan is the longest axis, a triangular 20 deg move
        assert!((start.duration_s - 0.2).abs() < 1e-9);
        assert!(p.is_busy());

        match run_to_end(&mut p) {
            StepOutcome::Completed(s) => {
                assert_eq!(s.reference_eye, EyeId::Left);
                assert_eq!(s.final_abs_deg, (117.0, 103.0));
                assert_eq!(s.final_rel_deg, (20.0, 10.0));
                assert_eq!(s.num_samples, start.expected_samples);
                assert!((s.duration_s - start.duration_s).abs() < 1e-12);
            }
            o => panic!("Expected completion, got {:?}", o),
        }

        assert!(!p.is_busy());
        assert!(p.recorder().is_complete());
        assert_eq!(p.driver().position(4), Some(117.0));
    }

    #[test]
    fn test_sample_count_and_duration() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);

        for (pan, tilt) in [(20.0, 10.0), (-40.0, 5.0), (80.0, 0.0), (1.0, -1.0)].iter() {
            let req = MotionRequest::target(
                EyeScope::Right,
                *pan,
                *tilt,
                None,
                None,
                ExecMode::Profiled,
            );
            let start = p.start_profile(&req).unwrap();
            let expected = (start.duration_s / 0.01).ceil() as usize + 1;

            match run_to_end(&mut p) {
                StepOutcome::Completed(s) => {
                    // Within one sample of ceil(T / dt) + 1
                    assert!((s.num_samples as i64 - expected as i64).abs() <= 1);
                    assert_eq!(s.num_samples, start.expected_samples);
                    assert!((s.duration_s - start.duration_s).abs() < 1e-12);
                    assert_eq!(s.final_rel_deg, (*pan, *tilt));
                }
                o => panic!("Expected completion, got {:?}", o),
            }

            // Return to zero for the next move
            p.zero().1.unwrap();
        }
    }

    #[test]
    fn test_busy_rejects_and_completes() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        let req = MotionRequest::target(
            EyeScope::Both,
            30.0,
            0.0,
            None,
            None,
            ExecMode::Profiled,
        );

        p.start_profile(&req).unwrap();
        p.step();

        assert_eq!(
            p.apply_immediate(&MotionRequest::zero()),
            Err(MotionError::Busy)
        );
        assert_eq!(p.start_profile(&req), Err(MotionError::Busy));

        assert!(matches!(run_to_end(&mut p), StepOutcome::Completed(_)));
        assert_eq!(p.coords().position(EyeId::Right).rel_deg(), (30.0, 0.0));
    }

    #[test]
    fn test_cancel_keeps_partial() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        let req = MotionRequest::target(
            EyeScope::Left,
            40.0,
            0.0,
            None,
            None,
            ExecMode::Profiled,
        );

        p.start_profile(&req).unwrap();
        for _ in 0..5 {
            p.step();
        }

        let (cancelled, applied) = p.zero();
        let applied = applied.unwrap();
        let cancelled = cancelled.unwrap();

        assert_eq!(cancelled.num_samples, 5);
        assert!(cancelled.final_rel_deg.0 > 0.0 && cancelled.final_rel_deg.0 < 40.0);
        assert_eq!(p.recorder().samples().len(), 5);
        assert!(!p.recorder().is_complete());
        assert_eq!(applied.rel(EyeId::Left), (0.0, 0.0));
        assert!(!p.is_busy());
    }

    #[test]
    fn test_failure_during_profile() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        let req = MotionRequest::target(
            EyeScope::Left,
            40.0,
            0.0,
            None,
            None,
            ExecMode::Profiled,
        );

        p.start_profile(&req).unwrap();
        for _ in 0..3 {
            p.step();
        }
        let last = p.coords().position(EyeId::Left).abs_deg();

        p.driver_mut().set_failing_channel(Some(4));
        match p.step() {
            Some(StepOutcome::Failed(MotionError::Driver(EyeId::Left, AxisId::Pan, 4, _), s)) => {
                assert_eq!(s.num_samples, 3);
            }
            o => panic!("Expected failure, got {:?}", o),
        }

        assert_eq!(p.coords().position(EyeId::Left).abs_deg(), last);
        assert!(!p.is_busy());
    }

    #[test]
    fn test_cancel_summary_kept_on_driver_failure() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        let req = MotionRequest::target(
            EyeScope::Both,
            40.0,
            0.0,
            None,
            None,
            ExecMode::Profiled,
        );

        p.start_profile(&req).unwrap();
        for _ in 0..3 {
            p.step();
        }
        p.driver_mut().set_failing_channel(Some(7));

        let (cancelled, result) = p.zero();
        assert_eq!(cancelled.map(|s| s.num_samples), Some(3));
        assert!(matches!(result, Err(MotionError::Driver(EyeId::Right, AxisId::Tilt, 7, _))));
        assert!(!p.is_busy());

        p.driver_mut().set_failing_channel(None);
        p.start_profile(&req).unwrap();
        p.step();
        p.driver_mut().set_failing_channel(Some(7));

        let (cancelled, result) = p.disengage();
        assert_eq!(cancelled.map(|s| s.num_samples), Some(1));
        assert!(result.is_err());
        assert!(!p.is_engaged());
        assert!(!p.is_busy());
    }

    #[test]
    fn test_overlong_profile_rejected() {
        let mut p = planner([[90.0, 90.0], [90.0, 90.0]]);
        let req = MotionRequest::target(
            EyeScope::Both,
            40.0,
            0.0,
            Some(2000.0),
            Some(1e-300),
            ExecMode::Profiled,
        );

        assert!(matches!(
            p.start_profile(&req),
            Err(MotionError::Profile(ProfileError::TooLong(_)))
        ));
        assert!(!p.is_busy());
        assert_eq!(p.coords().position(EyeId::Left).rel_deg(), (0.0, 0.0));
    }

    #[test]
    fn test_expected_samples() {
        assert_eq!(expected_samples(0.0, 0.01), 1);
        assert_eq!(expected_samples(0.105, 0.01), 12);
        assert_eq!(expected_samples(0.2, 0.01), 21);
        assert_eq!(expected_samples(0.425, 0.01), 44);

        // Counts match the sampler's test for every duration on a fine grid
        for k in 0..2000 {
            let total = k as f64 * 0.0007;
            let looped = (0..).take_while(|n| (*n as f64) * 0.01 < total).count() + 1;
            assert_eq!(expected_samples(total, 0.01), looped, "total {}", total);
        }

        assert_eq!(expected_samples(std::f64::INFINITY, 0.01), 1);
        assert_eq!(expected_samples(1e301, 0.01), usize::MAX);
    }
}
