//! # Eye Executable Parameters
//!
//! This module provides the parameters of the eye executable, loaded from `eye_exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use eye_if::eqpt::{AxisId, EyeId, EyeScope, NUM_AXES, NUM_EYES};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EyeExecParams {
    /// Zero reference of each eye as `[pan, tilt]`, indexed by eye (left, right).
    ///
    /// Units: degrees (absolute)
    pub zero_deg: [[f64; NUM_AXES]; NUM_EYES],

    /// Absolute limits of each axis as `[min, max]`, indexed by axis (pan, tilt).
    ///
    /// Units: degrees
    pub axis_limits_deg: [[f64; 2]; NUM_AXES],

    /// Acceleration used by moves which don't override it.
    ///
    /// Units: degrees/second^2
    pub default_accel_degss: f64,

    /// Maximum velocity used by moves which don't override it.
    ///
    /// Units: degrees/second
    pub default_max_vel_degs: f64,

    /// Period between telemetry samples of a profiled move, and the target period of the main
    /// loop.
    ///
    /// Units: seconds
    pub sample_period_s: f64,

    /// Distance of the gaze presets from the zero point at startup.
    ///
    /// Units: degrees
    pub default_distance_deg: f64,

    /// Distances the `range` command cycles through.
    ///
    /// Units: degrees
    pub distance_options_deg: Vec<f64>,

    /// Scope of the eyes at startup
    pub default_scope: EyeScope,

    /// Fraction of samples ignored at each end of a move when averaging acceleration.
    pub avg_accel_trim_fraction: f64,

    /// How clamped targets are reported
    pub clamp_policy: ClampPolicy,

    /// Which servo driver to use
    pub driver: DriverKind,

    /// I2C address of the PCA9685 board
    pub i2c_address: u8,

    /// PWM frequency of the servo signals.
    ///
    /// Units: Hertz
    pub pwm_freq_hz: f64,

    /// Change in pulse width per degree of servo rotation.
    ///
    /// Units: microseconds/degree
    pub us_per_degree: f64,

    /// Servo channel assignments
    pub channels: Vec<ChannelConfig>,

    /// Endpoint of the remote pointer interface, for example `"tcp://*:5030"`. No remote
    /// interface is started if not set.
    pub remote_endpoint: Option<String>,

    /// Name of the console history file, relative to the software root.
    pub history_file: String,

    /// GPIO pins of the control panel buttons. The panel is disabled if not set.
    pub buttons: Option<ButtonPins>,
}

/// Servo channel assignment of a single axis.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ChannelConfig {
    pub eye: EyeId,

    pub axis: AxisId,

    /// Channel number on the driver board
    pub channel: u8,

    /// Pulse width commanding an absolute angle of 90 degrees.
    ///
    /// Units: microseconds
    pub centre_pulse_us: f64,

    /// +1 if increasing pulse width increases the angle, -1 otherwise
    pub direction: f64,
}

/// BCM pin numbers of the control panel buttons.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ButtonPins {
    /// Cycles the menu section, or selects when held
    pub cycle: u8,

    /// Cycles the option within a section
    pub option: u8,

    /// Selects the current option
    pub select: u8,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reporting of clamped targets.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClampPolicy {
    /// Report the applied value and append a `CLAMPED` token to the response
    Report,

    /// Report the applied value only
    Silent,
}

/// Servo driver selection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// Simulated servos, positions are only logged
    Sim,

    /// Adafruit PCA9685 16 channel board on the I2C bus
    Pca9685,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EyeExecParams {
    /// Get the channel assigned to the given axis, if there is one.
    pub fn channel(&self, eye: EyeId, axis: AxisId) -> Option<&ChannelConfig> {
        self.channels
            .iter()
            .find(|c| c.eye == eye && c.axis == axis)
    }
}

impl Default for EyeExecParams {
    fn default() -> Self {
        let channel = |eye, axis, channel, centre_pulse_us, direction| ChannelConfig {
            eye,
            axis,
            channel,
            centre_pulse_us,
            direction,
        };

        Self {
            zero_deg: [[90.0, 90.0], [90.0, 90.0]],
            axis_limits_deg: [[0.0, 180.0], [0.0, 180.0]],
            default_accel_degss: 2000.0,
            default_max_vel_degs: 400.0,
            sample_period_s: 0.01,
            default_distance_deg: 10.0,
            distance_options_deg: vec![1.0, 5.0, 10.0, 20.0, 40.0],
            default_scope: EyeScope::Both,
            avg_accel_trim_fraction: 0.1,
            clamp_policy: ClampPolicy::Report,
            driver: DriverKind::Sim,
            i2c_address: 0x40,
            pwm_freq_hz: 50.0,
            us_per_degree: 11.0,
            channels: vec![
                channel(EyeId::Left, AxisId::Pan, 4, 1490.0, -1.0),
                channel(EyeId::Left, AxisId::Tilt, 5, 1460.0, 1.0),
                channel(EyeId::Right, AxisId::Pan, 6, 1560.0, -1.0),
                channel(EyeId::Right, AxisId::Tilt, 7, 1460.0, -1.0),
            ],
            remote_endpoint: None,
            history_file: "data/eye_history.txt".into(),
            buttons: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_file_deserialises() {
        let params: EyeExecParams = util::params::load_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/eye_exec.toml"
        ))
        .unwrap();

        assert_eq!(params.clamp_policy, ClampPolicy::Report);
        assert_eq!(params.channels.len(), 4);
        assert_eq!(
            params.channel(EyeId::Right, AxisId::Pan).map(|c| c.channel),
            Some(6)
        );
        assert_eq!(params.default_accel_degss, 2000.0);
    }
}
