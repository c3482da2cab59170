//! [`ServoDriver`] implementation for the PCA9685 driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::{Write, WriteRead};
use log::debug;
use pwm_pca9685::{Channel, Pca9685};
use std::collections::HashMap;
use std::fmt::Debug;

use super::{ServoDriver, ServoError};
use crate::params::{ChannelConfig, EyeExecParams};
use util::maths::lin_map;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of counts in one PWM period.
const MAX_PWM: u16 = 4096;

/// Frequency of the board's internal oscillator.
///
/// Units: Hertz
const OSC_FREQ_HZ: f64 = 25_000_000.0;

/// Absolute angle at which a servo is given its centre pulse.
///
/// Units: degrees
const CENTRE_ANGLE_DEG: f64 = 90.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A PCA9685 board driving the eye servos.
pub struct Pca9685Servos<I2C> {
    pwm: Pca9685<I2C>,

    channels: HashMap<u8, ChannelConfig>,

    /// Units: microseconds
    period_us: f64,

    /// Units: microseconds/degree
    us_per_degree: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, E> Pca9685Servos<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    /// Initialise the board on the given bus, setting the PWM frequency from the parameters.
    pub fn new(i2c: I2C, params: &EyeExecParams) -> Result<Self, ServoError> {
        if params.pwm_freq_hz.is_nan() || params.pwm_freq_hz <= 0.0 {
            return Err(ServoError::InvalidPulse(params.pwm_freq_hz));
        }

        let mut pwm = Pca9685::new(i2c, params.i2c_address).map_err(map_err)?;

        let prescale = prescale(params.pwm_freq_hz);
        debug!(
            "PCA9685 at {:#04x}: {} Hz, prescale {}",
            params.i2c_address, params.pwm_freq_hz, prescale
        );

        pwm.set_prescale(prescale).map_err(map_err)?;
        pwm.enable().map_err(map_err)?;

        Ok(Self {
            pwm,
            channels: params.channels.iter().map(|c| (c.channel, *c)).collect(),
            period_us: 1e6 / params.pwm_freq_hz,
            us_per_degree: params.us_per_degree,
        })
    }

    /// Pulse width for the given absolute angle of a channel.
    ///
    /// Units: microseconds
    fn pulse_us(&self, channel: u8, abs_deg: f64) -> Result<f64, ServoError> {
        let cfg = self
            .channels
            .get(&channel)
            .ok_or(ServoError::UnconfiguredChannel(channel))?;

        Ok(pulse_us(cfg, self.us_per_degree, abs_deg))
    }
}

impl<I2C, E> ServoDriver for Pca9685Servos<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    E: Debug,
{
    fn set_channel_position(&mut self, channel: u8, abs_deg: f64) -> Result<(), ServoError> {
        let pulse_us = self.pulse_us(channel, abs_deg)?;

        // If the pulse doesn't fit in the period return an error
        if pulse_us < 0.0 || pulse_us >= self.period_us {
            return Err(ServoError::InvalidPulse(pulse_us));
        }

        let counts = lin_map((0.0, self.period_us), (0.0, MAX_PWM as f64), pulse_us).round() as u16;

        self.pwm
            .set_channel_on_off(to_channel(channel)?, 0, counts)
            .map_err(map_err)
    }

    fn set_channel_power(&mut self, channel: u8, enabled: bool) -> Result<(), ServoError> {
        let ch = to_channel(channel)?;

        match enabled {
            // The output restarts when the next position is written
            true => Ok(()),
            false => self.pwm.set_channel_full_off(ch).map_err(map_err),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Pulse width commanding an absolute angle on the given channel.
///
/// Units: microseconds
pub fn pulse_us(cfg: &ChannelConfig, us_per_degree: f64, abs_deg: f64) -> f64 {
    cfg.centre_pulse_us + cfg.direction * (abs_deg - CENTRE_ANGLE_DEG) * us_per_degree
}

/// Prescale register value for the given PWM frequency.
fn prescale(freq_hz: f64) -> u8 {
    // The register accepts values from 3 upwards
    let p = (OSC_FREQ_HZ / (MAX_PWM as f64 * freq_hz)).round() - 1.0;
    p.max(3.0).min(255.0) as u8
}

fn to_channel(channel: u8) -> Result<Channel, ServoError> {
    Ok(match channel {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        c => return Err(ServoError::InvalidChannel(c)),
    })
}

fn map_err<E: Debug>(e: pwm_pca9685::Error<E>) -> ServoError {
    match e {
        pwm_pca9685::Error::I2C(e) => ServoError::I2c(format!("{:?}", e)),
        _ => ServoError::I2c("invalid input data".into()),
    }
}
