//! # Servo Controller Module
//!
//! This module provides a unified servo control interface which can abstract over different types
//! of servo driver boards. The motion planner is the only user of a [`ServoDriver`], and owns it.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the Adafruit PCA9685 16 channel servo driver board.
pub mod pca9685;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo driver boards.
pub trait ServoDriver {
    /// Command a channel to an absolute angle.
    ///
    /// ## Arguments
    /// - `channel` - The channel number on the board
    /// - `abs_deg` - The absolute angle in degrees. The caller is responsible for keeping it
    ///   within the limits of the axis.
    fn set_channel_position(&mut self, channel: u8, abs_deg: f64) -> Result<(), ServoError>;

    /// Switch the output of a channel on or off.
    ///
    /// A powered off servo holds no position. Powering a channel back on does not restore its
    /// last position, which must be sent again.
    fn set_channel_power(&mut self, channel: u8, enabled: bool) -> Result<(), ServoError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated servo board.
///
/// Keeps the last demand of every channel so that tests can inspect what would have been sent to
/// the hardware, and can be told to fail writes to a channel.
#[derive(Debug, Default)]
pub struct SimServos {
    positions: HashMap<u8, f64>,

    power: HashMap<u8, bool>,

    num_writes: usize,

    failing_channel: Option<u8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ServoError {
    #[error("An I2C error occured: {0}")]
    I2c(String),

    #[error("Channel {0} does not exist on the board")]
    InvalidChannel(u8),

    #[error("Channel {0} has no configuration")]
    UnconfiguredChannel(u8),

    #[error("Pulse width of {0} us cannot be generated")]
    InvalidPulse(f64),

    #[error("Simulated failure of channel {0}")]
    SimFailure(u8),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<D: ServoDriver + ?Sized> ServoDriver for Box<D> {
    fn set_channel_position(&mut self, channel: u8, abs_deg: f64) -> Result<(), ServoError> {
        (**self).set_channel_position(channel, abs_deg)
    }

    fn set_channel_power(&mut self, channel: u8, enabled: bool) -> Result<(), ServoError> {
        (**self).set_channel_power(channel, enabled)
    }
}

impl SimServos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write to `channel` fail, or stop failing if `None`.
    pub fn set_failing_channel(&mut self, channel: Option<u8>) {
        self.failing_channel = channel;
    }

    /// Last position sent to the channel.
    pub fn position(&self, channel: u8) -> Option<f64> {
        self.positions.get(&channel).copied()
    }

    /// Whether the channel is powered, `None` if its power has never been set.
    pub fn powered(&self, channel: u8) -> Option<bool> {
        self.power.get(&channel).copied()
    }

    /// Number of successful position writes.
    pub fn num_writes(&self) -> usize {
        self.num_writes
    }
}

impl ServoDriver for SimServos {
    fn set_channel_position(&mut self, channel: u8, abs_deg: f64) -> Result<(), ServoError> {
        if self.failing_channel == Some(channel) {
            return Err(ServoError::SimFailure(channel));
        }

        trace!("Sim servo {:>2} -> {:.2} deg", channel, abs_deg);

        self.positions.insert(channel, abs_deg);
        self.num_writes += 1;

        Ok(())
    }

    fn set_channel_power(&mut self, channel: u8, enabled: bool) -> Result<(), ServoError> {
        if self.failing_channel == Some(channel) {
            return Err(ServoError::SimFailure(channel));
        }

        self.power.insert(channel, enabled);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sim_servos() {
        let mut sim = SimServos::new();

        sim.set_channel_position(4, 100.0).unwrap();
        sim.set_channel_power(4, false).unwrap();
        assert_eq!(sim.position(4), Some(100.0));
        assert_eq!(sim.powered(4), Some(false));
        assert_eq!(sim.powered(5), None);

        sim.set_failing_channel(Some(5));
        assert_eq!(
            sim.set_channel_position(5, 10.0),
            Err(ServoError::SimFailure(5))
        );
        assert_eq!(sim.position(5), None);
        assert_eq!(sim.num_writes(), 1);

        // Boxed drivers forward to the inner driver
        let mut boxed: Box<dyn ServoDriver> = Box::new(SimServos::new());
        assert!(boxed.set_channel_position(0, 90.0).is_ok());
    }
}
