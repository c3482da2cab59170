//! # Input Sources
//!
//! Everything that can issue commands to the controller is an [`InputSource`]. Sources are polled
//! by the session controller once per cycle and must never block; sources which read from a
//! blocking device do so in a producer thread feeding a channel.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod console;
pub mod panel;
pub mod remote;
pub mod script;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

use eye_if::{
    cmd::{Command, Response},
    net::{zmq, MonitoredSocketError},
};

pub use console::ConsoleInput;
pub use panel::PanelInput;
pub use remote::RemoteInput;
pub use script::ScriptInput;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of commands.
pub trait InputSource {
    /// Name of the source, used in logs.
    fn name(&self) -> &str;

    /// Get the next request from the source without blocking, or `None` if nothing is waiting.
    fn poll(&mut self) -> Result<Option<Request>, InputError>;

    /// Send the response to the source's last request.
    fn respond(&mut self, response: &Response) -> Result<(), InputError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A request from an input source.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// A command line which still needs parsing
    Line(String),

    /// A command which is already parsed
    Cmd(Command),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("The source has closed")]
    Closed,

    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not receive a request: {0}")]
    RecvError(zmq::Error),

    #[error("Could not send the response: {0}")]
    SendError(zmq::Error),

    #[error("Console error: {0}")]
    ConsoleError(String),

    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    GpioError(rppal::gpio::Error),
}
