//! # Eye library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the eye crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Control panel - the on-device button menu
pub mod controls;

/// Coordinate model - absolute/relative positions and axis limits
pub mod coord;

/// Input sources - console, scripts, the remote interface and the control panel
pub mod input;

/// Motion planner - executes immediate and profiled moves, owns the servo driver
pub mod motion;

/// Parameters of the eye executable
pub mod params;

/// Servo control - drivers for the servo boards
pub mod servo_ctrl;

/// Session controller - dispatches commands from every input source
pub mod session_ctrl;

/// Telemetry recorder - samples of profiled moves and their analytics
pub mod telemetry;
