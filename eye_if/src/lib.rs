//! # Eye interface crate.
//!
//! Provides the interfaces shared by everything that talks to the eye controller: identifiers for
//! the eyes and their axes, the textual command grammar and its response lines, and networking.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command grammar, parser and response lines
pub mod cmd;

/// Identifiers for the equipment (eyes, axes, scopes)
pub mod eqpt;

/// Network module
pub mod net;
