//! # Equipment Identifiers
//!
//! This module defines the identifiers used to address the eyes and their axes, both in commands
//! and in parameter files.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of eyes on the head.
pub const NUM_EYES: usize = 2;

/// Number of axes on each eye.
pub const NUM_AXES: usize = 2;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// IDs of the eyes.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum EyeId {
    Left,
    Right,
}

/// IDs of the axes on each eye.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum AxisId {
    /// Horizontal axis, positive is right
    Pan,
    /// Vertical axis, positive is up
    Tilt,
}

/// The set of eyes a command applies to.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum EyeScope {
    Left,
    Right,
    Both,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EyeId {
    /// All eyes, in index order.
    pub const ALL: [EyeId; NUM_EYES] = [EyeId::Left, EyeId::Right];

    /// Index of the eye into per-eye arrays.
    pub fn index(self) -> usize {
        match self {
            EyeId::Left => 0,
            EyeId::Right => 1,
        }
    }

    /// Single letter tag used in response lines.
    pub fn tag(self) -> &'static str {
        match self {
            EyeId::Left => "L",
            EyeId::Right => "R",
        }
    }
}

impl AxisId {
    /// All axes, in index order.
    pub const ALL: [AxisId; NUM_AXES] = [AxisId::Pan, AxisId::Tilt];

    /// Index of the axis into per-axis arrays.
    pub fn index(self) -> usize {
        match self {
            AxisId::Pan => 0,
            AxisId::Tilt => 1,
        }
    }
}

impl EyeScope {
    /// The eyes covered by this scope.
    pub fn eyes(self) -> &'static [EyeId] {
        match self {
            EyeScope::Left => &[EyeId::Left],
            EyeScope::Right => &[EyeId::Right],
            EyeScope::Both => &EyeId::ALL,
        }
    }

    /// Returns true if the scope covers the given eye.
    pub fn contains(self, eye: EyeId) -> bool {
        self.eyes().contains(&eye)
    }

    /// The eye whose state is reported for commands which only carry a single pan/tilt pair.
    pub fn reference_eye(self) -> EyeId {
        match self {
            EyeScope::Right => EyeId::Right,
            EyeScope::Left | EyeScope::Both => EyeId::Left,
        }
    }

    /// The next scope in the settings cycle (L -> R -> B -> L).
    pub fn next(self) -> Self {
        match self {
            EyeScope::Left => EyeScope::Right,
            EyeScope::Right => EyeScope::Both,
            EyeScope::Both => EyeScope::Left,
        }
    }

    /// Parse a scope from its single letter tag, case-insensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "L" => Some(EyeScope::Left),
            "R" => Some(EyeScope::Right),
            "B" => Some(EyeScope::Both),
            _ => None,
        }
    }

    /// Single letter tag used in response lines.
    pub fn tag(self) -> &'static str {
        match self {
            EyeScope::Left => "L",
            EyeScope::Right => "R",
            EyeScope::Both => "B",
        }
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisId::Pan => write!(f, "pan"),
            AxisId::Tilt => write!(f, "tilt"),
        }
    }
}

impl fmt::Display for EyeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EyeId::Left => write!(f, "left"),
            EyeId::Right => write!(f, "right"),
        }
    }
}
