//! # Command module
//!
//! This module provides the textual command grammar of the eye controller. Every input source (the
//! console, scripts, the remote pointer interface and the on-device controls) ends up producing a
//! [`Command`], either by parsing a line with [`parse`] or by building one directly.
//!
//! Tokens are separated by whitespace and are case-insensitive.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod response;

pub use response::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::str::FromStr;
use thiserror::Error;

use crate::eqpt::EyeScope;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tokens which mark a saccade field as unchanged.
pub const UNCHANGED_SENTINELS: [&str; 6] = ["X", "H", "HOLD", "SKIP", "KEEP", "NC"];

/// Summary of the available commands, sent in response to `help`.
pub const HELP_TEXT: &str = "UL|UC|UR|L|C|R|LL|LC|LR, SAC <lp> <lt> <rp> <rt>, \
    saccade <x> <y> [accel] [velocity], profile <x> <y> [accel] [velocity], save [filename], \
    stats, position, limits, zero, engage, disengage, eye [L|R|B], range [deg], help, quit|exit";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A two-axis target with optional motion overrides, used by `saccade` and `profile`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetCmd {
    /// Relative pan target.
    ///
    /// Units: degrees
    pub pan_deg: f64,

    /// Relative tilt target.
    ///
    /// Units: degrees
    pub tilt_deg: f64,

    /// Acceleration override.
    ///
    /// Units: degrees/second^2
    pub accel_degss: Option<f64>,

    /// Maximum velocity override.
    ///
    /// Units: degrees/second
    pub max_vel_degs: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Move the eyes in scope to one of the nine gaze presets.
    Preset(Preset),

    /// Move both eyes to the given relative angles, in the order left pan, left tilt, right pan,
    /// right tilt.
    Sac([AxisField; 4]),

    /// Immediate move of the eyes in scope.
    Saccade(TargetCmd),

    /// Profiled move of the eyes in scope, recording telemetry.
    Profile(TargetCmd),

    /// Export the most recent telemetry, optionally to the given file name.
    Save(Option<String>),

    /// Report analytics of the most recent telemetry.
    Stats,

    Position,
    Limits,
    Zero,
    Engage,
    Disengage,
    Help,
    Quit,

    /// Set the eye scope, or cycle to the next scope if `None`.
    Eye(Option<EyeScope>),

    /// Set the preset distance in degrees, or cycle to the next distance if `None`.
    Range(Option<f64>),
}

/// One of the nine gaze presets, forming a 3x3 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    UpperLeft,
    UpperCentre,
    UpperRight,
    Left,
    Centre,
    Right,
    LowerLeft,
    LowerCentre,
    LowerRight,
}

/// A single axis field of a `SAC` command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisField {
    /// Move the axis to this relative angle in degrees.
    Value(f64),

    /// Leave the axis where it is.
    Unchanged,
}

/// Errors which can occur while parsing a command line.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("{cmd} needs {expected}, found {found}")]
    WrongTokenCount {
        cmd: &'static str,
        expected: &'static str,
        found: usize,
    },

    #[error("{cmd} invalid angle: {token}")]
    InvalidAngle { cmd: &'static str, token: String },

    #[error("{cmd} invalid {what}: {token}")]
    InvalidArgument {
        cmd: &'static str,
        what: &'static str,
        token: String,
    },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse a command line.
pub fn parse(line: &str) -> Result<Command, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let (keyword, args) = match tokens.split_first() {
        Some(s) => s,
        None => return Err(ParseError::Empty),
    };

    let key = keyword.to_ascii_uppercase();

    // Presets are a single token
    if let Some(preset) = Preset::from_tag(&key) {
        return match args.len() {
            0 => Ok(Command::Preset(preset)),
            n => Err(ParseError::WrongTokenCount {
                cmd: "9PT",
                expected: "no arguments",
                found: n,
            }),
        };
    }

    match key.as_str() {
        "SAC" => parse_sac(args),
        "SACCADE" => parse_target("SACCADE", args).map(Command::Saccade),
        "PROFILE" => parse_target("PROFILE", args).map(Command::Profile),
        "SAVE" => match args {
            [] => Ok(Command::Save(None)),
            [name] => Ok(Command::Save(Some(name.to_string()))),
            _ => Err(ParseError::WrongTokenCount {
                cmd: "SAVE",
                expected: "at most 1 file name",
                found: args.len(),
            }),
        },
        "STATS" => no_args("STATS", args, Command::Stats),
        "POSITION" => no_args("POSITION", args, Command::Position),
        "LIMITS" => no_args("LIMITS", args, Command::Limits),
        "ZERO" => no_args("ZERO", args, Command::Zero),
        "ENGAGE" => no_args("ENGAGE", args, Command::Engage),
        "DISENGAGE" => no_args("DISENGAGE", args, Command::Disengage),
        "HELP" => no_args("HELP", args, Command::Help),
        "QUIT" | "EXIT" => no_args("QUIT", args, Command::Quit),
        "EYE" => match args {
            [] => Ok(Command::Eye(None)),
            [tag] => match EyeScope::from_tag(tag) {
                Some(s) => Ok(Command::Eye(Some(s))),
                None => Err(ParseError::InvalidArgument {
                    cmd: "EYE",
                    what: "scope (expected L, R or B)",
                    token: tag.to_string(),
                }),
            },
            _ => Err(ParseError::WrongTokenCount {
                cmd: "EYE",
                expected: "at most 1 scope",
                found: args.len(),
            }),
        },
        "RANGE" => match args {
            [] => Ok(Command::Range(None)),
            [token] => parse_positive("RANGE", "distance", token).map(|d| Command::Range(Some(d))),
            _ => Err(ParseError::WrongTokenCount {
                cmd: "RANGE",
                expected: "at most 1 distance",
                found: args.len(),
            }),
        },
        _ => Err(ParseError::UnknownCommand(line.trim().to_string())),
    }
}

/// Parse a single `SAC` field, which is either a number or one of the unchanged sentinels.
pub fn parse_axis_field(token: &str) -> Result<AxisField, ParseError> {
    let normalised = token.trim().to_ascii_uppercase();

    if UNCHANGED_SENTINELS.contains(&normalised.as_str()) {
        return Ok(AxisField::Unchanged);
    }

    parse_finite(token)
        .map(AxisField::Value)
        .ok_or_else(|| ParseError::InvalidAngle {
            cmd: "SAC",
            token: token.to_string(),
        })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn parse_sac(args: &[&str]) -> Result<Command, ParseError> {
    if args.len() != 4 {
        return Err(ParseError::WrongTokenCount {
            cmd: "SAC",
            expected: "4 angles",
            found: args.len(),
        });
    }

    let mut fields = [AxisField::Unchanged; 4];
    for (field, token) in fields.iter_mut().zip(args.iter()) {
        *field = parse_axis_field(token)?;
    }

    Ok(Command::Sac(fields))
}

fn parse_target(cmd: &'static str, args: &[&str]) -> Result<TargetCmd, ParseError> {
    if args.len() < 2 || args.len() > 4 {
        return Err(ParseError::WrongTokenCount {
            cmd,
            expected: "<x> <y> [accel] [velocity]",
            found: args.len(),
        });
    }

    let angle = |token: &str| {
        parse_finite(token).ok_or_else(|| ParseError::InvalidAngle {
            cmd,
            token: token.to_string(),
        })
    };

    Ok(TargetCmd {
        pan_deg: angle(args[0])?,
        tilt_deg: angle(args[1])?,
        accel_degss: match args.get(2) {
            Some(t) => Some(parse_positive(cmd, "acceleration", t)?),
            None => None,
        },
        max_vel_degs: match args.get(3) {
            Some(t) => Some(parse_positive(cmd, "velocity", t)?),
            None => None,
        },
    })
}

fn parse_positive(cmd: &'static str, what: &'static str, token: &str) -> Result<f64, ParseError> {
    match parse_finite(token) {
        Some(v) if v > 0.0 => Ok(v),
        _ => Err(ParseError::InvalidArgument {
            cmd,
            what,
            token: token.to_string(),
        }),
    }
}

/// Rust happily parses `nan` and `inf`, neither of which is a usable angle.
fn parse_finite(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn no_args(cmd: &'static str, args: &[&str], command: Command) -> Result<Command, ParseError> {
    match args.len() {
        0 => Ok(command),
        n => Err(ParseError::WrongTokenCount {
            cmd,
            expected: "no arguments",
            found: n,
        }),
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl Command {
    /// Name of the command as it appears in response lines.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Preset(_) => "9PT",
            Command::Sac(_) => "SAC",
            Command::Saccade(_) => "SACCADE",
            Command::Profile(_) => "PROFILE",
            Command::Save(_) => "SAVE",
            Command::Stats => "STATS",
            Command::Position => "POSITION",
            Command::Limits => "LIMITS",
            Command::Zero => "ZERO",
            Command::Engage => "ENGAGE",
            Command::Disengage => "DISENGAGE",
            Command::Help => "HELP",
            Command::Quit => "QUIT",
            Command::Eye(_) => "EYE",
            Command::Range(_) => "RANGE",
        }
    }

    /// Returns true if the command requests a new motion, and so must be rejected while a profiled
    /// move is executing.
    ///
    /// `zero` is not included as it cancels the executing move instead.
    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            Command::Preset(_) | Command::Sac(_) | Command::Saccade(_) | Command::Profile(_)
        )
    }
}

impl Preset {
    /// All presets in grid order, row by row from the top.
    pub const ALL: [Preset; 9] = [
        Preset::UpperLeft,
        Preset::UpperCentre,
        Preset::UpperRight,
        Preset::Left,
        Preset::Centre,
        Preset::Right,
        Preset::LowerLeft,
        Preset::LowerCentre,
        Preset::LowerRight,
    ];

    /// Parse a preset from its tag, case-insensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let upper = tag.to_ascii_uppercase();
        Self::ALL.iter().copied().find(|p| p.tag() == upper)
    }

    /// The tag of the preset as used in commands.
    pub fn tag(self) -> &'static str {
        match self {
            Preset::UpperLeft => "UL",
            Preset::UpperCentre => "UC",
            Preset::UpperRight => "UR",
            Preset::Left => "L",
            Preset::Centre => "C",
            Preset::Right => "R",
            Preset::LowerLeft => "LL",
            Preset::LowerCentre => "LC",
            Preset::LowerRight => "LR",
        }
    }

    /// The unit direction of the preset as `(pan_sign, tilt_sign)`.
    pub fn direction(self) -> (f64, f64) {
        match self {
            Preset::UpperLeft => (-1.0, 1.0),
            Preset::UpperCentre => (0.0, 1.0),
            Preset::UpperRight => (1.0, 1.0),
            Preset::Left => (-1.0, 0.0),
            Preset::Centre => (0.0, 0.0),
            Preset::Right => (1.0, 0.0),
            Preset::LowerLeft => (-1.0, -1.0),
            Preset::LowerCentre => (0.0, -1.0),
            Preset::LowerRight => (1.0, -1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(parse("ul"), Ok(Command::Preset(Preset::UpperLeft)));
        assert_eq!(parse("  LC "), Ok(Command::Preset(Preset::LowerCentre)));
        assert_eq!(parse("L"), Ok(Command::Preset(Preset::Left)));
        assert_eq!(Preset::LowerRight.direction(), (1.0, -1.0));
        assert_eq!(Preset::Left.direction(), (-1.0, 0.0));

        for p in Preset::ALL.iter() {
            assert_eq!(Preset::from_tag(p.tag()), Some(*p));
        }

        assert!(matches!(
            parse("UL 10"),
            Err(ParseError::WrongTokenCount { cmd: "9PT", .. })
        ));
    }

    #[test]
    fn test_sac_sentinels() {
        assert_eq!(
            parse("SAC 10 -5 X nc"),
            Ok(Command::Sac([
                AxisField::Value(10.0),
                AxisField::Value(-5.0),
                AxisField::Unchanged,
                AxisField::Unchanged
            ]))
        );

        for s in ["x", "h", "Hold", "skip", "KEEP", "nC"].iter() {
            assert_eq!(parse_axis_field(s), Ok(AxisField::Unchanged));
        }
    }

    #[test]
    fn test_sac_errors() {
        let e = parse("SAC 1 2 3").unwrap_err();
        assert_eq!(e.to_string(), "SAC needs 4 angles, found 3");

        let e = parse("sac 1 2 3 four").unwrap_err();
        assert_eq!(e.to_string(), "SAC invalid angle: four");

        assert!(parse("SAC nan 0 0 0").is_err());
        assert!(parse("SAC inf 0 0 0").is_err());
    }

    #[test]
    fn test_targets() {
        assert_eq!(
            parse("saccade 20 10 2000 400"),
            Ok(Command::Saccade(TargetCmd {
                pan_deg: 20.0,
                tilt_deg: 10.0,
                accel_degss: Some(2000.0),
                max_vel_degs: Some(400.0)
            }))
        );
        assert_eq!(
            parse("PROFILE -3.5 2"),
            Ok(Command::Profile(TargetCmd {
                pan_deg: -3.5,
                tilt_deg: 2.0,
                accel_degss: None,
                max_vel_degs: None
            }))
        );

        assert!(parse("profile 1").is_err());
        assert!(parse("profile 1 2 0").is_err());
        assert!(parse("profile 1 2 100 -4").is_err());
        assert!(parse("profile 1 2 3 4 5").is_err());
    }

    #[test]
    fn test_session_cmds() {
        assert_eq!(parse("Position"), Ok(Command::Position));
        assert_eq!(parse("exit"), Ok(Command::Quit));
        assert_eq!(parse("quit"), Ok(Command::Quit));
        assert_eq!(parse("save"), Ok(Command::Save(None)));
        assert_eq!(
            parse("save Run1.csv"),
            Ok(Command::Save(Some("Run1.csv".into())))
        );
        assert_eq!(parse("eye r"), Ok(Command::Eye(Some(EyeScope::Right))));
        assert_eq!(parse("eye"), Ok(Command::Eye(None)));
        assert_eq!(parse("range 20"), Ok(Command::Range(Some(20.0))));
        assert!(parse("range -1").is_err());
        assert!(parse("eye Q").is_err());
        assert!(parse("zero now").is_err());
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(
            parse("blink twice"),
            Err(ParseError::UnknownCommand("blink twice".into()))
        );
    }

    #[test]
    fn test_motion_classification() {
        assert!(parse("C").unwrap().is_motion());
        assert!(parse("SAC x x x x").unwrap().is_motion());
        assert!(!parse("zero").unwrap().is_motion());
        assert!(!parse("position").unwrap().is_motion());
    }
}
