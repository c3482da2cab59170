//! Response lines sent back to the issuer of a command.
//!
//! Every completed command produces exactly one line, starting with `CMD OK` or `CMD ERR`, so that
//! hosts can split on the tag deterministically.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::fmt;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Prefix of every response line.
pub const RESPONSE_PREFIX: &str = "CMD";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A response to a single command.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The command was applied.
    Ok {
        /// Name of the command, for example `SAC`
        cmd: String,

        /// Applied values, already formatted
        values: Vec<String>,
    },

    /// The command was rejected or failed.
    Err {
        /// Human readable reason
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Response {
    /// Build an `OK` response.
    pub fn ok<S: Into<String>>(cmd: S, values: Vec<String>) -> Self {
        Response::Ok {
            cmd: cmd.into(),
            values,
        }
    }

    /// Build an `ERR` response.
    pub fn err<S: Into<String>>(reason: S) -> Self {
        Response::Err {
            reason: reason.into(),
        }
    }

    /// Returns true for `OK` responses.
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }

    /// Parse a response line, as a host would.
    ///
    /// Returns `None` if the line is not a response line.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();

        if tokens.next()? != RESPONSE_PREFIX {
            return None;
        }

        match tokens.next()? {
            "OK" => Some(Response::Ok {
                cmd: tokens.next()?.to_string(),
                values: tokens.map(String::from).collect(),
            }),
            "ERR" => Some(Response::Err {
                reason: tokens.collect::<Vec<_>>().join(" "),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok { cmd, values } => {
                write!(f, "{} OK {}", RESPONSE_PREFIX, cmd)?;
                for v in values {
                    write!(f, " {}", v)?;
                }
                Ok(())
            }
            Response::Err { reason } => write!(f, "{} ERR {}", RESPONSE_PREFIX, reason),
        }
    }
}

/// Format an angle (or any other value) the way response lines do.
pub fn fmt_value(value: f64) -> String {
    format!("{:.1}", value)
}
