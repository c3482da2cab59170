//! # Command script interpreter module
//!
//! This module provides an interpreter for timed command scripts, allowing eye commands to be
//! executed at set times after the start of a session.
//!
//! A script contains one command per entry, in the form `<time_s>: <command>;`, for example:
//!
//! ```text
//! 0.5: engage;
//! 1.0: SAC 10 -5 X X;
//! 2.0: profile 20 10 2000 400;
//! ```
//!
//! Every command is parsed when the script is loaded, so a malformed script is rejected before
//! anything moves.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use regex::RegexBuilder;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Internal
use crate::session::get_elapsed_seconds;
use eye_if::cmd::{self, Command, ParseError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const SCRIPT_ENTRY_REGEX: &str = r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
struct ScriptedCmd {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    cmd: Command,
}

/// A script interpreter.
///
/// After initialising with the path to the script to run use `.get_pending_cmds` to acquire a
/// list of commands that need executing.
pub struct ScriptInterpreter {
    script_path: PathBuf,
    cmds: VecDeque<ScriptedCmd>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("Could not build the script regex: {0}")]
    RegexError(regex::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error("Script contains an invalid timestamp: {0}. Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script contains an invalid command at {0} s: {1}")]
    InvalidCmd(f64, ParseError),
}

/// Commands which are due for execution.
#[derive(Debug, PartialEq)]
pub enum PendingCmds {
    None,
    Some(Vec<Command>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {
    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path).map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_script(&script)?;
        interp.script_path = path;

        Ok(interp)
    }

    /// Create a new interpreter from the text of a script.
    pub fn from_script(script: &str) -> Result<Self, ScriptError> {
        let mut cmd_queue: VecDeque<ScriptedCmd> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::new(SCRIPT_ENTRY_REGEX)
            .multi_line(true)
            .build()
            .map_err(ScriptError::RegexError)?;

        for cap in re.captures_iter(script) {
            let time_str = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|_| ScriptError::InvalidTimestamp(time_str.to_string()))?;

            let payload = cap.get(3).map(|m| m.as_str()).unwrap_or("");
            let cmd =
                cmd::parse(payload).map_err(|e| ScriptError::InvalidCmd(exec_time_s, e))?;

            cmd_queue.push_back(ScriptedCmd { exec_time_s, cmd });
        }

        if cmd_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            script_path: PathBuf::new(),
            cmds: cmd_queue,
        })
    }

    /// Return the commands which are due at the current session time.
    pub fn get_pending_cmds(&mut self) -> PendingCmds {
        self.get_pending_cmds_at(get_elapsed_seconds())
    }

    /// Return the commands which are due at the given time, or `None` if no commands need
    /// executing yet.
    pub fn get_pending_cmds_at(&mut self, current_time_s: f64) -> PendingCmds {
        // If the queue is empty the script is over
        if self.cmds.is_empty() {
            return PendingCmds::EndOfScript;
        }

        let mut cmd_vec: Vec<Command> = vec![];

        // Pop commands off the queue until the head is in the future
        while let Some(head) = self.cmds.front() {
            if head.exec_time_s > current_time_s {
                break;
            }

            if let Some(c) = self.cmds.pop_front() {
                cmd_vec.push(c.cmd);
            }
        }

        if cmd_vec.is_empty() {
            PendingCmds::None
        } else {
            PendingCmds::Some(cmd_vec)
        }
    }

    /// Get the number of commands remaining in the script
    pub fn get_num_cmds(&self) -> usize {
        self.cmds.len()
    }

    /// Get the length of the script in seconds
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }

    /// Path the script was loaded from, empty if loaded from a string.
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = "\
        0.0: engage;\n\
        0.5: SAC 10 -5 X X;\n\
        0.5: position;\n\
        2: profile 20 10 2000 400;\n";

    #[test]
    fn test_load_and_pending() {
        let mut interp = ScriptInterpreter::from_script(SCRIPT).unwrap();
        assert_eq!(interp.get_num_cmds(), 4);
        assert_eq!(interp.get_duration(), 2.0);

        assert_eq!(
            interp.get_pending_cmds_at(0.1),
            PendingCmds::Some(vec![Command::Engage])
        );
        assert_eq!(interp.get_pending_cmds_at(0.2), PendingCmds::None);

        match interp.get_pending_cmds_at(1.0) {
            PendingCmds::Some(cmds) => {
                assert_eq!(cmds.len(), 2);
                assert_eq!(cmds[1], Command::Position);
            }
            p => panic!("Expected two commands, got {:?}", p),
        }

        assert!(matches!(
            interp.get_pending_cmds_at(5.0),
            PendingCmds::Some(_)
        ));
        assert_eq!(interp.get_pending_cmds_at(6.0), PendingCmds::EndOfScript);
    }

    #[test]
    fn test_invalid_scripts() {
        assert!(matches!(
            ScriptInterpreter::from_script("no entries here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_script("1.0: SAC 1 2 3;"),
            Err(ScriptError::InvalidCmd(t, _)) if t == 1.0
        ));
        assert!(matches!(
            ScriptInterpreter::new("/definitely/not/a/script.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
