//! Timed command script input
//!
//! Commands become due by session elapsed time. Once the script has run out, and every issued
//! command has been answered, a `quit` is issued. A profiled move is answered when it ends, so a
//! script finishing on a `profile` lets the move complete.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use std::collections::VecDeque;

use super::{InputError, InputSource, Request};
use eye_if::cmd::{Command, Response};
use util::{
    script_interpreter::{PendingCmds, ScriptInterpreter},
    session::get_elapsed_seconds,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Script input source.
pub struct ScriptInput {
    interp: ScriptInterpreter,

    /// Commands which are due but haven't been issued yet
    due: VecDeque<Command>,

    /// Time the script started, subtracted from the session time
    start_time_s: f64,

    /// Issued commands which haven't been answered yet
    awaiting: usize,

    quit_sent: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ScriptInput {
    /// Run the script with its time zero at the current session time.
    pub fn new(interp: ScriptInterpreter) -> Self {
        Self::starting_at(interp, get_elapsed_seconds())
    }

    pub fn starting_at(interp: ScriptInterpreter, start_time_s: f64) -> Self {
        Self {
            interp,
            due: VecDeque::new(),
            start_time_s,
            awaiting: 0,
            quit_sent: false,
        }
    }

    /// Get the next due command at the given session time.
    pub fn poll_at(&mut self, time_s: f64) -> Option<Request> {
        if self.due.is_empty() {
            match self.interp.get_pending_cmds_at(time_s - self.start_time_s) {
                PendingCmds::None => (),
                PendingCmds::Some(cmds) => self.due.extend(cmds),
                PendingCmds::EndOfScript => {
                    if !self.quit_sent && self.awaiting == 0 {
                        info!("End of script reached");
                        self.quit_sent = true;
                        return Some(Request::Cmd(Command::Quit));
                    }
                }
            }
        }

        let cmd = self.due.pop_front()?;
        self.awaiting += 1;
        Some(Request::Cmd(cmd))
    }
}

impl InputSource for ScriptInput {
    fn name(&self) -> &str {
        "script"
    }

    fn poll(&mut self) -> Result<Option<Request>, InputError> {
        Ok(self.poll_at(get_elapsed_seconds()))
    }

    fn respond(&mut self, response: &Response) -> Result<(), InputError> {
        self.awaiting = self.awaiting.saturating_sub(1);
        info!("[script] {}", response);
        Ok(())
    }
}
