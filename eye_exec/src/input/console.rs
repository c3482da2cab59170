//! Interactive console input
//!
//! Lines are read with `rustyline` in a producer thread, so the blocking read never holds up the
//! control loop. Responses are printed to stdout.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread;

use super::{InputError, InputSource, Request};
use eye_if::cmd::Response;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "eye $ ";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Console input source.
pub struct ConsoleInput {
    lines: Receiver<String>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConsoleInput {
    /// Start reading lines from the terminal, keeping the line history in `history_path`.
    pub fn new(history_path: PathBuf) -> Result<Self, InputError> {
        let (tx, rx) = channel();
        let (init_tx, init_rx) = channel();

        // The editor lives on the reader thread, which reports back whether it could be created
        thread::spawn(move || match DefaultEditor::new() {
            Ok(editor) => {
                init_tx.send(Ok(())).ok();
                read_lines(editor, history_path, tx)
            }
            Err(e) => {
                init_tx.send(Err(e.to_string())).ok();
            }
        });

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Self { lines: rx }),
            Ok(Err(e)) => Err(InputError::ConsoleError(e)),
            Err(_) => Err(InputError::Closed),
        }
    }

    /// Create a console fed from an existing channel instead of the terminal.
    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self { lines }
    }
}

impl InputSource for ConsoleInput {
    fn name(&self) -> &str {
        "console"
    }

    fn poll(&mut self) -> Result<Option<Request>, InputError> {
        match self.lines.try_recv() {
            Ok(line) => Ok(Some(Request::Line(line))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(InputError::Closed),
        }
    }

    fn respond(&mut self, response: &Response) -> Result<(), InputError> {
        println!("{}", response);
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn read_lines(mut editor: DefaultEditor, history_path: PathBuf, tx: Sender<String>) {
    if editor.load_history(&history_path).is_err() {
        info!("No console history found at {:?}", history_path);
    }

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                editor.add_history_entry(line.as_str()).ok();
                if let Err(e) = editor.save_history(&history_path) {
                    warn!("Could not save console history: {}", e);
                }

                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                tx.send("quit".into()).ok();
                break;
            }
            Err(e) => {
                warn!("Console read error: {}", e);
                tx.send("quit".into()).ok();
                break;
            }
        }
    }
}
