//! Control panel input
//!
//! Feeds [`ButtonEvent`]s into the [`ControlPanel`] menu and issues the commands it selects. On
//! Raspberry Pi builds the events come from GPIO input pins read by [`spawn_gpio_buttons`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

use super::{InputError, InputSource, Request};
use crate::controls::{ButtonEvent, ControlPanel};
use eye_if::cmd::{Command, Response};
use util::session::get_elapsed_seconds;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Control panel input source.
pub struct PanelInput {
    panel: ControlPanel,

    events: Receiver<ButtonEvent>,

    /// Commands selected but not yet issued
    selected: VecDeque<Command>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PanelInput {
    pub fn new(events: Receiver<ButtonEvent>) -> Self {
        Self {
            panel: ControlPanel::new(),
            events,
            selected: VecDeque::new(),
        }
    }

    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    /// Process the waiting button events and return the next selected command.
    pub fn poll_at(&mut self, time_s: f64) -> Result<Option<Request>, InputError> {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if let Some(cmd) = self.panel.handle(&event) {
                        self.selected.push_back(cmd);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.selected.is_empty() {
                        return Err(InputError::Closed);
                    }
                    break;
                }
            }
        }

        if let Some(cmd) = self.panel.update(time_s) {
            self.selected.push_back(cmd);
        }

        Ok(self.selected.pop_front().map(Request::Cmd))
    }
}

impl InputSource for PanelInput {
    fn name(&self) -> &str {
        "panel"
    }

    fn poll(&mut self) -> Result<Option<Request>, InputError> {
        self.poll_at(get_elapsed_seconds())
    }

    fn respond(&mut self, response: &Response) -> Result<(), InputError> {
        info!(
            "[panel: {}] {}",
            self.panel.section().label(),
            response
        );
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Start a thread polling the button GPIO pins, sending an event on every change of state.
///
/// Buttons pull their pin low when pressed.
#[cfg(feature = "rpi")]
pub fn spawn_gpio_buttons(
    pins: &crate::params::ButtonPins,
) -> Result<Receiver<ButtonEvent>, InputError> {
    use crate::controls::Button;
    use rppal::gpio::Gpio;
    use std::{sync::mpsc::channel, thread, time::Duration};

    const POLL_PERIOD: Duration = Duration::from_millis(5);

    let gpio = Gpio::new().map_err(InputError::GpioError)?;

    let mut buttons = Vec::new();
    for (button, pin) in [
        (Button::Cycle, pins.cycle),
        (Button::Option, pins.option),
        (Button::Select, pins.select),
    ]
    .iter()
    {
        let input = gpio
            .get(*pin)
            .map_err(InputError::GpioError)?
            .into_input_pullup();
        buttons.push((*button, input, false));
    }

    let (tx, rx) = channel();

    thread::spawn(move || loop {
        for (button, input, was_pressed) in buttons.iter_mut() {
            let pressed = input.is_low();

            if pressed != *was_pressed {
                *was_pressed = pressed;

                let event = ButtonEvent {
                    button: *button,
                    pressed,
                    time_s: get_elapsed_seconds(),
                };

                if tx.send(event).is_err() {
                    return;
                }
            }
        }

        thread::sleep(POLL_PERIOD);
    });

    info!(
        "Control panel buttons on GPIO {}, {}, {}",
        pins.cycle, pins.option, pins.select
    );

    Ok(rx)
}
