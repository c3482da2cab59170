//! # Control Panel
//!
//! The on-device menu driven by three buttons. The menu has three sections:
//!
//! - `9-pt`: the nine gaze presets, selecting one moves the eyes in scope to it,
//! - `Zero`: returns both eyes to their zero reference,
//! - `Settings`: cycles the eye scope or the preset distance.
//!
//! Buttons:
//!
//! - `Cycle`: a short press moves to the next section, holding it for [`HOLD_SELECT_S`] selects the
//!   current option,
//! - `Option`: moves to the next option within the section,
//! - `Select`: selects the current option.
//!
//! The panel only produces [`Command`]s, which are dispatched like those from any other source.
//! Rendering the menu is left to whatever display is attached.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::{Deserialize, Serialize};

use eye_if::cmd::{Command, Preset};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Time the cycle button must be held for to select.
///
/// Units: seconds
pub const HOLD_SELECT_S: f64 = 0.6;

/// Preset highlighted when the panel starts.
const DEFAULT_PRESET: Preset = Preset::Centre;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A change in the state of a button.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub button: Button,

    /// True if the button was pressed, false if released
    pub pressed: bool,

    /// Time of the event.
    ///
    /// Units: seconds (session elapsed)
    pub time_s: f64,
}

/// State of the menu.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    section: MenuSection,

    /// Highlighted preset in the 9-pt section
    preset: Preset,

    /// Highlighted option in the settings section
    setting: Setting,

    /// Time the cycle button was pressed, if it is currently held
    cycle_pressed_at: Option<f64>,

    /// Set once a held cycle button has selected, so the release does nothing
    hold_fired: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Button {
    Cycle,
    Option,
    Select,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSection {
    NinePoint,
    Zero,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Eye,
    Range,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MenuSection {
    pub fn next(self) -> Self {
        match self {
            MenuSection::NinePoint => MenuSection::Zero,
            MenuSection::Zero => MenuSection::Settings,
            MenuSection::Settings => MenuSection::NinePoint,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuSection::NinePoint => "9-pt",
            MenuSection::Zero => "Zero",
            MenuSection::Settings => "Settings",
        }
    }
}

impl Setting {
    pub fn next(self) -> Self {
        match self {
            Setting::Eye => Setting::Range,
            Setting::Range => Setting::Eye,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Setting::Eye => "Eye",
            Setting::Range => "Range",
        }
    }
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            section: MenuSection::NinePoint,
            preset: DEFAULT_PRESET,
            setting: Setting::Eye,
            cycle_pressed_at: None,
            hold_fired: false,
        }
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self) -> MenuSection {
        self.section
    }

    /// Label of the highlighted option, `None` for sections without options.
    pub fn option_label(&self) -> Option<&'static str> {
        match self.section {
            MenuSection::NinePoint => Some(self.preset.tag()),
            MenuSection::Zero => None,
            MenuSection::Settings => Some(self.setting.label()),
        }
    }

    /// Handle a button event, returning the command it selects, if any.
    pub fn handle(&mut self, event: &ButtonEvent) -> Option<Command> {
        match (event.button, event.pressed) {
            (Button::Cycle, true) => {
                self.cycle_pressed_at = Some(event.time_s);
                self.hold_fired = false;
                None
            }
            (Button::Cycle, false) => {
                let pressed_at = self.cycle_pressed_at.take()?;

                if self.hold_fired {
                    self.hold_fired = false;
                    None
                } else if event.time_s - pressed_at >= HOLD_SELECT_S {
                    self.select()
                } else {
                    self.section = self.section.next();
                    debug!("Control panel section: {}", self.section.label());
                    None
                }
            }
            (Button::Option, true) => {
                self.next_option();
                None
            }
            (Button::Select, true) => self.select(),
            (Button::Option, false) | (Button::Select, false) => None,
        }
    }

    /// Check whether a held cycle button has reached the hold time.
    ///
    /// Lets a hold select while the button is still down rather than waiting for the release.
    pub fn update(&mut self, time_s: f64) -> Option<Command> {
        match self.cycle_pressed_at {
            Some(t) if !self.hold_fired && time_s - t >= HOLD_SELECT_S => {
                self.hold_fired = true;
                self.select()
            }
            _ => None,
        }
    }

    fn next_option(&mut self) {
        match self.section {
            MenuSection::NinePoint => {
                let idx = Preset::ALL
                    .iter()
                    .position(|p| *p == self.preset)
                    .unwrap_or(0);
                self.preset = Preset::ALL[(idx + 1) % Preset::ALL.len()];
            }
            MenuSection::Zero => (),
            MenuSection::Settings => self.setting = self.setting.next(),
        }

        if let Some(l) = self.option_label() {
            debug!("Control panel option: {}", l);
        }
    }

    fn select(&self) -> Option<Command> {
        let cmd = match self.section {
            MenuSection::NinePoint => Command::Preset(self.preset),
            MenuSection::Zero => Command::Zero,
            MenuSection::Settings => match self.setting {
                Setting::Eye => Command::Eye(None),
                Setting::Range => Command::Range(None),
            },
        };

        debug!("Control panel selected {}", cmd.name());

        Some(cmd)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn press(panel: &mut ControlPanel, button: Button, t: f64, held: f64) -> Option<Command> {
        let down = panel.handle(&ButtonEvent {
            button,
            pressed: true,
            time_s: t,
        });
        let up = panel.handle(&ButtonEvent {
            button,
            pressed: false,
            time_s: t + held,
        });
        down.or(up)
    }

    #[test]
    fn test_default_selects_centre() {
        let mut panel = ControlPanel::new();
        assert_eq!(
            press(&mut panel, Button::Select, 0.0, 0.1),
            Some(Command::Preset(Preset::Centre))
        );
    }

    #[test]
    fn test_option_cycles_presets() {
        let mut panel = ControlPanel::new();

        press(&mut panel, Button::Option, 0.0, 0.1);
        assert_eq!(panel.option_label(), Some("R"));

        for _ in 0..4 {
            press(&mut panel, Button::Option, 0.0, 0.1);
        }
        // Wraps around to the start of the grid
        assert_eq!(panel.option_label(), Some("UL"));
    }

    #[test]
    fn test_cycle_sections() {
        let mut panel = ControlPanel::new();

        assert_eq!(press(&mut panel, Button::Cycle, 0.0, 0.2), None);
        assert_eq!(panel.section(), MenuSection::Zero);
        assert_eq!(press(&mut panel, Button::Select, 1.0, 0.1), Some(Command::Zero));

        press(&mut panel, Button::Cycle, 2.0, 0.2);
        assert_eq!(panel.section(), MenuSection::Settings);
        assert_eq!(
            press(&mut panel, Button::Select, 3.0, 0.1),
            Some(Command::Eye(None))
        );

        press(&mut panel, Button::Option, 4.0, 0.1);
        assert_eq!(
            press(&mut panel, Button::Select, 5.0, 0.1),
            Some(Command::Range(None))
        );

        press(&mut panel, Button::Cycle, 6.0, 0.2);
        assert_eq!(panel.section(), MenuSection::NinePoint);
    }

    #[test]
    fn test_hold_cycle_selects() {
        let mut panel = ControlPanel::new();

        // Hold judged on release
        assert_eq!(
            press(&mut panel, Button::Cycle, 0.0, 0.7),
            Some(Command::Preset(Preset::Centre))
        );
        assert_eq!(panel.section(), MenuSection::NinePoint);

        // Hold judged while still down, the release is then ignored
        panel.handle(&ButtonEvent {
            button: Button::Cycle,
            pressed: true,
            time_s: 1.0,
        });
        assert_eq!(panel.update(1.3), None);
        assert_eq!(panel.update(1.61), Some(Command::Preset(Preset::Centre)));
        assert_eq!(panel.update(1.9), None);
        assert_eq!(
            panel.handle(&ButtonEvent {
                button: Button::Cycle,
                pressed: false,
                time_s: 2.0,
            }),
            None
        );
        assert_eq!(panel.section(), MenuSection::NinePoint);
    }
}
