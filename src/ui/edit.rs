use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::bridge::TextEntrySurface;

/// Text entry for the phone number. The controller owns the canonical text;
/// the field only holds what is currently on screen.
#[derive(Default)]
pub struct PhoneField {
    pub focused: bool,
    input: Input,
}

impl PhoneField {
    pub fn new(current: &str) -> Self {
        Self {
            focused: false,
            input: Input::new(current.to_string()),
        }
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }

    pub fn visual_cursor(&self) -> usize {
        self.input.visual_cursor()
    }

    /// Replace the shown text with the controller's committed value. The
    /// cursor moves to the end, which is where formatting leaves it.
    pub fn sync(&mut self, committed: &str) {
        if self.input.value() != committed {
            self.input = Input::new(committed.to_string());
        }
    }

    /// Returns true when the key changed the text.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        self.input
            .handle_event(&Event::Key(key))
            .is_some_and(|change| change.value)
    }
}

impl TextEntrySurface for PhoneField {
    fn focus(&mut self) {
        self.focused = true;
    }
}
