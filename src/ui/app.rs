use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::stdout;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::debug;
use tui_widgets::popup::PopupState;

use crate::bridge::{FlagActivation, SelectionBridge};
use crate::config::{Config, PickerConfig};
use crate::controller::{PhoneInputController, PhoneInputEvent};
use crate::formatter::NumberType;

use super::draw;
use super::edit::PhoneField;
use super::picker::CountryPicker;

const PICKER_PAGE: usize = 10;

/// Host for one phone field: the text entry, the flag button and the picker.
pub struct App {
    config: Config,
    controller: PhoneInputController,
    bridge: SelectionBridge,
    events: Rc<RefCell<VecDeque<PhoneInputEvent>>>,
    pub field: PhoneField,
    pub picker: CountryPicker,
    pub status: Option<String>,
    // Popup state for the picker (tui-widgets popup)
    pub modal_popup: PopupState,
}

/// Snapshot of the controller queries shown under the field.
pub struct Summary {
    pub flag: String,
    pub country: String,
    pub dial_code: String,
    pub international: String,
    pub e164: Option<String>,
    pub valid: bool,
    pub number_type: NumberType,
    pub disabled: bool,
}

impl App {
    pub fn new(config: Config, mut controller: PhoneInputController) -> Self {
        let events = Rc::new(RefCell::new(VecDeque::new()));
        let sink = Rc::clone(&events);
        controller.subscribe(move |event| sink.borrow_mut().push_back(event.clone()));

        let field = PhoneField::new(controller.value());
        let picker = CountryPicker::new(controller.picker_data());

        let mut app = Self {
            config,
            controller,
            bridge: SelectionBridge::new(),
            events,
            field,
            picker,
            status: None,
            modal_popup: PopupState::default(),
        };
        app.bridge.focus(&mut app.field);
        app
    }

    pub fn run(&mut self) -> Result<()> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    /// Final committed text, printed by the caller after the terminal is restored.
    pub fn value(&self) -> &str {
        self.controller.value()
    }

    pub fn international_value(&self) -> String {
        self.controller.query_formatted_international()
    }

    pub fn picker_config(&self) -> &PickerConfig {
        &self.config.picker
    }

    pub fn summary(&self) -> Summary {
        let controller = &self.controller;
        let country = controller
            .selected_country()
            .and_then(|code| controller.catalog().lookup(code))
            .map(|country| country.name.clone())
            .unwrap_or_else(|| "No country".to_string());
        Summary {
            flag: controller.flag().emoji(),
            country,
            dial_code: controller.query_country_code().to_string(),
            international: controller.query_formatted_international(),
            e164: controller.query_e164(),
            valid: controller.query_is_valid(),
            number_type: controller.query_number_type(),
            disabled: controller.is_disabled(),
        }
    }

    fn event_loop<B>(&mut self, terminal: &mut Terminal<B>) -> Result<()>
    where
        B: ratatui::backend::Backend,
    {
        loop {
            draw::render(terminal, self)?;

            if event::poll(Duration::from_millis(250))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Ctrl+C always quits (hardcoded for safety)
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        {
            return Ok(true);
        }

        // Ctrl+D toggles the disabled state of the field
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('d') | KeyCode::Char('D'))
        {
            let disabled = !self.controller.is_disabled();
            self.controller.set_disabled(disabled);
            self.set_status(if disabled { "Field disabled" } else { "Field enabled" });
            return Ok(false);
        }

        if self.picker.is_visible() {
            self.handle_picker_key(key);
        } else if self.handle_field_key(key) {
            return Ok(true);
        }

        self.drain_events();
        Ok(false)
    }

    fn handle_field_key(&mut self, key: KeyEvent) -> bool {
        let keys = &self.config.keys.field;

        if key_matches_any(&key, &keys.quit) {
            return true;
        }

        if key_matches_any(&key, &keys.flag) {
            match self.bridge.on_flag_activated(&self.controller, &mut self.picker) {
                FlagActivation::Ignored => self.set_status("Field is disabled"),
                FlagActivation::Overridden => {}
                FlagActivation::PickerShown => self.field.focused = false,
            }
            return false;
        }

        if self.controller.is_disabled() {
            return false;
        }

        if key_matches_any(&key, &keys.clear) {
            self.controller.ingest("");
            self.field.sync(self.controller.value());
            return false;
        }

        if self.field.handle_key_event(key) {
            let typed = self.field.value().to_string();
            self.controller.ingest(&typed);
            self.field.sync(self.controller.value());
        }
        false
    }

    fn handle_picker_key(&mut self, key: KeyEvent) {
        let keys = &self.config.keys.picker;

        if key_matches_any(&key, &keys.cancel) {
            self.close_picker();
            return;
        }

        if key_matches_any(&key, &keys.confirm) {
            if let Some(code) = self.picker.selected_entry().map(|entry| entry.code.clone()) {
                if let Err(err) = self.bridge.on_country_chosen(&mut self.controller, code.as_str()) {
                    self.set_status(err.to_string());
                }
            }
            self.close_picker();
            return;
        }

        if key_matches_any(&key, &keys.next) {
            self.picker.select_next();
        } else if key_matches_any(&key, &keys.prev) {
            self.picker.select_prev();
        } else if key_matches_any(&key, &keys.page_down) {
            self.picker.page(1, PICKER_PAGE);
        } else if key_matches_any(&key, &keys.page_up) {
            self.picker.page(-1, PICKER_PAGE);
        } else {
            self.picker.handle_filter_key(key);
        }
    }

    fn close_picker(&mut self) {
        self.picker.hide();
        self.bridge.focus(&mut self.field);
    }

    fn drain_events(&mut self) {
        let pending: Vec<PhoneInputEvent> = self.events.borrow_mut().drain(..).collect();
        for event in pending {
            debug!(?event, "phone input event");
            if let PhoneInputEvent::CountrySelected(code) = event {
                let name = self
                    .controller
                    .catalog()
                    .lookup(&code)
                    .map(|country| country.name.clone())
                    .unwrap_or_else(|| code.to_string());
                self.set_status(format!("Country set to {}", name));
            }
        }
    }

    fn set_status<S: Into<String>>(&mut self, message: S) {
        self.status = Some(message.into());
    }
}

fn key_matches_any(event: &KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| key_matches_single(event, b))
}

/// Check if the key event matches a single binding string
fn key_matches_single(event: &KeyEvent, binding: &str) -> bool {
    let trimmed = binding.trim();
    if trimmed.is_empty() {
        return false;
    }

    // Disallow Ctrl/Alt/Super modifiers (we don't support them)
    let disallowed = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
    if event.modifiers.intersects(disallowed) {
        return false;
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "enter" => matches!(event.code, KeyCode::Enter),
        "tab" => matches!(event.code, KeyCode::Tab),
        "backtab" | "shift+tab" => matches!(event.code, KeyCode::BackTab),
        "backspace" => matches!(event.code, KeyCode::Backspace),
        "esc" | "escape" => matches!(event.code, KeyCode::Esc),
        "space" => matches!(event.code, KeyCode::Char(' ')),
        "up" => matches!(event.code, KeyCode::Up),
        "down" => matches!(event.code, KeyCode::Down),
        "left" => matches!(event.code, KeyCode::Left),
        "right" => matches!(event.code, KeyCode::Right),
        "pageup" | "page_up" => matches!(event.code, KeyCode::PageUp),
        "pagedown" | "page_down" => matches!(event.code, KeyCode::PageDown),
        "home" => matches!(event.code, KeyCode::Home),
        "end" => matches!(event.code, KeyCode::End),
        name if name.len() > 1 && name.starts_with('f') => name[1..]
            .parse::<u8>()
            .map(|n| matches!(event.code, KeyCode::F(f) if f == n))
            .unwrap_or(false),
        // Single character - case-sensitive
        _ => {
            let mut chars = trimmed.chars();
            if let (Some(first), None) = (chars.next(), chars.next()) {
                matches!(event.code, KeyCode::Char(c) if c == first)
            } else {
                false
            }
        }
    }
}
