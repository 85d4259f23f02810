use crossterm::event::{Event, KeyEvent};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::bridge::PickerSurface;
use crate::controller::PickerEntry;
use crate::country::CountryCode;
use crate::search;

/// Country picker popup: a filterable list over the picker data feed.
pub struct CountryPicker {
    entries: Vec<PickerEntry>,
    visible: bool,
    filter: Input,
    /// Indices into `entries` matching the filter, feed order.
    matches: Vec<usize>,
    /// Position within `matches`.
    selected: usize,
}

impl CountryPicker {
    pub fn new(entries: Vec<PickerEntry>) -> Self {
        let matches = (0..entries.len()).collect();
        Self {
            entries,
            visible: false,
            filter: Input::default(),
            matches,
            selected: 0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn filter_value(&self) -> &str {
        self.filter.value()
    }

    pub fn filter_cursor(&self) -> usize {
        self.filter.visual_cursor()
    }

    pub fn visible_entries(&self) -> impl Iterator<Item = &PickerEntry> + '_ {
        self.matches.iter().map(move |&idx| &self.entries[idx])
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Position of the highlighted row among the visible entries.
    pub fn selected_position(&self) -> Option<usize> {
        (!self.matches.is_empty()).then_some(self.selected)
    }

    pub fn selected_entry(&self) -> Option<&PickerEntry> {
        self.matches
            .get(self.selected)
            .map(|&idx| &self.entries[idx])
    }

    pub fn select_next(&mut self) {
        self.move_selection(1);
    }

    pub fn select_prev(&mut self) {
        self.move_selection(-1);
    }

    pub fn page(&mut self, delta: isize, page_size: usize) {
        self.move_selection(delta * page_size.max(1) as isize);
    }

    fn move_selection(&mut self, delta: isize) {
        if self.matches.is_empty() {
            return;
        }
        let last = self.matches.len() - 1;
        let target = self.selected as isize + delta;
        self.selected = target.clamp(0, last as isize) as usize;
    }

    /// Feed a key to the filter input. Returns true when the filter changed.
    pub fn handle_filter_key(&mut self, key: KeyEvent) -> bool {
        let changed = self
            .filter
            .handle_event(&Event::Key(key))
            .is_some_and(|change| change.value);
        if changed {
            self.refilter();
        }
        changed
    }

    fn refilter(&mut self) {
        let current = self.selected_entry().map(|entry| entry.index);
        self.matches = match search::normalize_query(self.filter.value()) {
            Some(needle) => self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| {
                    search::country_matches(
                        &needle,
                        &entry.label,
                        entry.code.as_str(),
                        &entry.dial_code,
                    )
                })
                .map(|(idx, _)| idx)
                .collect(),
            None => (0..self.entries.len()).collect(),
        };
        // Keep the highlighted country when it survives the new filter.
        self.selected = current
            .and_then(|index| self.matches.iter().position(|&idx| self.entries[idx].index == index))
            .unwrap_or(0);
    }
}

impl PickerSurface for CountryPicker {
    fn preselect(&mut self, code: &CountryCode) {
        self.filter.reset();
        self.matches = (0..self.entries.len()).collect();
        self.selected = self
            .entries
            .iter()
            .position(|entry| &entry.code == code)
            .unwrap_or(0);
    }

    fn show(&mut self) {
        self.visible = true;
    }
}
