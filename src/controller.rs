//! Phone input controller.
//!
//! Owns the selected country and the displayed text of a phone field and
//! keeps them consistent across three kinds of events: user edits (`ingest`),
//! explicit country choices (`select_country`) and out-of-band changes of the
//! caller-owned value (`reconcile_external_value`). Every event is applied as
//! a single commit before any listener is notified.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::country::{Country, CountryCatalog, CountryCode, Flag};
use crate::error::{PhoneInputError, Result};
use crate::formatter::{LibPhoneFormatter, NumberType, PhoneFormatter};

/// Construction parameters for [`PhoneInputController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    pub initial_country: CountryCode,
    pub initial_value: Option<String>,
    pub disabled: bool,
    pub auto_format: bool,
    /// When false the field starts without a selected country; the initial
    /// country is only committed by the first ingested text.
    pub preselect_initial_country: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            initial_country: CountryCode::default(),
            initial_value: None,
            disabled: false,
            auto_format: true,
            preselect_initial_country: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub selected_country: Option<CountryCode>,
    pub displayed_text: String,
    /// Last external value adopted through `reconcile_external_value`.
    pub external_mirror: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneInputEvent {
    TextChanged(String),
    CountrySelected(CountryCode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&PhoneInputEvent)>;

/// Row of the picker data feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerEntry {
    pub index: usize,
    pub code: CountryCode,
    pub label: String,
    /// Dial code with its leading `+`.
    pub dial_code: String,
    pub flag: Flag,
}

impl PickerEntry {
    fn from_country(index: usize, country: &Country) -> Self {
        Self {
            index,
            code: country.code.clone(),
            label: country.name.clone(),
            dial_code: format!("+{}", country.dial_code),
            flag: country.flag(),
        }
    }
}

pub struct PhoneInputController {
    catalog: Arc<CountryCatalog>,
    formatter: Box<dyn PhoneFormatter>,
    initial_country: CountryCode,
    auto_format: bool,
    state: ControllerState,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl PhoneInputController {
    pub fn new(
        catalog: Arc<CountryCatalog>,
        formatter: Box<dyn PhoneFormatter>,
        options: ControllerOptions,
    ) -> Self {
        if !catalog.contains(&options.initial_country) {
            warn!(
                country = %options.initial_country,
                "initial country is not in the catalog"
            );
        }

        let selected_country = options
            .preselect_initial_country
            .then(|| options.initial_country.clone());

        let mut controller = Self {
            catalog,
            formatter,
            initial_country: options.initial_country,
            auto_format: options.auto_format,
            state: ControllerState {
                selected_country,
                displayed_text: String::new(),
                external_mirror: None,
                disabled: options.disabled,
            },
            listeners: Vec::new(),
            next_subscription: 0,
        };

        if let Some(value) = options.initial_value.filter(|value| !value.is_empty()) {
            controller.commit_text(&value);
            controller.state.external_mirror = Some(value);
        }

        controller
    }

    /// Controller over the embedded catalog and the libphonenumber formatter.
    pub fn with_defaults(options: ControllerOptions) -> Result<Self> {
        let catalog = Arc::new(CountryCatalog::builtin()?);
        Ok(Self::new(catalog, Box::new(LibPhoneFormatter::new()), options))
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Reformat `text` for the effective country and commit it together with
    /// that country, then notify listeners.
    pub fn ingest(&mut self, text: &str) {
        self.commit_text(text);
        self.emit_text_changed();
    }

    /// Select `code` without touching the displayed text. Re-selecting the
    /// current country is a no-op and emits nothing.
    pub fn select_country(&mut self, code: &str) -> Result<()> {
        let code = CountryCode::parse(code).map_err(|err| {
            warn!(code, "rejected malformed country code");
            err
        })?;

        if self.state.selected_country.as_ref() == Some(&code) {
            return Ok(());
        }

        if !self.catalog.contains(&code) {
            warn!(code = %code, "rejected country missing from catalog");
            return Err(PhoneInputError::InvalidCountryCode(code.to_string()));
        }

        debug!(
            from = ?self.state.selected_country.as_ref().map(CountryCode::as_str),
            to = %code,
            "country selected"
        );
        self.state.selected_country = Some(code.clone());
        self.emit(PhoneInputEvent::CountrySelected(code));
        Ok(())
    }

    /// Re-ingest a caller-owned value that changed outside of user typing.
    /// Returns whether the value was adopted.
    pub fn reconcile_external_value(
        &mut self,
        previous: Option<&str>,
        next: Option<&str>,
    ) -> bool {
        if next == previous {
            return false;
        }
        let Some(next) = next.filter(|value| !value.is_empty()) else {
            return false;
        };
        if self.state.external_mirror.as_deref() == Some(next) {
            return false;
        }

        debug!(value = next, "adopting external value");
        self.state.external_mirror = Some(next.to_string());
        if self.state.selected_country.is_none() {
            // The country commit happens first; the text follows it.
            self.state.selected_country = Some(self.initial_country.clone());
            self.reformat_for_selected_country();
        } else {
            self.commit_text(next);
        }
        self.emit_text_changed();
        true
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.state.disabled = disabled;
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn value(&self) -> &str {
        &self.state.displayed_text
    }

    pub fn selected_country(&self) -> Option<&CountryCode> {
        self.state.selected_country.as_ref()
    }

    pub fn is_disabled(&self) -> bool {
        self.state.disabled
    }

    pub fn query_formatted_international(&self) -> String {
        match &self.state.selected_country {
            Some(country) => self
                .formatter
                .format_international(&self.state.displayed_text, country),
            None => self.state.displayed_text.clone(),
        }
    }

    pub fn query_is_valid(&self) -> bool {
        self.state
            .selected_country
            .as_ref()
            .is_some_and(|country| self.formatter.is_valid(&self.state.displayed_text, country))
    }

    /// Dial code of the selected country, empty when it has no catalog entry.
    pub fn query_country_code(&self) -> &str {
        self.state
            .selected_country
            .as_ref()
            .map(|country| self.catalog.dial_code_of(country))
            .unwrap_or("")
    }

    pub fn query_number_type(&self) -> NumberType {
        match &self.state.selected_country {
            Some(country) => self.formatter.classify(&self.state.displayed_text, country),
            None => NumberType::Unknown,
        }
    }

    /// Dial code typed at the start of an international number.
    pub fn query_dial_code_of_text(&self) -> &str {
        self.catalog
            .dial_code_in_text(&self.state.displayed_text)
            .unwrap_or("")
    }

    pub fn query_e164(&self) -> Option<String> {
        let country = self.state.selected_country.as_ref()?;
        self.formatter.e164(&self.state.displayed_text, country)
    }

    pub fn flag(&self) -> Flag {
        self.catalog.flag_of(self.state.selected_country.as_ref())
    }

    pub fn picker_data(&self) -> Vec<PickerEntry> {
        self.catalog
            .all()
            .iter()
            .enumerate()
            .map(|(index, country)| PickerEntry::from_country(index, country))
            .collect()
    }

    pub fn all_countries(&self) -> &[Country] {
        self.catalog.all()
    }

    pub fn catalog(&self) -> &Arc<CountryCatalog> {
        &self.catalog
    }

    // -------------------------------------------------------------------------
    // Subscriptions
    // -------------------------------------------------------------------------

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&PhoneInputEvent) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn on_text_changed<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&str) + 'static,
    {
        self.subscribe(move |event| {
            if let PhoneInputEvent::TextChanged(text) = event {
                listener(text);
            }
        })
    }

    pub fn on_country_selected<F>(&mut self, mut listener: F) -> SubscriptionId
    where
        F: FnMut(&CountryCode) + 'static,
    {
        self.subscribe(move |event| {
            if let PhoneInputEvent::CountrySelected(code) = event {
                listener(code);
            }
        })
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Commit `{country, text}` in one step, falling back to the initial
    /// country when none is selected.
    fn commit_text(&mut self, text: &str) {
        let country = self
            .state
            .selected_country
            .clone()
            .unwrap_or_else(|| self.initial_country.clone());
        let displayed = self.format(text, &country);

        debug!(country = %country, text = %displayed, "committing text");
        self.state.selected_country = Some(country);
        self.state.displayed_text = displayed;
    }

    /// Recompute the displayed text from the adopted external value for the
    /// now-selected country.
    fn reformat_for_selected_country(&mut self) {
        let Some(country) = self.state.selected_country.clone() else {
            return;
        };
        let source = self
            .state
            .external_mirror
            .clone()
            .unwrap_or_else(|| self.state.displayed_text.clone());
        self.state.displayed_text = self.format(&source, &country);
    }

    fn format(&self, text: &str, country: &CountryCode) -> String {
        if self.auto_format {
            self.formatter.format(text, country)
        } else {
            text.to_string()
        }
    }

    fn emit_text_changed(&mut self) {
        let event = PhoneInputEvent::TextChanged(self.state.displayed_text.clone());
        self.emit(event);
    }

    fn emit(&mut self, event: PhoneInputEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn code(raw: &str) -> CountryCode {
        CountryCode::parse(raw).unwrap()
    }

    fn options(country: &str) -> ControllerOptions {
        ControllerOptions {
            initial_country: code(country),
            ..ControllerOptions::default()
        }
    }

    fn controller(country: &str) -> PhoneInputController {
        PhoneInputController::with_defaults(options(country)).unwrap()
    }

    fn record(controller: &mut PhoneInputController) -> Rc<RefCell<Vec<PhoneInputEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        controller.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    /// Tags text with the country it was formatted for.
    struct TaggingFormatter;

    impl PhoneFormatter for TaggingFormatter {
        fn format(&self, text: &str, country: &CountryCode) -> String {
            format!("{}:{}", country, text.rsplit(':').next().unwrap_or(text))
        }
        fn format_national(&self, text: &str, country: &CountryCode) -> String {
            self.format(text, country)
        }
        fn format_international(&self, text: &str, country: &CountryCode) -> String {
            format!("+{}", self.format(text, country))
        }
        fn is_valid(&self, text: &str, country: &CountryCode) -> bool {
            text.starts_with(&format!("{}:", country))
        }
        fn classify(&self, _text: &str, _country: &CountryCode) -> NumberType {
            NumberType::Unknown
        }
        fn dial_code_of(&self, _country: &CountryCode) -> String {
            String::new()
        }
        fn e164(&self, _text: &str, _country: &CountryCode) -> Option<String> {
            None
        }
    }

    fn tagging_controller(options: ControllerOptions) -> PhoneInputController {
        let catalog = Arc::new(CountryCatalog::builtin().unwrap());
        PhoneInputController::new(catalog, Box::new(TaggingFormatter), options)
    }

    #[test]
    fn test_us_typing_scenario() {
        let mut phone = controller("us");
        phone.ingest("4155552671");

        assert_eq!(phone.value(), "(415) 555-2671");
        assert_eq!(phone.query_formatted_international(), "+1 415-555-2671");
        assert!(phone.query_is_valid());
        assert_eq!(phone.query_country_code(), "1");
        assert_eq!(phone.query_e164().as_deref(), Some("+14155552671"));
    }

    #[test]
    fn test_select_country_keeps_text() {
        let mut phone = controller("us");
        phone.ingest("4155552671");
        phone.select_country("gb").unwrap();

        assert_eq!(phone.selected_country(), Some(&code("gb")));
        assert_eq!(phone.value(), "(415) 555-2671");
        assert!(!phone.query_is_valid());
        assert_eq!(phone.query_country_code(), "44");
    }

    #[test]
    fn test_reselecting_same_country_is_idempotent() {
        let mut phone = controller("us");
        let events = record(&mut phone);

        phone.select_country("fr").unwrap();
        let after_first = phone.state().clone();
        phone.select_country("FR").unwrap();

        assert_eq!(phone.state(), &after_first);
        assert_eq!(
            *events.borrow(),
            vec![PhoneInputEvent::CountrySelected(code("fr"))]
        );
    }

    #[test]
    fn test_select_unknown_country_is_rejected() {
        let mut phone = controller("us");
        phone.ingest("4155552671");
        let events = record(&mut phone);
        let before = phone.state().clone();

        assert_eq!(
            phone.select_country("zz"),
            Err(PhoneInputError::InvalidCountryCode("zz".to_string()))
        );
        assert!(matches!(
            phone.select_country("usa"),
            Err(PhoneInputError::InvalidCountryCode(_))
        ));
        assert_eq!(phone.state(), &before);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_ingest_queries_match_committed_country() {
        let mut phone = controller("us");
        phone.select_country("fr").unwrap();
        phone.ingest("0612345678");

        assert_eq!(phone.selected_country(), Some(&code("fr")));
        assert_eq!(phone.query_country_code(), "33");
        assert_eq!(phone.query_formatted_international(), "+33 6 12 34 56 78");
        assert_eq!(phone.query_number_type(), NumberType::Mobile);
    }

    #[test]
    fn test_ingest_emits_text_changed() {
        let mut phone = controller("us");
        let texts = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&texts);
        phone.on_text_changed(move |text| sink.borrow_mut().push(text.to_string()));

        phone.ingest("415");
        phone.ingest("4155552671");

        assert_eq!(*texts.borrow(), vec!["415".to_string(), "(415) 555-2671".to_string()]);
    }

    #[test]
    fn test_ingest_falls_back_to_initial_country() {
        let mut phone = PhoneInputController::with_defaults(ControllerOptions {
            preselect_initial_country: false,
            ..options("fr")
        })
        .unwrap();
        assert_eq!(phone.selected_country(), None);
        assert!(phone.flag().is_placeholder());
        assert_eq!(phone.query_country_code(), "");

        phone.ingest("0612345678");
        assert_eq!(phone.selected_country(), Some(&code("fr")));
        assert_eq!(phone.value(), "06 12 34 56 78");
        assert_eq!(phone.flag(), Flag::of(&code("fr")));
    }

    #[test]
    fn test_external_resync_formats_nationally() {
        let mut phone = controller("fr");
        let events = record(&mut phone);

        assert!(phone.reconcile_external_value(None, Some("+33612345678")));

        assert_eq!(phone.selected_country(), Some(&code("fr")));
        assert_eq!(phone.value(), "06 12 34 56 78");
        assert_eq!(phone.state().external_mirror.as_deref(), Some("+33612345678"));
        assert_eq!(
            *events.borrow(),
            vec![PhoneInputEvent::TextChanged("06 12 34 56 78".to_string())]
        );
    }

    #[test]
    fn test_external_resync_ignores_unchanged_values() {
        let mut phone = controller("fr");
        assert!(phone.reconcile_external_value(None, Some("+33612345678")));
        let events = record(&mut phone);

        assert!(!phone.reconcile_external_value(Some("a"), Some("a")));
        assert!(!phone.reconcile_external_value(Some("x"), Some("+33612345678")));
        assert!(!phone.reconcile_external_value(Some("+33612345678"), None));
        assert!(!phone.reconcile_external_value(Some("+33612345678"), Some("")));
        assert!(events.borrow().is_empty());
        assert_eq!(phone.value(), "06 12 34 56 78");
    }

    #[test]
    fn test_external_resync_reformats_when_country_changes() {
        let mut phone = tagging_controller(ControllerOptions {
            preselect_initial_country: false,
            ..options("fr")
        });
        let events = record(&mut phone);

        assert_eq!(phone.selected_country(), None);
        assert!(phone.reconcile_external_value(None, Some("0612")));

        assert_eq!(phone.selected_country(), Some(&code("fr")));
        assert_eq!(phone.value(), "fr:0612");
        assert!(phone.query_is_valid());
        assert_eq!(
            *events.borrow(),
            vec![PhoneInputEvent::TextChanged("fr:0612".to_string())]
        );

        // Country already set: plain re-ingest, still one notification.
        phone.select_country("de").unwrap();
        events.borrow_mut().clear();
        assert!(phone.reconcile_external_value(Some("0612"), Some("0613")));
        assert_eq!(phone.value(), "de:0613");
        assert_eq!(
            *events.borrow(),
            vec![PhoneInputEvent::TextChanged("de:0613".to_string())]
        );
    }

    #[test]
    fn test_foreign_dial_code_keeps_international_form() {
        let mut phone = controller("fr");
        phone.ingest("+1 415 555 2671");

        assert_eq!(phone.selected_country(), Some(&code("fr")));
        assert_eq!(phone.value(), "+1 415-555-2671");
        assert_eq!(phone.query_formatted_international(), "+1 415-555-2671");
        assert!(phone.query_is_valid());
        assert_eq!(phone.query_dial_code_of_text(), "1");
        assert_eq!(phone.query_country_code(), "33");
    }

    #[test]
    fn test_direct_selection_does_not_reformat() {
        let mut phone = tagging_controller(options("fr"));
        phone.ingest("0612");
        phone.select_country("de").unwrap();

        assert_eq!(phone.value(), "fr:0612");
        assert!(!phone.query_is_valid());

        let typed = phone.value().to_string();
        phone.ingest(&typed);
        assert_eq!(phone.value(), "de:0612");
        assert!(phone.query_is_valid());
    }

    #[test]
    fn test_auto_format_disabled_mirrors_input() {
        let mut phone = PhoneInputController::with_defaults(ControllerOptions {
            auto_format: false,
            ..options("us")
        })
        .unwrap();
        phone.ingest("4155552671");

        assert_eq!(phone.value(), "4155552671");
        assert!(phone.query_is_valid());
        assert_eq!(phone.query_formatted_international(), "+1 415-555-2671");
    }

    #[test]
    fn test_initial_value_is_ingested() {
        let phone = PhoneInputController::with_defaults(ControllerOptions {
            initial_value: Some("4155552671".to_string()),
            ..options("us")
        })
        .unwrap();

        assert_eq!(phone.value(), "(415) 555-2671");
        assert_eq!(phone.state().external_mirror.as_deref(), Some("4155552671"));
    }

    #[test]
    fn test_set_disabled_only_touches_flag() {
        let mut phone = controller("us");
        phone.ingest("4155552671");
        let before = phone.state().clone();

        phone.set_disabled(true);
        assert!(phone.is_disabled());
        assert_eq!(phone.value(), before.displayed_text);
        assert_eq!(phone.selected_country(), before.selected_country.as_ref());
    }

    #[test]
    fn test_dial_code_of_text() {
        let mut phone = PhoneInputController::with_defaults(ControllerOptions {
            auto_format: false,
            ..options("us")
        })
        .unwrap();
        phone.ingest("+33 6 12 34 56 78");
        assert_eq!(phone.query_dial_code_of_text(), "33");

        phone.ingest("06 12 34 56 78");
        assert_eq!(phone.query_dial_code_of_text(), "");
    }

    #[test]
    fn test_picker_data() {
        let phone = controller("us");
        let entries = phone.picker_data();

        assert_eq!(entries.len(), phone.all_countries().len());
        assert_eq!(entries[0].index, 0);
        let us = entries.iter().find(|entry| entry.code == "us").unwrap();
        assert_eq!(us.label, "United States");
        assert_eq!(us.dial_code, "+1");
        assert_eq!(us.flag, Flag::of(&code("us")));
    }

    #[test]
    fn test_unsubscribe_stops_events() {
        let mut phone = controller("us");
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let id = phone.on_country_selected(move |_| *sink.borrow_mut() += 1);

        phone.select_country("fr").unwrap();
        assert!(phone.unsubscribe(id));
        assert!(!phone.unsubscribe(id));
        phone.select_country("de").unwrap();

        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_custom_catalog_is_injected() {
        let catalog = CountryCatalog::from_json(
            r#"[{"name": "France", "iso2": "fr", "dialCode": "33"}]"#,
        )
        .unwrap();
        let mut phone = PhoneInputController::new(
            Arc::new(catalog),
            Box::new(LibPhoneFormatter::new()),
            options("fr"),
        );

        assert_eq!(phone.picker_data().len(), 1);
        assert!(phone.select_country("us").is_err());
        assert_eq!(phone.query_country_code(), "33");
    }
}
