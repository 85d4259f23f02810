//! Phone number formatting and validation.
//!
//! Every operation is total: text that does not parse comes back unchanged
//! and is reported invalid, never as an error.

use rlibphonenumber::{PhoneNumber, PhoneNumberFormat, PhoneNumberType, PHONE_NUMBER_UTIL};

use crate::country::CountryCode;
use crate::search;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberType {
    FixedLine,
    Mobile,
    FixedLineOrMobile,
    TollFree,
    PremiumRate,
    SharedCost,
    Unknown,
}

impl NumberType {
    pub fn label(self) -> &'static str {
        match self {
            NumberType::FixedLine => "fixed line",
            NumberType::Mobile => "mobile",
            NumberType::FixedLineOrMobile => "fixed line or mobile",
            NumberType::TollFree => "toll free",
            NumberType::PremiumRate => "premium rate",
            NumberType::SharedCost => "shared cost",
            NumberType::Unknown => "unknown",
        }
    }
}

/// Formatting engine used by the input controller.
pub trait PhoneFormatter {
    /// As-you-type formatting: national form once the text is a complete,
    /// valid number for `country`, the text itself otherwise.
    fn format(&self, text: &str, country: &CountryCode) -> String;

    fn format_national(&self, text: &str, country: &CountryCode) -> String;

    fn format_international(&self, text: &str, country: &CountryCode) -> String;

    fn is_valid(&self, text: &str, country: &CountryCode) -> bool;

    fn classify(&self, text: &str, country: &CountryCode) -> NumberType;

    /// Calling code for the country, empty when the region is unknown.
    fn dial_code_of(&self, country: &CountryCode) -> String;

    fn e164(&self, text: &str, country: &CountryCode) -> Option<String>;
}

/// `PhoneFormatter` backed by libphonenumber metadata.
#[derive(Debug, Clone)]
pub struct LibPhoneFormatter {
    allow_zero_after_country_code: bool,
}

impl Default for LibPhoneFormatter {
    fn default() -> Self {
        Self {
            allow_zero_after_country_code: true,
        }
    }
}

impl LibPhoneFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// When disabled, a trunk `0` typed right after the country calling code
    /// (`+44 020...`) is dropped before formatting.
    pub fn allow_zero_after_country_code(mut self, allow: bool) -> Self {
        self.allow_zero_after_country_code = allow;
        self
    }

    fn parse(&self, text: &str, country: &CountryCode) -> Option<PhoneNumber> {
        let trimmed = text.trim();
        if search::digits(trimmed).is_empty() {
            return None;
        }
        let cleaned = self.strip_zero_after_country_code(trimmed, country);
        PHONE_NUMBER_UTIL.parse(&cleaned, &country.region()).ok()
    }

    fn strip_zero_after_country_code(&self, text: &str, country: &CountryCode) -> String {
        if self.allow_zero_after_country_code || !text.starts_with('+') {
            return text.to_string();
        }
        let dial = self.dial_code_of(country);
        let digits = search::digits(text);
        match digits.strip_prefix(dial.as_str()) {
            Some(rest) if !dial.is_empty() && rest.starts_with('0') => {
                format!("+{}{}", dial, &rest[1..])
            }
            _ => text.to_string(),
        }
    }

    /// Whether `text` is written with a calling code other than `country`'s.
    /// Such numbers lose their country in national form.
    fn has_foreign_dial_code(&self, text: &str, country: &CountryCode) -> bool {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('+') {
            return false;
        }
        let dial = self.dial_code_of(country);
        dial.is_empty() || !search::digits(trimmed).starts_with(dial.as_str())
    }

    fn render(number: &PhoneNumber, format: PhoneNumberFormat) -> String {
        PHONE_NUMBER_UTIL.format(number, format).into_owned()
    }
}

impl PhoneFormatter for LibPhoneFormatter {
    fn format(&self, text: &str, country: &CountryCode) -> String {
        match self.parse(text, country) {
            Some(number) if PHONE_NUMBER_UTIL.is_valid_number(&number) => {
                if self.has_foreign_dial_code(text, country) {
                    Self::render(&number, PhoneNumberFormat::International)
                } else {
                    Self::render(&number, PhoneNumberFormat::National)
                }
            }
            _ => text.to_string(),
        }
    }

    fn format_national(&self, text: &str, country: &CountryCode) -> String {
        self.parse(text, country)
            .map(|number| Self::render(&number, PhoneNumberFormat::National))
            .unwrap_or_else(|| text.to_string())
    }

    fn format_international(&self, text: &str, country: &CountryCode) -> String {
        self.parse(text, country)
            .map(|number| Self::render(&number, PhoneNumberFormat::International))
            .unwrap_or_else(|| text.to_string())
    }

    fn is_valid(&self, text: &str, country: &CountryCode) -> bool {
        self.parse(text, country)
            .map(|number| PHONE_NUMBER_UTIL.is_valid_number(&number))
            .unwrap_or(false)
    }

    fn classify(&self, text: &str, country: &CountryCode) -> NumberType {
        let Some(number) = self.parse(text, country) else {
            return NumberType::Unknown;
        };
        match PHONE_NUMBER_UTIL.get_number_type(&number) {
            PhoneNumberType::FixedLine => NumberType::FixedLine,
            PhoneNumberType::Mobile => NumberType::Mobile,
            PhoneNumberType::FixedLineOrMobile => NumberType::FixedLineOrMobile,
            PhoneNumberType::TollFree => NumberType::TollFree,
            PhoneNumberType::PremiumRate => NumberType::PremiumRate,
            PhoneNumberType::SharedCost => NumberType::SharedCost,
            _ => NumberType::Unknown,
        }
    }

    fn dial_code_of(&self, country: &CountryCode) -> String {
        match PHONE_NUMBER_UTIL.get_country_code_for_region(&country.region()) {
            None | Some(0) => String::new(),
            Some(code) => code.to_string(),
        }
    }

    fn e164(&self, text: &str, country: &CountryCode) -> Option<String> {
        self.parse(text, country)
            .map(|number| Self::render(&number, PhoneNumberFormat::E164))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> CountryCode {
        CountryCode::parse(raw).unwrap()
    }

    #[test]
    fn test_format_us_number() {
        let formatter = LibPhoneFormatter::new();
        let us = code("us");
        assert_eq!(formatter.format("4155552671", &us), "(415) 555-2671");
        assert_eq!(formatter.format_international("4155552671", &us), "+1 415-555-2671");
        assert_eq!(formatter.e164("(415) 555-2671", &us).as_deref(), Some("+14155552671"));
    }

    #[test]
    fn test_partial_input_passes_through() {
        let formatter = LibPhoneFormatter::new();
        let us = code("us");
        assert_eq!(formatter.format("415", &us), "415");
        assert_eq!(formatter.format("", &us), "");
        assert_eq!(formatter.format("abc", &us), "abc");
        assert!(!formatter.is_valid("415", &us));
        assert!(!formatter.is_valid("", &us));
        assert_eq!(formatter.classify("", &us), NumberType::Unknown);
    }

    #[test]
    fn test_national_format_round_trips_as_valid() {
        let formatter = LibPhoneFormatter::new();
        for (text, country) in [
            ("4155552671", "us"),
            ("0612345678", "fr"),
            ("02079460000", "gb"),
            ("03012345678", "de"),
        ] {
            let country = code(country);
            assert!(formatter.is_valid(text, &country), "{} should be valid", text);
            let national = formatter.format_national(text, &country);
            assert!(
                formatter.is_valid(&national, &country),
                "{} should stay valid for {}",
                national,
                country
            );
        }
    }

    #[test]
    fn test_french_mobile() {
        let formatter = LibPhoneFormatter::new();
        let fr = code("fr");
        assert_eq!(formatter.format("+33612345678", &fr), "06 12 34 56 78");
        assert_eq!(formatter.classify("+33612345678", &fr), NumberType::Mobile);
    }

    #[test]
    fn test_foreign_dial_code_stays_international() {
        let formatter = LibPhoneFormatter::new();
        let fr = code("fr");
        assert_eq!(formatter.format("+1 415 555 2671", &fr), "+1 415-555-2671");
        assert!(formatter.is_valid("+1 415-555-2671", &fr));
        // Same calling code as the region: national form.
        assert_eq!(formatter.format("+1 415 555 2671", &code("us")), "(415) 555-2671");
    }

    #[test]
    fn test_dial_code_of() {
        let formatter = LibPhoneFormatter::new();
        assert_eq!(formatter.dial_code_of(&code("us")), "1");
        assert_eq!(formatter.dial_code_of(&code("fr")), "33");
        assert_eq!(formatter.dial_code_of(&code("zz")), "");
    }

    #[test]
    fn test_zero_after_country_code() {
        let gb = code("gb");
        let strict = LibPhoneFormatter::new().allow_zero_after_country_code(false);
        assert_eq!(strict.e164("+44 020 7946 0000", &gb).as_deref(), Some("+442079460000"));
        assert_eq!(strict.e164("+44 20 7946 0000", &gb).as_deref(), Some("+442079460000"));

        let lenient = LibPhoneFormatter::new();
        assert!(lenient.e164("020 7946 0000", &gb).is_some());
    }
}
