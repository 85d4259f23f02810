//! Country metadata: ISO codes, dial codes and flags.
//!
//! The catalog is built once (from the embedded dataset or a caller-supplied
//! one) and then shared read-only between controllers.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PhoneInputError, Result};
use crate::search;

const BUILTIN_DATASET: &str = include_str!("../data/countries.json");

/// White flag, shown when no country is known.
const PLACEHOLDER_FLAG: &str = "\u{1F3F3}";

/// Lowercase ISO-3166 alpha-2 code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() != 2 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PhoneInputError::InvalidCountryCode(raw.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Uppercase region identifier, as expected by libphonenumber.
    pub fn region(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

/// United States, the widget's historical default.
impl Default for CountryCode {
    fn default() -> Self {
        Self("us".to_string())
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CountryCode {
    type Err = PhoneInputError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CountryCode {
    type Error = PhoneInputError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl PartialEq<str> for CountryCode {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq<&str> for CountryCode {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

/// Opaque flag handle. Renders as a regional-indicator pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Flag(Option<CountryCode>);

impl Flag {
    pub fn of(code: &CountryCode) -> Self {
        Self(Some(code.clone()))
    }

    pub fn placeholder() -> Self {
        Self(None)
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.is_none()
    }

    pub fn emoji(&self) -> String {
        match &self.0 {
            Some(code) => code
                .as_str()
                .chars()
                .filter_map(|c| {
                    let offset = c.to_ascii_uppercase() as u32 - 'A' as u32;
                    char::from_u32(0x1F1E6 + offset)
                })
                .collect(),
            None => PLACEHOLDER_FLAG.to_string(),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.emoji())
    }
}

/// One catalog entry. Field names follow the `countriesList` JSON shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub name: String,
    #[serde(rename = "iso2")]
    pub code: CountryCode,
    pub dial_code: String,
    /// Lower wins when several countries share a dial code.
    #[serde(default)]
    pub priority: u32,
    #[serde(default, deserialize_with = "deserialize_area_codes")]
    pub area_codes: Vec<String>,
}

impl Country {
    pub fn flag(&self) -> Flag {
        Flag::of(&self.code)
    }
}

// `areaCodes` is `null` for most entries in the upstream datasets.
fn deserialize_area_codes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone)]
pub struct CountryCatalog {
    countries: Vec<Country>,
    index: HashMap<CountryCode, usize>,
}

impl CountryCatalog {
    /// Catalog backed by the embedded dataset.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DATASET)
    }

    pub fn with_dataset(countries: Vec<Country>) -> Result<Self> {
        let index = build_index(&countries)?;
        Ok(Self { countries, index })
    }

    pub fn from_json(input: &str) -> Result<Self> {
        let countries: Vec<Country> = serde_json::from_str(input)
            .map_err(|err| PhoneInputError::Dataset(err.to_string()))?;
        Self::with_dataset(countries)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| PhoneInputError::Dataset(format!("{}: {}", path.display(), err)))?;
        Self::from_json(&raw)
    }

    /// Replace the backing dataset. Only possible while the catalog is
    /// exclusively owned, i.e. before it is shared with controllers.
    pub fn set_dataset(&mut self, countries: Vec<Country>) -> Result<()> {
        let index = build_index(&countries)?;
        self.countries = countries;
        self.index = index;
        Ok(())
    }

    pub fn lookup(&self, code: &CountryCode) -> Option<&Country> {
        self.index.get(code).map(|&idx| &self.countries[idx])
    }

    pub fn contains(&self, code: &CountryCode) -> bool {
        self.index.contains_key(code)
    }

    pub fn all(&self) -> &[Country] {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Dial code for `code`, or an empty string when the country is unknown.
    pub fn dial_code_of(&self, code: &CountryCode) -> &str {
        self.lookup(code)
            .map(|country| country.dial_code.as_str())
            .unwrap_or("")
    }

    pub fn flag_of(&self, code: Option<&CountryCode>) -> Flag {
        code.and_then(|code| self.lookup(code))
            .map(Country::flag)
            .unwrap_or_else(Flag::placeholder)
    }

    /// Dial code that prefixes an international number (`"+33 6..."` -> `"33"`).
    /// Longest match wins; texts without a leading `+` have none.
    pub fn dial_code_in_text(&self, text: &str) -> Option<&str> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('+') {
            return None;
        }
        let digits = search::digits(trimmed);
        self.countries
            .iter()
            .map(|country| country.dial_code.as_str())
            .filter(|dial| !dial.is_empty() && digits.starts_with(dial))
            .max_by_key(|dial| dial.len())
    }

    /// Country owning an international number. Area codes disambiguate shared
    /// dial codes; otherwise the entry with the lowest priority wins.
    pub fn country_for_number(&self, text: &str) -> Option<&Country> {
        let dial = self.dial_code_in_text(text)?;
        let digits = search::digits(text);
        let national = &digits[dial.len()..];
        let candidates: Vec<&Country> = self
            .countries
            .iter()
            .filter(|country| country.dial_code == dial)
            .collect();

        candidates
            .iter()
            .find(|country| {
                country
                    .area_codes
                    .iter()
                    .any(|area| national.starts_with(area.as_str()))
            })
            .or_else(|| candidates.iter().min_by_key(|country| country.priority))
            .copied()
    }

    /// Countries whose name, code or dial code matches `query`, catalog order.
    pub fn filter(&self, query: &str) -> Vec<&Country> {
        let Some(needle) = search::normalize_query(query) else {
            return self.countries.iter().collect();
        };
        self.countries
            .iter()
            .filter(|country| {
                search::country_matches(
                    &needle,
                    &country.name,
                    country.code.as_str(),
                    &country.dial_code,
                )
            })
            .collect()
    }
}

fn build_index(countries: &[Country]) -> Result<HashMap<CountryCode, usize>> {
    let mut index = HashMap::with_capacity(countries.len());
    for (idx, country) in countries.iter().enumerate() {
        if index.insert(country.code.clone(), idx).is_some() {
            return Err(PhoneInputError::DuplicateCountry(country.code.to_string()));
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> CountryCode {
        CountryCode::parse(raw).unwrap()
    }

    #[test]
    fn test_country_code_parse() {
        assert_eq!(code("US").as_str(), "us");
        assert_eq!(code(" fr ").region(), "FR");
        assert!(CountryCode::parse("usa").is_err());
        assert!(CountryCode::parse("1a").is_err());
        assert_eq!(
            CountryCode::parse(""),
            Err(PhoneInputError::InvalidCountryCode(String::new()))
        );
    }

    #[test]
    fn test_builtin_catalog_lookups() {
        let catalog = CountryCatalog::builtin().unwrap();
        assert!(catalog.len() > 200);

        let us = catalog.lookup(&code("us")).unwrap();
        assert_eq!(us.name, "United States");
        assert_eq!(us.dial_code, "1");
        assert_eq!(catalog.dial_code_of(&code("fr")), "33");
        assert_eq!(catalog.dial_code_of(&code("zz")), "");
        assert!(catalog.lookup(&code("zz")).is_none());
    }

    #[test]
    fn test_flags() {
        assert_eq!(Flag::of(&code("fr")).emoji(), "\u{1F1EB}\u{1F1F7}");
        assert!(Flag::placeholder().is_placeholder());

        let catalog = CountryCatalog::builtin().unwrap();
        assert!(catalog.flag_of(Some(&code("zz"))).is_placeholder());
        assert!(catalog.flag_of(None).is_placeholder());
        assert_eq!(catalog.flag_of(Some(&code("gb"))), Flag::of(&code("gb")));
    }

    #[test]
    fn test_dial_code_in_text() {
        let catalog = CountryCatalog::builtin().unwrap();
        assert_eq!(catalog.dial_code_in_text("+33 6 12 34 56 78"), Some("33"));
        assert_eq!(catalog.dial_code_in_text("+1 415-555-2671"), Some("1"));
        assert_eq!(catalog.dial_code_in_text("+380 44 123 4567"), Some("380"));
        assert_eq!(catalog.dial_code_in_text("06 12 34 56 78"), None);
    }

    #[test]
    fn test_country_for_number_uses_area_codes_and_priority() {
        let catalog = CountryCatalog::builtin().unwrap();
        let canada = catalog.country_for_number("+1 604 555 0100").unwrap();
        assert_eq!(canada.code, "ca");
        let us = catalog.country_for_number("+1 415 555 2671").unwrap();
        assert_eq!(us.code, "us");
        let gb = catalog.country_for_number("+44 20 7946 0000").unwrap();
        assert_eq!(gb.code, "gb");
        assert!(catalog.country_for_number("4155552671").is_none());
    }

    #[test]
    fn test_filter() {
        let catalog = CountryCatalog::builtin().unwrap();
        let names: Vec<_> = catalog
            .filter("reunion")
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["Réunion"]);

        let by_code: Vec<_> = catalog.filter("fr").into_iter().map(|c| c.code.clone()).collect();
        assert!(by_code.contains(&code("fr")));

        let by_dial: Vec<_> = catalog.filter("+44").into_iter().map(|c| c.code.clone()).collect();
        assert!(by_dial.contains(&code("gb")));
        assert!(by_dial.contains(&code("je")));

        assert_eq!(catalog.filter("").len(), catalog.len());
    }

    #[test]
    fn test_custom_dataset() {
        let json = r#"[
            {"name": "Testland", "iso2": "TL", "dialCode": "999", "priority": 0, "areaCodes": null},
            {"name": "Otherland", "iso2": "ol", "dialCode": "998"}
        ]"#;
        let catalog = CountryCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.dial_code_of(&code("tl")), "999");
        assert!(catalog.lookup(&code("us")).is_none());

        let mut catalog = CountryCatalog::builtin().unwrap();
        let replacement = CountryCatalog::from_json(json).unwrap().all().to_vec();
        catalog.set_dataset(replacement).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_dataset_errors() {
        let duplicate = r#"[
            {"name": "A", "iso2": "aa", "dialCode": "1"},
            {"name": "B", "iso2": "AA", "dialCode": "2"}
        ]"#;
        assert_eq!(
            CountryCatalog::from_json(duplicate).unwrap_err(),
            PhoneInputError::DuplicateCountry("aa".to_string())
        );

        let bad_code = r#"[{"name": "A", "iso2": "abc", "dialCode": "1"}]"#;
        assert!(matches!(
            CountryCatalog::from_json(bad_code),
            Err(PhoneInputError::Dataset(_))
        ));

        let missing = CountryCatalog::from_path(Path::new("/nonexistent/countries.json"));
        assert!(matches!(missing, Err(PhoneInputError::Dataset(_))));
    }
}
