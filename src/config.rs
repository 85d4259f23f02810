use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::warn;

use crate::controller::ControllerOptions;
use crate::country::{CountryCatalog, CountryCode};
use crate::formatter::LibPhoneFormatter;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "phone-input";

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from; `None` when running on defaults.
    pub config_path: Option<PathBuf>,
    pub initial_country: CountryCode,
    pub auto_format: bool,
    pub disabled: bool,
    pub allow_zero_after_country_code: bool,
    /// Custom country dataset replacing the embedded one.
    pub countries_file: Option<PathBuf>,
    pub picker: PickerConfig,
    pub keys: Keys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            initial_country: CountryCode::default(),
            auto_format: true,
            disabled: false,
            allow_zero_after_country_code: true,
            countries_file: None,
            picker: PickerConfig::default(),
            keys: Keys::default(),
        }
    }
}

impl Config {
    pub fn controller_options(&self, initial_value: Option<String>) -> ControllerOptions {
        ControllerOptions {
            initial_country: self.initial_country.clone(),
            initial_value,
            disabled: self.disabled,
            auto_format: self.auto_format,
            preselect_initial_country: true,
        }
    }

    pub fn formatter(&self) -> LibPhoneFormatter {
        LibPhoneFormatter::new().allow_zero_after_country_code(self.allow_zero_after_country_code)
    }

    /// Catalog from `countries_file` when configured, the embedded one otherwise.
    pub fn catalog(&self) -> Result<CountryCatalog> {
        match &self.countries_file {
            Some(path) => CountryCatalog::from_path(path)
                .with_context(|| format!("failed to load countries from {}", path.display())),
            None => CountryCatalog::builtin().context("embedded country dataset is invalid"),
        }
    }
}

// =============================================================================
// Picker Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerConfig {
    pub confirm_text: String,
    pub cancel_text: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            confirm_text: "Confirm".to_string(),
            cancel_text: "Cancel".to_string(),
        }
    }
}

// =============================================================================
// Key Bindings
// =============================================================================

#[derive(Debug, Clone)]
pub struct Keys {
    /// Keys while the phone field has focus
    pub field: FieldKeys,
    /// Keys while the country picker is open
    pub picker: PickerKeys,
}

#[derive(Debug, Clone)]
pub struct FieldKeys {
    pub quit: Vec<String>,
    /// Equivalent of pressing the flag
    pub flag: Vec<String>,
    pub clear: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PickerKeys {
    pub cancel: Vec<String>,
    pub confirm: Vec<String>,
    pub next: Vec<String>,
    pub prev: Vec<String>,
    pub page_down: Vec<String>,
    pub page_up: Vec<String>,
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            field: FieldKeys::default(),
            picker: PickerKeys::default(),
        }
    }
}

impl Default for FieldKeys {
    fn default() -> Self {
        Self {
            quit: vec!["Escape".into()],
            flag: vec!["Tab".into(), "F2".into()],
            clear: vec!["F8".into()],
        }
    }
}

impl Default for PickerKeys {
    fn default() -> Self {
        Self {
            cancel: vec!["Escape".into()],
            confirm: vec!["Enter".into()],
            next: vec!["Down".into(), "Tab".into()],
            prev: vec!["Up".into(), "Backtab".into()],
            page_down: vec!["PageDown".into()],
            page_up: vec!["PageUp".into()],
        }
    }
}

/// Normalize a key binding string to a canonical form for collision detection.
/// Single characters preserve case; key names are case-insensitive.
fn normalize_binding(binding: &str) -> String {
    let trimmed = binding.trim();
    if trimmed.chars().count() == 1 {
        trimmed.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

fn check_context_collisions(bindings: &[(&str, &[String])], context_name: &str) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for (action_name, keys) in bindings {
        for key in *keys {
            let normalized = normalize_binding(key);
            if normalized.is_empty() {
                continue;
            }
            if let Some(existing_action) = seen.get(&normalized) {
                bail!(
                    "key binding collision in [keys.{}]: '{}' is bound to both '{}' and '{}'",
                    context_name,
                    key,
                    existing_action,
                    action_name
                );
            }
            seen.insert(normalized, action_name);
        }
    }

    Ok(())
}

fn validate_key_bindings(keys: &Keys) -> Result<()> {
    check_context_collisions(
        &[
            ("quit", &keys.field.quit),
            ("flag", &keys.field.flag),
            ("clear", &keys.field.clear),
        ],
        "field",
    )?;

    check_context_collisions(
        &[
            ("cancel", &keys.picker.cancel),
            ("confirm", &keys.picker.confirm),
            ("next", &keys.picker.next),
            ("prev", &keys.picker.prev),
            ("page_down", &keys.picker.page_down),
            ("page_up", &keys.picker.page_up),
        ],
        "picker",
    )?;

    Ok(())
}

// =============================================================================
// Loading
// =============================================================================

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from `explicit` or the default location. A missing
/// default file yields defaults; a missing explicit file is an error.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("configuration file not found at {}", path.display());
            }
            path.to_path_buf()
        }
        None => {
            let path = config_path()?;
            if !path.exists() {
                return Ok(Config::default());
            }
            path
        }
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;
    let mut config = parse(&raw).with_context(|| format!("invalid configuration in {}", path.display()))?;

    // Relative dataset paths are resolved against the config file.
    if let Some(file) = config.countries_file.take() {
        let resolved = if file.is_relative() {
            path.parent().map(|dir| dir.join(&file)).unwrap_or(file)
        } else {
            file
        };
        config.countries_file = Some(resolved);
    }
    config.config_path = Some(path);
    Ok(config)
}

/// Parse a TOML configuration document.
pub fn parse(raw: &str) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw).context("failed to parse configuration as TOML")?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .context("failed to deserialize configuration")?;

    let initial_country = match cfg_file.initial_country.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => CountryCode::parse(raw)
            .with_context(|| format!("`initial_country` is not an ISO code: {}", raw))?,
        _ => CountryCode::default(),
    };

    let keys: Keys = cfg_file.keys.into();
    validate_key_bindings(&keys)?;

    Ok(Config {
        config_path: None,
        initial_country,
        auto_format: cfg_file.auto_format,
        disabled: cfg_file.disabled,
        allow_zero_after_country_code: cfg_file.allow_zero_after_country_code,
        countries_file: cfg_file.countries_file.map(|path| expand_tilde(&path)),
        picker: cfg_file.picker.into(),
        keys,
    })
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from([
        "initial_country",
        "auto_format",
        "disabled",
        "allow_zero_after_country_code",
        "countries_file",
        "picker",
        "keys",
    ]);

    for key in table.keys() {
        if !known.contains(key.as_str()) {
            warn!("unknown configuration key `{}`", key);
        }
    }

    if let Some(picker) = table.get("picker") {
        warn_unknown_in_context(picker, "picker", &["confirm_text", "cancel_text"]);
    }

    if let Some(keys) = table.get("keys").and_then(|value| value.as_table()) {
        for (context, value) in keys {
            match context.as_str() {
                "field" => warn_unknown_in_context(value, "keys.field", &["quit", "flag", "clear"]),
                "picker" => warn_unknown_in_context(
                    value,
                    "keys.picker",
                    &["cancel", "confirm", "next", "prev", "page_down", "page_up"],
                ),
                other => warn!("unknown keys.* context `{}`", other),
            }
        }
    }
}

fn warn_unknown_in_context(value: &toml::Value, context: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            warn!("unknown {} entry `{}`", context, key);
        }
    }
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConfigFile {
    initial_country: Option<String>,
    auto_format: bool,
    disabled: bool,
    allow_zero_after_country_code: bool,
    countries_file: Option<PathBuf>,
    picker: PickerFile,
    keys: KeysFile,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            initial_country: None,
            auto_format: true,
            disabled: false,
            allow_zero_after_country_code: true,
            countries_file: None,
            picker: PickerFile::default(),
            keys: KeysFile::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PickerFile {
    confirm_text: String,
    cancel_text: String,
}

impl Default for PickerFile {
    fn default() -> Self {
        let defaults = PickerConfig::default();
        Self {
            confirm_text: defaults.confirm_text,
            cancel_text: defaults.cancel_text,
        }
    }
}

impl From<PickerFile> for PickerConfig {
    fn from(file: PickerFile) -> Self {
        let defaults = PickerConfig::default();
        Self {
            confirm_text: non_empty_or(file.confirm_text, defaults.confirm_text),
            cancel_text: non_empty_or(file.cancel_text, defaults.cancel_text),
        }
    }
}

fn non_empty_or(value: String, fallback: String) -> String {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    fn into_vec(self) -> Vec<String> {
        match self {
            KeyBinding::Single(s) => vec![s],
            KeyBinding::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct KeysFile {
    field: FieldKeysFile,
    picker: PickerKeysFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct FieldKeysFile {
    quit: KeyBinding,
    flag: KeyBinding,
    clear: KeyBinding,
}

impl Default for FieldKeysFile {
    fn default() -> Self {
        let defaults = FieldKeys::default();
        Self {
            quit: KeyBinding::Multiple(defaults.quit),
            flag: KeyBinding::Multiple(defaults.flag),
            clear: KeyBinding::Multiple(defaults.clear),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PickerKeysFile {
    cancel: KeyBinding,
    confirm: KeyBinding,
    next: KeyBinding,
    prev: KeyBinding,
    page_down: KeyBinding,
    page_up: KeyBinding,
}

impl Default for PickerKeysFile {
    fn default() -> Self {
        let defaults = PickerKeys::default();
        Self {
            cancel: KeyBinding::Multiple(defaults.cancel),
            confirm: KeyBinding::Multiple(defaults.confirm),
            next: KeyBinding::Multiple(defaults.next),
            prev: KeyBinding::Multiple(defaults.prev),
            page_down: KeyBinding::Multiple(defaults.page_down),
            page_up: KeyBinding::Multiple(defaults.page_up),
        }
    }
}

impl From<KeysFile> for Keys {
    fn from(file: KeysFile) -> Self {
        Self {
            field: FieldKeys {
                quit: file.field.quit.into_vec(),
                flag: file.field.flag.into_vec(),
                clear: file.field.clear.into_vec(),
            },
            picker: PickerKeys {
                cancel: file.picker.cancel.into_vec(),
                confirm: file.picker.confirm.into_vec(),
                next: file.picker.next.into_vec(),
                prev: file.picker.prev.into_vec(),
                page_down: file.picker.page_down.into_vec(),
                page_up: file.picker.page_up.into_vec(),
            },
        }
    }
}
