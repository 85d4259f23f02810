//! International phone number input: a controller that keeps a selected
//! country and the displayed number consistent, a country picker bridge and
//! a terminal front end built on top of them.

pub mod bridge;
pub mod config;
pub mod controller;
pub mod country;
pub mod error;
pub mod formatter;
pub mod search;
pub mod ui;

pub use bridge::{FlagActivation, PickerSurface, SelectionBridge, TextEntrySurface};
pub use controller::{
    ControllerOptions, ControllerState, PhoneInputController, PhoneInputEvent, PickerEntry,
    SubscriptionId,
};
pub use country::{Country, CountryCatalog, CountryCode, Flag};
pub use error::{PhoneInputError, Result};
pub use formatter::{LibPhoneFormatter, NumberType, PhoneFormatter};
