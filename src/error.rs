//! Error type shared by the catalog and the input controller.

use thiserror::Error;

pub type Result<T, E = PhoneInputError> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhoneInputError {
    /// Country code is malformed or not present in the catalog.
    #[error("invalid country code: `{0}`")]
    InvalidCountryCode(String),

    /// A country dataset could not be read or decoded.
    #[error("invalid country dataset: {0}")]
    Dataset(String),

    /// The same ISO code appears twice in a dataset.
    #[error("duplicate country `{0}` in dataset")]
    DuplicateCountry(String),
}
