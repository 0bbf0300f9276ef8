//! Error types for ota-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ota-core
#[derive(Debug, Error)]
pub enum Error {
    /// No device was given, or it isn't a recognised device identifier
    #[error("invalid or missing device identifier: {0:?}")]
    InvalidDevice(Option<String>),

    /// The device needs a model to tell its variants apart, and none (or a bad one) was given
    #[error("device '{device}' needs a valid model identifier, got {model:?}")]
    InvalidModel {
        device: String,
        model: Option<String>,
    },

    /// No catalog was provided
    #[error("no catalog file or URL was provided")]
    NoCatalog,

    /// A URL was given that isn't a Mesu asset catalog
    #[error("'{0}' is not a mesu.apple.com asset catalog")]
    NotMesu(String),

    /// A build number for the Pallas query is malformed
    #[error("'{0}' is not a valid build number")]
    BadBuild(String),

    /// The device only publishes its updates through Pallas
    #[error("device '{0}' is only served through Pallas asset queries")]
    NeedsPallas(String),

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Property list error from the plist crate
    #[error("property list error in '{name}': {source}")]
    Plist {
        name: String,
        #[source]
        source: plist::Error,
    },

    /// The document parsed, but isn't shaped like an update catalog
    #[error("'{name}' is not an OTA update catalog: {message}")]
    MalformedCatalog { name: String, message: String },

    /// A catalog record lacks a field every package needs
    #[error("catalog record is missing required field '{field}'")]
    MalformedRecord { field: &'static str },

    /// Catalog retrieval failed
    #[error("failed to retrieve '{locator}': {message}")]
    Source { locator: String, message: String },

    /// A version string could not be parsed
    #[error("invalid version '{0}'")]
    InvalidVersion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short name of the input condition behind a validation error.
    ///
    /// Front ends use this to pick a user-facing message. Source errors and
    /// data anomalies have no condition name.
    pub fn condition(&self) -> Option<&'static str> {
        match self {
            Error::InvalidDevice(_) => Some("device"),
            Error::InvalidModel { .. } => Some("model"),
            Error::NoCatalog => Some("nofile"),
            Error::NotMesu(_) => Some("notmesu"),
            Error::BadBuild(_) => Some("badbuild"),
            Error::NeedsPallas(_) => Some("needspallas"),
            _ => None,
        }
    }
}
