//! Error handling for the APIKit scaffolder.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! Structural problems found in an existing configuration document are not
//! propagated past [`crate::scaffold::Scaffolder::run`]; they are recorded as
//! [`ScaffoldError`] values in the returned plan instead.
//!
//! # Examples
//!
//! ```
//! use apikit_scaffolder_core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     Err(Error::structural("An APIKit configuration is mandatory"))
//! }
//!
//! assert!(might_fail().unwrap_err().is_structural());
//! ```

use serde::Serialize;
use thiserror::Error;

/// Result type for scaffolding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for scaffolding operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Template engine error
    #[error("Template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// The API specification could not be loaded or adapted
    #[error("API specification error: {0}")]
    Spec(String),

    /// An existing configuration document is structurally unusable
    #[error("Invalid configuration structure: {0}")]
    Structural(String),

    /// A collaborator called the engine with arguments it must never pass
    #[error("Contract violation: {0}")]
    Contract(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new API specification error
    pub fn spec<S: Into<String>>(msg: S) -> Self {
        Self::Spec(msg.into())
    }

    /// Create a new structural error
    pub fn structural<S: Into<String>>(msg: S) -> Self {
        Self::Structural(msg.into())
    }

    /// Create a new contract violation
    pub fn contract<S: Into<String>>(msg: S) -> Self {
        Self::Contract(msg.into())
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}

/// A failure that aborted reconciliation of a single configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaffoldError {
    /// Path of the configuration document that was abandoned
    pub file: String,
    /// Human readable reason
    pub message: String,
}

impl ScaffoldError {
    pub fn new(file: impl Into<String>, error: &Error) -> Self {
        Self {
            file: file.into(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for ScaffoldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold_error_display() {
        let err = Error::structural("An APIKit configuration is mandatory");
        let record = ScaffoldError::new("api.xml", &err);
        assert_eq!(
            record.to_string(),
            "api.xml: Invalid configuration structure: An APIKit configuration is mandatory"
        );
    }

    #[test]
    fn test_string_conversion_is_config_error() {
        let err: Error = "bad port".into();
        assert!(matches!(err, Error::Config(ref m) if m == "bad port"));
        assert!(!err.is_structural());
    }
}
