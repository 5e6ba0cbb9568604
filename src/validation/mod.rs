//! Validation of submitted probe configuration text.

pub mod report;
pub mod suggest;

use std::fmt;

use serde::Serialize;

use crate::config::loader;
use crate::config::model::ProbeConfig;
use crate::error::ConfigError;

/// Ordered list of human-readable validation failures. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Creates an empty error list.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a message.
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    /// Returns true if no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the messages in the order they were found.
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Returns the messages, consuming the list.
    pub fn into_messages(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A configuration update submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct UpdateConfigCmd {
    /// Raw configuration text.
    pub yaml: String,
}

impl UpdateConfigCmd {
    /// Creates a new update command from raw text.
    pub fn new(yaml: impl Into<String>) -> Self {
        Self { yaml: yaml.into() }
    }

    /// Validates the text. Both checks always run.
    pub fn validate(&self) -> ValidationErrors {
        validate(&self.yaml)
    }

    /// Strictly parses the text into a typed configuration.
    pub fn parse_config(&self) -> Result<ProbeConfig, ConfigError> {
        parse_config(&self.yaml)
    }
}

/// Strictly parses configuration text, rejecting unknown fields at every level.
pub fn parse_config(text: &str) -> Result<ProbeConfig, ConfigError> {
    loader::parse_str(text)
}

/// Validates configuration text and returns every problem found.
pub fn validate(text: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if text.trim().is_empty() {
        errors.push("Yaml must not be blank");
    }

    if let Err(e) = parse_config(text) {
        let mut message = format!("Invalid config: {}", e);
        if let Some(hint) = suggest::suggestion_for(&e.to_string()) {
            message.push_str(&format!(" ({})", hint));
        }
        errors.push(message);
    }

    errors
}
