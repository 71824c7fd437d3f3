//! Store configuration

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use optistore_core::{DEFAULT_IDENTIFIER_FIELD, TEMP_ID_FIELD};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Serializable store settings.
///
/// Collaborators (action bus, routing function, temporary id source) are
/// code, not configuration, and are supplied through
/// [`StoreBuilder`](crate::StoreBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Field holding a record's permanent identifier.
    pub identifier_field: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_owned(),
        }
    }
}

impl StoreConfig {
    /// Configuration keyed on a custom identifier field.
    #[must_use]
    pub fn with_identifier_field(field: impl Into<String>) -> Self {
        Self {
            identifier_field: field.into(),
        }
    }

    /// Parse and validate TOML text.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or fails validation.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("failed to parse store configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the identifier field is usable.
    ///
    /// # Errors
    /// Returns [`StoreError::Config`] for a blank field name or one that
    /// collides with the temporary identifier field.
    pub fn validate(&self) -> std::result::Result<(), StoreError> {
        let field = self.identifier_field.trim();
        if field.is_empty() {
            return Err(StoreError::config("identifier_field must not be empty"));
        }
        if field == TEMP_ID_FIELD {
            return Err(StoreError::config(format!(
                "identifier_field must not be `{TEMP_ID_FIELD}`, which holds temporary identifiers"
            )));
        }
        Ok(())
    }
}
