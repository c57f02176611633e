use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ReconError;
use crate::policy::{Field, REQUIRED_FIELDS};
use crate::sanitize::DEFAULT_EMAIL_DOMAIN;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Import settings, usually read from an `import.toml`. Every key is
/// optional; CLI flags override what is set here.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    #[serde(default = "default_account_type")]
    pub account_type: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_email_domain")]
    pub email_domain: String,
    /// SQLite database path, relative to the config file.
    #[serde(default)]
    pub database: Option<String>,
    /// Logical column name -> header in the roster file.
    #[serde(default)]
    pub columns: HashMap<String, String>,
}

fn default_account_type() -> String {
    "student".into()
}

fn default_delimiter() -> String {
    ";".into()
}

fn default_encoding() -> String {
    "utf-8".into()
}

fn default_email_domain() -> String {
    DEFAULT_EMAIL_DOMAIN.into()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            account_type: default_account_type(),
            delimiter: default_delimiter(),
            encoding: default_encoding(),
            email_domain: default_email_domain(),
            database: None,
            columns: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ImportConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ImportConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !self.delimiter_is_auto() {
            self.delimiter_byte()?;
        }

        if self.email_domain.trim().is_empty() || self.email_domain.contains('@') {
            return Err(ReconError::ConfigValidation(format!(
                "email_domain must be a bare domain, got \"{}\"",
                self.email_domain
            )));
        }

        for logical in self.columns.keys() {
            if !REQUIRED_FIELDS.iter().any(|f| f.column() == logical) {
                return Err(ReconError::ConfigValidation(format!(
                    "unknown column \"{logical}\" in [columns]"
                )));
            }
        }

        // Encoding labels are resolved by the IO layer; only reject the
        // obviously empty case here.
        if self.encoding.trim().is_empty() {
            return Err(ReconError::ConfigValidation("encoding must not be empty".into()));
        }

        Ok(())
    }

    /// The delimiter as the single byte the CSV reader wants.
    /// `delimiter = "auto"` leaves detection to the loader's caller.
    pub fn delimiter_is_auto(&self) -> bool {
        self.delimiter.eq_ignore_ascii_case("auto")
    }

    pub fn delimiter_byte(&self) -> Result<u8, ReconError> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(ReconError::ConfigValidation(format!(
                "delimiter must be a single ASCII character, got \"{}\"",
                self.delimiter
            ))),
        }
    }

    /// Header name to look for in the roster file.
    pub fn header_for(&self, field: Field) -> &str {
        self.columns
            .get(field.column())
            .map(String::as_str)
            .unwrap_or_else(|| field.column())
    }

    /// Header names the roster must carry, in column order.
    pub fn expected_headers(&self) -> Vec<&str> {
        REQUIRED_FIELDS.iter().map(|f| self.header_for(*f)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
