use std::fmt;

use crate::store::StoreError;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad delimiter, unknown encoding, etc.).
    ConfigValidation(String),
    /// Missing required column in the roster header.
    MissingColumn { column: String, header: String },
    /// Malformed CSV record.
    Csv { line: u64, message: String },
    /// A name could not be turned into an e-mail local part.
    Sanitize { value: String },
    /// Record store failure.
    Store(StoreError),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { column, header } => {
                write!(f, "missing column '{column}' (expected header '{header}')")
            }
            Self::Csv { line, message } => write!(f, "CSV error on line {line}: {message}"),
            Self::Sanitize { value } => {
                write!(f, "the name \"{value}\" could not be sanitized")
            }
            Self::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ReconError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
