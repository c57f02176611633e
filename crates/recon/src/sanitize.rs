//! Name sanitizing for synthetic e-mail addresses, plus the two syntax checks
//! the reconciler relies on (numeric student ids, e-mail addresses).

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::ReconError;

pub const DEFAULT_EMAIL_DOMAIN: &str = "stud.schule-ettiswil.ch";

/// Applied in order, after control characters are gone and before
/// lowercasing.
const TRANSLITERATION: &[(&str, &str)] = &[
    ("Ö", "OE"),
    ("Ä", "AE"),
    ("Ü", "UE"),
    ("É", "E"),
    ("È", "E"),
    ("À", "A"),
    ("Ç", "C"),
    ("ö", "oe"),
    ("ä", "ae"),
    ("ü", "ue"),
    ("é", "e"),
    ("è", "e"),
    ("à", "a"),
    ("ç", "c"),
    ("´`", ""),
    ("´", ""),
    ("`", ""),
];

static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.!#$%&'*+/=?^`{|}~-]+@([\w-]+\.)+[\w-]{2,}$").unwrap()
});

/// Unicode general category C: control, format, surrogate, private use
/// and unassigned code points.
static OTHER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{C}").unwrap());

/// Turn a person's name into a lowercase e-mail local part.
///
/// Fails when a non-empty name collapses to nothing, since no usable
/// address can be derived from it.
pub fn sanitize_name(name: &str) -> Result<String, ReconError> {
    let trimmed = name.trim();

    // Compose first so "o\u{308}" hits the table the same way "ö" does.
    let composed: String = trimmed.nfc().collect();
    let mut out = OTHER.replace_all(&composed, "").into_owned();

    for (from, to) in TRANSLITERATION {
        out = out.replace(from, to);
    }

    let out = out.to_lowercase().trim().to_string();

    if out.is_empty() && !trimmed.is_empty() {
        return Err(ReconError::Sanitize {
            value: name.to_string(),
        });
    }

    Ok(out)
}

/// `"{first}_{last}@{domain}"` with both name parts sanitized.
pub fn fallback_email(firstname: &str, lastname: &str, domain: &str) -> Result<String, ReconError> {
    let first = sanitize_name(firstname)?;
    let last = sanitize_name(lastname)?;
    Ok(format!("{first}_{last}@{domain}"))
}

/// Numeric string check for student ids: optional sign, digits, optional
/// fraction, optional exponent.
pub fn is_numeric_id(value: &str) -> bool {
    NUMERIC.is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL.is_match(value)
}
