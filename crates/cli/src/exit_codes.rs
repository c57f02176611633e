//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: nightly import jobs rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | Usage error (bad args, unsupported account type)          |
//! | 3    | Data-quality findings with `--strict`                     |
//! | 4    | I/O error (unreadable roster, malformed CSV, missing db)  |
//! | 5    | Invalid config                                            |
//! | 6    | Member store failure                                      |
//! | 7    | A name could not be sanitized into an e-mail address      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use rostersync_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Import (3-7)
// =============================================================================

/// Audit findings or rejected rows, only when `--strict` is set.
pub const EXIT_DATA_QUALITY: u8 = 3;

/// Roster or database file unreadable, or roster not parseable as CSV.
pub const EXIT_IO: u8 = 4;

/// Config file does not parse or fails validation.
pub const EXIT_INVALID_CONFIG: u8 = 5;

/// The member store rejected a read or write.
pub const EXIT_STORE: u8 = 6;

/// A non-empty name sanitized to nothing; the run was aborted.
pub const EXIT_SANITIZE: u8 = 7;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        ReconError::MissingColumn { .. } | ReconError::Csv { .. } => EXIT_IO,
        ReconError::Store(_) => EXIT_STORE,
        ReconError::Sanitize { .. } => EXIT_SANITIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rostersync_recon::StoreError;

    #[test]
    fn every_engine_error_has_its_own_code() {
        let cases = [
            (ReconError::ConfigParse("x".into()), EXIT_INVALID_CONFIG),
            (ReconError::ConfigValidation("x".into()), EXIT_INVALID_CONFIG),
            (
                ReconError::MissingColumn { column: "studentId".into(), header: "Nr".into() },
                EXIT_IO,
            ),
            (ReconError::Csv { line: 3, message: "x".into() }, EXIT_IO),
            (ReconError::Store(StoreError::UnknownId(1)), EXIT_STORE),
            (ReconError::Sanitize { value: "\u{200B}".into() }, EXIT_SANITIZE),
        ];
        for (err, code) in cases {
            assert_eq!(recon_exit_code(&err), code, "{err}");
        }
    }
}
