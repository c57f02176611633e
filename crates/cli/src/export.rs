//! `roster export` - write the member directory as CSV.
//!
//! The first nine columns use the roster headers, so the file can be fed
//! back into `roster import` (with the default column mapping).

use std::path::PathBuf;

use rostersync_io::csv::export_members;

use crate::import::{load_config, open_existing, resolve_db};
use crate::CliError;

pub fn cmd_export(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    output: PathBuf,
    delimiter: char,
    active_only: bool,
) -> Result<(), CliError> {
    if !delimiter.is_ascii() {
        return Err(CliError::usage(format!(
            "delimiter must be a single ASCII character, got '{delimiter}'"
        )));
    }

    let loaded = load_config(config_path.as_deref())?;
    let store = open_existing(&resolve_db(db, &loaded))?;

    let records = store
        .list(!active_only)
        .map_err(|e| CliError::store(e.to_string()))?;

    export_members(&records, &output, delimiter as u8).map_err(CliError::io)?;

    eprintln!("wrote {} member(s) to {}", records.len(), output.display());
    Ok(())
}
