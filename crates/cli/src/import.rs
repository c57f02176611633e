//! `roster import`, `roster audit`, `roster validate`.

use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use rostersync_io::csv::{read_file_with_encoding, resolve_encoding, sniff_delimiter};
use rostersync_io::SqliteStore;
use rostersync_recon::sink::Level;
use rostersync_recon::{
    AuditFinding, ImportConfig, ImportOptions, ImportResult, MessageLog, MessageSink,
};

use crate::exit_codes::{EXIT_DATA_QUALITY, EXIT_USAGE};
use crate::CliError;

/// Used when neither `--db` nor the config names a database.
pub const DEFAULT_DB: &str = "members.db";

// ---------------------------------------------------------------------------
// Config + database resolution (shared with export)
// ---------------------------------------------------------------------------

pub struct LoadedConfig {
    pub config: ImportConfig,
    /// Directory of the config file; relative paths inside resolve against it.
    pub base_dir: Option<PathBuf>,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, CliError> {
    let Some(path) = path else {
        return Ok(LoadedConfig { config: ImportConfig::default(), base_dir: None });
    };

    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    let config = ImportConfig::from_toml(&config_str).map_err(CliError::recon)?;
    resolve_encoding(&config.encoding).map_err(CliError::config)?;
    info!("loaded config {}", path.display());

    Ok(LoadedConfig {
        config,
        base_dir: path.parent().map(Path::to_path_buf),
    })
}

pub fn resolve_db(flag: Option<PathBuf>, loaded: &LoadedConfig) -> PathBuf {
    if let Some(db) = flag {
        return db;
    }
    match (&loaded.config.database, &loaded.base_dir) {
        (Some(db), Some(base)) => base.join(db),
        (Some(db), None) => PathBuf::from(db),
        (None, _) => PathBuf::from(DEFAULT_DB),
    }
}

/// Open a database that must already exist, read-only (audit, export).
pub fn open_existing(path: &Path) -> Result<SqliteStore, CliError> {
    if !path.exists() {
        return Err(CliError::io(format!("database not found: {}", path.display()))
            .with_hint("run `roster import` first, or pass --db"));
    }
    SqliteStore::open_read_only(path).map_err(|e| CliError::store(e.to_string()))
}

// ---------------------------------------------------------------------------
// Message trail on stderr
// ---------------------------------------------------------------------------

/// Prints each message as it arrives and keeps the trail for the report.
struct TrailSink {
    log: MessageLog,
}

impl TrailSink {
    fn new() -> Self {
        Self { log: MessageLog::new() }
    }

    fn echo(level: Level, text: &str) {
        eprintln!("{level}: {text}");
    }
}

impl MessageSink for TrailSink {
    fn add_info_message(&mut self, text: String) {
        Self::echo(Level::Info, &text);
        self.log.add_info_message(text);
    }

    fn add_error_message(&mut self, text: String) {
        Self::echo(Level::Error, &text);
        self.log.add_error_message(text);
    }
}

fn write_report<T: Serialize>(
    report: &T,
    json_output: bool,
    output_file: Option<&Path>,
) -> Result<(), CliError> {
    if !json_output && output_file.is_none() {
        return Ok(());
    }

    let json_str = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

    if let Some(path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// import
// ---------------------------------------------------------------------------

/// Flags that override the config file.
pub struct Overrides {
    pub account_type: Option<String>,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
    pub email_domain: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut ImportConfig) -> Result<(), CliError> {
        if let Some(v) = self.account_type {
            config.account_type = v;
        }
        if let Some(v) = self.delimiter {
            config.delimiter = v;
        }
        if let Some(v) = self.encoding {
            config.encoding = v;
        }
        if let Some(v) = self.email_domain {
            config.email_domain = v;
        }
        config.validate().map_err(|e| CliError::usage(e.to_string()))?;
        resolve_encoding(&config.encoding).map_err(CliError::usage)?;
        Ok(())
    }
}

pub struct ImportArgs {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
    pub db: Option<PathBuf>,
    pub dry_run: bool,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub strict: bool,
}

#[derive(Serialize)]
struct ImportReport<'a> {
    #[serde(flatten)]
    result: &'a ImportResult,
    messages: &'a MessageLog,
}

pub fn cmd_import(args: ImportArgs) -> Result<(), CliError> {
    let mut loaded = load_config(args.config.as_deref())?;
    args.overrides.apply(&mut loaded.config)?;
    let db_path = resolve_db(args.db, &loaded);
    let mut config = loaded.config;

    let content = read_file_with_encoding(&args.file, &config.encoding).map_err(CliError::io)?;

    if config.delimiter_is_auto() {
        let detected = sniff_delimiter(&content, &config.expected_headers());
        info!("detected delimiter {:?}", detected as char);
        config.delimiter = (detected as char).to_string();
    }

    let rows = rostersync_recon::load_roster(&content, &config).map_err(CliError::recon)?;
    info!("{}: {} data row(s)", args.file.display(), rows.len());

    // A dry run never creates or writes the database file.
    let mut store = if !args.dry_run {
        SqliteStore::open(&db_path)
    } else if db_path.exists() {
        SqliteStore::open_read_only(&db_path)
    } else {
        info!("{} does not exist; dry run against an empty directory", db_path.display());
        SqliteStore::open_in_memory()
    }
    .map_err(|e| CliError::store(e.to_string()))?;

    let options = ImportOptions::from_config(&config, args.dry_run);
    let mut sink = TrailSink::new();
    let result = rostersync_recon::run(&mut store, &rows, &options, &mut sink)
        .map_err(CliError::recon)?;

    write_report(
        &ImportReport { result: &result, messages: &sink.log },
        args.json,
        args.output.as_deref(),
    )?;

    if !result.meta.processed {
        // The trail already carries the error line.
        return Err(CliError {
            code: EXIT_USAGE,
            message: String::new(),
            hint: Some("only --account-type student can be imported".to_string()),
        });
    }

    if args.dry_run {
        eprintln!("dry run: nothing written to {}", db_path.display());
    }

    let s = &result.summary;
    info!("{} rejected row(s), {} audit finding(s)", s.rejected, s.audit_errors);
    if args.strict && (s.rejected > 0 || s.audit_errors > 0) {
        return Err(CliError::new(
            EXIT_DATA_QUALITY,
            format!("{} rejected row(s), {} audit finding(s)", s.rejected, s.audit_errors),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// audit
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AuditReport<'a> {
    members: usize,
    findings: &'a [AuditFinding],
    messages: &'a MessageLog,
}

pub fn cmd_audit(
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
    json_output: bool,
    strict: bool,
) -> Result<(), CliError> {
    let loaded = load_config(config_path.as_deref())?;
    let store = open_existing(&resolve_db(db, &loaded))?;
    let members = store.count().map_err(|e| CliError::store(e.to_string()))?;

    let mut sink = TrailSink::new();
    let findings = rostersync_recon::audit(&store, &mut sink).map_err(CliError::recon)?;

    write_report(
        &AuditReport { members, findings: &findings, messages: &sink.log },
        json_output,
        None,
    )?;

    eprintln!("audit: {} member(s), {} finding(s)", members, findings.len());

    if strict && !findings.is_empty() {
        return Err(CliError::new(
            EXIT_DATA_QUALITY,
            format!("{} audit finding(s)", findings.len()),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let loaded = load_config(Some(&config_path))?;
    let config = &loaded.config;

    eprintln!(
        "valid: account type '{}', delimiter '{}', encoding '{}', {} mapped column(s)",
        config.account_type,
        config.delimiter,
        config.encoding,
        config.columns.len(),
    );
    eprintln!("database: {}", resolve_db(None, &loaded).display());
    Ok(())
}
