// Roster CLI - reconcile school roster exports with the member directory

mod exit_codes;
mod export;
mod import;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_IO, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Sync roster exports into the member directory")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a roster file: update, insert and deactivate members, then audit
    #[command(after_help = "\
Exit code 3 (with --strict) means the import ran but left data-quality \
findings: rejected student ids or duplicate/invalid addresses.

Examples:
  roster import students.csv
  roster import students.csv --config import.toml
  roster import students.csv --dry-run --json
  roster import export.csv --delimiter auto --encoding windows-1252
  roster import students.csv --db /srv/members.db --strict --output report.json")]
    Import {
        /// Roster file (CSV with header row)
        file: PathBuf,

        /// Import config (TOML); paths inside are relative to it
        #[arg(long, short = 'c', env = "ROSTER_CONFIG")]
        config: Option<PathBuf>,

        /// Account type to import (only "student" is supported)
        #[arg(long)]
        account_type: Option<String>,

        /// Field delimiter: one character, or "auto" to detect
        #[arg(long)]
        delimiter: Option<String>,

        /// Roster encoding label (utf-8, windows-1252, ...)
        #[arg(long)]
        encoding: Option<String>,

        /// Member database (SQLite)
        #[arg(long, env = "ROSTER_DB")]
        db: Option<PathBuf>,

        /// Domain for synthesized e-mail addresses
        #[arg(long)]
        email_domain: Option<String>,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,

        /// Output JSON report to stdout
        #[arg(long)]
        json: bool,

        /// Write JSON report to file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Exit 3 when rows were rejected or the audit found problems
        #[arg(long)]
        strict: bool,
    },

    /// Run the directory audit (duplicate and invalid addresses, duplicate ids)
    #[command(after_help = "\
Examples:
  roster audit --db members.db
  roster audit --config import.toml --json
  roster audit --strict")]
    Audit {
        /// Import config (TOML), used to locate the database
        #[arg(long, short = 'c', env = "ROSTER_CONFIG")]
        config: Option<PathBuf>,

        /// Member database (SQLite)
        #[arg(long, env = "ROSTER_DB")]
        db: Option<PathBuf>,

        /// Output findings as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Exit 3 when the audit found problems
        #[arg(long)]
        strict: bool,
    },

    /// Validate an import config without running
    #[command(after_help = "\
Examples:
  roster validate import.toml")]
    Validate {
        /// Path to the import.toml
        config: PathBuf,
    },

    /// Write the member directory as CSV (re-importable)
    #[command(after_help = "\
Examples:
  roster export -o members.csv
  roster export --db members.db -o active.csv --active-only
  roster export --config import.toml -o members.csv --delimiter ,")]
    Export {
        /// Import config (TOML), used to locate the database
        #[arg(long, short = 'c', env = "ROSTER_CONFIG")]
        config: Option<PathBuf>,

        /// Member database (SQLite)
        #[arg(long, env = "ROSTER_DB")]
        db: Option<PathBuf>,

        /// Output CSV file
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Field delimiter
        #[arg(long, default_value = ";")]
        delimiter: char,

        /// Skip deactivated members
        #[arg(long)]
        active_only: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\nengine:  rostersync-recon ", env!("CARGO_PKG_VERSION"),
        "\nstore:   sqlite (schema v1)",
    )
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Import {
            file,
            config,
            account_type,
            delimiter,
            encoding,
            db,
            email_domain,
            dry_run,
            json,
            output,
            strict,
        } => import::cmd_import(import::ImportArgs {
            file,
            config,
            overrides: import::Overrides {
                account_type,
                delimiter,
                encoding,
                email_domain,
            },
            db,
            dry_run,
            json,
            output,
            strict,
        }),
        Commands::Audit { config, db, json, strict } => import::cmd_audit(config, db, json, strict),
        Commands::Validate { config } => import::cmd_validate(config),
        Commands::Export { config, db, output, delimiter, active_only } => {
            export::cmd_export(config, db, output, delimiter, active_only)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INVALID_CONFIG, msg)
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::new(EXIT_STORE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Engine error with its registered exit code and a hint where one helps.
    pub fn recon(err: rostersync_recon::ReconError) -> Self {
        use rostersync_recon::ReconError;

        let hint = match &err {
            ReconError::MissingColumn { .. } => {
                Some("check the header row, the delimiter, or [columns] in the config".to_string())
            }
            ReconError::Sanitize { .. } => {
                Some("fix the name in the roster or give the row an email address".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
