use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::config::ImportConfig;
use crate::error::ReconError;
use crate::model::{
    AccountType, AuditFinding, ImportMeta, ImportResult, ImportSummary, MemberRecord, RosterRow,
};
use crate::policy::{apply_policy, Field, REQUIRED_FIELDS};
use crate::sanitize::{fallback_email, is_numeric_id, is_valid_email, DEFAULT_EMAIL_DOMAIN};
use crate::sink::MessageSink;
use crate::store::{MemberStore, UniqueField};

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub account_type: String,
    /// Do every read and emit every message, but never write to the store.
    pub dry_run: bool,
    /// Domain for synthesized addresses.
    pub email_domain: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            account_type: AccountType::Student.to_string(),
            dry_run: false,
            email_domain: DEFAULT_EMAIL_DOMAIN.into(),
        }
    }
}

impl ImportOptions {
    pub fn from_config(config: &ImportConfig, dry_run: bool) -> Self {
        Self {
            account_type: config.account_type.clone(),
            dry_run,
            email_domain: config.email_domain.clone(),
        }
    }
}

/// Reconcile `rows` against `store`. Returns counts, deactivated ids and
/// audit findings; every outcome is also reported to `sink` in order.
///
/// Only a store failure or an unsanitizable name aborts the run. Writes
/// already made stay in place.
pub fn run(
    store: &mut dyn MemberStore,
    rows: &[RosterRow],
    options: &ImportOptions,
    sink: &mut dyn MessageSink,
) -> Result<ImportResult, ReconError> {
    let mut result = ImportResult {
        meta: ImportMeta {
            account_type: options.account_type.clone(),
            dry_run: options.dry_run,
            processed: false,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary: ImportSummary::default(),
        deactivated: Vec::new(),
        findings: Vec::new(),
    };

    if options.dry_run {
        sink.add_info_message("Run import in dry-run mode.".into());
    }

    let account_type = match options.account_type.parse::<AccountType>() {
        Ok(AccountType::Student) => AccountType::Student,
        _ => {
            sink.add_error_message(format!(
                "Account type \"{}\" is not supported yet.",
                options.account_type
            ));
            return Ok(result);
        }
    };
    result.meta.processed = true;

    let mut pass = Pass {
        store,
        sink,
        options,
        account_type,
        now: chrono::Utc::now().timestamp(),
        summary: ImportSummary::default(),
        seen: BTreeSet::new(),
    };

    for row in rows {
        pass.process_row(row)?;
    }

    result.deactivated = pass.deactivate_unseen()?;

    let Pass { store, sink, summary, .. } = pass;
    result.summary = summary;
    result.findings = audit(&*store, sink)?;
    result.summary.audit_errors = result.findings.len();

    sink.add_info_message(result.summary.to_string());

    Ok(result)
}

/// Mutable state of one reconciliation pass.
struct Pass<'a> {
    store: &'a mut dyn MemberStore,
    sink: &'a mut dyn MessageSink,
    options: &'a ImportOptions,
    account_type: AccountType,
    now: i64,
    summary: ImportSummary,
    seen: BTreeSet<String>,
}

impl Pass<'_> {
    fn process_row(&mut self, row: &RosterRow) -> Result<(), ReconError> {
        if row.account_type != self.account_type.as_str() {
            return Ok(());
        }

        if !is_numeric_id(&row.student_id) {
            debug!("line {}: rejected studentId {:?}", row.line, row.student_id);
            self.summary.rejected += 1;
            self.sink.add_error_message(format!(
                "Invalid student id found for \"{}\"!",
                row.label()
            ));
            return Ok(());
        }

        self.summary.rows += 1;

        match self.store.find_by_student_id(&row.student_id)? {
            Some(existing) => self.update(existing, row)?,
            None => self.insert(row)?,
        }

        self.seen.insert(row.student_id.clone());
        Ok(())
    }

    fn update(&mut self, mut record: MemberRecord, row: &RosterRow) -> Result<(), ReconError> {
        let mut changed = apply_policy(&mut record, row);

        let revived = record.disable;
        if revived {
            record.disable = false;
            changed = true;
        }

        if !changed {
            debug!("line {}: studentId {} unchanged", row.line, row.student_id);
            return Ok(());
        }

        self.summary.updates += 1;
        record.tstamp = self.now;

        let suffix = if revived { " (reactivated)" } else { "" };
        self.sink.add_info_message(format!(
            "Update student \"{} [{}]\"{suffix}",
            record.name, record.email
        ));

        if !self.options.dry_run {
            self.store.save(&record)?;
        }
        Ok(())
    }

    fn insert(&mut self, row: &RosterRow) -> Result<(), ReconError> {
        let mut record = MemberRecord::new(self.account_type);
        record.student_id = row.student_id.clone();
        record.teacher_acronym = row.teacher_acronym.clone();
        record.firstname = row.firstname.clone();
        record.lastname = row.lastname.clone();
        record.refresh_name();
        record.email = row.email.clone();
        record.ahv = row.ahv.clone();
        record.notice = row.notice.clone();
        record.initial_password = row.initial_password.clone();
        record.date_added = self.now;
        record.tstamp = self.now;

        if record.email.is_empty() {
            record.email =
                fallback_email(&row.firstname, &row.lastname, &self.options.email_domain)?;
        }

        self.summary.inserts += 1;

        if !self.options.dry_run {
            let id = self.store.insert(&mut record)?;
            debug!("line {}: inserted studentId {} as id {id}", row.line, row.student_id);
        }

        self.sink.add_info_message(format!(
            "Add new student \"{} [{}]\". Check data (e.g. email address)!",
            record.name, record.email
        ));
        Ok(())
    }

    /// Mark every still-active record of the target type that no row
    /// mentioned. Nothing happens when no row was seen at all.
    fn deactivate_unseen(&mut self) -> Result<Vec<String>, ReconError> {
        if self.seen.is_empty() {
            debug!("no {} rows seen, skipping deactivation", self.account_type);
            return Ok(Vec::new());
        }

        let mut deactivated = Vec::new();
        for mut record in self.store.find_unseen(self.account_type, &self.seen)? {
            if !record.is_active() {
                continue;
            }

            record.disable = true;
            record.tstamp = self.now;
            if !self.options.dry_run {
                self.store.save(&record)?;
            }

            self.summary.deactivated += 1;
            self.sink.add_info_message(format!(
                "Deactivate student \"{} {}\"",
                record.firstname, record.lastname
            ));
            deactivated.push(record.student_id);
        }
        Ok(deactivated)
    }
}

/// Uniqueness and syntax checks over the whole store. Read-only; every
/// finding is also reported to `sink` as an error.
pub fn audit(
    store: &dyn MemberStore,
    sink: &mut dyn MessageSink,
) -> Result<Vec<AuditFinding>, ReconError> {
    let mut findings = Vec::new();

    for record in store.all_ordered_by_email()? {
        if !record.email.is_empty() {
            if !store.is_unique(UniqueField::Email, &record.email, record.id)? {
                findings.push(AuditFinding::DuplicateEmail {
                    id: record.id,
                    email: record.email.clone(),
                });
            }
            if !is_valid_email(&record.email) {
                findings.push(AuditFinding::InvalidEmail {
                    id: record.id,
                    email: record.email.clone(),
                });
            }
        }

        if record.has_student_id()
            && !store.is_unique(UniqueField::StudentId, &record.student_id, record.id)?
        {
            findings.push(AuditFinding::DuplicateStudentId {
                id: record.id,
                student_id: record.student_id.clone(),
                name: format!("{} {}", record.firstname, record.lastname),
            });
        }
    }

    for finding in &findings {
        sink.add_error_message(finding.to_string());
    }

    Ok(findings)
}

/// Parse roster CSV text into rows, resolving headers through the config's
/// column mapping. Values are trimmed; short rows read as empty cells.
pub fn load_roster(csv_data: &str, config: &ImportConfig) -> Result<Vec<RosterRow>, ReconError> {
    let csv_data = csv_data.strip_prefix('\u{FEFF}').unwrap_or(csv_data);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter_byte()?)
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Csv {
            line: 1,
            message: e.to_string(),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut index: HashMap<Field, usize> = HashMap::new();
    for field in REQUIRED_FIELDS {
        let header = config.header_for(field);
        let idx = headers
            .iter()
            .position(|h| h == header)
            .ok_or_else(|| ReconError::MissingColumn {
                column: field.column().into(),
                header: header.into(),
            })?;
        index.insert(field, idx);
    }

    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Csv {
            line: e.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;

        let get = |field: Field| -> String {
            record
                .get(index[&field])
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        rows.push(RosterRow {
            line: record.position().map(|p| p.line()).unwrap_or(0),
            account_type: get(Field::AccountType),
            student_id: get(Field::StudentId),
            teacher_acronym: get(Field::TeacherAcronym),
            firstname: get(Field::Firstname),
            lastname: get(Field::Lastname),
            email: get(Field::Email),
            ahv: get(Field::Ahv),
            notice: get(Field::Notice),
            initial_password: get(Field::InitialPassword),
        });
    }

    Ok(rows)
}
