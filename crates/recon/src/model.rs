use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Account type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Student,
    Teacher,
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "teacher" => Ok(Self::Teacher),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown account type \"{other}\"")),
        }
    }
}

// ---------------------------------------------------------------------------
// Stored record
// ---------------------------------------------------------------------------

/// One entry of the member directory.
///
/// `id` is `None` until the store has assigned one. Timestamps are unix
/// seconds; `0` means "never set".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub id: Option<i64>,
    pub student_id: String,
    pub account_type: AccountType,
    pub firstname: String,
    pub lastname: String,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub initial_password: String,
    pub teacher_acronym: String,
    pub ahv: String,
    pub notice: String,
    pub disable: bool,
    pub date_added: i64,
    pub tstamp: i64,
}

impl MemberRecord {
    /// A blank, unsaved record of the given type.
    pub fn new(account_type: AccountType) -> Self {
        Self {
            id: None,
            student_id: String::new(),
            account_type,
            firstname: String::new(),
            lastname: String::new(),
            name: String::new(),
            email: String::new(),
            username: None,
            initial_password: String::new(),
            teacher_acronym: String::new(),
            ahv: String::new(),
            notice: String::new(),
            disable: false,
            date_added: 0,
            tstamp: 0,
        }
    }

    /// Recompute the display name from first and last name.
    pub fn refresh_name(&mut self) {
        self.name = format!("{} {}", self.firstname, self.lastname);
    }

    pub fn is_active(&self) -> bool {
        !self.disable
    }

    /// `studentId` values of `""` and `"0"` mean "no external id".
    pub fn has_student_id(&self) -> bool {
        !self.student_id.is_empty() && self.student_id != "0"
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single roster row with every value already trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterRow {
    /// 1-based line number in the source file (header = line 1).
    pub line: u64,
    pub account_type: String,
    pub student_id: String,
    pub teacher_acronym: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub ahv: String,
    pub notice: String,
    pub initial_password: String,
}

impl RosterRow {
    /// `"Anna Muster [anna@example.org]"`, used in every row-level message.
    pub fn label(&self) -> String {
        format!("{} {} [{}]", self.firstname, self.lastname, self.email)
    }
}

// ---------------------------------------------------------------------------
// Audit findings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    DuplicateEmail { id: Option<i64>, email: String },
    InvalidEmail { id: Option<i64>, email: String },
    DuplicateStudentId {
        id: Option<i64>,
        student_id: String,
        name: String,
    },
}

impl std::fmt::Display for AuditFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEmail { email, .. } => {
                write!(f, "Email address \"{email}\" is not unique!")
            }
            Self::InvalidEmail { email, .. } => write!(f, "Invalid email address \"{email}\"!"),
            Self::DuplicateStudentId { student_id, name, .. } => {
                write!(f, "studentId \"{student_id}\" for \"{name}\" is not unique!")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Target-type rows with a valid student id.
    pub rows: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deactivated: usize,
    pub rejected: usize,
    pub audit_errors: usize,
}

impl std::fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Import finished. Traversed {} rows: {} inserts, {} updates, {} deactivated.",
            self.rows, self.inserts, self.updates, self.deactivated
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportMeta {
    pub account_type: String,
    pub dry_run: bool,
    /// False when the account type is unsupported and nothing ran.
    pub processed: bool,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub meta: ImportMeta,
    pub summary: ImportSummary,
    /// Student ids deactivated in this run, in store order.
    pub deactivated: Vec<String>,
    pub findings: Vec<AuditFinding>,
}
