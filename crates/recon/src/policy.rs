//! Per-field write policy for the update path.
//!
//! The reconciler never decides field by field itself; it walks
//! [`UPDATE_POLICY`] and lets [`apply_policy`] do the writes.

use crate::model::{MemberRecord, RosterRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Overwrite with the incoming value unless it is empty.
    OverwriteIfPresent,
    /// Write only while the stored value is still empty.
    WriteOnce,
    /// Never written after creation.
    Never,
}

/// Feed-carried fields of a member record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    AccountType,
    StudentId,
    TeacherAcronym,
    Firstname,
    Lastname,
    Email,
    Ahv,
    Notice,
    InitialPassword,
}

impl Field {
    /// Logical column name in the roster file.
    pub fn column(&self) -> &'static str {
        match self {
            Self::AccountType => "accountType",
            Self::StudentId => "studentId",
            Self::TeacherAcronym => "teacherAcronym",
            Self::Firstname => "firstname",
            Self::Lastname => "lastname",
            Self::Email => "email",
            Self::Ahv => "ahv",
            Self::Notice => "notice",
            Self::InitialPassword => "initialPassword",
        }
    }

    pub fn incoming<'a>(&self, row: &'a RosterRow) -> &'a str {
        match self {
            Self::AccountType => &row.account_type,
            Self::StudentId => &row.student_id,
            Self::TeacherAcronym => &row.teacher_acronym,
            Self::Firstname => &row.firstname,
            Self::Lastname => &row.lastname,
            Self::Email => &row.email,
            Self::Ahv => &row.ahv,
            Self::Notice => &row.notice,
            Self::InitialPassword => &row.initial_password,
        }
    }

    /// Mutable slot for string-valued fields. `AccountType` is an enum and
    /// has no string slot.
    fn slot<'a>(&self, record: &'a mut MemberRecord) -> Option<&'a mut String> {
        match self {
            Self::AccountType => None,
            Self::StudentId => Some(&mut record.student_id),
            Self::TeacherAcronym => Some(&mut record.teacher_acronym),
            Self::Firstname => Some(&mut record.firstname),
            Self::Lastname => Some(&mut record.lastname),
            Self::Email => Some(&mut record.email),
            Self::Ahv => Some(&mut record.ahv),
            Self::Notice => Some(&mut record.notice),
            Self::InitialPassword => Some(&mut record.initial_password),
        }
    }
}

/// Every column the loader must find in the header row.
pub const REQUIRED_FIELDS: [Field; 9] = [
    Field::AccountType,
    Field::StudentId,
    Field::TeacherAcronym,
    Field::Firstname,
    Field::Lastname,
    Field::Email,
    Field::Ahv,
    Field::Notice,
    Field::InitialPassword,
];

pub const UPDATE_POLICY: &[(Field, FieldPolicy)] = &[
    (Field::AccountType, FieldPolicy::Never),
    (Field::StudentId, FieldPolicy::Never),
    (Field::TeacherAcronym, FieldPolicy::OverwriteIfPresent),
    (Field::Firstname, FieldPolicy::OverwriteIfPresent),
    (Field::Lastname, FieldPolicy::OverwriteIfPresent),
    (Field::Ahv, FieldPolicy::OverwriteIfPresent),
    (Field::Notice, FieldPolicy::OverwriteIfPresent),
    (Field::InitialPassword, FieldPolicy::WriteOnce),
    (Field::Email, FieldPolicy::Never),
];

/// Write one field according to `policy`. Returns true when the stored
/// value changed.
pub fn apply_field(record: &mut MemberRecord, row: &RosterRow, field: Field, policy: FieldPolicy) -> bool {
    let incoming = field.incoming(row);
    let Some(slot) = field.slot(record) else {
        return false;
    };

    let write = match policy {
        FieldPolicy::Never => false,
        FieldPolicy::OverwriteIfPresent => !incoming.is_empty(),
        FieldPolicy::WriteOnce => slot.is_empty() && !incoming.is_empty(),
    };

    if write && slot.as_str() != incoming {
        *slot = incoming.to_string();
        true
    } else {
        false
    }
}

/// Apply [`UPDATE_POLICY`] to an existing record and recompute the display
/// name. Returns true when anything changed.
pub fn apply_policy(record: &mut MemberRecord, row: &RosterRow) -> bool {
    let mut changed = false;
    for &(field, policy) in UPDATE_POLICY {
        changed |= apply_field(record, row, field, policy);
    }

    let before = std::mem::take(&mut record.name);
    record.refresh_name();
    changed |= record.name != before;

    changed
}
