//! Record store boundary.
//!
//! The reconciler reads and writes members only through [`MemberStore`].
//! "Active" and "seen" are expressed as store queries so the engine never
//! filters raw tables itself.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::model::{AccountType, MemberRecord};

#[derive(Debug)]
pub enum StoreError {
    /// Backend (SQLite) failure.
    Backend(String),
    /// `save` was called on a record the store never assigned an id to.
    NotPersisted { student_id: String },
    /// No record with this primary id.
    UnknownId(i64),
    /// A stored value could not be mapped back onto a record.
    Corrupt { id: i64, message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "backend error: {msg}"),
            Self::NotPersisted { student_id } => {
                write!(f, "record for studentId \"{student_id}\" has no id yet")
            }
            Self::UnknownId(id) => write!(f, "no record with id {id}"),
            Self::Corrupt { id, message } => write!(f, "record {id} is corrupt: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Fields whose uniqueness the audit checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    StudentId,
}

impl UniqueField {
    pub fn value<'a>(&self, record: &'a MemberRecord) -> &'a str {
        match self {
            Self::Email => &record.email,
            Self::StudentId => &record.student_id,
        }
    }
}

pub trait MemberStore {
    /// First record (lowest id) carrying this external id.
    fn find_by_student_id(&self, student_id: &str) -> Result<Option<MemberRecord>, StoreError>;

    /// Store a new record and write the assigned id back into it.
    fn insert(&mut self, record: &mut MemberRecord) -> Result<i64, StoreError>;

    /// Overwrite the stored record with the same primary id.
    fn save(&mut self, record: &MemberRecord) -> Result<(), StoreError>;

    /// Active and inactive records of `account_type` whose student id is not
    /// in `seen`, ordered by id.
    fn find_unseen(
        &self,
        account_type: AccountType,
        seen: &BTreeSet<String>,
    ) -> Result<Vec<MemberRecord>, StoreError>;

    /// Every record, ordered by email then id.
    fn all_ordered_by_email(&self) -> Result<Vec<MemberRecord>, StoreError>;

    /// True when no record other than `exclude_id` carries `value` in `field`.
    fn is_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// `BTreeMap`-backed store. Used by tests and by callers that keep the
/// directory elsewhere and only want the reconciliation logic.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<i64, MemberRecord>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records. Records without an id get one.
    pub fn with_records(records: impl IntoIterator<Item = MemberRecord>) -> Self {
        let mut store = Self::new();
        let (with_id, without_id): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| r.id.is_some());
        for record in with_id {
            let id = record.id.unwrap_or_default();
            store.next_id = store.next_id.max(id);
            store.records.insert(id, record);
        }
        for mut record in without_id {
            store.next_id += 1;
            record.id = Some(store.next_id);
            store.records.insert(store.next_id, record);
        }
        store
    }

    pub fn get(&self, id: i64) -> Option<&MemberRecord> {
        self.records.get(&id)
    }

    pub fn records(&self) -> impl Iterator<Item = &MemberRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MemberStore for MemoryStore {
    fn find_by_student_id(&self, student_id: &str) -> Result<Option<MemberRecord>, StoreError> {
        Ok(self
            .records
            .values()
            .find(|r| r.student_id == student_id)
            .cloned())
    }

    fn insert(&mut self, record: &mut MemberRecord) -> Result<i64, StoreError> {
        self.next_id += 1;
        let id = self.next_id;
        record.id = Some(id);
        self.records.insert(id, record.clone());
        Ok(id)
    }

    fn save(&mut self, record: &MemberRecord) -> Result<(), StoreError> {
        let id = record.id.ok_or_else(|| StoreError::NotPersisted {
            student_id: record.student_id.clone(),
        })?;
        let slot = self.records.get_mut(&id).ok_or(StoreError::UnknownId(id))?;
        *slot = record.clone();
        Ok(())
    }

    fn find_unseen(
        &self,
        account_type: AccountType,
        seen: &BTreeSet<String>,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.account_type == account_type && !seen.contains(&r.student_id))
            .cloned()
            .collect())
    }

    fn all_ordered_by_email(&self) -> Result<Vec<MemberRecord>, StoreError> {
        let mut all: Vec<MemberRecord> = self.records.values().cloned().collect();
        all.sort_by(|a, b| a.email.cmp(&b.email).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn is_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        Ok(!self
            .records
            .values()
            .any(|r| r.id != exclude_id && field.value(r) == value))
    }
}
