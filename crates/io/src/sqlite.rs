// Member directory persisted in SQLite

use std::collections::BTreeSet;
use std::path::Path;

use log::{debug, info};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params, Row};

use rostersync_recon::store::{MemberStore, StoreError, UniqueField};
use rostersync_recon::{AccountType, MemberRecord};

use crate::SCHEMA_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tstamp INTEGER NOT NULL DEFAULT 0,
    date_added INTEGER NOT NULL DEFAULT 0,
    account_type TEXT NOT NULL DEFAULT '',   -- student | teacher | other
    student_id TEXT NOT NULL DEFAULT '',
    firstname TEXT NOT NULL DEFAULT '',
    lastname TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    username TEXT UNIQUE,                    -- NULL = not assigned
    initial_password TEXT NOT NULL DEFAULT '',
    teacher_acronym TEXT NOT NULL DEFAULT '',
    ahv TEXT NOT NULL DEFAULT '',
    notice TEXT NOT NULL DEFAULT '',
    disable INTEGER NOT NULL DEFAULT 0       -- 0=active, 1=inactive
);

CREATE INDEX IF NOT EXISTS idx_members_student_id ON members (student_id);
CREATE INDEX IF NOT EXISTS idx_members_email ON members (email);
"#;

const COLUMNS: &str = "id, tstamp, date_added, account_type, student_id, firstname, lastname, \
     name, email, username, initial_password, teacher_acronym, ahv, notice, disable";

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// A row as stored; `account_type` is checked when converting.
struct StoredMember {
    record: MemberRecord,
    account_type: String,
}

impl StoredMember {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let account_type: String = row.get(3)?;
        let mut record = MemberRecord::new(AccountType::Other);
        record.id = Some(row.get(0)?);
        record.tstamp = row.get(1)?;
        record.date_added = row.get(2)?;
        record.student_id = row.get(4)?;
        record.firstname = row.get(5)?;
        record.lastname = row.get(6)?;
        record.name = row.get(7)?;
        record.email = row.get(8)?;
        record.username = row.get(9)?;
        record.initial_password = row.get(10)?;
        record.teacher_acronym = row.get(11)?;
        record.ahv = row.get(12)?;
        record.notice = row.get(13)?;
        record.disable = row.get::<_, i64>(14)? != 0;
        Ok(Self { record, account_type })
    }

    fn into_record(self) -> Result<MemberRecord, StoreError> {
        let mut record = self.record;
        record.account_type = self.account_type.parse().map_err(|message| StoreError::Corrupt {
            id: record.id.unwrap_or_default(),
            message,
        })?;
        Ok(record)
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the directory database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        let store = Self::init(conn, true)?;
        info!("opened member store {}", path.display());
        Ok(store)
    }

    /// Open an existing database without ever writing to the file
    /// (dry runs, audit, export). Any write through the store fails.
    pub fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(backend)?;
        let store = Self::init(conn, false)?;
        info!("opened member store {} (read-only)", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?, true)
    }

    fn init(conn: Connection, writable: bool) -> Result<Self, StoreError> {
        let version: u32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(backend)?;
        if version > SCHEMA_VERSION {
            return Err(StoreError::Backend(format!(
                "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        if version == SCHEMA_VERSION {
            debug!("member schema up to date (version {SCHEMA_VERSION})");
            return Ok(Self { conn });
        }
        if !writable {
            return Err(StoreError::Backend(format!(
                "database has schema version {version}, expected {SCHEMA_VERSION}; run a real import first"
            )));
        }

        conn.execute_batch(SCHEMA).map_err(backend)?;
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .map_err(backend)?;
        debug!("member schema created (version {SCHEMA_VERSION})");

        Ok(Self { conn })
    }

    fn query<P: Params>(&self, sql: &str, args: P) -> Result<Vec<MemberRecord>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(backend)?;
        let rows = stmt
            .query_map(args, StoredMember::from_row)
            .map_err(backend)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(backend)?.into_record()?);
        }
        Ok(out)
    }

    /// All records ordered by id, optionally without the inactive ones.
    pub fn list(&self, include_inactive: bool) -> Result<Vec<MemberRecord>, StoreError> {
        let sql = if include_inactive {
            format!("SELECT {COLUMNS} FROM members ORDER BY id")
        } else {
            format!("SELECT {COLUMNS} FROM members WHERE disable = 0 ORDER BY id")
        };
        self.query(&sql, [])
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))
            .map_err(backend)?;
        Ok(n as usize)
    }
}

impl MemberStore for SqliteStore {
    fn find_by_student_id(&self, student_id: &str) -> Result<Option<MemberRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM members WHERE student_id = ?1 ORDER BY id LIMIT 1");
        let found = self
            .conn
            .query_row(&sql, params![student_id], StoredMember::from_row)
            .optional()
            .map_err(backend)?;
        found.map(StoredMember::into_record).transpose()
    }

    fn insert(&mut self, record: &mut MemberRecord) -> Result<i64, StoreError> {
        self.conn
            .execute(
                "INSERT INTO members (tstamp, date_added, account_type, student_id, firstname, \
                 lastname, name, email, username, initial_password, teacher_acronym, ahv, notice, disable) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    record.tstamp,
                    record.date_added,
                    record.account_type.as_str(),
                    record.student_id,
                    record.firstname,
                    record.lastname,
                    record.name,
                    record.email,
                    record.username,
                    record.initial_password,
                    record.teacher_acronym,
                    record.ahv,
                    record.notice,
                    record.disable as i64,
                ],
            )
            .map_err(backend)?;
        let id = self.conn.last_insert_rowid();
        record.id = Some(id);
        Ok(id)
    }

    fn save(&mut self, record: &MemberRecord) -> Result<(), StoreError> {
        let id = record.id.ok_or_else(|| StoreError::NotPersisted {
            student_id: record.student_id.clone(),
        })?;
        let changed = self
            .conn
            .execute(
                "UPDATE members SET tstamp = ?2, date_added = ?3, account_type = ?4, student_id = ?5, \
                 firstname = ?6, lastname = ?7, name = ?8, email = ?9, username = ?10, \
                 initial_password = ?11, teacher_acronym = ?12, ahv = ?13, notice = ?14, disable = ?15 \
                 WHERE id = ?1",
                params![
                    id,
                    record.tstamp,
                    record.date_added,
                    record.account_type.as_str(),
                    record.student_id,
                    record.firstname,
                    record.lastname,
                    record.name,
                    record.email,
                    record.username,
                    record.initial_password,
                    record.teacher_acronym,
                    record.ahv,
                    record.notice,
                    record.disable as i64,
                ],
            )
            .map_err(backend)?;
        if changed == 0 {
            return Err(StoreError::UnknownId(id));
        }
        Ok(())
    }

    fn find_unseen(
        &self,
        account_type: AccountType,
        seen: &BTreeSet<String>,
    ) -> Result<Vec<MemberRecord>, StoreError> {
        // Filtered here rather than with NOT IN (...) so large rosters stay
        // under SQLite's bound-parameter limit.
        let sql = format!("SELECT {COLUMNS} FROM members WHERE account_type = ?1 ORDER BY id");
        let mut records = self.query(&sql, params![account_type.as_str()])?;
        records.retain(|r| !seen.contains(&r.student_id));
        Ok(records)
    }

    fn all_ordered_by_email(&self) -> Result<Vec<MemberRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM members ORDER BY email, id");
        self.query(&sql, [])
    }

    fn is_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let column = match field {
            UniqueField::Email => "email",
            UniqueField::StudentId => "student_id",
        };
        let sql = format!("SELECT COUNT(*) FROM members WHERE {column} = ?1 AND id IS NOT ?2");
        let n: i64 = self
            .conn
            .query_row(&sql, params![value, exclude_id], |row| row.get(0))
            .map_err(backend)?;
        Ok(n == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn member(student_id: &str, email: &str) -> MemberRecord {
        let mut r = MemberRecord::new(AccountType::Student);
        r.student_id = student_id.into();
        r.firstname = "Anna".into();
        r.lastname = "Muster".into();
        r.refresh_name();
        r.email = email.into();
        r.date_added = 1_700_000_000;
        r.tstamp = 1_700_000_000;
        r
    }

    #[test]
    fn insert_then_find() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut r = member("4711", "anna@example.org");
        r.username = Some("amuster".into());
        let id = store.insert(&mut r).unwrap();
        assert_eq!(r.id, Some(id));

        let found = store.find_by_student_id("4711").unwrap().unwrap();
        assert_eq!(found, r);
        assert!(store.find_by_student_id("9999").unwrap().is_none());
    }

    #[test]
    fn save_updates_in_place() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut r = member("1", "a@example.org");
        store.insert(&mut r).unwrap();

        r.disable = true;
        r.notice = "left school".into();
        store.save(&r).unwrap();

        let found = store.find_by_student_id("1").unwrap().unwrap();
        assert!(found.disable);
        assert_eq!(found.notice, "left school");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn save_unknown_id_fails() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut r = member("1", "");
        r.id = Some(42);
        assert!(matches!(store.save(&r), Err(StoreError::UnknownId(42))));
        r.id = None;
        assert!(matches!(store.save(&r), Err(StoreError::NotPersisted { .. })));
    }

    #[test]
    fn unseen_and_uniqueness_queries() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut a = member("1", "same@example.org");
        let mut b = member("2", "same@example.org");
        let mut t = member("3", "t@example.org");
        t.account_type = AccountType::Teacher;
        store.insert(&mut a).unwrap();
        store.insert(&mut b).unwrap();
        store.insert(&mut t).unwrap();

        let seen = BTreeSet::from(["1".to_string()]);
        let unseen = store.find_unseen(AccountType::Student, &seen).unwrap();
        assert_eq!(unseen.len(), 1);
        assert_eq!(unseen[0].student_id, "2");

        assert!(!store.is_unique(UniqueField::Email, "same@example.org", a.id).unwrap());
        assert!(store.is_unique(UniqueField::Email, "t@example.org", t.id).unwrap());
        assert!(!store.is_unique(UniqueField::StudentId, "3", None).unwrap());

        let emails: Vec<_> = store
            .all_ordered_by_email()
            .unwrap()
            .into_iter()
            .map(|r| r.student_id)
            .collect();
        assert_eq!(emails, ["1", "2", "3"]);
    }

    #[test]
    fn list_can_hide_inactive() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut a = member("1", "a@example.org");
        let mut b = member("2", "b@example.org");
        b.disable = true;
        store.insert(&mut a).unwrap();
        store.insert(&mut b).unwrap();
        assert_eq!(store.list(true).unwrap().len(), 2);
        assert_eq!(store.list(false).unwrap().len(), 1);
    }

    #[test]
    fn reopen_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("members.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.insert(&mut member("1", "a@example.org")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn reopen_does_not_touch_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("members.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.insert(&mut member("1", "a@example.org")).unwrap();
        }
        let before = std::fs::read(&path).unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            assert!(store.find_by_student_id("1").unwrap().is_some());
        }
        {
            let store = SqliteStore::open_read_only(&path).unwrap();
            assert_eq!(store.count().unwrap(), 1);
        }

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("members.db");
        SqliteStore::open(&path).unwrap();

        let mut store = SqliteStore::open_read_only(&path).unwrap();
        let err = store.insert(&mut member("1", "a@example.org")).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn read_only_needs_a_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path).unwrap().execute_batch("CREATE TABLE t (x)").unwrap();
        let err = SqliteStore::open_read_only(&path).err().unwrap();
        assert!(err.to_string().contains("expected 1"));
    }

    #[test]
    fn newer_schema_is_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("members.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA user_version = 99").unwrap();
        }
        let err = SqliteStore::open(&path).err().unwrap();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn corrupt_account_type_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute("INSERT INTO members (account_type, student_id) VALUES ('alien', '5')", [])
            .unwrap();
        let err = store.find_by_student_id("5").unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
