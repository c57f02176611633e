use std::path::PathBuf;

use rostersync_recon::engine::{load_roster, run, ImportOptions};
use rostersync_recon::model::{AuditFinding, ImportResult};
use rostersync_recon::{ImportConfig, MemberStore, MemoryStore, MessageLog};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load_and_run(
    store: &mut MemoryStore,
    csv_name: &str,
    config: &ImportConfig,
    dry_run: bool,
) -> (ImportResult, MessageLog) {
    let rows = load_roster(&read_fixture(csv_name), config).unwrap();
    let mut log = MessageLog::new();
    let options = ImportOptions::from_config(config, dry_run);
    let result = run(store, &rows, &options, &mut log).unwrap();
    (result, log)
}

// -------------------------------------------------------------------------
// First import
// -------------------------------------------------------------------------

#[test]
fn initial_import_into_empty_store() {
    let mut store = MemoryStore::new();
    let (result, log) = load_and_run(&mut store, "roster-initial.csv", &ImportConfig::default(), false);

    assert!(result.meta.processed);
    assert_eq!(result.summary.rows, 3);
    assert_eq!(result.summary.inserts, 3);
    assert_eq!(result.summary.updates, 0);
    assert_eq!(result.summary.deactivated, 0);
    assert_eq!(result.summary.rejected, 1);
    assert_eq!(store.len(), 3, "teacher row and bad id are not stored");

    let anna = store.find_by_student_id("4711").unwrap().unwrap();
    assert_eq!(anna.email, "anna_muster@stud.schule-ettiswil.ch");
    assert_eq!(anna.firstname, "Anna");
    assert_eq!(anna.ahv, "756.1234.5678.97");
    assert_eq!(anna.initial_password, "Start123");

    let joerg = store.find_by_student_id("4712").unwrap().unwrap();
    assert_eq!(joerg.email, "joerg_maeder@stud.schule-ettiswil.ch");

    let lea = store.find_by_student_id("4713").unwrap().unwrap();
    assert_eq!(lea.email, "lea.graf@example.org");

    let errors: Vec<_> = log.errors().collect();
    assert_eq!(errors, ["Invalid student id found for \"Max Ohne [max@example.org]\"!"]);
    assert_eq!(
        log.messages().last().unwrap().text,
        "Import finished. Traversed 3 rows: 3 inserts, 0 updates, 0 deactivated."
    );
}

// -------------------------------------------------------------------------
// Follow-up imports
// -------------------------------------------------------------------------

#[test]
fn second_import_updates_inserts_and_deactivates() {
    let config = ImportConfig::default();
    let mut store = MemoryStore::new();
    load_and_run(&mut store, "roster-initial.csv", &config, false);
    let anna_before = store.find_by_student_id("4711").unwrap().unwrap();

    let (result, log) = load_and_run(&mut store, "roster-next.csv", &config, false);
    assert_eq!(result.summary.rows, 3);
    assert_eq!(result.summary.inserts, 1);
    assert_eq!(result.summary.updates, 1, "only 4711 changed");
    assert_eq!(result.summary.deactivated, 1);
    assert_eq!(result.deactivated, ["4712"]);

    let anna = store.find_by_student_id("4711").unwrap().unwrap();
    assert_eq!(anna.email, anna_before.email);
    assert_eq!(anna.initial_password, "Start123");
    assert_eq!(anna.teacher_acronym, "CD");
    assert_eq!(anna.notice, "moved class");
    assert_eq!(anna.ahv, "756.1234.5678.97", "empty ahv keeps stored value");

    assert!(store.find_by_student_id("4712").unwrap().unwrap().disable);

    let noe = store.find_by_student_id("4714").unwrap().unwrap();
    assert_eq!(noe.email, "noe_francois@stud.schule-ettiswil.ch");

    assert!(log.infos().any(|m| m == "Deactivate student \"Jörg Mäder\""));
}

#[test]
fn identical_feed_twice_is_a_no_op() {
    let config = ImportConfig::default();
    let mut store = MemoryStore::new();
    load_and_run(&mut store, "roster-initial.csv", &config, false);
    let snapshot: Vec<_> = store.records().cloned().collect();

    let (result, _) = load_and_run(&mut store, "roster-initial.csv", &config, false);
    assert_eq!(result.summary.inserts, 0);
    assert_eq!(result.summary.updates, 0);
    assert_eq!(result.summary.deactivated, 0);
    assert_eq!(store.records().cloned().collect::<Vec<_>>(), snapshot);
}

#[test]
fn deactivated_student_comes_back() {
    let config = ImportConfig::default();
    let mut store = MemoryStore::new();
    load_and_run(&mut store, "roster-initial.csv", &config, false);
    load_and_run(&mut store, "roster-next.csv", &config, false);
    assert!(store.find_by_student_id("4712").unwrap().unwrap().disable);

    let (result, _) = load_and_run(&mut store, "roster-initial.csv", &config, false);
    assert!(!store.find_by_student_id("4712").unwrap().unwrap().disable);
    assert!(result.summary.updates >= 1);
    assert_eq!(result.deactivated, ["4714"]);
}

#[test]
fn dry_run_reports_but_does_not_write() {
    let config = ImportConfig::default();
    let mut store = MemoryStore::new();
    load_and_run(&mut store, "roster-initial.csv", &config, false);
    let snapshot: Vec<_> = store.records().cloned().collect();

    let (result, log) = load_and_run(&mut store, "roster-next.csv", &config, true);
    assert!(result.meta.dry_run);
    assert_eq!(result.summary.inserts, 1);
    assert_eq!(result.summary.updates, 1);
    assert_eq!(result.summary.deactivated, 1);
    assert_eq!(store.records().cloned().collect::<Vec<_>>(), snapshot);
    assert_eq!(log.messages()[0].text, "Run import in dry-run mode.");
}

// -------------------------------------------------------------------------
// Column mapping + audit
// -------------------------------------------------------------------------

#[test]
fn mapped_columns_and_duplicate_names_are_audited() {
    let config = ImportConfig::from_toml(&read_fixture("mapped.import.toml")).unwrap();
    let mut store = MemoryStore::new();
    let (result, log) = load_and_run(&mut store, "roster-mapped.csv", &config, false);

    assert_eq!(result.summary.inserts, 2);
    // Both Eva Zaugg rows synthesize the same address.
    let dup: Vec<_> = result
        .findings
        .iter()
        .filter_map(|f| match f {
            AuditFinding::DuplicateEmail { email, .. } => Some(email.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(dup, ["eva_zaugg@example.org", "eva_zaugg@example.org"]);
    assert_eq!(result.summary.audit_errors, 2);
    assert_eq!(log.error_count(), 2);
}
