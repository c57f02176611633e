// Property-based tests for the write policies of the reconciler.
// CI: 128 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use rostersync_recon::engine::{run, ImportOptions};
use rostersync_recon::model::{AccountType, MemberRecord, RosterRow};
use rostersync_recon::{MemberStore, MemoryStore, MessageLog};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_128() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(128),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Field value: usually a short word, sometimes empty.
fn arb_value() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[A-Za-z]{1,8}",
        1 => Just(String::new()),
    ]
}

fn arb_row(student_id: String) -> impl Strategy<Value = RosterRow> {
    (
        arb_value(),
        arb_value(),
        arb_value(),
        arb_value(),
        arb_value(),
        arb_value(),
        arb_value(),
    )
        .prop_map(move |(first, last, acronym, ahv, notice, email, password)| RosterRow {
            line: 2,
            account_type: "student".into(),
            student_id: student_id.clone(),
            teacher_acronym: acronym,
            firstname: first,
            lastname: last,
            email: if email.is_empty() { email } else { format!("{email}@example.org") },
            ahv,
            notice,
            initial_password: password,
        })
}

fn existing(email: &str, password: &str) -> MemberRecord {
    let mut r = MemberRecord::new(AccountType::Student);
    r.id = Some(1);
    r.student_id = "100".into();
    r.firstname = "Stored".into();
    r.lastname = "Person".into();
    r.refresh_name();
    r.email = email.into();
    r.initial_password = password.into();
    r.teacher_acronym = "ST".into();
    r.ahv = "756".into();
    r.notice = "kept".into();
    r
}

fn import(store: &mut MemoryStore, rows: &[RosterRow]) -> rostersync_recon::ImportResult {
    let mut log = MessageLog::new();
    run(store, rows, &ImportOptions::default(), &mut log).unwrap()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_128())]

    #[test]
    fn email_and_password_survive_updates(row in arb_row("100".into())) {
        let mut store = MemoryStore::with_records([existing("stored@example.org", "pw")]);
        import(&mut store, &[row]);
        let rec = store.find_by_student_id("100").unwrap().unwrap();
        prop_assert_eq!(rec.email, "stored@example.org");
        prop_assert_eq!(rec.initial_password, "pw");
    }

    #[test]
    fn empty_incoming_never_blanks(row in arb_row("100".into())) {
        let mut store = MemoryStore::with_records([existing("stored@example.org", "pw")]);
        import(&mut store, &[row.clone()]);
        let rec = store.find_by_student_id("100").unwrap().unwrap();
        let pairs = [
            (&row.firstname, &rec.firstname, "Stored"),
            (&row.lastname, &rec.lastname, "Person"),
            (&row.teacher_acronym, &rec.teacher_acronym, "ST"),
            (&row.ahv, &rec.ahv, "756"),
            (&row.notice, &rec.notice, "kept"),
        ];
        for (incoming, stored, before) in pairs {
            if incoming.is_empty() {
                prop_assert_eq!(stored.as_str(), before);
            } else {
                prop_assert_eq!(stored, incoming);
            }
        }
    }

    #[test]
    fn second_identical_run_changes_nothing(
        rows in proptest::collection::vec(arb_row(String::new()), 1..8).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, mut r)| {
                    r.student_id = (100 + i).to_string();
                    r
                })
                .collect::<Vec<_>>()
        })
    ) {
        // Distinct ids: a feed that repeats an id is not a fixed point.
        let mut store = MemoryStore::new();
        import(&mut store, &rows);
        let snapshot: Vec<_> = store.records().cloned().collect();

        let second = import(&mut store, &rows);
        prop_assert_eq!(second.summary.inserts, 0);
        prop_assert_eq!(second.summary.updates, 0);
        prop_assert_eq!(second.summary.deactivated, 0);
        prop_assert_eq!(store.records().cloned().collect::<Vec<_>>(), snapshot);
    }
}
