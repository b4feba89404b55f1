//! Reconciliation behavior tests
//!
//! Drive the session end to end against an in-memory store: normalize, diff,
//! apply, and re-import, checking the properties users rely on when they
//! round-trip spreadsheets through the admin tool.

mod helpers;

use chrono::{TimeZone, Utc};
use helpers::{applicant, record, sheet, text, FailingStore, MemoryStore};
use roster_common::config::OmissionPolicy;
use roster_common::Error;
use roster_sync::engine::schema::{applicants, positions};
use roster_sync::formats::delimited::{parse_csv, write_csv};
use roster_sync::formats::json::{parse_json, write_json};
use roster_sync::engine::{to_spreadsheet, to_structured, Cell};
use roster_sync::{
    DiffStatus, RawPayload, ReconciliationSession, Record, RecordStore, Schema, SessionView,
    Value,
};

fn session_for(schema: Schema) -> ReconciliationSession {
    ReconciliationSession::new(schema, OmissionPolicy::Skip)
}

fn statuses(session: &ReconciliationSession) -> Vec<DiffStatus> {
    session
        .diff()
        .unwrap()
        .iter()
        .map(|d| d.status())
        .collect()
}

// =============================================================================
// Idempotence
// =============================================================================

#[tokio::test]
async fn test_reimport_after_apply_has_no_differences() {
    let schema = applicants().unwrap();
    let store = MemoryStore::new();
    let file = sheet(&[
        &["UTORid", "First Name", "Last Name", "email"],
        &["smithj", "Jane", "Smith", "jane@example.com"],
        &["doej", "John", "Doe", "john@example.com"],
    ]);

    let mut first = session_for(schema.clone());
    first.set_existing(store.load_all(&schema).await.unwrap());
    first.load_payload(&file);
    assert_eq!(first.apply(&store).await.unwrap(), 2);

    let mut second = session_for(schema.clone());
    second.set_existing(store.load_all(&schema).await.unwrap());
    second.load_payload(&file);

    assert!(matches!(second.view(), SessionView::NoDifferences(s) if s.unchanged == 2));
    assert!(second.pending_batch().unwrap().is_empty());
}

#[tokio::test]
async fn test_all_unchanged_apply_does_not_touch_store() {
    let schema = applicants().unwrap();
    let store =
        MemoryStore::seeded(&schema, vec![applicant("smithj", "Jane", "Smith", "j@x")]).await;

    let mut session = session_for(schema.clone());
    session.set_existing(store.load_all(&schema).await.unwrap());
    session.load_payload(&sheet(&[&["UTORid", "First Name"], &["smithj", "Jane"]]));

    assert_eq!(session.apply(&store).await.unwrap(), 0);
    assert_eq!(store.upsert_calls(), 0);
}

// =============================================================================
// Round trip through both export encodings
// =============================================================================

fn seeded_positions() -> Vec<Record> {
    vec![
        record(&[
            ("position_code", text("CSC108H1F")),
            ("position_title", text("Intro to Programming")),
            ("hours_per_assignment", Value::Number(65.5)),
            ("desired_num_assignments", Value::Number(12.0)),
            (
                "start_date",
                Value::Date(Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()),
            ),
        ]),
        record(&[
            ("position_code", text("MAT137Y1Y")),
            ("hours_per_assignment", Value::Number(120.0)),
            (
                "end_date",
                Value::Date(Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap()),
            ),
        ]),
    ]
}

#[tokio::test]
async fn test_csv_export_reimports_unchanged() {
    let schema = positions().unwrap();
    let store = MemoryStore::seeded(&schema, seeded_positions()).await;
    let existing = store.load_all(&schema).await.unwrap();

    let bytes = write_csv(&to_spreadsheet(&schema, &existing)).unwrap();
    let reread = RawPayload::Spreadsheet(parse_csv(&bytes).unwrap());

    let mut session = session_for(schema);
    session.set_existing(existing);
    session.load_payload(&reread);

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged; 2]);
}

#[tokio::test]
async fn test_json_export_reimports_unchanged() {
    let schema = positions().unwrap();
    let store = MemoryStore::seeded(&schema, seeded_positions()).await;
    let existing = store.load_all(&schema).await.unwrap();

    let bytes = write_json(&to_structured(&schema, &existing)).unwrap();
    let reread = RawPayload::Structured(parse_json(&bytes).unwrap());

    let mut session = session_for(schema);
    session.set_existing(existing);
    session.load_payload(&reread);

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged; 2]);
}

#[tokio::test]
async fn test_in_memory_spreadsheet_round_trip() {
    let schema = positions().unwrap();
    let existing = seeded_positions();

    let mut session = session_for(schema.clone());
    session.set_existing(existing.clone());
    session.load_payload(&RawPayload::Spreadsheet(to_spreadsheet(&schema, &existing)));

    assert!(matches!(session.view(), SessionView::NoDifferences(_)));
}

// =============================================================================
// Type coercion
// =============================================================================

#[test]
fn test_text_number_is_not_a_modification() {
    let schema = positions().unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![record(&[
        ("position_code", text("CSC108H1F")),
        ("desired_num_assignments", Value::Number(5.0)),
        ("hours_per_assignment", Value::Number(60.0)),
    ])]);

    session.load_payload(&sheet(&[
        &["Position Code", "Desired Num Assignments", "Hours"],
        &["CSC108H1F", "5", "60.0"],
    ]));

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged]);
}

#[test]
fn test_date_spellings_match_stored_instant() {
    let schema = positions().unwrap();
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![
        record(&[("position_code", text("A")), ("start_date", Value::Date(start))]),
        record(&[("position_code", text("B")), ("start_date", Value::Date(start))]),
        record(&[("position_code", text("C")), ("start_date", Value::Date(start))]),
    ]);

    session.load_payload(&sheet(&[
        &["Position Code", "Start Date"],
        &["A", "2024-09-01"],
        &["B", "2024/09/01"],
        &["C", "2024-09-01T00:00:00Z"],
    ]));

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged; 3]);
}

// =============================================================================
// Partial update
// =============================================================================

#[test]
fn test_omitted_columns_are_left_alone() {
    let schema = applicants().unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![applicant("smithj", "Jane", "Smith", "old@example.com")]);

    session.load_payload(&sheet(&[
        &["UTORid", "email"],
        &["smithj", "new@example.com"],
    ]));

    let batch = session.pending_batch().unwrap();
    assert_eq!(
        batch,
        vec![applicant("smithj", "Jane", "Smith", "new@example.com")]
    );

    let diff = &session.diff().unwrap()[0];
    let changed = diff.changed_fields().unwrap();
    assert_eq!(changed.keys().collect::<Vec<_>>(), vec!["email"]);
    assert_eq!(changed["email"].from, Some(text("old@example.com")));
}

#[test]
fn test_blank_cell_does_not_clear_stored_value() {
    let schema = applicants().unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![applicant("smithj", "Jane", "Smith", "j@x")]);

    session.load_payload(&sheet(&[
        &["UTORid", "First Name", "email"],
        &["smithj", "", "j@x"],
    ]));

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged]);
}

// =============================================================================
// New-record detection
// =============================================================================

#[test]
fn test_unknown_key_is_new_and_carried_verbatim() {
    let schema = applicants().unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![applicant("smithj", "Jane", "Smith", "j@x")]);

    session.load_payload(&sheet(&[
        &["UTORid", "Given Name", "Surname"],
        &["smithj", "Jane", "Smith"],
        &["newp", "Pat", "New"],
    ]));

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged, DiffStatus::New]);
    let batch = session.pending_batch().unwrap();
    assert_eq!(
        batch,
        vec![record(&[
            ("utorid", text("newp")),
            ("first_name", text("Pat")),
            ("last_name", text("New")),
        ])]
    );
}

#[test]
fn test_numeric_key_matches_text_key() {
    let schema = positions().unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![record(&[
        ("position_code", text("108")),
        ("position_title", text("Intro")),
    ])]);

    let mut rows = match sheet(&[&["Position Code", "Position Title"]]) {
        RawPayload::Spreadsheet(rows) => rows,
        RawPayload::Structured(_) => unreachable!(),
    };
    rows.push(vec![
        Cell::Number(108.0),
        Cell::Text("Intro".into()),
    ]);
    session.load_payload(&RawPayload::Spreadsheet(rows));

    assert_eq!(statuses(&session), vec![DiffStatus::Unchanged]);
}

// =============================================================================
// Required-key exclusion
// =============================================================================

#[test]
fn test_rows_without_primary_key_are_reported_and_excluded() {
    let schema = applicants().unwrap();
    let mut session = session_for(schema);

    session.load_payload(&sheet(&[
        &["UTORid", "First Name"],
        &["smithj", "Jane"],
        &["", "Nobody"],
        &["doej", "John"],
    ]));

    let normalized = session.normalized().unwrap();
    assert_eq!(normalized.records.len(), 2);
    assert_eq!(normalized.omissions.len(), 1);
    assert_eq!(normalized.omissions[0].row, 3);
    assert_eq!(normalized.omissions[0].missing, vec!["utorid".to_string()]);
    assert_eq!(statuses(&session), vec![DiffStatus::New, DiffStatus::New]);
}

#[test]
fn test_strict_policy_rejects_file_with_omissions() {
    let schema = applicants().unwrap();
    let mut session = ReconciliationSession::new(schema, OmissionPolicy::Fatal);

    session.load_payload(&sheet(&[
        &["UTORid", "First Name"],
        &["smithj", "Jane"],
        &["", "Nobody"],
    ]));

    match session.view() {
        SessionView::Failed(message) => assert!(message.contains("row 3"), "{}", message),
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(matches!(
        session.pending_batch(),
        Err(Error::StalePrecondition(_))
    ));
}

// =============================================================================
// Header aliasing
// =============================================================================

#[test]
fn test_header_aliases_resolve_to_same_field() {
    for header in ["Given Name", "First", "First Name", "first_name", "  FIRST-NAME "] {
        let schema = applicants().unwrap();
        let mut session = session_for(schema);
        session.load_payload(&sheet(&[&["UTORid", header], &["smithj", "Jane"]]));

        let records = &session.normalized().unwrap().records;
        assert_eq!(
            records[0].get("first_name"),
            Some(&text("Jane")),
            "header {:?}",
            header
        );
    }
}

#[test]
fn test_unrecognized_columns_are_ignored() {
    let schema = applicants().unwrap();
    let mut session = session_for(schema);

    session.load_payload(&sheet(&[
        &["UTORid", "Favourite Colour"],
        &["smithj", "green"],
    ]));

    let records = &session.normalized().unwrap().records;
    assert_eq!(records[0], record(&[("utorid", text("smithj"))]));
}

// =============================================================================
// Persistence failures
// =============================================================================

#[tokio::test]
async fn test_failed_write_keeps_diff_for_retry() {
    let schema = applicants().unwrap();
    let failing = FailingStore {
        existing: vec![applicant("smithj", "Jane", "Smith", "old@x")],
    };

    let mut session = session_for(schema.clone());
    session.set_existing(failing.load_all(&schema).await.unwrap());
    session.load_payload(&sheet(&[&["UTORid", "email"], &["smithj", "new@x"]]));

    let result = session.apply(&failing).await;
    assert!(matches!(result, Err(Error::Internal(_))));
    assert!(!session.is_reconciling());
    assert_eq!(statuses(&session), vec![DiffStatus::Modified]);

    // Retry against a working store succeeds with the same batch
    let store = MemoryStore::seeded(&schema, failing.existing.clone()).await;
    assert_eq!(session.apply(&store).await.unwrap(), 1);
    assert!(matches!(session.view(), SessionView::NoDifferences(_)));
    assert_eq!(
        store.load_all(&schema).await.unwrap(),
        vec![applicant("smithj", "Jane", "Smith", "new@x")]
    );
}

#[test]
fn test_existing_collision_blocks_diff() {
    let schema = applicants().unwrap();
    let mut session = session_for(schema);
    session.set_existing(vec![
        applicant("smithj", "Jane", "Smith", "a@x"),
        applicant("smithj", "Janet", "Smith", "b@x"),
    ]);

    session.load_payload(&sheet(&[&["UTORid"], &["smithj"]]));

    assert!(session.diff().is_none());
    assert!(session.error().unwrap().contains("smithj"));
}
