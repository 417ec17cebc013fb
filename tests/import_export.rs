//! Export and import tests.

use registrar::{
    ImportProblem, KeyField, MemoryBlobStore, StoreConfig, StoreError, StoreEvent, StudentInput,
    StudentStore, FORMAT_VERSION,
};
use serde_json::{json, Value};

fn seeded() -> StudentStore {
    let mut store = StudentStore::in_memory();
    store.seed_samples().unwrap();
    store
}

fn entry(student_id: &str, email: &str) -> Value {
    json!({
        "studentId": student_id,
        "fullName": "Phạm Minh Đức",
        "email": email,
        "gender": "Nam",
        "phone": "",
        "birthDate": "2001-09-09",
        "gpa": "3.1",
        "status": "Đang học"
    })
}

// --- Export ---

#[test]
fn test_export_all_document_shape() {
    let store = seeded();
    let exported: Value = serde_json::from_str(&store.export_all().unwrap()).unwrap();

    assert_eq!(exported["version"], FORMAT_VERSION);
    assert!(exported["exported"].is_string());

    let students = exported["students"].as_array().unwrap();
    assert_eq!(students.len(), 3);

    let first = &students[0];
    for key in [
        "id",
        "studentId",
        "fullName",
        "email",
        "gender",
        "phone",
        "birthDate",
        "department",
        "address",
        "gpa",
        "status",
        "createdAt",
        "updatedAt",
    ] {
        assert!(first.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(first["studentId"], "SV001");
    assert_eq!(first["gender"], "Nam");
    assert_eq!(first["birthDate"], "2000-01-15");
}

#[test]
fn test_export_is_pretty_printed() {
    let store = seeded();
    assert!(store.export_all().unwrap().contains("\n  "));
}

#[test]
fn test_export_selected_only() {
    let mut store = seeded();
    let binh = store.find_by_student_id("SV002").unwrap().id.clone();
    store.select(&binh);

    let exported: Value = serde_json::from_str(&store.export_selected().unwrap()).unwrap();
    let students = exported["students"].as_array().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["id"], binh.as_str());
}

#[test]
fn test_export_selected_empty() {
    let store = seeded();
    let exported: Value = serde_json::from_str(&store.export_selected().unwrap()).unwrap();
    assert!(exported["students"].as_array().unwrap().is_empty());
}

// --- Import ---

#[test]
fn test_export_then_import_into_empty_store() {
    let source = seeded();
    let json = source.export_all().unwrap();

    let mut target = StudentStore::in_memory();
    assert_eq!(target.import(&json).unwrap(), 3);

    for original in source.records() {
        let copy = target.read(&original.id).unwrap();
        assert_eq!(copy, original);
    }
}

#[test]
fn test_import_lenient_values() {
    let mut store = StudentStore::in_memory();
    let doc = json!({ "students": [entry("SV100", "duc@example.com")] });

    assert_eq!(store.import(&doc.to_string()).unwrap(), 1);

    let duc = store.find_by_student_id("SV100").unwrap();
    assert_eq!(duc.gpa, Some(3.1));
    assert_eq!(duc.phone, None);
    assert!(duc.updated_at >= duc.created_at);
}

#[test]
fn test_import_accepts_records_alias() {
    let mut store = StudentStore::in_memory();
    let doc = json!({ "records": [entry("SV100", "duc@example.com")] });
    assert_eq!(store.import(&doc.to_string()).unwrap(), 1);
}

#[test]
fn test_import_generates_missing_ids() {
    let mut store = StudentStore::in_memory();
    let doc = json!({ "students": [entry("SV100", "a@example.com"), entry("SV101", "b@example.com")] });
    store.import(&doc.to_string()).unwrap();

    let ids: Vec<_> = store.records().iter().map(|s| s.id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_import_replaces_colliding_id() {
    let mut store = seeded();
    let taken = store.records()[0].id.clone();

    let mut incoming = entry("SV100", "duc@example.com");
    incoming["id"] = json!(taken.as_str());
    store
        .import(&json!({ "students": [incoming] }).to_string())
        .unwrap();

    let duc = store.find_by_student_id("SV100").unwrap();
    assert_ne!(duc.id, taken);
    assert_eq!(store.read(&taken).unwrap().student_id, "SV001");
}

#[test]
fn test_import_preserves_timestamps() {
    let mut store = StudentStore::in_memory();
    let mut incoming = entry("SV100", "duc@example.com");
    incoming["createdAt"] = json!("2024-01-01T08:00:00Z");
    incoming["updatedAt"] = json!("2024-03-01T08:00:00Z");

    store
        .import(&json!({ "students": [incoming] }).to_string())
        .unwrap();

    let duc = store.find_by_student_id("SV100").unwrap();
    assert_eq!(duc.created_at.to_rfc3339(), "2024-01-01T08:00:00+00:00");
    assert_eq!(duc.updated_at.to_rfc3339(), "2024-03-01T08:00:00+00:00");
}

#[test]
fn test_import_is_all_or_nothing() {
    let mut store = seeded();
    let doc = json!({
        "students": [
            entry("SV100", "duc@example.com"),
            entry("SV001", "someone@example.com"),
            { "studentId": "SV102", "fullName": "", "email": "x", "gender": "Nam" },
        ]
    });

    let err = store.import(&doc.to_string()).unwrap_err();
    let issues = match err {
        StoreError::ImportRejected(issues) => issues,
        other => panic!("expected rejection, got {:?}", other),
    };

    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].index, 1);
    assert_eq!(
        issues[0].problem,
        ImportProblem::Duplicate {
            field: KeyField::StudentId,
            value: "SV001".into()
        }
    );
    assert_eq!(issues[1].index, 2);
    assert!(matches!(issues[1].problem, ImportProblem::Invalid { ref violations } if violations.len() == 2));

    // Nothing from the batch landed
    assert_eq!(store.len(), 3);
    assert!(store.find_by_student_id("SV100").is_none());
}

#[test]
fn test_import_rejects_collisions_within_batch() {
    let mut store = StudentStore::in_memory();
    let doc = json!({
        "students": [
            entry("SV100", "a@example.com"),
            entry("SV100", "b@example.com"),
            entry("SV102", "a@example.com"),
        ]
    });

    match store.import(&doc.to_string()) {
        Err(StoreError::ImportRejected(issues)) => {
            let indexes: Vec<_> = issues.iter().map(|i| i.index).collect();
            assert_eq!(indexes, vec![1, 2]);
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(store.is_empty());
}

#[test]
fn test_import_rejection_message() {
    let mut store = seeded();
    let doc = json!({ "students": [entry("SV001", "new@example.com")] });

    let message = store.import(&doc.to_string()).unwrap_err().to_string();
    assert!(message.contains("Record 1: student ID SV001 already exists"));
}

#[test]
fn test_import_malformed_documents() {
    let mut store = seeded();

    for bad in ["not json", "{}", r#"{"students": "nope"}"#] {
        assert!(matches!(
            store.import(bad),
            Err(StoreError::MalformedData(_))
        ));
    }
    assert_eq!(store.len(), 3);
}

#[test]
fn test_import_non_object_entry() {
    let mut store = StudentStore::in_memory();
    match store.import(r#"{"students": [42]}"#) {
        Err(StoreError::ImportRejected(issues)) => {
            assert!(matches!(issues[0].problem, ImportProblem::Unreadable { .. }));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn test_import_publishes_one_event() {
    let mut store = StudentStore::in_memory();
    let handle = store.subscribe();

    let doc = json!({ "students": [entry("SV100", "a@example.com"), entry("SV101", "b@example.com")] });
    store.import(&doc.to_string()).unwrap();

    assert_eq!(handle.drain(), vec![StoreEvent::Imported { count: 2 }]);
}

#[test]
fn test_empty_import_changes_nothing() {
    let blobs = MemoryBlobStore::new();
    let mut store = StudentStore::open(StoreConfig::default(), blobs.clone()).unwrap();
    let handle = store.subscribe();

    assert_eq!(store.import(r#"{"students": []}"#).unwrap(), 0);
    assert!(!store.is_dirty());
    assert!(handle.try_recv().is_err());
    assert!(blobs.is_empty());
}

#[test]
fn test_imported_records_join_the_view() {
    let mut store = StudentStore::in_memory();
    store
        .create(&StudentInput::new("SV001", "An", "an@example.com", "Nam"))
        .unwrap();
    store.set_search_term("đức");
    assert_eq!(store.filtered_len(), 0);

    let doc = json!({ "students": [entry("SV100", "duc@example.com")] });
    store.import(&doc.to_string()).unwrap();

    // The active search still applies
    assert_eq!(store.query().search_term, "đức");
    assert_eq!(store.filtered_len(), 1);
}
