//! Error handling and edge case tests.

use registrar::{
    KeyField, RecordId, StoreError, StudentInput, StudentStore, Violation,
};

fn valid(student_id: &str, email: &str) -> StudentInput {
    StudentInput::new(student_id, "Nguyễn Văn An", email, "Nam")
}

// --- Validation Errors ---

#[test]
fn test_create_reports_every_violation() {
    let mut store = StudentStore::in_memory();

    let input = StudentInput::new("SV 01", "An123", "not-an-email", "Khác")
        .with_phone("12345")
        .with_gpa(4.5)
        .with_birth_date("2015-02-30");

    match store.create(&input) {
        Err(StoreError::Validation(violations)) => {
            assert_eq!(
                violations,
                vec![
                    Violation::StudentIdNotAlphanumeric,
                    Violation::FullNameInvalid,
                    Violation::EmailInvalid,
                    Violation::GenderUnknown {
                        value: "Khác".into()
                    },
                    Violation::PhoneInvalid,
                    Violation::GpaOutOfRange,
                    Violation::BirthDateInvalid {
                        value: "2015-02-30".into()
                    },
                ]
            );
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    assert!(store.is_empty());
}

#[test]
fn test_required_fields() {
    let mut store = StudentStore::in_memory();

    let err = store
        .create(&StudentInput::new("", "  ", "", ""))
        .unwrap_err();
    match err {
        StoreError::Validation(violations) => assert_eq!(
            violations,
            vec![
                Violation::StudentIdRequired,
                Violation::FullNameRequired,
                Violation::EmailRequired,
                Violation::GenderRequired,
            ]
        ),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_age_bounds() {
    let mut store = StudentStore::in_memory();

    let too_young = valid("SV001", "a@example.com").with_birth_date("2020-01-01");
    assert!(matches!(
        store.create(&too_young),
        Err(StoreError::Validation(v)) if matches!(v[..], [Violation::AgeOutOfRange { .. }])
    ));

    let too_old = valid("SV001", "a@example.com").with_birth_date("1900-01-01");
    assert!(matches!(
        store.create(&too_old),
        Err(StoreError::Validation(v)) if matches!(v[..], [Violation::AgeOutOfRange { .. }])
    ));

    let ok = valid("SV001", "a@example.com").with_birth_date("2000-01-15");
    assert!(store.create(&ok).is_ok());
}

#[test]
fn test_gpa_edges() {
    let mut store = StudentStore::in_memory();

    assert!(store.create(&valid("SV001", "a@example.com").with_gpa(0.0)).is_ok());
    assert!(store.create(&valid("SV002", "b@example.com").with_gpa(4.0)).is_ok());
    assert!(store.create(&valid("SV003", "c@example.com").with_gpa(-0.1)).is_err());
    assert!(store.create(&valid("SV004", "d@example.com").with_gpa(f64::NAN)).is_err());
}

#[test]
fn test_blank_optionals_are_absent() {
    let mut store = StudentStore::in_memory();

    let student = store
        .create(
            &valid("SV001", "a@example.com")
                .with_phone("   ")
                .with_birth_date("")
                .with_department(" ")
                .with_status(""),
        )
        .unwrap();

    assert_eq!(student.phone, None);
    assert_eq!(student.birth_date, None);
    assert_eq!(student.department, None);
    assert_eq!(student.status, Default::default());
}

#[test]
fn test_unknown_status_rejected() {
    let mut store = StudentStore::in_memory();
    let err = store
        .create(&valid("SV001", "a@example.com").with_status("expelled"))
        .unwrap_err();

    assert!(matches!(err, StoreError::Validation(v) if v == vec![Violation::StatusUnknown { value: "expelled".into() }]));
}

#[test]
fn test_validation_message_is_readable() {
    let mut store = StudentStore::in_memory();
    let err = store
        .create(&StudentInput::new("SV001", "An", "bad", "Nam").with_phone("1"))
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("email is not valid"));
    assert!(message.contains("phone number must have 10-11 digits"));
}

// --- Uniqueness Errors ---

#[test]
fn test_duplicate_student_id_checked_first() {
    let mut store = StudentStore::in_memory();
    store.create(&valid("SV001", "a@example.com")).unwrap();

    let err = store.create(&valid("SV001", "a@example.com")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::DuplicateKey { field: KeyField::StudentId, ref value } if value == "SV001"
    ));

    let err = store.create(&valid("SV002", "a@example.com")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::DuplicateKey { field: KeyField::Email, .. }
    ));

    assert_eq!(store.len(), 1);
}

#[test]
fn test_validation_precedes_uniqueness() {
    let mut store = StudentStore::in_memory();
    store.create(&valid("SV001", "a@example.com")).unwrap();

    let err = store
        .create(&valid("SV001", "a@example.com").with_gpa(9.0))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn test_update_may_keep_own_keys() {
    let mut store = StudentStore::in_memory();
    let a = store.create(&valid("SV001", "a@example.com")).unwrap();
    store.create(&valid("SV002", "b@example.com")).unwrap();

    // Own keys are fine
    assert!(store.update(&a.id, &valid("SV001", "a@example.com")).is_ok());

    // Another record's keys are not
    let err = store
        .update(&a.id, &valid("SV001", "b@example.com"))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DuplicateKey { field: KeyField::Email, .. }
    ));
    assert_eq!(store.read(&a.id).unwrap().email, "a@example.com");
}

// --- Missing Records ---

#[test]
fn test_update_unknown_id() {
    let mut store = StudentStore::in_memory();
    let ghost = RecordId::from("ghost");

    let err = store
        .update(&ghost, &valid("SV001", "a@example.com"))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == ghost));
}

#[test]
fn test_delete_unknown_id() {
    let mut store = StudentStore::in_memory();
    store.create(&valid("SV001", "a@example.com")).unwrap();

    assert!(matches!(
        store.delete(&RecordId::from("ghost")),
        Err(StoreError::NotFound(_))
    ));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_read_unknown_id_is_none() {
    let store = StudentStore::in_memory();
    assert!(store.read(&RecordId::from("ghost")).is_none());
}

// --- View Edge Cases ---

#[test]
fn test_empty_store_view() {
    let mut store = StudentStore::in_memory();

    assert_eq!(store.total_pages(), 0);
    assert!(store.page().is_empty());
    assert!(!store.set_page(1));
    assert_eq!(store.select_all_on_page(), 0);
    assert_eq!(store.current_page(), 1);
}

#[test]
fn test_search_without_matches() {
    let mut store = StudentStore::in_memory();
    store.seed_samples().unwrap();

    store.set_search_term("zzz");
    assert_eq!(store.filtered_len(), 0);
    assert_eq!(store.total_pages(), 0);
    assert!(store.page().is_empty());
    assert_eq!(store.stats().total, 3);
}

#[test]
fn test_zero_page_size_rejected() {
    let mut store = StudentStore::in_memory();
    assert!(matches!(
        store.set_page_size(0),
        Err(StoreError::InvalidOperation(_))
    ));
}
