//! Persistence tests against the file and memory backends.

use registrar::{
    BlobStore, FileBlobStore, MemoryBlobStore, PersistPolicy, StoreConfig, StoreError,
    StudentInput, StudentStatus, StudentStore, DEFAULT_STORAGE_KEY,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn open_file_store(dir: &TempDir) -> StudentStore {
    let storage = FileBlobStore::open(dir.path().join("data")).unwrap();
    StudentStore::open(StoreConfig::default(), storage).unwrap()
}

fn with_blob(value: serde_json::Value) -> MemoryBlobStore {
    let blobs = MemoryBlobStore::new();
    blobs
        .put(DEFAULT_STORAGE_KEY, value.to_string().as_bytes())
        .unwrap();
    blobs
}

// --- File Backend ---

#[test]
fn test_reopen_restores_records() {
    let dir = TempDir::new().unwrap();

    let (an_id, created_at) = {
        let mut store = open_file_store(&dir);
        store.seed_samples().unwrap();
        let an = store.find_by_student_id("SV001").unwrap();
        (an.id.clone(), an.created_at)
    };

    let store = open_file_store(&dir);
    assert_eq!(store.len(), 3);

    let an = store.read(&an_id).unwrap();
    assert_eq!(an.full_name, "Nguyễn Văn An");
    assert_eq!(an.gpa, Some(3.75));
    assert_eq!(an.created_at, created_at);
}

#[test]
fn test_reopen_keeps_insertion_order() {
    let dir = TempDir::new().unwrap();
    let ids: Vec<_> = {
        let mut store = open_file_store(&dir);
        for (sid, email) in [("SV009", "z@example.com"), ("SV001", "a@example.com")] {
            store
                .create(&StudentInput::new(sid, "An", email, "Nam"))
                .unwrap();
        }
        store.records().iter().map(|s| s.id.clone()).collect()
    };

    let store = open_file_store(&dir);
    let reopened: Vec<_> = store.records().iter().map(|s| s.id.clone()).collect();
    assert_eq!(reopened, ids);
}

#[test]
fn test_directory_is_locked_while_open() {
    let dir = TempDir::new().unwrap();
    let _store = open_file_store(&dir);

    let second = FileBlobStore::open(dir.path().join("data"));
    assert!(matches!(second, Err(StoreError::Locked)));
}

#[test]
fn test_corrupt_blob_starts_empty() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_file_store(&dir);
        store.seed_samples().unwrap();
    }

    // Flip a payload byte so the checksum no longer matches
    let blob_path = dir
        .path()
        .join("data")
        .join(format!("{}.blob", DEFAULT_STORAGE_KEY));
    let mut bytes = fs::read(&blob_path).unwrap();
    bytes[20] ^= 0xFF;
    fs::write(&blob_path, bytes).unwrap();

    let store = open_file_store(&dir);
    assert!(store.is_empty());
}

#[test]
fn test_failed_save_keeps_change_in_memory() {
    let dir = TempDir::new().unwrap();
    let storage = FileBlobStore::open(dir.path().join("data")).unwrap();

    // The file backend refuses keys that could leave its directory
    let config = StoreConfig::builder().storage_key("../escape").build();
    let mut store = StudentStore::open(config, storage).unwrap();
    assert!(store.is_empty());

    store
        .create(&StudentInput::new("SV001", "An", "a@example.com", "Nam"))
        .unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.is_dirty());
    assert!(matches!(store.flush(), Err(StoreError::InvalidOperation(_))));
}

// --- Loading Persisted Data ---

#[test]
fn test_missing_blob_is_empty_store() {
    let store = StudentStore::open(StoreConfig::default(), MemoryBlobStore::new()).unwrap();
    assert!(store.is_empty());
    assert!(!store.is_dirty());
}

#[test]
fn test_legacy_blob_loads_leniently() {
    let blobs = with_blob(json!({
        "students": [
            {
                "id": "1700000000000abc",
                "studentId": "SV001",
                "fullName": "Nguyễn Văn An",
                "email": "an@example.com",
                "gender": "Nam",
                "phone": "",
                "birthDate": "",
                "department": "Công nghệ thông tin",
                "address": "",
                "gpa": "3.75",
                "status": "Đang học",
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-02T00:00:00.000Z"
            },
            {
                "id": "1700000000001def",
                "studentId": "SV002",
                "fullName": "Trần Thị Bình",
                "email": "binh@example.com",
                "gender": "Nữ",
                "gpa": 3.25,
                "status": "Thôi học"
            }
        ],
        "version": "1.0.0",
        "timestamp": "2024-01-02T00:00:00.000Z"
    }));

    let store = StudentStore::open(StoreConfig::default(), blobs).unwrap();
    assert_eq!(store.len(), 2);

    let an = store.find_by_student_id("SV001").unwrap();
    assert_eq!(an.id.as_str(), "1700000000000abc");
    assert_eq!(an.gpa, Some(3.75));
    assert_eq!(an.phone, None);
    assert_eq!(an.birth_date, None);
    assert!(an.updated_at > an.created_at);

    let binh = store.find_by_email("binh@example.com").unwrap();
    assert_eq!(binh.status, StudentStatus::Dropped);
    assert!(binh.updated_at >= binh.created_at);
}

#[test]
fn test_unusable_entries_are_skipped() {
    let blobs = with_blob(json!({
        "students": [
            { "studentId": "SV001", "fullName": "An", "email": "a@example.com", "gender": "Nam" },
            { "studentId": "SV002", "fullName": "Bình", "email": "b@example.com", "gender": "???" },
            { "studentId": "SV003", "fullName": "", "email": "c@example.com", "gender": "Nữ" },
            "not an object"
        ]
    }));

    let store = StudentStore::open(StoreConfig::default(), blobs).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.find_by_student_id("SV001").is_some());
}

#[test]
fn test_malformed_blob_starts_empty() {
    let raws: [&[u8]; 3] = [b"{{{", br#"{"students": {}}"#, br#"{"version": "1.0.0"}"#];
    for raw in raws {
        let blobs = MemoryBlobStore::new();
        blobs.put(DEFAULT_STORAGE_KEY, raw).unwrap();

        let store = StudentStore::open(StoreConfig::default(), blobs).unwrap();
        assert!(store.is_empty());
    }
}

#[test]
fn test_duplicate_persisted_ids_are_separated() {
    let blobs = with_blob(json!({
        "students": [
            { "id": "same", "studentId": "SV001", "fullName": "An", "email": "a@example.com", "gender": "Nam" },
            { "id": "same", "studentId": "SV002", "fullName": "Bình", "email": "b@example.com", "gender": "Nữ" }
        ]
    }));

    let store = StudentStore::open(StoreConfig::default(), blobs).unwrap();
    assert_eq!(store.len(), 2);
    assert_ne!(store.records()[0].id, store.records()[1].id);
}

#[test]
fn test_duplicate_persisted_keys_keep_first_record() {
    let blobs = with_blob(json!({
        "students": [
            { "id": "a", "studentId": "SV001", "fullName": "An", "email": "a@example.com", "gender": "Nam" },
            { "id": "b", "studentId": "SV001", "fullName": "An Bản Sao", "email": "a@example.com", "gender": "Nam" },
            { "id": "c", "studentId": "SV003", "fullName": "Cường", "email": "a@example.com", "gender": "Nam" },
            { "id": "d", "studentId": "SV004", "fullName": "Dung", "email": "d@example.com", "gender": "Nữ" }
        ]
    }));

    let mut store = StudentStore::open(StoreConfig::default(), blobs).unwrap();
    let ids: Vec<_> = store.records().iter().map(|s| s.id.as_str().to_string()).collect();
    assert_eq!(ids, vec!["a", "d"]);

    // The surviving record can be edited with its own keys
    let first = store.find_by_student_id("SV001").unwrap().clone();
    let edit = StudentInput::new("SV001", "An Nguyễn", "a@example.com", "Nam");
    assert!(store.update(&first.id, &edit).is_ok());
}

// --- Snapshot Layout ---

#[test]
fn test_snapshot_document_layout() {
    let blobs = MemoryBlobStore::new();
    let mut store = StudentStore::open(StoreConfig::default(), blobs.clone()).unwrap();
    store.seed_samples().unwrap();

    let raw = blobs.get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
    let snapshot: serde_json::Value = serde_json::from_slice(&raw).unwrap();

    assert_eq!(snapshot["version"], "1.0.0");
    assert!(snapshot["timestamp"].is_string());
    assert_eq!(snapshot["students"].as_array().unwrap().len(), 3);
}

#[test]
fn test_custom_storage_key() {
    let blobs = MemoryBlobStore::new();
    let config = StoreConfig::builder()
        .storage_key("cohort2026")
        .persist_policy(PersistPolicy::EveryMutation)
        .build();
    {
        let mut store = StudentStore::open(config.clone(), blobs.clone()).unwrap();
        store.seed_samples().unwrap();
    }

    assert!(blobs.get(DEFAULT_STORAGE_KEY).unwrap().is_none());
    assert_eq!(StudentStore::open(config, blobs).unwrap().len(), 3);
}
