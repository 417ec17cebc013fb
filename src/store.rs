//! Main store struct tying all components together.

use crate::document::{self, ExportDocument, SnapshotDocument, StudentDocument, FORMAT_VERSION};
use crate::error::{ImportIssue, ImportProblem, Result, StoreError};
use crate::events::{EventBus, RecordSummary, StoreEvent, SubscriptionHandle, SubscriptionId};
use crate::query::{self, Pagination, QueryState, SortKey, SortOrder};
use crate::samples::sample_students;
use crate::storage::{BlobStore, MemoryBlobStore};
use crate::types::{Gender, KeyField, RecordId, Student, StudentFields, StudentInput, StoreStats};
use crate::validation::{self, Violation};
use chrono::{NaiveDate, Utc};
use std::collections::HashSet;

/// Storage key the records are persisted under.
pub const DEFAULT_STORAGE_KEY: &str = "studentManagementData";

/// When mutations are written to blob storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistPolicy {
    /// Write after every mutating operation.
    EveryMutation,

    /// Write once this many mutations are pending.
    EveryNMutations { count: usize },

    /// Only write on `flush`.
    Manual,
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Key of the persisted blob.
    pub storage_key: String,

    /// Records per page of the view.
    pub page_size: usize,

    pub persist_policy: PersistPolicy,

    /// Max buffered events per subscriber before it is dropped.
    pub event_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            page_size: query::Pagination::default().page_size(),
            persist_policy: PersistPolicy::EveryMutation,
            event_buffer_size: crate::events::DEFAULT_BUFFER_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.storage_key = key.into();
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn persist_policy(mut self, policy: PersistPolicy) -> Self {
        self.config.persist_policy = policy;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}

/// A key already held by another record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConflict {
    pub field: KeyField,
    pub value: String,
    /// Record currently holding the key.
    pub holder: RecordId,
}

/// Everything wrong with an input, as reported by [`StudentStore::validate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationOutcome {
    pub violations: Vec<Violation>,
    pub conflicts: Vec<KeyConflict>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty() && self.conflicts.is_empty()
    }
}

/// The student record store.
///
/// Owns the records and every view derived from them:
/// - CRUD with field validation and unique `studentId` / `email`
/// - Search, gender filter, sort and pagination
/// - Bulk selection, statistics, JSON export and import
/// - Persistence of the whole collection to a [`BlobStore`]
///
/// Single-threaded: mutations take `&mut self` and run to completion.
pub struct StudentStore {
    config: StoreConfig,

    storage: Box<dyn BlobStore>,

    /// Canonical records, in insertion order.
    records: Vec<Student>,

    /// Positions into `records`, in view order. Rebuilt, never patched.
    filtered: Vec<usize>,

    /// Ids of live records marked for bulk operations.
    selection: HashSet<RecordId>,

    query: QueryState,

    pagination: Pagination,

    events: EventBus,

    /// Mutations not yet written to storage.
    unsaved: usize,
}

impl StudentStore {
    /// Open a store over `storage`, restoring any persisted records.
    ///
    /// A missing blob gives an empty store, and so does a blob that cannot
    /// be decoded (logged). I/O failures reading the blob are returned.
    pub fn open(config: StoreConfig, storage: impl BlobStore + 'static) -> Result<Self> {
        let records = Self::load(&config.storage_key, &storage)?;

        let mut store = Self {
            pagination: Pagination::new(config.page_size),
            events: EventBus::new(config.event_buffer_size),
            config,
            storage: Box::new(storage),
            records,
            filtered: Vec::new(),
            selection: HashSet::new(),
            query: QueryState::default(),
            unsaved: 0,
        };
        store.apply_filters();

        Ok(store)
    }

    /// An empty store persisting to a private in-memory blob store.
    pub fn in_memory() -> Self {
        Self {
            pagination: Pagination::default(),
            events: EventBus::default(),
            config: StoreConfig::default(),
            storage: Box::new(MemoryBlobStore::new()),
            records: Vec::new(),
            filtered: Vec::new(),
            selection: HashSet::new(),
            query: QueryState::default(),
            unsaved: 0,
        }
    }

    fn load(key: &str, storage: &dyn BlobStore) -> Result<Vec<Student>> {
        let bytes = match storage.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(Vec::new()),
            Err(StoreError::Io(e)) => return Err(StoreError::Io(e)),
            Err(e) => {
                tracing::warn!(error = %e, key, "unreadable persisted blob, starting empty");
                return Ok(Vec::new());
            }
        };

        let entries = match document::parse_entries(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, key, "malformed persisted data, starting empty");
                return Ok(Vec::new());
            }
        };

        let now = Utc::now();
        let mut records: Vec<Student> = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        let mut keys: HashSet<(KeyField, String)> = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let restored = StudentDocument::from_value(entry).and_then(|doc| doc.restore(now));
            match restored {
                Ok(mut student) => {
                    let taken = [KeyField::StudentId, KeyField::Email]
                        .into_iter()
                        .find(|&field| keys.contains(&(field, student.key(field).to_string())));
                    if let Some(field) = taken {
                        tracing::warn!(
                            index,
                            %field,
                            value = student.key(field),
                            "skipping persisted record with a duplicate key"
                        );
                        continue;
                    }
                    for field in [KeyField::StudentId, KeyField::Email] {
                        keys.insert((field, student.key(field).to_string()));
                    }

                    if !seen.insert(student.id.clone()) {
                        student.id = RecordId::generate();
                        seen.insert(student.id.clone());
                    }
                    records.push(student);
                }
                Err(reason) => {
                    tracing::warn!(index, reason = %reason, "skipping unusable persisted record");
                }
            }
        }

        tracing::debug!(count = records.len(), key, "loaded persisted records");
        Ok(records)
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    // --- Record Operations ---

    /// Validate `input` and add it as a new record.
    pub fn create(&mut self, input: &StudentInput) -> Result<Student> {
        let fields = self.prepare(input, None)?;
        let student = Student::new(RecordId::generate(), fields, Utc::now());

        tracing::debug!(id = %student.id, student_id = %student.student_id, "created record");

        self.records.push(student.clone());
        self.after_mutation(StoreEvent::Created {
            record: RecordSummary::from_student(&student),
        });

        Ok(student)
    }

    /// Get a record by internal id.
    pub fn read(&self, id: &RecordId) -> Option<&Student> {
        self.records.iter().find(|s| &s.id == id)
    }

    /// Replace the editable attributes of record `id` with `input`.
    pub fn update(&mut self, id: &RecordId, input: &StudentInput) -> Result<Student> {
        let pos = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let fields = self.prepare(input, Some(id))?;

        let student = &mut self.records[pos];
        student.apply(fields, Utc::now());
        let updated = student.clone();

        tracing::debug!(id = %updated.id, student_id = %updated.student_id, "updated record");

        self.after_mutation(StoreEvent::Updated {
            record: RecordSummary::from_student(&updated),
        });

        Ok(updated)
    }

    /// Remove record `id`.
    pub fn delete(&mut self, id: &RecordId) -> Result<Student> {
        let pos = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let student = self.records.remove(pos);
        self.selection.remove(id);

        tracing::debug!(id = %student.id, "deleted record");

        self.after_mutation(StoreEvent::Deleted {
            ids: vec![student.id.clone()],
        });

        Ok(student)
    }

    /// Remove every listed record. Unknown ids are skipped.
    pub fn delete_many(&mut self, ids: &[RecordId]) -> Result<Vec<Student>> {
        let mut deleted = Vec::new();

        for id in ids {
            if let Some(pos) = self.position(id) {
                deleted.push(self.records.remove(pos));
                self.selection.remove(id);
            }
        }

        if !deleted.is_empty() {
            tracing::debug!(count = deleted.len(), "deleted records");
            self.after_mutation(StoreEvent::Deleted {
                ids: deleted.iter().map(|s| s.id.clone()).collect(),
            });
        }

        Ok(deleted)
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[Student] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find_by_student_id(&self, student_id: &str) -> Option<&Student> {
        self.find_by_key(KeyField::StudentId, student_id)
    }

    pub fn find_by_email(&self, email: &str) -> Option<&Student> {
        self.find_by_key(KeyField::Email, email)
    }

    fn find_by_key(&self, field: KeyField, value: &str) -> Option<&Student> {
        self.records.iter().find(|s| s.key(field) == value)
    }

    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records.iter().position(|s| &s.id == id)
    }

    // --- Validation ---

    /// Report every field violation and key conflict of `input`.
    ///
    /// `exclude` is the record being edited; its own keys never conflict.
    pub fn validate(&self, input: &StudentInput, exclude: Option<&RecordId>) -> ValidationOutcome {
        let violations = match validation::check(input, Self::today()) {
            Ok(_) => Vec::new(),
            Err(violations) => violations,
        };

        ValidationOutcome {
            violations,
            conflicts: self.conflicts(&input.student_id, &input.email, exclude),
        }
    }

    fn conflicts(
        &self,
        student_id: &str,
        email: &str,
        exclude: Option<&RecordId>,
    ) -> Vec<KeyConflict> {
        [(KeyField::StudentId, student_id), (KeyField::Email, email)]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(field, value)| {
                self.records
                    .iter()
                    .find(|s| s.key(field) == value && Some(&s.id) != exclude)
                    .map(|holder| KeyConflict {
                        field,
                        value: value.to_string(),
                        holder: holder.id.clone(),
                    })
            })
            .collect()
    }

    /// Field rules first, then uniqueness (student ID before email).
    fn prepare(&self, input: &StudentInput, exclude: Option<&RecordId>) -> Result<StudentFields> {
        let fields = validation::check(input, Self::today()).map_err(StoreError::Validation)?;

        if let Some(conflict) = self
            .conflicts(&fields.student_id, &fields.email, exclude)
            .into_iter()
            .next()
        {
            return Err(StoreError::DuplicateKey {
                field: conflict.field,
                value: conflict.value,
            });
        }

        Ok(fields)
    }

    // --- Query Operations ---

    /// Recompute the filtered view and go back to the first page.
    pub fn apply_filters(&mut self) {
        self.filtered = query::apply(&self.records, &self.query, Self::today());
        self.pagination.reset();
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.query.search_term = term.into();
        self.apply_filters();
    }

    pub fn set_gender_filter(&mut self, gender: Option<Gender>) {
        self.query.gender = gender;
        self.apply_filters();
    }

    pub fn set_sort(&mut self, key: SortKey, order: SortOrder) {
        self.query.sort_key = key;
        self.query.sort_order = order;
        self.apply_filters();
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// Records of the filtered view, in view order.
    pub fn filtered(&self) -> impl Iterator<Item = &Student> + '_ {
        self.filtered.iter().map(move |&pos| &self.records[pos])
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    // --- Pagination ---

    /// Records on the current page.
    pub fn page(&self) -> Vec<&Student> {
        self.filtered[self.pagination.range(self.filtered.len())]
            .iter()
            .map(|&pos| &self.records[pos])
            .collect()
    }

    pub fn current_page(&self) -> usize {
        self.pagination.page()
    }

    pub fn page_size(&self) -> usize {
        self.pagination.page_size()
    }

    pub fn total_pages(&self) -> usize {
        self.pagination.total_pages(self.filtered.len())
    }

    /// Go to page `page` (1-based). Out-of-range pages leave the current page unchanged.
    pub fn set_page(&mut self, page: usize) -> bool {
        self.pagination.set_page(page, self.filtered.len())
    }

    /// Change the page size and go back to the first page.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if self.pagination.set_page_size(page_size) {
            Ok(())
        } else {
            Err(StoreError::InvalidOperation(
                "page size must be at least 1".into(),
            ))
        }
    }

    // --- Selection ---

    /// Mark a live record for bulk operations. Returns whether it was newly selected.
    pub fn select(&mut self, id: &RecordId) -> bool {
        self.position(id).is_some() && self.selection.insert(id.clone())
    }

    pub fn deselect(&mut self, id: &RecordId) -> bool {
        self.selection.remove(id)
    }

    /// Select the records visible on the current page. Returns how many were added.
    pub fn select_all_on_page(&mut self) -> usize {
        let range = self.pagination.range(self.filtered.len());
        let mut added = 0;
        for &pos in &self.filtered[range] {
            if self.selection.insert(self.records[pos].id.clone()) {
                added += 1;
            }
        }
        added
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selection.contains(id)
    }

    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// Selected records, in store order.
    pub fn selected(&self) -> Vec<&Student> {
        self.records
            .iter()
            .filter(|s| self.selection.contains(&s.id))
            .collect()
    }

    // --- Statistics ---

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.records.len(),
            filtered: self.filtered.len(),
            selected: self.selection.len(),
            ..Default::default()
        };

        for student in &self.records {
            match student.gender {
                Gender::Male => stats.male += 1,
                Gender::Female => stats.female += 1,
            }
            *stats.by_status.entry(student.status).or_insert(0) += 1;
        }

        stats
    }

    // --- Import / Export ---

    /// Every record as a pretty-printed export document.
    pub fn export_all(&self) -> Result<String> {
        Self::export(self.records.iter().collect())
    }

    /// The selected records as a pretty-printed export document.
    pub fn export_selected(&self) -> Result<String> {
        Self::export(self.selected())
    }

    fn export(students: Vec<&Student>) -> Result<String> {
        let document = ExportDocument {
            students,
            exported: Utc::now(),
            version: FORMAT_VERSION,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Add every record of an export document, or none of them.
    ///
    /// Each entry must pass the same rules as `create`, and its student ID
    /// and email must be free both in the store and among the earlier
    /// entries of the batch. Any problem rejects the whole batch with the
    /// full list of issues. Identifiers and timestamps in the document are
    /// kept unless the identifier is already taken.
    pub fn import(&mut self, data: &str) -> Result<usize> {
        let entries = document::parse_entries(data.as_bytes())?;
        let today = Self::today();

        let mut issues = Vec::new();
        let mut accepted: Vec<(StudentDocument, StudentFields)> = Vec::new();
        let mut batch_keys: HashSet<(KeyField, String)> = HashSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let doc = match StudentDocument::from_value(entry) {
                Ok(doc) => doc,
                Err(reason) => {
                    issues.push(ImportIssue {
                        index,
                        problem: ImportProblem::Unreadable { reason },
                    });
                    continue;
                }
            };

            let fields = match validation::check(&doc.to_input(), today) {
                Ok(fields) => fields,
                Err(violations) => {
                    issues.push(ImportIssue {
                        index,
                        problem: ImportProblem::Invalid { violations },
                    });
                    continue;
                }
            };

            let mut clean = true;
            for field in [KeyField::StudentId, KeyField::Email] {
                let value = match field {
                    KeyField::StudentId => &fields.student_id,
                    KeyField::Email => &fields.email,
                };
                let in_store = self.find_by_key(field, value).is_some();
                let in_batch = !batch_keys.insert((field, value.clone()));
                if in_store || in_batch {
                    issues.push(ImportIssue {
                        index,
                        problem: ImportProblem::Duplicate {
                            field,
                            value: value.clone(),
                        },
                    });
                    clean = false;
                }
            }

            if clean {
                accepted.push((doc, fields));
            }
        }

        if !issues.is_empty() {
            tracing::debug!(issues = issues.len(), "import rejected");
            return Err(StoreError::ImportRejected(issues));
        }

        if accepted.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut taken: HashSet<RecordId> = self.records.iter().map(|s| s.id.clone()).collect();
        let count = accepted.len();

        for (doc, fields) in accepted {
            let id = doc
                .id()
                .filter(|id| !taken.contains(id))
                .unwrap_or_else(RecordId::generate);
            taken.insert(id.clone());
            self.records.push(doc.into_student(id, fields, now));
        }

        tracing::info!(count, "imported records");
        self.after_mutation(StoreEvent::Imported { count });

        Ok(count)
    }

    /// Remove every record and clear the selection. Returns how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        self.selection.clear();
        if self.records.is_empty() {
            return Ok(0);
        }

        let removed: Vec<RecordId> = self.records.drain(..).map(|s| s.id).collect();
        let count = removed.len();

        tracing::info!(count, "cleared all records");
        self.after_mutation(StoreEvent::Deleted { ids: removed });

        Ok(count)
    }

    /// Add the built-in sample students whose keys are still free.
    pub fn seed_samples(&mut self) -> Result<usize> {
        let mut added = 0;
        for input in sample_students() {
            if self.find_by_student_id(&input.student_id).is_none()
                && self.find_by_email(&input.email).is_none()
            {
                self.create(&input)?;
                added += 1;
            }
        }
        tracing::info!(added, "seeded sample records");
        Ok(added)
    }

    // --- Persistence ---

    /// Write all records to storage now.
    pub fn flush(&mut self) -> Result<()> {
        self.save()?;
        self.events.publish(StoreEvent::Persisted {
            count: self.records.len(),
        });
        Ok(())
    }

    /// Whether there are mutations not yet written to storage.
    pub fn is_dirty(&self) -> bool {
        self.unsaved > 0
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn save(&mut self) -> Result<()> {
        let snapshot = SnapshotDocument {
            students: self.records.iter().collect(),
            version: FORMAT_VERSION,
            timestamp: Utc::now(),
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        self.storage.put(&self.config.storage_key, &bytes)?;
        self.unsaved = 0;

        tracing::debug!(count = self.records.len(), key = %self.config.storage_key, "persisted records");
        Ok(())
    }

    /// Automatic write per policy. Failures are logged, never returned:
    /// the in-memory change stands and the store stays dirty.
    fn persist_per_policy(&mut self) {
        let due = match self.config.persist_policy {
            PersistPolicy::EveryMutation => true,
            PersistPolicy::EveryNMutations { count } => self.unsaved >= count.max(1),
            PersistPolicy::Manual => false,
        };

        if due {
            if let Err(e) = self.save() {
                tracing::warn!(error = %e, pending = self.unsaved, "failed to persist records");
            }
        }
    }

    fn after_mutation(&mut self, event: StoreEvent) {
        self.unsaved += 1;
        self.persist_per_policy();
        self.apply_filters();
        self.events.publish(event);
    }

    // --- Events ---

    /// Subscribe to change events.
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }
}

impl Drop for StudentStore {
    fn drop(&mut self) {
        // Best-effort save at end of session, unless the host owns the timing
        if self.is_dirty() && self.config.persist_policy != PersistPolicy::Manual {
            if let Err(e) = self.save() {
                tracing::warn!(error = %e, "failed to persist records on close");
            }
        }
    }
}
