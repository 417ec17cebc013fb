//! JSON documents exchanged with storage and with import/export files.
//!
//! Persisted state: `{ "students": [...], "version", "timestamp" }`.
//! Export files: `{ "students": [...], "exported", "version" }`.
//! Imports accept the export shape; the list may also be named `records`.
//!
//! Reading is lenient: optional text may be empty, `gpa` may be a number
//! or numeric text, and timestamps may be missing.

use crate::error::{Result, StoreError};
use crate::types::{RecordId, Student, StudentFields, StudentInput, StudentStatus};
use crate::validation::non_blank;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into every document.
pub const FORMAT_VERSION: &str = "1.0.0";

/// Persisted store state.
#[derive(Debug, Serialize)]
pub(crate) struct SnapshotDocument<'a> {
    pub students: Vec<&'a Student>,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Export file contents.
#[derive(Debug, Serialize)]
pub(crate) struct ExportDocument<'a> {
    pub students: Vec<&'a Student>,
    pub exported: DateTime<Utc>,
    pub version: &'static str,
}

/// Any incoming document: only the record list matters.
#[derive(Debug, Deserialize)]
struct IncomingDocument {
    #[serde(alias = "records")]
    students: Option<serde_json::Value>,
}

/// Extract the raw record entries of a persisted or imported document.
pub(crate) fn parse_entries(bytes: &[u8]) -> Result<Vec<serde_json::Value>> {
    let document: IncomingDocument = serde_json::from_slice(bytes)
        .map_err(|e| StoreError::MalformedData(format!("not a JSON document: {}", e)))?;

    match document.students {
        Some(serde_json::Value::Array(entries)) => Ok(entries),
        Some(_) => Err(StoreError::MalformedData(
            "\"students\" is not a list".into(),
        )),
        None => Err(StoreError::MalformedData(
            "document has no \"students\" list".into(),
        )),
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum GpaValue {
    Number(f64),
    Text(String),
}

/// One record entry as found in a document, before validation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StudentDocument {
    id: Option<String>,
    student_id: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    gender: Option<String>,
    phone: Option<String>,
    birth_date: Option<String>,
    department: Option<String>,
    address: Option<String>,
    gpa: Option<GpaValue>,
    status: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl StudentDocument {
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, String> {
        if !value.is_object() {
            return Err("entry is not an object".into());
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    /// Identifier carried by the entry, if any.
    pub fn id(&self) -> Option<RecordId> {
        non_blank(self.id.as_deref()).map(RecordId::from)
    }

    /// GPA as a number. Blank text is absent; other non-numeric text is NaN,
    /// which the GPA rule rejects.
    fn gpa(&self) -> Option<f64> {
        match &self.gpa {
            None => None,
            Some(GpaValue::Number(n)) => Some(*n),
            Some(GpaValue::Text(text)) => {
                non_blank(Some(text.as_str())).map(|t| t.parse::<f64>().unwrap_or(f64::NAN))
            }
        }
    }

    /// Input for the field rules.
    pub fn to_input(&self) -> StudentInput {
        StudentInput {
            student_id: self.student_id.clone().unwrap_or_default(),
            full_name: self.full_name.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            gender: self.gender.clone().unwrap_or_default(),
            phone: self.phone.clone(),
            birth_date: self.birth_date.clone(),
            department: self.department.clone(),
            address: self.address.clone(),
            gpa: self.gpa(),
            status: self.status.clone(),
        }
    }

    fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
        non_blank(raw)
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Build the record from validated fields, keeping the entry's
    /// timestamps when present (clamped so `updated_at >= created_at`).
    pub fn into_student(self, id: RecordId, fields: StudentFields, now: DateTime<Utc>) -> Student {
        let created_at = Self::timestamp(self.created_at.as_deref()).unwrap_or(now);
        let updated_at = Self::timestamp(self.updated_at.as_deref()).unwrap_or(created_at);

        let mut student = Student::new(id, fields, created_at);
        student.touch(updated_at);
        student
    }

    /// Rebuild a record from persisted state without re-running the field
    /// rules. Only the attributes needed for a usable record are required;
    /// unparseable optional attributes are dropped.
    pub fn restore(self, now: DateTime<Utc>) -> std::result::Result<Student, String> {
        let student_id = non_blank(self.student_id.as_deref())
            .ok_or("missing studentId")?
            .to_string();
        let full_name = non_blank(self.full_name.as_deref())
            .ok_or("missing fullName")?
            .to_string();
        let email = non_blank(self.email.as_deref())
            .ok_or("missing email")?
            .to_string();
        let gender = self
            .gender
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: crate::types::ParseEnumError| e.to_string())?;

        let fields = StudentFields {
            student_id,
            full_name,
            email,
            gender,
            phone: non_blank(self.phone.as_deref()).map(str::to_string),
            birth_date: non_blank(self.birth_date.as_deref())
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            department: non_blank(self.department.as_deref()).map(str::to_string),
            address: non_blank(self.address.as_deref()).map(str::to_string),
            gpa: self.gpa().filter(|g| g.is_finite() && (0.0..=4.0).contains(g)),
            status: non_blank(self.status.as_deref())
                .and_then(|s| s.parse::<StudentStatus>().ok())
                .unwrap_or_default(),
        };

        let id = self.id().unwrap_or_else(RecordId::generate);
        Ok(self.into_student(id, fields, now))
    }
}
