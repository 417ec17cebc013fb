//! Core types for the student store.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Internal identifier for a record.
///
/// Opaque and stable for the lifetime of the record. Freshly created records
/// get a UUID v4; identifiers read back from persisted or imported data are
/// kept verbatim, whatever their shape.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Generate a new random identifier.
    pub fn generate() -> Self {
        RecordId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

/// Failure to parse one of the enumerated attributes from text.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Gender of a student.
///
/// Serialized with the labels used by the persisted data (`Nam` / `Nữ`);
/// the English words are accepted when reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "Nam", alias = "male")]
    Male,
    #[serde(rename = "Nữ", alias = "female")]
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    /// Label as stored and displayed.
    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Nam",
            Gender::Female => "Nữ",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nam" | "male" => Ok(Gender::Male),
            "nữ" | "female" => Ok(Gender::Female),
            _ => Err(ParseEnumError {
                kind: "gender",
                value: s.to_string(),
            }),
        }
    }
}

/// Enrollment status of a student.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum StudentStatus {
    #[default]
    #[serde(rename = "Đang học", alias = "active")]
    Studying,
    #[serde(rename = "Tạm nghỉ", alias = "inactive")]
    OnLeave,
    #[serde(rename = "Đã tốt nghiệp", alias = "graduated")]
    Graduated,
    #[serde(rename = "Thôi học", alias = "dropped")]
    Dropped,
}

impl StudentStatus {
    pub const ALL: [StudentStatus; 4] = [
        StudentStatus::Studying,
        StudentStatus::OnLeave,
        StudentStatus::Graduated,
        StudentStatus::Dropped,
    ];

    /// Label as stored and displayed.
    pub fn label(&self) -> &'static str {
        match self {
            StudentStatus::Studying => "Đang học",
            StudentStatus::OnLeave => "Tạm nghỉ",
            StudentStatus::Graduated => "Đã tốt nghiệp",
            StudentStatus::Dropped => "Thôi học",
        }
    }

    /// Stable ASCII slug, suitable for styling hooks and CLI arguments.
    pub fn slug(&self) -> &'static str {
        match self {
            StudentStatus::Studying => "active",
            StudentStatus::OnLeave => "inactive",
            StudentStatus::Graduated => "graduated",
            StudentStatus::Dropped => "dropped",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StudentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        StudentStatus::ALL
            .into_iter()
            .find(|status| {
                status.label().eq_ignore_ascii_case(trimmed)
                    || status.slug().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ParseEnumError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

/// Coarse GPA band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpaLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

impl GpaLevel {
    pub fn from_gpa(gpa: f64) -> Self {
        if gpa >= 3.6 {
            GpaLevel::Excellent
        } else if gpa >= 3.0 {
            GpaLevel::Good
        } else if gpa >= 2.0 {
            GpaLevel::Average
        } else {
            GpaLevel::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GpaLevel::Excellent => "excellent",
            GpaLevel::Good => "good",
            GpaLevel::Average => "average",
            GpaLevel::Poor => "poor",
        }
    }
}

/// One of the two unique business keys of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyField {
    StudentId,
    Email,
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyField::StudentId => f.write_str("student ID"),
            KeyField::Email => f.write_str("email"),
        }
    }
}

/// Full years between `birth` and `today`.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// A student record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Internal identifier (assigned by the store).
    pub id: RecordId,

    /// Business key, ASCII alphanumeric, unique.
    pub student_id: String,

    pub full_name: String,

    /// Unique across the store.
    pub email: String,

    pub gender: Gender,

    pub phone: Option<String>,

    pub birth_date: Option<NaiveDate>,

    pub department: Option<String>,

    pub address: Option<String>,

    /// Within [0, 4] when present.
    pub gpa: Option<f64>,

    pub status: StudentStatus,

    pub created_at: DateTime<Utc>,

    /// Never earlier than `created_at`.
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// Build a new record from validated fields.
    pub fn new(id: RecordId, fields: StudentFields, now: DateTime<Utc>) -> Self {
        let StudentFields {
            student_id,
            full_name,
            email,
            gender,
            phone,
            birth_date,
            department,
            address,
            gpa,
            status,
        } = fields;

        Self {
            id,
            student_id,
            full_name,
            email,
            gender,
            phone,
            birth_date,
            department,
            address,
            gpa,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every editable attribute. Identity and creation time are kept.
    pub fn apply(&mut self, fields: StudentFields, now: DateTime<Utc>) {
        self.student_id = fields.student_id;
        self.full_name = fields.full_name;
        self.email = fields.email;
        self.gender = fields.gender;
        self.phone = fields.phone;
        self.birth_date = fields.birth_date;
        self.department = fields.department;
        self.address = fields.address;
        self.gpa = fields.gpa;
        self.status = fields.status;
        self.touch(now);
    }

    /// Refresh `updated_at`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.updated_at).max(self.created_at);
    }

    /// Age in full years on the given day, if a birth date is known.
    pub fn age_on(&self, today: NaiveDate) -> Option<i32> {
        self.birth_date.map(|birth| age_on(birth, today))
    }

    /// Age in full years today.
    pub fn age(&self) -> Option<i32> {
        self.age_on(Utc::now().date_naive())
    }

    pub fn gpa_level(&self) -> Option<GpaLevel> {
        self.gpa.map(GpaLevel::from_gpa)
    }

    /// The value of one of the unique keys.
    pub fn key(&self, field: KeyField) -> &str {
        match field {
            KeyField::StudentId => &self.student_id,
            KeyField::Email => &self.email,
        }
    }
}

/// Editable attributes of a record after validation.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentFields {
    pub student_id: String,
    pub full_name: String,
    pub email: String,
    pub gender: Gender,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub department: Option<String>,
    pub address: Option<String>,
    pub gpa: Option<f64>,
    pub status: StudentStatus,
}

/// Unvalidated input for creating or updating a record.
///
/// Text attributes are carried as entered; `validation::check` turns them
/// into [`StudentFields`] or reports every rule they break.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudentInput {
    pub student_id: String,
    pub full_name: String,
    pub email: String,
    pub gender: String,
    pub phone: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub birth_date: Option<String>,
    pub department: Option<String>,
    pub address: Option<String>,
    pub gpa: Option<f64>,
    pub status: Option<String>,
}

impl StudentInput {
    /// Input with the required attributes set.
    pub fn new(
        student_id: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
        gender: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            full_name: full_name.into(),
            email: email.into(),
            gender: gender.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_birth_date(mut self, birth_date: impl Into<String>) -> Self {
        self.birth_date = Some(birth_date.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_gpa(mut self, gpa: f64) -> Self {
        self.gpa = Some(gpa);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
}

impl From<&Student> for StudentInput {
    fn from(student: &Student) -> Self {
        Self {
            student_id: student.student_id.clone(),
            full_name: student.full_name.clone(),
            email: student.email.clone(),
            gender: student.gender.label().to_string(),
            phone: student.phone.clone(),
            birth_date: student.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            department: student.department.clone(),
            address: student.address.clone(),
            gpa: student.gpa,
            status: Some(student.status.label().to_string()),
        }
    }
}

/// Store statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub male: usize,
    pub female: usize,
    /// Records in the current filtered view.
    pub filtered: usize,
    pub selected: usize,
    pub by_status: BTreeMap<StudentStatus, usize>,
}
