//! Field rules for student input.
//!
//! Every rule is evaluated on every call so callers can show all problems
//! at once. Uniqueness of the business keys depends on the other records
//! and is checked by the store, not here.

use crate::types::{age_on, Gender, StudentFields, StudentInput, StudentStatus};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static STUDENT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("Invalid student ID regex"));

/// Letters from any script, combining marks (decomposed diacritics) and whitespace.
static FULL_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{M}\s]+$").expect("Invalid full name regex"));

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex"));

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10,11}$").expect("Invalid phone regex"));

pub const MIN_AGE: i32 = 16;
pub const MAX_AGE: i32 = 100;
pub const MIN_GPA: f64 = 0.0;
pub const MAX_GPA: f64 = 4.0;

/// Input attribute a violation refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    StudentId,
    FullName,
    Email,
    Gender,
    Phone,
    Gpa,
    BirthDate,
    Status,
}

impl Field {
    /// Attribute name as it appears in JSON documents.
    pub fn name(&self) -> &'static str {
        match self {
            Field::StudentId => "studentId",
            Field::FullName => "fullName",
            Field::Email => "email",
            Field::Gender => "gender",
            Field::Phone => "phone",
            Field::Gpa => "gpa",
            Field::BirthDate => "birthDate",
            Field::Status => "status",
        }
    }
}

/// A broken field rule.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Violation {
    StudentIdRequired,
    StudentIdNotAlphanumeric,
    FullNameRequired,
    FullNameInvalid,
    EmailRequired,
    EmailInvalid,
    GenderRequired,
    GenderUnknown { value: String },
    PhoneInvalid,
    GpaOutOfRange,
    BirthDateInvalid { value: String },
    AgeOutOfRange { age: i32 },
    StatusUnknown { value: String },
}

impl Violation {
    pub fn field(&self) -> Field {
        match self {
            Violation::StudentIdRequired | Violation::StudentIdNotAlphanumeric => Field::StudentId,
            Violation::FullNameRequired | Violation::FullNameInvalid => Field::FullName,
            Violation::EmailRequired | Violation::EmailInvalid => Field::Email,
            Violation::GenderRequired | Violation::GenderUnknown { .. } => Field::Gender,
            Violation::PhoneInvalid => Field::Phone,
            Violation::GpaOutOfRange => Field::Gpa,
            Violation::BirthDateInvalid { .. } | Violation::AgeOutOfRange { .. } => {
                Field::BirthDate
            }
            Violation::StatusUnknown { .. } => Field::Status,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::StudentIdRequired => write!(f, "student ID is required"),
            Violation::StudentIdNotAlphanumeric => {
                write!(f, "student ID may only contain letters and digits")
            }
            Violation::FullNameRequired => write!(f, "full name is required"),
            Violation::FullNameInvalid => {
                write!(f, "full name may only contain letters and spaces")
            }
            Violation::EmailRequired => write!(f, "email is required"),
            Violation::EmailInvalid => write!(f, "email is not valid"),
            Violation::GenderRequired => write!(f, "gender is required"),
            Violation::GenderUnknown { value } => write!(f, "unknown gender {:?}", value),
            Violation::PhoneInvalid => write!(f, "phone number must have 10-11 digits"),
            Violation::GpaOutOfRange => {
                write!(f, "GPA must be a number from {:.2} to {:.2}", MIN_GPA, MAX_GPA)
            }
            Violation::BirthDateInvalid { value } => {
                write!(f, "birth date {:?} is not a valid YYYY-MM-DD date", value)
            }
            Violation::AgeOutOfRange { age } => write!(
                f,
                "age must be between {} and {} (got {})",
                MIN_AGE, MAX_AGE, age
            ),
            Violation::StatusUnknown { value } => write!(f, "unknown status {:?}", value),
        }
    }
}

/// Trimmed text, or `None` when absent or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Apply every field rule to `input`.
///
/// `today` anchors the age rule. Returns the typed fields when no rule is
/// broken, otherwise the complete list of violations in rule order.
pub fn check(input: &StudentInput, today: NaiveDate) -> Result<StudentFields, Vec<Violation>> {
    let mut violations = Vec::new();

    if input.student_id.trim().is_empty() {
        violations.push(Violation::StudentIdRequired);
    } else if !STUDENT_ID_REGEX.is_match(&input.student_id) {
        violations.push(Violation::StudentIdNotAlphanumeric);
    }

    let full_name = input.full_name.trim();
    if full_name.is_empty() {
        violations.push(Violation::FullNameRequired);
    } else if !FULL_NAME_REGEX.is_match(full_name) {
        violations.push(Violation::FullNameInvalid);
    }

    if input.email.trim().is_empty() {
        violations.push(Violation::EmailRequired);
    } else if !EMAIL_REGEX.is_match(&input.email) {
        violations.push(Violation::EmailInvalid);
    }

    let gender = if input.gender.trim().is_empty() {
        violations.push(Violation::GenderRequired);
        None
    } else {
        match input.gender.parse::<Gender>() {
            Ok(gender) => Some(gender),
            Err(_) => {
                violations.push(Violation::GenderUnknown {
                    value: input.gender.clone(),
                });
                None
            }
        }
    };

    let phone = non_blank(input.phone.as_deref());
    if let Some(phone) = phone {
        if !PHONE_REGEX.is_match(phone) {
            violations.push(Violation::PhoneInvalid);
        }
    }

    if let Some(gpa) = input.gpa {
        if !gpa.is_finite() || !(MIN_GPA..=MAX_GPA).contains(&gpa) {
            violations.push(Violation::GpaOutOfRange);
        }
    }

    let birth_date = match non_blank(input.birth_date.as_deref()) {
        None => None,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => {
                let age = age_on(date, today);
                if !(MIN_AGE..=MAX_AGE).contains(&age) {
                    violations.push(Violation::AgeOutOfRange { age });
                }
                Some(date)
            }
            Err(_) => {
                violations.push(Violation::BirthDateInvalid {
                    value: raw.to_string(),
                });
                None
            }
        },
    };

    let status = match non_blank(input.status.as_deref()) {
        None => Some(StudentStatus::default()),
        Some(raw) => match raw.parse::<StudentStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                violations.push(Violation::StatusUnknown {
                    value: raw.to_string(),
                });
                None
            }
        },
    };

    match (gender, status) {
        (Some(gender), Some(status)) if violations.is_empty() => Ok(StudentFields {
            student_id: input.student_id.clone(),
            full_name: full_name.to_string(),
            email: input.email.clone(),
            gender,
            phone: phone.map(str::to_string),
            birth_date,
            department: non_blank(input.department.as_deref()).map(str::to_string),
            address: non_blank(input.address.as_deref()).map(str::to_string),
            gpa: input.gpa,
            status,
        }),
        _ => Err(violations),
    }
}
