//! The filter/sort pipeline.

use crate::types::{Gender, ParseEnumError, Student};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Attribute the view is sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Full name, case-insensitive.
    #[default]
    Name,
    /// Student ID, case-insensitive.
    StudentId,
    /// Age in years; records without a birth date count as 0.
    Age,
    /// GPA; records without one count as 0.
    Gpa,
}

impl FromStr for SortKey {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "studentid" | "student_id" | "student-id" | "id" => Ok(SortKey::StudentId),
            "age" => Ok(SortKey::Age),
            "gpa" => Ok(SortKey::Gpa),
            _ => Err(ParseEnumError {
                kind: "sort key",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Name => f.write_str("name"),
            SortKey::StudentId => f.write_str("studentId"),
            SortKey::Age => f.write_str("age"),
            SortKey::Gpa => f.write_str("gpa"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Orient an ascending comparison. Ties stay ties.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Search, filter and sort settings of the view.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    /// Case-insensitive substring; empty matches everything.
    pub search_term: String,
    pub gender: Option<Gender>,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

/// Sort value extracted once per record.
enum SortValue {
    Text(String),
    Number(f64),
}

impl SortValue {
    fn of(student: &Student, key: SortKey, today: NaiveDate) -> Self {
        match key {
            SortKey::Name => SortValue::Text(student.full_name.to_lowercase()),
            SortKey::StudentId => SortValue::Text(student.student_id.to_lowercase()),
            SortKey::Age => SortValue::Number(student.age_on(today).unwrap_or(0) as f64),
            SortKey::Gpa => SortValue::Number(student.gpa.unwrap_or(0.0)),
        }
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Whether any searchable attribute contains `term_lower`.
///
/// `term_lower` must already be lower-cased.
pub fn matches_search(student: &Student, term_lower: &str) -> bool {
    student.full_name.to_lowercase().contains(term_lower)
        || student.student_id.to_lowercase().contains(term_lower)
        || student.email.to_lowercase().contains(term_lower)
        || student
            .phone
            .as_deref()
            .is_some_and(|phone| phone.contains(term_lower))
        || student
            .department
            .as_deref()
            .is_some_and(|department| department.to_lowercase().contains(term_lower))
}

/// Run the pipeline and return the positions of the matching records in view order.
///
/// The sort is stable: records comparing equal keep their store order, so
/// identical inputs always yield identical views.
pub fn apply(records: &[Student], query: &QueryState, today: NaiveDate) -> Vec<usize> {
    let term = query.search_term.to_lowercase();

    let mut keyed: Vec<(SortValue, usize)> = records
        .iter()
        .enumerate()
        .filter(|(_, student)| term.is_empty() || matches_search(student, &term))
        .filter(|(_, student)| query.gender.map_or(true, |gender| student.gender == gender))
        .map(|(pos, student)| (SortValue::of(student, query.sort_key, today), pos))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| query.sort_order.apply(a.compare(b)));

    keyed.into_iter().map(|(_, pos)| pos).collect()
}
