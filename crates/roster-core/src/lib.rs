//! Core domain model for the roster: reference data, employees, and the
//! raw/candidate handoff types used by the import pipeline.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "roster-core";

/// Location assigned to departments created lazily during an import.
pub const DEFAULT_DEPARTMENT_LOCATION: &str = "Unknown";

pub const DEPARTMENT_NAME_MAX_LEN: usize = 100;
pub const DEPARTMENT_LOCATION_MAX_LEN: usize = 255;
pub const POSITION_TITLE_MAX_LEN: usize = 150;
pub const PERSON_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 254;
pub const PHONE_NUMBER_MAX_LEN: usize = 15;

/// Salary column is NUMERIC(12, 2).
pub const SALARY_SCALE: u32 = 2;
pub const SALARY_MAX_DIGITS: u32 = 12;

pub type DepartmentId = i64;
pub type PositionId = i64;
pub type EmployeeId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted employee row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_joining: NaiveDate,
    pub salary: Decimal,
    pub department_id: DepartmentId,
    pub position_id: PositionId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Insert payload for a bulk write. References are already resolved to ids.
///
/// `date_of_joining` stays optional here: the column is NOT NULL, so a
/// missing value is rejected by the store when the batch is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_joining: Option<NaiveDate>,
    pub salary: Decimal,
    pub department_id: DepartmentId,
    pub position_id: PositionId,
}

/// Normalized row that passed validation but whose department/position names
/// have not been resolved to identifiers yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeCandidate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub date_of_joining: Option<NaiveDate>,
    pub salary: Decimal,
    pub department: String,
    pub position: String,
}

impl EmployeeCandidate {
    pub fn into_new_employee(
        self,
        department_id: DepartmentId,
        position_id: PositionId,
    ) -> NewEmployee {
        NewEmployee {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone_number: self.phone_number,
            date_of_birth: self.date_of_birth,
            date_of_joining: self.date_of_joining,
            salary: self.salary,
            department_id,
            position_id,
        }
    }
}

/// One CSV record as read from the source, untouched.
///
/// Headers are shared across every record of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub line: u64,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            headers,
            values,
        }
    }

    /// Value of the named column, or `None` when the column is absent or the
    /// record is shorter than the header row.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, header) in self.headers.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            let value = self.values.get(idx).map(String::as_str).unwrap_or("");
            write!(f, "{header:?}: {value:?}")?;
        }
        write!(f, "}}")
    }
}
