//! Row validation and normalization. Pure: no store access.

use std::str::FromStr;

use chrono::NaiveDate;
use roster_core::{EmployeeCandidate, RawRecord, SALARY_MAX_DIGITS, SALARY_SCALE};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::report::{RejectReason, RowRejection};

pub const REQUIRED_FIELDS: [&str; 6] = [
    "first_name",
    "last_name",
    "email",
    "phone_number",
    "department",
    "position",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Turns one raw record into a candidate employee or the reason it is skipped.
pub fn validate_record(record: &RawRecord) -> Result<EmployeeCandidate, RowRejection> {
    let missing = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|column| field(record, column).is_none())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(RowRejection::new(
            RejectReason::MissingRequiredField,
            format!("missing required fields: {}", missing.join(", ")),
        ));
    }

    let required = |column: &str| field(record, column).unwrap_or_default().to_string();

    Ok(EmployeeCandidate {
        first_name: required("first_name"),
        last_name: required("last_name"),
        email: required("email"),
        phone_number: required("phone_number"),
        date_of_birth: parse_date("date_of_birth", field(record, "date_of_birth"))?,
        date_of_joining: parse_date("date_of_joining", field(record, "date_of_joining"))?,
        salary: parse_salary(field(record, "salary"))?,
        department: required("department"),
        position: required("position"),
    })
}

/// Trimmed value of a column; absent and blank collapse to `None`.
fn field<'a>(record: &'a RawRecord, column: &str) -> Option<&'a str> {
    record
        .get(column)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn parse_date(column: &str, value: Option<&str>) -> Result<Option<NaiveDate>, RowRejection> {
    let Some(value) = value else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(Some)
        .map_err(|err| {
            RowRejection::new(
                RejectReason::InvalidDate,
                format!("{column} {value:?} is not a YYYY-MM-DD date ({err})"),
            )
        })
}

/// Parses a salary into NUMERIC(12, 2) form. Absent means zero.
pub fn parse_salary(value: Option<&str>) -> Result<Decimal, RowRejection> {
    let Some(value) = value else {
        return Ok(Decimal::new(0, SALARY_SCALE));
    };
    let parsed = Decimal::from_str(value).map_err(|_| {
        RowRejection::new(
            RejectReason::InvalidSalary,
            format!("salary {value:?} is not a number"),
        )
    })?;
    if parsed < Decimal::ZERO {
        return Err(RowRejection::new(
            RejectReason::InvalidSalary,
            format!("salary {value:?} is negative"),
        ));
    }

    let mut salary =
        parsed.round_dp_with_strategy(SALARY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    salary.rescale(SALARY_SCALE);

    let limit = Decimal::from(10i64.pow(SALARY_MAX_DIGITS - SALARY_SCALE));
    if salary >= limit {
        return Err(RowRejection::new(
            RejectReason::InvalidSalary,
            format!("salary {value:?} exceeds {SALARY_MAX_DIGITS} digits"),
        ));
    }
    Ok(salary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HEADERS: [&str; 9] = [
        "first_name",
        "last_name",
        "email",
        "phone_number",
        "date_of_birth",
        "date_of_joining",
        "salary",
        "department",
        "position",
    ];

    fn record(values: [&str; 9]) -> RawRecord {
        let headers: Arc<[String]> = HEADERS.iter().map(|h| h.to_string()).collect();
        RawRecord::new(2, headers, values.iter().map(|v| v.to_string()).collect())
    }

    fn valid() -> [&'static str; 9] {
        [
            " Ada ",
            "Lovelace",
            " ada@example.com ",
            " 5550001 ",
            "1990-12-10",
            "2021-03-01",
            "50000",
            "Engineering",
            "Engineer",
        ]
    }

    #[test]
    fn valid_row_is_trimmed_and_typed() {
        let candidate = validate_record(&record(valid())).expect("valid");
        assert_eq!(candidate.first_name, "Ada");
        assert_eq!(candidate.email, "ada@example.com");
        assert_eq!(candidate.phone_number, "5550001");
        assert_eq!(candidate.date_of_birth, NaiveDate::from_ymd_opt(1990, 12, 10));
        assert_eq!(candidate.date_of_joining, NaiveDate::from_ymd_opt(2021, 3, 1));
        assert_eq!(candidate.salary.to_string(), "50000.00");
    }

    #[test]
    fn blank_required_field_is_missing() {
        let mut values = valid();
        values[3] = "   ";
        let err = validate_record(&record(values)).unwrap_err();
        assert_eq!(err.reason, RejectReason::MissingRequiredField);
        assert!(err.detail.contains("phone_number"));
    }

    #[test]
    fn absent_columns_are_missing() {
        let headers: Arc<[String]> = ["first_name", "email"].iter().map(|h| h.to_string()).collect();
        let rec = RawRecord::new(2, headers, vec!["Ada".into(), "ada@example.com".into()]);
        let err = validate_record(&rec).unwrap_err();
        assert_eq!(err.reason, RejectReason::MissingRequiredField);
        assert!(err.detail.contains("last_name"));
        assert!(err.detail.contains("position"));
    }

    #[test]
    fn optional_fields_normalize_when_absent() {
        let mut values = valid();
        values[4] = "";
        values[5] = "";
        values[6] = "";
        let candidate = validate_record(&record(values)).expect("valid");
        assert_eq!(candidate.date_of_birth, None);
        assert_eq!(candidate.date_of_joining, None);
        assert_eq!(candidate.salary.to_string(), "0.00");
    }

    #[test]
    fn unparsable_date_is_rejected() {
        let mut values = valid();
        values[5] = "03/01/2021";
        let err = validate_record(&record(values)).unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidDate);
        assert!(err.detail.starts_with("date_of_joining"));
    }

    #[test]
    fn salary_normalization() {
        assert_eq!(parse_salary(Some("50000")).unwrap().to_string(), "50000.00");
        assert_eq!(parse_salary(None).unwrap().to_string(), "0.00");
        assert_eq!(parse_salary(Some("1234.565")).unwrap().to_string(), "1234.57");
        assert_eq!(
            parse_salary(Some("abc")).unwrap_err().reason,
            RejectReason::InvalidSalary
        );
        assert_eq!(
            parse_salary(Some("-10")).unwrap_err().reason,
            RejectReason::InvalidSalary
        );
        assert_eq!(
            parse_salary(Some("10000000000")).unwrap_err().reason,
            RejectReason::InvalidSalary
        );
        assert!(parse_salary(Some("9999999999.99")).is_ok());
    }

    #[test]
    fn email_format_is_not_checked() {
        let mut values = valid();
        values[2] = "not-an-email";
        let candidate = validate_record(&record(values)).expect("valid");
        assert_eq!(candidate.email, "not-an-email");
    }
}
