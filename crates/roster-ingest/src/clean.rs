//! Converts a raw HR export into the import CSV format.
//!
//! Input columns: `Employee_Name, Joining_Date, Salary, Department, Position`.
//! Emails, phone numbers and dates of birth are synthesized from a seeded RNG
//! so the same input and seed always produce the same output.

use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::Context;
use chrono::{Duration, Months, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_CLEAN_SEED: u64 = 42;
pub const DEFAULT_EMAIL_DOMAIN: &str = "example.com";

const MIN_AGE_YEARS: u32 = 22;
const MAX_AGE_YEARS: u32 = 60;
const PHONE_LOW: u64 = 1_000_000_000;
const PHONE_HIGH: u64 = 10_000_000_000;

#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub seed: u64,
    /// Ages are computed relative to this date.
    pub reference_date: NaiveDate,
    pub email_domain: String,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            seed: DEFAULT_CLEAN_SEED,
            reference_date: Utc::now().date_naive(),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CleanError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: Employee_Name is empty")]
    EmptyName { line: u64 },
    #[error("reference date {0} is too early to derive a birth date range")]
    ReferenceDate(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanSummary {
    pub rows: u64,
}

#[derive(Debug, Deserialize)]
struct HrExportRow {
    #[serde(rename = "Employee_Name")]
    employee_name: String,
    #[serde(rename = "Joining_Date", default)]
    joining_date: String,
    #[serde(rename = "Salary", default)]
    salary: String,
    #[serde(rename = "Department", default)]
    department: String,
    #[serde(rename = "Position", default)]
    position: String,
}

/// Field order matches the import header.
#[derive(Debug, Serialize)]
struct ImportRow {
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
    date_of_birth: NaiveDate,
    date_of_joining: String,
    salary: String,
    department: String,
    position: String,
}

struct Synthesizer {
    rng: StdRng,
    domain: String,
    emails: HashSet<String>,
    phones: HashSet<u64>,
    earliest_birth: NaiveDate,
    birth_span_days: i64,
}

impl Synthesizer {
    fn new(options: &CleanOptions) -> Result<Self, CleanError> {
        let reference = options.reference_date;
        let latest_birth = reference
            .checked_sub_months(Months::new(MIN_AGE_YEARS * 12))
            .ok_or(CleanError::ReferenceDate(reference))?;
        // Oldest allowed is one day short of turning MAX_AGE_YEARS + 1.
        let earliest_birth = reference
            .checked_sub_months(Months::new((MAX_AGE_YEARS + 1) * 12))
            .and_then(|d| d.succ_opt())
            .ok_or(CleanError::ReferenceDate(reference))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(options.seed),
            domain: options.email_domain.clone(),
            emails: HashSet::new(),
            phones: HashSet::new(),
            earliest_birth,
            birth_span_days: (latest_birth - earliest_birth).num_days(),
        })
    }

    /// `first.last@domain`, lower-cased, with `1`, `2`, ... appended to the
    /// local part until unused.
    fn email(&mut self, first: &str, last: &str) -> String {
        let local = if last.is_empty() {
            first.to_lowercase()
        } else {
            format!("{}.{}", first.to_lowercase(), last.to_lowercase())
        };
        let mut email = format!("{local}@{}", self.domain);
        let mut counter = 1u32;
        while self.emails.contains(&email) {
            email = format!("{local}{counter}@{}", self.domain);
            counter += 1;
        }
        self.emails.insert(email.clone());
        email
    }

    fn phone(&mut self) -> String {
        loop {
            let candidate = self.rng.gen_range(PHONE_LOW..PHONE_HIGH);
            if self.phones.insert(candidate) {
                return candidate.to_string();
            }
        }
    }

    fn date_of_birth(&mut self) -> NaiveDate {
        let offset = self.rng.gen_range(0..=self.birth_span_days);
        self.earliest_birth + Duration::days(offset)
    }
}

/// Splits on the first space; the remainder (possibly empty) is the last name.
fn split_name(full: &str) -> (&str, &str) {
    match full.trim().split_once(' ') {
        Some((first, last)) => (first, last.trim()),
        None => (full.trim(), ""),
    }
}

pub fn clean_employee_records<R: io::Read, W: io::Write>(
    reader: R,
    writer: W,
    options: &CleanOptions,
) -> Result<CleanSummary, CleanError> {
    let mut synth = Synthesizer::new(options)?;
    let mut input = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let mut output = csv::Writer::from_writer(writer);

    let mut rows = 0u64;
    for result in input.deserialize::<HrExportRow>() {
        let row = result?;
        let (first, last) = split_name(&row.employee_name);
        if first.is_empty() {
            return Err(CleanError::EmptyName { line: rows + 2 });
        }
        let email = synth.email(first, last);
        let cleaned = ImportRow {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email,
            phone_number: synth.phone(),
            date_of_birth: synth.date_of_birth(),
            date_of_joining: row.joining_date,
            salary: row.salary,
            department: row.department,
            position: row.position,
        };
        output.serialize(cleaned)?;
        rows += 1;
    }
    output.flush()?;
    Ok(CleanSummary { rows })
}

pub fn clean_file(
    input: &Path,
    output: &Path,
    options: &CleanOptions,
) -> anyhow::Result<CleanSummary> {
    let reader = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let writer = File::create(output).with_context(|| format!("creating {}", output.display()))?;
    let summary = clean_employee_records(io::BufReader::new(reader), io::BufWriter::new(writer), options)
        .with_context(|| format!("cleaning {}", input.display()))?;
    info!(rows = summary.rows, output = %output.display(), "cleaned employee records");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const EXPORT: &str = "\
Employee_Name,Joining_Date,Salary,Department,Position
Ada Lovelace,2021-03-01,50000,Engineering,Engineer
Ada Lovelace,2022-04-01,51000,Engineering,Engineer
Grace Brewster Hopper,2020-01-15,72000.50,Research,Scientist
Plato,2019-05-05,,Philosophy,Thinker
";

    fn options() -> CleanOptions {
        CleanOptions {
            reference_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ..CleanOptions::default()
        }
    }

    fn clean(input: &str, options: &CleanOptions) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let summary = clean_employee_records(input.as_bytes(), &mut out, options).unwrap();
        let records = csv::Reader::from_reader(out.as_slice())
            .records()
            .map(|r| r.map(|r| r.iter().map(str::to_string).collect::<Vec<_>>()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(summary.rows as usize, records.len());
        records
    }

    #[test]
    fn output_matches_import_header() {
        let mut out = Vec::new();
        clean_employee_records(EXPORT.as_bytes(), &mut out, &options()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "first_name,last_name,email,phone_number,date_of_birth,date_of_joining,salary,department,position"
        );
    }

    #[test]
    fn names_split_on_first_space_and_emails_are_unique() {
        let rows = clean(EXPORT, &options());
        assert_eq!(&rows[0][0], "Ada");
        assert_eq!(&rows[0][1], "Lovelace");
        assert_eq!(&rows[0][2], "ada.lovelace@example.com");
        assert_eq!(&rows[1][2], "ada.lovelace1@example.com");
        assert_eq!(&rows[2][0], "Grace");
        assert_eq!(&rows[2][1], "Brewster Hopper");
        assert_eq!(&rows[2][2], "grace.brewster hopper@example.com");
        assert_eq!(&rows[3][1], "");
        assert_eq!(&rows[3][2], "plato@example.com");
        assert_eq!(&rows[3][6], "");
    }

    #[test]
    fn phones_are_unique_ten_digits() {
        let rows = clean(EXPORT, &options());
        let phones: HashSet<&str> = rows.iter().map(|r| r[3].as_str()).collect();
        assert_eq!(phones.len(), rows.len());
        assert!(phones
            .iter()
            .all(|p| p.len() == 10 && p.chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn birth_dates_fall_in_working_age_range() {
        let opts = options();
        let rows = clean(EXPORT, &opts);
        let youngest = NaiveDate::from_ymd_opt(2003, 6, 1).unwrap();
        let oldest = NaiveDate::from_ymd_opt(1964, 6, 2).unwrap();
        for row in &rows {
            let dob = NaiveDate::parse_from_str(&row[4], "%Y-%m-%d").unwrap();
            assert!(dob <= youngest && dob >= oldest, "{dob} out of range");
        }
    }

    #[test]
    fn same_seed_is_reproducible() {
        assert_eq!(clean(EXPORT, &options()), clean(EXPORT, &options()));
        let other = CleanOptions {
            seed: 7,
            ..options()
        };
        assert_ne!(clean(EXPORT, &options())[0][3], clean(EXPORT, &other)[0][3]);
    }

    #[test]
    fn blank_name_is_an_error() {
        let input = "Employee_Name,Joining_Date,Salary,Department,Position\n  ,2020-01-01,1,A,B\n";
        let err = clean_employee_records(input.as_bytes(), Vec::new(), &options()).unwrap_err();
        assert!(matches!(err, CleanError::EmptyName { line: 2 }));
    }

    #[test]
    fn clean_file_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("cleaned.csv");
        std::fs::write(&input, EXPORT).unwrap();

        let summary = clean_file(&input, &output, &options()).unwrap();
        assert_eq!(summary.rows, 4);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.lines().count(), 5);
    }
}
