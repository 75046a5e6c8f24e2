//! Per-row rejection taxonomy, run counters and the run report artifact.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::writer::FlushOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    MissingRequiredField,
    InvalidDate,
    InvalidSalary,
    DuplicateEmail,
    BatchWriteFailure,
    /// The CSV record itself could not be decoded.
    MalformedRecord,
    /// A per-row lookup or lazy create against the store failed.
    StoreFailure,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::MissingRequiredField => "MissingRequiredField",
            RejectReason::InvalidDate => "InvalidDate",
            RejectReason::InvalidSalary => "InvalidSalary",
            RejectReason::DuplicateEmail => "DuplicateEmail",
            RejectReason::BatchWriteFailure => "BatchWriteFailure",
            RejectReason::MalformedRecord => "MalformedRecord",
            RejectReason::StoreFailure => "StoreFailure",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single row was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {detail}")]
pub struct RowRejection {
    pub reason: RejectReason,
    pub detail: String,
}

impl RowRejection {
    pub fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch: usize,
    pub rows: usize,
    pub committed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub source: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rows_read: u64,
    pub created: u64,
    pub skipped: u64,
    pub skipped_by_reason: BTreeMap<RejectReason, u64>,
    pub batches: Vec<BatchRecord>,
    pub departments_created: usize,
    pub positions_created: usize,
}

impl ImportSummary {
    pub fn skipped_for(&self, reason: RejectReason) -> u64 {
        self.skipped_by_reason.get(&reason).copied().unwrap_or(0)
    }
}

/// Running counters for one import run.
#[derive(Debug, Default)]
pub struct RunReporter {
    rows_read: u64,
    created: u64,
    skipped: u64,
    skipped_by_reason: BTreeMap<RejectReason, u64>,
    batches: Vec<BatchRecord>,
}

impl RunReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&mut self) {
        self.rows_read += 1;
    }

    pub fn record_rejection(&mut self, rejection: &RowRejection) {
        self.skip(rejection.reason, 1);
    }

    pub fn record_flush(&mut self, outcome: &FlushOutcome) {
        match outcome {
            FlushOutcome::Committed { batch, rows } => {
                self.created += *rows as u64;
                self.batches.push(BatchRecord {
                    batch: *batch,
                    rows: *rows,
                    committed: true,
                });
            }
            FlushOutcome::Failed { batch, rows, .. } => {
                self.skip(RejectReason::BatchWriteFailure, rows.len() as u64);
                self.batches.push(BatchRecord {
                    batch: *batch,
                    rows: rows.len(),
                    committed: false,
                });
            }
        }
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn skip(&mut self, reason: RejectReason, rows: u64) {
        self.skipped += rows;
        *self.skipped_by_reason.entry(reason).or_default() += rows;
    }

    pub fn finish(
        self,
        run_id: Uuid,
        source: Option<String>,
        started_at: DateTime<Utc>,
        departments_created: usize,
        positions_created: usize,
    ) -> ImportSummary {
        ImportSummary {
            run_id,
            source,
            started_at,
            finished_at: Utc::now(),
            rows_read: self.rows_read,
            created: self.created,
            skipped: self.skipped,
            skipped_by_reason: self.skipped_by_reason,
            batches: self.batches,
            departments_created,
            positions_created,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ReportArtifact<'a> {
    summary: &'a ImportSummary,
    input_sha256: Option<String>,
}

/// Writes `<reports_dir>/<run_id>/import_report.json` and returns its path.
pub async fn write_report(
    reports_dir: &Path,
    summary: &ImportSummary,
    input: Option<&Path>,
) -> anyhow::Result<PathBuf> {
    let run_dir = reports_dir.join(summary.run_id.to_string());
    fs::create_dir_all(&run_dir)
        .await
        .with_context(|| format!("creating {}", run_dir.display()))?;

    let input_sha256 = match input {
        Some(path) => Some(sha256_file(path).await?),
        None => None,
    };
    let artifact = ReportArtifact {
        summary,
        input_sha256,
    };
    let bytes = serde_json::to_vec_pretty(&artifact).context("serializing import report")?;
    let report_path = run_dir.join("import_report.json");
    fs::write(&report_path, bytes)
        .await
        .with_context(|| format!("writing {}", report_path.display()))?;
    Ok(report_path)
}

async fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut file = fs::File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
