//! Bulk employee CSV import: validation, reference resolution, email
//! deduplication, batched writes and run reporting.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use roster_core::{RawRecord, DEFAULT_DEPARTMENT_LOCATION};
use roster_storage::{PgRosterStore, PgStoreConfig, RosterStore, StoreError};
use thiserror::Error;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub mod clean;
pub mod dedup;
pub mod report;
pub mod resolver;
pub mod validate;
pub mod writer;

pub use dedup::{Admission, DedupTracker};
pub use report::{ImportSummary, RejectReason, RowRejection, RunReporter};
pub use resolver::{ReferenceKind, ReferenceResolver};
pub use writer::{BatchWriter, BufferedRow, FlushOutcome, DEFAULT_BATCH_SIZE};

pub const CRATE_NAME: &str = "roster-ingest";

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub batch_size: usize,
    pub default_location: String,
    pub reports_dir: Option<PathBuf>,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| PgStoreConfig::default().database_url),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            batch_size: std::env::var("IMPORT_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&v: &usize| v > 0)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            default_location: std::env::var("IMPORT_DEFAULT_LOCATION")
                .unwrap_or_else(|_| DEFAULT_DEPARTMENT_LOCATION.to_string()),
            reports_dir: std::env::var("IMPORT_REPORTS_DIR").ok().map(PathBuf::from),
        }
    }

    pub fn store_config(&self) -> PgStoreConfig {
        PgStoreConfig {
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
            ..Default::default()
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            batch_size: self.batch_size,
            default_location: self.default_location.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub default_location: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_location: DEFAULT_DEPARTMENT_LOCATION.to_string(),
        }
    }
}

/// Conditions that abort a run before or outside per-row processing.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("opening {}: {source}", path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reading csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("loading departments and positions: {0}")]
    ReferenceData(#[from] StoreError),
    /// Reading stopped partway through the file. Rows accepted before the
    /// failure were flushed and are counted in `summary`.
    #[error("import interrupted after {} rows: {source}", summary.rows_read)]
    Interrupted {
        summary: Box<ImportSummary>,
        #[source]
        source: csv::Error,
    },
}

/// Observer for row and batch events. The pipeline itself prints nothing.
pub trait ImportHook: Send + Sync {
    fn row_skipped(&self, _line: u64, _rejection: &RowRejection, _raw: Option<&RawRecord>) {}

    fn batch_committed(&self, _batch: usize, _rows: usize, _created_total: u64) {}

    fn batch_failed(&self, _batch: usize, _rows: &[BufferedRow], _error: &StoreError) {}
}

#[derive(Default)]
pub struct NoopImportHook;

impl ImportHook for NoopImportHook {}

/// Per-run mutable state; dropped with the run.
struct RunState {
    resolver: ReferenceResolver,
    dedup: DedupTracker,
    writer: BatchWriter,
    reporter: RunReporter,
}

pub struct ImportPipeline {
    store: Arc<dyn RosterStore>,
    options: PipelineOptions,
    hook: Box<dyn ImportHook>,
}

impl ImportPipeline {
    pub fn new(store: Arc<dyn RosterStore>, options: PipelineOptions) -> Self {
        Self {
            store,
            options,
            hook: Box::<NoopImportHook>::default(),
        }
    }

    pub fn with_hook(mut self, hook: Box<dyn ImportHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Imports the CSV file at `path`. A missing file aborts before any row is read.
    pub async fn run_path(&self, path: &Path) -> Result<ImportSummary, ImportError> {
        if !path.exists() {
            return Err(ImportError::InputNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|source| ImportError::InputUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        self.run_reader(io::BufReader::new(file), Some(path.display().to_string()))
            .await
    }

    /// Imports CSV data from any reader, strictly in record order.
    pub async fn run_reader<R: io::Read + Send>(
        &self,
        reader: R,
        source: Option<String>,
    ) -> Result<ImportSummary, ImportError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("employee_import", %run_id, source = source.as_deref().unwrap_or("-"));
        self.run_inner(run_id, reader, source).instrument(span).await
    }

    async fn run_inner<R: io::Read + Send>(
        &self,
        run_id: Uuid,
        reader: R,
        source: Option<String>,
    ) -> Result<ImportSummary, ImportError> {
        let started_at = Utc::now();
        let store = self.store.as_ref();

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers: Arc<[String]> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut state = RunState {
            resolver: ReferenceResolver::load(store, self.options.default_location.clone())
                .await?,
            dedup: DedupTracker::new(),
            writer: BatchWriter::new(self.options.batch_size),
            reporter: RunReporter::new(),
        };

        let mut record = csv::StringRecord::new();
        loop {
            match csv_reader.read_record(&mut record) {
                Ok(true) => {
                    state.reporter.record_read();
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    let raw = RawRecord::new(
                        line,
                        Arc::clone(&headers),
                        record.iter().map(str::to_string).collect(),
                    );
                    self.process_record(&mut state, raw).await;
                }
                Ok(false) => break,
                Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => {
                    let summary = self.finish_run(state, run_id, source, started_at).await;
                    return Err(ImportError::Interrupted {
                        summary: Box::new(summary),
                        source: err,
                    });
                }
                Err(err) => {
                    state.reporter.record_read();
                    let line = err.position().map(|p| p.line()).unwrap_or(0);
                    let rejection = RowRejection::new(RejectReason::MalformedRecord, err.to_string());
                    self.skip(&mut state, line, rejection, None);
                }
            }
        }

        Ok(self.finish_run(state, run_id, source, started_at).await)
    }

    /// Flushes whatever is still buffered and closes out the run's counters.
    async fn finish_run(
        &self,
        mut state: RunState,
        run_id: Uuid,
        source: Option<String>,
        started_at: DateTime<Utc>,
    ) -> ImportSummary {
        if let Some(outcome) = state.writer.flush(self.store.as_ref()).await {
            self.apply_flush(&mut state, outcome);
        }

        let departments_created = state.resolver.created(ReferenceKind::Department);
        let positions_created = state.resolver.created(ReferenceKind::Position);
        info!(
            created = state.reporter.created(),
            skipped = state.reporter.skipped(),
            batches = state.writer.flushes(),
            departments_created,
            positions_created,
            "employee import finished"
        );
        state.reporter.finish(
            run_id,
            source,
            started_at,
            departments_created,
            positions_created,
        )
    }

    async fn process_record(&self, state: &mut RunState, raw: RawRecord) {
        let store = self.store.as_ref();
        let line = raw.line;

        let candidate = match validate::validate_record(&raw) {
            Ok(candidate) => candidate,
            Err(rejection) => return self.skip(state, line, rejection, Some(&raw)),
        };

        match state.dedup.check(store, &candidate.email).await {
            Ok(Admission::Accepted) => {}
            Ok(Admission::DuplicateInRun) => {
                let rejection = RowRejection::new(
                    RejectReason::DuplicateEmail,
                    format!("duplicate email in file: {}", candidate.email),
                );
                return self.skip(state, line, rejection, Some(&raw));
            }
            Ok(Admission::DuplicateInStore) => {
                let rejection = RowRejection::new(
                    RejectReason::DuplicateEmail,
                    format!("duplicate email in database: {}", candidate.email),
                );
                return self.skip(state, line, rejection, Some(&raw));
            }
            Err(err) => {
                let rejection = RowRejection::new(
                    RejectReason::StoreFailure,
                    format!("looking up {}: {err}", candidate.email),
                );
                return self.skip(state, line, rejection, Some(&raw));
            }
        }

        let mut ids = [0i64; 2];
        for (slot, (kind, name)) in [
            (ReferenceKind::Department, candidate.department.as_str()),
            (ReferenceKind::Position, candidate.position.as_str()),
        ]
        .into_iter()
        .enumerate()
        {
            match state.resolver.resolve(store, kind, name).await {
                Ok(id) => ids[slot] = id,
                Err(err) => {
                    let rejection = RowRejection::new(
                        RejectReason::StoreFailure,
                        format!("resolving {kind} {name:?}: {err}"),
                    );
                    return self.skip(state, line, rejection, Some(&raw));
                }
            }
        }

        state.dedup.mark(&candidate.email);
        let employee = candidate.into_new_employee(ids[0], ids[1]);
        if let Some(outcome) = state.writer.push(store, line, employee).await {
            self.apply_flush(state, outcome);
        }
    }

    fn skip(
        &self,
        state: &mut RunState,
        line: u64,
        rejection: RowRejection,
        raw: Option<&RawRecord>,
    ) {
        state.reporter.record_rejection(&rejection);
        self.hook.row_skipped(line, &rejection, raw);
    }

    fn apply_flush(&self, state: &mut RunState, outcome: FlushOutcome) {
        state.reporter.record_flush(&outcome);
        match &outcome {
            FlushOutcome::Committed { batch, rows } => {
                self.hook
                    .batch_committed(*batch, *rows, state.reporter.created());
            }
            FlushOutcome::Failed { batch, rows, error } => {
                self.hook.batch_failed(*batch, rows, error);
            }
        }
    }
}

/// Connects to Postgres from `config`, imports `path` and writes the run
/// report when a reports directory is configured. An interrupted run still
/// writes its partial report before the error is returned.
pub async fn run_import(
    config: &ImportConfig,
    path: &Path,
    hook: Box<dyn ImportHook>,
) -> anyhow::Result<ImportSummary> {
    if !path.exists() {
        return Err(ImportError::InputNotFound(path.to_path_buf()).into());
    }

    let store = PgRosterStore::connect(&config.store_config())
        .await
        .context("connecting to database")?;
    let pipeline =
        ImportPipeline::new(Arc::new(store), config.pipeline_options()).with_hook(hook);
    match pipeline.run_path(path).await {
        Ok(summary) => {
            if let Some(reports_dir) = &config.reports_dir {
                report::write_report(reports_dir, &summary, Some(path)).await?;
            }
            Ok(summary)
        }
        Err(ImportError::Interrupted { summary, source }) => {
            if let Some(reports_dir) = &config.reports_dir {
                report::write_report(reports_dir, &summary, Some(path)).await?;
            }
            Err(ImportError::Interrupted { summary, source }.into())
        }
        Err(err) => Err(err.into()),
    }
}
