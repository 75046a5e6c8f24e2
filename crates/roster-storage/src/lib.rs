//! Persistence collaborator for the roster: the store contract used by the
//! import pipeline, a Postgres implementation and an in-memory one.

use async_trait::async_trait;
use roster_core::{Department, DepartmentId, Employee, NewEmployee, Position, PositionId};
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryRosterStore;
pub use postgres::{PgRosterStore, PgStoreConfig};

pub const CRATE_NAME: &str = "roster-storage";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: String },
    #[error("{entity} {id} is still referenced by employees")]
    Protected { entity: &'static str, id: i64 },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

/// Primitives the import pipeline depends on.
///
/// `bulk_create_employees` is all-or-nothing: when it returns an error no row
/// of the batch has been committed.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn load_departments(&self) -> Result<Vec<Department>, StoreError>;

    async fn load_positions(&self) -> Result<Vec<Position>, StoreError>;

    async fn find_employee_by_email(&self, email: &str) -> Result<Option<Employee>, StoreError>;

    async fn create_department(
        &self,
        name: &str,
        location: Option<&str>,
    ) -> Result<Department, StoreError>;

    async fn create_position(&self, title: &str) -> Result<Position, StoreError>;

    /// Inserts the whole batch atomically and returns the number of rows written.
    async fn bulk_create_employees(&self, batch: &[NewEmployee]) -> Result<u64, StoreError>;

    async fn count_employees(&self) -> Result<u64, StoreError>;

    /// Fails with [`StoreError::Protected`] while any employee references it.
    async fn delete_department(&self, id: DepartmentId) -> Result<(), StoreError>;

    /// Fails with [`StoreError::Protected`] while any employee references it.
    async fn delete_position(&self, id: PositionId) -> Result<(), StoreError>;
}
