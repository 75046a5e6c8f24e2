//! Memoizing create-or-get resolver for departments and positions.

use std::collections::HashMap;
use std::fmt;

use roster_storage::{RosterStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Department,
    Position,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Department => f.write_str("department"),
            ReferenceKind::Position => f.write_str("position"),
        }
    }
}

/// Name to id cache for both lookup tables, owned by a single run.
///
/// Names are matched exactly; `"Sales"` and `"sales"` resolve to different rows.
#[derive(Debug)]
pub struct ReferenceResolver {
    departments: HashMap<String, i64>,
    positions: HashMap<String, i64>,
    default_location: String,
    departments_created: usize,
    positions_created: usize,
}

impl ReferenceResolver {
    /// Pre-loads both lookup tables from the store.
    pub async fn load(
        store: &dyn RosterStore,
        default_location: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let departments = store
            .load_departments()
            .await?
            .into_iter()
            .map(|d| (d.name, d.id))
            .collect();
        let positions = store
            .load_positions()
            .await?
            .into_iter()
            .map(|p| (p.title, p.id))
            .collect();
        Ok(Self {
            departments,
            positions,
            default_location: default_location.into(),
            departments_created: 0,
            positions_created: 0,
        })
    }

    /// Returns the cached id for `name`, creating the row on a miss.
    pub async fn resolve(
        &mut self,
        store: &dyn RosterStore,
        kind: ReferenceKind,
        name: &str,
    ) -> Result<i64, StoreError> {
        let cached = match kind {
            ReferenceKind::Department => self.departments.get(name).copied(),
            ReferenceKind::Position => self.positions.get(name).copied(),
        };
        if let Some(id) = cached {
            return Ok(id);
        }

        let id = match kind {
            ReferenceKind::Department => {
                let department = store
                    .create_department(name, Some(&self.default_location))
                    .await?;
                self.departments_created += 1;
                self.departments.insert(department.name, department.id);
                department.id
            }
            ReferenceKind::Position => {
                let position = store.create_position(name).await?;
                self.positions_created += 1;
                self.positions.insert(position.title, position.id);
                position.id
            }
        };
        Ok(id)
    }

    pub fn created(&self, kind: ReferenceKind) -> usize {
        match kind {
            ReferenceKind::Department => self.departments_created,
            ReferenceKind::Position => self.positions_created,
        }
    }

    pub fn cached(&self, kind: ReferenceKind) -> usize {
        match kind {
            ReferenceKind::Department => self.departments.len(),
            ReferenceKind::Position => self.positions.len(),
        }
    }
}
