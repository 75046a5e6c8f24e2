//! Email deduplication against the store and earlier rows of the same run.

use std::collections::HashSet;

use roster_storage::{RosterStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// An earlier row of this run already claimed the email.
    DuplicateInRun,
    /// The email is already persisted.
    DuplicateInStore,
}

/// Emails accepted so far in this run.
///
/// The set is unbounded; memory grows with the number of distinct accepted
/// emails in one file.
#[derive(Debug, Default)]
pub struct DedupTracker {
    seen: HashSet<String>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `email` without claiming it.
    ///
    /// The in-run set is consulted first so repeated rows skip the store lookup.
    pub async fn check(
        &self,
        store: &dyn RosterStore,
        email: &str,
    ) -> Result<Admission, StoreError> {
        if self.seen.contains(email) {
            return Ok(Admission::DuplicateInRun);
        }
        if store.find_employee_by_email(email).await?.is_some() {
            return Ok(Admission::DuplicateInStore);
        }
        Ok(Admission::Accepted)
    }

    /// Claims `email` for this run. Returns `false` if it was already claimed.
    pub fn mark(&mut self, email: &str) -> bool {
        self.seen.insert(email.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
