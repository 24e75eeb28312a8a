//! Guards that undo a partially completed operation on every early exit.
//!
//! Each guard owns one created resource (an open transaction, a table, a file,
//! a provenance entry). It is released on drop unless the operation reaches
//! its success path and calls the guard's completion method.

use crate::backend;
use crate::error::Result;
use crate::provenance::{Artifact, ProvenanceTracker, TrackedEntry};
use duckdb::Connection;
use std::fs;
use std::path::PathBuf;

/// An explicit backend transaction that rolls back unless committed
pub struct Transaction<'a> {
    connection: &'a Connection,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(connection: &'a Connection) -> Result<Self> {
        connection.execute_batch("BEGIN TRANSACTION")?;
        Ok(Self {
            connection,
            finished: false,
        })
    }

    pub fn connection(&self) -> &'a Connection {
        self.connection
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.connection.execute_batch("COMMIT")?;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.connection.execute_batch("ROLLBACK") {
                log::warn!("Rollback failed: {}", e);
            }
        }
    }
}

/// A table created by the current operation
pub struct TableGuard<'a> {
    connection: &'a Connection,
    name: String,
    armed: bool,
}

impl<'a> TableGuard<'a> {
    pub fn new(connection: &'a Connection, name: impl Into<String>) -> Self {
        Self {
            connection,
            name: name.into(),
            armed: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keep the table
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for TableGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Dropping table {}", self.name);
            if let Err(e) = backend::drop_table(self.connection, &self.name) {
                log::warn!("Failed to drop table {}: {}", self.name, e);
            }
        }
    }
}

/// A file created by the current operation
pub struct FileGuard {
    path: PathBuf,
    armed: bool,
}

impl FileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            log::debug!("Removing file {}", self.path.display());
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// A provenance entry written by the current operation; the previous entry is
/// put back if the operation does not complete
pub struct ProvenanceGuard<'a> {
    tracker: &'a ProvenanceTracker,
    artifact: Artifact,
    previous: Option<TrackedEntry>,
    armed: bool,
}

impl<'a> ProvenanceGuard<'a> {
    pub fn record(
        tracker: &'a ProvenanceTracker,
        artifact: Artifact,
        dataset: &str,
        vids: &[i64],
    ) -> Result<Self> {
        let previous = tracker.record(&artifact, dataset, vids)?;
        Ok(Self {
            tracker,
            artifact,
            previous,
            armed: true,
        })
    }

    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for ProvenanceGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let result = match self.previous.take() {
                Some(previous) => self.tracker.restore(&self.artifact, Some(previous)),
                None => self.tracker.forget(&self.artifact),
            };
            if let Err(e) = result {
                log::warn!("Failed to restore provenance for {}: {}", self.artifact, e);
            }
        }
    }
}
