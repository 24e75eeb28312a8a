//! Checkout: materialize the union of one or more versions as a table or a
//! delimited file, and remember where it came from

use crate::access;
use crate::backend::{self, column_list, quote_ident, quote_literal, tuple_match};
use crate::dataset::{self, DatasetTables};
use crate::error::{OrpheusError, Result};
use crate::index_table;
use crate::provenance::{Artifact, ProvenanceTracker};
use crate::record_store;
use crate::schema::{self, attribute_names, RID_COLUMN};
use crate::scope::{FileGuard, ProvenanceGuard, Transaction};
use crate::version;
use duckdb::Connection;
use serde::Serialize;
use std::path::PathBuf;

/// Where checked out rows are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Table(String),
    File(PathBuf),
}

impl Destination {
    pub fn artifact(&self) -> Artifact {
        match self {
            Self::Table(name) => Artifact::table(name),
            Self::File(path) => Artifact::file(path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutOptions {
    pub delimiter: String,
    /// Write a header line to file destinations
    pub header: bool,
    /// Resolve collisions instead of failing
    pub ignore: bool,
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            delimiter: crate::DEFAULT_DELIMITER.to_string(),
            header: false,
            ignore: false,
        }
    }
}

/// Result of a successful checkout
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub dataset: String,
    pub vids: Vec<i64>,
    pub destination: String,
    /// Rows written by this call
    pub rows_written: u64,
    /// Rows skipped because of key collisions
    pub rows_skipped: u64,
}

pub struct CheckoutEngine<'a> {
    connection: &'a Connection,
    tracker: &'a ProvenanceTracker,
    principal: &'a str,
}

impl<'a> CheckoutEngine<'a> {
    pub fn new(connection: &'a Connection, tracker: &'a ProvenanceTracker, principal: &'a str) -> Self {
        Self {
            connection,
            tracker,
            principal,
        }
    }

    pub fn checkout(
        &self,
        dataset_name: &str,
        vids: &[i64],
        destination: &Destination,
        options: &CheckoutOptions,
    ) -> Result<CheckoutOutcome> {
        if vids.is_empty() {
            return Err(OrpheusError::bad_parameters("No versions to check out"));
        }
        let entry = dataset::require(self.connection, dataset_name)?;
        let tables = DatasetTables::for_dataset(&entry.name);
        version::require_versions(self.connection, &tables, vids)?;

        let names = attribute_names(&record_store::attributes(self.connection, &tables)?);
        self.check_destination(destination, options)?;

        let tx = Transaction::begin(self.connection)?;
        let conn = tx.connection();

        let mut selection = selection_query(&tables, &names, vids);
        let selected = count_query(conn, &selection)?;

        if !entry.key.is_empty() {
            if let Some(duplicate) = first_duplicate_key(conn, &selection, &entry.key)? {
                if !options.ignore {
                    return Err(OrpheusError::destination_collision(format!(
                        "versions {:?} of {} hold more than one record with key ({}) = ({}); use --ignore to keep the first",
                        vids,
                        entry.name,
                        entry.key.join(", "),
                        duplicate
                    )));
                }
                selection = first_per_key(&selection, &entry.key);
            }
        }

        let mut file_guard = None;
        let rows_written = match destination {
            Destination::Table(name) => {
                let written = if backend::table_exists(conn, name)? {
                    let key = if entry.key.is_empty() { &names } else { &entry.key };
                    append_missing(conn, name, &names, key, &selection)?
                } else {
                    conn.execute_batch(&format!(
                        "CREATE TABLE {} AS SELECT {} FROM ({}) s ORDER BY s.{}",
                        quote_ident(name),
                        column_list(&names, Some("s")),
                        selection,
                        quote_ident(RID_COLUMN)
                    ))?;
                    backend::count_rows(conn, name)?
                };
                access::grant(conn, name, self.principal)?;
                written
            }
            Destination::File(path) => {
                file_guard = Some(FileGuard::new(path));
                conn.execute_batch(&format!(
                    "COPY (SELECT {} FROM ({}) s ORDER BY s.{}) TO {} (FORMAT CSV, HEADER {}, DELIMITER {})",
                    column_list(&names, Some("s")),
                    selection,
                    quote_ident(RID_COLUMN),
                    quote_literal(&path.to_string_lossy()),
                    options.header,
                    quote_literal(&options.delimiter)
                ))?;
                count_query(conn, &selection)?
            }
        };
        let rows_skipped = selected.saturating_sub(rows_written);

        let provenance = ProvenanceGuard::record(self.tracker, destination.artifact(), &entry.name, vids)?;
        tx.commit()?;
        provenance.keep();
        if let Some(guard) = file_guard {
            guard.keep();
        }

        log::info!(
            "Checked out {} v{:?} to {} ({} rows)",
            entry.name,
            vids,
            destination.artifact(),
            rows_written
        );
        Ok(CheckoutOutcome {
            dataset: entry.name,
            vids: vids.to_vec(),
            destination: destination.artifact().to_string(),
            rows_written,
            rows_skipped,
        })
    }

    fn check_destination(&self, destination: &Destination, options: &CheckoutOptions) -> Result<()> {
        match destination {
            Destination::Table(name) => {
                if name.trim().is_empty() {
                    return Err(OrpheusError::bad_parameters("Destination table name is empty"));
                }
                if dataset::is_reserved_table(self.connection, name)? {
                    return Err(OrpheusError::bad_parameters(format!(
                        "Table {} belongs to the version store",
                        name
                    )));
                }
                if backend::table_exists(self.connection, name)? && !options.ignore {
                    return Err(OrpheusError::destination_collision(format!(
                        "table {} already exists; use --ignore to append to it",
                        name
                    )));
                }
            }
            Destination::File(path) => {
                if path.exists() {
                    return Err(OrpheusError::destination_collision(format!(
                        "file {} already exists",
                        path.display()
                    )));
                }
                if options.delimiter.is_empty() {
                    return Err(OrpheusError::bad_parameters("Delimiter is empty"));
                }
            }
        }
        Ok(())
    }
}

/// Rows (with their rid) of the union of the listed versions
fn selection_query(tables: &DatasetTables, names: &[String], vids: &[i64]) -> String {
    format!(
        "SELECT d.{rid}, {columns} FROM {data} d WHERE d.{rid} IN ({members})",
        rid = quote_ident(RID_COLUMN),
        columns = column_list(names, Some("d")),
        data = quote_ident(&tables.datatable),
        members = index_table::record_set_query(tables, vids),
    )
}

/// Keep only the lowest-rid row of every key
fn first_per_key(selection: &str, key: &[String]) -> String {
    format!(
        "SELECT * FROM ({}) q QUALIFY row_number() OVER (PARTITION BY {} ORDER BY q.{}) = 1",
        selection,
        column_list(key, Some("q")),
        quote_ident(RID_COLUMN)
    )
}

/// A rendered key value that occurs more than once in the selection
fn first_duplicate_key(connection: &Connection, selection: &str, key: &[String]) -> Result<Option<String>> {
    let rendered = key
        .iter()
        .map(|k| format!("COALESCE(CAST(q.{} AS VARCHAR), 'NULL')", quote_ident(k)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = connection.prepare(&format!(
        "SELECT concat_ws(', ', {}) FROM ({}) q GROUP BY {} HAVING COUNT(*) > 1 LIMIT 1",
        rendered,
        selection,
        column_list(key, Some("q"))
    ))?;
    let mut rows = stmt.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Append selected rows to an existing table, skipping keys it already holds
fn append_missing(
    connection: &Connection,
    table: &str,
    names: &[String],
    key: &[String],
    selection: &str,
) -> Result<u64> {
    let existing = attribute_names(&backend::describe_table(connection, table)?);
    schema::compare_attribute_sets(names, &existing)?;

    let before = backend::count_rows(connection, table)?;
    connection.execute_batch(&format!(
        "INSERT INTO {table} ({columns}) SELECT {selected} FROM ({selection}) s
         WHERE NOT EXISTS (SELECT 1 FROM {table} t WHERE {matches})
         ORDER BY s.{rid}",
        table = quote_ident(table),
        columns = column_list(names, None),
        selected = column_list(names, Some("s")),
        selection = selection,
        matches = tuple_match(key, "t", "s"),
        rid = quote_ident(RID_COLUMN),
    ))?;
    let after = backend::count_rows(connection, table)?;
    Ok(after.saturating_sub(before))
}

fn count_query(connection: &Connection, selection: &str) -> Result<u64> {
    let count: i64 = connection.query_row(&format!("SELECT COUNT(*) FROM ({}) q", selection), [], |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as u64)
}
