//! Commit: diff a candidate table or file against the record store and
//! record the result as a new version
//!
//! A candidate row is a known record when its full attribute tuple equals a
//! record store row (nulls compare equal). Matching respects multiplicity:
//! the k-th copy of a tuple in the candidate claims the k-th matching record,
//! where records of the parent versions come first and ties go to the lowest
//! rid. Candidate rows left unmatched are appended with fresh rids.

use crate::backend::{self, column_list, quote_ident, tuple_match};
use crate::dataset::{self, DatasetTables};
use crate::error::{OrpheusError, Result};
use crate::index_table;
use crate::provenance::{Artifact, ProvenanceTracker};
use crate::record_store;
use crate::schema::{self, attribute_names, RID_COLUMN};
use crate::scope::{TableGuard, Transaction};
use crate::version::{self, NewVersion};
use duckdb::Connection;
use serde::Serialize;
use std::path::PathBuf;

const CANDIDATE_ID: &str = "orpheus_cid";
const OCCURRENCE: &str = "orpheus_occurrence";

/// Where the candidate rows of a commit come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSource {
    Table(String),
    File {
        path: PathBuf,
        header: bool,
        delimiter: String,
    },
}

impl CommitSource {
    pub fn artifact(&self) -> Artifact {
        match self {
            Self::Table(name) => Artifact::table(name),
            Self::File { path, .. } => Artifact::file(path),
        }
    }
}

/// Result of a successful commit
#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub dataset: String,
    pub vid: i64,
    pub parent_vids: Vec<i64>,
    /// Records of the candidate that were already in the record store
    pub existing_rids: Vec<i64>,
    /// Records appended by this commit
    pub new_rids: Vec<i64>,
    pub record_count: u64,
}

/// Known and newly ingested records of a candidate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub existing_rids: Vec<i64>,
    pub new_rids: Vec<i64>,
}

impl Partition {
    /// Record set of the version being committed, ascending
    pub fn current_record_set(&self) -> Vec<i64> {
        let mut rids: Vec<i64> = self.existing_rids.iter().chain(&self.new_rids).copied().collect();
        rids.sort_unstable();
        rids.dedup();
        rids
    }
}

pub struct CommitEngine<'a> {
    connection: &'a Connection,
    tracker: &'a ProvenanceTracker,
}

impl<'a> CommitEngine<'a> {
    pub fn new(connection: &'a Connection, tracker: &'a ProvenanceTracker) -> Self {
        Self { connection, tracker }
    }

    pub fn commit(&self, author: &str, message: &str, source: &CommitSource) -> Result<CommitOutcome> {
        let artifact = source.artifact();
        let lineage = self.tracker.lineage(&artifact)?;
        let entry = dataset::require(self.connection, &lineage.dataset)?;
        let tables = DatasetTables::for_dataset(&entry.name);

        if lineage.vids.is_empty() {
            return Err(OrpheusError::bad_parameters(format!(
                "Lineage of {} names no versions",
                artifact
            )));
        }
        if let Some(vid) = version::missing_vids(self.connection, &tables, &lineage.vids)?.first() {
            return Err(OrpheusError::InvalidParent {
                dataset: tables.dataset.clone(),
                vid: *vid,
            });
        }

        let names = attribute_names(&record_store::attributes(self.connection, &tables)?);
        let candidate_columns = self.check_schema(source, &names)?;

        let staging = record_store::create_staging(self.connection, &tables, &names)?;
        match source {
            CommitSource::Table(name) => {
                record_store::stage_table(self.connection, staging.name(), &names, name)?;
            }
            CommitSource::File {
                path,
                header,
                delimiter,
            } => {
                record_store::stage_file(
                    self.connection,
                    staging.name(),
                    &candidate_columns,
                    path,
                    *header,
                    delimiter,
                )?;
            }
        }

        let partition = partition(self.connection, &tables, staging.name(), &names, &lineage.vids)?;
        let current = partition.current_record_set();
        let source_created_at = self.tracker.created_at(&artifact)?;

        let vid = version::append_version(
            self.connection,
            &tables,
            &NewVersion {
                author: author.to_string(),
                message: message.to_string(),
                record_count: current.len() as u64,
                parent_vids: lineage.vids.clone(),
                source_created_at,
            },
            &current,
        )?;
        drop(staging);

        Ok(CommitOutcome {
            dataset: tables.dataset,
            vid,
            parent_vids: lineage.vids,
            existing_rids: partition.existing_rids,
            new_rids: partition.new_rids,
            record_count: current.len() as u64,
        })
    }

    /// Compare the candidate's attributes with the record store; returns the
    /// candidate's columns in its own order
    fn check_schema(&self, source: &CommitSource, names: &[String]) -> Result<Vec<String>> {
        match source {
            CommitSource::Table(name) => {
                let actual = attribute_names(&backend::describe_table(self.connection, name)?);
                schema::compare_attribute_sets(names, &actual)?;
                Ok(actual)
            }
            CommitSource::File {
                path,
                header: true,
                delimiter,
            } => {
                let actual = attribute_names(&schema::attributes_of_file(self.connection, path, delimiter)?);
                schema::compare_attribute_sets(names, &actual)?;
                Ok(actual)
            }
            CommitSource::File {
                path,
                header: false,
                delimiter,
            } => {
                let fields = schema::field_count_of_file(self.connection, path, delimiter)?;
                if fields != names.len() {
                    return Err(OrpheusError::schema_mismatch(format!(
                        "expected {} attributes ({}), file has {} fields",
                        names.len(),
                        names.join(", "),
                        fields
                    )));
                }
                Ok(names.to_vec())
            }
        }
    }
}

/// Split the staged candidate into known records and new rows, appending the
/// new rows to the record store
pub fn partition(
    connection: &Connection,
    tables: &DatasetTables,
    staging: &str,
    names: &[String],
    parent_vids: &[i64],
) -> Result<Partition> {
    let tx = Transaction::begin(connection)?;
    let conn = tx.connection();

    let candidates = TableGuard::new(conn, format!("{}_candidates", staging));
    let matches = TableGuard::new(conn, format!("{}_matches", staging));
    let columns = column_list(names, None);
    let partition_by = column_list(names, Some("d"));
    let parent_filter = if parent_vids.is_empty() {
        "FALSE".to_string()
    } else {
        format!(
            "d.{} IN ({})",
            quote_ident(RID_COLUMN),
            index_table::record_set_query(tables, parent_vids)
        )
    };

    let sql = format!(
        "CREATE TEMP TABLE {candidates} AS
         SELECT row_number() OVER () AS {cid},
                row_number() OVER (PARTITION BY {columns}) AS {occ},
                {columns}
         FROM {staging};
         CREATE TEMP TABLE {matches} AS
         SELECT c.{cid} AS {cid}, k.{rid} AS {rid}
         FROM {candidates} c
         JOIN (
             SELECT d.{rid}, {partition_by},
                    row_number() OVER (
                        PARTITION BY {partition_by}
                        ORDER BY CASE WHEN {parent_filter} THEN 0 ELSE 1 END, d.{rid}
                    ) AS {occ}
             FROM {data} d
         ) k ON {join} AND c.{occ} = k.{occ};",
        candidates = quote_ident(candidates.name()),
        matches = quote_ident(matches.name()),
        cid = CANDIDATE_ID,
        occ = OCCURRENCE,
        rid = quote_ident(RID_COLUMN),
        columns = columns,
        partition_by = partition_by,
        parent_filter = parent_filter,
        staging = quote_ident(staging),
        data = quote_ident(&tables.datatable),
        join = tuple_match(names, "c", "k"),
    );
    log::debug!("Partitioning candidate rows of {}", tables.dataset);
    conn.execute_batch(&sql)?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {rid} FROM {matches} ORDER BY {rid}",
        rid = quote_ident(RID_COLUMN),
        matches = quote_ident(matches.name())
    ))?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut existing_rids = Vec::new();
    for rid in rows {
        existing_rids.push(rid?);
    }

    let unmatched = format!(
        "SELECT {columns} FROM {candidates} WHERE {cid} NOT IN (SELECT {cid} FROM {matches}) ORDER BY {cid}",
        columns = columns,
        candidates = quote_ident(candidates.name()),
        cid = CANDIDATE_ID,
        matches = quote_ident(matches.name()),
    );
    let new_rids = record_store::ingest(conn, tables, names, &unmatched)?;

    drop(stmt);
    drop(matches);
    drop(candidates);
    tx.commit()?;

    log::info!(
        "Candidate for {}: {} known records, {} new records",
        tables.dataset,
        existing_rids.len(),
        new_rids.len()
    );
    Ok(Partition {
        existing_rids,
        new_rids,
    })
}
