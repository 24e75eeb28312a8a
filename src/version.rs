//! The version graph of a dataset

use crate::backend::{id_list, quote_ident, quote_literal};
use crate::dataset::{parse_timestamp, DatasetTables};
use crate::error::{OrpheusError, Result};
use crate::index_table;
use crate::scope::Transaction;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Message of the version created by `init`
pub const ROOT_MESSAGE: &str = "init";

/// One node of the version graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub vid: i64,
    pub author: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// When the committed artifact was materialized
    pub source_created_at: Option<DateTime<Utc>>,
    pub record_count: u64,
    pub parent_vids: Vec<i64>,
}

impl Version {
    pub fn is_root(&self) -> bool {
        self.parent_vids.is_empty()
    }
}

/// Metadata of a version about to be committed
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub author: String,
    pub message: String,
    pub record_count: u64,
    pub parent_vids: Vec<i64>,
    pub source_created_at: Option<DateTime<Utc>>,
}

/// Create the parentless first version; only legal on an empty graph
pub fn create_root(connection: &Connection, tables: &DatasetTables, author: &str, record_count: u64) -> Result<i64> {
    if version_count(connection, tables)? > 0 {
        return Err(OrpheusError::DuplicateDataset {
            name: tables.dataset.clone(),
        });
    }
    let vid = next_vid(connection, tables)?;
    insert_version_row(
        connection,
        tables,
        vid,
        &NewVersion {
            author: author.to_string(),
            message: ROOT_MESSAGE.to_string(),
            record_count,
            parent_vids: Vec::new(),
            source_created_at: None,
        },
    )?;
    log::debug!("Created root version {} of {}", vid, tables.dataset);
    Ok(vid)
}

/// Allocate the next vid and store the version row with its parent edges
pub fn commit_version(connection: &Connection, tables: &DatasetTables, version: &NewVersion) -> Result<i64> {
    if version.parent_vids.is_empty() {
        return Err(OrpheusError::bad_parameters(
            "Only the root version may have no parents",
        ));
    }
    if let Some(vid) = missing_vids(connection, tables, &version.parent_vids)?.first() {
        return Err(OrpheusError::InvalidParent {
            dataset: tables.dataset.clone(),
            vid: *vid,
        });
    }

    let vid = next_vid(connection, tables)?;
    insert_version_row(connection, tables, vid, version)?;
    Ok(vid)
}

/// Version row and membership rows of a new version, atomically
pub fn append_version(
    connection: &Connection,
    tables: &DatasetTables,
    version: &NewVersion,
    rids: &[i64],
) -> Result<i64> {
    if version.record_count != rids.len() as u64 {
        return Err(OrpheusError::bad_parameters(format!(
            "Record count {} does not match {} member records",
            version.record_count,
            rids.len()
        )));
    }

    let tx = Transaction::begin(connection)?;
    let vid = commit_version(tx.connection(), tables, version)?;
    index_table::add_membership(tx.connection(), tables, vid, rids)?;
    tx.commit()?;

    log::info!(
        "Committed version {} of {} ({} records, parents {:?})",
        vid,
        tables.dataset,
        rids.len(),
        version.parent_vids
    );
    Ok(vid)
}

pub fn get_version(connection: &Connection, tables: &DatasetTables, vid: i64) -> Result<Version> {
    let mut versions = select_versions(connection, tables, &format!("WHERE vid = {}", vid))?;
    versions.pop().ok_or_else(|| OrpheusError::VersionNotFound {
        dataset: tables.dataset.clone(),
        vid,
    })
}

/// Every version in vid order
pub fn list_versions(connection: &Connection, tables: &DatasetTables) -> Result<Vec<Version>> {
    select_versions(connection, tables, "")
}

/// Versions naming `vid` as a parent, in vid order
pub fn children(connection: &Connection, tables: &DatasetTables, vid: i64) -> Result<Vec<i64>> {
    get_version(connection, tables, vid)?;
    Ok(list_versions(connection, tables)?
        .into_iter()
        .filter(|v| v.parent_vids.contains(&vid))
        .map(|v| v.vid)
        .collect())
}

/// Every version reachable through parent edges, nearest first
pub fn ancestors(connection: &Connection, tables: &DatasetTables, vid: i64) -> Result<Vec<i64>> {
    let start = get_version(connection, tables, vid)?;
    let graph: Vec<Version> = list_versions(connection, tables)?;

    let mut seen = HashSet::new();
    let mut result = Vec::new();
    let mut queue: VecDeque<i64> = start.parent_vids.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        if !seen.insert(current) {
            continue;
        }
        result.push(current);
        if let Some(node) = graph.iter().find(|v| v.vid == current) {
            queue.extend(node.parent_vids.iter().copied());
        }
    }
    Ok(result)
}

/// Listed vids that do not exist in the graph, in input order
pub fn missing_vids(connection: &Connection, tables: &DatasetTables, vids: &[i64]) -> Result<Vec<i64>> {
    if vids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = connection.prepare(&format!(
        "SELECT vid FROM {} WHERE vid IN ({})",
        quote_ident(&tables.versiontable),
        id_list(vids)
    ))?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut found = BTreeSet::new();
    for vid in rows {
        found.insert(vid?);
    }
    Ok(vids.iter().copied().filter(|vid| !found.contains(vid)).collect())
}

/// Fail with `VersionNotFound` on the first unknown vid
pub fn require_versions(connection: &Connection, tables: &DatasetTables, vids: &[i64]) -> Result<()> {
    match missing_vids(connection, tables, vids)?.first() {
        Some(vid) => Err(OrpheusError::VersionNotFound {
            dataset: tables.dataset.clone(),
            vid: *vid,
        }),
        None => Ok(()),
    }
}

pub fn version_count(connection: &Connection, tables: &DatasetTables) -> Result<u64> {
    let count: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(&tables.versiontable)),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

fn next_vid(connection: &Connection, tables: &DatasetTables) -> Result<i64> {
    let vid: i64 = connection.query_row(
        &format!("SELECT nextval({})", quote_literal(&tables.vid_sequence)),
        [],
        |row| row.get(0),
    )?;
    Ok(vid)
}

fn insert_version_row(connection: &Connection, tables: &DatasetTables, vid: i64, version: &NewVersion) -> Result<()> {
    let parents = serde_json::to_string(&version.parent_vids)?;
    connection.execute(
        &format!(
            "INSERT INTO {} (vid, author, message, num_records, parents, created_at, source_created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            quote_ident(&tables.versiontable)
        ),
        params![
            vid,
            version.author,
            version.message,
            version.record_count as i64,
            parents,
            Utc::now().to_rfc3339(),
            version.source_created_at.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

type VersionRow = (i64, String, String, i64, String, String, Option<String>);

fn select_versions(connection: &Connection, tables: &DatasetTables, filter: &str) -> Result<Vec<Version>> {
    let mut stmt = connection.prepare(&format!(
        "SELECT vid, author, message, num_records, parents, created_at, source_created_at
         FROM {} {} ORDER BY vid",
        quote_ident(&tables.versiontable),
        filter
    ))?;
    let rows = stmt.query_map([], |row| -> duckdb::Result<VersionRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
        ))
    })?;

    let mut versions = Vec::new();
    for row in rows {
        let (vid, author, message, num_records, parents, created_at, source_created_at) = row?;
        let parent_vids: Vec<i64> = serde_json::from_str(&parents).map_err(|e| {
            OrpheusError::corrupt_metadata(format!("Parents of version {} are unreadable: {}", vid, e))
        })?;
        versions.push(Version {
            vid,
            author,
            message,
            created_at: parse_timestamp(&created_at)?,
            source_created_at: source_created_at.as_deref().map(parse_timestamp).transpose()?,
            record_count: num_records.max(0) as u64,
            parent_vids,
        });
    }
    Ok(versions)
}
