//! Dataset catalog and per-dataset storage objects
//!
//! Every dataset owns three tables and two sequences, all named after it:
//! `<name>_datatable` (the record store), `<name>_indextbl` (version
//! membership), `<name>_version` (the version graph), `<name>_rid_seq` and
//! `<name>_vid_seq`. The `orpheus_datasets` catalog table lists datasets with
//! their owner and declared key.

use crate::backend::{self, quote_ident, quote_literal};
use crate::error::{OrpheusError, Result};
use crate::schema::{Attribute, RID_COLUMN};
use crate::version::Version;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use serde::{Deserialize, Serialize};

/// Catalog table listing every dataset
pub const CATALOG_TABLE: &str = "orpheus_datasets";

/// Names of the backend objects owned by one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetTables {
    pub dataset: String,
    pub datatable: String,
    pub indextable: String,
    pub versiontable: String,
    pub rid_sequence: String,
    pub vid_sequence: String,
}

impl DatasetTables {
    pub fn for_dataset(name: &str) -> Self {
        Self {
            dataset: name.to_string(),
            datatable: format!("{}_datatable", name),
            indextable: format!("{}_indextbl", name),
            versiontable: format!("{}_version", name),
            rid_sequence: format!("{}_rid_seq", name),
            vid_sequence: format!("{}_vid_seq", name),
        }
    }

    /// Tables in creation order
    pub fn tables(&self) -> [&str; 3] {
        [&self.datatable, &self.indextable, &self.versiontable]
    }

    pub fn owns_table(&self, name: &str) -> bool {
        self.tables().iter().any(|t| t.eq_ignore_ascii_case(name))
    }
}

/// One row of the dataset catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub owner: String,
    /// Declared key attributes, empty when none was declared
    pub key: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A version together with the versions derived from it
#[derive(Debug, Clone, Serialize)]
pub struct VersionNode {
    #[serde(flatten)]
    pub version: Version,
    pub children: Vec<i64>,
}

/// Everything `describe` reports about a dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetDescription {
    pub name: String,
    pub owner: String,
    pub key: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub attributes: Vec<Attribute>,
    /// Number of distinct records ever ingested
    pub record_store_size: u64,
    pub versions: Vec<VersionNode>,
}

/// Create the catalog table on first use
pub fn ensure_catalog(connection: &Connection) -> Result<()> {
    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            dataset_name VARCHAR PRIMARY KEY,
            owner VARCHAR NOT NULL,
            key_columns VARCHAR NOT NULL,
            created_at VARCHAR NOT NULL
        )",
        CATALOG_TABLE
    ))?;
    Ok(())
}

/// Validate a dataset name before it is used to derive object names
pub fn validate_name(name: &str) -> Result<()> {
    if !backend::is_identifier(name) {
        return Err(OrpheusError::bad_parameters(format!(
            "Invalid dataset name '{}': use letters, digits and underscores",
            name
        )));
    }
    if name.to_lowercase().starts_with("orpheus_") {
        return Err(OrpheusError::bad_parameters(format!(
            "Dataset name '{}' uses the reserved prefix 'orpheus_'",
            name
        )));
    }
    Ok(())
}

/// Catalog lookup; names compare case-insensitively like the objects derived from them
pub fn exists(connection: &Connection, name: &str) -> Result<bool> {
    let count: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE lower(dataset_name) = lower(?)", CATALOG_TABLE),
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Catalog entry of an existing dataset, `DatasetNotFound` otherwise
pub fn require(connection: &Connection, name: &str) -> Result<DatasetEntry> {
    let mut stmt = connection.prepare(&format!(
        "SELECT dataset_name, owner, key_columns, created_at FROM {} WHERE lower(dataset_name) = lower(?)",
        CATALOG_TABLE
    ))?;
    let mut rows = stmt.query([name])?;
    match rows.next()? {
        Some(row) => entry_from_parts(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?),
        None => Err(OrpheusError::dataset_not_found(name)),
    }
}

/// All catalog entries ordered by name
pub fn list(connection: &Connection) -> Result<Vec<DatasetEntry>> {
    let mut stmt = connection.prepare(&format!(
        "SELECT dataset_name, owner, key_columns, created_at FROM {} ORDER BY dataset_name",
        CATALOG_TABLE
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (name, owner, key, created_at) = row?;
        entries.push(entry_from_parts(name, owner, key, created_at)?);
    }
    Ok(entries)
}

fn entry_from_parts(name: String, owner: String, key: String, created_at: String) -> Result<DatasetEntry> {
    let key: Vec<String> = serde_json::from_str(&key).map_err(|e| {
        OrpheusError::corrupt_metadata(format!("Key of dataset {} is unreadable: {}", name, e))
    })?;
    let created_at = parse_timestamp(&created_at)?;
    Ok(DatasetEntry {
        name,
        owner,
        key,
        created_at,
    })
}

/// Parse an RFC 3339 timestamp stored in the backend
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| OrpheusError::corrupt_metadata(format!("Bad timestamp '{}': {}", value, e)))
}

/// Add a catalog row; a name that is already taken is `DatasetExists`
pub fn insert_entry(connection: &Connection, entry: &DatasetEntry) -> Result<()> {
    if exists(connection, &entry.name)? {
        return Err(OrpheusError::dataset_exists(&entry.name));
    }
    let key = serde_json::to_string(&entry.key)?;
    connection
        .execute(
            &format!(
                "INSERT INTO {} (dataset_name, owner, key_columns, created_at) VALUES (?, ?, ?, ?)",
                CATALOG_TABLE
            ),
            params![entry.name, entry.owner, key, entry.created_at.to_rfc3339()],
        )
        .map_err(|e| {
            // A concurrent init can win the race between the check and the insert
            if e.to_string().contains("Duplicate key") || e.to_string().contains("PRIMARY KEY") {
                OrpheusError::dataset_exists(&entry.name)
            } else {
                OrpheusError::from(e)
            }
        })?;
    Ok(())
}

/// Create the sequences and tables of a new dataset
pub fn create_storage(connection: &Connection, tables: &DatasetTables, attributes: &[Attribute]) -> Result<()> {
    let columns = attributes
        .iter()
        .map(|a| format!("{} {}", quote_ident(&a.name), a.data_type))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "CREATE SEQUENCE {rid_seq} START 1;
         CREATE SEQUENCE {vid_seq} START 1;
         CREATE TABLE {data} ({rid} BIGINT PRIMARY KEY, {columns});
         CREATE TABLE {index} (vid BIGINT NOT NULL, rid BIGINT NOT NULL, PRIMARY KEY (vid, rid));
         CREATE TABLE {version} (
             vid BIGINT PRIMARY KEY,
             author VARCHAR NOT NULL,
             message VARCHAR NOT NULL,
             num_records BIGINT NOT NULL,
             parents VARCHAR NOT NULL,
             created_at VARCHAR NOT NULL,
             source_created_at VARCHAR
         );",
        rid_seq = quote_ident(&tables.rid_sequence),
        vid_seq = quote_ident(&tables.vid_sequence),
        data = quote_ident(&tables.datatable),
        rid = quote_ident(RID_COLUMN),
        columns = columns,
        index = quote_ident(&tables.indextable),
        version = quote_ident(&tables.versiontable),
    );
    log::debug!("Creating storage for dataset {}", tables.dataset);
    connection.execute_batch(&sql)?;
    Ok(())
}

/// Drop every object of a dataset and its catalog row
pub fn drop_storage(connection: &Connection, tables: &DatasetTables) -> Result<()> {
    for table in tables.tables() {
        backend::drop_table(connection, table)?;
    }
    connection.execute_batch(&format!(
        "DROP SEQUENCE IF EXISTS {};
         DROP SEQUENCE IF EXISTS {};
         DELETE FROM {} WHERE dataset_name = {};",
        quote_ident(&tables.rid_sequence),
        quote_ident(&tables.vid_sequence),
        CATALOG_TABLE,
        quote_literal(&tables.dataset)
    ))?;
    Ok(())
}

/// Whether a table name belongs to the engine rather than to the user
pub fn is_reserved_table(connection: &Connection, name: &str) -> Result<bool> {
    if name.to_lowercase().starts_with("orpheus_") {
        return Ok(true);
    }
    for entry in list(connection)? {
        if DatasetTables::for_dataset(&entry.name).owns_table(name) {
            return Ok(true);
        }
    }
    Ok(false)
}
