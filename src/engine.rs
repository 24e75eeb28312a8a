//! The `VersionEngine` facade: one connection to the version store plus the
//! provenance document, exposing init, drop, checkout, commit and the
//! read-only lookups

use crate::access::{self, Grant};
use crate::backend;
use crate::checkout::{CheckoutEngine, CheckoutOptions, CheckoutOutcome, Destination};
use crate::dataset::{self, DatasetDescription, DatasetEntry, DatasetTables, VersionNode};
use crate::diff::{CommitEngine, CommitOutcome, CommitSource};
use crate::error::{OrpheusError, Result};
use crate::index_table;
use crate::provenance::{Artifact, Lineage, ProvenanceTracker};
use crate::record_store;
use crate::schema::{self, attribute_names, Attribute};
use crate::scope::{ProvenanceGuard, Transaction};
use crate::version::{self, NewVersion, Version};
use crate::workspace::OrpheusWorkspace;
use chrono::Utc;
use duckdb::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Where the rows of a new dataset come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitSource {
    /// Delimited file read with an explicit attribute list
    File {
        path: PathBuf,
        attributes: Vec<Attribute>,
        header: bool,
        delimiter: String,
    },
    /// Existing table; its columns become the dataset's attributes
    Table(String),
}

impl InitSource {
    pub fn artifact(&self) -> Artifact {
        match self {
            Self::File { path, .. } => Artifact::file(path),
            Self::Table(name) => Artifact::table(name),
        }
    }
}

/// Result of a successful init
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub dataset: String,
    pub root_vid: i64,
    pub record_count: u64,
    pub attributes: Vec<Attribute>,
    pub key: Vec<String>,
}

pub struct VersionEngine {
    connection: Connection,
    tracker: ProvenanceTracker,
    principal: String,
}

impl VersionEngine {
    /// Open the version store of a workspace, acting as `principal`
    pub fn open(workspace: &OrpheusWorkspace, principal: &str) -> Result<Self> {
        Self::open_at(&workspace.database_path()?, workspace.meta_info_path()?, principal)
    }

    /// Open a version store from explicit paths
    pub fn open_at(database: &Path, meta_info: impl Into<PathBuf>, principal: &str) -> Result<Self> {
        if principal.trim().is_empty() {
            return Err(OrpheusError::config("Principal is empty"));
        }
        if let Some(parent) = database.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let connection = backend::open_database(database)?;
        dataset::ensure_catalog(&connection)?;
        access::ensure_grants_table(&connection)?;

        Ok(Self {
            connection,
            tracker: ProvenanceTracker::new(meta_info),
            principal: principal.trim().to_string(),
        })
    }

    /// Another session on the same database and provenance document
    pub fn try_clone(&self) -> Result<Self> {
        let connection = self.connection.try_clone()?;
        backend::configure(&connection)?;
        Ok(Self {
            connection,
            tracker: self.tracker.clone(),
            principal: self.principal.clone(),
        })
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn tracker(&self) -> &ProvenanceTracker {
        &self.tracker
    }

    /// Create a dataset from a file or table; its rows become the root version
    pub fn init_dataset(&self, source: &InitSource, name: &str, key: &[String]) -> Result<InitOutcome> {
        dataset::validate_name(name)?;
        if dataset::exists(&self.connection, name)? {
            return Err(OrpheusError::dataset_exists(name));
        }

        let attributes = match source {
            InitSource::File { path, attributes, .. } => {
                if !path.is_file() {
                    return Err(OrpheusError::artifact_not_found(format!("File {}", path.display())));
                }
                attributes.clone()
            }
            InitSource::Table(table) => backend::describe_table(&self.connection, table)?,
        };
        schema::validate_attributes(&attributes)?;
        let names = attribute_names(&attributes);
        validate_key(key, &names)?;

        let tables = DatasetTables::for_dataset(name);
        let tx = Transaction::begin(&self.connection)?;
        let conn = tx.connection();

        dataset::insert_entry(
            conn,
            &DatasetEntry {
                name: name.to_string(),
                owner: self.principal.clone(),
                key: key.to_vec(),
                created_at: Utc::now(),
            },
        )?;
        dataset::create_storage(conn, &tables, &attributes)?;

        let staging = record_store::create_staging(conn, &tables, &names)?;
        match source {
            InitSource::File {
                path,
                header,
                delimiter,
                ..
            } => {
                record_store::stage_file(conn, staging.name(), &names, path, *header, delimiter)?;
            }
            InitSource::Table(table) => {
                record_store::stage_table(conn, staging.name(), &names, table)?;
            }
        }
        let select = format!("SELECT * FROM {}", backend::quote_ident(staging.name()));
        let rids = record_store::ingest(conn, &tables, &names, &select)?;
        drop(staging);

        let root_vid = version::create_root(conn, &tables, &self.principal, rids.len() as u64)?;
        index_table::init_membership(conn, &tables, root_vid, &rids)?;

        let provenance = ProvenanceGuard::record(&self.tracker, source.artifact(), name, &[root_vid])?;
        tx.commit()?;
        provenance.keep();

        log::info!(
            "Initialized dataset {} with {} records (version {})",
            name,
            rids.len(),
            root_vid
        );
        Ok(InitOutcome {
            dataset: name.to_string(),
            root_vid,
            record_count: rids.len() as u64,
            attributes,
            key: key.to_vec(),
        })
    }

    /// Remove a dataset and all its storage; returns whether it existed
    pub fn drop_dataset(&self, name: &str) -> Result<bool> {
        dataset::validate_name(name)?;
        // Names outside the catalog own no storage
        if !dataset::exists(&self.connection, name)? {
            log::debug!("Dataset {} is not in the catalog; nothing to drop", name);
            return Ok(false);
        }
        let entry = dataset::require(&self.connection, name)?;
        let tables = DatasetTables::for_dataset(&entry.name);

        let tx = Transaction::begin(&self.connection)?;
        dataset::drop_storage(tx.connection(), &tables)?;
        tx.commit()?;

        log::info!("Dropped dataset {}", entry.name);
        Ok(true)
    }

    pub fn checkout(
        &self,
        dataset_name: &str,
        vids: &[i64],
        destination: &Destination,
        options: &CheckoutOptions,
    ) -> Result<CheckoutOutcome> {
        CheckoutEngine::new(&self.connection, &self.tracker, &self.principal).checkout(
            dataset_name,
            vids,
            destination,
            options,
        )
    }

    pub fn commit(&self, message: &str, source: &CommitSource) -> Result<CommitOutcome> {
        CommitEngine::new(&self.connection, &self.tracker).commit(&self.principal, message, source)
    }

    pub fn list_datasets(&self) -> Result<Vec<DatasetEntry>> {
        dataset::list(&self.connection)
    }

    pub fn describe_dataset(&self, name: &str) -> Result<DatasetDescription> {
        let entry = dataset::require(&self.connection, name)?;
        let tables = DatasetTables::for_dataset(&entry.name);
        let versions = version::list_versions(&self.connection, &tables)?;

        let nodes = versions
            .iter()
            .map(|v| VersionNode {
                version: v.clone(),
                children: versions
                    .iter()
                    .filter(|c| c.parent_vids.contains(&v.vid))
                    .map(|c| c.vid)
                    .collect(),
            })
            .collect();

        Ok(DatasetDescription {
            attributes: record_store::attributes(&self.connection, &tables)?,
            record_store_size: record_store::size(&self.connection, &tables)?,
            name: entry.name,
            owner: entry.owner,
            key: entry.key,
            created_at: entry.created_at,
            versions: nodes,
        })
    }

    /// Union of the record sets of the listed versions
    pub fn record_set(&self, dataset_name: &str, vids: &[i64]) -> Result<BTreeSet<i64>> {
        let tables = self.tables(dataset_name)?;
        index_table::record_set(&self.connection, &tables, vids)
    }

    pub fn membership_count(&self, dataset_name: &str, vid: i64) -> Result<u64> {
        let tables = self.tables(dataset_name)?;
        index_table::membership_count(&self.connection, &tables, vid)
    }

    pub fn get_version(&self, dataset_name: &str, vid: i64) -> Result<Version> {
        let tables = self.tables(dataset_name)?;
        version::get_version(&self.connection, &tables, vid)
    }

    pub fn list_versions(&self, dataset_name: &str) -> Result<Vec<Version>> {
        let tables = self.tables(dataset_name)?;
        version::list_versions(&self.connection, &tables)
    }

    pub fn children(&self, dataset_name: &str, vid: i64) -> Result<Vec<i64>> {
        let tables = self.tables(dataset_name)?;
        version::children(&self.connection, &tables, vid)
    }

    pub fn ancestors(&self, dataset_name: &str, vid: i64) -> Result<Vec<i64>> {
        let tables = self.tables(dataset_name)?;
        version::ancestors(&self.connection, &tables, vid)
    }

    /// Record a version and its membership in one step
    pub fn append_version(&self, dataset_name: &str, new_version: &NewVersion, rids: &[i64]) -> Result<i64> {
        let tables = self.tables(dataset_name)?;
        version::append_version(&self.connection, &tables, new_version, rids)
    }

    pub fn lineage(&self, artifact: &Artifact) -> Result<Lineage> {
        self.tracker.lineage(artifact)
    }

    pub fn reset_provenance(&self) -> Result<()> {
        self.tracker.reset()
    }

    pub fn grants_for(&self, table: &str) -> Result<Vec<Grant>> {
        access::grants_for(&self.connection, table)
    }

    fn tables(&self, dataset_name: &str) -> Result<DatasetTables> {
        let entry = dataset::require(&self.connection, dataset_name)?;
        Ok(DatasetTables::for_dataset(&entry.name))
    }
}

fn validate_key(key: &[String], names: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for column in key {
        if !names.contains(column) {
            return Err(OrpheusError::bad_parameters(format!(
                "Key attribute '{}' is not one of: {}",
                column,
                names.join(", ")
            )));
        }
        if !seen.insert(column.as_str()) {
            return Err(OrpheusError::bad_parameters(format!(
                "Key attribute '{}' is listed twice",
                column
            )));
        }
    }
    Ok(())
}
