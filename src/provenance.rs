//! Lineage bookkeeping for materialized tables and files.
//!
//! The tracker persists a JSON document with four collections:
//! `table_map` and `file_map` (artifact -> dataset and version list),
//! `table_created_time` (artifact -> materialization time) and
//! `merged_tables` (artifacts produced from more than one version).
//! It is best-effort bookkeeping and never a source of truth for content.

use crate::error::{OrpheusError, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// An externally visible artifact produced by checkout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Artifact {
    Table(String),
    /// Absolute path of a delimited file
    File(PathBuf),
}

impl Artifact {
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table(name.into())
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Key used in the provenance document
    pub fn key(&self) -> String {
        match self {
            Self::Table(name) => name.clone(),
            Self::File(path) => path.to_string_lossy().to_string(),
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(name) => write!(f, "table {}", name),
            Self::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Dataset and contributing versions of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub dataset: String,
    pub vids: Vec<i64>,
}

/// Everything the tracker knows about one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntry {
    pub lineage: Lineage,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProvenanceDocument {
    #[serde(default)]
    file_map: IndexMap<String, Lineage>,
    #[serde(default)]
    table_map: IndexMap<String, Lineage>,
    #[serde(default)]
    table_created_time: IndexMap<String, DateTime<Utc>>,
    #[serde(default)]
    merged_tables: Vec<String>,
}

impl ProvenanceDocument {
    fn namespace(&self, artifact: &Artifact) -> &IndexMap<String, Lineage> {
        match artifact {
            Artifact::Table(_) => &self.table_map,
            Artifact::File(_) => &self.file_map,
        }
    }

    fn namespace_mut(&mut self, artifact: &Artifact) -> &mut IndexMap<String, Lineage> {
        match artifact {
            Artifact::Table(_) => &mut self.table_map,
            Artifact::File(_) => &mut self.file_map,
        }
    }

    fn entry(&self, artifact: &Artifact) -> Option<TrackedEntry> {
        let key = artifact.key();
        self.namespace(artifact).get(&key).map(|lineage| TrackedEntry {
            lineage: lineage.clone(),
            created_at: self.table_created_time.get(&key).copied(),
        })
    }

    fn put(&mut self, artifact: &Artifact, entry: TrackedEntry) {
        let key = artifact.key();
        let merged = entry.lineage.vids.len() > 1;
        self.namespace_mut(artifact).insert(key.clone(), entry.lineage);
        match entry.created_at {
            Some(created_at) => {
                self.table_created_time.insert(key.clone(), created_at);
            }
            None => {
                self.table_created_time.shift_remove(&key);
            }
        }
        self.merged_tables.retain(|k| k != &key);
        if merged {
            self.merged_tables.push(key);
        }
    }

    fn remove(&mut self, artifact: &Artifact) {
        let key = artifact.key();
        self.namespace_mut(artifact).shift_remove(&key);
        self.table_created_time.shift_remove(&key);
        self.merged_tables.retain(|k| k != &key);
    }
}

/// Persistent artifact -> lineage mapping
#[derive(Debug, Clone)]
pub struct ProvenanceTracker {
    path: PathBuf,
}

impl ProvenanceTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite the lineage of an artifact; returns the entry it replaced
    pub fn record(&self, artifact: &Artifact, dataset: &str, vids: &[i64]) -> Result<Option<TrackedEntry>> {
        let mut document = self.load()?;
        let previous = document.entry(artifact);
        document.put(
            artifact,
            TrackedEntry {
                lineage: Lineage {
                    dataset: dataset.to_string(),
                    vids: vids.to_vec(),
                },
                created_at: Some(Utc::now()),
            },
        );
        self.save(&document)?;
        log::debug!("Recorded lineage {} -> {} {:?}", artifact, dataset, vids);
        Ok(previous)
    }

    /// Put back a previously returned entry, or forget the artifact when there was none
    pub fn restore(&self, artifact: &Artifact, previous: Option<TrackedEntry>) -> Result<()> {
        let mut document = self.load()?;
        match previous {
            Some(entry) => document.put(artifact, entry),
            None => document.remove(artifact),
        }
        self.save(&document)
    }

    /// Drop everything recorded for an artifact
    pub fn forget(&self, artifact: &Artifact) -> Result<()> {
        self.restore(artifact, None)
    }

    /// Look up the dataset and versions an artifact was produced from
    pub fn lineage(&self, artifact: &Artifact) -> Result<Lineage> {
        self.load()?
            .entry(artifact)
            .map(|entry| entry.lineage)
            .ok_or_else(|| OrpheusError::no_lineage(artifact.to_string()))
    }

    /// When the artifact was materialized, if known
    pub fn created_at(&self, artifact: &Artifact) -> Result<Option<DateTime<Utc>>> {
        Ok(self.load()?.table_created_time.get(&artifact.key()).copied())
    }

    /// Artifacts that were materialized from more than one version
    pub fn merged_artifacts(&self) -> Result<Vec<String>> {
        Ok(self.load()?.merged_tables)
    }

    /// Clear every collection
    pub fn reset(&self) -> Result<()> {
        self.save(&ProvenanceDocument::default())?;
        log::info!("Provenance document reset at {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<ProvenanceDocument> {
        if !self.path.exists() {
            return Ok(ProvenanceDocument::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ProvenanceDocument::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, document: &ProvenanceDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write next to the target and rename so readers never see a partial document
        let tmp_path = self.path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp_path, serde_json::to_string_pretty(document)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
