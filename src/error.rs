//! Error types for orpheus operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrpheusError>;

#[derive(Error, Debug)]
pub enum OrpheusError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Dataset {name} already exists")]
    DatasetExists { name: String },

    #[error("Dataset {name} does not exist")]
    DatasetNotFound { name: String },

    #[error("Dataset {name} already has a version graph")]
    DuplicateDataset { name: String },

    #[error("Version {vid} not found in dataset {dataset}")]
    VersionNotFound { dataset: String, vid: i64 },

    #[error("Parent version {vid} does not exist in dataset {dataset}")]
    InvalidParent { dataset: String, vid: i64 },

    #[error("Schema mismatch: {message}")]
    SchemaMismatch { message: String },

    #[error("No lineage recorded for {artifact}; check it out from a dataset first")]
    NoLineage { artifact: String },

    #[error("Destination collision: {message}")]
    DestinationCollision { message: String },

    #[error("Bad parameters: {message}")]
    BadParameters { message: String },

    #[error("{artifact} does not exist")]
    ArtifactNotFound { artifact: String },

    #[error("Corrupt metadata: {message}")]
    CorruptMetadata { message: String },

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled by user")]
    Cancelled,
}

impl OrpheusError {
    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::Workspace(msg.into())
    }

    pub fn dataset_exists(name: impl Into<String>) -> Self {
        Self::DatasetExists { name: name.into() }
    }

    pub fn dataset_not_found(name: impl Into<String>) -> Self {
        Self::DatasetNotFound { name: name.into() }
    }

    pub fn schema_mismatch(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: msg.into(),
        }
    }

    pub fn no_lineage(artifact: impl Into<String>) -> Self {
        Self::NoLineage {
            artifact: artifact.into(),
        }
    }

    pub fn destination_collision(msg: impl Into<String>) -> Self {
        Self::DestinationCollision {
            message: msg.into(),
        }
    }

    pub fn bad_parameters(msg: impl Into<String>) -> Self {
        Self::BadParameters {
            message: msg.into(),
        }
    }

    pub fn artifact_not_found(artifact: impl Into<String>) -> Self {
        Self::ArtifactNotFound {
            artifact: artifact.into(),
        }
    }

    pub fn corrupt_metadata(msg: impl Into<String>) -> Self {
        Self::CorruptMetadata {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
