//! # orpheus
//!
//! Dataset-level version control over an embedded relational store. Tables
//! and delimited files are loaded as datasets, committed as versions and
//! checked out as any union of historical versions.

pub mod access;
pub mod backend;
pub mod checkout;
pub mod cli;
pub mod commands;
pub mod dataset;
pub mod diff;
pub mod engine;
pub mod error;
pub mod index_table;
pub mod output;
pub mod progress;
pub mod provenance;
pub mod record_store;
pub mod schema;
pub mod scope;
pub mod version;
pub mod workspace;

pub use checkout::{CheckoutOptions, CheckoutOutcome, Destination};
pub use diff::{CommitOutcome, CommitSource};
pub use engine::{InitOutcome, InitSource, VersionEngine};
pub use error::{OrpheusError, Result};
pub use provenance::{Artifact, Lineage, ProvenanceTracker};
pub use version::{NewVersion, Version};
pub use workspace::OrpheusWorkspace;

/// Current format version of the workspace config
pub const FORMAT_VERSION: &str = "1.0.0";

/// Field delimiter used when none is given
pub const DEFAULT_DELIMITER: &str = ",";
