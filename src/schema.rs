//! Attribute lists and the schema-file format

use crate::backend::{self, quote_literal};
use crate::error::{OrpheusError, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Column name reserved for the record identifier
pub const RID_COLUMN: &str = "rid";

/// One attribute of a dataset or candidate relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub data_type: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Validate a user supplied attribute list before it is turned into DDL
pub fn validate_attributes(attributes: &[Attribute]) -> Result<()> {
    if attributes.is_empty() {
        return Err(OrpheusError::bad_parameters("Schema has no attributes"));
    }

    let mut seen = BTreeSet::new();
    for attribute in attributes {
        if !backend::is_identifier(&attribute.name) {
            return Err(OrpheusError::bad_parameters(format!(
                "Invalid attribute name '{}'",
                attribute.name
            )));
        }
        if attribute.name.eq_ignore_ascii_case(RID_COLUMN) {
            return Err(OrpheusError::bad_parameters(format!(
                "Attribute name '{}' is reserved",
                RID_COLUMN
            )));
        }
        if !seen.insert(attribute.name.to_lowercase()) {
            return Err(OrpheusError::bad_parameters(format!(
                "Duplicate attribute '{}'",
                attribute.name
            )));
        }
        let type_ok = !attribute.data_type.trim().is_empty()
            && attribute
                .data_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ',' | '[' | ']'));
        if !type_ok {
            return Err(OrpheusError::bad_parameters(format!(
                "Invalid type '{}' for attribute '{}'",
                attribute.data_type, attribute.name
            )));
        }
    }
    Ok(())
}

/// Parse a schema file: one `name type` (or `name,type`) pair per line
pub fn parse_schema_file(path: &Path) -> Result<Vec<Attribute>> {
    let content = fs::read_to_string(path).map_err(|e| {
        OrpheusError::bad_parameters(format!(
            "Failed to read schema file '{}': {}",
            path.display(),
            e
        ))
    })?;
    parse_schema(&content)
}

/// Parse schema text; `#` starts a comment line
pub fn parse_schema(content: &str) -> Result<Vec<Attribute>> {
    let mut attributes = Vec::new();

    for (line_no, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let split_at = trimmed.find(|c: char| c == ',' || c.is_whitespace());
        let (name, data_type) = match split_at {
            Some(idx) => {
                let rest = trimmed[idx..].trim_start();
                let rest = rest.strip_prefix(',').unwrap_or(rest);
                (&trimmed[..idx], rest.trim())
            }
            None => (trimmed, ""),
        };

        if data_type.is_empty() {
            return Err(OrpheusError::bad_parameters(format!(
                "Schema line {} has no type: '{}'",
                line_no + 1,
                trimmed
            )));
        }

        attributes.push(Attribute::new(name, data_type));
    }

    validate_attributes(&attributes)?;
    Ok(attributes)
}

/// Names of the attributes, in order
pub fn attribute_names(attributes: &[Attribute]) -> Vec<String> {
    attributes.iter().map(|a| a.name.clone()).collect()
}

/// Describe the columns of a delimited file with a header line
pub fn attributes_of_file(connection: &Connection, path: &Path, delimiter: &str) -> Result<Vec<Attribute>> {
    if !path.is_file() {
        return Err(OrpheusError::artifact_not_found(format!(
            "File {}",
            path.display()
        )));
    }
    let sql = format!(
        "DESCRIBE SELECT * FROM read_csv({}, header = true, delim = {})",
        quote_literal(&path.to_string_lossy()),
        quote_literal(delimiter)
    );
    backend::describe_query(connection, &sql)
}

/// Number of fields in a header-less delimited file
pub fn field_count_of_file(connection: &Connection, path: &Path, delimiter: &str) -> Result<usize> {
    if !path.is_file() {
        return Err(OrpheusError::artifact_not_found(format!(
            "File {}",
            path.display()
        )));
    }
    let sql = format!(
        "DESCRIBE SELECT * FROM read_csv({}, header = false, delim = {})",
        quote_literal(&path.to_string_lossy()),
        quote_literal(delimiter)
    );
    Ok(backend::describe_query(connection, &sql)?.len())
}

/// Order-independent comparison of two attribute name sets
pub fn compare_attribute_sets(expected: &[String], actual: &[String]) -> Result<()> {
    let expected_set: BTreeSet<&str> = expected.iter().map(String::as_str).collect();
    let actual_set: BTreeSet<&str> = actual.iter().map(String::as_str).collect();

    let missing: Vec<&str> = expected_set.difference(&actual_set).copied().collect();
    let unexpected: Vec<&str> = actual_set.difference(&expected_set).copied().collect();

    if missing.is_empty() && unexpected.is_empty() {
        return Ok(());
    }

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing attributes: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        parts.push(format!("unexpected attributes: {}", unexpected.join(", ")));
    }
    Err(OrpheusError::schema_mismatch(parts.join("; ")))
}
