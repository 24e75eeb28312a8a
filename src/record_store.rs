//! The append-only record store of a dataset and the staging relations that
//! feed it
//!
//! Candidate rows never go straight into `<name>_datatable`. They are loaded
//! into a temporary staging table with the record store's column types,
//! numbered from the dataset's rid sequence, and only then appended.

use crate::backend::{self, column_list, quote_ident, quote_literal};
use crate::dataset::DatasetTables;
use crate::error::Result;
use crate::schema::{Attribute, RID_COLUMN};
use crate::scope::TableGuard;
use duckdb::Connection;
use std::path::Path;

/// User attributes of the record store, in declaration order
pub fn attributes(connection: &Connection, tables: &DatasetTables) -> Result<Vec<Attribute>> {
    Ok(backend::describe_table(connection, &tables.datatable)?
        .into_iter()
        .filter(|a| a.name != RID_COLUMN)
        .collect())
}

/// Number of records ever ingested
pub fn size(connection: &Connection, tables: &DatasetTables) -> Result<u64> {
    backend::count_rows(connection, &tables.datatable)
}

/// Empty temporary table shaped like the record store without its rid column
pub fn create_staging<'a>(
    connection: &'a Connection,
    tables: &DatasetTables,
    names: &[String],
) -> Result<TableGuard<'a>> {
    let name = temp_name("stage");
    connection.execute_batch(&format!(
        "CREATE TEMP TABLE {} AS SELECT {} FROM {} LIMIT 0",
        quote_ident(&name),
        column_list(names, None),
        quote_ident(&tables.datatable)
    ))?;
    log::debug!("Created staging table {}", name);
    Ok(TableGuard::new(connection, name))
}

/// Load a delimited file into a staging table; `file_columns` lists the
/// staging columns in the order the file stores them
pub fn stage_file(
    connection: &Connection,
    staging: &str,
    file_columns: &[String],
    path: &Path,
    header: bool,
    delimiter: &str,
) -> Result<u64> {
    connection.execute_batch(&format!(
        "COPY {} ({}) FROM {} (FORMAT CSV, HEADER {}, DELIMITER {})",
        quote_ident(staging),
        column_list(file_columns, None),
        quote_literal(&path.to_string_lossy()),
        header,
        quote_literal(delimiter)
    ))?;
    let staged = backend::count_rows(connection, staging)?;
    log::debug!("Staged {} rows from {}", staged, path.display());
    Ok(staged)
}

/// Copy a table's rows into a staging table, matching columns by name
pub fn stage_table(connection: &Connection, staging: &str, names: &[String], source: &str) -> Result<u64> {
    let columns = column_list(names, None);
    connection.execute_batch(&format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        quote_ident(staging),
        columns,
        columns,
        quote_ident(source)
    ))?;
    let staged = backend::count_rows(connection, staging)?;
    log::debug!("Staged {} rows from table {}", staged, source);
    Ok(staged)
}

/// Give every row produced by `select_sql` a fresh rid and append it to the
/// record store; returns the new rids in ascending order
pub fn ingest(connection: &Connection, tables: &DatasetTables, names: &[String], select_sql: &str) -> Result<Vec<i64>> {
    let numbered = TableGuard::new(connection, temp_name("ingest"));
    let columns = column_list(names, None);
    connection.execute_batch(&format!(
        "CREATE TEMP TABLE {numbered} AS SELECT nextval({seq}) AS {rid}, {columns} FROM ({select_sql}) s;
         INSERT INTO {data} ({rid}, {columns}) SELECT {rid}, {columns} FROM {numbered} ORDER BY {rid};",
        numbered = quote_ident(numbered.name()),
        seq = quote_literal(&tables.rid_sequence),
        rid = quote_ident(RID_COLUMN),
        columns = columns,
        select_sql = select_sql,
        data = quote_ident(&tables.datatable),
    ))?;

    let mut stmt = connection.prepare(&format!(
        "SELECT {} FROM {} ORDER BY 1",
        quote_ident(RID_COLUMN),
        quote_ident(numbered.name())
    ))?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut rids = Vec::new();
    for rid in rows {
        rids.push(rid?);
    }
    log::debug!("Appended {} records to {}", rids.len(), tables.datatable);
    Ok(rids)
}

fn temp_name(purpose: &str) -> String {
    format!("orpheus_{}_{}", purpose, uuid::Uuid::new_v4().simple())
}
