//! Version membership: which record ids belong to which version

use crate::backend::{id_list, quote_ident};
use crate::dataset::DatasetTables;
use crate::error::{OrpheusError, Result};
use duckdb::Connection;
use std::collections::BTreeSet;

/// Rows per generated `INSERT ... VALUES` statement
const INSERT_CHUNK_SIZE: usize = 1000;

/// Membership of the root version
pub fn init_membership(connection: &Connection, tables: &DatasetTables, vid: i64, rids: &[i64]) -> Result<()> {
    if membership_count(connection, tables, vid)? > 0 {
        return Err(OrpheusError::bad_parameters(format!(
            "Version {} of dataset {} already has membership rows",
            vid, tables.dataset
        )));
    }
    insert_membership(connection, tables, vid, rids)
}

/// Membership of a newly committed version; the (vid, rid) key rejects a second call
pub fn add_membership(connection: &Connection, tables: &DatasetTables, vid: i64, rids: &[i64]) -> Result<()> {
    insert_membership(connection, tables, vid, rids)
}

fn insert_membership(connection: &Connection, tables: &DatasetTables, vid: i64, rids: &[i64]) -> Result<()> {
    let table = quote_ident(&tables.indextable);
    for chunk in rids.chunks(INSERT_CHUNK_SIZE) {
        let values = chunk
            .iter()
            .map(|rid| format!("({}, {})", vid, rid))
            .collect::<Vec<_>>()
            .join(", ");
        connection.execute_batch(&format!("INSERT INTO {} (vid, rid) VALUES {}", table, values))?;
    }
    log::debug!("Added {} membership rows for {} v{}", rids.len(), tables.dataset, vid);
    Ok(())
}

/// Union of the record sets of every listed version
pub fn record_set(connection: &Connection, tables: &DatasetTables, vids: &[i64]) -> Result<BTreeSet<i64>> {
    let mut rids = BTreeSet::new();
    if vids.is_empty() {
        return Ok(rids);
    }

    let mut stmt = connection.prepare(&record_set_query(tables, vids))?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    for rid in rows {
        rids.insert(rid?);
    }
    Ok(rids)
}

/// Subquery selecting the record ids of the listed versions
pub fn record_set_query(tables: &DatasetTables, vids: &[i64]) -> String {
    format!(
        "SELECT DISTINCT rid FROM {} WHERE vid IN ({})",
        quote_ident(&tables.indextable),
        id_list(vids)
    )
}

pub fn membership_count(connection: &Connection, tables: &DatasetTables, vid: i64) -> Result<u64> {
    let count: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE vid = ?", quote_ident(&tables.indextable)),
        [vid],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}
