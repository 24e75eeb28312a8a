//! Read/write grants on checked out tables
//!
//! DuckDB has no role system, so grants are rows in `orpheus_grants`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use serde::Serialize;

pub const GRANTS_TABLE: &str = "orpheus_grants";

/// Privilege recorded for the principal that checked a table out
pub const READ_WRITE: &str = "read_write";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grant {
    pub table_name: String,
    pub principal: String,
    pub privilege: String,
    pub granted_at: DateTime<Utc>,
}

pub fn ensure_grants_table(connection: &Connection) -> Result<()> {
    connection.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            table_name VARCHAR NOT NULL,
            principal VARCHAR NOT NULL,
            privilege VARCHAR NOT NULL,
            granted_at VARCHAR NOT NULL
        )",
        GRANTS_TABLE
    ))?;
    Ok(())
}

/// Give a principal read/write access to a table; repeated grants are no-ops
pub fn grant(connection: &Connection, table: &str, principal: &str) -> Result<()> {
    let already: i64 = connection.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE table_name = ? AND principal = ? AND privilege = ?",
            GRANTS_TABLE
        ),
        params![table, principal, READ_WRITE],
        |row| row.get(0),
    )?;
    if already > 0 {
        return Ok(());
    }
    connection.execute(
        &format!(
            "INSERT INTO {} (table_name, principal, privilege, granted_at) VALUES (?, ?, ?, ?)",
            GRANTS_TABLE
        ),
        params![table, principal, READ_WRITE, Utc::now().to_rfc3339()],
    )?;
    log::debug!("Granted {} on {} to {}", READ_WRITE, table, principal);
    Ok(())
}

pub fn grants_for(connection: &Connection, table: &str) -> Result<Vec<Grant>> {
    let mut stmt = connection.prepare(&format!(
        "SELECT table_name, principal, privilege, granted_at FROM {} WHERE table_name = ? ORDER BY principal",
        GRANTS_TABLE
    ))?;
    let rows = stmt.query_map([table], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut grants = Vec::new();
    for row in rows {
        let (table_name, principal, privilege, granted_at) = row?;
        grants.push(Grant {
            table_name,
            principal,
            privilege,
            granted_at: crate::dataset::parse_timestamp(&granted_at)?,
        });
    }
    Ok(grants)
}
