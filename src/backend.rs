//! DuckDB connection handling and small SQL helpers shared by the engine

use crate::error::{OrpheusError, Result};
use crate::schema::Attribute;
use duckdb::Connection;
use std::path::Path;

/// Open (or create) the backing database file and apply session settings
pub fn open_database(path: &Path) -> Result<Connection> {
    let connection = Connection::open(path)?;
    configure(&connection)?;
    log::debug!("Opened backend database at {}", path.display());
    Ok(connection)
}

/// Open a throwaway in-memory database
pub fn open_in_memory() -> Result<Connection> {
    let connection = Connection::open_in_memory()?;
    configure(&connection)?;
    Ok(connection)
}

/// Session settings applied to every connection
pub fn configure(connection: &Connection) -> Result<()> {
    connection.execute_batch(
        "SET enable_progress_bar=false;
         SET preserve_insertion_order=true;",
    )?;
    Ok(())
}

/// Quote an identifier for interpolation into SQL text
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal for interpolation into SQL text
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Comma separated, quoted column list, optionally qualified with a table alias
pub fn column_list(names: &[String], alias: Option<&str>) -> String {
    names
        .iter()
        .map(|name| match alias {
            Some(alias) => format!("{}.{}", alias, quote_ident(name)),
            None => quote_ident(name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Null-safe equality over every named column between two aliases
pub fn tuple_match(names: &[String], left: &str, right: &str) -> String {
    names
        .iter()
        .map(|name| {
            let column = quote_ident(name);
            format!("{left}.{column} IS NOT DISTINCT FROM {right}.{column}")
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Render integer ids as a SQL `IN` list body
pub fn id_list(ids: &[i64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Check whether a table (persistent or temporary) exists; DuckDB resolves
/// table names case-insensitively, so the lookup does too
pub fn table_exists(connection: &Connection, name: &str) -> Result<bool> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM duckdb_tables() WHERE lower(table_name) = lower(?)",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Describe the columns of a table in declaration order
pub fn describe_table(connection: &Connection, name: &str) -> Result<Vec<Attribute>> {
    if !table_exists(connection, name)? {
        return Err(OrpheusError::artifact_not_found(format!("Table {}", name)));
    }
    describe_query(connection, &format!("DESCRIBE {}", quote_ident(name)))
}

/// Run a `DESCRIBE ...` statement and collect `(column_name, column_type)`
pub fn describe_query(connection: &Connection, sql: &str) -> Result<Vec<Attribute>> {
    let mut stmt = connection.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(Attribute {
            name: row.get::<_, String>(0)?,
            data_type: row.get::<_, String>(1)?,
        })
    })?;

    let mut attributes = Vec::new();
    for row in rows {
        attributes.push(row?);
    }
    Ok(attributes)
}

/// Drop a table if it exists
pub fn drop_table(connection: &Connection, name: &str) -> Result<()> {
    connection.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(name)))?;
    Ok(())
}

/// Count the rows of a table
pub fn count_rows(connection: &Connection, name: &str) -> Result<u64> {
    let count: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(name)),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Check that a name is usable as a bare SQL identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
