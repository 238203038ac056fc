#![allow(dead_code)]

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;

pub fn open_conn(path: &Path) -> Result<Connection> {
    Connection::open(path).context("failed to open test database")
}

pub fn count(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// (description, amount, type) of every bank row in date order
pub fn list_bank_rows(conn: &Connection) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT description, amount, transaction_type FROM bank_transactions
         ORDER BY transaction_date, id",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn category_of(conn: &Connection, description: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare(
        "SELECT c.category FROM bank_transactions t
         LEFT JOIN applied_classifications c ON c.transaction_id = t.id
         WHERE t.description = ?1",
    )?;
    let category = stmt.query_row([description], |row| row.get(0))?;
    Ok(category)
}
