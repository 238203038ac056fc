// Database module - SQLite connection, schema and row access

pub mod models;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::utils::round_money;
pub use models::{
    AppliedClassification, BankTransaction, ClassificationRule, SaleKeyPolicy, SaleRecord,
    TerminalMovement, TransactionType,
};

/// Get the default database path (~/.conciliador/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let data_dir = PathBuf::from(home).join(".conciliador");

    std::fs::create_dir_all(&data_dir).context("Failed to create .conciliador directory")?;

    Ok(data_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Apply the schema to an open connection (idempotent)
pub fn apply_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;
    Ok(())
}

/// Initialize the database with schema
///
/// Creates the database file if needed and runs the schema SQL. Safe to run
/// on an existing database.
pub fn init_database(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;

    info!("Database initialized successfully");
    Ok(conn)
}

/// Money as persisted: two fractional digits, TEXT
fn money_text(value: Decimal) -> String {
    round_money(value).to_string()
}

/// Insert or update a bank transaction on its natural key
pub fn upsert_bank_transaction(conn: &Connection, tx: &BankTransaction) -> Result<()> {
    let amount = round_money(tx.amount);
    conn.execute(
        "INSERT INTO bank_transactions (
            transaction_date, value_date, description, amount, transaction_type, source_file
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(transaction_date, amount, description) DO UPDATE SET
            value_date = excluded.value_date,
            transaction_type = excluded.transaction_type,
            source_file = excluded.source_file",
        params![
            tx.transaction_date,
            tx.value_date,
            tx.description,
            amount.to_string(),
            TransactionType::from_amount(amount).as_str(),
            tx.source_file,
        ],
    )?;
    Ok(())
}

/// Insert or update a sale on its natural key
pub fn upsert_sale(conn: &Connection, sale: &SaleRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO sales (sale_date, payment_method, amount, source_file, natural_key)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(natural_key) DO UPDATE SET
            sale_date = excluded.sale_date,
            payment_method = excluded.payment_method,
            amount = excluded.amount,
            source_file = excluded.source_file",
        params![
            sale.sale_date,
            sale.payment_method,
            money_text(sale.amount),
            sale.source_file,
            sale.natural_key,
        ],
    )?;
    Ok(())
}

/// Insert or update a terminal settlement line on (date, terminal, amount)
pub fn upsert_terminal_movement(conn: &Connection, movement: &TerminalMovement) -> Result<()> {
    conn.execute(
        "INSERT INTO terminal_movements (
            movement_date, terminal_id, amount, debit_credit, fee, net_amount, source_file
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(movement_date, terminal_id, amount) DO UPDATE SET
            debit_credit = excluded.debit_credit,
            fee = excluded.fee,
            net_amount = excluded.net_amount,
            source_file = excluded.source_file",
        params![
            movement.movement_date,
            movement.terminal_id,
            money_text(movement.amount),
            movement.debit_credit,
            movement.fee.map(money_text),
            movement.net_amount.map(money_text),
            movement.source_file,
        ],
    )?;
    Ok(())
}

fn bank_transaction_from_row(row: &rusqlite::Row) -> Result<BankTransaction, rusqlite::Error> {
    let type_str: String = row.get(5)?;
    let transaction_type = type_str.parse::<TransactionType>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(5, type_str.clone(), rusqlite::types::Type::Text)
    })?;

    Ok(BankTransaction {
        id: Some(row.get(0)?),
        transaction_date: row.get(1)?,
        value_date: row.get(2)?,
        description: row.get(3)?,
        amount: get_decimal_value(row, 4)?,
        transaction_type,
        source_file: row.get(6)?,
    })
}

const BANK_COLUMNS: &str =
    "id, transaction_date, value_date, description, amount, transaction_type, source_file";

/// Bank credits with optional inclusive bounds, ordered by date then insertion
pub fn get_credits_in_range(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<BankTransaction>> {
    let sql = format!(
        "SELECT {} FROM bank_transactions
         WHERE transaction_type = 'credit'
           AND (?1 IS NULL OR transaction_date >= ?1)
           AND (?2 IS NULL OR transaction_date <= ?2)
         ORDER BY transaction_date ASC, id ASC",
        BANK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![from, to], bank_transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Bank credits dated strictly before `date`, newest first
pub fn get_credits_before(conn: &Connection, date: NaiveDate) -> Result<Vec<BankTransaction>> {
    let sql = format!(
        "SELECT {} FROM bank_transactions
         WHERE transaction_type = 'credit' AND transaction_date < ?1
         ORDER BY transaction_date DESC, id DESC",
        BANK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![date], bank_transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Debits without an applied classification
pub fn get_unclassified_debits(conn: &Connection) -> Result<Vec<BankTransaction>> {
    let sql = format!(
        "SELECT {} FROM bank_transactions
         WHERE transaction_type = 'debit'
           AND id NOT IN (SELECT transaction_id FROM applied_classifications)
         ORDER BY transaction_date ASC, id ASC",
        BANK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], bank_transaction_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sales with optional inclusive bounds, ordered by date then insertion
pub fn get_sales_in_range(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<SaleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, sale_date, payment_method, amount, source_file, natural_key
         FROM sales
         WHERE (?1 IS NULL OR sale_date >= ?1)
           AND (?2 IS NULL OR sale_date <= ?2)
         ORDER BY sale_date ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![from, to], |row| {
            Ok(SaleRecord {
                id: Some(row.get(0)?),
                sale_date: row.get(1)?,
                payment_method: row.get(2)?,
                amount: get_decimal_value(row, 3)?,
                source_file: row.get(4)?,
                natural_key: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Terminal settlement lines ordered by date
pub fn get_terminal_movements(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<TerminalMovement>> {
    let mut stmt = conn.prepare(
        "SELECT id, movement_date, terminal_id, amount, debit_credit, fee, net_amount, source_file
         FROM terminal_movements
         WHERE (?1 IS NULL OR movement_date >= ?1)
           AND (?2 IS NULL OR movement_date <= ?2)
         ORDER BY movement_date ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![from, to], |row| {
            Ok(TerminalMovement {
                id: Some(row.get(0)?),
                movement_date: row.get(1)?,
                terminal_id: row.get(2)?,
                amount: get_decimal_value(row, 3)?,
                debit_credit: row.get(4)?,
                fee: get_optional_decimal_value(row, 5)?,
                net_amount: get_optional_decimal_value(row, 6)?,
                source_file: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All classification rules in id order
pub fn list_rules(conn: &Connection) -> Result<Vec<ClassificationRule>> {
    let mut stmt =
        conn.prepare("SELECT id, pattern, category, priority FROM classification_rules ORDER BY id")?;
    let rules = stmt
        .query_map([], |row| {
            Ok(ClassificationRule {
                id: row.get(0)?,
                pattern: row.get(1)?,
                category: row.get(2)?,
                priority: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rules)
}

/// Insert a rule or update the category/priority of an existing pattern.
/// Returns the rule id.
pub fn upsert_rule(
    conn: &Connection,
    pattern: &str,
    category: &str,
    priority: Option<i32>,
) -> Result<i64> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        anyhow::bail!("Rule pattern cannot be empty");
    }

    conn.execute(
        "INSERT INTO classification_rules (pattern, category, priority) VALUES (?1, ?2, ?3)
         ON CONFLICT(pattern) DO UPDATE SET
            category = excluded.category,
            priority = excluded.priority",
        params![pattern, category.trim(), priority],
    )?;

    let id = conn.query_row(
        "SELECT id FROM classification_rules WHERE pattern = ?1",
        params![pattern],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Delete one rule; returns false when the id does not exist
pub fn delete_rule(conn: &Connection, rule_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM classification_rules WHERE id = ?1",
        params![rule_id],
    )?;
    Ok(deleted > 0)
}

/// Upsert a batch of (pattern, category, priority) rules
pub fn seed_rules(conn: &mut Connection, rules: &[(&str, &str, Option<i32>)]) -> Result<usize> {
    let tx = conn.transaction()?;
    for (pattern, category, priority) in rules {
        upsert_rule(&tx, pattern, category, *priority)
            .with_context(|| format!("Failed to seed rule '{}'", pattern))?;
    }
    tx.commit()?;
    Ok(rules.len())
}

/// Record a classification. Returns false when the transaction already had one.
pub fn insert_applied_classification(
    conn: &Connection,
    transaction_id: i64,
    category: &str,
    rule_id: Option<i64>,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO applied_classifications (transaction_id, category, rule_id, applied_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![transaction_id, category, rule_id, Utc::now()],
    )?;
    Ok(inserted > 0)
}

/// Remove applied classifications, all or one category
pub fn delete_classifications(conn: &Connection, category: Option<&str>) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM applied_classifications WHERE ?1 IS NULL OR category = ?1",
        params![category],
    )?;
    Ok(deleted)
}

/// Applied classification for a transaction, if any
pub fn get_classification(
    conn: &Connection,
    transaction_id: i64,
) -> Result<Option<AppliedClassification>> {
    let result = conn
        .query_row(
            "SELECT id, transaction_id, category, rule_id, applied_at
             FROM applied_classifications WHERE transaction_id = ?1",
            params![transaction_id],
            |row| {
                Ok(AppliedClassification {
                    id: Some(row.get(0)?),
                    transaction_id: row.get(1)?,
                    category: row.get(2)?,
                    rule_id: row.get(3)?,
                    applied_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(result)
}

/// Debits in range with their applied category (None when unclassified)
pub fn get_debits_with_category(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<(BankTransaction, Option<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.transaction_date, t.value_date, t.description, t.amount,
                t.transaction_type, t.source_file, c.category
         FROM bank_transactions t
         LEFT JOIN applied_classifications c ON c.transaction_id = t.id
         WHERE t.transaction_type = 'debit'
           AND (?1 IS NULL OR t.transaction_date >= ?1)
           AND (?2 IS NULL OR t.transaction_date <= ?2)
         ORDER BY t.transaction_date ASC, t.id ASC",
    )?;
    let rows = stmt
        .query_map(params![from, to], |row| {
            Ok((bank_transaction_from_row(row)?, row.get::<_, Option<String>>(7)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Row count for one of the schema's tables
pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    const TABLES: &[&str] = &[
        "bank_transactions",
        "sales",
        "classification_rules",
        "applied_classifications",
        "terminal_movements",
    ];
    if !TABLES.contains(&table) {
        anyhow::bail!("Unknown table '{}'", table);
    }
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

/// Helper to read Decimal from SQLite (handles INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

/// Helper to read optional Decimal from SQLite
pub fn get_optional_decimal_value(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Decimal>, rusqlite::Error> {
    match row.get_ref(idx)? {
        rusqlite::types::ValueRef::Null => Ok(None),
        _ => get_decimal_value(row, idx).map(Some),
    }
}
