//! libSQL-backed subscriber directory.
//!
//! One table, named by configuration, keyed by `email_address`. This crate
//! only ever reads from it; registration happens elsewhere.

use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use regex::Regex;
use tracing::{debug, info};

use super::{SubscriberDirectory, SubscriberRecord};
use crate::email::CanonicalAddress;
use crate::error::DirectoryError;

static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid table-name regex"));

/// libSQL subscriber directory.
pub struct LibSqlDirectory {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    table: String,
}

impl LibSqlDirectory {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path, table: &str) -> Result<Self, DirectoryError> {
        let table = validate_table(table)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DirectoryError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DirectoryError::Connection(format!("Failed to open libSQL database: {e}")))?;

        let directory = Self::from_database(db, table)?;
        directory.init_schema().await?;
        info!(path = %path.display(), table = %directory.table, "Subscriber directory opened");
        Ok(directory)
    }

    /// Create an in-memory directory (for tests).
    pub async fn new_memory(table: &str) -> Result<Self, DirectoryError> {
        let table = validate_table(table)?;
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DirectoryError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let directory = Self::from_database(db, table)?;
        directory.init_schema().await?;
        Ok(directory)
    }

    fn from_database(db: LibSqlDatabase, table: String) -> Result<Self, DirectoryError> {
        let conn = db
            .connect()
            .map_err(|e| DirectoryError::Connection(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            table,
        })
    }

    async fn init_schema(&self) -> Result<(), DirectoryError> {
        let sql = format!(
            r#"CREATE TABLE IF NOT EXISTS "{}" (
                email_address TEXT PRIMARY KEY,
                active INTEGER NOT NULL DEFAULT 0,
                telegram_user_id TEXT NOT NULL DEFAULT ''
            )"#,
            self.table
        );
        self.conn
            .execute(&sql, ())
            .await
            .map_err(|e| DirectoryError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }
}

fn validate_table(table: &str) -> Result<String, DirectoryError> {
    if TABLE_NAME.is_match(table) {
        Ok(table.to_string())
    } else {
        Err(DirectoryError::InvalidTable(table.to_string()))
    }
}

/// Map a row (email_address, active, telegram_user_id) to a record.
///
/// A NULL `active` reads as inactive; a NULL user id reads as empty.
fn row_to_record(row: &libsql::Row) -> Result<SubscriberRecord, libsql::Error> {
    let active: i64 = row.get::<i64>(1).unwrap_or(0);
    Ok(SubscriberRecord {
        email_address: row.get(0)?,
        active: active != 0,
        telegram_user_id: row.get::<String>(2).unwrap_or_default(),
    })
}

#[async_trait]
impl SubscriberDirectory for LibSqlDirectory {
    async fn lookup(
        &self,
        address: &CanonicalAddress,
    ) -> Result<Option<SubscriberRecord>, DirectoryError> {
        let sql = format!(
            r#"SELECT email_address, active, telegram_user_id FROM "{}" WHERE email_address = ?1"#,
            self.table
        );
        let mut rows = self
            .conn
            .query(&sql, params![address.as_str()])
            .await
            .map_err(|e| DirectoryError::Query(format!("lookup: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let record = row_to_record(&row)
                    .map_err(|e| DirectoryError::Query(format!("row parse: {e}")))?;
                debug!(address = %address, active = record.active, "Subscriber found");
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DirectoryError::Query(format!("lookup: {e}"))),
        }
    }
}
