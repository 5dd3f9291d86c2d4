mod schema;

use std::io;
use std::path::Path;

use log::info;
use rusqlite::{Connection, OptionalExtension};

use crate::error::UnmigratorError;
use schema::{CREATE_SCHEMA_SQL, SCHEMA_VERSION};

pub const DB_FILENAME: &str = "unmigrator.db";

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the record database at `db_path`.
    ///
    /// The parent folder must already exist. A database without a `meta`
    /// table gets the current schema; a database with a different
    /// schema version is refused.
    pub fn open(db_path: &Path) -> Result<Self, UnmigratorError> {
        if let Some(folder) = db_path.parent() {
            if !folder.as_os_str().is_empty() && !folder.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!(
                        "Database folder '{}' does not exist or is not a directory",
                        folder.display()
                    ),
                )
                .into());
            }
        }

        let conn = Connection::open(db_path)?;
        info!("Database opened at: {}", db_path.display());

        let db = Database { conn };
        db.ensure_schema()?;

        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, UnmigratorError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn ensure_schema(&self) -> Result<(), UnmigratorError> {
        let table_exists: bool = self
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get::<_, i32>(0),
            )
            .map(|count| count > 0)?;

        if !table_exists {
            info!("Creating schema version {}", SCHEMA_VERSION);
            self.conn.execute_batch(CREATE_SCHEMA_SQL)?;
            return Ok(());
        }

        let stored_version = Self::get_meta_value_locked(&self.conn, "schema_version")?;

        match stored_version.as_deref() {
            Some(SCHEMA_VERSION) => Ok(()),
            Some(other) => Err(UnmigratorError::Error(format!(
                "Schema version mismatch: found {}, expected {}",
                other, SCHEMA_VERSION
            ))),
            None => Err(UnmigratorError::Error("Schema version missing".to_string())),
        }
    }

    pub fn get_meta_value_locked(
        conn: &Connection,
        key: &str,
    ) -> Result<Option<String>, UnmigratorError> {
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    #[cfg(test)]
    pub fn set_meta_value_locked(
        conn: &Connection,
        key: &str,
        value: &str,
    ) -> Result<(), UnmigratorError> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
            [key, value],
        )?;
        Ok(())
    }
}
