use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnmigratorError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Error: {0}")]
    Error(String),
}
