use std::path::PathBuf;

use rusqlite::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database at {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to create database directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema initialization failed: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("date {0} is outside the storable range 0000-01-01..=9999-12-31")]
    DateOutOfRange(chrono::NaiveDate),

    #[error("expected {expected} affected row(s), got {actual}")]
    UnexpectedRowCount { expected: usize, actual: usize },

    #[error("corrupt value in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },

    #[error("sqlite service is not started")]
    NotStarted,

    #[error("blocking database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("database error: {0}")]
    Database(#[source] rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Constraint(e.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}
