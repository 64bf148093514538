use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The ledger file exists but does not have the expected layout.
    #[error("Corrupt ledger {}: line {line}: {message}", .path.display())]
    Corrupt {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Ledger task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
