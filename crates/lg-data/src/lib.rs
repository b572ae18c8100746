//! Data sources and import parsing for the lead grid

pub mod config;
pub mod import;
pub mod sources;

use lg_core::{RecordId, RemoteError, ValidationError};
use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use config::NullConfig;
pub use import::{parse_csv, CsvPreview, PreviewRow};
pub use sources::{MemoryRepository, SqliteLeadStore};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("file has no header row")]
    MissingHeader,

    #[error("record {0} not found")]
    NotFound(RecordId),

    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => {
                DataError::Io(std::io::Error::new(io_err.kind(), error.to_string()))
            }
            _ => DataError::Csv(error.to_string()),
        }
    }
}

impl From<DataError> for RemoteError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::NotFound(id) => RemoteError::NotFound(id),
            DataError::Validation(err) => RemoteError::Rejected(err),
            DataError::Io(err) => RemoteError::Network(err.to_string()),
            other => RemoteError::Server(other.to_string()),
        }
    }
}
