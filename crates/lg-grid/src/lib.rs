//! Editable record grid
//!
//! A headless grid over a tenant-scoped remote table: sorting, pagination,
//! inline cell editing with keyboard traversal, row selection with bulk
//! actions, CSV import and debounced realtime refresh. Rendering is left to
//! the caller; every user interaction is a method call on [`RecordGrid`].

pub mod editing;
pub mod grid;
pub mod import;
pub mod pagination;
pub mod realtime;
pub mod selection;
pub mod sort;

use lg_core::{RecordId, RemoteError, ValidationError};
use lg_data::DataError;
use thiserror::Error;

// Re-exports
pub use editing::{CellEditor, EditKey, EditingCell};
pub use grid::{DeleteReport, GridBuilder, LeadGrid, RecordGrid};
pub use import::{CsvImport, ImportReport, ImportStage, RowFailure};
pub use pagination::Paginator;
pub use realtime::{RealtimeBridge, RefreshTarget};
pub use selection::SelectionSet;
pub use sort::SortState;

/// Errors returned by grid operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("page size {0} is not offered (choose one of {1:?})")]
    UnsupportedPageSize(usize, Vec<usize>),

    #[error("field {0} is not editable")]
    NotEditable(&'static str),

    #[error("no cell is being edited")]
    NotEditing,

    #[error("record {0} is not on the current page")]
    UnknownRecord(RecordId),

    #[error("grid is not mounted")]
    Unmounted,
}

/// Errors from the CSV import flow
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("no file has been previewed")]
    NothingToImport,
}
