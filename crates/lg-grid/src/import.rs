//! CSV import: select a file, preview it, then confirm or cancel

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use lg_core::record::Record;
use lg_core::{GridSettings, Notification};
use lg_data::import::read_csv_file;
use lg_data::{parse_csv, CsvPreview, DataError, NullConfig};
use tracing::{info, warn};

use crate::grid::RecordGrid;
use crate::{GridError, ImportError};

/// Where the import flow currently stands
#[derive(Debug, Clone)]
pub enum ImportStage<R: Record> {
    SelectFile,
    Preview(CsvPreview<R>),
}

/// A valid row whose create request failed
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub line: usize,
    pub error: GridError,
}

/// Aggregate outcome of a confirmed import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub succeeded: usize,
    /// Rows that failed validation and were never sent
    pub skipped: usize,
    pub failed: Vec<RowFailure>,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} succeeded, {} skipped", self.succeeded, self.skipped)?;
        if !self.failed.is_empty() {
            write!(f, ", {} failed", self.failed.len())?;
        }
        Ok(())
    }
}

/// The import dialog state
pub struct CsvImport<R: Record> {
    nulls: NullConfig,
    stage: ImportStage<R>,
}

impl<R: Record> CsvImport<R> {
    pub fn new(nulls: NullConfig) -> Self {
        Self {
            nulls,
            stage: ImportStage::SelectFile,
        }
    }

    pub fn from_settings(settings: &GridSettings) -> Self {
        Self::new(NullConfig::from_patterns(settings.import_null_patterns.iter().cloned()))
    }

    pub fn stage(&self) -> &ImportStage<R> {
        &self.stage
    }

    pub fn preview(&self) -> Option<&CsvPreview<R>> {
        match &self.stage {
            ImportStage::Preview(preview) => Some(preview),
            ImportStage::SelectFile => None,
        }
    }

    /// Parse CSV text and show its preview
    pub fn load_reader<Rd: Read>(&mut self, name: &str, reader: Rd) -> Result<&CsvPreview<R>, ImportError> {
        let preview = parse_csv::<R, _>(name, reader, &self.nulls)?;
        self.show(preview)
    }

    /// Parse a file on the blocking pool and show its preview
    pub async fn load_path(&mut self, path: impl AsRef<Path>) -> Result<&CsvPreview<R>, ImportError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let nulls = self.nulls.clone();
        let preview = tokio::task::spawn_blocking(move || read_csv_file::<R>(&path, &nulls))
            .await
            .map_err(DataError::from)??;
        self.show(preview)
    }

    fn show(&mut self, preview: CsvPreview<R>) -> Result<&CsvPreview<R>, ImportError> {
        info!(
            source = %preview.source_name,
            valid = preview.valid_count(),
            invalid = preview.invalid_count(),
            "import preview ready"
        );
        self.stage = ImportStage::Preview(preview);
        self.preview().ok_or(ImportError::NothingToImport)
    }

    /// Drop the preview without any remote call
    pub fn cancel(&mut self) {
        self.stage = ImportStage::SelectFile;
    }

    /// Create one record per valid row.
    ///
    /// A failing row does not stop the batch. The grid is refreshed once at
    /// the end and the outcome is reported through its notifier.
    pub async fn confirm(&mut self, grid: &RecordGrid<R>) -> Result<ImportReport, ImportError> {
        let preview = match std::mem::replace(&mut self.stage, ImportStage::SelectFile) {
            ImportStage::Preview(preview) => preview,
            ImportStage::SelectFile => return Err(ImportError::NothingToImport),
        };

        let mut report = ImportReport {
            skipped: preview.invalid_count(),
            ..ImportReport::default()
        };
        for (line, draft) in preview.drafts() {
            match grid.insert_draft(draft).await {
                Ok(_) => report.succeeded += 1,
                Err(error) => {
                    warn!(source = %preview.source_name, line, error = %error, "import row failed");
                    report.failed.push(RowFailure { line, error });
                }
            }
        }

        info!(source = %preview.source_name, summary = %report, "import finished");
        let notification = if report.failed.is_empty() {
            Notification::success("Import complete", report.to_string())
        } else {
            Notification::error("Import finished with errors", report.to_string())
        };
        grid.notify(notification);

        if let Err(err) = grid.load(false).await {
            warn!(error = %err, "refresh after import failed");
        }
        Ok(report)
    }
}
