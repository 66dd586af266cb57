use crate::types::Report;
use serde::Serialize;
use thiserror::Error;

/// Text extraction failed; the caller sees this as a server-side fault.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0} not set in .env")]
    MissingConfig(&'static str),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("OCR failed ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("OCR analysis failed: {0}")]
    Analysis(String),

    #[error("OCR timed out after {0} polls")]
    TimedOut(u32),

    #[error("invalid OCR response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("calculation has no report id")]
    MissingReportId,

    #[error("report {0} not found")]
    ReportNotFound(i64),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("invalid export path: {0}")]
    InvalidPath(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReviewError {
    #[error("row {index} out of range ({len} rows)")]
    RowOutOfRange { index: usize, len: usize },

    #[error("tippable hours must be a non-negative number, got {0}")]
    InvalidHours(f64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine an application data directory")]
    NoDataDir,

    #[error("{name} must be a number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("unknown OCR backend {0:?} (expected \"azure\" or \"sample\")")]
    UnknownBackend(String),
}

/// Error returned from the command boundary.
///
/// Client faults map to 400, everything else to 500. Only [`CommandError::public_message`]
/// leaves the process; the wrapped diagnostics go to the log.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no file provided")]
    MissingFile,

    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),

    #[error("file too large ({size} bytes, max {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),

    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    #[error("database not initialized")]
    DatabaseUnavailable,

    /// The report was parsed but could not be stored. It is handed back so the caller can
    /// still review, calculate and export it.
    #[error("report parsed but not saved: {source}")]
    ReportNotSaved {
        report: Box<Report>,
        source: Box<CommandError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl CommandError {
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CommandError::MissingFile
                | CommandError::UnsupportedContentType(_)
                | CommandError::FileTooLarge { .. }
                | CommandError::InvalidInput(_)
                | CommandError::Review(_)
        ) || matches!(
            self,
            CommandError::Persistence(DbError::MissingReportId | DbError::ReportNotFound(_))
        )
    }

    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> String {
        match self {
            CommandError::MissingFile => "No file provided".to_string(),
            CommandError::UnsupportedContentType(_) => "File must be an image".to_string(),
            CommandError::FileTooLarge { max, .. } => {
                format!("File too large (max {}MB)", max / (1024 * 1024))
            }
            CommandError::InvalidInput(msg) => msg.clone(),
            CommandError::Review(e) => e.to_string(),
            CommandError::Persistence(DbError::MissingReportId) => {
                "Report ID missing".to_string()
            }
            CommandError::Persistence(DbError::ReportNotFound(_)) => {
                "Report not found".to_string()
            }
            CommandError::Extraction(_) => "Failed to parse report".to_string(),
            CommandError::Persistence(_)
            | CommandError::DatabaseUnavailable
            | CommandError::ReportNotSaved { .. } => "Failed to save report".to_string(),
            CommandError::Export(_) => "Failed to export".to_string(),
        }
    }

    /// The parsed report carried by a failed save, if any.
    pub fn into_unsaved_report(self) -> Option<Report> {
        match self {
            CommandError::ReportNotSaved { report, .. } => Some(*report),
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.public_message(),
        }
    }
}
