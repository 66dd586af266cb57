use crate::calculator;
use crate::db::Db;
use crate::error::{CommandError, ExtractionError};
use crate::export;
use crate::ocr::TextExtractor;
use crate::parser;
use crate::review::{self, HoursCheck, ReportEdit};
use crate::types::{Calculation, DistributionInputs, HistoryEntry, Report};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Uploads larger than this are rejected before extraction.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub struct AppState {
    pub db: Mutex<Option<Db>>,
    pub extractor: Box<dyn TextExtractor>,
}

impl AppState {
    pub fn new(db: Option<Db>, extractor: Box<dyn TextExtractor>) -> Self {
        Self {
            db: Mutex::new(db),
            extractor,
        }
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Db) -> Result<T, crate::error::DbError>,
    ) -> Result<T, CommandError> {
        let guard = self
            .db
            .lock()
            .map_err(|_| CommandError::DatabaseUnavailable)?;
        let db = guard.as_ref().ok_or(CommandError::DatabaseUnavailable)?;
        Ok(f(db)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file contents.
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReportResponse {
    pub id: i64,
    pub report: Report,
    pub hours_check: HoursCheck,
    pub uncertain_rows: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedReport {
    pub report: Report,
    pub hours_check: HoursCheck,
    pub uncertain_rows: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatePayload {
    #[serde(default)]
    pub report_id: Option<i64>,
    pub report: Report,
    pub total_tips: f64,
    #[serde(default)]
    pub adjustments: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub content: String,
}

/// Accept one uploaded image, extract its text, parse it and store the parsed report.
pub fn parse_report_upload(
    state: &AppState,
    upload: Option<UploadPayload>,
) -> Result<ParsedReportResponse, CommandError> {
    let result = parse_report_upload_inner(state, upload);
    if let Err(e) = &result {
        log_command_error("parse_report_upload", e);
    }
    result
}

fn parse_report_upload_inner(
    state: &AppState,
    upload: Option<UploadPayload>,
) -> Result<ParsedReportResponse, CommandError> {
    let upload = upload.ok_or(CommandError::MissingFile)?;
    if !upload.content_type.starts_with("image/") {
        return Err(CommandError::UnsupportedContentType(upload.content_type));
    }
    if upload.data.trim().is_empty() {
        return Err(CommandError::MissingFile);
    }
    let bytes = BASE64
        .decode(upload.data.trim())
        .map_err(|e| CommandError::InvalidInput(format!("Invalid file encoding: {}", e)))?;
    if bytes.is_empty() {
        return Err(CommandError::MissingFile);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CommandError::FileTooLarge {
            size: bytes.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }

    info!(file = %upload.file_name, bytes = bytes.len(), "extracting report text");
    let text = state.extractor.extract_text(&bytes, &upload.content_type)?;
    let report = parser::parse_report(&text);
    let hours_check = review::check_hours(&report);
    if hours_check.mismatch {
        warn!(
            sum_of_rows = hours_check.sum_of_rows,
            reported = hours_check.reported,
            "row hours do not match the reported total"
        );
    }
    let uncertain_rows = review::uncertain_rows(&report);

    let id = match state.with_db(|db| db.insert_report(&report)) {
        Ok(id) => id,
        Err(source) => {
            return Err(CommandError::ReportNotSaved {
                report: Box::new(report),
                source: Box::new(source),
            })
        }
    };
    info!(id, rows = report.rows.len(), "stored parsed report");

    Ok(ParsedReportResponse {
        id,
        report,
        hours_check,
        uncertain_rows,
    })
}

/// Apply reviewer edits and re-run the hours check. Nothing is stored.
pub fn review_report(report: &Report, edits: Vec<ReportEdit>) -> Result<ReviewedReport, CommandError> {
    let report = review::apply_edits(report, edits)?;
    Ok(ReviewedReport {
        hours_check: review::check_hours(&report),
        uncertain_rows: review::uncertain_rows(&report),
        report,
    })
}

pub fn calculate_tips(payload: CalculatePayload) -> Result<Calculation, CommandError> {
    if !payload.total_tips.is_finite() || payload.total_tips < 0.0 {
        return Err(CommandError::InvalidInput(
            "Total tips must be a non-negative amount".to_string(),
        ));
    }
    if !payload.adjustments.is_finite() {
        return Err(CommandError::InvalidInput(
            "Adjustments must be a number".to_string(),
        ));
    }
    let inputs = DistributionInputs::new(payload.total_tips, payload.adjustments);
    Ok(calculator::calculate_for_report(
        &payload.report,
        payload.report_id,
        inputs,
    ))
}

pub fn save_calculation(state: &AppState, calculation: &Calculation) -> Result<i64, CommandError> {
    let result = state.with_db(|db| db.insert_calculation(calculation));
    match &result {
        Ok(id) => info!(id, report_id = ?calculation.report_id, "saved calculation"),
        Err(e) => log_command_error("save_calculation", e),
    }
    result
}

pub fn get_history(state: &AppState) -> Result<Vec<HistoryEntry>, CommandError> {
    let result = state.with_db(|db| db.list_history());
    if let Err(e) = &result {
        log_command_error("get_history", e);
    }
    result
}

pub fn delete_report(state: &AppState, id: i64) -> Result<bool, CommandError> {
    state.with_db(|db| db.delete_report(id))
}

pub fn export_csv(report: &Report, calculation: &Calculation) -> ExportFile {
    ExportFile {
        file_name: export::csv_file_name(report),
        content_type: "text/csv",
        content: export::payouts_to_csv(
            &calculation.payouts,
            calculation.hourly_rate,
            &report.store_number,
        ),
    }
}

pub fn export_clipboard(report: &Report, calculation: &Calculation) -> String {
    export::payouts_to_tsv(
        &calculation.payouts,
        calculation.hourly_rate,
        &report.store_number,
    )
}

pub fn export_xlsx(
    report: &Report,
    calculation: &Calculation,
    path: &str,
) -> Result<String, CommandError> {
    let written =
        export::export_payouts_to_xlsx(Path::new(path.trim()), report, &calculation.distribution())?;
    Ok(written.to_string_lossy().into_owned())
}

fn log_command_error(command: &str, e: &CommandError) {
    if e.is_client_error() {
        warn!(command, error = %e, "rejected request");
    } else if let CommandError::Extraction(ExtractionError::Network(inner)) = e {
        error!(command, error = %inner, connect = inner.is_connect(), timeout = inner.is_timeout(), "text extraction unreachable");
    } else {
        error!(command, error = %e, "command failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::SampleReportExtractor;

    struct FailingExtractor;

    impl TextExtractor for FailingExtractor {
        fn extract_text(&self, _: &[u8], _: &str) -> Result<String, ExtractionError> {
            Err(ExtractionError::Analysis("model unavailable".into()))
        }
    }

    fn state() -> AppState {
        AppState::new(
            Some(Db::open_in_memory().unwrap()),
            Box::new(SampleReportExtractor),
        )
    }

    fn png_upload() -> UploadPayload {
        UploadPayload {
            file_name: "report.png".into(),
            content_type: "image/png".into(),
            data: BASE64.encode(b"\x89PNG\r\n\x1a\nfake"),
        }
    }

    #[test]
    fn rejects_missing_and_non_image_uploads() {
        let state = state();
        let err = parse_report_upload(&state, None).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.body().error, "No file provided");

        let mut pdf = png_upload();
        pdf.content_type = "application/pdf".into();
        let err = parse_report_upload(&state, Some(pdf)).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "File must be an image");

        let mut empty = png_upload();
        empty.data = String::new();
        assert!(matches!(
            parse_report_upload(&state, Some(empty)),
            Err(CommandError::MissingFile)
        ));

        let mut garbled = png_upload();
        garbled.data = "not base64!!".into();
        assert_eq!(
            parse_report_upload(&state, Some(garbled)).unwrap_err().status_code(),
            400
        );
        assert!(state.with_db(|db| db.list_history()).unwrap().is_empty());
    }

    #[test]
    fn parses_and_stores_upload() {
        let state = state();
        let response = parse_report_upload(&state, Some(png_upload())).unwrap();
        assert_eq!(response.report.store_number, "69600");
        assert_eq!(response.report.rows.len(), 5);
        assert_eq!(response.uncertain_rows, vec![0]);
        assert!(response.hours_check.mismatch);
        let stored = state.with_db(|db| db.get_report(response.id)).unwrap().unwrap();
        assert_eq!(stored.report.rows.len(), 5);
    }

    #[test]
    fn extraction_failure_is_server_error_without_details() {
        let state = AppState::new(Some(Db::open_in_memory().unwrap()), Box::new(FailingExtractor));
        let err = parse_report_upload(&state, Some(png_upload())).unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert!(!err.public_message().contains("model unavailable"));
    }

    #[test]
    fn missing_database_is_server_error() {
        let state = AppState::new(None, Box::new(SampleReportExtractor));
        let err = parse_report_upload(&state, Some(png_upload())).unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.public_message(), "Failed to save report");

        let report = err.into_unsaved_report().unwrap();
        assert_eq!(report.store_number, "69600");
        assert_eq!(report.rows.len(), 5);
        let calc = calculate_tips(CalculatePayload {
            report_id: None,
            report: report.clone(),
            total_tips: 1000.0,
            adjustments: 69.80,
        })
        .unwrap();
        let csv = export_csv(&report, &calc);
        assert_eq!(csv.content.lines().count(), 6);
    }

    #[test]
    fn extraction_failure_carries_no_report() {
        let state = AppState::new(None, Box::new(FailingExtractor));
        let err = parse_report_upload(&state, Some(png_upload())).unwrap_err();
        assert!(err.into_unsaved_report().is_none());
    }

    #[test]
    fn calculate_validates_inputs() {
        let report = crate::parser::parse_report(crate::ocr::SAMPLE_REPORT_TEXT);
        let payload = |tips: f64, adj: f64| CalculatePayload {
            report_id: None,
            report: report.clone(),
            total_tips: tips,
            adjustments: adj,
        };
        assert_eq!(calculate_tips(payload(-1.0, 0.0)).unwrap_err().status_code(), 400);
        assert!(calculate_tips(payload(f64::INFINITY, 0.0)).is_err());
        assert!(calculate_tips(payload(10.0, f64::NAN)).is_err());
        let calc = calculate_tips(payload(0.0, 50.0)).unwrap();
        assert_eq!(calc.payouts.len(), 5);
    }

    #[test]
    fn save_without_report_id_is_client_error() {
        let state = state();
        let report = crate::parser::parse_report(crate::ocr::SAMPLE_REPORT_TEXT);
        let calc = calculate_tips(CalculatePayload {
            report_id: None,
            report,
            total_tips: 100.0,
            adjustments: 0.0,
        })
        .unwrap();
        let err = save_calculation(&state, &calc).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Report ID missing");
    }

    #[test]
    fn review_reports_hours_check() {
        let report = crate::parser::parse_report(crate::ocr::SAMPLE_REPORT_TEXT);
        let reviewed = review_report(
            &report,
            vec![ReportEdit::SetReportedTotal { hours: 106.98 }],
        )
        .unwrap();
        assert!(!reviewed.hours_check.mismatch);
        assert_eq!(reviewed.uncertain_rows, vec![0]);
        assert!(review_report(&report, vec![ReportEdit::RemoveRow { index: 9 }]).is_err());
    }
}
