use crate::config::{AppConfig, AzureOcrConfig, OcrBackend};
use crate::error::ExtractionError;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Text produced by the sample backend; mirrors a typical weekly report.
pub const SAMPLE_REPORT_TEXT: &str = "
Tip Distribution Report

Store Number: 69600
Time Period: 2025-01-13 - 2025-01-19
Executed By: SM12345
Executed On: 2025-01-20 08:15:23

Data Disclaimer: This report contains confidential information.

Home Store    Partner Name              Partner Number    Total Tippable Hours
69600         Ailuogwemhe, Jodie O      US37008498       18.48
69600         Anderson, Sarah M         US36955947       22.75
69600         Chen, Michael K           US37012334       15.25
69600         Davis, Jennifer L         US36998765       31.50
69600         Martinez, Carlos R        US37015678       19.00

Total Tippable Hours: 107.98
";

/// Turns an uploaded image into raw report text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, image: &[u8], content_type: &str) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub confidence: Option<f64>,
}

/// Azure Document Intelligence `prebuilt-read` model.
pub struct AzureReadExtractor {
    config: AzureOcrConfig,
    client: Client,
}

impl AzureReadExtractor {
    pub fn new(config: AzureOcrConfig) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { config, client })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-read:analyze?api-version=2024-11-30",
            self.config.endpoint
        )
    }

    fn submit(&self, image: &[u8]) -> Result<String, ExtractionError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.config.key)
            .header("Content-Type", "application/octet-stream")
            .body(image.to_vec())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body: if body.is_empty() {
                    "Invalid key or endpoint?".to_string()
                } else {
                    body
                },
            });
        }

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ExtractionError::InvalidResponse("no Operation-Location in response".into())
            })
    }

    fn poll(&self, result_url: &str) -> Result<Vec<OcrLine>, ExtractionError> {
        for attempt in 1..=self.config.max_polls {
            std::thread::sleep(self.config.poll_interval);
            let poll_json: serde_json::Value = self
                .client
                .get(result_url)
                .header("Ocp-Apim-Subscription-Key", &self.config.key)
                .send()?
                .json()?;
            match poll_json.get("status").and_then(|s| s.as_str()).unwrap_or("") {
                "succeeded" => {
                    let result = poll_json.get("analyzeResult").ok_or_else(|| {
                        ExtractionError::InvalidResponse("no analyzeResult".into())
                    })?;
                    debug!(attempt, "OCR analysis succeeded");
                    return Ok(read_result_lines(result));
                }
                "failed" => {
                    let message = poll_json
                        .get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error");
                    return Err(ExtractionError::Analysis(message.to_string()));
                }
                _ => {}
            }
        }
        Err(ExtractionError::TimedOut(self.config.max_polls))
    }
}

impl TextExtractor for AzureReadExtractor {
    fn extract_text(&self, image: &[u8], content_type: &str) -> Result<String, ExtractionError> {
        info!(bytes = image.len(), content_type, "submitting image to Azure read model");
        let result_url = self.submit(image)?;
        let lines = self.poll(&result_url)?;
        let low_confidence = lines
            .iter()
            .filter(|l| l.confidence.is_some_and(|c| c < 0.8))
            .count();
        if low_confidence > 0 {
            warn!(low_confidence, "OCR returned low-confidence lines");
        }
        Ok(lines_to_text(&lines))
    }
}

/// Flatten `analyzeResult.pages[].lines[]` into ordered OCR lines.
pub fn read_result_lines(analyze_result: &serde_json::Value) -> Vec<OcrLine> {
    let Some(pages) = analyze_result.get("pages").and_then(|p| p.as_array()) else {
        return Vec::new();
    };
    pages
        .iter()
        .filter_map(|page| page.get("lines").and_then(|l| l.as_array()))
        .flatten()
        .map(|line| OcrLine {
            text: line
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or("")
                .to_string(),
            confidence: line.get("confidence").and_then(|c| c.as_f64()),
        })
        .collect()
}

pub fn lines_to_text(lines: &[OcrLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Offline extractor; ignores the image and returns [`SAMPLE_REPORT_TEXT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleReportExtractor;

impl TextExtractor for SampleReportExtractor {
    fn extract_text(&self, image: &[u8], _content_type: &str) -> Result<String, ExtractionError> {
        debug!(bytes = image.len(), "returning sample report text");
        Ok(SAMPLE_REPORT_TEXT.to_string())
    }
}

/// Extractor used when Azure credentials are missing; every call fails.
struct UnconfiguredExtractor;

impl TextExtractor for UnconfiguredExtractor {
    fn extract_text(&self, _image: &[u8], _content_type: &str) -> Result<String, ExtractionError> {
        Err(ExtractionError::MissingConfig("AZURE_OCR_KEY / AZURE_OCR_ENDPOINT"))
    }
}

pub fn build_extractor(config: &AppConfig) -> Result<Box<dyn TextExtractor>, ExtractionError> {
    match (config.ocr_backend, &config.azure) {
        (OcrBackend::Sample, _) => Ok(Box::new(SampleReportExtractor)),
        (OcrBackend::Azure, Some(azure)) => Ok(Box::new(AzureReadExtractor::new(azure.clone())?)),
        (OcrBackend::Azure, None) => {
            warn!("Azure OCR credentials not configured; uploads will fail");
            Ok(Box::new(UnconfiguredExtractor))
        }
    }
}
