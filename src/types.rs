use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Row field that can carry a low-confidence flag from extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowField {
    HomeStore,
    PartnerName,
    PartnerNumber,
    TippableHours,
}

/// One partner's entry in the report table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub home_store: String,
    pub partner_name: String,
    pub partner_number: String,
    pub tippable_hours: f64,
    /// Empty means full confidence.
    #[serde(default)]
    pub uncertain_fields: BTreeSet<RowField>,
}

impl ReportRow {
    pub fn is_uncertain(&self, field: RowField) -> bool {
        self.uncertain_fields.contains(&field)
    }
}

/// Parsed weekly tip distribution report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub store_number: String,
    pub time_period_start: String,
    pub time_period_end: String,
    pub executed_by: String,
    pub executed_on: String,
    pub rows: Vec<ReportRow>,
    /// Footer figure as printed on the report; never derived from `rows`.
    pub total_tippable_hours_reported: f64,
}

impl Report {
    pub fn sum_of_row_hours(&self) -> f64 {
        self.rows.iter().map(|r| r.tippable_hours).sum()
    }
}

/// Tip pool entered by the reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionInputs {
    pub total_tips: f64,
    /// Cash tips or manual corrections; may be negative.
    #[serde(default)]
    pub adjustments: f64,
}

impl DistributionInputs {
    pub fn new(total_tips: f64, adjustments: f64) -> Self {
        Self {
            total_tips,
            adjustments,
        }
    }

    pub fn effective_total(&self) -> f64 {
        self.total_tips + self.adjustments
    }
}

/// One partner's computed tip allocation. `tip_amount` is unrounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub partner_name: String,
    pub partner_number: String,
    pub tippable_hours: f64,
    pub tip_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub hourly_rate: f64,
    pub payouts: Vec<Payout>,
}

impl Distribution {
    pub fn total_hours(&self) -> f64 {
        self.payouts.iter().map(|p| p.tippable_hours).sum()
    }

    pub fn total_paid(&self) -> f64 {
        self.payouts.iter().map(|p| p.tip_amount).sum()
    }
}

/// A distribution tied to the report it was computed from. This is what gets stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    #[serde(default)]
    pub report_id: Option<i64>,
    pub inputs: DistributionInputs,
    pub hourly_rate: f64,
    pub payouts: Vec<Payout>,
}

impl Calculation {
    pub fn distribution(&self) -> Distribution {
        Distribution {
            hourly_rate: self.hourly_rate,
            payouts: self.payouts.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub id: i64,
    pub created_at: String,
    pub report: Report,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCalculation {
    pub id: i64,
    pub report_id: i64,
    pub created_at: String,
    pub total_tips: f64,
    pub adjustments: f64,
    pub hourly_tip_rate: f64,
    pub payouts: Vec<Payout>,
}

/// History listing item: a stored report with its calculations, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub created_at: String,
    pub store_number: String,
    pub time_period_start: String,
    pub time_period_end: String,
    pub calculations: Vec<StoredCalculation>,
}
