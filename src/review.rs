//! Human review step between parsing and calculation.
//!
//! Edits are applied as `&Report -> Report`; the parsed report handed in is never mutated.

use crate::error::ReviewError;
use crate::types::{Report, ReportRow};
use serde::{Deserialize, Serialize};

/// Allowed gap between the summed row hours and the footer total.
pub const HOURS_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderField {
    StoreNumber,
    TimePeriodStart,
    TimePeriodEnd,
    ExecutedBy,
    ExecutedOn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ReportEdit {
    SetHeader { field: HeaderField, value: String },
    SetHomeStore { index: usize, value: String },
    SetPartnerName { index: usize, value: String },
    SetPartnerNumber { index: usize, value: String },
    SetTippableHours { index: usize, hours: f64 },
    SetReportedTotal { hours: f64 },
    AddRow,
    RemoveRow { index: usize },
}

/// Sum of row hours against the printed footer total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoursCheck {
    pub sum_of_rows: f64,
    pub reported: f64,
    pub delta: f64,
    pub mismatch: bool,
}

pub fn check_hours(report: &Report) -> HoursCheck {
    let sum_of_rows = report.sum_of_row_hours();
    let reported = report.total_tippable_hours_reported;
    let delta = sum_of_rows - reported;
    HoursCheck {
        sum_of_rows,
        reported,
        delta,
        mismatch: delta.abs() > HOURS_TOLERANCE,
    }
}

/// Indices of rows that carry at least one low-confidence field.
pub fn uncertain_rows(report: &Report) -> Vec<usize> {
    report
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.uncertain_fields.is_empty())
        .map(|(i, _)| i)
        .collect()
}

pub fn apply_edit(report: &Report, edit: ReportEdit) -> Result<Report, ReviewError> {
    let mut next = report.clone();
    match edit {
        ReportEdit::SetHeader { field, value } => {
            let slot = match field {
                HeaderField::StoreNumber => &mut next.store_number,
                HeaderField::TimePeriodStart => &mut next.time_period_start,
                HeaderField::TimePeriodEnd => &mut next.time_period_end,
                HeaderField::ExecutedBy => &mut next.executed_by,
                HeaderField::ExecutedOn => &mut next.executed_on,
            };
            *slot = value;
        }
        ReportEdit::SetHomeStore { index, value } => row_mut(&mut next, index)?.home_store = value,
        ReportEdit::SetPartnerName { index, value } => {
            row_mut(&mut next, index)?.partner_name = value
        }
        ReportEdit::SetPartnerNumber { index, value } => {
            row_mut(&mut next, index)?.partner_number = value
        }
        ReportEdit::SetTippableHours { index, hours } => {
            row_mut(&mut next, index)?.tippable_hours = validate_hours(hours)?
        }
        ReportEdit::SetReportedTotal { hours } => {
            next.total_tippable_hours_reported = validate_hours(hours)?
        }
        ReportEdit::AddRow => {
            let home_store = next.store_number.clone();
            next.rows.push(ReportRow {
                home_store,
                partner_name: String::new(),
                partner_number: String::new(),
                tippable_hours: 0.0,
                uncertain_fields: Default::default(),
            });
        }
        ReportEdit::RemoveRow { index } => {
            let len = next.rows.len();
            if index >= len {
                return Err(ReviewError::RowOutOfRange { index, len });
            }
            next.rows.remove(index);
        }
    }
    Ok(next)
}

pub fn apply_edits<I>(report: &Report, edits: I) -> Result<Report, ReviewError>
where
    I: IntoIterator<Item = ReportEdit>,
{
    edits
        .into_iter()
        .try_fold(report.clone(), |current, edit| apply_edit(&current, edit))
}

fn row_mut(report: &mut Report, index: usize) -> Result<&mut ReportRow, ReviewError> {
    let len = report.rows.len();
    report
        .rows
        .get_mut(index)
        .ok_or(ReviewError::RowOutOfRange { index, len })
}

fn validate_hours(hours: f64) -> Result<f64, ReviewError> {
    if hours.is_finite() && hours >= 0.0 {
        Ok(hours)
    } else {
        Err(ReviewError::InvalidHours(hours))
    }
}
